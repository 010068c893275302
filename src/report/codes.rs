//! Stable diagnostic code catalog.
//!
//! Compile-time codes are `CE####`, runtime codes embedded in emitted
//! programs are `RE####`. Each code has exactly one canonical message format,
//! written at the emission site; the catalog documents the format next to
//! each code. Codes are append-only: never renumber, never reuse.

/// Compile-time diagnostic codes.
///
/// Ranges:
/// - `CE00xx` — collection-phase duplicates and shape errors
/// - `CE11xx` — scope analysis
/// - `CE20xx` — type checking and enum/struct shape
/// - `CE31xx` — borrow checking
/// - `CE40xx` — perks and generic constraints
/// - `CE90xx` — internal invariant violations (reserved, not expected on
///   well-formed input)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum Code {
    /// "'{name}' conflicts with a struct/enum of the same name (previously defined at {loc})"
    CE0006,
    /// "duplicate definition of '{name}' (previously defined at {loc})"
    CE0101,
    /// "duplicate parameter name '{name}'"
    CE0102,
    /// "function '{name}' is missing a return type"
    CE0103,
    /// "constant '{name}' is missing a type"
    CE0104,
    /// "duplicate constant '{name}' (previously defined at {loc})"
    CE0105,
    /// "main() must return an integer type, found '{type}'"
    CE0106,

    /// "undeclared name '{name}'"
    CE1101,
    /// "'{name}' is already declared in this scope"
    CE1102,
    /// "use of '{name}' after .destroy()"
    CE1103,
    /// "variable '{name}' is never used"
    CE1104,

    /// "type mismatch: expected '{expected}', found '{found}'"
    CE2001,
    /// "operator '{op}' cannot be applied to '{lhs}' and '{rhs}'"
    CE2002,
    /// "unknown type '{name}'"
    CE2003,
    /// "no method '{method}' on type '{type}'"
    CE2004,
    /// "condition must be 'bool' or a Result, found '{type}'"
    CE2005,
    /// "unknown function '{name}'"
    CE2006,
    /// "'{name}' expects {expected} argument(s), got {got}"
    CE2009,
    /// "no field '{field}' on type '{type}'"
    CE2010,
    /// "cannot index '{type}'"
    CE2011,
    /// "enum '{enum}' has no variant '{variant}'"
    CE2012,
    /// "'?' requires a Result value, found '{type}'"
    CE2013,
    /// "return type mismatch: expected '{expected}', found '{found}'"
    CE2014,
    /// "duplicate enum '{name}' (previously defined at {loc})"
    CE2046,
    /// "duplicate variant '{name}' in enum '{enum}'"
    CE2047,
    /// "enum variant '{variant}' cannot hold a dynamic array field of type '{type}'"
    CE2059,
    /// "enum '{name}' recursively contains itself without Own<T> indirection: {path}"
    CE2060,
    /// "type '{type}' is not hashable"
    CE2061,
    /// "function returns 'Result<...>' and also declares '| {err_type}'; remove one"
    CE2085,

    /// "reference to '{name}' outlives its referent"
    CE3101,
    /// "'{name}' is already borrowed in this range"
    CE3102,
    /// "use of moved value '{name}'"
    CE3103,

    /// "duplicate perk '{name}'"
    CE4001,
    /// "'{type}' already implements perk '{perk}'"
    CE4002,
    /// "unknown perk '{perk}'"
    CE4003,
    /// "type '{type}' does not satisfy perk bound '{perk}'"
    CE4006,

    /// "internal: unresolved type '{type}' reached {stage}"
    CE9001,
    /// "internal: type parameter '{name}' survived monomorphization"
    CE9002,
    /// "internal: monomorphization saw an unresolved type argument '{type}' for '{base}'"
    CE9003,
    /// "internal: {detail}"
    CE9004,
}

impl Code {
    pub fn as_str(self) -> &'static str {
        match self {
            Code::CE0006 => "CE0006",
            Code::CE0101 => "CE0101",
            Code::CE0102 => "CE0102",
            Code::CE0103 => "CE0103",
            Code::CE0104 => "CE0104",
            Code::CE0105 => "CE0105",
            Code::CE0106 => "CE0106",
            Code::CE1101 => "CE1101",
            Code::CE1102 => "CE1102",
            Code::CE1103 => "CE1103",
            Code::CE1104 => "CE1104",
            Code::CE2001 => "CE2001",
            Code::CE2002 => "CE2002",
            Code::CE2003 => "CE2003",
            Code::CE2004 => "CE2004",
            Code::CE2005 => "CE2005",
            Code::CE2006 => "CE2006",
            Code::CE2009 => "CE2009",
            Code::CE2010 => "CE2010",
            Code::CE2011 => "CE2011",
            Code::CE2012 => "CE2012",
            Code::CE2013 => "CE2013",
            Code::CE2014 => "CE2014",
            Code::CE2046 => "CE2046",
            Code::CE2047 => "CE2047",
            Code::CE2059 => "CE2059",
            Code::CE2060 => "CE2060",
            Code::CE2061 => "CE2061",
            Code::CE2085 => "CE2085",
            Code::CE3101 => "CE3101",
            Code::CE3102 => "CE3102",
            Code::CE3103 => "CE3103",
            Code::CE4001 => "CE4001",
            Code::CE4002 => "CE4002",
            Code::CE4003 => "CE4003",
            Code::CE4006 => "CE4006",
            Code::CE9001 => "CE9001",
            Code::CE9002 => "CE9002",
            Code::CE9003 => "CE9003",
            Code::CE9004 => "CE9004",
        }
    }

    /// Internal codes abort compilation immediately instead of draining the pass.
    pub fn is_internal(self) -> bool {
        matches!(
            self,
            Code::CE9001 | Code::CE9002 | Code::CE9003 | Code::CE9004
        )
    }
}

/// Runtime error codes baked into emitted programs.
///
/// The emitted binary prints `Runtime Error RE####: <msg>` to stderr and
/// calls `exit(1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCode {
    /// "index %d out of bounds for array of size %d"
    RE2020,
    /// "memory allocation failed"
    RE2021,
    /// "realise() called on Err value"
    RE2022,
    /// "integer overflow"
    RE2023,
}

impl RuntimeCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeCode::RE2020 => "RE2020",
            RuntimeCode::RE2021 => "RE2021",
            RuntimeCode::RE2022 => "RE2022",
            RuntimeCode::RE2023 => "RE2023",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_strings_match_names() {
        assert_eq!(Code::CE0101.as_str(), "CE0101");
        assert_eq!(Code::CE4006.as_str(), "CE4006");
        assert_eq!(RuntimeCode::RE2021.as_str(), "RE2021");
    }

    #[test]
    fn internal_range_is_flagged() {
        assert!(Code::CE9003.is_internal());
        assert!(!Code::CE0101.is_internal());
    }
}
