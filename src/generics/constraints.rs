//! Perk-bound validation for generic instantiations.
//!
//! When a type parameter declared as `T: Hashable` is bound to a concrete
//! argument, the argument's type must appear in the perk implementation
//! table for every declared bound. Synthetic primitive implementations
//! participate, so `compute<T: Hashable>(i32)` passes without an explicit
//! `extend i32 with Hashable`.

use crate::report::{Code, Reporter, Span};
use crate::syntax::ast::TypeParamDecl;
use crate::tables::PerkImplementationTable;
use crate::types::Type;

pub struct ConstraintValidator<'a> {
    perk_impls: &'a PerkImplementationTable,
}

impl<'a> ConstraintValidator<'a> {
    pub fn new(perk_impls: &'a PerkImplementationTable) -> Self {
        ConstraintValidator { perk_impls }
    }

    /// Check one binding against one bound. Reports CE4006 on failure.
    pub fn validate_constraint(
        &self,
        reporter: &mut Reporter,
        type_arg: &Type,
        bound: &str,
        span: Span,
    ) -> bool {
        let type_name = type_arg.lookup_name();
        if !self.perk_impls.implements(&type_name, bound) {
            reporter.error(
                Code::CE4006,
                span,
                format!("type '{}' does not satisfy perk bound '{}'", type_name, bound),
            );
            return false;
        }
        true
    }

    /// Check every bound on every parameter of an instantiation. All
    /// failures are reported, not just the first.
    pub fn validate_bindings(
        &self,
        reporter: &mut Reporter,
        type_params: &[TypeParamDecl],
        args: &[Type],
        span: Span,
    ) -> bool {
        let mut all_ok = true;
        for (param, arg) in type_params.iter().zip(args) {
            for bound in &param.bounds {
                if !self.validate_constraint(reporter, arg, bound, span) {
                    all_ok = false;
                }
            }
        }
        all_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Reporter;

    fn tp(name: &str, bounds: &[&str]) -> TypeParamDecl {
        TypeParamDecl {
            name: name.to_string(),
            bounds: bounds.iter().map(|b| b.to_string()).collect(),
            span: Span::builtin(),
        }
    }

    #[test]
    fn synthetic_impl_satisfies_bound() {
        let mut impls = PerkImplementationTable::new();
        impls.register_synthetic("i32", "Hashable");
        let validator = ConstraintValidator::new(&impls);
        let mut reporter = Reporter::new();
        assert!(validator.validate_bindings(
            &mut reporter,
            &[tp("T", &["Hashable"])],
            &[Type::i32()],
            Span::builtin(),
        ));
        assert!(!reporter.has_errors());
    }

    #[test]
    fn missing_impl_reports_ce4006() {
        let impls = PerkImplementationTable::new();
        let validator = ConstraintValidator::new(&impls);
        let mut reporter = Reporter::new();
        assert!(!validator.validate_bindings(
            &mut reporter,
            &[tp("T", &["Hashable"])],
            &[Type::Struct("Point".into())],
            Span::builtin(),
        ));
        assert_eq!(reporter.items[0].code, Code::CE4006);
    }

    #[test]
    fn all_bounds_checked_not_just_first() {
        let mut impls = PerkImplementationTable::new();
        impls.register_synthetic("i32", "Hashable");
        let validator = ConstraintValidator::new(&impls);
        let mut reporter = Reporter::new();
        validator.validate_bindings(
            &mut reporter,
            &[tp("T", &["Hashable", "Printable", "Eq"])],
            &[Type::i32()],
            Span::builtin(),
        );
        // Hashable passes, Printable and Eq both reported.
        assert_eq!(reporter.error_count(), 2);
    }

    #[test]
    fn unbounded_params_always_pass() {
        let impls = PerkImplementationTable::new();
        let validator = ConstraintValidator::new(&impls);
        let mut reporter = Reporter::new();
        assert!(validator.validate_bindings(
            &mut reporter,
            &[tp("T", &[])],
            &[Type::Struct("Anything".into())],
            Span::builtin(),
        ));
    }
}
