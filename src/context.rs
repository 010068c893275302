//! Per-compilation state.
//!
//! Everything a compilation mutates lives here: every symbol table, the
//! generic-provider activation set, derived-hash registry, and driver flags.
//! The context is created per compilation and dropped when IR emission
//! completes — no process-wide registries.

use std::collections::HashSet;

use crate::syntax::ast::{ExtendDecl, FuncDecl};
use crate::tables::{
    ConstantTable, EnumTable, ExtensionTable, FunctionTable, GenericEnumTable,
    GenericExtensionTable, GenericFunctionTable, GenericStructTable, PerkImplementationTable,
    PerkTable, StructTable,
};
use crate::types::Type;

/// Generic types that ship with the compiler. `Result`, `Maybe`, and `Own`
/// are always on; collection types require a `use` statement before the
/// collector will seed their generic table entries.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    always_on: Vec<&'static str>,
    conditional: Vec<(&'static str, &'static str)>,
    active: HashSet<String>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        ProviderRegistry {
            always_on: vec!["Result", "Maybe", "Own"],
            conditional: vec![
                ("HashMap", "collections/hashmap"),
                ("List", "collections/list"),
            ],
            active: HashSet::new(),
        }
    }
}

impl ProviderRegistry {
    /// Activate providers for a stdlib unit path mentioned in a `use`.
    pub fn activate_for_unit(&mut self, unit_path: &str) {
        for (name, path) in &self.conditional {
            if unit_path == *path {
                self.active.insert((*name).to_string());
            }
        }
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.always_on.contains(&name) || self.active.contains(name)
    }

    pub fn is_always_on(&self, name: &str) -> bool {
        self.always_on.contains(&name)
    }
}

/// All symbol tables plus compilation-scoped flags. Logically mutated only
/// by the collector and monomorphizer; later passes read.
#[derive(Debug, Default)]
pub struct Context {
    pub constants: ConstantTable,
    pub structs: StructTable,
    pub generic_structs: GenericStructTable,
    pub enums: EnumTable,
    pub generic_enums: GenericEnumTable,
    pub funcs: FunctionTable,
    pub generic_funcs: GenericFunctionTable,
    pub extensions: ExtensionTable,
    pub generic_extensions: GenericExtensionTable,
    pub perks: PerkTable,
    pub perk_impls: PerkImplementationTable,

    pub providers: ProviderRegistry,

    /// True when `main` declares a `string[] args` parameter.
    pub main_expects_args: bool,

    /// Concrete extension methods produced from generic extensions, in
    /// monomorphization order. Emitted alongside user extensions.
    pub monomorphized_extensions: Vec<ExtendDecl>,

    /// Concrete function bodies produced from generic functions. Checked by
    /// the later passes and emitted alongside user functions.
    pub monomorphized_functions: Vec<FuncDecl>,

    /// Generic struct instantiations that were monomorphized, in discovery
    /// order. Drives generic-extension monomorphization.
    pub struct_instantiations: Vec<(String, Vec<Type>)>,

    /// Generic enum instantiations that were monomorphized. Lets method
    /// dispatch recover `T` from a concrete `Maybe<T>`/`Result<T, E>`.
    pub enum_instantiations: Vec<(String, Vec<Type>)>,

    /// Stdlib unit paths imported via `use <path>`, including implied
    /// parent units for directory imports.
    pub stdlib_units: Vec<String>,

    /// Canonical names of types with an auto-derived `.hash()` method,
    /// in registration order (structs, then enums, then arrays).
    derived_hash: Vec<String>,
    derived_hash_set: HashSet<String>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn add_stdlib_unit(&mut self, path: &str) {
        if !self.stdlib_units.iter().any(|u| u == path) {
            self.stdlib_units.push(path.to_string());
        }
        self.providers.activate_for_unit(path);
    }

    /// Directory imports make child units available: importing
    /// `collections` covers `collections/strings`.
    pub fn has_stdlib_unit(&self, unit_path: &str) -> bool {
        if self.stdlib_units.iter().any(|u| u == unit_path) {
            return true;
        }
        let parts: Vec<&str> = unit_path.split('/').collect();
        for i in 1..parts.len() {
            let parent = parts[..i].join("/");
            if self.stdlib_units.iter().any(|u| *u == parent) {
                return true;
            }
        }
        false
    }

    pub fn register_derived_hash(&mut self, type_name: &str) -> bool {
        if self.derived_hash_set.contains(type_name) {
            return false;
        }
        self.derived_hash_set.insert(type_name.to_string());
        self.derived_hash.push(type_name.to_string());
        true
    }

    pub fn has_derived_hash(&self, ty: &Type) -> bool {
        self.derived_hash_set.contains(&ty.to_string())
    }

    pub fn derived_hash_types(&self) -> impl Iterator<Item = &String> {
        self.derived_hash.iter()
    }

    /// Look up the declared field list of a concrete struct.
    pub fn struct_fields(&self, name: &str) -> Option<&[(String, Type)]> {
        self.structs.get(name).map(|s| s.fields.as_slice())
    }

    /// Recover the generic base and arguments behind a concrete monomorph
    /// name (`Maybe<i32>` → `("Maybe", [i32])`).
    pub fn generic_args_of(&self, concrete_name: &str) -> Option<(&str, &[Type])> {
        for (base, args) in self.struct_instantiations.iter().chain(&self.enum_instantiations) {
            if crate::types::monomorph_name(base, args) == concrete_name {
                return Some((base.as_str(), args.as_slice()));
            }
        }
        None
    }

    /// Resolve a type name against builtins, structs, and enums.
    pub fn resolve_type_name(&self, name: &str) -> Option<Type> {
        if let Some(kind) = crate::types::BuiltinKind::from_name(name) {
            return Some(Type::Builtin(kind));
        }
        if self.structs.contains(name) {
            return Some(Type::Struct(name.to_string()));
        }
        if self.enums.contains(name) {
            return Some(Type::Enum(name.to_string()));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_require_activation() {
        let mut ctx = Context::new();
        assert!(ctx.providers.is_available("Result"));
        assert!(ctx.providers.is_available("Own"));
        assert!(!ctx.providers.is_available("HashMap"));
        ctx.add_stdlib_unit("collections/hashmap");
        assert!(ctx.providers.is_available("HashMap"));
        assert!(!ctx.providers.is_available("List"));
    }

    #[test]
    fn directory_import_covers_children() {
        let mut ctx = Context::new();
        ctx.add_stdlib_unit("collections");
        assert!(ctx.has_stdlib_unit("collections/strings"));
        assert!(!ctx.has_stdlib_unit("io/stdio"));
    }

    #[test]
    fn derived_hash_registry_dedupes() {
        let mut ctx = Context::new();
        assert!(ctx.register_derived_hash("Point"));
        assert!(!ctx.register_derived_hash("Point"));
        assert!(ctx.has_derived_hash(&Type::Struct("Point".into())));
        assert!(!ctx.has_derived_hash(&Type::Struct("Size".into())));
    }
}
