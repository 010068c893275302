//! Symbol tables produced by collection and mutated by monomorphization.
//!
//! Every table pairs a name-keyed map with an insertion-order vector so that
//! iteration — and therefore diagnostics and emitted IR — is byte-stable
//! across runs. Later passes only read these tables.

use std::collections::{HashMap, HashSet};

use crate::report::Span;
use crate::syntax::ast::{Block, ExtendWithDecl, Expr, ParamDecl, PerkMethodSig, TypeParamDecl};
use crate::types::Type;

// ─── Ordered map ─────────────────────────────────────────────────────

/// Name-keyed map with deterministic insertion-order iteration.
#[derive(Debug, Clone)]
pub struct OrderedMap<V> {
    map: HashMap<String, V>,
    order: Vec<String>,
}

// Manual impl: the derive would demand `V: Default` for no reason.
impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        OrderedMap {
            map: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        OrderedMap {
            map: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Insert under `name`. Returns false (and leaves the table unchanged)
    /// if the name is already present — callers report the duplicate.
    pub fn insert(&mut self, name: &str, value: V) -> bool {
        if self.map.contains_key(name) {
            return false;
        }
        self.map.insert(name.to_string(), value);
        self.order.push(name.to_string());
        true
    }

    /// Insert or replace, keeping the original order slot on replacement.
    pub fn insert_or_replace(&mut self, name: &str, value: V) {
        if self.map.insert(name.to_string(), value).is_none() {
            self.order.push(name.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.map.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.map.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.order.iter().map(move |n| (n, &self.map[n]))
    }
}

// ─── Table entry types ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ConstSig {
    pub name: String,
    pub ty: Option<Type>,
    pub value: Expr,
    pub name_span: Span,
}

#[derive(Debug, Clone)]
pub struct StructInfo {
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct GenericStructInfo {
    pub name: String,
    pub type_params: Vec<TypeParamDecl>,
    pub fields: Vec<(String, Type)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub assoc: Vec<Type>,
}

#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub name: String,
    pub variants: Vec<EnumVariant>,
    pub span: Span,
}

impl EnumInfo {
    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct GenericEnumInfo {
    pub name: String,
    pub type_params: Vec<TypeParamDecl>,
    pub variants: Vec<EnumVariant>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FuncSig {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub ret: Option<Type>,
    /// Error type for the implicit `Result<T, E>` wrap; None = `StdError`.
    pub err_type: Option<Type>,
    pub is_public: bool,
    pub unit_name: Option<String>,
    pub name_span: Span,
    pub ret_span: Span,
}

#[derive(Debug, Clone)]
pub struct GenericFuncInfo {
    pub name: String,
    pub type_params: Vec<TypeParamDecl>,
    pub params: Vec<ParamDecl>,
    pub ret: Option<Type>,
    pub err_type: Option<Type>,
    pub is_public: bool,
    pub body: Block,
    pub name_span: Span,
    pub ret_span: Span,
}

#[derive(Debug, Clone)]
pub struct ExtensionMethod {
    pub target: Type,
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub ret: Option<Type>,
    pub body: Option<Block>,
    pub name_span: Span,
    pub ret_span: Span,
}

#[derive(Debug, Clone)]
pub struct GenericExtensionMethod {
    pub base: String,
    pub type_params: Vec<String>,
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub ret: Option<Type>,
    pub body: Option<Block>,
    pub name_span: Span,
    pub ret_span: Span,
}

#[derive(Debug, Clone)]
pub struct PerkInfo {
    pub name: String,
    pub methods: Vec<PerkMethodSig>,
    pub name_span: Span,
}

// ─── Tables ──────────────────────────────────────────────────────────

pub type ConstantTable = OrderedMap<ConstSig>;
pub type StructTable = OrderedMap<StructInfo>;
pub type GenericStructTable = OrderedMap<GenericStructInfo>;
pub type EnumTable = OrderedMap<EnumInfo>;
pub type GenericEnumTable = OrderedMap<GenericEnumInfo>;
pub type GenericFunctionTable = OrderedMap<GenericFuncInfo>;
pub type PerkTable = OrderedMap<PerkInfo>;

/// Concrete function signatures plus the stdlib side table registered from
/// `use <module>` statements.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    pub sigs: OrderedMap<FuncSig>,
    stdlib: HashSet<(String, String)>,
    stdlib_order: Vec<(String, String)>,
}

impl FunctionTable {
    pub fn new() -> Self {
        FunctionTable::default()
    }

    pub fn register_stdlib_function(&mut self, module_path: &str, name: &str) {
        let key = (module_path.to_string(), name.to_string());
        if self.stdlib.insert(key.clone()) {
            self.stdlib_order.push(key);
        }
    }

    pub fn is_stdlib_function(&self, module_path: &str, name: &str) -> bool {
        self.stdlib
            .contains(&(module_path.to_string(), name.to_string()))
    }

    /// Find a stdlib function by bare name across all imported modules.
    pub fn lookup_stdlib_by_name(&self, name: &str) -> Option<&(String, String)> {
        self.stdlib_order.iter().find(|(_, n)| n == name)
    }

    pub fn stdlib_functions(&self) -> impl Iterator<Item = &(String, String)> {
        self.stdlib_order.iter()
    }
}

/// Extension methods keyed by the canonical textual form of the target type.
#[derive(Debug, Clone, Default)]
pub struct ExtensionTable {
    by_type: HashMap<String, OrderedMap<ExtensionMethod>>,
    type_order: Vec<String>,
}

impl ExtensionTable {
    pub fn new() -> Self {
        ExtensionTable::default()
    }

    /// Add a method. Returns false if the (type, method) pair already exists.
    pub fn add_method(&mut self, method: ExtensionMethod) -> bool {
        let key = method.target.to_string();
        if !self.by_type.contains_key(&key) {
            self.type_order.push(key.clone());
            self.by_type.insert(key.clone(), OrderedMap::new());
        }
        let name = method.name.clone();
        self.by_type
            .get_mut(&key)
            .expect("entry just ensured")
            .insert(&name, method)
    }

    pub fn get_method(&self, target: &Type, name: &str) -> Option<&ExtensionMethod> {
        self.by_type.get(&target.to_string())?.get(name)
    }

    pub fn methods_for(&self, target: &Type) -> Option<&OrderedMap<ExtensionMethod>> {
        self.by_type.get(&target.to_string())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OrderedMap<ExtensionMethod>)> {
        self.type_order.iter().map(move |k| (k, &self.by_type[k]))
    }
}

/// Generic extension methods keyed by the base generic name (`HashMap`).
#[derive(Debug, Clone, Default)]
pub struct GenericExtensionTable {
    by_base: HashMap<String, OrderedMap<GenericExtensionMethod>>,
    base_order: Vec<String>,
}

impl GenericExtensionTable {
    pub fn new() -> Self {
        GenericExtensionTable::default()
    }

    pub fn add_method(&mut self, method: GenericExtensionMethod) -> bool {
        let key = method.base.clone();
        if !self.by_base.contains_key(&key) {
            self.base_order.push(key.clone());
            self.by_base.insert(key.clone(), OrderedMap::new());
        }
        let name = method.name.clone();
        self.by_base
            .get_mut(&key)
            .expect("entry just ensured")
            .insert(&name, method)
    }

    pub fn get_method(&self, base: &str, name: &str) -> Option<&GenericExtensionMethod> {
        self.by_base.get(base)?.get(name)
    }

    pub fn methods_for(&self, base: &str) -> Option<&OrderedMap<GenericExtensionMethod>> {
        self.by_base.get(base)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OrderedMap<GenericExtensionMethod>)> {
        self.base_order.iter().map(move |k| (k, &self.by_base[k]))
    }
}

/// A perk implementation. `Synthetic` marks auto-derived implementations for
/// primitives whose built-in methods already satisfy the perk.
#[derive(Debug, Clone)]
pub enum PerkImpl {
    Explicit(ExtendWithDecl),
    Synthetic,
}

/// `(type_name, perk_name)` → implementation, with reverse indexes.
#[derive(Debug, Clone, Default)]
pub struct PerkImplementationTable {
    implementations: HashMap<(String, String), PerkImpl>,
    order: Vec<(String, String)>,
    by_type: HashMap<String, Vec<String>>,
    by_perk: HashMap<String, Vec<String>>,
}

impl PerkImplementationTable {
    pub fn new() -> Self {
        PerkImplementationTable::default()
    }

    pub fn register(&mut self, type_name: &str, perk_name: &str, imp: PerkImpl) -> bool {
        let key = (type_name.to_string(), perk_name.to_string());
        if self.implementations.contains_key(&key) {
            return false;
        }
        self.implementations.insert(key.clone(), imp);
        self.order.push(key);
        self.by_type
            .entry(type_name.to_string())
            .or_default()
            .push(perk_name.to_string());
        self.by_perk
            .entry(perk_name.to_string())
            .or_default()
            .push(type_name.to_string());
        true
    }

    pub fn register_synthetic(&mut self, type_name: &str, perk_name: &str) -> bool {
        self.register(type_name, perk_name, PerkImpl::Synthetic)
    }

    pub fn implements(&self, type_name: &str, perk_name: &str) -> bool {
        self.implementations
            .contains_key(&(type_name.to_string(), perk_name.to_string()))
    }

    pub fn get(&self, type_name: &str, perk_name: &str) -> Option<&PerkImpl> {
        self.implementations
            .get(&(type_name.to_string(), perk_name.to_string()))
    }

    pub fn perks_of(&self, type_name: &str) -> &[String] {
        self.by_type
            .get(type_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Find a perk method implementation for a type, searching every perk
    /// the type implements in registration order.
    pub fn get_method(
        &self,
        type_name: &str,
        method_name: &str,
    ) -> Option<&crate::syntax::ast::FuncDecl> {
        for perk_name in self.perks_of(type_name) {
            if let Some(PerkImpl::Explicit(impl_decl)) =
                self.get(type_name, perk_name)
            {
                for method in &impl_decl.methods {
                    if method.name == method_name {
                        return Some(method);
                    }
                }
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &PerkImpl)> {
        self.order.iter().map(move |k| (k, &self.implementations[k]))
    }
}

// ─── Instantiation set ───────────────────────────────────────────────

/// Ordered set of `(base_name, type_args)` pairs, unique up to structural
/// equality of the argument tuple.
#[derive(Debug, Clone, Default)]
pub struct InstantiationSet {
    seen: HashSet<(String, Vec<Type>)>,
    order: Vec<(String, Vec<Type>)>,
}

impl InstantiationSet {
    pub fn new() -> Self {
        InstantiationSet::default()
    }

    /// Returns true if the instantiation was new.
    pub fn insert(&mut self, base: &str, args: Vec<Type>) -> bool {
        let key = (base.to_string(), args);
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.order.push(key);
        true
    }

    pub fn contains(&self, base: &str, args: &[Type]) -> bool {
        self.seen.contains(&(base.to_string(), args.to_vec()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Vec<Type>)> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn ordered_map_preserves_insertion_order() {
        let mut m: OrderedMap<u32> = OrderedMap::new();
        assert!(m.insert("b", 1));
        assert!(m.insert("a", 2));
        assert!(m.insert("c", 3));
        let names: Vec<&String> = m.names().collect();
        assert_eq!(names, ["b", "a", "c"]);
    }

    #[test]
    fn ordered_map_rejects_duplicates() {
        let mut m: OrderedMap<u32> = OrderedMap::new();
        assert!(m.insert("x", 1));
        assert!(!m.insert("x", 2));
        assert_eq!(m.get("x"), Some(&1));
    }

    #[test]
    fn instantiation_set_dedupes_structurally() {
        let mut set = InstantiationSet::new();
        assert!(set.insert("Maybe", vec![Type::i32()]));
        assert!(!set.insert("Maybe", vec![Type::i32()]));
        assert!(set.insert("Maybe", vec![Type::string()]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn perk_impl_reverse_indexes() {
        let mut t = PerkImplementationTable::new();
        assert!(t.register_synthetic("i32", "Hashable"));
        assert!(!t.register_synthetic("i32", "Hashable"));
        assert!(t.implements("i32", "Hashable"));
        assert!(!t.implements("i32", "Eq"));
        assert_eq!(t.perks_of("i32"), ["Hashable".to_string()]);
    }

    #[test]
    fn extension_table_keyed_by_canonical_type() {
        let mut t = ExtensionTable::new();
        let m = ExtensionMethod {
            target: Type::DynamicArray(Box::new(Type::i32())),
            name: "sum".into(),
            params: vec![],
            ret: Some(Type::i32()),
            body: None,
            name_span: crate::report::Span::builtin(),
            ret_span: crate::report::Span::builtin(),
        };
        assert!(t.add_method(m));
        let same_type = Type::DynamicArray(Box::new(Type::i32()));
        assert!(t.get_method(&same_type, "sum").is_some());
        assert!(t.get_method(&Type::i32(), "sum").is_none());
    }
}
