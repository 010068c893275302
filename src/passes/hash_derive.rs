//! Pass 1.8: hash derivation.
//!
//! Decides which aggregate types get an auto-derived `.hash() -> u64`
//! method, in dependency-safe order: structs first, then enums, then arrays.
//!
//! Hashability rules:
//! - primitives (ints, floats, bool, string) are always hashable;
//! - a struct is hashable iff every field is hashable;
//! - an enum is hashable iff every associated value in every variant is
//!   hashable; direct recursion without `Own<T>` indirection is an error
//!   reported with the path through the visited set;
//! - an array is hashable iff its element is hashable and is not itself an
//!   array (arrays of arrays are not allowed).

use std::collections::HashSet;

use crate::context::Context;
use crate::report::{Code, Reporter};
use crate::syntax::ast::{Block, ExtendDecl, FuncDecl, Program, Stmt};
use crate::types::{BuiltinKind, Type};

/// Outcome of a hashability query. `DirectRecursion` carries the cycle path
/// for the diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum Hashability {
    Hashable,
    Not(String),
    DirectRecursion(Vec<String>),
}

impl Hashability {
    pub fn is_hashable(&self) -> bool {
        matches!(self, Hashability::Hashable)
    }
}

pub fn primitive_is_hashable(kind: BuiltinKind) -> bool {
    kind.is_numeric() || matches!(kind, BuiltinKind::Bool | BuiltinKind::Str)
}

/// Can `ty` be hashed? Works for any fully-resolved type.
pub fn can_hash(ctx: &Context, ty: &Type) -> Hashability {
    can_hash_inner(ctx, ty, &mut HashSet::new(), &mut Vec::new())
}

fn can_hash_inner(
    ctx: &Context,
    ty: &Type,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Hashability {
    match ty {
        Type::Builtin(kind) => {
            if primitive_is_hashable(*kind) {
                Hashability::Hashable
            } else {
                Hashability::Not(format!("'{}' has no hash", kind.name()))
            }
        }
        Type::Struct(name) => can_hash_struct(ctx, name, visited, path),
        Type::Enum(name) => can_hash_enum(ctx, name, visited, path),
        Type::Array(elem, _) | Type::DynamicArray(elem) => can_hash_array(ctx, elem, visited, path),
        Type::Unknown(name) => Hashability::Not(format!("unresolved type '{}'", name)),
        other => Hashability::Not(format!("'{}' has no hash", other)),
    }
}

fn can_hash_struct(
    ctx: &Context,
    name: &str,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Hashability {
    if visited.contains(name) {
        let mut cycle = path.clone();
        cycle.push(name.to_string());
        return Hashability::Not(format!("recursive type: {}", cycle.join(" -> ")));
    }
    let Some(info) = ctx.structs.get(name) else {
        return Hashability::Not(format!("unknown struct '{}'", name));
    };
    visited.insert(name.to_string());
    path.push(name.to_string());
    let mut result = Hashability::Hashable;
    for (field_name, field_ty) in &info.fields {
        let nested = can_hash_inner(ctx, field_ty, &mut visited.clone(), &mut path.clone());
        if !nested.is_hashable() {
            result = Hashability::Not(format!("field '{}.{}' is not hashable", name, field_name));
            break;
        }
    }
    path.pop();
    visited.remove(name);
    result
}

fn can_hash_enum(
    ctx: &Context,
    name: &str,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Hashability {
    if visited.contains(name) {
        let mut cycle = path.clone();
        cycle.push(name.to_string());
        // A cycle that re-enters through enum associated data means the enum
        // contains itself by value: always an error, Own<T> would have
        // broken the chain at a Pointer.
        return Hashability::DirectRecursion(cycle);
    }
    let Some(info) = ctx.enums.get(name) else {
        return Hashability::Not(format!("unknown enum '{}'", name));
    };
    visited.insert(name.to_string());
    path.push(name.to_string());
    let mut result = Hashability::Hashable;
    'variants: for variant in &info.variants {
        for assoc in &variant.assoc {
            let nested = can_hash_inner(ctx, assoc, &mut visited.clone(), &mut path.clone());
            match nested {
                Hashability::Hashable => {}
                Hashability::DirectRecursion(cycle) => {
                    result = Hashability::DirectRecursion(cycle);
                    break 'variants;
                }
                Hashability::Not(_) => {
                    result = Hashability::Not(format!(
                        "variant '{}.{}' holds a non-hashable value",
                        name, variant.name
                    ));
                    break 'variants;
                }
            }
        }
    }
    path.pop();
    visited.remove(name);
    result
}

fn can_hash_array(
    ctx: &Context,
    elem: &Type,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Hashability {
    if matches!(elem, Type::Array(..) | Type::DynamicArray(_)) {
        return Hashability::Not("arrays of arrays cannot be hashed".to_string());
    }
    match can_hash_inner(ctx, elem, visited, path) {
        Hashability::Hashable => Hashability::Hashable,
        Hashability::DirectRecursion(cycle) => Hashability::DirectRecursion(cycle),
        Hashability::Not(reason) => Hashability::Not(format!("array element: {}", reason)),
    }
}

/// Register derived `.hash()` methods for every eligible table type.
/// Order matters: structs and enums are dependencies of the arrays that
/// contain them.
pub fn register_all_hashes(ctx: &mut Context, reporter: &mut Reporter, programs: &[Program]) {
    let struct_names: Vec<String> = ctx.structs.names().cloned().collect();
    for name in struct_names {
        if can_hash(ctx, &Type::Struct(name.clone())).is_hashable() {
            ctx.register_derived_hash(&name);
        }
    }

    let enum_names: Vec<String> = ctx.enums.names().cloned().collect();
    for name in enum_names {
        let span = ctx.enums.get(&name).map(|e| e.span);
        match can_hash(ctx, &Type::Enum(name.clone())) {
            Hashability::Hashable => {
                ctx.register_derived_hash(&name);
            }
            Hashability::DirectRecursion(cycle) => {
                // Only report on the cycle's own entry point, not on every
                // enum that merely contains the recursive one.
                if cycle.last().map(String::as_str) == Some(name.as_str()) {
                    reporter.error(
                        Code::CE2060,
                        span.unwrap_or_else(crate::report::Span::builtin),
                        format!(
                            "enum '{}' recursively contains itself without Own<T> indirection: {}",
                            name,
                            cycle.join(" -> ")
                        ),
                    );
                }
            }
            Hashability::Not(_) => {}
        }
    }

    // Arrays get their element-wise hash registered wherever a program can
    // name them: table fields and variants, plus every type annotation in
    // signatures, constants, and local declarations — user-written and
    // monomorphized alike. The checker only accepts `.hash()` on registered
    // arrays, so each accepted call has an emitted function behind it.
    let mut array_types: Vec<Type> = Vec::new();
    for (_, info) in ctx.structs.iter() {
        for (_, ty) in &info.fields {
            collect_arrays(ty, &mut array_types);
        }
    }
    for (_, info) in ctx.enums.iter() {
        for variant in &info.variants {
            for ty in &variant.assoc {
                collect_arrays(ty, &mut array_types);
            }
        }
    }
    for program in programs {
        collect_program_arrays(ctx, program, &mut array_types);
    }
    for func in &ctx.monomorphized_functions {
        collect_function_arrays(ctx, func, &mut array_types);
    }
    for ext in &ctx.monomorphized_extensions {
        collect_extension_arrays(ctx, ext, &mut array_types);
    }
    for array_ty in array_types {
        if can_hash(ctx, &array_ty).is_hashable() {
            ctx.register_derived_hash(&array_ty.to_string());
        }
    }
}

fn collect_arrays(ty: &Type, out: &mut Vec<Type>) {
    if matches!(ty, Type::Array(..) | Type::DynamicArray(_)) && !out.contains(ty) {
        out.push(ty.clone());
    }
}

/// AST annotations still spell user types as `Unknown`; resolve against the
/// tables before recording so registrations key on canonical names.
fn resolve_annotation(ctx: &Context, ty: &Type) -> Type {
    match ty {
        Type::Unknown(name) => ctx.resolve_type_name(name).unwrap_or_else(|| ty.clone()),
        Type::GenericRef { .. } => {
            let canonical = ty.to_string();
            if ctx.enums.contains(&canonical) {
                Type::Enum(canonical)
            } else if ctx.structs.contains(&canonical) {
                Type::Struct(canonical)
            } else {
                ty.clone()
            }
        }
        Type::Array(elem, size) => {
            Type::Array(Box::new(resolve_annotation(ctx, elem)), *size)
        }
        Type::DynamicArray(elem) => {
            Type::DynamicArray(Box::new(resolve_annotation(ctx, elem)))
        }
        Type::Reference(inner) => Type::Reference(Box::new(resolve_annotation(ctx, inner))),
        Type::Pointer(inner) => Type::Pointer(Box::new(resolve_annotation(ctx, inner))),
        other => other.clone(),
    }
}

fn record_annotation(ctx: &Context, ty: &Type, out: &mut Vec<Type>) {
    collect_arrays(&resolve_annotation(ctx, ty), out);
}

fn collect_program_arrays(ctx: &Context, program: &Program, out: &mut Vec<Type>) {
    for constant in &program.constants {
        if let Some(ty) = &constant.ty {
            record_annotation(ctx, ty, out);
        }
    }
    for func in &program.functions {
        if func.type_params.is_empty() {
            collect_function_arrays(ctx, func, out);
        }
    }
    for ext in &program.extensions {
        if !matches!(ext.target, Type::GenericRef { .. }) {
            collect_extension_arrays(ctx, ext, out);
        }
    }
    for perk_impl in &program.perk_impls {
        for method in &perk_impl.methods {
            collect_function_arrays(ctx, method, out);
        }
    }
}

fn collect_function_arrays(ctx: &Context, func: &FuncDecl, out: &mut Vec<Type>) {
    for param in &func.params {
        if let Some(ty) = &param.ty {
            record_annotation(ctx, ty, out);
        }
    }
    if let Some(ret) = &func.ret {
        record_annotation(ctx, ret, out);
    }
    collect_block_arrays(ctx, &func.body, out);
}

fn collect_extension_arrays(ctx: &Context, ext: &ExtendDecl, out: &mut Vec<Type>) {
    record_annotation(ctx, &ext.target, out);
    for param in &ext.params {
        if let Some(ty) = &param.ty {
            record_annotation(ctx, ty, out);
        }
    }
    if let Some(ret) = &ext.ret {
        record_annotation(ctx, ret, out);
    }
    collect_block_arrays(ctx, &ext.body, out);
}

fn collect_block_arrays(ctx: &Context, block: &Block, out: &mut Vec<Type>) {
    for stmt in &block.stmts {
        match stmt {
            Stmt::Let { ty: Some(ty), .. } => record_annotation(ctx, ty, out),
            Stmt::If {
                then_block,
                elifs,
                else_block,
                ..
            } => {
                collect_block_arrays(ctx, then_block, out);
                for (_, b) in elifs {
                    collect_block_arrays(ctx, b, out);
                }
                if let Some(b) = else_block {
                    collect_block_arrays(ctx, b, out);
                }
            }
            Stmt::While { body, .. } | Stmt::For { body, .. } => {
                collect_block_arrays(ctx, body, out);
            }
            Stmt::Match { arms, .. } => {
                for arm in arms {
                    collect_block_arrays(ctx, &arm.body, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "hash_derive_tests.rs"]
mod tests;
