//! Pass 1.5: generic instantiation discovery.
//!
//! Walks every expression, statement, field type, signature, and constant
//! initializer, collecting the set of `(generic_name, type_args)` pairs that
//! the program actually reaches — both type instantiations (`Maybe<i32>`)
//! and generic function instantiations (`id<i32>`).
//!
//! Only as much local type inference runs as an instantiation point needs:
//! integer literals are `i32`, floats `f64`, strings `string`, and variable
//! references use their declared annotated type when known. Recursive walks
//! guard against cycles with a visited-type set so self-referential types
//! like `enum Expr { Add(Own<Expr>) }` terminate.

use std::collections::{HashMap, HashSet};

use crate::context::Context;
use crate::syntax::ast::{Block, Expr, FuncDecl, Program, Stmt};
use crate::tables::InstantiationSet;
use crate::types::Type;

pub struct InstantiationScanner<'a> {
    ctx: &'a Context,
    type_insts: InstantiationSet,
    func_insts: InstantiationSet,
    /// Explicitly annotated variables in the current function.
    variable_types: HashMap<String, Type>,
    /// Named types already expanded while chasing nested mentions.
    visited_types: HashSet<String>,
}

impl<'a> InstantiationScanner<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        InstantiationScanner {
            ctx,
            type_insts: InstantiationSet::new(),
            func_insts: InstantiationSet::new(),
            variable_types: HashMap::new(),
            visited_types: HashSet::new(),
        }
    }

    /// Scan every unit; returns `(type_instantiations, func_instantiations)`.
    pub fn run_all(mut self, programs: &[Program]) -> (InstantiationSet, InstantiationSet) {
        for program in programs {
            for constant in &program.constants {
                if let Some(ty) = &constant.ty {
                    self.record_type(ty);
                }
                self.scan_expr(&constant.value);
            }
            for decl in &program.structs {
                if !decl.type_params.is_empty() {
                    continue; // templates are scanned when instantiated
                }
                for field in &decl.fields {
                    self.record_type(&field.ty);
                }
            }
            for decl in &program.enums {
                if !decl.type_params.is_empty() {
                    continue;
                }
                for variant in &decl.variants {
                    for ty in &variant.assoc_types {
                        self.record_type(ty);
                    }
                }
            }
            for func in &program.functions {
                if !func.type_params.is_empty() {
                    continue; // generic bodies are scanned per-instantiation
                }
                self.scan_function(func);
            }
            for ext in &program.extensions {
                if matches!(ext.target, Type::GenericRef { .. }) {
                    continue;
                }
                self.record_type(&ext.target);
                for param in &ext.params {
                    if let Some(ty) = &param.ty {
                        self.record_type(ty);
                    }
                }
                if let Some(ret) = &ext.ret {
                    self.record_type(ret);
                }
                self.scan_block_fresh(&ext.body, &ext.params);
            }
            for perk_impl in &program.perk_impls {
                for method in &perk_impl.methods {
                    self.scan_function(method);
                }
            }
        }
        (self.type_insts, self.func_insts)
    }

    fn scan_function(&mut self, func: &FuncDecl) {
        for param in &func.params {
            if let Some(ty) = &param.ty {
                self.record_type(ty);
            }
        }
        if let Some(ret) = &func.ret {
            self.record_type(ret);
        }
        if let Some(err) = &func.err_type {
            self.record_type(err);
        }
        self.scan_block_fresh(&func.body, &func.params);
    }

    fn scan_block_fresh(&mut self, block: &Block, params: &[crate::syntax::ast::ParamDecl]) {
        self.variable_types.clear();
        for param in params {
            if let Some(ty) = &param.ty {
                self.variable_types.insert(param.name.clone(), ty.clone());
            }
        }
        self.scan_block(block);
    }

    fn scan_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.scan_stmt(stmt);
        }
    }

    fn scan_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let { name, ty, init, .. } => {
                if let Some(ty) = ty {
                    self.record_type(ty);
                    self.variable_types.insert(name.clone(), ty.clone());
                } else if let Some(init) = init {
                    if let Some(inferred) = self.infer_expr(init) {
                        self.variable_types.insert(name.clone(), inferred);
                    }
                }
                if let Some(init) = init {
                    self.scan_expr(init);
                }
            }
            Stmt::Assign { target, value, .. } => {
                self.scan_expr(target);
                self.scan_expr(value);
            }
            Stmt::Expr(expr) => self.scan_expr(expr),
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.scan_expr(value);
                }
            }
            Stmt::If {
                cond,
                then_block,
                elifs,
                else_block,
                ..
            } => {
                self.scan_expr(cond);
                self.scan_block(then_block);
                for (c, b) in elifs {
                    self.scan_expr(c);
                    self.scan_block(b);
                }
                if let Some(b) = else_block {
                    self.scan_block(b);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.scan_expr(cond);
                self.scan_block(body);
            }
            Stmt::For { iterable, body, .. } => {
                self.scan_expr(iterable);
                self.scan_block(body);
            }
            Stmt::Match {
                scrutinee, arms, ..
            } => {
                self.scan_expr(scrutinee);
                for arm in arms {
                    self.scan_block(&arm.body);
                }
            }
            Stmt::Break(_) | Stmt::Continue(_) => {}
        }
    }

    fn scan_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name { type_args, id, .. } => {
                if !type_args.is_empty() {
                    let args: Vec<Type> = type_args.iter().map(|t| self.resolve(t)).collect();
                    self.record_instantiation(id, args);
                }
            }
            Expr::Call {
                callee,
                type_args,
                args,
                ..
            } => {
                for arg in args {
                    self.scan_expr(arg);
                }
                if self.ctx.generic_funcs.contains(callee) {
                    let resolved = if type_args.is_empty() {
                        self.infer_call_type_args(callee, args)
                    } else {
                        Some(type_args.iter().map(|t| self.resolve(t)).collect())
                    };
                    if let Some(resolved) = resolved {
                        self.func_insts.insert(callee, resolved);
                    }
                } else if self.ctx.generic_structs.contains(callee) && !type_args.is_empty() {
                    let args: Vec<Type> = type_args.iter().map(|t| self.resolve(t)).collect();
                    self.record_instantiation(callee, args);
                }
            }
            Expr::MethodCall { recv, args, .. } => {
                self.scan_expr(recv);
                for arg in args {
                    self.scan_expr(arg);
                }
            }
            Expr::StructLit {
                name,
                type_args,
                fields,
                ..
            } => {
                for field in fields {
                    self.scan_expr(field);
                }
                if !type_args.is_empty() {
                    let args: Vec<Type> = type_args.iter().map(|t| self.resolve(t)).collect();
                    self.record_instantiation(name, args);
                }
            }
            Expr::Unary { expr, .. }
            | Expr::Try { expr, .. }
            | Expr::TryFallback { expr, .. }
            | Expr::Reference { expr, .. } => self.scan_expr(expr),
            Expr::Binary { lhs, rhs, .. } => {
                self.scan_expr(lhs);
                self.scan_expr(rhs);
            }
            Expr::Field { recv, .. } => self.scan_expr(recv),
            Expr::Index { recv, index, .. } => {
                self.scan_expr(recv);
                self.scan_expr(index);
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
                ..
            } => {
                self.scan_expr(cond);
                self.scan_expr(then_expr);
                self.scan_expr(else_expr);
            }
            Expr::ArrayLit { elems, .. } => {
                for elem in elems {
                    self.scan_expr(elem);
                }
            }
            _ => {}
        }
    }

    /// Literal-level inference, just enough to resolve instantiation points.
    fn infer_expr(&self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::IntLit { .. } => Some(Type::i32()),
            Expr::FloatLit { .. } => Some(Type::f64()),
            Expr::BoolLit { .. } => Some(Type::bool()),
            Expr::StrLit { .. } => Some(Type::string()),
            Expr::Name { id, type_args, .. } if type_args.is_empty() => {
                self.variable_types.get(id).cloned()
            }
            Expr::StructLit { name, type_args, .. } => {
                if type_args.is_empty() {
                    Some(Type::Struct(name.clone()))
                } else {
                    Some(Type::GenericRef {
                        base: name.clone(),
                        args: type_args.iter().map(|t| self.resolve(t)).collect(),
                    })
                }
            }
            _ => None,
        }
    }

    /// Deduce a generic function's type arguments from its call arguments by
    /// unifying parameter types against inferred argument types.
    fn infer_call_type_args(&self, callee: &str, args: &[Expr]) -> Option<Vec<Type>> {
        let generic = self.ctx.generic_funcs.get(callee)?;
        let mut subst: HashMap<String, Type> = HashMap::new();
        for (param, arg) in generic.params.iter().zip(args) {
            let (Some(param_ty), Some(arg_ty)) = (param.ty.as_ref(), self.infer_expr(arg)) else {
                continue;
            };
            unify(param_ty, &self.resolve(&arg_ty), &mut subst);
        }
        let mut resolved = Vec::new();
        for tp in &generic.type_params {
            resolved.push(subst.get(&tp.name)?.clone());
        }
        Some(resolved)
    }

    /// Resolve `Unknown` names against the collected tables, recursively.
    fn resolve(&self, ty: &Type) -> Type {
        match ty {
            Type::Unknown(name) => self
                .ctx
                .resolve_type_name(name)
                .unwrap_or_else(|| ty.clone()),
            Type::Array(elem, size) => Type::Array(Box::new(self.resolve(elem)), *size),
            Type::DynamicArray(elem) => Type::DynamicArray(Box::new(self.resolve(elem))),
            Type::Reference(inner) => Type::Reference(Box::new(self.resolve(inner))),
            Type::Pointer(inner) => Type::Pointer(Box::new(self.resolve(inner))),
            Type::Iterator(inner) => Type::Iterator(Box::new(self.resolve(inner))),
            Type::GenericRef { base, args } => Type::GenericRef {
                base: base.clone(),
                args: args.iter().map(|a| self.resolve(a)).collect(),
            },
            Type::Result(ok, err) => Type::Result(
                Box::new(self.resolve(ok)),
                Box::new(self.resolve(err)),
            ),
            other => other.clone(),
        }
    }

    /// Record every generic mention inside `ty`, then chase nested named
    /// types so fields of fields are covered. The visited set breaks cycles.
    fn record_type(&mut self, ty: &Type) {
        let resolved = self.resolve(ty);
        self.record_resolved(&resolved);
    }

    fn record_resolved(&mut self, ty: &Type) {
        match ty {
            Type::GenericRef { base, args } => {
                for arg in args {
                    self.record_resolved(arg);
                }
                self.record_instantiation(base, args.clone());
            }
            Type::Result(ok, err) => {
                self.record_resolved(ok);
                self.record_resolved(err);
                self.record_instantiation("Result", vec![(**ok).clone(), (**err).clone()]);
            }
            Type::Array(elem, _)
            | Type::DynamicArray(elem)
            | Type::Reference(elem)
            | Type::Pointer(elem)
            | Type::Iterator(elem) => self.record_resolved(elem),
            Type::Struct(name) | Type::Enum(name) => {
                if !self.visited_types.insert(name.clone()) {
                    return;
                }
                if let Some(info) = self.ctx.structs.get(name) {
                    let fields = info.fields.clone();
                    for (_, field_ty) in &fields {
                        self.record_type(field_ty);
                    }
                } else if let Some(info) = self.ctx.enums.get(name) {
                    let variants = info.variants.clone();
                    for variant in &variants {
                        for assoc in &variant.assoc {
                            self.record_type(assoc);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn record_instantiation(&mut self, base: &str, args: Vec<Type>) {
        let known = self.ctx.generic_structs.contains(base)
            || self.ctx.generic_enums.contains(base);
        if !known {
            return;
        }
        // Template-internal mentions (args still containing parameters) are
        // handled during monomorphization, not here.
        if args.iter().any(|a| matches!(a, Type::TypeParameter(_))) {
            return;
        }
        self.type_insts.insert(base, args);
    }
}

/// Structural unification of a (possibly parameterized) type against a
/// concrete one, extending `subst` with type-parameter bindings.
fn unify(param: &Type, arg: &Type, subst: &mut HashMap<String, Type>) {
    match (param, arg) {
        (Type::TypeParameter(name), concrete) => {
            subst.entry(name.clone()).or_insert_with(|| concrete.clone());
        }
        (Type::Array(p, _), Type::Array(a, _))
        | (Type::DynamicArray(p), Type::DynamicArray(a))
        | (Type::Reference(p), Type::Reference(a))
        | (Type::Pointer(p), Type::Pointer(a)) => unify(p, a, subst),
        (
            Type::GenericRef { base: pb, args: pa },
            Type::GenericRef { base: ab, args: aa },
        ) if pb == ab => {
            for (p, a) in pa.iter().zip(aa) {
                unify(p, a, subst);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "instantiate_tests.rs"]
mod tests;
