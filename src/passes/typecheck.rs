//! Pass 2: type checking.
//!
//! Infers expression types, enforces operand compatibility, and dispatches
//! method calls through the fixed priority order:
//! enum constructors → struct constructors → intrinsic stream/file methods →
//! `Result`/`Maybe`/`Own`/`HashMap`/`List` methods → array/string methods →
//! perk methods → auto-derived hash → primitive methods → user extensions.
//!
//! Result-wrapping policy lives here too: a function declared to return `T`
//! is internally re-typed to `Result<T, E>` with `E` defaulting to
//! `StdError` or the `| ErrorType` sugar. Calls therefore have Result type;
//! `?`, `??`, `.realise(default)`, and boolean use in `if` unwrap them.

use std::collections::HashMap;

use crate::context::Context;
use crate::passes::hash_derive::{can_hash, primitive_is_hashable};
use crate::report::{Code, Reporter, Span};
use crate::syntax::ast::{
    BinaryOp, Block, Expr, ExtendDecl, FuncDecl, Program, Stmt, UnaryOp,
};
use crate::types::{monomorph_name, BuiltinKind, Type};

pub struct TypeChecker<'a> {
    ctx: &'a Context,
    reporter: &'a mut Reporter,
    vars: Vec<HashMap<String, Type>>,
    /// Declared (pre-wrap) return type of the enclosing function.
    current_ret: Option<Type>,
    /// Error half of the enclosing function's implicit Result wrap.
    current_err: Type,
}

impl<'a> TypeChecker<'a> {
    pub fn new(ctx: &'a Context, reporter: &'a mut Reporter) -> Self {
        TypeChecker {
            ctx,
            reporter,
            vars: Vec::new(),
            current_ret: None,
            current_err: Type::Enum("StdError".to_string()),
        }
    }

    pub fn run(&mut self, program: &Program) {
        for constant in &program.constants {
            if let (Some(declared), Some(found)) = (
                constant.ty.as_ref().map(|t| self.resolve(t, constant.name_span)),
                self.infer_expr_readonly(&constant.value),
            ) {
                self.require_compatible(&declared, &found, constant.value.span());
            }
        }
        for func in &program.functions {
            if func.type_params.is_empty() {
                self.check_function(func);
            }
        }
        for ext in &program.extensions {
            if !matches!(ext.target, Type::GenericRef { .. }) {
                self.check_extension(ext);
            }
        }
        for perk_impl in &program.perk_impls {
            for method in &perk_impl.methods {
                self.check_method_with_self(method, &perk_impl.target);
            }
        }
    }

    pub fn check_function(&mut self, func: &FuncDecl) {
        self.current_ret = func.ret.as_ref().map(|t| self.resolve(t, func.ret_span));
        self.current_err = func
            .err_type
            .as_ref()
            .map(|t| self.resolve(t, func.ret_span))
            .unwrap_or_else(|| Type::Enum("StdError".to_string()));
        self.vars = vec![HashMap::new()];
        for param in &func.params {
            if let Some(ty) = &param.ty {
                let resolved = self.resolve(ty, param.type_span);
                self.declare(&param.name, resolved);
            }
        }
        self.check_block(&func.body);
    }

    pub fn check_extension(&mut self, ext: &ExtendDecl) {
        self.current_ret = ext.ret.as_ref().map(|t| self.resolve(t, ext.ret_span));
        self.current_err = Type::Enum("StdError".to_string());
        self.vars = vec![HashMap::new()];
        let target = self.resolve(&ext.target, ext.target_span);
        self.declare("self", target);
        for param in &ext.params {
            if let Some(ty) = &param.ty {
                let resolved = self.resolve(ty, param.type_span);
                self.declare(&param.name, resolved);
            }
        }
        self.check_block(&ext.body);
    }

    fn check_method_with_self(&mut self, method: &FuncDecl, target: &Type) {
        self.current_ret = method.ret.as_ref().map(|t| self.resolve(t, method.ret_span));
        self.current_err = Type::Enum("StdError".to_string());
        self.vars = vec![HashMap::new()];
        let target = self.resolve(target, method.name_span);
        self.declare("self", target);
        for param in &method.params {
            if let Some(ty) = &param.ty {
                let resolved = self.resolve(ty, param.type_span);
                self.declare(&param.name, resolved);
            }
        }
        self.check_block(&method.body);
    }

    // ─── Environment ────────────────────────────────────────────────

    fn declare(&mut self, name: &str, ty: Type) {
        if let Some(scope) = self.vars.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Type> {
        self.vars.iter().rev().find_map(|s| s.get(name))
    }

    /// Resolve annotation types to concrete table entries. Unresolvable
    /// names report CE2003 once, at the annotation's span.
    fn resolve(&mut self, ty: &Type, span: Span) -> Type {
        match ty {
            Type::Unknown(name) => match self.ctx.resolve_type_name(name) {
                Some(resolved) => resolved,
                None => {
                    self.reporter.error(
                        Code::CE2003,
                        span,
                        format!("unknown type '{}'", name),
                    );
                    ty.clone()
                }
            },
            Type::GenericRef { .. } => {
                let canonical = ty.to_string();
                if self.ctx.enums.contains(&canonical) {
                    Type::Enum(canonical)
                } else if self.ctx.structs.contains(&canonical) {
                    Type::Struct(canonical)
                } else {
                    self.reporter.error(
                        Code::CE2003,
                        span,
                        format!("unknown type '{}'", canonical),
                    );
                    ty.clone()
                }
            }
            Type::Result(ok, err) => {
                let ok = self.resolve(ok, span);
                let err = self.resolve(err, span);
                let canonical = monomorph_name("Result", &[ok.clone(), err.clone()]);
                if self.ctx.enums.contains(&canonical) {
                    Type::Enum(canonical)
                } else {
                    Type::Result(Box::new(ok), Box::new(err))
                }
            }
            Type::Array(elem, size) => Type::Array(Box::new(self.resolve(elem, span)), *size),
            Type::DynamicArray(elem) => Type::DynamicArray(Box::new(self.resolve(elem, span))),
            Type::Reference(inner) => Type::Reference(Box::new(self.resolve(inner, span))),
            Type::Pointer(inner) => Type::Pointer(Box::new(self.resolve(inner, span))),
            other => other.clone(),
        }
    }

    // ─── Compatibility ──────────────────────────────────────────────

    /// Integer widths intermix (codegen casts); everything else matches
    /// structurally.
    fn compatible(&self, expected: &Type, found: &Type) -> bool {
        if expected == found {
            return true;
        }
        if expected.is_integer() && found.is_integer() {
            return true;
        }
        if let (Type::Builtin(a), Type::Builtin(b)) = (expected, found) {
            if a.is_float() && b.is_float() {
                return true;
            }
            // Integer literals flow into float contexts.
            if a.is_float() && b.is_integer() {
                return true;
            }
        }
        if let (Type::DynamicArray(a), Type::DynamicArray(b)) = (expected, found) {
            return self.compatible(a, b);
        }
        if let (Type::Reference(a), Type::Reference(b)) = (expected, found) {
            return self.compatible(a, b);
        }
        // Unresolved types already produced a diagnostic; don't cascade.
        matches!(expected, Type::Unknown(_)) || matches!(found, Type::Unknown(_))
    }

    fn require_compatible(&mut self, expected: &Type, found: &Type, span: Span) {
        if !self.compatible(expected, found) {
            self.reporter.error(
                Code::CE2001,
                span,
                format!("type mismatch: expected '{}', found '{}'", expected, found),
            );
        }
    }

    /// Ok half of a Result-typed value (`Result<T, E>` enum or sugar).
    fn result_ok_type(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Result(ok, _) => Some((**ok).clone()),
            Type::Enum(name) if name.starts_with("Result<") => {
                let info = self.ctx.enums.get(name)?;
                info.variants.first()?.assoc.first().cloned()
            }
            _ => None,
        }
    }

    fn result_err_type(&self, ty: &Type) -> Option<Type> {
        match ty {
            Type::Result(_, err) => Some((**err).clone()),
            Type::Enum(name) if name.starts_with("Result<") => {
                let info = self.ctx.enums.get(name)?;
                info.variants.get(1)?.assoc.first().cloned()
            }
            _ => None,
        }
    }

    /// The concrete Result type a call to `sig` produces.
    fn wrap_of(&mut self, ret: Option<&Type>, err: Option<&Type>, span: Span) -> Option<Type> {
        let ret = ret?;
        let ret = self.resolve(ret, span);
        if ret.is_result() {
            return Some(ret);
        }
        let err = err
            .map(|t| self.resolve(t, span))
            .unwrap_or_else(|| Type::Enum("StdError".to_string()));
        let canonical = monomorph_name("Result", &[ret, err]);
        Some(Type::Enum(canonical))
    }

    // ─── Statements ─────────────────────────────────────────────────

    fn check_block(&mut self, block: &Block) {
        self.vars.push(HashMap::new());
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.vars.pop();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let {
                name,
                ty,
                init,
                name_span,
                ..
            } => {
                let declared = ty.as_ref().map(|t| self.resolve(t, *name_span));
                let found = init.as_ref().and_then(|e| self.infer_expr(e));
                match (&declared, &found) {
                    (Some(d), Some(f)) => {
                        // Direct assignment of a same-Ok Result unwraps via
                        // truthiness elsewhere; here the types must line up.
                        self.require_compatible(d, f, init.as_ref().map(|e| e.span()).unwrap_or(*name_span));
                    }
                    _ => {}
                }
                if let Some(d) = declared {
                    self.declare(name, d);
                } else if let Some(f) = found {
                    self.declare(name, f);
                }
            }
            Stmt::Assign { target, value, .. } => {
                let target_ty = self.infer_expr(target);
                let value_ty = self.infer_expr(value);
                if let (Some(t), Some(v)) = (target_ty, value_ty) {
                    self.require_compatible(&t, &v, value.span());
                }
            }
            Stmt::Expr(expr) => {
                self.infer_expr(expr);
            }
            Stmt::Return { value, span } => {
                let found = value.as_ref().and_then(|e| self.infer_expr(e));
                match (&self.current_ret.clone(), found) {
                    (Some(expected), Some(found)) => {
                        if self.compatible(expected, &found) {
                            return;
                        }
                        // Pass-through: returning an already-wrapped Result
                        // whose Ok half matches the declared return.
                        if let Some(ok) = self.result_ok_type(&found) {
                            if self.compatible(expected, &ok) {
                                return;
                            }
                        }
                        // Ok-wrapping: a declared `Result<T, E>` return
                        // accepts a bare `T`.
                        if let Some(ok) = self.result_ok_type(expected) {
                            if self.compatible(&ok, &found) {
                                return;
                            }
                        }
                        self.reporter.error(
                            Code::CE2014,
                            *span,
                            format!(
                                "return type mismatch: expected '{}', found '{}'",
                                expected, found
                            ),
                        );
                    }
                    (Some(expected), None) if !expected.is_blank() => {
                        if value.is_none() {
                            self.reporter.error(
                                Code::CE2014,
                                *span,
                                format!(
                                    "return type mismatch: expected '{}', found '{}'",
                                    expected,
                                    Type::Builtin(BuiltinKind::Blank)
                                ),
                            );
                        }
                    }
                    _ => {}
                }
            }
            Stmt::If {
                cond,
                then_block,
                elifs,
                else_block,
                ..
            } => {
                self.check_condition(cond);
                self.check_block(then_block);
                for (c, b) in elifs {
                    self.check_condition(c);
                    self.check_block(b);
                }
                if let Some(b) = else_block {
                    self.check_block(b);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.check_condition(cond);
                self.check_block(body);
            }
            Stmt::For {
                var,
                iterable,
                body,
                var_span,
                ..
            } => {
                let elem = match self.infer_expr(iterable) {
                    Some(Type::DynamicArray(elem)) | Some(Type::Array(elem, _)) => Some(*elem),
                    Some(other) => {
                        self.reporter.error(
                            Code::CE2011,
                            iterable.span(),
                            format!("cannot index '{}'", other),
                        );
                        None
                    }
                    None => None,
                };
                self.vars.push(HashMap::new());
                if let Some(elem) = elem {
                    self.declare(var, elem);
                } else {
                    let _ = var_span;
                }
                for stmt in &body.stmts {
                    self.check_stmt(stmt);
                }
                self.vars.pop();
            }
            Stmt::Match {
                scrutinee, arms, ..
            } => {
                let enum_name = match self.infer_expr(scrutinee) {
                    Some(Type::Enum(name)) => Some(name),
                    Some(other) => {
                        self.reporter.error(
                            Code::CE2001,
                            scrutinee.span(),
                            format!("type mismatch: expected 'an enum', found '{}'", other),
                        );
                        None
                    }
                    None => None,
                };
                for arm in arms {
                    self.vars.push(HashMap::new());
                    if let Some(enum_name) = &enum_name {
                        if let Some(info) = self.ctx.enums.get(enum_name) {
                            match info.variant_index(&arm.variant) {
                                Some(idx) => {
                                    let assoc = info.variants[idx].assoc.clone();
                                    if assoc.len() != arm.bindings.len() {
                                        self.reporter.error(
                                            Code::CE2009,
                                            arm.span,
                                            format!(
                                                "'{}.{}' expects {} argument(s), got {}",
                                                enum_name,
                                                arm.variant,
                                                assoc.len(),
                                                arm.bindings.len()
                                            ),
                                        );
                                    }
                                    for (binding, ty) in arm.bindings.iter().zip(assoc) {
                                        self.declare(binding, ty);
                                    }
                                }
                                None => {
                                    self.reporter.error(
                                        Code::CE2012,
                                        arm.span,
                                        format!(
                                            "enum '{}' has no variant '{}'",
                                            enum_name, arm.variant
                                        ),
                                    );
                                }
                            }
                        }
                    }
                    for stmt in &arm.body.stmts {
                        self.check_stmt(stmt);
                    }
                    self.vars.pop();
                }
            }
            Stmt::Break(_) | Stmt::Continue(_) => {}
        }
    }

    fn check_condition(&mut self, cond: &Expr) {
        if let Some(ty) = self.infer_expr(cond) {
            if !ty.is_bool() && !ty.is_result() {
                self.reporter.error(
                    Code::CE2005,
                    cond.span(),
                    format!("condition must be 'bool' or a Result, found '{}'", ty),
                );
            }
        }
    }

    // ─── Expressions ────────────────────────────────────────────────

    /// Read-only inference for constant initializers (no new scopes).
    fn infer_expr_readonly(&mut self, expr: &Expr) -> Option<Type> {
        self.infer_expr(expr)
    }

    pub fn infer_expr(&mut self, expr: &Expr) -> Option<Type> {
        match expr {
            Expr::IntLit { .. } => Some(Type::i32()),
            Expr::FloatLit { .. } => Some(Type::f64()),
            Expr::BoolLit { .. } => Some(Type::bool()),
            Expr::StrLit { .. } => Some(Type::string()),
            Expr::ArrayLit { elems, span } => {
                let first = elems.first().and_then(|e| self.infer_expr(e))?;
                for elem in &elems[1..] {
                    if let Some(t) = self.infer_expr(elem) {
                        self.require_compatible(&first, &t, elem.span());
                    }
                }
                let _ = span;
                Some(Type::DynamicArray(Box::new(first)))
            }
            Expr::Name { id, type_args, .. } => {
                if !type_args.is_empty() {
                    return None; // only meaningful as a ctor receiver
                }
                if let Some(ty) = self.lookup(id) {
                    return Some(ty.clone());
                }
                if let Some(kind) = stream_kind(id) {
                    return Some(Type::Builtin(kind));
                }
                if let Some(constant) = self.ctx.constants.get(id) {
                    let ty = constant.ty.clone()?;
                    let span = constant.name_span;
                    return Some(self.resolve(&ty, span));
                }
                None // undeclared: already reported by scope analysis
            }
            Expr::Unary { op, expr, span } => {
                let ty = self.infer_expr(expr)?;
                match op {
                    UnaryOp::Neg if ty.is_numeric() => Some(ty),
                    UnaryOp::Not if ty.is_bool() => Some(ty),
                    _ => {
                        self.reporter.error(
                            Code::CE2002,
                            *span,
                            format!(
                                "operator '{}' cannot be applied to '{}' and '{}'",
                                if *op == UnaryOp::Neg { "-" } else { "not" },
                                ty,
                                ty
                            ),
                        );
                        None
                    }
                }
            }
            Expr::Binary {
                op,
                lhs,
                rhs,
                span,
            } => self.infer_binary(*op, lhs, rhs, *span),
            Expr::Call {
                callee,
                type_args,
                args,
                span,
            } => self.infer_call(callee, type_args, args, *span),
            Expr::MethodCall {
                recv,
                method,
                args,
                span,
            } => self.infer_method_call(recv, method, args, *span),
            Expr::Field { recv, field, span } => self.infer_field(recv, field, *span),
            Expr::Index { recv, index, span } => {
                let recv_ty = self.infer_expr(recv)?;
                if let Some(index_ty) = self.infer_expr(index) {
                    if !index_ty.is_integer() {
                        self.require_compatible(&Type::i32(), &index_ty, index.span());
                    }
                }
                match recv_ty {
                    Type::DynamicArray(elem) | Type::Array(elem, _) => Some(*elem),
                    other => {
                        self.reporter.error(
                            Code::CE2011,
                            *span,
                            format!("cannot index '{}'", other),
                        );
                        None
                    }
                }
            }
            Expr::StructLit {
                name,
                type_args,
                fields,
                span,
            } => {
                let concrete_name = if type_args.is_empty() {
                    name.clone()
                } else {
                    let args: Vec<Type> = type_args
                        .iter()
                        .map(|t| self.resolve(t, *span))
                        .collect();
                    monomorph_name(name, &args)
                };
                let Some(info) = self.ctx.structs.get(&concrete_name) else {
                    self.reporter.error(
                        Code::CE2003,
                        *span,
                        format!("unknown type '{}'", concrete_name),
                    );
                    return None;
                };
                let expected: Vec<(String, Type)> = info.fields.clone();
                if expected.len() != fields.len() {
                    self.reporter.error(
                        Code::CE2009,
                        *span,
                        format!(
                            "'{}' expects {} argument(s), got {}",
                            concrete_name,
                            expected.len(),
                            fields.len()
                        ),
                    );
                }
                for ((_, field_ty), value) in expected.iter().zip(fields) {
                    if let Some(found) = self.infer_expr(value) {
                        self.require_compatible(field_ty, &found, value.span());
                    }
                }
                Some(Type::Struct(concrete_name))
            }
            Expr::Try { expr, span } => {
                let ty = self.infer_expr(expr)?;
                match self.result_ok_type(&ty) {
                    Some(ok) => {
                        if let Some(err) = self.result_err_type(&ty) {
                            let current_err = self.current_err.clone();
                            if !self.compatible(&current_err, &err) {
                                self.reporter.error(
                                    Code::CE2001,
                                    *span,
                                    format!(
                                        "type mismatch: expected '{}', found '{}'",
                                        current_err, err
                                    ),
                                );
                            }
                        }
                        Some(ok)
                    }
                    None => {
                        self.reporter.error(
                            Code::CE2013,
                            *span,
                            format!("'?' requires a Result value, found '{}'", ty),
                        );
                        None
                    }
                }
            }
            Expr::TryFallback { expr, span } => {
                let ty = self.infer_expr(expr)?;
                match self.result_ok_type(&ty) {
                    Some(ok) => Some(ok),
                    None => {
                        self.reporter.error(
                            Code::CE2013,
                            *span,
                            format!("'?' requires a Result value, found '{}'", ty),
                        );
                        None
                    }
                }
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
                ..
            } => {
                self.check_condition(cond);
                let then_ty = self.infer_expr(then_expr)?;
                if let Some(else_ty) = self.infer_expr(else_expr) {
                    self.require_compatible(&then_ty, &else_ty, else_expr.span());
                }
                Some(then_ty)
            }
            Expr::Reference { expr, .. } => {
                let inner = self.infer_expr(expr)?;
                Some(Type::Reference(Box::new(inner)))
            }
        }
    }

    fn infer_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Option<Type> {
        let lhs_ty = self.infer_expr(lhs)?;
        let rhs_ty = self.infer_expr(rhs)?;

        let mismatch = |checker: &mut Self| {
            checker.reporter.error(
                Code::CE2002,
                span,
                format!(
                    "operator '{}' cannot be applied to '{}' and '{}'",
                    op.symbol(),
                    lhs_ty,
                    rhs_ty
                ),
            );
            None
        };

        if op.is_logical() {
            if lhs_ty.is_bool() && rhs_ty.is_bool() {
                return Some(Type::bool());
            }
            return mismatch(self);
        }

        if op.is_comparison() {
            if self.compatible(&lhs_ty, &rhs_ty) || self.compatible(&rhs_ty, &lhs_ty) {
                return Some(Type::bool());
            }
            return mismatch(self);
        }

        // Arithmetic: numerics with each other, `+` also concatenates.
        if op == BinaryOp::Add && lhs_ty.is_string() && rhs_ty.is_string() {
            return Some(Type::string());
        }
        if lhs_ty.is_numeric() && rhs_ty.is_numeric() && self.compatible(&lhs_ty, &rhs_ty) {
            return Some(lhs_ty);
        }
        mismatch(self)
    }

    fn infer_field(&mut self, recv: &Expr, field: &str, span: Span) -> Option<Type> {
        let recv_ty = self.infer_expr(recv)?;
        match &recv_ty {
            Type::Struct(name) => {
                let info = self.ctx.structs.get(name)?;
                match info.fields.iter().find(|(n, _)| n == field) {
                    Some((_, ty)) => Some(ty.clone()),
                    None => {
                        self.reporter.error(
                            Code::CE2010,
                            span,
                            format!("no field '{}' on type '{}'", field, name),
                        );
                        None
                    }
                }
            }
            Type::Builtin(BuiltinKind::Str) if field == "size" => Some(Type::i32()),
            Type::DynamicArray(_) if field == "len" || field == "cap" => Some(Type::i32()),
            Type::Array(_, _) if field == "len" => Some(Type::i32()),
            Type::Reference(inner) => {
                // Auto-deref for field access through references.
                if let Type::Struct(name) = &**inner {
                    let info = self.ctx.structs.get(name)?;
                    match info.fields.iter().find(|(n, _)| n == field) {
                        Some((_, ty)) => return Some(ty.clone()),
                        None => {}
                    }
                }
                self.reporter.error(
                    Code::CE2010,
                    span,
                    format!("no field '{}' on type '{}'", field, recv_ty),
                );
                None
            }
            other => {
                self.reporter.error(
                    Code::CE2010,
                    span,
                    format!("no field '{}' on type '{}'", field, other),
                );
                None
            }
        }
    }

    fn infer_call(
        &mut self,
        callee: &str,
        type_args: &[Type],
        args: &[Expr],
        span: Span,
    ) -> Option<Type> {
        // Struct constructor spelled as a call.
        if self.ctx.structs.contains(callee) && type_args.is_empty() {
            let lit = Expr::StructLit {
                name: callee.to_string(),
                type_args: Vec::new(),
                fields: args.to_vec(),
                span,
            };
            return self.infer_expr(&lit);
        }

        // Builtin `open(path, mode)` returning FileResult.
        if callee == "open" {
            self.check_arity("open", 2, args.len(), span);
            for arg in args {
                self.infer_expr(arg);
            }
            return Some(Type::Enum("FileResult".to_string()));
        }

        // Stdlib functions registered by `use` statements.
        if let Some((module, _)) = self.ctx.funcs.lookup_stdlib_by_name(callee).cloned() {
            for arg in args {
                self.infer_expr(arg);
            }
            return Some(stdlib_return_type(&module, callee));
        }

        // Concrete user function.
        if let Some(sig) = self.ctx.funcs.sigs.get(callee) {
            let params = sig.params.clone();
            let ret = sig.ret.clone();
            let err = sig.err_type.clone();
            self.check_call_args(callee, &params, args, span);
            return self.wrap_of(ret.as_ref(), err.as_ref(), span);
        }

        // Generic function: find the monomorphized signature.
        if self.ctx.generic_funcs.contains(callee) {
            let arg_types: Vec<Option<Type>> =
                args.iter().map(|a| self.infer_expr(a)).collect();
            let resolved_args = if type_args.is_empty() {
                self.deduce_generic_args(callee, &arg_types)
            } else {
                Some(
                    type_args
                        .iter()
                        .map(|t| self.resolve(t, span))
                        .collect::<Vec<_>>(),
                )
            };
            let Some(resolved_args) = resolved_args else {
                self.reporter.error(
                    Code::CE2006,
                    span,
                    format!("unknown function '{}'", callee),
                );
                return None;
            };
            let mono = monomorph_name(callee, &resolved_args);
            if let Some(sig) = self.ctx.funcs.sigs.get(&mono) {
                let ret = sig.ret.clone();
                let err = sig.err_type.clone();
                return self.wrap_of(ret.as_ref(), err.as_ref(), span);
            }
            return None; // monomorphization already reported why
        }

        self.reporter.error(
            Code::CE2006,
            span,
            format!("unknown function '{}'", callee),
        );
        None
    }

    fn deduce_generic_args(
        &self,
        callee: &str,
        arg_types: &[Option<Type>],
    ) -> Option<Vec<Type>> {
        let generic = self.ctx.generic_funcs.get(callee)?;
        let mut subst: HashMap<String, Type> = HashMap::new();
        for (param, arg_ty) in generic.params.iter().zip(arg_types) {
            if let (Some(param_ty), Some(arg_ty)) = (param.ty.as_ref(), arg_ty) {
                unify_types(param_ty, arg_ty, &mut subst);
            }
        }
        generic
            .type_params
            .iter()
            .map(|tp| subst.get(&tp.name).cloned())
            .collect()
    }

    fn check_call_args(
        &mut self,
        name: &str,
        params: &[crate::syntax::ast::ParamDecl],
        args: &[Expr],
        span: Span,
    ) {
        if params.len() != args.len() {
            self.check_arity(name, params.len(), args.len(), span);
        }
        for (param, arg) in params.iter().zip(args) {
            if let Some(found) = self.infer_expr(arg) {
                if let Some(expected) = &param.ty {
                    let expected = self.resolve(expected, param.type_span);
                    self.require_compatible(&expected, &found, arg.span());
                }
            }
        }
    }

    fn check_arity(&mut self, name: &str, expected: usize, got: usize, span: Span) {
        if expected != got {
            self.reporter.error(
                Code::CE2009,
                span,
                format!("'{}' expects {} argument(s), got {}", name, expected, got),
            );
        }
    }

    // ─── Method dispatch ────────────────────────────────────────────

    fn infer_method_call(
        &mut self,
        recv: &Expr,
        method: &str,
        args: &[Expr],
        span: Span,
    ) -> Option<Type> {
        // 1–2. Enum constructors and struct static constructors take a type
        // name as receiver; they must win before the receiver is inferred
        // as an expression.
        if let Expr::Name { id, type_args, .. } = recv {
            if self.lookup(id).is_none() {
                if let Some(ty) = self.infer_type_receiver_call(id, type_args, method, args, span)
                {
                    return Some(ty);
                }
            }
        }

        let recv_ty = self.infer_expr(recv)?;

        // 3–4. Intrinsic stream/file methods.
        if let Type::Builtin(kind) = &recv_ty {
            if kind.is_stream() {
                return self.infer_stream_method(*kind, method, args, span);
            }
        }

        // 5. Result methods.
        if recv_ty.is_result() {
            match method {
                "realise" => {
                    self.check_arity("realise", 1, args.len(), span);
                    let ok = self.result_ok_type(&recv_ty)?;
                    if let Some(arg) = args.first() {
                        if let Some(found) = self.infer_expr(arg) {
                            self.require_compatible(&ok, &found, arg.span());
                        }
                    }
                    return Some(ok);
                }
                "is_ok" | "is_err" => {
                    self.check_arity(method, 0, args.len(), span);
                    return Some(Type::bool());
                }
                _ => {}
            }
        }

        // 6. Maybe methods.
        if let Type::Enum(name) = &recv_ty {
            if name.starts_with("Maybe<") {
                match method {
                    "is_some" | "is_none" => {
                        self.check_arity(method, 0, args.len(), span);
                        return Some(Type::bool());
                    }
                    "realise" => {
                        self.check_arity("realise", 1, args.len(), span);
                        let inner = self.maybe_inner(name)?;
                        if let Some(arg) = args.first() {
                            if let Some(found) = self.infer_expr(arg) {
                                self.require_compatible(&inner, &found, arg.span());
                            }
                        }
                        return Some(inner);
                    }
                    "expect" => {
                        self.check_arity("expect", 1, args.len(), span);
                        if let Some(arg) = args.first() {
                            self.infer_expr(arg);
                        }
                        return self.maybe_inner(name);
                    }
                    _ => {}
                }
            }
        }

        // 7. Own<T> instance methods.
        if let Type::Struct(name) = &recv_ty {
            if name.starts_with("Own<") {
                match method {
                    "get" => {
                        self.check_arity("get", 0, args.len(), span);
                        return self.own_pointee(name);
                    }
                    "destroy" => {
                        self.check_arity("destroy", 0, args.len(), span);
                        return Some(Type::Builtin(BuiltinKind::Blank));
                    }
                    _ => {}
                }
            }

            // 8. HashMap methods.
            if name.starts_with("HashMap<") {
                if let Some(ty) = self.infer_hashmap_method(name, method, args, span) {
                    return Some(ty);
                }
            }

            // 9. List methods.
            if name.starts_with("List<") {
                if let Some(ty) = self.infer_list_method(name, method, args, span) {
                    return Some(ty);
                }
            }
        }

        // 10. Array methods.
        if let Type::DynamicArray(elem) = &recv_ty {
            let elem = (**elem).clone();
            if let Some(ty) = self.infer_dynarray_method(&recv_ty, &elem, method, args, span) {
                return Some(ty);
            }
        }
        if let Type::Array(elem, _) = &recv_ty {
            let elem = (**elem).clone();
            match method {
                "len" => {
                    self.check_arity("len", 0, args.len(), span);
                    return Some(Type::i32());
                }
                "get" => {
                    self.check_arity("get", 1, args.len(), span);
                    if let Some(arg) = args.first() {
                        self.infer_expr(arg);
                    }
                    return Some(elem);
                }
                "hash" => return self.check_hash_call(&recv_ty, args, span),
                _ => {}
            }
        }

        // 11. String methods.
        if recv_ty.is_string() {
            match method {
                "len" => {
                    self.check_arity("len", 0, args.len(), span);
                    return Some(Type::i32()); // character count, not bytes
                }
                "to_i32" => {
                    self.check_arity("to_i32", 0, args.len(), span);
                    return Some(Type::Enum("Result<i32, StdError>".to_string()));
                }
                "to_f64" => {
                    self.check_arity("to_f64", 0, args.len(), span);
                    return Some(Type::Enum("Result<f64, StdError>".to_string()));
                }
                "hash" => return self.check_hash_call(&recv_ty, args, span),
                _ => {}
            }
        }

        // 12. Perk methods (before auto-derived hash).
        let type_name = recv_ty.lookup_name();
        if let Some(method_decl) = self.ctx.perk_impls.get_method(&type_name, method) {
            let params = method_decl.params.clone();
            let ret = method_decl.ret.clone();
            let ret_span = method_decl.ret_span;
            self.check_call_args(method, &params, args, span);
            return ret.map(|t| self.resolve(&t, ret_span));
        }

        // 13. Auto-derived hash.
        if method == "hash" {
            return self.check_hash_call(&recv_ty, args, span);
        }

        // 14. Primitive methods.
        if let Type::Builtin(kind) = &recv_ty {
            if method == "to_str" && (kind.is_numeric() || *kind == BuiltinKind::Bool) {
                self.check_arity("to_str", 0, args.len(), span);
                return Some(Type::string());
            }
            if method == "abs" && kind.is_signed() {
                self.check_arity("abs", 0, args.len(), span);
                return Some(recv_ty.clone());
            }
        }

        // 15. User extension methods.
        if let Some(ext) = self.ctx.extensions.get_method(&recv_ty, method) {
            let params = ext.params.clone();
            let ret = ext.ret.clone();
            let ret_span = ext.ret_span;
            self.check_call_args(method, &params, args, span);
            return ret.map(|t| self.resolve(&t, ret_span));
        }

        self.reporter.error(
            Code::CE2004,
            span,
            format!("no method '{}' on type '{}'", method, recv_ty),
        );
        None
    }

    /// Enum constructors (`Color.Red()`, `Maybe<i32>.Some(5)`) and struct
    /// static constructors (`Own<i32>.new(5)`, `HashMap<string, i32>.new()`).
    fn infer_type_receiver_call(
        &mut self,
        id: &str,
        type_args: &[Type],
        method: &str,
        args: &[Expr],
        span: Span,
    ) -> Option<Type> {
        let concrete_name = if type_args.is_empty() {
            id.to_string()
        } else {
            let resolved: Vec<Type> = type_args.iter().map(|t| self.resolve(t, span)).collect();
            monomorph_name(id, &resolved)
        };

        // Enum constructor.
        if let Some(info) = self.ctx.enums.get(&concrete_name) {
            let Some(idx) = info.variant_index(method) else {
                self.reporter.error(
                    Code::CE2012,
                    span,
                    format!("enum '{}' has no variant '{}'", concrete_name, method),
                );
                return Some(Type::Enum(concrete_name));
            };
            let assoc = info.variants[idx].assoc.clone();
            if assoc.len() != args.len() {
                self.check_arity(
                    &format!("{}.{}", concrete_name, method),
                    assoc.len(),
                    args.len(),
                    span,
                );
            }
            for (expected, arg) in assoc.iter().zip(args) {
                if let Some(found) = self.infer_expr(arg) {
                    self.require_compatible(expected, &found, arg.span());
                }
            }
            return Some(Type::Enum(concrete_name));
        }

        // Struct static constructor.
        if self.ctx.structs.contains(&concrete_name) {
            match method {
                "new" => {
                    // Own<T>.new(value) takes the pointee; collection
                    // constructors take nothing.
                    if concrete_name.starts_with("Own<") {
                        self.check_arity("new", 1, args.len(), span);
                        if let (Some(arg), Some(pointee)) =
                            (args.first(), self.own_pointee(&concrete_name))
                        {
                            if let Some(found) = self.infer_expr(arg) {
                                self.require_compatible(&pointee, &found, arg.span());
                            }
                        }
                    } else {
                        self.check_arity("new", 0, args.len(), span);
                    }
                    return Some(Type::Struct(concrete_name));
                }
                "with_capacity" => {
                    self.check_arity("with_capacity", 1, args.len(), span);
                    if let Some(arg) = args.first() {
                        self.infer_expr(arg);
                    }
                    return Some(Type::Struct(concrete_name));
                }
                _ => return None,
            }
        }

        None
    }

    fn infer_stream_method(
        &mut self,
        kind: BuiltinKind,
        method: &str,
        args: &[Expr],
        span: Span,
    ) -> Option<Type> {
        match (kind, method) {
            (BuiltinKind::Stdout | BuiltinKind::Stderr, "write") => {
                self.check_arity("write", 1, args.len(), span);
                if let Some(arg) = args.first() {
                    if let Some(found) = self.infer_expr(arg) {
                        self.require_compatible(&Type::string(), &found, arg.span());
                    }
                }
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            (BuiltinKind::Stdin, "read_line") => {
                self.check_arity("read_line", 0, args.len(), span);
                Some(Type::string())
            }
            (BuiltinKind::File, "write") => {
                self.check_arity("write", 1, args.len(), span);
                if let Some(arg) = args.first() {
                    self.infer_expr(arg);
                }
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            (BuiltinKind::File, "read") => {
                self.check_arity("read", 0, args.len(), span);
                Some(Type::string())
            }
            (BuiltinKind::File, "close") => {
                self.check_arity("close", 0, args.len(), span);
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            (BuiltinKind::File, "seek") => {
                self.check_arity("seek", 2, args.len(), span);
                for arg in args {
                    self.infer_expr(arg);
                }
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            _ => {
                self.reporter.error(
                    Code::CE2004,
                    span,
                    format!("no method '{}' on type '{}'", method, kind.name()),
                );
                None
            }
        }
    }

    fn infer_hashmap_method(
        &mut self,
        name: &str,
        method: &str,
        args: &[Expr],
        span: Span,
    ) -> Option<Type> {
        let (_, generic_args) = self.ctx.generic_args_of(name)?;
        let key_ty = generic_args.first()?.clone();
        let value_ty = generic_args.get(1)?.clone();
        match method {
            "insert" => {
                self.check_arity("insert", 2, args.len(), span);
                if let Some(arg) = args.first() {
                    if let Some(found) = self.infer_expr(arg) {
                        self.require_compatible(&key_ty, &found, arg.span());
                    }
                }
                if let Some(arg) = args.get(1) {
                    if let Some(found) = self.infer_expr(arg) {
                        self.require_compatible(&value_ty, &found, arg.span());
                    }
                }
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            "get" => {
                self.check_arity("get", 1, args.len(), span);
                if let Some(arg) = args.first() {
                    if let Some(found) = self.infer_expr(arg) {
                        self.require_compatible(&key_ty, &found, arg.span());
                    }
                }
                Some(Type::Enum(monomorph_name("Maybe", &[value_ty])))
            }
            "remove" | "contains" => {
                self.check_arity(method, 1, args.len(), span);
                if let Some(arg) = args.first() {
                    self.infer_expr(arg);
                }
                Some(Type::bool())
            }
            "len" => {
                self.check_arity("len", 0, args.len(), span);
                Some(Type::i32())
            }
            "destroy" => {
                self.check_arity("destroy", 0, args.len(), span);
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            _ => None,
        }
    }

    fn infer_list_method(
        &mut self,
        name: &str,
        method: &str,
        args: &[Expr],
        span: Span,
    ) -> Option<Type> {
        let (_, generic_args) = self.ctx.generic_args_of(name)?;
        let elem_ty = generic_args.first()?.clone();
        match method {
            "push" => {
                self.check_arity("push", 1, args.len(), span);
                if let Some(arg) = args.first() {
                    if let Some(found) = self.infer_expr(arg) {
                        self.require_compatible(&elem_ty, &found, arg.span());
                    }
                }
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            "pop" | "get" => {
                if method == "get" {
                    self.check_arity("get", 1, args.len(), span);
                    if let Some(arg) = args.first() {
                        self.infer_expr(arg);
                    }
                } else {
                    self.check_arity("pop", 0, args.len(), span);
                }
                Some(Type::Enum(monomorph_name("Maybe", &[elem_ty])))
            }
            "len" => {
                self.check_arity("len", 0, args.len(), span);
                Some(Type::i32())
            }
            "clear" | "destroy" => {
                self.check_arity(method, 0, args.len(), span);
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            _ => None,
        }
    }

    fn infer_dynarray_method(
        &mut self,
        recv_ty: &Type,
        elem: &Type,
        method: &str,
        args: &[Expr],
        span: Span,
    ) -> Option<Type> {
        match method {
            "push" => {
                self.check_arity("push", 1, args.len(), span);
                if let Some(arg) = args.first() {
                    if let Some(found) = self.infer_expr(arg) {
                        self.require_compatible(elem, &found, arg.span());
                    }
                }
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            "pop" => {
                self.check_arity("pop", 0, args.len(), span);
                Some(elem.clone())
            }
            "get" => {
                self.check_arity("get", 1, args.len(), span);
                if let Some(arg) = args.first() {
                    self.infer_expr(arg);
                }
                Some(elem.clone())
            }
            "len" | "cap" => {
                self.check_arity(method, 0, args.len(), span);
                Some(Type::i32())
            }
            "destroy" => {
                self.check_arity("destroy", 0, args.len(), span);
                Some(Type::Builtin(BuiltinKind::Blank))
            }
            "hash" => self.check_hash_call(recv_ty, args, span),
            _ => None,
        }
    }

    /// `.hash()` is valid exactly when the receiver is hashable: primitives
    /// always, aggregates and arrays when derivation registered a method.
    /// Gating arrays on registration (not just `can_hash`) keeps every
    /// accepted call backed by an emitted hash function.
    fn check_hash_call(&mut self, recv_ty: &Type, args: &[Expr], span: Span) -> Option<Type> {
        self.check_arity("hash", 0, args.len(), span);
        let hashable = match recv_ty {
            Type::Builtin(kind) => primitive_is_hashable(*kind),
            Type::Struct(_) | Type::Enum(_) => self.ctx.has_derived_hash(recv_ty),
            Type::Array(..) | Type::DynamicArray(_) => {
                can_hash(self.ctx, recv_ty).is_hashable() && self.ctx.has_derived_hash(recv_ty)
            }
            _ => false,
        };
        if !hashable {
            self.reporter.error(
                Code::CE2061,
                span,
                format!("type '{}' is not hashable", recv_ty),
            );
            return None;
        }
        Some(Type::u64())
    }

    fn maybe_inner(&self, name: &str) -> Option<Type> {
        let info = self.ctx.enums.get(name)?;
        info.variants.first()?.assoc.first().cloned()
    }

    fn own_pointee(&self, name: &str) -> Option<Type> {
        let info = self.ctx.structs.get(name)?;
        match info.fields.first() {
            Some((_, Type::Pointer(inner))) => Some((**inner).clone()),
            _ => None,
        }
    }
}

fn stream_kind(name: &str) -> Option<BuiltinKind> {
    Some(match name {
        "stdin" => BuiltinKind::Stdin,
        "stdout" => BuiltinKind::Stdout,
        "stderr" => BuiltinKind::Stderr,
        _ => return None,
    })
}

/// Signatures of stdlib functions callable by bare name after `use`.
fn stdlib_return_type(module: &str, name: &str) -> Type {
    match (module, name) {
        ("time", "now") | ("time", "ticks_ms") => Type::Builtin(BuiltinKind::I64),
        ("time", "sleep") => Type::Builtin(BuiltinKind::Blank),
        ("math", "sqrt") | ("math", "pow") | ("math", "floor") | ("math", "ceil") => Type::f64(),
        ("math", "abs") => Type::Builtin(BuiltinKind::I64),
        ("sys/env", "getenv") => Type::Enum("Maybe<string>".to_string()),
        ("sys/env", _) => Type::Builtin(BuiltinKind::Blank),
        _ => Type::Builtin(BuiltinKind::Blank),
    }
}

fn unify_types(param: &Type, arg: &Type, subst: &mut HashMap<String, Type>) {
    match (param, arg) {
        (Type::TypeParameter(name), concrete) => {
            subst
                .entry(name.clone())
                .or_insert_with(|| concrete.clone());
        }
        (Type::Array(p, _), Type::Array(a, _))
        | (Type::DynamicArray(p), Type::DynamicArray(a))
        | (Type::Reference(p), Type::Reference(a))
        | (Type::Pointer(p), Type::Pointer(a)) => unify_types(p, a, subst),
        (Type::GenericRef { base: pb, args: pa }, Type::GenericRef { base: ab, args: aa })
            if pb == ab =>
        {
            for (p, a) in pa.iter().zip(aa) {
                unify_types(p, a, subst);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
#[path = "typecheck_tests.rs"]
mod tests;
