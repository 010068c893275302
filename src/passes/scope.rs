//! Pass 1: scope analysis.
//!
//! Maintains a lexical scope stack and reports undeclared names, same-scope
//! redeclaration, and use-after-destroy on owned resources. Also records the
//! scope depth each variable was declared at, which the borrow checker uses
//! to verify references never outlive their referents.

use std::collections::HashMap;

use crate::context::Context;
use crate::report::{Code, Reporter, Span};
use crate::syntax::ast::{
    Block, Expr, ExtendDecl, FuncDecl, Program, Stmt,
};
use crate::types::Type;

#[derive(Debug, Clone)]
struct VarInfo {
    declared_at: Span,
    destroyed: bool,
    used: bool,
}

pub struct ScopeAnalyzer<'a> {
    ctx: &'a Context,
    reporter: &'a mut Reporter,
    scopes: Vec<HashMap<String, VarInfo>>,
}

impl<'a> ScopeAnalyzer<'a> {
    pub fn new(ctx: &'a Context, reporter: &'a mut Reporter) -> Self {
        ScopeAnalyzer {
            ctx,
            reporter,
            scopes: Vec::new(),
        }
    }

    pub fn run(&mut self, program: &Program) {
        for constant in &program.constants {
            self.push_scope();
            self.check_expr(&constant.value);
            self.pop_scope_silent();
        }
        for func in &program.functions {
            if func.type_params.is_empty() {
                self.check_function(func);
            }
        }
        for ext in &program.extensions {
            if matches!(ext.target, Type::GenericRef { .. }) {
                continue; // checked per-monomorphization
            }
            self.check_extension(ext);
        }
        for perk_impl in &program.perk_impls {
            for method in &perk_impl.methods {
                self.check_method_with_self(method, &perk_impl.target);
            }
        }
    }

    pub fn check_function(&mut self, func: &FuncDecl) {
        self.push_scope();
        for param in &func.params {
            self.declare(&param.name, param.name_span);
            self.mark_used(&param.name); // parameters are caller-supplied
        }
        self.check_block(&func.body);
        self.pop_scope();
    }

    pub fn check_extension(&mut self, ext: &ExtendDecl) {
        self.push_scope();
        self.declare("self", ext.name_span);
        self.mark_used("self");
        for param in &ext.params {
            self.declare(&param.name, param.name_span);
            self.mark_used(&param.name);
        }
        self.check_block(&ext.body);
        self.pop_scope();
    }

    fn check_method_with_self(&mut self, method: &FuncDecl, target: &Type) {
        self.push_scope();
        self.declare("self", method.name_span);
        self.mark_used("self");
        for param in &method.params {
            self.declare(&param.name, param.name_span);
            self.mark_used(&param.name);
        }
        self.check_block(&method.body);
        self.pop_scope();
    }

    // ─── Scope stack ────────────────────────────────────────────────

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            let mut vars: Vec<(&String, &VarInfo)> = scope.iter().collect();
            vars.sort_by_key(|(_, info)| info.declared_at.start);
            for (name, info) in vars {
                if !info.used && !name.starts_with('_') {
                    self.reporter.warn(
                        Code::CE1104,
                        info.declared_at,
                        format!("variable '{}' is never used", name),
                    );
                }
            }
        }
    }

    fn pop_scope_silent(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str, span: Span) {
        if self.scopes.last().is_some_and(|s| s.contains_key(name)) {
            self.reporter.error(
                Code::CE1102,
                span,
                format!("'{}' is already declared in this scope", name),
            );
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                VarInfo {
                    declared_at: span,
                    destroyed: false,
                    used: false,
                },
            );
        }
    }

    fn lookup(&self, name: &str) -> Option<&VarInfo> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn mark_used(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(info) = scope.get_mut(name) {
                info.used = true;
                return;
            }
        }
    }

    fn mark_destroyed(&mut self, name: &str) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(info) = scope.get_mut(name) {
                info.destroyed = true;
                return;
            }
        }
    }

    /// Is this identifier meaningful without a local declaration?
    fn is_global_name(&self, name: &str) -> bool {
        matches!(name, "stdin" | "stdout" | "stderr")
            || self.ctx.constants.contains(name)
            || self.ctx.enums.contains(name)
            || self.ctx.structs.contains(name)
            || self.ctx.generic_enums.contains(name)
            || self.ctx.generic_structs.contains(name)
            || self.ctx.funcs.sigs.contains(name)
            || self.ctx.generic_funcs.contains(name)
    }

    // ─── Walks ──────────────────────────────────────────────────────

    fn check_block(&mut self, block: &Block) {
        self.push_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.pop_scope();
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let {
                name,
                init,
                name_span,
                ..
            } => {
                if let Some(init) = init {
                    self.check_expr(init);
                }
                self.declare(name, *name_span);
            }
            Stmt::Assign { target, value, .. } => {
                self.check_expr(value);
                self.check_expr(target);
            }
            Stmt::Expr(expr) => self.check_expr(expr),
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.check_expr(value);
                }
            }
            Stmt::If {
                cond,
                then_block,
                elifs,
                else_block,
                ..
            } => {
                self.check_expr(cond);
                self.check_block(then_block);
                for (c, b) in elifs {
                    self.check_expr(c);
                    self.check_block(b);
                }
                if let Some(b) = else_block {
                    self.check_block(b);
                }
            }
            Stmt::While { cond, body, .. } => {
                self.check_expr(cond);
                self.check_block(body);
            }
            Stmt::For {
                var,
                iterable,
                body,
                var_span,
                ..
            } => {
                self.check_expr(iterable);
                self.push_scope();
                self.declare(var, *var_span);
                self.mark_used(var);
                for stmt in &body.stmts {
                    self.check_stmt(stmt);
                }
                self.pop_scope();
            }
            Stmt::Match {
                scrutinee, arms, ..
            } => {
                self.check_expr(scrutinee);
                for arm in arms {
                    self.push_scope();
                    for binding in &arm.bindings {
                        self.declare(binding, arm.span);
                        self.mark_used(binding);
                    }
                    for stmt in &arm.body.stmts {
                        self.check_stmt(stmt);
                    }
                    self.pop_scope();
                }
            }
            Stmt::Break(_) | Stmt::Continue(_) => {}
        }
    }

    fn check_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name { id, type_args, span } => {
                if !type_args.is_empty() {
                    return; // generic type mention, validated in Pass 2
                }
                match self.lookup(id).map(|info| info.destroyed) {
                    Some(destroyed) => {
                        if destroyed {
                            self.reporter.error(
                                Code::CE1103,
                                *span,
                                format!("use of '{}' after .destroy()", id),
                            );
                        }
                        self.mark_used(id);
                    }
                    None if !self.is_global_name(id) => {
                        self.reporter.error(
                            Code::CE1101,
                            *span,
                            format!("undeclared name '{}'", id),
                        );
                    }
                    None => {}
                }
            }
            Expr::MethodCall {
                recv, method, args, ..
            } => {
                // `.destroy()` transitions the receiver; later uses error.
                if method == "destroy" {
                    if let Some(name) = recv.as_plain_name() {
                        let name = name.to_string();
                        self.check_expr(recv);
                        for arg in args {
                            self.check_expr(arg);
                        }
                        self.mark_destroyed(&name);
                        return;
                    }
                }
                self.check_expr(recv);
                for arg in args {
                    self.check_expr(arg);
                }
            }
            Expr::Call { callee, args, .. } => {
                // Unknown callees are reported by the type checker, which
                // also understands constructors; scope only walks arguments.
                let _ = callee;
                for arg in args {
                    self.check_expr(arg);
                }
            }
            Expr::Field { recv, .. } => self.check_expr(recv),
            Expr::Index { recv, index, .. } => {
                self.check_expr(recv);
                self.check_expr(index);
            }
            Expr::Unary { expr, .. }
            | Expr::Try { expr, .. }
            | Expr::TryFallback { expr, .. }
            | Expr::Reference { expr, .. } => self.check_expr(expr),
            Expr::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs);
                self.check_expr(rhs);
            }
            Expr::Ternary {
                cond,
                then_expr,
                else_expr,
                ..
            } => {
                self.check_expr(cond);
                self.check_expr(then_expr);
                self.check_expr(else_expr);
            }
            Expr::StructLit { fields, .. } => {
                for field in fields {
                    self.check_expr(field);
                }
            }
            Expr::ArrayLit { elems, .. } => {
                for elem in elems {
                    self.check_expr(elem);
                }
            }
            Expr::IntLit { .. }
            | Expr::FloatLit { .. }
            | Expr::BoolLit { .. }
            | Expr::StrLit { .. } => {}
        }
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
