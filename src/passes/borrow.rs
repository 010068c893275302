//! Pass 3: borrow checking.
//!
//! Verifies, over the rewritten AST:
//! - a `Reference(T)` never outlives its referent (no storing a reference
//!   to an inner-scope variable in an outer binding, no returning a
//!   reference to a local);
//! - no alias coexists with mutation in overlapping lexical ranges
//!   (assigning to or destroying a variable while a reference to it is
//!   live);
//! - ownership transfers move the binding, so a moved array/`Own<T>` cannot
//!   be used again (scope-exit cleanup skips moved bindings during
//!   emission).

use std::collections::HashMap;

use crate::context::Context;
use crate::report::{Code, Reporter, Span};
use crate::syntax::ast::{Block, Expr, ExtendDecl, FuncDecl, Program, Stmt};
use crate::types::Type;

#[derive(Debug, Clone)]
struct VarState {
    depth: usize,
    /// Owns a heap resource (dynamic array or Own<T>): moves apply.
    owned: bool,
    moved: bool,
    /// Depths of scopes holding live references to this variable.
    borrows: Vec<usize>,
}

pub struct BorrowChecker<'a> {
    ctx: &'a Context,
    reporter: &'a mut Reporter,
    vars: HashMap<String, Vec<VarState>>,
    scopes: Vec<Vec<String>>,
}

impl<'a> BorrowChecker<'a> {
    pub fn new(ctx: &'a Context, reporter: &'a mut Reporter) -> Self {
        BorrowChecker {
            ctx,
            reporter,
            vars: HashMap::new(),
            scopes: Vec::new(),
        }
    }

    pub fn run(&mut self, program: &Program) {
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
    }

    pub fn check_function(&mut self, func: &FuncDecl) {
        self.vars.clear();
        self.scopes.clear();
        self.push_scope();
        for param in &func.params {
            let owned = param.ty.as_ref().is_some_and(|t| is_owned_type(self.ctx, t));
            self.declare(&param.name, owned);
        }
        self.check_block_inner(&func.body);
        self.pop_scope();
    }

    pub fn check_extension(&mut self, ext: &ExtendDecl) {
        self.vars.clear();
        self.scopes.clear();
        self.push_scope();
        let self_owned = is_owned_type(self.ctx, &ext.target);
        self.declare("self", self_owned);
        for param in &ext.params {
            let owned = param.ty.as_ref().is_some_and(|t| is_owned_type(self.ctx, t));
            self.declare(&param.name, owned);
        }
        self.check_block_inner(&ext.body);
        self.pop_scope();
    }

    // ─── Scope bookkeeping ──────────────────────────────────────────

    fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    fn pop_scope(&mut self) {
        let depth = self.depth();
        if let Some(names) = self.scopes.pop() {
            for name in names {
                if let Some(stack) = self.vars.get_mut(&name) {
                    stack.pop();
                    if stack.is_empty() {
                        self.vars.remove(&name);
                    }
                }
            }
        }
        // Borrows held by the closed scope die with it.
        for stack in self.vars.values_mut() {
            for state in stack.iter_mut() {
                state.borrows.retain(|d| *d < depth);
            }
        }
    }

    fn declare(&mut self, name: &str, owned: bool) {
        let depth = self.depth();
        self.vars.entry(name.to_string()).or_default().push(VarState {
            depth,
            owned,
            moved: false,
            borrows: Vec::new(),
        });
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(name.to_string());
        }
    }

    fn state(&self, name: &str) -> Option<&VarState> {
        self.vars.get(name).and_then(|s| s.last())
    }

    fn state_mut(&mut self, name: &str) -> Option<&mut VarState> {
        self.vars.get_mut(name).and_then(|s| s.last_mut())
    }

    // ─── Walks ──────────────────────────────────────────────────────

    fn check_block(&mut self, block: &Block) {
        self.push_scope();
        self.check_block_inner(block);
        self.pop_scope();
    }

    fn check_block_inner(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Let {
                name, ty, init, span, ..
            } => {
                if let Some(init) = init {
                    self.check_expr(init);
                    // `&x` initializer: register the borrow on the referent.
                    if let Expr::Reference { expr, .. } = init {
                        if let Some(referent) = expr.as_plain_name() {
                            let holder_depth = self.depth();
                            if let Some(state) = self.state_mut(&referent.to_string()) {
                                state.borrows.push(holder_depth);
                            }
                        }
                    }
                    // Binding an owned value from a plain name moves it.
                    if ty.as_ref().is_some_and(|t| is_owned_type(self.ctx, t)) {
                        if let Some(src) = init.as_plain_name() {
                            let src = src.to_string();
                            self.mark_moved(&src, *span);
                        }
                    }
                }
                let owned = ty.as_ref().is_some_and(|t| is_owned_type(self.ctx, t));
                self.declare(name, owned);
            }
            Stmt::Assign { target, value, span } => {
                self.check_expr(value);
                // Storing `&x` into an outer binding must not let the
                // reference outlive `x`.
                if let Expr::Reference { expr, .. } = value {
                    if let (Some(holder), Some(referent)) =
                        (target.as_plain_name(), expr.as_plain_name())
                    {
                        let holder_depth = self.state(holder).map(|s| s.depth);
                        let referent_depth = self.state(referent).map(|s| s.depth);
                        if let (Some(hd), Some(rd)) = (holder_depth, referent_depth) {
                            if rd > hd {
                                self.reporter.error(
                                    Code::CE3101,
                                    *span,
                                    format!("reference to '{}' outlives its referent", referent),
                                );
                            } else if let Some(state) = self.state_mut(&referent.to_string()) {
                                state.borrows.push(hd);
                            }
                        }
                    }
                }
                // Mutation through a live alias.
                if let Some(name) = target.as_plain_name() {
                    let borrowed = self
                        .state(name)
                        .map(|s| !s.borrows.is_empty())
                        .unwrap_or(false);
                    if borrowed {
                        self.reporter.error(
                            Code::CE3102,
                            *span,
                            format!("'{}' is already borrowed in this range", name),
                        );
                    }
                }
                self.check_expr(target);
            }
            Stmt::Expr(expr) => {
                // Destroying a borrowed resource invalidates the alias.
                if let Expr::MethodCall { recv, method, .. } = expr {
                    if method == "destroy" {
                        if let Some(name) = recv.as_plain_name() {
                            let borrowed = self
                                .state(name)
                                .map(|s| !s.borrows.is_empty())
                                .unwrap_or(false);
                            if borrowed {
                                self.reporter.error(
                                    Code::CE3102,
                                    expr.span(),
                                    format!("'{}' is already borrowed in this range", name),
                                );
                            }
                        }
                    }
                }
                self.check_expr(expr);
            }
            Stmt::Return { value, span } => {
                if let Some(value) = value {
                    self.check_expr(value);
                    // Returning a reference to any local escapes the frame.
                    if let Expr::Reference { expr, .. } = value {
                        if let Some(name) = expr.as_plain_name() {
                            self.reporter.error(
                                Code::CE3101,
                                *span,
                                format!("reference to '{}' outlives its referent", name),
                            );
                        }
                    }
                    // Returning an owned binding transfers ownership out;
                    // emission skips its destructor.
                    if let Some(name) = value.as_plain_name() {
                        if let Some(state) = self.state_mut(&name.to_string()) {
                            if state.owned {
                                state.moved = true;
                            }
                        }
                    }
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
            Stmt::For { var, iterable, body, .. } => {
                self.check_expr(iterable);
                self.push_scope();
                self.declare(var, false);
                self.check_block_inner(body);
                self.pop_scope();
            }
            Stmt::Match {
                scrutinee, arms, ..
            } => {
                self.check_expr(scrutinee);
                for arm in arms {
                    self.push_scope();
                    for binding in &arm.bindings {
                        self.declare(binding, false);
                    }
                    self.check_block_inner(&arm.body);
                    self.pop_scope();
                }
            }
            Stmt::Break(_) | Stmt::Continue(_) => {}
        }
    }

    fn mark_moved(&mut self, name: &str, span: Span) {
        let Some(state) = self.state_mut(name) else {
            return;
        };
        if !state.owned {
            return;
        }
        if state.moved {
            self.reporter.error(
                Code::CE3103,
                span,
                format!("use of moved value '{}'", name),
            );
            return;
        }
        state.moved = true;
    }

    fn check_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name { id, type_args, span } => {
                if type_args.is_empty() {
                    let moved = self.state(id).map(|s| s.moved).unwrap_or(false);
                    if moved {
                        self.reporter.error(
                            Code::CE3103,
                            *span,
                            format!("use of moved value '{}'", id),
                        );
                    }
                }
            }
            Expr::MethodCall { recv, args, .. } => {
                self.check_expr(recv);
                for arg in args {
                    self.check_expr(arg);
                }
            }
            Expr::Call { args, .. } => {
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
            _ => {}
        }
    }
}

/// Does this type own heap memory released at scope exit? Structs own
/// transitively through their fields.
fn is_owned_type(ctx: &Context, ty: &Type) -> bool {
    match ty {
        Type::DynamicArray(_) => true,
        Type::Struct(name) if name.starts_with("Own<") => true,
        Type::Struct(name) => ctx
            .structs
            .get(name)
            .map(|info| info.fields.iter().any(|(_, t)| is_owned_type(ctx, t)))
            .unwrap_or(false),
        Type::GenericRef { base, .. } => base == "Own",
        Type::Unknown(name) => name.starts_with("Own<"),
        _ => false,
    }
}

#[cfg(test)]
#[path = "borrow_tests.rs"]
mod tests;
