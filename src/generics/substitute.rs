//! Type-parameter substitution through types, signatures, and AST bodies.

use std::collections::HashMap;

use crate::syntax::ast::{Block, Expr, FuncDecl, MatchArm, ParamDecl, Stmt};
use crate::types::Type;

pub type Substitution = HashMap<String, Type>;

/// Recursively replace `TypeParameter` mentions with their bound concrete
/// types. Unbound parameters pass through unchanged — the monomorphizer
/// flags those as internal errors when they matter.
pub fn substitute_type(ty: &Type, subst: &Substitution) -> Type {
    match ty {
        Type::TypeParameter(name) => subst.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Type::Array(elem, size) => Type::Array(Box::new(substitute_type(elem, subst)), *size),
        Type::DynamicArray(elem) => Type::DynamicArray(Box::new(substitute_type(elem, subst))),
        Type::Reference(inner) => Type::Reference(Box::new(substitute_type(inner, subst))),
        Type::Pointer(inner) => Type::Pointer(Box::new(substitute_type(inner, subst))),
        Type::Iterator(inner) => Type::Iterator(Box::new(substitute_type(inner, subst))),
        Type::GenericRef { base, args } => Type::GenericRef {
            base: base.clone(),
            args: args.iter().map(|a| substitute_type(a, subst)).collect(),
        },
        Type::Result(ok, err) => Type::Result(
            Box::new(substitute_type(ok, subst)),
            Box::new(substitute_type(err, subst)),
        ),
        other => other.clone(),
    }
}

pub fn substitute_params(params: &[ParamDecl], subst: &Substitution) -> Vec<ParamDecl> {
    params
        .iter()
        .map(|p| ParamDecl {
            ty: p.ty.as_ref().map(|t| substitute_type(t, subst)),
            ..p.clone()
        })
        .collect()
}

/// Substitute every explicit type annotation inside a function body.
pub fn substitute_block(block: &Block, subst: &Substitution) -> Block {
    Block {
        stmts: block.stmts.iter().map(|s| substitute_stmt(s, subst)).collect(),
    }
}

fn substitute_stmt(stmt: &Stmt, subst: &Substitution) -> Stmt {
    match stmt {
        Stmt::Let {
            name,
            ty,
            init,
            name_span,
            span,
        } => Stmt::Let {
            name: name.clone(),
            ty: ty.as_ref().map(|t| substitute_type(t, subst)),
            init: init.as_ref().map(|e| substitute_expr(e, subst)),
            name_span: *name_span,
            span: *span,
        },
        Stmt::Assign {
            target,
            value,
            span,
        } => Stmt::Assign {
            target: substitute_expr(target, subst),
            value: substitute_expr(value, subst),
            span: *span,
        },
        Stmt::Expr(e) => Stmt::Expr(substitute_expr(e, subst)),
        Stmt::Return { value, span } => Stmt::Return {
            value: value.as_ref().map(|e| substitute_expr(e, subst)),
            span: *span,
        },
        Stmt::If {
            cond,
            then_block,
            elifs,
            else_block,
            span,
        } => Stmt::If {
            cond: substitute_expr(cond, subst),
            then_block: substitute_block(then_block, subst),
            elifs: elifs
                .iter()
                .map(|(c, b)| (substitute_expr(c, subst), substitute_block(b, subst)))
                .collect(),
            else_block: else_block.as_ref().map(|b| substitute_block(b, subst)),
            span: *span,
        },
        Stmt::While { cond, body, span } => Stmt::While {
            cond: substitute_expr(cond, subst),
            body: substitute_block(body, subst),
            span: *span,
        },
        Stmt::For {
            var,
            iterable,
            body,
            var_span,
            span,
        } => Stmt::For {
            var: var.clone(),
            iterable: substitute_expr(iterable, subst),
            body: substitute_block(body, subst),
            var_span: *var_span,
            span: *span,
        },
        Stmt::Match {
            scrutinee,
            arms,
            span,
        } => Stmt::Match {
            scrutinee: substitute_expr(scrutinee, subst),
            arms: arms
                .iter()
                .map(|arm| MatchArm {
                    variant: arm.variant.clone(),
                    bindings: arm.bindings.clone(),
                    body: substitute_block(&arm.body, subst),
                    span: arm.span,
                })
                .collect(),
            span: *span,
        },
        Stmt::Break(span) => Stmt::Break(*span),
        Stmt::Continue(span) => Stmt::Continue(*span),
    }
}

fn substitute_expr(expr: &Expr, subst: &Substitution) -> Expr {
    match expr {
        Expr::Name {
            id,
            type_args,
            span,
        } => Expr::Name {
            id: id.clone(),
            type_args: type_args.iter().map(|t| substitute_type(t, subst)).collect(),
            span: *span,
        },
        Expr::Call {
            callee,
            type_args,
            args,
            span,
        } => Expr::Call {
            callee: callee.clone(),
            type_args: type_args.iter().map(|t| substitute_type(t, subst)).collect(),
            args: args.iter().map(|a| substitute_expr(a, subst)).collect(),
            span: *span,
        },
        Expr::MethodCall {
            recv,
            method,
            args,
            span,
        } => Expr::MethodCall {
            recv: Box::new(substitute_expr(recv, subst)),
            method: method.clone(),
            args: args.iter().map(|a| substitute_expr(a, subst)).collect(),
            span: *span,
        },
        Expr::StructLit {
            name,
            type_args,
            fields,
            span,
        } => Expr::StructLit {
            name: name.clone(),
            type_args: type_args.iter().map(|t| substitute_type(t, subst)).collect(),
            fields: fields.iter().map(|f| substitute_expr(f, subst)).collect(),
            span: *span,
        },
        Expr::Unary { op, expr, span } => Expr::Unary {
            op: *op,
            expr: Box::new(substitute_expr(expr, subst)),
            span: *span,
        },
        Expr::Binary {
            op,
            lhs,
            rhs,
            span,
        } => Expr::Binary {
            op: *op,
            lhs: Box::new(substitute_expr(lhs, subst)),
            rhs: Box::new(substitute_expr(rhs, subst)),
            span: *span,
        },
        Expr::Field { recv, field, span } => Expr::Field {
            recv: Box::new(substitute_expr(recv, subst)),
            field: field.clone(),
            span: *span,
        },
        Expr::Index { recv, index, span } => Expr::Index {
            recv: Box::new(substitute_expr(recv, subst)),
            index: Box::new(substitute_expr(index, subst)),
            span: *span,
        },
        Expr::Try { expr, span } => Expr::Try {
            expr: Box::new(substitute_expr(expr, subst)),
            span: *span,
        },
        Expr::TryFallback { expr, span } => Expr::TryFallback {
            expr: Box::new(substitute_expr(expr, subst)),
            span: *span,
        },
        Expr::Ternary {
            cond,
            then_expr,
            else_expr,
            span,
        } => Expr::Ternary {
            cond: Box::new(substitute_expr(cond, subst)),
            then_expr: Box::new(substitute_expr(then_expr, subst)),
            else_expr: Box::new(substitute_expr(else_expr, subst)),
            span: *span,
        },
        Expr::Reference { expr, span } => Expr::Reference {
            expr: Box::new(substitute_expr(expr, subst)),
            span: *span,
        },
        Expr::ArrayLit { elems, span } => Expr::ArrayLit {
            elems: elems.iter().map(|e| substitute_expr(e, subst)).collect(),
            span: *span,
        },
        literal => literal.clone(),
    }
}

/// Substitute a whole function definition, giving it a new (monomorphic)
/// name.
pub fn substitute_function(func_name: &str, decl: &FuncDeclParts, subst: &Substitution) -> FuncDecl {
    FuncDecl {
        name: func_name.to_string(),
        type_params: Vec::new(),
        params: substitute_params(&decl.params, subst),
        ret: decl.ret.as_ref().map(|t| substitute_type(t, subst)),
        err_type: decl.err_type.as_ref().map(|t| substitute_type(t, subst)),
        is_public: decl.is_public,
        body: substitute_block(&decl.body, subst),
        name_span: decl.name_span,
        ret_span: decl.ret_span,
        span: decl.name_span,
    }
}

/// The pieces of a generic function needed for substitution; mirrors
/// `GenericFuncInfo` without borrowing the whole table entry.
pub struct FuncDeclParts {
    pub params: Vec<ParamDecl>,
    pub ret: Option<Type>,
    pub err_type: Option<Type>,
    pub is_public: bool,
    pub body: Block,
    pub name_span: crate::report::Span,
    pub ret_span: crate::report::Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_nested_types() {
        let mut subst = Substitution::new();
        subst.insert("T".to_string(), Type::i32());
        let ty = Type::DynamicArray(Box::new(Type::GenericRef {
            base: "Maybe".into(),
            args: vec![Type::TypeParameter("T".into())],
        }));
        assert_eq!(
            substitute_type(&ty, &subst).to_string(),
            "Maybe<i32>[]"
        );
    }

    #[test]
    fn unbound_parameters_pass_through() {
        let subst = Substitution::new();
        let ty = Type::TypeParameter("U".into());
        assert_eq!(substitute_type(&ty, &subst), ty);
    }
}
