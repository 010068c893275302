//! AST node definitions.
//!
//! Nodes are produced by the parser and mutated in place only by the
//! type-resolution and hash-registration passes. Every node carries at least
//! one `Span` for diagnostics.

use crate::report::Span;
use crate::types::Type;

// ─── Program ─────────────────────────────────────────────────────────

/// One compilation unit's parsed top level.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub uses: Vec<UseDecl>,
    pub constants: Vec<ConstDecl>,
    pub structs: Vec<StructDecl>,
    pub enums: Vec<EnumDecl>,
    pub perks: Vec<PerkDecl>,
    pub perk_impls: Vec<ExtendWithDecl>,
    pub functions: Vec<FuncDecl>,
    pub extensions: Vec<ExtendDecl>,
}

/// `use <io/stdio>` (stdlib, angle brackets) or `use helpers` (user unit).
#[derive(Debug, Clone)]
pub struct UseDecl {
    pub path: String,
    pub is_stdlib: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ConstDecl {
    pub name: String,
    pub ty: Option<Type>,
    pub value: Expr,
    pub name_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub type_params: Vec<TypeParamDecl>,
    pub fields: Vec<FieldDecl>,
    pub name_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariantDecl {
    pub name: String,
    pub assoc_types: Vec<Type>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: String,
    pub type_params: Vec<TypeParamDecl>,
    pub variants: Vec<VariantDecl>,
    pub name_span: Span,
    pub span: Span,
}

/// Type parameter with optional perk bounds: `T` or `T: Hashable + Eq`.
#[derive(Debug, Clone)]
pub struct TypeParamDecl {
    pub name: String,
    pub bounds: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub ty: Option<Type>,
    pub name_span: Span,
    pub type_span: Span,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub type_params: Vec<TypeParamDecl>,
    pub params: Vec<ParamDecl>,
    pub ret: Option<Type>,
    /// `| ErrorType` sugar on the return type, if present.
    pub err_type: Option<Type>,
    pub is_public: bool,
    pub body: Block,
    pub name_span: Span,
    pub ret_span: Span,
    pub span: Span,
}

/// `extend <type> <method>(<params>) <ret>:` — an extension method.
/// The target may be a `GenericRef` (generic extension).
#[derive(Debug, Clone)]
pub struct ExtendDecl {
    pub target: Type,
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub ret: Option<Type>,
    pub body: Block,
    pub target_span: Span,
    pub name_span: Span,
    pub ret_span: Span,
    pub span: Span,
}

/// Perk (interface) definition: method signatures only.
#[derive(Debug, Clone)]
pub struct PerkDecl {
    pub name: String,
    pub methods: Vec<PerkMethodSig>,
    pub name_span: Span,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct PerkMethodSig {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub ret: Option<Type>,
    pub span: Span,
}

/// `extend Point with Hashable:` — a perk implementation.
#[derive(Debug, Clone)]
pub struct ExtendWithDecl {
    pub target: Type,
    pub perk_name: String,
    pub methods: Vec<FuncDecl>,
    pub perk_span: Span,
    pub span: Span,
}

// ─── Statements ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `i32 x = e`, `x := e`, or a bare typed declaration.
    Let {
        name: String,
        ty: Option<Type>,
        init: Option<Expr>,
        name_span: Span,
        span: Span,
    },
    Assign {
        target: Expr,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    Return {
        value: Option<Expr>,
        span: Span,
    },
    If {
        cond: Expr,
        then_block: Block,
        elifs: Vec<(Expr, Block)>,
        else_block: Option<Block>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    For {
        var: String,
        iterable: Expr,
        body: Block,
        var_span: Span,
        span: Span,
    },
    Match {
        scrutinee: Expr,
        arms: Vec<MatchArm>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Match { span, .. } => *span,
            Stmt::Expr(e) => e.span(),
            Stmt::Break(span) | Stmt::Continue(span) => *span,
        }
    }
}

/// One match arm: `Some(p): ...` or `Maybe.None: ...`.
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub variant: String,
    pub bindings: Vec<String>,
    pub body: Block,
    pub span: Span,
}

// ─── Expressions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    IntLit {
        value: i64,
        span: Span,
    },
    FloatLit {
        value: f64,
        span: Span,
    },
    BoolLit {
        value: bool,
        span: Span,
    },
    StrLit {
        value: String,
        span: Span,
    },
    ArrayLit {
        elems: Vec<Expr>,
        span: Span,
    },
    /// Variable, constant, or type-name reference. `type_args` is non-empty
    /// for generic receivers like `Maybe<Point>` in `Maybe<Point>.Some(..)`.
    Name {
        id: String,
        type_args: Vec<Type>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    /// Free function call or struct/generic-struct constructor call.
    Call {
        callee: String,
        type_args: Vec<Type>,
        args: Vec<Expr>,
        span: Span,
    },
    /// `recv.method(args)`. Enum constructors and intrinsics are
    /// disambiguated during type checking and emission, never by the parser.
    MethodCall {
        recv: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },
    /// `recv.field` (also `.size` on strings, `.cap`/`.len` reads).
    Field {
        recv: Box<Expr>,
        field: String,
        span: Span,
    },
    Index {
        recv: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    /// `Point{1, 2}` — positional struct literal.
    StructLit {
        name: String,
        type_args: Vec<Type>,
        fields: Vec<Expr>,
        span: Span,
    },
    /// `expr?` — propagate Err to the caller.
    Try {
        expr: Box<Expr>,
        span: Span,
    },
    /// `expr??` — on Err, synthesize the enclosing function's fallback Err
    /// return.
    TryFallback {
        expr: Box<Expr>,
        span: Span,
    },
    /// `cond ? a : b`
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },
    /// `&expr`
    Reference {
        expr: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::IntLit { span, .. }
            | Expr::FloatLit { span, .. }
            | Expr::BoolLit { span, .. }
            | Expr::StrLit { span, .. }
            | Expr::ArrayLit { span, .. }
            | Expr::Name { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::Field { span, .. }
            | Expr::Index { span, .. }
            | Expr::StructLit { span, .. }
            | Expr::Try { span, .. }
            | Expr::TryFallback { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Reference { span, .. } => *span,
        }
    }

    /// The bare identifier if this is a plain (non-generic) name.
    pub fn as_plain_name(&self) -> Option<&str> {
        match self {
            Expr::Name { id, type_args, .. } if type_args.is_empty() => Some(id),
            _ => None,
        }
    }
}

impl Program {
    /// Merge another unit's top level into this one, preserving order.
    /// Used by whole-program emission after per-unit analysis.
    pub fn absorb(&mut self, other: Program) {
        self.uses.extend(other.uses);
        self.constants.extend(other.constants);
        self.structs.extend(other.structs);
        self.enums.extend(other.enums);
        self.perks.extend(other.perks);
        self.perk_impls.extend(other.perk_impls);
        self.functions.extend(other.functions);
        self.extensions.extend(other.extensions);
    }
}
