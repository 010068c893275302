//! Recursive-descent parser.
//!
//! Top-level items, statements, and expressions. Blocks follow a colon and
//! are either inline (`;`-separated, to end of line) or indented. The parser
//! never disambiguates enum constructors from method calls — that is the
//! type checker's job — but it does resolve the `<` ambiguity between
//! comparison and generic argument lists by bounded backtracking.

use crate::report::Span;
use crate::syntax::ast::*;
use crate::syntax::lexer::{Tok, Token};
use crate::types::{BuiltinKind, Type};

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

pub fn parse_tokens(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser { tokens, pos: 0 }.parse_program()
}

/// Rewrite `Unknown(name)` into `TypeParameter(name)` for names bound by an
/// enclosing generic declaration. Applied right after parsing a generic
/// struct/enum/function so type parameters never masquerade as unresolved
/// symbols. Extension targets get the same treatment during collection.
pub fn bind_type_params(ty: &Type, names: &[String]) -> Type {
    match ty {
        Type::Unknown(n) if names.iter().any(|p| p == n) => Type::TypeParameter(n.clone()),
        Type::Array(elem, size) => Type::Array(Box::new(bind_type_params(elem, names)), *size),
        Type::DynamicArray(elem) => Type::DynamicArray(Box::new(bind_type_params(elem, names))),
        Type::Reference(inner) => Type::Reference(Box::new(bind_type_params(inner, names))),
        Type::Pointer(inner) => Type::Pointer(Box::new(bind_type_params(inner, names))),
        Type::Iterator(inner) => Type::Iterator(Box::new(bind_type_params(inner, names))),
        Type::GenericRef { base, args } => Type::GenericRef {
            base: base.clone(),
            args: args.iter().map(|a| bind_type_params(a, names)).collect(),
        },
        Type::Result(ok, err) => Type::Result(
            Box::new(bind_type_params(ok, names)),
            Box::new(bind_type_params(err, names)),
        ),
        other => other.clone(),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    // ─── Token plumbing ─────────────────────────────────────────────

    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_at(&self, n: usize) -> &Tok {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<Token, ParseError> {
        if self.peek() == &tok {
            Ok(self.bump())
        } else {
            Err(self.err(format!("expected {}, found {:?}", what, self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), ParseError> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                let span = self.span();
                self.bump();
                Ok((name, span))
            }
            other => Err(self.err(format!("expected {}, found {:?}", what, other))),
        }
    }

    fn err(&self, message: String) -> ParseError {
        ParseError {
            message,
            span: self.span(),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Tok::Newline) {
            self.bump();
        }
    }

    // ─── Program ────────────────────────────────────────────────────

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();
        loop {
            self.skip_newlines();
            match self.peek() {
                Tok::Eof => break,
                Tok::Use => program.uses.push(self.parse_use()?),
                Tok::Const => program.constants.push(self.parse_const()?),
                Tok::Struct => program.structs.push(self.parse_struct()?),
                Tok::Enum => program.enums.push(self.parse_enum()?),
                Tok::Perk => program.perks.push(self.parse_perk()?),
                Tok::Extend => self.parse_extend_item(&mut program)?,
                Tok::Public | Tok::Fn => program.functions.push(self.parse_fn(false)?),
                other => {
                    return Err(self.err(format!("unexpected top-level token {:?}", other)));
                }
            }
        }
        Ok(program)
    }

    fn parse_use(&mut self) -> Result<UseDecl, ParseError> {
        let start = self.span();
        self.bump(); // use
        if self.eat(&Tok::Lt) {
            // stdlib import: use <io/stdio>
            let mut path = String::new();
            loop {
                match self.bump().tok {
                    Tok::Ident(part) => path.push_str(&part),
                    Tok::Slash => path.push('/'),
                    Tok::Gt => break,
                    other => {
                        return Err(self.err(format!("invalid stdlib path token {:?}", other)));
                    }
                }
            }
            Ok(UseDecl {
                path,
                is_stdlib: true,
                span: start.to(self.prev_span()),
            })
        } else {
            let (path, _) = self.expect_ident("unit name after 'use'")?;
            Ok(UseDecl {
                path,
                is_stdlib: false,
                span: start.to(self.prev_span()),
            })
        }
    }

    fn parse_const(&mut self) -> Result<ConstDecl, ParseError> {
        let start = self.span();
        self.bump(); // const
        let (name, name_span) = self.expect_ident("constant name")?;
        // Type is required, but collection reports the miss; keep parsing.
        let ty = if matches!(self.peek(), Tok::Assign) {
            None
        } else {
            Some(self.parse_type()?)
        };
        self.expect(Tok::Assign, "'=' in constant definition")?;
        let value = self.parse_expr()?;
        Ok(ConstDecl {
            name,
            ty,
            value,
            name_span,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_type_params(&mut self) -> Result<Vec<TypeParamDecl>, ParseError> {
        // Caller has already seen '<'
        let mut params = Vec::new();
        self.expect(Tok::Lt, "'<'")?;
        loop {
            let (name, span) = self.expect_ident("type parameter name")?;
            let mut bounds = Vec::new();
            if self.eat(&Tok::Colon) {
                loop {
                    let (bound, _) = self.expect_ident("perk bound")?;
                    bounds.push(bound);
                    if !self.eat(&Tok::Plus) {
                        break;
                    }
                }
            }
            params.push(TypeParamDecl { name, bounds, span });
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::Gt, "'>' after type parameters")?;
        Ok(params)
    }

    fn parse_struct(&mut self) -> Result<StructDecl, ParseError> {
        let start = self.span();
        self.bump(); // struct
        let (name, name_span) = self.expect_ident("struct name")?;
        let type_params = if matches!(self.peek(), Tok::Lt) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        let mut fields = Vec::new();
        if self.eat(&Tok::LBrace) {
            // Inline form: struct Point{i32 x, i32 y}
            while !self.eat(&Tok::RBrace) {
                fields.push(self.parse_field()?);
                if !self.eat(&Tok::Comma) {
                    self.expect(Tok::RBrace, "'}' after struct fields")?;
                    break;
                }
            }
        } else {
            // Block form
            self.expect(Tok::Colon, "'{' or ':' after struct name")?;
            self.expect(Tok::Newline, "newline after ':'")?;
            self.expect(Tok::Indent, "indented struct body")?;
            loop {
                self.skip_newlines();
                if self.eat(&Tok::Dedent) {
                    break;
                }
                fields.push(self.parse_field()?);
                if !matches!(self.peek(), Tok::Dedent) {
                    self.expect(Tok::Newline, "newline after field")?;
                }
            }
        }
        if !type_params.is_empty() {
            let names: Vec<String> = type_params.iter().map(|p| p.name.clone()).collect();
            for field in &mut fields {
                field.ty = bind_type_params(&field.ty, &names);
            }
        }
        Ok(StructDecl {
            name,
            type_params,
            fields,
            name_span,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_field(&mut self) -> Result<FieldDecl, ParseError> {
        let start = self.span();
        let ty = self.parse_type()?;
        let (name, _) = self.expect_ident("field name")?;
        Ok(FieldDecl {
            name,
            ty,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_enum(&mut self) -> Result<EnumDecl, ParseError> {
        let start = self.span();
        self.bump(); // enum
        let (name, name_span) = self.expect_ident("enum name")?;
        let type_params = if matches!(self.peek(), Tok::Lt) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };

        let mut variants = Vec::new();
        if self.eat(&Tok::LBrace) {
            while !self.eat(&Tok::RBrace) {
                variants.push(self.parse_variant()?);
                if !self.eat(&Tok::Comma) {
                    self.expect(Tok::RBrace, "'}' after enum variants")?;
                    break;
                }
            }
        } else {
            self.expect(Tok::Colon, "'{' or ':' after enum name")?;
            self.expect(Tok::Newline, "newline after ':'")?;
            self.expect(Tok::Indent, "indented enum body")?;
            loop {
                self.skip_newlines();
                if self.eat(&Tok::Dedent) {
                    break;
                }
                variants.push(self.parse_variant()?);
                if !matches!(self.peek(), Tok::Dedent) {
                    self.expect(Tok::Newline, "newline after variant")?;
                }
            }
        }
        if !type_params.is_empty() {
            let names: Vec<String> = type_params.iter().map(|p| p.name.clone()).collect();
            for variant in &mut variants {
                for ty in &mut variant.assoc_types {
                    *ty = bind_type_params(ty, &names);
                }
            }
        }
        Ok(EnumDecl {
            name,
            type_params,
            variants,
            name_span,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_variant(&mut self) -> Result<VariantDecl, ParseError> {
        let start = self.span();
        let (name, _) = self.expect_ident("variant name")?;
        let mut assoc_types = Vec::new();
        if self.eat(&Tok::LParen) {
            while !self.eat(&Tok::RParen) {
                assoc_types.push(self.parse_type()?);
                if !self.eat(&Tok::Comma) {
                    self.expect(Tok::RParen, "')' after variant types")?;
                    break;
                }
            }
        }
        Ok(VariantDecl {
            name,
            assoc_types,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_perk(&mut self) -> Result<PerkDecl, ParseError> {
        let start = self.span();
        self.bump(); // perk
        let (name, name_span) = self.expect_ident("perk name")?;
        self.expect(Tok::Colon, "':' after perk name")?;
        self.expect(Tok::Newline, "newline after ':'")?;
        self.expect(Tok::Indent, "indented perk body")?;
        let mut methods = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&Tok::Dedent) {
                break;
            }
            let sig_start = self.span();
            self.expect(Tok::Fn, "'fn' method signature")?;
            let (mname, _) = self.expect_ident("method name")?;
            let params = self.parse_params()?;
            let ret = self.parse_return_type()?;
            methods.push(PerkMethodSig {
                name: mname,
                params,
                ret,
                span: sig_start.to(self.prev_span()),
            });
            if !matches!(self.peek(), Tok::Dedent) {
                self.expect(Tok::Newline, "newline after method signature")?;
            }
        }
        Ok(PerkDecl {
            name,
            methods,
            name_span,
            span: start.to(self.prev_span()),
        })
    }

    /// `extend <type> with <Perk>: …` (perk impl) or
    /// `extend <type> <method>(…) <ret>: …` (extension method).
    fn parse_extend_item(&mut self, program: &mut Program) -> Result<(), ParseError> {
        let start = self.span();
        self.bump(); // extend
        let target_span = self.span();
        let target = self.parse_type()?;

        if self.eat(&Tok::With) {
            let perk_span = self.span();
            let (perk_name, _) = self.expect_ident("perk name after 'with'")?;
            self.expect(Tok::Colon, "':' after perk name")?;
            self.expect(Tok::Newline, "newline after ':'")?;
            self.expect(Tok::Indent, "indented perk implementation body")?;
            let mut methods = Vec::new();
            loop {
                self.skip_newlines();
                if self.eat(&Tok::Dedent) {
                    break;
                }
                methods.push(self.parse_fn(true)?);
            }
            program.perk_impls.push(ExtendWithDecl {
                target,
                perk_name,
                methods,
                perk_span,
                span: start.to(self.prev_span()),
            });
            return Ok(());
        }

        let (name, name_span) = self.expect_ident("extension method name")?;
        let params = self.parse_params()?;
        let ret_span = self.span();
        let ret = self.parse_return_type()?;
        let body = self.parse_block()?;
        program.extensions.push(ExtendDecl {
            target,
            name,
            params,
            ret,
            body,
            target_span,
            name_span,
            ret_span,
            span: start.to(self.prev_span()),
        });
        Ok(())
    }

    fn parse_fn(&mut self, inside_impl: bool) -> Result<FuncDecl, ParseError> {
        let start = self.span();
        let is_public = self.eat(&Tok::Public);
        self.expect(Tok::Fn, "'fn'")?;
        let (name, name_span) = self.expect_ident("function name")?;
        let type_params = if matches!(self.peek(), Tok::Lt) {
            self.parse_type_params()?
        } else {
            Vec::new()
        };
        let mut params = self.parse_params()?;
        let ret_span = self.span();
        let mut ret = self.parse_return_type()?;
        // `| ErrorType` sugar
        let err_type = if self.eat(&Tok::Pipe) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        let _ = inside_impl;
        if !type_params.is_empty() {
            let names: Vec<String> = type_params.iter().map(|p| p.name.clone()).collect();
            for param in &mut params {
                if let Some(ty) = &param.ty {
                    param.ty = Some(bind_type_params(ty, &names));
                }
            }
            if let Some(ty) = &ret {
                ret = Some(bind_type_params(ty, &names));
            }
        }
        Ok(FuncDecl {
            name,
            type_params,
            params,
            ret,
            err_type,
            is_public,
            body,
            name_span,
            ret_span,
            span: start.to(self.prev_span()),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<ParamDecl>, ParseError> {
        self.expect(Tok::LParen, "'(' before parameters")?;
        let mut params = Vec::new();
        let mut index = 0usize;
        while !self.eat(&Tok::RParen) {
            let type_span = self.span();
            let ty = self.parse_type()?;
            let (name, name_span) = self.expect_ident("parameter name")?;
            params.push(ParamDecl {
                name,
                ty: Some(ty),
                name_span,
                type_span,
                index,
            });
            index += 1;
            if !self.eat(&Tok::Comma) {
                self.expect(Tok::RParen, "')' after parameters")?;
                break;
            }
        }
        Ok(params)
    }

    /// Return type before the colon, `~` for procedures. Missing return
    /// types are tolerated here and reported during collection.
    fn parse_return_type(&mut self) -> Result<Option<Type>, ParseError> {
        match self.peek() {
            Tok::Colon | Tok::Newline | Tok::Pipe => Ok(None),
            Tok::Tilde => {
                self.bump();
                Ok(Some(Type::Builtin(BuiltinKind::Blank)))
            }
            _ => Ok(Some(self.parse_type()?)),
        }
    }

    // ─── Types ──────────────────────────────────────────────────────

    fn parse_type(&mut self) -> Result<Type, ParseError> {
        if self.eat(&Tok::Amp) {
            let inner = self.parse_type()?;
            return Ok(Type::Reference(Box::new(inner)));
        }
        if self.eat(&Tok::Tilde) {
            return Ok(Type::Builtin(BuiltinKind::Blank));
        }

        let (name, _) = self.expect_ident("type name")?;
        let mut ty = if let Some(kind) = BuiltinKind::from_name(&name) {
            Type::Builtin(kind)
        } else if matches!(self.peek(), Tok::Lt) && self.generic_args_follow() {
            let args = self.parse_type_args()?;
            Type::GenericRef { base: name, args }
        } else {
            Type::Unknown(name)
        };

        // Array suffixes: T[], T[4], nesting allowed left-to-right
        loop {
            if matches!(self.peek(), Tok::LBracket) {
                match self.peek_at(1) {
                    Tok::RBracket => {
                        self.bump();
                        self.bump();
                        ty = Type::DynamicArray(Box::new(ty));
                    }
                    Tok::Int(_) => {
                        self.bump();
                        let size = match self.bump().tok {
                            Tok::Int(n) => n as u32,
                            _ => unreachable!(),
                        };
                        self.expect(Tok::RBracket, "']' after array size")?;
                        ty = Type::Array(Box::new(ty), size);
                    }
                    _ => break,
                }
            } else if matches!(self.peek(), Tok::Star) {
                self.bump();
                ty = Type::Pointer(Box::new(ty));
            } else {
                break;
            }
        }
        Ok(ty)
    }

    /// Lookahead check: does `<` here start a type argument list?
    /// Tries a speculative parse and rewinds.
    fn generic_args_follow(&mut self) -> bool {
        let save = self.pos;
        let ok = self.parse_type_args().is_ok();
        self.pos = save;
        ok
    }

    fn parse_type_args(&mut self) -> Result<Vec<Type>, ParseError> {
        self.expect(Tok::Lt, "'<'")?;
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::Gt, "'>' after type arguments")?;
        Ok(args)
    }

    // ─── Blocks & statements ────────────────────────────────────────

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.expect(Tok::Colon, "':' before block")?;
        let mut stmts = Vec::new();
        if self.eat(&Tok::Newline) {
            self.expect(Tok::Indent, "indented block")?;
            loop {
                self.skip_newlines();
                if self.eat(&Tok::Dedent) {
                    break;
                }
                stmts.push(self.parse_stmt()?);
                // Compound statements consume their own trailing newline
                // before the dedent, so the separator here is optional.
                if matches!(self.peek(), Tok::Newline) {
                    self.bump();
                }
            }
        } else {
            // Inline block: stmt (';' stmt)* to end of line
            loop {
                stmts.push(self.parse_stmt()?);
                if !self.eat(&Tok::Semicolon) {
                    break;
                }
                if matches!(self.peek(), Tok::Newline | Tok::Eof) {
                    break;
                }
            }
            if matches!(self.peek(), Tok::Newline) {
                self.bump();
            }
        }
        Ok(Block { stmts })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Tok::Return => {
                let span = self.span();
                self.bump();
                let value = if matches!(
                    self.peek(),
                    Tok::Newline | Tok::Semicolon | Tok::Dedent | Tok::Eof
                ) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                Ok(Stmt::Return {
                    value,
                    span: span.to(self.prev_span()),
                })
            }
            Tok::If => self.parse_if(),
            Tok::While => {
                let span = self.span();
                self.bump();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::While {
                    cond,
                    body,
                    span: span.to(self.prev_span()),
                })
            }
            Tok::For => {
                let span = self.span();
                self.bump();
                let (var, var_span) = self.expect_ident("loop variable")?;
                self.expect(Tok::In, "'in' in for loop")?;
                let iterable = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::For {
                    var,
                    iterable,
                    body,
                    var_span,
                    span: span.to(self.prev_span()),
                })
            }
            Tok::Match => self.parse_match(),
            Tok::Break => {
                let span = self.span();
                self.bump();
                Ok(Stmt::Break(span))
            }
            Tok::Continue => {
                let span = self.span();
                self.bump();
                Ok(Stmt::Continue(span))
            }
            _ => self.parse_decl_or_expr_stmt(),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let span = self.span();
        self.bump(); // if
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let mut elifs = Vec::new();
        let mut else_block = None;
        loop {
            // elif/else appear at the same indent level, after the block
            let save = self.pos;
            self.skip_newlines();
            match self.peek() {
                Tok::Elif => {
                    self.bump();
                    let c = self.parse_expr()?;
                    let b = self.parse_block()?;
                    elifs.push((c, b));
                }
                Tok::Else => {
                    self.bump();
                    else_block = Some(self.parse_block()?);
                    break;
                }
                _ => {
                    self.pos = save;
                    break;
                }
            }
        }
        Ok(Stmt::If {
            cond,
            then_block,
            elifs,
            else_block,
            span: span.to(self.prev_span()),
        })
    }

    fn parse_match(&mut self) -> Result<Stmt, ParseError> {
        let span = self.span();
        self.bump(); // match
        let scrutinee = self.parse_expr()?;
        self.expect(Tok::Colon, "':' after match scrutinee")?;
        self.expect(Tok::Newline, "newline after ':'")?;
        self.expect(Tok::Indent, "indented match arms")?;
        let mut arms = Vec::new();
        loop {
            self.skip_newlines();
            if self.eat(&Tok::Dedent) {
                break;
            }
            let arm_span = self.span();
            let (mut variant, _) = self.expect_ident("variant name")?;
            // Allow qualified `Enum.Variant`
            if self.eat(&Tok::Dot) {
                let (v, _) = self.expect_ident("variant name")?;
                variant = v;
            }
            let mut bindings = Vec::new();
            if self.eat(&Tok::LParen) {
                while !self.eat(&Tok::RParen) {
                    let (b, _) = self.expect_ident("binding name")?;
                    bindings.push(b);
                    if !self.eat(&Tok::Comma) {
                        self.expect(Tok::RParen, "')' after bindings")?;
                        break;
                    }
                }
            }
            let body = self.parse_block()?;
            arms.push(MatchArm {
                variant,
                bindings,
                body,
                span: arm_span.to(self.prev_span()),
            });
        }
        Ok(Stmt::Match {
            scrutinee,
            arms,
            span: span.to(self.prev_span()),
        })
    }

    /// Disambiguate `Point p = …` / `i32[] xs = …` declarations from
    /// assignments and expression statements by speculative type parse.
    fn parse_decl_or_expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.span();
        let save = self.pos;

        if let Ok(ty) = self.parse_type() {
            if let Tok::Ident(_) = self.peek() {
                let (name, name_span) = self.expect_ident("variable name")?;
                let init = if self.eat(&Tok::Assign) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                if matches!(
                    self.peek(),
                    Tok::Newline | Tok::Semicolon | Tok::Dedent | Tok::Eof
                ) {
                    return Ok(Stmt::Let {
                        name,
                        ty: Some(ty),
                        init,
                        name_span,
                        span: start.to(self.prev_span()),
                    });
                }
            }
        }
        self.pos = save;

        let expr = self.parse_expr()?;
        if self.eat(&Tok::Assign) {
            let value = self.parse_expr()?;
            return Ok(Stmt::Assign {
                target: expr,
                value,
                span: start.to(self.prev_span()),
            });
        }
        Ok(Stmt::Expr(expr))
    }

    // ─── Expressions ────────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if matches!(self.peek(), Tok::Question) && !self.question_is_postfix() {
            let span = cond.span();
            self.bump();
            let then_expr = self.parse_expr()?;
            self.expect(Tok::Colon, "':' in ternary expression")?;
            let else_expr = self.parse_expr()?;
            return Ok(Expr::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
                span: span.to(self.prev_span()),
            });
        }
        Ok(cond)
    }

    /// A lone `?` is Result propagation when it ends the expression
    /// (next-next token closes the context); otherwise it opens a ternary.
    fn question_is_postfix(&self) -> bool {
        matches!(
            self.peek_at(1),
            Tok::Newline
                | Tok::Semicolon
                | Tok::Dedent
                | Tok::Eof
                | Tok::RParen
                | Tok::RBracket
                | Tok::Comma
        )
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Tok::Or) {
            self.bump();
            let rhs = self.parse_and()?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        while matches!(self.peek(), Tok::And) {
            self.bump();
            let rhs = self.parse_comparison()?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                op: BinaryOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Tok::EqEq => BinaryOp::Eq,
            Tok::NotEq => BinaryOp::Ne,
            Tok::Lt => BinaryOp::Lt,
            Tok::Le => BinaryOp::Le,
            Tok::Gt => BinaryOp::Gt,
            Tok::Ge => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.parse_additive()?;
        let span = lhs.span().to(rhs.span());
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinaryOp::Add,
                Tok::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinaryOp::Mul,
                Tok::Slash => BinaryOp::Div,
                Tok::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        match self.peek() {
            Tok::Minus => {
                self.bump();
                let expr = self.parse_unary()?;
                let span = span.to(expr.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                    span,
                })
            }
            Tok::Not => {
                self.bump();
                let expr = self.parse_unary()?;
                let span = span.to(expr.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                    span,
                })
            }
            Tok::Amp => {
                self.bump();
                let expr = self.parse_unary()?;
                let span = span.to(expr.span());
                Ok(Expr::Reference {
                    expr: Box::new(expr),
                    span,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.bump();
                    let (name, name_span) = self.expect_ident("member name")?;
                    if matches!(self.peek(), Tok::LParen) {
                        let args = self.parse_call_args()?;
                        let span = expr.span().to(self.prev_span());
                        expr = Expr::MethodCall {
                            recv: Box::new(expr),
                            method: name,
                            args,
                            span,
                        };
                    } else {
                        let span = expr.span().to(name_span);
                        expr = Expr::Field {
                            recv: Box::new(expr),
                            field: name,
                            span,
                        };
                    }
                }
                Tok::LBracket => {
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(Tok::RBracket, "']' after index")?;
                    let span = expr.span().to(self.prev_span());
                    expr = Expr::Index {
                        recv: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                Tok::QuestionQuestion => {
                    let span = expr.span().to(self.span());
                    self.bump();
                    expr = Expr::TryFallback {
                        expr: Box::new(expr),
                        span,
                    };
                }
                Tok::Question if self.question_is_postfix() => {
                    let span = expr.span().to(self.span());
                    self.bump();
                    expr = Expr::Try {
                        expr: Box::new(expr),
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.span();
        match self.peek().clone() {
            Tok::Int(value) => {
                self.bump();
                Ok(Expr::IntLit { value, span })
            }
            Tok::Float(value) => {
                self.bump();
                Ok(Expr::FloatLit { value, span })
            }
            Tok::True => {
                self.bump();
                Ok(Expr::BoolLit { value: true, span })
            }
            Tok::False => {
                self.bump();
                Ok(Expr::BoolLit { value: false, span })
            }
            Tok::Str(value) => {
                self.bump();
                Ok(Expr::StrLit { value, span })
            }
            Tok::LParen => {
                self.bump();
                let expr = self.parse_expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(expr)
            }
            Tok::LBracket => {
                self.bump();
                let mut elems = Vec::new();
                while !self.eat(&Tok::RBracket) {
                    elems.push(self.parse_expr()?);
                    if !self.eat(&Tok::Comma) {
                        self.expect(Tok::RBracket, "']' after array literal")?;
                        break;
                    }
                }
                Ok(Expr::ArrayLit {
                    elems,
                    span: span.to(self.prev_span()),
                })
            }
            Tok::Ident(id) => {
                self.bump();
                self.parse_name_continuation(id, span)
            }
            other => Err(self.err(format!("unexpected token {:?} in expression", other))),
        }
    }

    /// After an identifier: `<T, …>` type arguments, a call, a struct
    /// literal, or a plain name. `<` falls back to comparison when a
    /// speculative type-argument parse fails or nothing usable follows.
    fn parse_name_continuation(&mut self, id: String, span: Span) -> Result<Expr, ParseError> {
        let mut type_args = Vec::new();
        if matches!(self.peek(), Tok::Lt) {
            let save = self.pos;
            if let Ok(args) = self.parse_type_args() {
                if matches!(self.peek(), Tok::LParen | Tok::Dot | Tok::LBrace) {
                    type_args = args;
                } else {
                    self.pos = save;
                }
            } else {
                self.pos = save;
            }
        }

        match self.peek() {
            Tok::LParen => {
                let args = self.parse_call_args()?;
                Ok(Expr::Call {
                    callee: id,
                    type_args,
                    args,
                    span: span.to(self.prev_span()),
                })
            }
            Tok::LBrace => {
                self.bump();
                let mut fields = Vec::new();
                while !self.eat(&Tok::RBrace) {
                    fields.push(self.parse_expr()?);
                    if !self.eat(&Tok::Comma) {
                        self.expect(Tok::RBrace, "'}' after struct literal")?;
                        break;
                    }
                }
                Ok(Expr::StructLit {
                    name: id,
                    type_args,
                    fields,
                    span: span.to(self.prev_span()),
                })
            }
            _ => Ok(Expr::Name {
                id,
                type_args,
                span,
            }),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(Tok::LParen, "'('")?;
        let mut args = Vec::new();
        while !self.eat(&Tok::RParen) {
            args.push(self.parse_expr()?);
            if !self.eat(&Tok::Comma) {
                self.expect(Tok::RParen, "')' after arguments")?;
                break;
            }
        }
        Ok(args)
    }
}
