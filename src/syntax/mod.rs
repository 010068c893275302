//! Surface syntax: AST, lexer, parser, and unit loading.
//!
//! The semantic pipeline consumes `Program` values; everything in this
//! module exists to produce them from source text.

pub mod ast;
mod lexer;
mod parser;

pub use lexer::{lex, LexError, Tok, Token};
pub use parser::{bind_type_params, parse_tokens, ParseError};

use crate::report::Span;

#[derive(Debug, thiserror::Error)]
pub enum SyntaxError {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Parse(#[from] ParseError),
}

impl SyntaxError {
    pub fn span(&self) -> Span {
        match self {
            SyntaxError::Lex(e) => e.span,
            SyntaxError::Parse(e) => e.span,
        }
    }
}

/// Parse one compilation unit. `file_id` must come from the `Reporter`'s
/// source map so diagnostic spans resolve.
pub fn parse_unit(file_id: u32, src: &str) -> Result<ast::Program, SyntaxError> {
    let tokens = lex(file_id, src)?;
    Ok(parse_tokens(tokens)?)
}

#[cfg(test)]
#[path = "syntax_tests.rs"]
mod tests;
