//! Hand-written lexer with indentation tracking.
//!
//! Produces a flat token stream with explicit `Indent`/`Dedent`/`Newline`
//! tokens so the parser can treat blocks uniformly. `#` starts a comment
//! running to end of line. Blank and comment-only lines produce no tokens.

use crate::report::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),

    // Keywords
    Fn,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Match,
    Break,
    Continue,
    Struct,
    Enum,
    Perk,
    Extend,
    With,
    Use,
    Const,
    Public,
    True,
    False,
    And,
    Or,
    Not,

    // Punctuation / operators
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Question,
    QuestionQuestion,
    Pipe,
    Amp,
    Tilde,

    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub tok: Tok,
    pub span: Span,
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(file_id: u32, src: &str) -> Result<Vec<Token>, LexError> {
    Lexer {
        file_id,
        bytes: src.as_bytes(),
        pos: 0,
        tokens: Vec::new(),
        indents: vec![0],
        at_line_start: true,
        paren_depth: 0,
    }
    .run()
}

struct Lexer<'a> {
    file_id: u32,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    at_line_start: bool,
    /// Inside (...) or [...] newlines are insignificant.
    paren_depth: u32,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Result<Vec<Token>, LexError> {
        while self.pos < self.bytes.len() {
            if self.at_line_start && self.paren_depth == 0 {
                self.handle_indentation();
                if self.pos >= self.bytes.len() {
                    break;
                }
            }
            let b = self.bytes[self.pos];
            match b {
                b' ' | b'\t' | b'\r' => {
                    self.pos += 1;
                }
                b'#' => {
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                b'\n' => {
                    self.pos += 1;
                    if self.paren_depth == 0 {
                        // Collapse consecutive newlines
                        if !matches!(
                            self.tokens.last().map(|t| &t.tok),
                            Some(Tok::Newline) | Some(Tok::Indent) | Some(Tok::Dedent) | None
                        ) {
                            self.push_at(Tok::Newline, self.pos as u32 - 1, self.pos as u32);
                        }
                        self.at_line_start = true;
                    }
                }
                b'"' => self.lex_string()?,
                b'0'..=b'9' => self.lex_number()?,
                _ if b.is_ascii_alphabetic() || b == b'_' => self.lex_ident(),
                _ => self.lex_symbol()?,
            }
        }

        // Close any open blocks at EOF
        let end = self.bytes.len() as u32;
        if !matches!(self.tokens.last().map(|t| &t.tok), Some(Tok::Newline) | None) {
            self.push_at(Tok::Newline, end, end);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_at(Tok::Dedent, end, end);
        }
        self.push_at(Tok::Eof, end, end);
        Ok(self.tokens)
    }

    fn handle_indentation(&mut self) {
        // Measure leading spaces of the next non-blank, non-comment line
        loop {
            let line_start = self.pos;
            let mut col = 0usize;
            while self.pos < self.bytes.len() {
                match self.bytes[self.pos] {
                    b' ' => {
                        col += 1;
                        self.pos += 1;
                    }
                    b'\t' => {
                        col += 4;
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
            if self.pos >= self.bytes.len() {
                return;
            }
            match self.bytes[self.pos] {
                b'\n' => {
                    self.pos += 1;
                    continue; // blank line
                }
                b'#' => {
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                    continue;
                }
                _ => {
                    let current = *self.indents.last().unwrap();
                    let here = line_start as u32;
                    if col > current {
                        self.indents.push(col);
                        self.push_at(Tok::Indent, here, self.pos as u32);
                    } else {
                        while col < *self.indents.last().unwrap() && self.indents.len() > 1 {
                            self.indents.pop();
                            self.push_at(Tok::Dedent, here, self.pos as u32);
                        }
                    }
                    self.at_line_start = false;
                    return;
                }
            }
        }
    }

    fn lex_string(&mut self) -> Result<(), LexError> {
        let start = self.pos as u32;
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            if self.pos >= self.bytes.len() {
                return Err(self.err("unterminated string literal", start));
            }
            match self.bytes[self.pos] {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    self.pos += 1;
                    let esc = *self
                        .bytes
                        .get(self.pos)
                        .ok_or_else(|| self.err("unterminated escape", start))?;
                    out.push(match esc {
                        b'n' => '\n',
                        b't' => '\t',
                        b'r' => '\r',
                        b'0' => '\0',
                        b'\\' => '\\',
                        b'"' => '"',
                        other => {
                            return Err(self.err(
                                &format!("unknown escape '\\{}'", other as char),
                                start,
                            ));
                        }
                    });
                    self.pos += 1;
                }
                _ => {
                    // Copy raw bytes; source is UTF-8 so this stays valid
                    let ch_start = self.pos;
                    let ch_len = utf8_len(self.bytes[self.pos]);
                    self.pos += ch_len;
                    out.push_str(
                        std::str::from_utf8(&self.bytes[ch_start..self.pos])
                            .map_err(|_| self.err("invalid UTF-8 in string", start))?,
                    );
                }
            }
        }
        self.push_at(Tok::Str(out), start, self.pos as u32);
        Ok(())
    }

    fn lex_number(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.pos + 1 < self.bytes.len()
            && self.bytes[self.pos] == b'.'
            && self.bytes[self.pos + 1].is_ascii_digit()
        {
            is_float = true;
            self.pos += 1;
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        let tok = if is_float {
            Tok::Float(
                text.parse()
                    .map_err(|_| self.err("invalid float literal", start as u32))?,
            )
        } else {
            Tok::Int(
                text.parse()
                    .map_err(|_| self.err("integer literal out of range", start as u32))?,
            )
        };
        self.push_at(tok, start as u32, self.pos as u32);
        Ok(())
    }

    fn lex_ident(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap();
        let tok = match text {
            "fn" => Tok::Fn,
            "return" => Tok::Return,
            "if" => Tok::If,
            "elif" => Tok::Elif,
            "else" => Tok::Else,
            "while" => Tok::While,
            "for" => Tok::For,
            "in" => Tok::In,
            "match" => Tok::Match,
            "break" => Tok::Break,
            "continue" => Tok::Continue,
            "struct" => Tok::Struct,
            "enum" => Tok::Enum,
            "perk" => Tok::Perk,
            "extend" => Tok::Extend,
            "with" => Tok::With,
            "use" => Tok::Use,
            "const" => Tok::Const,
            "public" => Tok::Public,
            "true" => Tok::True,
            "false" => Tok::False,
            "and" => Tok::And,
            "or" => Tok::Or,
            "not" => Tok::Not,
            _ => Tok::Ident(text.to_string()),
        };
        self.push_at(tok, start as u32, self.pos as u32);
    }

    fn lex_symbol(&mut self) -> Result<(), LexError> {
        let start = self.pos as u32;
        let b = self.bytes[self.pos];
        let next = self.bytes.get(self.pos + 1).copied();
        let (tok, len) = match (b, next) {
            (b'=', Some(b'=')) => (Tok::EqEq, 2),
            (b'!', Some(b'=')) => (Tok::NotEq, 2),
            (b'<', Some(b'=')) => (Tok::Le, 2),
            (b'>', Some(b'=')) => (Tok::Ge, 2),
            (b'?', Some(b'?')) => (Tok::QuestionQuestion, 2),
            (b'(', _) => {
                self.paren_depth += 1;
                (Tok::LParen, 1)
            }
            (b')', _) => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                (Tok::RParen, 1)
            }
            (b'[', _) => {
                self.paren_depth += 1;
                (Tok::LBracket, 1)
            }
            (b']', _) => {
                self.paren_depth = self.paren_depth.saturating_sub(1);
                (Tok::RBracket, 1)
            }
            (b'{', _) => (Tok::LBrace, 1),
            (b'}', _) => (Tok::RBrace, 1),
            (b',', _) => (Tok::Comma, 1),
            (b':', _) => (Tok::Colon, 1),
            (b';', _) => (Tok::Semicolon, 1),
            (b'.', _) => (Tok::Dot, 1),
            (b'+', _) => (Tok::Plus, 1),
            (b'-', _) => (Tok::Minus, 1),
            (b'*', _) => (Tok::Star, 1),
            (b'/', _) => (Tok::Slash, 1),
            (b'%', _) => (Tok::Percent, 1),
            (b'=', _) => (Tok::Assign, 1),
            (b'<', _) => (Tok::Lt, 1),
            (b'>', _) => (Tok::Gt, 1),
            (b'?', _) => (Tok::Question, 1),
            (b'|', _) => (Tok::Pipe, 1),
            (b'&', _) => (Tok::Amp, 1),
            (b'~', _) => (Tok::Tilde, 1),
            _ => {
                return Err(self.err(&format!("unexpected character '{}'", b as char), start));
            }
        };
        self.pos += len;
        self.push_at(tok, start, self.pos as u32);
        Ok(())
    }

    fn push_at(&mut self, tok: Tok, start: u32, end: u32) {
        self.tokens.push(Token {
            tok,
            span: Span::new(self.file_id, start, end),
        });
    }

    fn err(&self, message: &str, start: u32) -> LexError {
        LexError {
            message: message.to_string(),
            span: Span::new(self.file_id, start, self.pos as u32 + 1),
        }
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        lex(0, src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn simple_function_line() {
        let toks = kinds("fn main() i32: return 0\n");
        assert_eq!(
            toks,
            vec![
                Tok::Fn,
                Tok::Ident("main".into()),
                Tok::LParen,
                Tok::RParen,
                Tok::Ident("i32".into()),
                Tok::Colon,
                Tok::Return,
                Tok::Int(0),
                Tok::Newline,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn indentation_produces_indent_dedent() {
        let toks = kinds("fn f() i32:\n    return 1\nfn g() i32:\n    return 2\n");
        let indents = toks.iter().filter(|t| **t == Tok::Indent).count();
        let dedents = toks.iter().filter(|t| **t == Tok::Dedent).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
    }

    #[test]
    fn string_escapes() {
        let toks = kinds("\"hi\\n\"\n");
        assert_eq!(toks[0], Tok::Str("hi\n".into()));
    }

    #[test]
    fn utf8_in_string_preserved() {
        let toks = kinds("\"ð\"\n");
        assert_eq!(toks[0], Tok::Str("ð".into()));
    }

    #[test]
    fn double_question_is_one_token() {
        let toks = kinds("x??\n");
        assert_eq!(toks[1], Tok::QuestionQuestion);
    }

    #[test]
    fn newlines_inside_parens_ignored() {
        let toks = kinds("f(1,\n  2)\n");
        assert!(!toks[..toks.len() - 2].contains(&Tok::Newline));
    }

    #[test]
    fn comments_are_skipped() {
        let toks = kinds("# header\nreturn 0 # trailing\n");
        assert_eq!(toks[0], Tok::Return);
    }

    #[test]
    fn blank_lines_do_not_dedent() {
        let toks = kinds("fn f() i32:\n    x = 1\n\n    return x\n");
        let dedents = toks.iter().filter(|t| **t == Tok::Dedent).count();
        assert_eq!(dedents, 1);
    }
}
