//! Diagnostics: spans, the error/warning reporter, and the stable code catalog.
//!
//! Every diagnostic renders as one line: `path:line:col: CE####: message`.
//! Warnings use a `WARN` prefix instead of a code severity marker. Codes are
//! stable — new codes may be added, existing ones are never renumbered.

pub mod codes;

pub use codes::Code;

use std::fmt;

// ─── Spans ───────────────────────────────────────────────────────────

/// Byte range inside one source file. `file_id` indexes into the
/// compilation's source map; `start`/`end` are byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub file_id: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file_id: u32, start: u32, end: u32) -> Self {
        Span {
            file_id,
            start,
            end,
        }
    }

    /// Synthetic span for predefined symbols (no source location).
    pub fn builtin() -> Self {
        Span {
            file_id: u32::MAX,
            start: 0,
            end: 0,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.file_id == u32::MAX
    }

    /// Smallest span covering both operands.
    pub fn to(self, other: Span) -> Span {
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

// ─── Source map ──────────────────────────────────────────────────────

/// One loaded source file plus a precomputed line-start table.
#[derive(Debug)]
struct SourceFile {
    path: String,
    line_starts: Vec<u32>,
}

impl SourceFile {
    fn new(path: String, text: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        SourceFile { path, line_starts }
    }

    /// 1-based (line, col) for a byte offset.
    fn line_col(&self, offset: u32) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line];
        (line as u32 + 1, col + 1)
    }
}

// ─── Diagnostics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Code,
    pub span: Span,
    pub message: String,
}

/// Shared sink for all passes. Each pass appends; the pipeline checks
/// `has_errors()` at pass boundaries to decide whether to continue.
#[derive(Debug, Default)]
pub struct Reporter {
    files: Vec<SourceFile>,
    pub items: Vec<Diagnostic>,
}

impl Reporter {
    pub fn new() -> Self {
        Reporter::default()
    }

    /// Register a source file, returning its `file_id` for spans.
    pub fn add_file(&mut self, path: &str, text: &str) -> u32 {
        self.files.push(SourceFile::new(path.to_string(), text));
        (self.files.len() - 1) as u32
    }

    pub fn error(&mut self, code: Code, span: Span, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Error,
            code,
            span,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, code: Code, span: Span, message: impl Into<String>) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            code,
            span,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// Human-readable location for "previously defined at ..." messages.
    pub fn format_location(&self, span: Span) -> String {
        if span.is_builtin() {
            return "<predefined>".to_string();
        }
        match self.files.get(span.file_id as usize) {
            Some(f) => {
                let (line, col) = f.line_col(span.start);
                format!("{}:{}:{}", f.path, line, col)
            }
            None => "<unknown>".to_string(),
        }
    }

    /// Render one diagnostic as its canonical single line.
    pub fn render(&self, diag: &Diagnostic) -> String {
        let loc = self.format_location(diag.span);
        match diag.severity {
            Severity::Error => format!("{}: {}: {}", loc, diag.code, diag.message),
            Severity::Warning => format!("{}: WARN {}: {}", loc, diag.code, diag.message),
        }
    }

    /// Print every collected diagnostic to stderr, in emission order.
    pub fn print_all(&self) {
        for diag in &self.items {
            eprintln!("{}", self.render(diag));
        }
    }

    /// Move diagnostics from a per-unit reporter into this one.
    pub fn absorb(&mut self, other: Reporter) {
        self.items.extend(other.items);
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_from_offsets() {
        let mut r = Reporter::new();
        let id = r.add_file("main.sushi", "fn main() i32:\n    return 0\n");
        let span = Span::new(id, 19, 25);
        assert_eq!(r.format_location(span), "main.sushi:2:5");
    }

    #[test]
    fn render_error_line() {
        let mut r = Reporter::new();
        let id = r.add_file("a.sushi", "const X\n");
        r.error(Code::CE0104, Span::new(id, 6, 7), "constant 'X' is missing a type");
        let line = r.render(&r.items[0]);
        assert_eq!(line, "a.sushi:1:7: CE0104: constant 'X' is missing a type");
    }

    #[test]
    fn warning_has_warn_prefix() {
        let mut r = Reporter::new();
        let id = r.add_file("a.sushi", "x\n");
        r.warn(Code::CE1104, Span::new(id, 0, 1), "variable 'x' is never used");
        assert!(r.render(&r.items[0]).contains("WARN CE1104"));
    }

    #[test]
    fn builtin_span_location() {
        let r = Reporter::new();
        assert_eq!(r.format_location(Span::builtin()), "<predefined>");
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let mut r = Reporter::new();
        let id = r.add_file("a.sushi", "x");
        r.warn(Code::CE1104, Span::new(id, 0, 1), "unused");
        assert!(!r.has_errors());
        r.error(Code::CE0101, Span::new(id, 0, 1), "dup");
        assert!(r.has_errors());
        assert_eq!(r.error_count(), 1);
    }
}
