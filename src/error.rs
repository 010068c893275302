//! Unified error type for the compiler driver.
//!
//! Semantic diagnostics flow through the `Reporter`; this type covers
//! everything around them: I/O, syntax failures surfaced to the CLI,
//! external tool invocations, and manifest writing. Exit codes: 0 success,
//! 1 user errors, 2 internal compiler errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SushiError {
    /// I/O error (source read, object write, temp files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Syntax error, already formatted as path:line:col
    #[error("{0}")]
    Syntax(String),

    /// One or more semantic diagnostics were reported
    #[error("compilation failed with {count} error(s)")]
    CompileFailed { count: usize },

    /// No source files found under the given project root
    #[error("no .sushi source files found under '{root}'")]
    NoSources { root: String },

    /// A stdlib unit could not be resolved to bitcode
    #[error("stdlib unit not found: <{unit}>\n{detail}\nNote: use angle brackets like 'use <io/stdio>' for stdlib imports")]
    StdlibUnitNotFound { unit: String, detail: String },

    /// An external tool (opt, llc, llvm-link, cc) failed
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// Manifest serialization failure
    #[error("failed to write library manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Internal invariant violation (exit code 2)
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl SushiError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            SushiError::Internal(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(
            SushiError::CompileFailed { count: 3 }.exit_code(),
            1
        );
        assert_eq!(SushiError::Internal("bad".to_string()).exit_code(), 2);
    }

    #[test]
    fn stdlib_error_mentions_unit_and_hint() {
        let err = SushiError::StdlibUnitNotFound {
            unit: "io/stdio".to_string(),
            detail: "available units: <core>".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("io/stdio"));
        assert!(text.contains("angle brackets"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SushiError = io.into();
        assert!(err.to_string().contains("gone"));
        assert_eq!(err.exit_code(), 1);
    }
}
