//! Error types for the meta-object compiler.

use std::fmt;
use std::path::{Path, PathBuf};

/// A malformed token. Carries the byte offset where the token starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string literal starting at byte {offset}")]
    UnterminatedString { offset: usize },
    #[error("unterminated character literal starting at byte {offset}")]
    UnterminatedChar { offset: usize },
    #[error("unterminated block comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },
    #[error("invalid raw string delimiter at byte {offset}")]
    InvalidRawString { offset: usize },
}

impl LexError {
    pub fn offset(&self) -> usize {
        match self {
            Self::UnterminatedString { offset }
            | Self::UnterminatedChar { offset }
            | Self::UnterminatedComment { offset }
            | Self::InvalidRawString { offset } => *offset,
        }
    }
}

/// A malformed declaration in one file. Never fatal to the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}:{line}: error: {message}", file.display())]
pub struct CompileError {
    pub file: PathBuf,
    pub line: u32,
    pub message: String,
}

impl CompileError {
    pub fn new(file: impl Into<PathBuf>, line: u32, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            message: message.into(),
        }
    }

    /// Attribute a lexical error in `source` to its line.
    pub fn from_lex(file: &Path, source: &str, err: &LexError) -> Self {
        let offset = err.offset().min(source.len());
        let line = source.as_bytes()[..offset]
            .iter()
            .filter(|&&b| b == b'\n')
            .count() as u32
            + 1;
        Self::new(file, line, err.to_string())
    }
}

/// Base-class references form a cycle. Fatal for the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct DependencyCycleError {
    /// Class names along the cycle; the first name is repeated at the end.
    pub cycle: Vec<String>,
}

impl fmt::Display for DependencyCycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cyclic base-class dependency: {}", self.cycle.join(" -> "))
    }
}

/// File-system failures of the batch driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize metadata for {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for parsing and table building.
pub type CompileResult<T> = std::result::Result<T, CompileError>;
