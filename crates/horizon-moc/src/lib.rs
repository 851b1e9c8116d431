//! Meta-object compiler for Horizon.
//!
//! Scans class declarations annotated with `H_OBJECT` and friends and emits
//! the reflection tables that `horizon-meta` loads at runtime.
//!
//! - **Lexer**: Locale-independent tokenizer over borrowed source text
//! - **Parser**: Recognizes annotated class bodies and their members
//! - **Builder**: Resolves base classes across the batch and interns tables
//! - **Emitter**: Writes versioned JSON artifacts or Rust registration modules
//! - **Driver**: Runs a batch of files with per-file error isolation
//!
//! # Example
//!
//! ```
//! use std::path::PathBuf;
//! use horizon_moc::Driver;
//!
//! let source = r#"
//!     class Counter : public horizon::Object {
//!         H_OBJECT
//!     public slots:
//!         void setValue(int value);
//!     signals:
//!         void valueChanged(int value);
//!     };
//! "#;
//!
//! let compiled = Driver::default()
//!     .compile_sources(&[(PathBuf::from("counter.h"), source.to_string())])
//!     .unwrap();
//! let artifact = compiled[0].result.as_ref().unwrap();
//! let table = &artifact.classes[0];
//! assert_eq!(table.class_name(), "Counter");
//! assert_eq!(table.signature(&table.methods[0]), "valueChanged(int)");
//! ```

pub mod builder;
pub mod driver;
pub mod emitter;
mod error;
pub mod lexer;
pub mod logging;
mod options;
pub mod parser;

pub use builder::{ClassIndex, SourceClasses, build_batch, build_table};
pub use driver::{BatchReport, CompiledFile, Driver, FileOutcome, Note};
pub use emitter::{OutputFormat, emit};
pub use error::{CompileError, CompileResult, DependencyCycleError, DriverError, LexError};
pub use lexer::{Lexer, Token, TokenKind};
pub use options::CompilerOptions;
pub use parser::{ClassDecl, parse_source};
