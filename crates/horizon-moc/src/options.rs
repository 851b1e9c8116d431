//! Compiler configuration.

use std::path::{Path, PathBuf};

use crate::emitter::OutputFormat;

/// Options for one compiler run.
///
/// # Example
///
/// ```
/// use horizon_moc::{CompilerOptions, OutputFormat};
///
/// let options = CompilerOptions::new()
///     .with_output("generated")
///     .with_format(OutputFormat::Rust)
///     .with_notes(false);
/// assert_eq!(options.format(), OutputFormat::Rust);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    output: Option<PathBuf>,
    include_guard: Option<String>,
    notes: bool,
    format: OutputFormat,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            output: None,
            include_guard: None,
            notes: true,
            format: OutputFormat::Json,
        }
    }
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Output file for a single input, or output directory for several.
    /// Without one, artifacts go to standard output.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Registration guard. With several inputs it becomes a prefix of each
    /// file's guard.
    pub fn with_include_guard(mut self, guard: impl Into<String>) -> Self {
        self.include_guard = Some(guard.into());
        self
    }

    /// Whether informational notes are reported.
    pub fn with_notes(mut self, notes: bool) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub fn include_guard(&self) -> Option<&str> {
        self.include_guard.as_deref()
    }

    pub fn notes(&self) -> bool {
        self.notes
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Registration guard for `input` in a batch of `batch_len` files.
    pub fn guard_for(&self, input: &Path, batch_len: usize) -> String {
        let stem = guard_stem(input);
        match &self.include_guard {
            Some(guard) if batch_len == 1 => guard.clone(),
            Some(guard) => format!("{guard}_{stem}"),
            None => stem,
        }
    }

    /// Where the artifact for `input` is written; `None` means stdout.
    pub fn output_path_for(&self, input: &Path, batch_len: usize) -> Option<PathBuf> {
        let output = self.output.as_ref()?;
        if batch_len == 1 {
            return Some(output.clone());
        }
        let stem = input
            .file_stem()
            .map_or_else(|| "input".into(), |s| s.to_string_lossy());
        Some(output.join(format!("moc_{stem}.{}", self.format.extension())))
    }
}

/// Upper-cased file stem with every non-alphanumeric byte replaced by `_`.
fn guard_stem(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
