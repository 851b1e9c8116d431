//! Batch driver.
//!
//! Runs the whole pipeline over a set of input files: read, lex and parse
//! (in parallel), resolve base classes across the batch, build tables, emit
//! and write one artifact per input.
//!
//! A compile error in one file never stops the others; that file simply
//! produces no artifact. A base-class cycle is fatal and nothing is written.
//! Unreadable inputs and unwritable outputs are reported as I/O failures.

use std::io::Write;
use std::path::{Path, PathBuf};

use horizon_meta::MetaArtifact;
use rayon::prelude::*;

use crate::builder::{SourceClasses, build_batch};
use crate::emitter::emit;
use crate::error::{CompileError, CompileResult, DependencyCycleError, DriverError};
use crate::logging::targets;
use crate::options::CompilerOptions;
use crate::parser::{ClassDecl, parse_source};

/// Note reported for inputs without annotated classes.
pub const NO_CLASSES_NOTE: &str = "No relevant classes found. The generated artifact is empty.";

/// Outcome of compiling one in-memory source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFile {
    pub input: PathBuf,
    pub result: CompileResult<MetaArtifact>,
}

/// An artifact that was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub input: PathBuf,
    /// File written, or `None` for standard output.
    pub output: Option<PathBuf>,
    /// Classes in the artifact, bases first.
    pub classes: Vec<String>,
}

/// A note about one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub file: PathBuf,
    pub message: String,
}

/// Everything a batch run produced and every problem it met.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub compile_errors: Vec<CompileError>,
    pub io_errors: Vec<DriverError>,
    pub cycle: Option<DependencyCycleError>,
    pub notes: Vec<Note>,
}

impl BatchReport {
    /// `2` on any I/O failure, `1` on compile errors or a base-class cycle,
    /// otherwise `0`.
    pub fn exit_code(&self) -> u8 {
        if !self.io_errors.is_empty() {
            2
        } else if self.cycle.is_some() || !self.compile_errors.is_empty() {
            1
        } else {
            0
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

/// Runs compiler batches with fixed options.
#[derive(Debug, Clone, Default)]
pub struct Driver {
    options: CompilerOptions,
}

impl Driver {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile sources already in memory.
    ///
    /// Results follow the order of `sources`. Only a base-class cycle fails
    /// the whole call.
    pub fn compile_sources(
        &self,
        sources: &[(PathBuf, String)],
    ) -> Result<Vec<CompiledFile>, DependencyCycleError> {
        let parsed: Vec<CompileResult<Vec<ClassDecl>>> = sources
            .par_iter()
            .map(|(path, text)| {
                let result = parse_source(path, text);
                tracing::debug!(
                    target: targets::PARSER,
                    file = %path.display(),
                    classes = result.as_ref().map_or(0, Vec::len),
                    ok = result.is_ok(),
                    "parsed input"
                );
                result
            })
            .collect();

        // Only files that parsed take part in base-class resolution.
        let parsed_sources: Vec<SourceClasses<'_>> = sources
            .iter()
            .zip(&parsed)
            .filter_map(|((path, _), result)| {
                result.as_ref().ok().map(|classes| SourceClasses {
                    file: path.as_path(),
                    classes: classes.as_slice(),
                })
            })
            .collect();
        let mut built = build_batch(&parsed_sources)?.into_iter();

        let batch_len = sources.len();
        let mut compiled = Vec::with_capacity(batch_len);
        for ((path, _), parse_result) in sources.iter().zip(&parsed) {
            let artifact = || MetaArtifact::new(source_name(path), self.options.guard_for(path, batch_len));
            let result = match parse_result {
                Err(err) => Err(err.clone()),
                Ok(_) => match built.next() {
                    Some(Ok(tables)) => {
                        let mut artifact = artifact();
                        artifact.classes = tables;
                        Ok(artifact)
                    }
                    Some(Err(err)) => Err(err),
                    None => Ok(artifact()),
                },
            };
            compiled.push(CompiledFile {
                input: path.clone(),
                result,
            });
        }
        Ok(compiled)
    }

    /// Compile `inputs` and write their artifacts. Artifacts without an
    /// output path go to `stdout`.
    #[tracing::instrument(skip_all, fields(inputs = inputs.len()), target = "horizon_moc::driver", level = "debug")]
    pub fn run(&self, inputs: &[PathBuf], stdout: &mut dyn Write) -> BatchReport {
        let mut report = BatchReport::default();

        let mut sources = Vec::with_capacity(inputs.len());
        for input in inputs {
            match std::fs::read_to_string(input) {
                Ok(text) => sources.push((input.clone(), text)),
                Err(source) => {
                    tracing::warn!(target: targets::DRIVER, file = %input.display(), error = %source, "cannot read input");
                    report.io_errors.push(DriverError::Read {
                        path: input.clone(),
                        source,
                    });
                }
            }
        }

        let compiled = match self.compile_sources(&sources) {
            Ok(compiled) => compiled,
            Err(cycle) => {
                tracing::error!(target: targets::DRIVER, %cycle, "aborting batch");
                report.cycle = Some(cycle);
                return report;
            }
        };

        // Guards and output names depend on the batch as given, unreadable
        // inputs included.
        let batch_len = inputs.len();
        for file in compiled {
            let mut artifact = match file.result {
                Ok(artifact) => artifact,
                Err(err) => {
                    tracing::debug!(target: targets::DRIVER, file = %file.input.display(), "skipping output after compile error");
                    report.compile_errors.push(err);
                    continue;
                }
            };
            artifact.guard = self.options.guard_for(&file.input, batch_len);

            if artifact.classes.is_empty() && self.options.notes() {
                report.notes.push(Note {
                    file: file.input.clone(),
                    message: NO_CLASSES_NOTE.to_string(),
                });
            }

            let output = self.options.output_path_for(&file.input, batch_len);
            match self.write_artifact(&artifact, output.as_deref(), stdout) {
                Ok(()) => {
                    tracing::info!(
                        target: targets::DRIVER,
                        input = %file.input.display(),
                        output = %output.as_deref().map_or_else(|| "<stdout>".into(), |p| p.display().to_string()),
                        classes = artifact.classes.len(),
                        "wrote artifact"
                    );
                    report.outcomes.push(FileOutcome {
                        input: file.input,
                        output,
                        classes: artifact
                            .classes
                            .iter()
                            .map(|t| t.class_name().to_string())
                            .collect(),
                    });
                }
                Err(err) => report.io_errors.push(err),
            }
        }
        report
    }

    fn write_artifact(
        &self,
        artifact: &MetaArtifact,
        output: Option<&Path>,
        stdout: &mut dyn Write,
    ) -> Result<(), DriverError> {
        let path_for_errors = || output.map_or_else(|| PathBuf::from("<stdout>"), Path::to_path_buf);
        let text = emit(artifact, self.options.format()).map_err(|source| DriverError::Serialize {
            path: path_for_errors(),
            source,
        })?;

        let written = match output {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|source| DriverError::Write {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                std::fs::write(path, text)
            }
            None => stdout.write_all(text.as_bytes()),
        };
        written.map_err(|source| DriverError::Write {
            path: path_for_errors(),
            source,
        })
    }
}

/// File name recorded in an artifact.
fn source_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
