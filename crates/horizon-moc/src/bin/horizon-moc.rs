//! horizon-moc - meta-object compiler command line
//!
//! Compiles annotated class declarations into reflection metadata:
//! - one artifact per input file (JSON or a Rust registration module)
//! - per-file error isolation, `file:line: error:` diagnostics
//! - exit code 0 on success, 1 on compile errors, 2 on I/O failures

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use horizon_moc::{CompilerOptions, Driver, OutputFormat};

/// horizon-moc command line
#[derive(Parser)]
#[command(name = "horizon-moc")]
#[command(about = "Horizon meta-object compiler", long_about = None)]
#[command(version)]
struct Cli {
    /// Annotated source files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file (one input) or directory (several inputs); stdout if absent
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Registration guard; prefixes each file's guard when several inputs are given
    #[arg(long, env = "HORIZON_MOC_GUARD")]
    include_guard: Option<String>,

    /// Do not report notes
    #[arg(long)]
    no_notes: bool,

    /// Artifact format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn options(&self) -> CompilerOptions {
        let mut options = CompilerOptions::new()
            .with_notes(!self.no_notes)
            .with_format(self.format);
        if let Some(output) = &self.output {
            options = options.with_output(output);
        }
        if let Some(guard) = &self.include_guard {
            options = options.with_include_guard(guard);
        }
        options
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let driver = Driver::new(cli.options());
    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    let report = driver.run(&cli.inputs, &mut stdout);
    let _ = stdout.flush();

    for err in &report.compile_errors {
        eprintln!("{err}");
    }
    if let Some(cycle) = &report.cycle {
        eprintln!("horizon-moc: error: {cycle}");
    }
    for err in &report.io_errors {
        eprintln!("horizon-moc: error: {err}");
    }
    for note in &report.notes {
        eprintln!("{}: note: {}", note.file.display(), note.message);
    }

    ExitCode::from(report.exit_code())
}
