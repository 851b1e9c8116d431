//! Logging for the meta-object compiler.
//!
//! The compiler logs through `tracing`. The `horizon-moc` binary installs a
//! subscriber whose filter follows `-v` repetitions unless `RUST_LOG` is set:
//!
//! ```text
//! RUST_LOG=horizon_moc::parser=trace horizon-moc widget.h
//! ```

/// Target names for log filtering.
pub mod targets {
    /// Batch orchestration and file I/O.
    pub const DRIVER: &str = "horizon_moc::driver";
    /// Declaration parsing.
    pub const PARSER: &str = "horizon_moc::parser";
    /// Table building and base-class resolution.
    pub const BUILDER: &str = "horizon_moc::builder";
}
