//! Code emitter.
//!
//! Serializes a [`MetaArtifact`] in one of the supported [`OutputFormat`]s.
//! The JSON form is the artifact itself. The Rust form embeds the same JSON
//! in a module together with a `register_metadata()` entry point that hands
//! it to the runtime's class registry.

use std::fmt;

use horizon_meta::MetaArtifact;

/// Format of generated artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum OutputFormat {
    /// The versioned metadata artifact as JSON.
    #[default]
    Json,
    /// A Rust module embedding the artifact and its registration function.
    Rust,
}

impl OutputFormat {
    /// Extension of generated files.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Rust => "rs",
        }
    }
}

/// Render `artifact` in `format`.
pub fn emit(artifact: &MetaArtifact, format: OutputFormat) -> serde_json::Result<String> {
    let json = artifact.to_json()?;
    Ok(match format {
        OutputFormat::Json => {
            let mut out = json;
            out.push('\n');
            out
        }
        OutputFormat::Rust => rust_module(artifact, &json),
    })
}

/// A Rust module embedding one artifact.
struct RustModule<'a> {
    artifact: &'a MetaArtifact,
    json: &'a str,
}

impl fmt::Display for RustModule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let artifact = self.artifact;
        let hashes = "#".repeat(raw_string_hashes(self.json));
        writeln!(
            f,
            "// Meta-object code generated from `{}` by {}.\n\
             // Do not edit; changes are lost on the next build.\n",
            artifact.source, artifact.generator
        )?;
        writeln!(f, "/// Reflection tables of `{}`.", artifact.source)?;
        for table in &artifact.classes {
            writeln!(f, "///\n/// - `{}`", table.class_name())?;
        }
        writeln!(f, "pub const METADATA: &str = r{hashes}\"{}\"{hashes};\n", self.json)?;
        writeln!(f, "/// Include guard of this artifact.")?;
        writeln!(f, "pub const GUARD: &str = {:?};\n", artifact.guard)?;
        writeln!(
            f,
            "/// Register the classes above with the process-wide registry.\n\
             ///\n\
             /// Returns the number of classes added; a second call adds none.\n\
             pub fn register_metadata() -> Result<usize, horizon_meta::RegistrationError> {{\n    \
                 horizon_meta::register_metadata(METADATA)\n\
             }}"
        )
    }
}

fn rust_module(artifact: &MetaArtifact, json: &str) -> String {
    RustModule { artifact, json }.to_string()
}

/// Number of `#` needed to delimit `text` as a raw string literal.
fn raw_string_hashes(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut longest = None;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'"' {
            let run = bytes[i + 1..].iter().take_while(|&&c| c == b'#').count();
            longest = Some(longest.map_or(run, |l: usize| l.max(run)));
        }
    }
    longest.map_or(1, |run| run + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_meta::table::{MethodKind, MethodSpec, TableBuilder};

    fn artifact() -> MetaArtifact {
        let mut builder = TableBuilder::new("Emitted", None);
        builder.add_method(MethodSpec::new("changed", MethodKind::Signal));
        let mut artifact = MetaArtifact::new("emitted.h", "EMITTED");
        artifact.classes.push(builder.build());
        artifact
    }

    #[test]
    fn test_json_round_trips_through_the_runtime_loader() {
        let out = emit(&artifact(), OutputFormat::Json).unwrap();
        let parsed = MetaArtifact::from_json(&out).unwrap();
        assert_eq!(parsed, artifact());
    }

    #[test]
    fn test_rust_module() {
        let out = emit(&artifact(), OutputFormat::Rust).unwrap();
        assert!(out.contains("pub const METADATA: &str = r#\"{"));
        assert!(out.contains("pub const GUARD: &str = \"EMITTED\";"));
        assert!(out.contains("pub fn register_metadata() -> Result<usize, horizon_meta::RegistrationError>"));
        assert!(out.contains("/// - `Emitted`"));
        assert!(out.starts_with("// Meta-object code generated from `emitted.h`"));
        assert!(out.ends_with("    horizon_meta::register_metadata(METADATA)\n}\n"));
    }

    #[test]
    fn test_raw_string_hashes() {
        assert_eq!(raw_string_hashes("plain"), 1);
        assert_eq!(raw_string_hashes(r#"a "b" c"#), 1);
        assert_eq!(raw_string_hashes(r##"a "# b"##), 2);
        assert_eq!(raw_string_hashes(r###"x "## y "# z"###), 3);
    }

    #[test]
    fn test_extension() {
        assert_eq!(OutputFormat::Json.extension(), "json");
        assert_eq!(OutputFormat::Rust.extension(), "rs");
    }
}
