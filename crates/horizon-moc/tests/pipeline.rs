//! End-to-end tests: annotated source through the compiler into the runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use horizon_meta::table::MethodKind;
use horizon_meta::{
    ConnectionType, InvokeError, MetaArtifact, MetaMethod, Object, ObjectBase, Runtime, TypeRegistry,
    Variant, lookup_class,
};
use horizon_moc::{CompilerOptions, Driver, OutputFormat};

fn compile(files: &[(&str, &str)]) -> Vec<MetaArtifact> {
    let sources: Vec<_> = files
        .iter()
        .map(|(name, text)| (PathBuf::from(name), text.to_string()))
        .collect();
    Driver::default()
        .compile_sources(&sources)
        .unwrap()
        .into_iter()
        .map(|file| file.result.unwrap())
        .collect()
}

fn register(artifacts: Vec<MetaArtifact>) {
    for artifact in artifacts {
        TypeRegistry::global().register_artifact(artifact).unwrap();
    }
}

#[test]
fn test_derived_resolves_inherited_signal() {
    register(compile(&[
        (
            "pipeline_base.h",
            "class PipelineBase { H_OBJECT\n\
             public slots:\n  void refresh();\n\
             signals:\n  void changed();\n};",
        ),
        (
            "pipeline_derived.h",
            "class PipelineDerived : public PipelineBase { H_OBJECT\n\
             signals:\n  void extra(int code);\n};",
        ),
    ]));

    let base = lookup_class("PipelineBase").unwrap();
    let derived = lookup_class("PipelineDerived").unwrap();
    assert_eq!(derived.super_class().map(|m| m.class_name()), Some("PipelineBase"));
    assert!(derived.inherits("PipelineBase"));

    let inherited = derived.index_of_method("changed()").unwrap();
    assert_eq!(Some(inherited), base.index_of_method("changed()"));
    let method = derived.method(inherited).unwrap();
    assert_eq!(method.enclosing_class().class_name(), "PipelineBase");
    assert_eq!(method.kind(), MethodKind::Signal);

    let own = derived.index_of_method("extra(int)").unwrap();
    assert_eq!(own, base.method_count());
    assert_eq!(derived.index_of_method("extra(int)"), Some(own));
}

#[test]
fn test_declared_indices_are_stable() {
    register(compile(&[(
        "pipeline_indices.h",
        "class PipelineIndices { H_OBJECT\n\
         public slots:\n  void set(const QString &text, int count = 1);\n\
         signals:\n  void textChanged(const QString &text);\n};",
    )]));

    let meta = lookup_class("PipelineIndices").unwrap();
    for i in 0..meta.method_count() {
        let signature = meta.method(i).unwrap().signature().to_string();
        assert_eq!(meta.index_of_method(&signature), Some(i));
        assert_eq!(meta.index_of_method(&signature), Some(i));
    }
    assert_eq!(
        meta.index_of_method("set(QString,int)"),
        meta.index_of_method("set(const QString&, int)")
    );
    let clone = meta.index_of_method("set(QString)").unwrap();
    assert!(meta.method(clone).unwrap().is_cloned());
}

#[test]
fn test_properties_and_enums_survive_registration() {
    register(compile(&[(
        "pipeline_props.h",
        "namespace pipeline {\n\
         class Props { H_OBJECT\n\
           H_PROPERTY(int level READ level WRITE setLevel NOTIFY levelChanged)\n\
           H_CLASSINFO(\"version\", \"2\")\n\
         public:\n\
           enum Mode { Idle, Busy = 3 };\n\
           H_ENUM(Mode)\n\
         signals:\n  void levelChanged(int level);\n\
         };\n\
         }",
    )]));

    let meta = lookup_class("pipeline::Props").unwrap();
    let property = meta.property(meta.index_of_property("level").unwrap()).unwrap();
    assert!(property.is_readable() && property.is_writable());
    assert_eq!(property.notify_signal().unwrap().signature(), "levelChanged(int)");
    assert_eq!(meta.class_info("version"), Some("2"));

    let mode = meta.enumerator(meta.index_of_enumerator("Mode").unwrap()).unwrap();
    assert_eq!(mode.key_to_value("Busy"), Some(3));
}

#[test]
fn test_reregistering_the_same_guard_is_a_no_op() {
    let artifacts = compile(&[("pipeline_guard.h", "class PipelineGuard { H_OBJECT };")]);
    let first = TypeRegistry::global()
        .register_artifact(artifacts[0].clone())
        .unwrap();
    let second = TypeRegistry::global()
        .register_artifact(artifacts[0].clone())
        .unwrap();
    assert_eq!((first, second), (1, 0));
}

struct Gauge {
    base: ObjectBase,
    level: AtomicI64,
}

impl Object for Gauge {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn class_name(&self) -> &'static str {
        "PipelineGauge"
    }

    fn invoke_method(
        &self,
        method: &MetaMethod<'_>,
        args: &[Variant],
    ) -> Result<Option<Variant>, InvokeError> {
        match method.name() {
            "setLevel" => {
                let level = args[0].to_int().unwrap_or_default();
                self.level.store(level, Ordering::SeqCst);
                Ok(None)
            }
            _ => Err(InvokeError::NotInvokable(method.signature().to_string())),
        }
    }
}

#[test]
fn test_compiled_class_connects_and_dispatches() {
    register(compile(&[(
        "pipeline_gauge.h",
        "class PipelineGauge { H_OBJECT\n\
         public slots:\n  void setLevel(int level);\n\
         signals:\n  void levelChanged(int level);\n};",
    )]));

    let runtime = Runtime::new();
    let sender = Arc::new(Gauge {
        base: ObjectBase::new(),
        level: AtomicI64::new(0),
    });
    let receiver = Arc::new(Gauge {
        base: ObjectBase::new(),
        level: AtomicI64::new(0),
    });
    let sender_id = runtime.register(&sender).unwrap();
    let receiver_id = runtime.register(&receiver).unwrap();

    runtime
        .connect(
            sender_id,
            "levelChanged(int)",
            receiver_id,
            "setLevel(const int&)",
            ConnectionType::Direct,
        )
        .unwrap();
    sender
        .base()
        .emit("levelChanged(int)", &[Variant::from(7)])
        .unwrap();
    assert_eq!(receiver.level.load(Ordering::SeqCst), 7);
}

#[test]
fn test_rust_module_embeds_loadable_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("embedded.h");
    std::fs::write(&input, "class PipelineEmbedded { H_OBJECT signals: void ping(); };").unwrap();
    let output = dir.path().join("moc_embedded.rs");

    let driver = Driver::new(
        CompilerOptions::new()
            .with_output(&output)
            .with_format(OutputFormat::Rust),
    );
    let report = driver.run(&[input], &mut std::io::sink());
    assert_eq!(report.exit_code(), 0);

    let module = std::fs::read_to_string(&output).unwrap();
    let start = module.find("r#\"").unwrap() + 3;
    let end = module.rfind("\"#;").unwrap();
    let artifact = MetaArtifact::from_json(&module[start..end]).unwrap();
    assert_eq!(artifact.guard, "EMBEDDED");
    assert_eq!(artifact.classes[0].class_name(), "PipelineEmbedded");
}
