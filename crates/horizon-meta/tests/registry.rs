//! Integration tests for loading metadata into the class registry.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use horizon_meta::table::{MethodKind, MethodSpec, TableBuilder};
use horizon_meta::{
    ConnectionType, InvokeError, METADATA_VERSION, MetaArtifact, MetaMethod, MetaObjectTable,
    Object, ObjectBase, RegistrationError, Runtime, TypeRegistry, Variant, lookup_class,
    register_metadata,
};

fn table(class: &str, super_class: Option<&str>, signal: &str) -> MetaObjectTable {
    let mut builder = TableBuilder::new(class, super_class);
    builder.add_method(MethodSpec::new(signal, MethodKind::Signal).param("int", "value"));
    builder.build()
}

fn artifact(guard: &str, classes: Vec<MetaObjectTable>) -> MetaArtifact {
    let mut artifact = MetaArtifact::new(format!("{}.h", guard.to_lowercase()), guard);
    artifact.classes = classes;
    artifact
}

struct Emitter {
    base: ObjectBase,
    class: &'static str,
}

impl Object for Emitter {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn class_name(&self) -> &'static str {
        self.class
    }

    fn invoke_method(
        &self,
        method: &MetaMethod<'_>,
        _args: &[Variant],
    ) -> Result<Option<Variant>, InvokeError> {
        Err(InvokeError::NotInvokable(method.signature().to_string()))
    }
}

#[test]
fn test_version_mismatch_through_json() {
    let mut future = artifact(
        "REGISTRY_FUTURE_H",
        vec![table("RegistryFuture", None, "tick")],
    );
    future.version = METADATA_VERSION + 1;
    let json = future.to_json().unwrap();

    let err = register_metadata(&json).unwrap_err();
    match err {
        RegistrationError::Version(version) => {
            assert_eq!(version.found, METADATA_VERSION + 1);
            assert_eq!(version.expected, METADATA_VERSION);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(
        TypeRegistry::global().register_json(&json),
        Err(RegistrationError::Version(_))
    ));
    assert!(lookup_class("RegistryFuture").is_none());
}

#[test]
fn test_malformed_json_is_rejected() {
    assert!(matches!(
        register_metadata("{ \"version\": "),
        Err(RegistrationError::Malformed(_))
    ));
}

#[test]
fn test_indices_survive_late_base_registration() {
    let registry = TypeRegistry::global();
    let derived = registry
        .register_table(table("RegistryLateDerived", Some("RegistryLateBase"), "fired"))
        .unwrap();
    let fired = derived.index_of_method("fired(int)").unwrap();
    assert_eq!(fired, 0);
    assert!(derived.super_class().is_none());
    assert_eq!(derived.super_class_name(), Some("RegistryLateBase"));

    let runtime = Runtime::new();
    let object = Arc::new(Emitter {
        base: ObjectBase::new(),
        class: "RegistryLateDerived",
    });
    let id = runtime.register(&object).unwrap();
    let last = Arc::new(AtomicI64::new(0));
    let seen = last.clone();
    runtime
        .connect_callback(id, "fired(int)", ConnectionType::Direct, move |args| {
            seen.store(args[0].to_int().unwrap_or_default(), Ordering::SeqCst);
        })
        .unwrap();

    let base = registry
        .register_table(table("RegistryLateBase", None, "baseSig"))
        .unwrap();
    assert_eq!(base.index_of_method("baseSig(int)"), Some(0));

    assert_eq!(derived.index_of_method("fired(int)"), Some(fired));
    assert_eq!(derived.method(fired).unwrap().signature(), "fired(int)");
    assert_eq!(derived.index_of_method("baseSig(int)"), None);

    let report = runtime.emit(id, fired, &[Variant::from(9)]).unwrap();
    assert_eq!(report.direct, 1);
    assert_eq!(last.load(Ordering::SeqCst), 9);
}

#[test]
fn test_base_registered_first_is_linked() {
    let registry = TypeRegistry::global();
    registry
        .register_artifact(artifact(
            "REGISTRY_LINKED_H",
            vec![
                table("RegistryLinkedBase", None, "ping"),
                table("RegistryLinkedDerived", Some("RegistryLinkedBase"), "pong"),
            ],
        ))
        .unwrap();

    let derived = lookup_class("RegistryLinkedDerived").unwrap();
    assert_eq!(
        derived.super_class().map(|meta| meta.class_name()),
        Some("RegistryLinkedBase")
    );
    assert_eq!(derived.index_of_method("ping(int)"), Some(0));
    assert_eq!(derived.index_of_method("pong(int)"), Some(1));
}

#[test]
fn test_cycle_across_artifacts_is_rejected() {
    let registry = TypeRegistry::global();
    let added = registry
        .register_artifact(artifact(
            "REGISTRY_CYC_A_H",
            vec![table("RegistryCycA", Some("RegistryCycB"), "a")],
        ))
        .unwrap();
    assert_eq!(added, 1);

    let err = registry
        .register_artifact(artifact(
            "REGISTRY_CYC_B_H",
            vec![table("RegistryCycB", Some("RegistryCycA"), "b")],
        ))
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidTable { ref class, .. } if class == "RegistryCycB"));
    assert!(lookup_class("RegistryCycB").is_none());

    let a = lookup_class("RegistryCycA").unwrap();
    assert_eq!(a.method(0).unwrap().signature(), "a(int)");
    assert!(a.method(1).is_none());
}

#[test]
fn test_cycle_within_one_artifact_registers_nothing() {
    let err = TypeRegistry::global()
        .register_artifact(artifact(
            "REGISTRY_LOOP_H",
            vec![
                table("RegistryLoopA", Some("RegistryLoopB"), "a"),
                table("RegistryLoopB", Some("RegistryLoopA"), "b"),
            ],
        ))
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidTable { .. }));
    assert!(lookup_class("RegistryLoopA").is_none());
    assert!(lookup_class("RegistryLoopB").is_none());
}

#[test]
fn test_self_inheritance_is_rejected() {
    let err = TypeRegistry::global()
        .register_table(table("RegistrySelf", Some("RegistrySelf"), "s"))
        .unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidTable { .. }));
    assert!(lookup_class("RegistrySelf").is_none());
}
