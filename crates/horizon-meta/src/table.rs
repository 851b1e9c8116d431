//! Serialized meta-object tables.
//!
//! A [`MetaObjectTable`] is the compiled, flat description of one class: its
//! name, an optional superclass name, and its methods, properties, enums and
//! class info. Every string is stored once in a per-class string table and
//! referenced by index.
//!
//! Tables are produced by the meta-object compiler (or by hand with
//! [`TableBuilder`]) and packaged per source file into a [`MetaArtifact`],
//! which is what the runtime loads.
//!
//! # Key Types
//!
//! - [`MetaObjectTable`] - One class
//! - [`MetaArtifact`] - All classes of one compiled source file
//! - [`TableBuilder`] - Interns strings and assembles a table
//!
//! # Example
//!
//! ```
//! use horizon_meta::table::{Access, MethodKind, MethodSpec, TableBuilder};
//!
//! let mut builder = TableBuilder::new("Counter", None);
//! builder.add_method(MethodSpec::new("valueChanged", MethodKind::Signal).param("int", "value"));
//! builder.add_method(MethodSpec::new("setValue", MethodKind::Slot).param("int", "value"));
//! let table = builder.build();
//!
//! assert_eq!(table.class_name(), "Counter");
//! assert_eq!(table.methods.len(), 2);
//! assert_eq!(table.signature(&table.methods[0]), "valueChanged(int)");
//! # let _ = Access::Public;
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{MetadataVersionError, RegistrationError};
use crate::signature::{Signature, normalize_type, signature_hash};

/// Layout version of [`MetaArtifact`]. Bumped on any incompatible change.
pub const METADATA_VERSION: u32 = 1;

/// Index into a table's string table.
pub type StringIndex = u32;

/// What a method entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Signal,
    Slot,
    /// A plain method callable by name (`H_INVOKABLE`).
    Method,
}

/// Declared access level of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Private,
    Protected,
    #[default]
    Public,
}

/// One method, signal or slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub name: StringIndex,
    /// Canonical signature text.
    pub signature: StringIndex,
    /// FNV-1a hash of the canonical signature.
    pub signature_hash: u64,
    /// Normalized return type, `void` when nothing is returned.
    pub return_type: StringIndex,
    /// Normalized parameter types, used for matching.
    pub parameter_types: Vec<StringIndex>,
    /// Parameter types as declared, used by generated code.
    pub declared_types: Vec<StringIndex>,
    /// Parameter names; the empty string when unnamed.
    pub parameter_names: Vec<StringIndex>,
    pub kind: MethodKind,
    pub access: Access,
    /// Generated from a declaration with default arguments.
    #[serde(default)]
    pub cloned: bool,
}

impl MethodEntry {
    pub fn parameter_count(&self) -> usize {
        self.parameter_types.len()
    }
}

/// Property attribute flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyFlags(u32);

impl PropertyFlags {
    pub const READABLE: Self = Self(1 << 0);
    pub const WRITABLE: Self = Self(1 << 1);
    pub const RESETTABLE: Self = Self(1 << 2);
    pub const STORED: Self = Self(1 << 3);
    pub const DESIGNABLE: Self = Self(1 << 4);
    pub const CONSTANT: Self = Self(1 << 5);
    pub const FINAL: Self = Self(1 << 6);
    /// Backed directly by a data member.
    pub const MEMBER: Self = Self(1 << 7);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for PropertyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One declared property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyEntry {
    pub name: StringIndex,
    /// Normalized property type.
    pub type_name: StringIndex,
    pub flags: PropertyFlags,
    /// Local index of the notify signal in this class's method list.
    pub notify: Option<u32>,
}

/// One enumerator key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumKey {
    pub name: StringIndex,
    pub value: i64,
}

/// A registered enum or flag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumEntry {
    pub name: StringIndex,
    pub is_flag: bool,
    pub is_scoped: bool,
    pub keys: Vec<EnumKey>,
}

/// A `key`/`value` class annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfoEntry {
    pub key: StringIndex,
    pub value: StringIndex,
}

/// Compiled reflection data for one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaObjectTable {
    pub class_name: StringIndex,
    /// Superclass, referenced by name and resolved by the registry.
    pub super_class: Option<StringIndex>,
    pub strings: Vec<String>,
    #[serde(default)]
    pub class_info: Vec<ClassInfoEntry>,
    pub methods: Vec<MethodEntry>,
    #[serde(default)]
    pub properties: Vec<PropertyEntry>,
    #[serde(default)]
    pub enums: Vec<EnumEntry>,
}

impl MetaObjectTable {
    /// Look up a string. Out of range indices yield the empty string;
    /// [`validate`](Self::validate) rejects such tables before registration.
    pub fn string(&self, index: StringIndex) -> &str {
        self.strings
            .get(index as usize)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn class_name(&self) -> &str {
        self.string(self.class_name)
    }

    pub fn super_class_name(&self) -> Option<&str> {
        self.super_class.map(|index| self.string(index))
    }

    pub fn signature(&self, method: &MethodEntry) -> &str {
        self.string(method.signature)
    }

    /// Check every string reference and notify index.
    pub fn validate(&self) -> Result<(), String> {
        let len = self.strings.len();
        let check = |index: StringIndex, what: &str| -> Result<(), String> {
            if (index as usize) < len {
                Ok(())
            } else {
                Err(format!("{what} string index {index} out of range ({len} strings)"))
            }
        };

        check(self.class_name, "class name")?;
        if let Some(index) = self.super_class {
            check(index, "superclass")?;
        }
        for info in &self.class_info {
            check(info.key, "class info key")?;
            check(info.value, "class info value")?;
        }
        for method in &self.methods {
            check(method.name, "method name")?;
            check(method.signature, "method signature")?;
            check(method.return_type, "return type")?;
            if method.parameter_names.len() != method.parameter_types.len()
                || method.declared_types.len() != method.parameter_types.len()
            {
                return Err(format!(
                    "method `{}` has mismatched parameter lists",
                    self.string(method.signature)
                ));
            }
            for &index in method
                .parameter_types
                .iter()
                .chain(&method.declared_types)
                .chain(&method.parameter_names)
            {
                check(index, "parameter")?;
            }
        }
        for property in &self.properties {
            check(property.name, "property name")?;
            check(property.type_name, "property type")?;
            if let Some(notify) = property.notify {
                let is_signal = self
                    .methods
                    .get(notify as usize)
                    .is_some_and(|m| m.kind == MethodKind::Signal);
                if !is_signal {
                    return Err(format!(
                        "property `{}` notifies method {notify}, which is not a local signal",
                        self.string(property.name)
                    ));
                }
            }
        }
        for entry in &self.enums {
            check(entry.name, "enum name")?;
            for key in &entry.keys {
                check(key.name, "enum key")?;
            }
        }
        Ok(())
    }
}

/// Metadata for every class of one compiled source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaArtifact {
    pub version: u32,
    /// Tool that produced the artifact.
    pub generator: String,
    /// Source file the classes were declared in.
    pub source: String,
    /// Include guard; registering the same guard twice is a no-op.
    pub guard: String,
    /// Classes, bases before derived classes.
    pub classes: Vec<MetaObjectTable>,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl MetaArtifact {
    pub fn new(source: impl Into<String>, guard: impl Into<String>) -> Self {
        Self {
            version: METADATA_VERSION,
            generator: format!("horizon-moc {}", env!("CARGO_PKG_VERSION")),
            source: source.into(),
            guard: guard.into(),
            classes: Vec::new(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse an artifact, checking its version before anything else.
    pub fn from_json(json: &str) -> Result<Self, RegistrationError> {
        let probe: VersionProbe = serde_json::from_str(json)?;
        if probe.version != METADATA_VERSION {
            return Err(MetadataVersionError {
                found: probe.version,
                expected: METADATA_VERSION,
            }
            .into());
        }
        Ok(serde_json::from_str(json)?)
    }
}

/// Description of a method to add to a [`TableBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    pub name: String,
    pub return_type: String,
    /// Declared parameter types and names.
    pub parameters: Vec<(String, String)>,
    pub kind: MethodKind,
    pub access: Access,
    pub cloned: bool,
}

impl MethodSpec {
    pub fn new(name: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            name: name.into(),
            return_type: "void".to_string(),
            parameters: Vec::new(),
            kind,
            access: Access::Public,
            cloned: false,
        }
    }

    pub fn param(mut self, ty: impl Into<String>, name: impl Into<String>) -> Self {
        self.parameters.push((ty.into(), name.into()));
        self
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.return_type = ty.into();
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn cloned(mut self, cloned: bool) -> Self {
        self.cloned = cloned;
        self
    }

    /// Normalized signature of this method.
    pub fn signature(&self) -> Signature {
        Signature::new(&self.name, self.parameters.iter().map(|(ty, _)| ty))
    }
}

/// Interns strings and assembles a [`MetaObjectTable`].
///
/// Every distinct string is stored exactly once per class.
#[derive(Debug)]
pub struct TableBuilder {
    strings: Vec<String>,
    lookup: HashMap<String, StringIndex>,
    class_name: StringIndex,
    super_class: Option<StringIndex>,
    class_info: Vec<ClassInfoEntry>,
    methods: Vec<MethodEntry>,
    properties: Vec<PropertyEntry>,
    enums: Vec<EnumEntry>,
}

impl TableBuilder {
    pub fn new(class_name: &str, super_class: Option<&str>) -> Self {
        let mut builder = Self {
            strings: Vec::new(),
            lookup: HashMap::new(),
            class_name: 0,
            super_class: None,
            class_info: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            enums: Vec::new(),
        };
        builder.class_name = builder.intern(class_name);
        builder.super_class = super_class.map(|name| builder.intern(name));
        builder
    }

    /// Intern a string, returning its index.
    pub fn intern(&mut self, value: &str) -> StringIndex {
        if let Some(&index) = self.lookup.get(value) {
            return index;
        }
        let index = self.strings.len() as StringIndex;
        self.strings.push(value.to_string());
        self.lookup.insert(value.to_string(), index);
        index
    }

    /// Add a method and return its local index.
    pub fn add_method(&mut self, spec: MethodSpec) -> usize {
        let signature = spec.signature();
        let canonical = signature.canonical();
        let entry = MethodEntry {
            name: self.intern(&spec.name),
            signature: self.intern(&canonical),
            signature_hash: signature_hash(&canonical),
            return_type: self.intern(&normalize_type(&spec.return_type)),
            parameter_types: signature
                .parameters()
                .iter()
                .map(|ty| self.intern(ty))
                .collect(),
            declared_types: spec
                .parameters
                .iter()
                .map(|(ty, _)| self.intern(ty))
                .collect(),
            parameter_names: spec
                .parameters
                .iter()
                .map(|(_, name)| self.intern(name))
                .collect(),
            kind: spec.kind,
            access: spec.access,
            cloned: spec.cloned,
        };
        self.methods.push(entry);
        self.methods.len() - 1
    }

    /// Local index of a method with the given canonical signature.
    pub fn find_method(&self, canonical: &str) -> Option<usize> {
        let index = *self.lookup.get(canonical)?;
        self.methods.iter().position(|m| m.signature == index)
    }

    /// Add a property. `notify` is the local index of a signal.
    pub fn add_property(
        &mut self,
        name: &str,
        type_name: &str,
        flags: PropertyFlags,
        notify: Option<usize>,
    ) -> usize {
        let entry = PropertyEntry {
            name: self.intern(name),
            type_name: self.intern(&normalize_type(type_name)),
            flags,
            notify: notify.map(|index| index as u32),
        };
        self.properties.push(entry);
        self.properties.len() - 1
    }

    pub fn add_enum<'a>(
        &mut self,
        name: &str,
        is_flag: bool,
        is_scoped: bool,
        keys: impl IntoIterator<Item = (&'a str, i64)>,
    ) -> usize {
        let keys = keys
            .into_iter()
            .map(|(key, value)| EnumKey {
                name: self.intern(key),
                value,
            })
            .collect();
        let entry = EnumEntry {
            name: self.intern(name),
            is_flag,
            is_scoped,
            keys,
        };
        self.enums.push(entry);
        self.enums.len() - 1
    }

    pub fn add_class_info(&mut self, key: &str, value: &str) {
        let entry = ClassInfoEntry {
            key: self.intern(key),
            value: self.intern(value),
        };
        self.class_info.push(entry);
    }

    pub fn build(self) -> MetaObjectTable {
        MetaObjectTable {
            class_name: self.class_name,
            super_class: self.super_class,
            strings: self.strings,
            class_info: self.class_info,
            methods: self.methods,
            properties: self.properties,
            enums: self.enums,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_table() -> MetaObjectTable {
        let mut builder = TableBuilder::new("Counter", Some("Object"));
        let changed = builder.add_method(
            MethodSpec::new("valueChanged", MethodKind::Signal).param("int", "value"),
        );
        builder.add_method(
            MethodSpec::new("setValue", MethodKind::Slot).param("const int &", "value"),
        );
        builder.add_property(
            "value",
            "int",
            PropertyFlags::READABLE | PropertyFlags::WRITABLE,
            Some(changed),
        );
        builder.add_enum("Mode", false, true, [("Up", 0), ("Down", 1)]);
        builder.add_class_info("author", "horizon");
        builder.build()
    }

    #[test]
    fn test_strings_are_interned_once() {
        let table = counter_table();
        let count = table.strings.iter().filter(|s| s.as_str() == "int").count();
        assert_eq!(count, 1);
        let value_count = table.strings.iter().filter(|s| s.as_str() == "value").count();
        assert_eq!(value_count, 1);
    }

    #[test]
    fn test_signatures_are_normalized() {
        let table = counter_table();
        assert_eq!(table.signature(&table.methods[1]), "setValue(int)");
        assert_eq!(table.string(table.methods[1].declared_types[0]), "const int &");
        assert_eq!(
            table.methods[1].signature_hash,
            signature_hash("setValue(int)")
        );
        assert_eq!(table.super_class_name(), Some("Object"));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_notify() {
        let mut table = counter_table();
        table.properties[0].notify = Some(1);
        assert!(table.validate().is_err());
        table.properties[0].notify = Some(9);
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_string() {
        let mut table = counter_table();
        table.methods[0].name = 999;
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_artifact_json_roundtrip() {
        let mut artifact = MetaArtifact::new("counter.h", "COUNTER_H");
        artifact.classes.push(counter_table());
        let json = artifact.to_json().unwrap();
        let parsed = MetaArtifact::from_json(&json).unwrap();
        assert_eq!(parsed, artifact);
    }

    #[test]
    fn test_artifact_version_is_checked_first() {
        let json = r#"{ "version": 99, "something": "else" }"#;
        match MetaArtifact::from_json(json) {
            Err(RegistrationError::Version(err)) => {
                assert_eq!(err.found, 99);
                assert_eq!(err.expected, METADATA_VERSION);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn test_find_method() {
        let mut builder = TableBuilder::new("A", None);
        builder.add_method(MethodSpec::new("a", MethodKind::Signal));
        let b = builder.add_method(MethodSpec::new("b", MethodKind::Slot).param("int", ""));
        assert_eq!(builder.find_method("b(int)"), Some(b));
        assert_eq!(builder.find_method("b()"), None);
    }
}
