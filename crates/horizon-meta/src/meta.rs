//! Runtime view of compiled metadata and the process-wide type registry.
//!
//! A [`MetaObject`] wraps one [`MetaObjectTable`] and adds lookup indexes.
//! Method, property and enum indices are *absolute*: index 0 is the first
//! member of the root class, and a class's own members start after all of its
//! ancestors' members. This keeps inherited indices stable across the chain.
//!
//! Superclasses are declared by name and linked when a class is registered.
//! The link and the member offsets are fixed from then on, so an index handed
//! out once keeps naming the same member. A class registered before its base
//! stays a root class.
//!
//! # Key Types
//!
//! - [`MetaObject`] - Reflection for one class
//! - [`MetaMethod`], [`MetaProperty`], [`MetaEnum`] - Borrowed member views
//! - [`TypeRegistry`] - Append-only class registry
//!
//! # Example
//!
//! ```
//! use horizon_meta::meta::{MetaObject, TypeRegistry};
//! use horizon_meta::table::{MethodKind, MethodSpec, TableBuilder};
//!
//! let mut base = TableBuilder::new("DocBase", None);
//! base.add_method(MethodSpec::new("changed", MethodKind::Signal));
//! let mut derived = TableBuilder::new("DocDerived", Some("DocBase"));
//! derived.add_method(MethodSpec::new("poke", MethodKind::Slot));
//!
//! let registry = TypeRegistry::global();
//! registry.register_table(base.build()).unwrap();
//! let meta = registry.register_table(derived.build()).unwrap();
//!
//! assert_eq!(meta.index_of_method("changed()"), Some(0));
//! assert_eq!(meta.index_of_method("poke()"), Some(1));
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use parking_lot::{Mutex, RwLock};

use crate::error::{MetadataVersionError, RegistrationError};
use crate::logging::targets;
use crate::signature::Signature;
use crate::table::{
    Access, EnumEntry, MetaArtifact, MetaObjectTable, MethodEntry, MethodKind, PropertyEntry,
    PropertyFlags, METADATA_VERSION,
};

/// Reflection data for one class.
pub struct MetaObject {
    table: MetaObjectTable,
    super_class: Option<&'static MetaObject>,
    method_offset: usize,
    property_offset: usize,
    enum_offset: usize,
    methods_by_signature: HashMap<String, usize>,
    properties_by_name: HashMap<String, usize>,
    enums_by_name: HashMap<String, usize>,
}

impl MetaObject {
    /// Build the lookup indexes for a standalone table with no linked
    /// superclass.
    pub fn from_table(table: MetaObjectTable) -> Self {
        Self::linked(table, None)
    }

    fn linked(table: MetaObjectTable, super_class: Option<&'static MetaObject>) -> Self {
        let methods_by_signature = table
            .methods
            .iter()
            .enumerate()
            .map(|(i, m)| (table.string(m.signature).to_string(), i))
            .collect();
        let properties_by_name = table
            .properties
            .iter()
            .enumerate()
            .map(|(i, p)| (table.string(p.name).to_string(), i))
            .collect();
        let enums_by_name = table
            .enums
            .iter()
            .enumerate()
            .map(|(i, e)| (table.string(e.name).to_string(), i))
            .collect();
        Self {
            table,
            super_class,
            method_offset: super_class.map_or(0, MetaObject::method_count),
            property_offset: super_class.map_or(0, MetaObject::property_count),
            enum_offset: super_class.map_or(0, MetaObject::enumerator_count),
            methods_by_signature,
            properties_by_name,
            enums_by_name,
        }
    }

    pub fn table(&self) -> &MetaObjectTable {
        &self.table
    }

    pub fn class_name(&self) -> &str {
        self.table.class_name()
    }

    pub fn super_class_name(&self) -> Option<&str> {
        self.table.super_class_name()
    }

    /// The superclass linked at registration. `None` for root classes and
    /// for classes registered before their declared base.
    pub fn super_class(&self) -> Option<&'static MetaObject> {
        self.super_class
    }

    /// Iterate over this class followed by its linked ancestors.
    pub fn ancestry(&self) -> impl Iterator<Item = &MetaObject> {
        let mut current: Option<&MetaObject> = Some(self);
        std::iter::from_fn(move || {
            let meta = current?;
            current = meta.super_class;
            Some(meta)
        })
    }

    /// Whether this class is, or derives from, `class_name`.
    pub fn inherits(&self, class_name: &str) -> bool {
        self.ancestry().any(|meta| meta.class_name() == class_name)
    }

    /// Absolute index of this class's first own method.
    pub fn method_offset(&self) -> usize {
        self.method_offset
    }

    /// Number of methods, including inherited ones.
    pub fn method_count(&self) -> usize {
        self.method_offset() + self.table.methods.len()
    }

    /// Method at an absolute index.
    pub fn method(&self, index: usize) -> Option<MetaMethod<'_>> {
        let owner = self.ancestry().find(|meta| index >= meta.method_offset)?;
        let entry = owner.table.methods.get(index - owner.method_offset)?;
        Some(MetaMethod {
            owner,
            entry,
            index,
        })
    }

    /// Absolute index of a method by signature, searching outward from this
    /// class. The signature is normalized before lookup.
    pub fn index_of_method(&self, signature: &str) -> Option<usize> {
        let canonical = Signature::parse(signature).ok()?.canonical();
        self.index_of_canonical(&canonical)
    }

    /// Lookup with an already canonical signature.
    pub fn index_of_canonical(&self, canonical: &str) -> Option<usize> {
        for meta in self.ancestry() {
            if let Some(&local) = meta.methods_by_signature.get(canonical) {
                return Some(meta.method_offset() + local);
            }
        }
        None
    }

    /// Like [`index_of_method`](Self::index_of_method), restricted to signals.
    pub fn index_of_signal(&self, signature: &str) -> Option<usize> {
        self.index_of_method(signature)
            .filter(|&i| self.method(i).is_some_and(|m| m.kind() == MethodKind::Signal))
    }

    /// Like [`index_of_method`](Self::index_of_method), restricted to slots.
    pub fn index_of_slot(&self, signature: &str) -> Option<usize> {
        self.index_of_method(signature)
            .filter(|&i| self.method(i).is_some_and(|m| m.kind() == MethodKind::Slot))
    }

    pub fn property_offset(&self) -> usize {
        self.property_offset
    }

    pub fn property_count(&self) -> usize {
        self.property_offset() + self.table.properties.len()
    }

    pub fn property(&self, index: usize) -> Option<MetaProperty<'_>> {
        let owner = self.ancestry().find(|meta| index >= meta.property_offset)?;
        let entry = owner.table.properties.get(index - owner.property_offset)?;
        Some(MetaProperty {
            owner,
            entry,
            index,
        })
    }

    pub fn index_of_property(&self, name: &str) -> Option<usize> {
        self.ancestry().find_map(|meta| {
            meta.properties_by_name
                .get(name)
                .map(|&local| meta.property_offset() + local)
        })
    }

    pub fn enumerator_offset(&self) -> usize {
        self.enum_offset
    }

    pub fn enumerator_count(&self) -> usize {
        self.enumerator_offset() + self.table.enums.len()
    }

    pub fn enumerator(&self, index: usize) -> Option<MetaEnum<'_>> {
        let owner = self.ancestry().find(|meta| index >= meta.enum_offset)?;
        let entry = owner.table.enums.get(index - owner.enum_offset)?;
        Some(MetaEnum { owner, entry })
    }

    pub fn index_of_enumerator(&self, name: &str) -> Option<usize> {
        self.ancestry().find_map(|meta| {
            meta.enums_by_name
                .get(name)
                .map(|&local| meta.enumerator_offset() + local)
        })
    }

    /// Class info value for `key`; the most derived declaration wins.
    pub fn class_info(&self, key: &str) -> Option<&str> {
        self.ancestry().find_map(|meta| {
            meta.table
                .class_info
                .iter()
                .find(|info| meta.table.string(info.key) == key)
                .map(|info| meta.table.string(info.value))
        })
    }
}

impl fmt::Debug for MetaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaObject")
            .field("class_name", &self.class_name())
            .field("super_class", &self.super_class_name())
            .field("methods", &self.table.methods.len())
            .field("properties", &self.table.properties.len())
            .finish()
    }
}

/// A borrowed view of one method.
#[derive(Clone, Copy)]
pub struct MetaMethod<'a> {
    owner: &'a MetaObject,
    entry: &'a MethodEntry,
    index: usize,
}

impl<'a> MetaMethod<'a> {
    /// Absolute index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Index within the declaring class.
    pub fn local_index(&self) -> usize {
        self.index - self.owner.method_offset()
    }

    /// The class that declares this method.
    pub fn enclosing_class(&self) -> &'a MetaObject {
        self.owner
    }

    pub fn name(&self) -> &'a str {
        self.owner.table.string(self.entry.name)
    }

    /// Canonical signature, `name(T1,T2)`.
    pub fn signature(&self) -> &'a str {
        self.owner.table.string(self.entry.signature)
    }

    pub fn signature_hash(&self) -> u64 {
        self.entry.signature_hash
    }

    pub fn return_type(&self) -> &'a str {
        self.owner.table.string(self.entry.return_type)
    }

    pub fn parameter_count(&self) -> usize {
        self.entry.parameter_count()
    }

    /// Normalized parameter types.
    pub fn parameter_types(&self) -> Vec<String> {
        self.entry
            .parameter_types
            .iter()
            .map(|&i| self.owner.table.string(i).to_string())
            .collect()
    }

    pub fn parameter_type(&self, index: usize) -> Option<&'a str> {
        let &i = self.entry.parameter_types.get(index)?;
        Some(self.owner.table.string(i))
    }

    pub fn parameter_names(&self) -> Vec<&'a str> {
        self.entry
            .parameter_names
            .iter()
            .map(|&i| self.owner.table.string(i))
            .collect()
    }

    pub fn kind(&self) -> MethodKind {
        self.entry.kind
    }

    pub fn access(&self) -> Access {
        self.entry.access
    }

    pub fn is_cloned(&self) -> bool {
        self.entry.cloned
    }
}

impl fmt::Debug for MetaMethod<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{} [{}]", self.owner.class_name(), self.signature(), self.index)
    }
}

/// A borrowed view of one property.
#[derive(Clone, Copy)]
pub struct MetaProperty<'a> {
    owner: &'a MetaObject,
    entry: &'a PropertyEntry,
    index: usize,
}

impl<'a> MetaProperty<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &'a str {
        self.owner.table.string(self.entry.name)
    }

    pub fn type_name(&self) -> &'a str {
        self.owner.table.string(self.entry.type_name)
    }

    pub fn enclosing_class(&self) -> &'a MetaObject {
        self.owner
    }

    pub fn flags(&self) -> PropertyFlags {
        self.entry.flags
    }

    pub fn is_readable(&self) -> bool {
        self.entry.flags.contains(PropertyFlags::READABLE)
    }

    pub fn is_writable(&self) -> bool {
        self.entry.flags.contains(PropertyFlags::WRITABLE)
            && !self.entry.flags.contains(PropertyFlags::CONSTANT)
    }

    pub fn is_resettable(&self) -> bool {
        self.entry.flags.contains(PropertyFlags::RESETTABLE)
    }

    pub fn is_constant(&self) -> bool {
        self.entry.flags.contains(PropertyFlags::CONSTANT)
    }

    /// The notify signal, resolved in the declaring class.
    pub fn notify_signal(&self) -> Option<MetaMethod<'a>> {
        let local = self.entry.notify? as usize;
        self.owner.method(self.owner.method_offset() + local)
    }
}

impl fmt::Debug for MetaProperty<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}::{}", self.type_name(), self.owner.class_name(), self.name())
    }
}

/// A borrowed view of one enum.
#[derive(Clone, Copy)]
pub struct MetaEnum<'a> {
    owner: &'a MetaObject,
    entry: &'a EnumEntry,
}

impl<'a> MetaEnum<'a> {
    pub fn name(&self) -> &'a str {
        self.owner.table.string(self.entry.name)
    }

    pub fn is_flag(&self) -> bool {
        self.entry.is_flag
    }

    pub fn is_scoped(&self) -> bool {
        self.entry.is_scoped
    }

    pub fn key_count(&self) -> usize {
        self.entry.keys.len()
    }

    pub fn key(&self, index: usize) -> Option<&'a str> {
        let key = self.entry.keys.get(index)?;
        Some(self.owner.table.string(key.name))
    }

    pub fn value(&self, index: usize) -> Option<i64> {
        self.entry.keys.get(index).map(|k| k.value)
    }

    pub fn key_to_value(&self, key: &str) -> Option<i64> {
        self.entry
            .keys
            .iter()
            .find(|k| self.owner.table.string(k.name) == key)
            .map(|k| k.value)
    }

    pub fn value_to_key(&self, value: i64) -> Option<&'a str> {
        self.entry
            .keys
            .iter()
            .find(|k| k.value == value)
            .map(|k| self.owner.table.string(k.name))
    }

    /// `A|B` for flag sets. Unknown bits are ignored.
    pub fn value_to_keys(&self, value: i64) -> String {
        self.entry
            .keys
            .iter()
            .filter(|k| k.value != 0 && value & k.value == k.value)
            .map(|k| self.owner.table.string(k.name))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Global type registry.
static TYPE_REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

/// Process-wide, append-only class registry.
///
/// Entries are leaked and live for the rest of the process, so lookups hand
/// out `&'static MetaObject`. Re-registering a class name keeps the first
/// entry; re-registering an artifact guard does nothing.
pub struct TypeRegistry {
    classes: RwLock<HashMap<String, &'static MetaObject>>,
    guards: Mutex<HashSet<String>>,
}

impl TypeRegistry {
    fn new() -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
            guards: Mutex::new(HashSet::new()),
        }
    }

    /// The global registry, created on first use.
    pub fn global() -> &'static TypeRegistry {
        TYPE_REGISTRY.get_or_init(TypeRegistry::new)
    }

    /// Register one table. If the class is already known the existing entry
    /// is returned and the new table is discarded.
    ///
    /// The declared superclass is linked if it is registered. Otherwise the
    /// class becomes a root class and a warning is logged.
    pub fn register_table(
        &self,
        table: MetaObjectTable,
    ) -> Result<&'static MetaObject, RegistrationError> {
        if let Some(existing) = self.get(table.class_name()) {
            return Ok(existing);
        }
        validate(&table)?;
        self.check_inheritance(&table, &HashMap::new())?;

        let mut classes = self.classes.write();
        if let Some(&existing) = classes.get(table.class_name()) {
            return Ok(existing);
        }
        let super_class = table.super_class_name().and_then(|name| classes.get(name).copied());
        if let Some(name) = table.super_class_name()
            && super_class.is_none()
        {
            tracing::warn!(
                target: targets::REGISTRY,
                class = table.class_name(),
                super_class = name,
                "superclass not registered, class has no inherited members"
            );
        }

        let name = table.class_name().to_string();
        let meta: &'static MetaObject =
            Box::leak(Box::new(MetaObject::linked(table, super_class)));
        classes.insert(name, meta);
        tracing::debug!(
            target: targets::REGISTRY,
            class = meta.class_name(),
            super_class = meta.super_class_name().unwrap_or("-"),
            linked = super_class.is_some(),
            methods = meta.table.methods.len(),
            "registered class"
        );
        Ok(meta)
    }

    /// Reject a table whose declared superclass chain leads back to itself.
    ///
    /// `pending` maps class names of not yet registered tables to their
    /// declared superclass; it takes precedence over the registry.
    fn check_inheritance(
        &self,
        table: &MetaObjectTable,
        pending: &HashMap<&str, Option<&str>>,
    ) -> Result<(), RegistrationError> {
        let class = table.class_name();
        let mut seen = HashSet::new();
        let mut next = table.super_class_name().map(str::to_string);
        while let Some(name) = next {
            if name == class {
                return Err(RegistrationError::InvalidTable {
                    class: class.to_string(),
                    reason: "cyclic inheritance".to_string(),
                });
            }
            if !seen.insert(name.clone()) {
                break;
            }
            next = match pending.get(name.as_str()) {
                Some(declared) => declared.map(str::to_string),
                None => self
                    .get(&name)
                    .and_then(|meta| meta.super_class_name())
                    .map(str::to_string),
            };
        }
        Ok(())
    }

    /// Register every class of an artifact. Returns the number of classes
    /// newly added; zero if the guard was already registered.
    ///
    /// Nothing is registered if any table is invalid.
    pub fn register_artifact(&self, artifact: MetaArtifact) -> Result<usize, RegistrationError> {
        if artifact.version != METADATA_VERSION {
            return Err(MetadataVersionError {
                found: artifact.version,
                expected: METADATA_VERSION,
            }
            .into());
        }
        let pending: HashMap<&str, Option<&str>> = artifact
            .classes
            .iter()
            .map(|table| (table.class_name(), table.super_class_name()))
            .collect();
        for table in &artifact.classes {
            validate(table)?;
            self.check_inheritance(table, &pending)?;
        }

        if !self.guards.lock().insert(artifact.guard.clone()) {
            tracing::trace!(target: targets::REGISTRY, guard = %artifact.guard, "artifact already registered");
            return Ok(0);
        }

        let mut added = 0;
        for table in artifact.classes {
            let known = self.classes.read().contains_key(table.class_name());
            if known {
                tracing::warn!(
                    target: targets::REGISTRY,
                    class = table.class_name(),
                    source = %artifact.source,
                    "class already registered, keeping first definition"
                );
                continue;
            }
            self.register_table(table)?;
            added += 1;
        }
        Ok(added)
    }

    /// Parse and register a JSON artifact.
    pub fn register_json(&self, json: &str) -> Result<usize, RegistrationError> {
        self.register_artifact(MetaArtifact::from_json(json)?)
    }

    pub fn get(&self, class_name: &str) -> Option<&'static MetaObject> {
        self.classes.read().get(class_name).copied()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.classes.read().contains_key(class_name)
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

fn validate(table: &MetaObjectTable) -> Result<(), RegistrationError> {
    table
        .validate()
        .map_err(|reason| RegistrationError::InvalidTable {
            class: table.class_name().to_string(),
            reason,
        })
}

/// Register a JSON artifact with the global registry.
pub fn register_metadata(json: &str) -> Result<usize, RegistrationError> {
    TypeRegistry::global().register_json(json)
}

/// Look up a class in the global registry.
pub fn lookup_class(class_name: &str) -> Option<&'static MetaObject> {
    TypeRegistry::global().get(class_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{MethodSpec, TableBuilder};

    fn register_chain(prefix: &str) -> (&'static MetaObject, &'static MetaObject) {
        let base_name = format!("{prefix}Base");
        let mut base = TableBuilder::new(&base_name, None);
        let changed = base.add_method(MethodSpec::new("changed", MethodKind::Signal));
        base.add_method(MethodSpec::new("reset", MethodKind::Slot));
        base.add_property("level", "int", PropertyFlags::READABLE, Some(changed));
        base.add_enum("Color", false, false, [("Red", 1), ("Green", 2)]);
        base.add_class_info("version", "1");

        let mut derived = TableBuilder::new(&format!("{prefix}Derived"), Some(&base_name));
        derived.add_method(MethodSpec::new("moved", MethodKind::Signal).param("int", "x"));
        derived.add_method(MethodSpec::new("reset", MethodKind::Slot));
        derived.add_property("name", "QString", PropertyFlags::READABLE, None);
        derived.add_class_info("version", "2");

        let registry = TypeRegistry::global();
        let base = registry.register_table(base.build()).unwrap();
        let derived = registry.register_table(derived.build()).unwrap();
        (base, derived)
    }

    #[test]
    fn test_absolute_indices_span_inheritance() {
        let (base, derived) = register_chain("MetaIdx");
        assert_eq!(base.method_count(), 2);
        assert_eq!(derived.method_offset(), 2);
        assert_eq!(derived.method_count(), 4);

        let changed = derived.index_of_method("changed()").unwrap();
        assert_eq!(changed, 0);
        let method = derived.method(changed).unwrap();
        assert_eq!(method.enclosing_class().class_name(), "MetaIdxBase");
        assert_eq!(method.kind(), MethodKind::Signal);

        assert_eq!(derived.index_of_method("moved(int)"), Some(2));
        assert_eq!(derived.index_of_method("moved( const int & )"), Some(2));
        assert_eq!(derived.index_of_method("missing()"), None);
        assert!(derived.method(4).is_none());
    }

    #[test]
    fn test_override_shadows_base() {
        let (base, derived) = register_chain("MetaShadow");
        assert_eq!(base.index_of_method("reset()"), Some(1));
        assert_eq!(derived.index_of_method("reset()"), Some(3));
        assert_eq!(derived.index_of_signal("reset()"), None);
        assert_eq!(derived.index_of_slot("reset()"), Some(3));
    }

    #[test]
    fn test_properties_enums_and_class_info() {
        let (_, derived) = register_chain("MetaProps");
        assert_eq!(derived.property_count(), 2);
        let level = derived.property(derived.index_of_property("level").unwrap()).unwrap();
        assert_eq!(level.type_name(), "int");
        assert_eq!(level.notify_signal().unwrap().signature(), "changed()");
        assert_eq!(derived.index_of_property("name"), Some(1));

        let color = derived.enumerator(derived.index_of_enumerator("Color").unwrap()).unwrap();
        assert_eq!(color.key_to_value("Green"), Some(2));
        assert_eq!(color.value_to_key(1), Some("Red"));

        assert_eq!(derived.class_info("version"), Some("2"));
        assert!(derived.inherits("MetaPropsBase"));
        assert!(!derived.inherits("Unrelated"));
    }

    #[test]
    fn test_first_registration_wins() {
        let registry = TypeRegistry::global();
        let mut first = TableBuilder::new("MetaDupClass", None);
        first.add_method(MethodSpec::new("one", MethodKind::Signal));
        let mut second = TableBuilder::new("MetaDupClass", None);
        second.add_method(MethodSpec::new("two", MethodKind::Signal));

        let a = registry.register_table(first.build()).unwrap();
        let b = registry.register_table(second.build()).unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(b.index_of_method("one()"), Some(0));
        assert_eq!(b.index_of_method("two()"), None);
    }

    #[test]
    fn test_artifact_guard_is_idempotent() {
        let mut artifact = MetaArtifact::new("guarded.h", "META_GUARDED_H");
        artifact
            .classes
            .push(TableBuilder::new("MetaGuardedClass", None).build());
        let json = artifact.to_json().unwrap();

        assert_eq!(register_metadata(&json).unwrap(), 1);
        assert_eq!(register_metadata(&json).unwrap(), 0);
        assert!(lookup_class("MetaGuardedClass").is_some());
    }

    #[test]
    fn test_artifact_version_mismatch_registers_nothing() {
        let mut artifact = MetaArtifact::new("future.h", "META_FUTURE_H");
        artifact.version = METADATA_VERSION + 1;
        artifact
            .classes
            .push(TableBuilder::new("MetaFutureClass", None).build());

        let err = TypeRegistry::global()
            .register_artifact(artifact)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Version(_)));
        assert!(lookup_class("MetaFutureClass").is_none());
    }

    #[test]
    fn test_flag_keys() {
        let mut builder = TableBuilder::new("MetaFlagsClass", None);
        builder.add_enum("Options", true, false, [("None", 0), ("A", 1), ("B", 2), ("C", 4)]);
        let meta = TypeRegistry::global().register_table(builder.build()).unwrap();
        let options = meta.enumerator(0).unwrap();
        assert!(options.is_flag());
        assert_eq!(options.value_to_keys(5), "A|C");
    }
}
