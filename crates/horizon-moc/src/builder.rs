//! Metadata table builder.
//!
//! Turns parsed [`ClassDecl`]s into [`MetaObjectTable`]s. Base classes are
//! resolved across the whole batch once every file is parsed, so a class may
//! derive from a class declared later or in another file. Classes are then
//! ordered bases first; a cycle in the base-class graph is fatal for the
//! batch.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use horizon_meta::table::{MetaObjectTable, MethodKind, MethodSpec, PropertyFlags, TableBuilder};

use crate::error::{CompileError, CompileResult, DependencyCycleError};
use crate::logging::targets;
use crate::parser::{ClassDecl, FunctionDecl, PropertyDecl};

/// The annotated classes of one successfully parsed input file.
#[derive(Debug, Clone, Copy)]
pub struct SourceClasses<'d> {
    pub file: &'d Path,
    pub classes: &'d [ClassDecl],
}

/// Tables for one file, bases first, or the first error in that file.
pub type FileTables = CompileResult<Vec<MetaObjectTable>>;

/// Every annotated class of a batch, addressable by qualified name.
#[derive(Debug)]
pub struct ClassIndex<'d> {
    entries: Vec<(usize, &'d ClassDecl)>,
    by_name: HashMap<&'d str, usize>,
}

impl<'d> ClassIndex<'d> {
    pub fn new(sources: &[SourceClasses<'d>]) -> Self {
        let mut entries = Vec::new();
        let mut by_name = HashMap::new();
        for (file_index, source) in sources.iter().enumerate() {
            for decl in source.classes {
                let index = entries.len();
                entries.push((file_index, decl));
                if let Entry::Vacant(slot) = by_name.entry(decl.name.as_str()) {
                    slot.insert(index);
                } else {
                    tracing::warn!(
                        target: targets::BUILDER,
                        class = %decl.name,
                        file = %source.file.display(),
                        "class declared more than once in the batch; keeping the first"
                    );
                }
            }
        }
        Self { entries, by_name }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> &'d ClassDecl {
        self.entries[index].1
    }

    /// Index of the input file declaring class `index`.
    pub fn file_of(&self, index: usize) -> usize {
        self.entries[index].0
    }

    pub fn find(&self, qualified: &str) -> Option<usize> {
        self.by_name.get(qualified).copied()
    }

    /// Resolve a base class as written inside `decl`.
    ///
    /// Names are looked up from the innermost enclosing scope outward, the
    /// way unqualified names resolve in the source language.
    pub fn resolve_base(&self, decl: &ClassDecl, base: &str) -> Option<usize> {
        if let Some(absolute) = base.strip_prefix("::") {
            return self.find(absolute);
        }
        let mut scope = decl.scope.as_str();
        loop {
            if !scope.is_empty()
                && let Some(index) = self.find(&format!("{scope}::{base}"))
            {
                return Some(index);
            }
            match scope.rsplit_once("::") {
                Some((outer, _)) => scope = outer,
                None if !scope.is_empty() => scope = "",
                None => return self.find(base),
            }
        }
    }

    /// Name recorded as the superclass of `decl`: its first base, qualified
    /// when it resolves within the batch.
    pub fn super_class_name(&self, decl: &ClassDecl) -> Option<String> {
        let base = decl.bases.first()?;
        Some(match self.resolve_base(decl, base) {
            Some(index) => self.get(index).name.clone(),
            None => base.trim_start_matches("::").to_string(),
        })
    }

    /// In-batch ancestors of `decl` along the superclass chain, nearest
    /// first. Stops at the first base outside the batch.
    pub fn ancestors(&self, decl: &'d ClassDecl) -> impl Iterator<Item = &'d ClassDecl> + '_ {
        let mut current = decl;
        let mut seen = HashSet::new();
        std::iter::from_fn(move || {
            let base = current.bases.first()?;
            let index = self.resolve_base(current, base)?;
            if !seen.insert(index) {
                return None;
            }
            current = self.get(index);
            Some(current)
        })
    }

    /// All classes, every base before the classes deriving from it.
    /// Unrelated classes keep their input order.
    pub fn topological_order(&self) -> Result<Vec<usize>, DependencyCycleError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        fn visit(
            index: &ClassIndex<'_>,
            node: usize,
            marks: &mut [Mark],
            path: &mut Vec<usize>,
            order: &mut Vec<usize>,
        ) -> Result<(), DependencyCycleError> {
            match marks[node] {
                Mark::Done => return Ok(()),
                Mark::Visiting => {
                    let start = path.iter().position(|&n| n == node).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&n| index.get(n).name.clone())
                        .collect();
                    cycle.push(index.get(node).name.clone());
                    return Err(DependencyCycleError { cycle });
                }
                Mark::Unvisited => {}
            }
            marks[node] = Mark::Visiting;
            path.push(node);
            let decl = index.get(node);
            for base in &decl.bases {
                if let Some(dependency) = index.resolve_base(decl, base) {
                    visit(index, dependency, marks, path, order)?;
                }
            }
            path.pop();
            marks[node] = Mark::Done;
            order.push(node);
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut order = Vec::with_capacity(self.len());
        let mut path = Vec::new();
        for node in 0..self.len() {
            visit(self, node, &mut marks, &mut path, &mut order)?;
        }
        Ok(order)
    }
}

/// Build the tables of every file in the batch.
///
/// The outer error is the batch-level base-class cycle. Per-file results
/// follow the order of `sources`.
pub fn build_batch(sources: &[SourceClasses<'_>]) -> Result<Vec<FileTables>, DependencyCycleError> {
    let index = ClassIndex::new(sources);
    let order = index.topological_order()?;

    let mut results: Vec<FileTables> = sources.iter().map(|_| Ok(Vec::new())).collect();
    for node in order {
        let file = index.file_of(node);
        let Ok(tables) = &mut results[file] else {
            continue;
        };
        match build_table(&index, index.get(node), sources[file].file) {
            Ok(table) => tables.push(table),
            Err(err) => results[file] = Err(err),
        }
    }
    Ok(results)
}

/// Build the table of one class.
#[tracing::instrument(skip(index, decl, file), fields(class = %decl.name), target = "horizon_moc::builder", level = "trace")]
pub fn build_table(index: &ClassIndex<'_>, decl: &ClassDecl, file: &Path) -> CompileResult<MetaObjectTable> {
    let super_class = index.super_class_name(decl);
    let mut builder = TableBuilder::new(&decl.name, super_class.as_deref());

    for (key, value) in &decl.class_info {
        builder.add_class_info(key, value);
    }

    add_methods(&mut builder, decl, file)?;

    for property in &decl.properties {
        let notify = resolve_notify(index, &builder, decl, property, file)?;
        builder.add_property(&property.name, &property.ty, property_flags(property), notify);
    }

    for registered in &decl.registered_enums {
        let Some(entry) = decl.enums.iter().find(|e| e.name == registered.name) else {
            return Err(CompileError::new(
                file,
                registered.line,
                format!(
                    "`{}` registers unknown enum `{}` in class `{}`",
                    if registered.is_flag { "H_FLAG" } else { "H_ENUM" },
                    registered.name,
                    decl.name
                ),
            ));
        };
        builder.add_enum(
            &entry.name,
            registered.is_flag,
            entry.is_scoped,
            entry.keys.iter().map(|(key, value)| (key.as_str(), *value)),
        );
    }

    let table = builder.build();
    tracing::debug!(
        target: targets::BUILDER,
        class = %decl.name,
        super_class = ?table.super_class_name(),
        methods = table.methods.len(),
        properties = table.properties.len(),
        strings = table.strings.len(),
        "built meta-object table"
    );
    Ok(table)
}

/// Signals first, then slots, then invokable methods. Each declaration with
/// default arguments is followed by its cloned shorter forms.
fn add_methods(builder: &mut TableBuilder, decl: &ClassDecl, file: &Path) -> CompileResult<()> {
    let mut explicit = HashSet::new();
    for function in &decl.methods {
        let canonical = method_spec(function, function.params.len(), false)
            .signature()
            .canonical();
        if !explicit.insert(canonical.clone()) {
            return Err(CompileError::new(
                file,
                function.line,
                format!("`{canonical}` is declared twice in class `{}`", decl.name),
            ));
        }
    }

    let mut added = HashSet::new();
    for kind in [MethodKind::Signal, MethodKind::Slot, MethodKind::Method] {
        for function in decl.methods.iter().filter(|f| f.kind == kind) {
            let spec = method_spec(function, function.params.len(), false);
            added.insert(spec.signature().canonical());
            builder.add_method(spec);

            for dropped in 1..=function.defaulted_count() {
                let spec = method_spec(function, function.params.len() - dropped, true);
                let canonical = spec.signature().canonical();
                if explicit.contains(&canonical) || !added.insert(canonical) {
                    continue;
                }
                builder.add_method(spec);
            }
        }
    }
    Ok(())
}

fn method_spec(function: &FunctionDecl, arity: usize, cloned: bool) -> MethodSpec {
    function.params[..arity].iter().fold(
        MethodSpec::new(&function.name, function.kind)
            .returns(&function.return_type)
            .access(function.access)
            .cloned(cloned),
        |spec, param| spec.param(&param.ty, param.name.as_deref().unwrap_or_default()),
    )
}

fn property_flags(property: &PropertyDecl) -> PropertyFlags {
    let mut flags = PropertyFlags::empty();
    let has_member = property.member.is_some();
    if property.read.is_some() || has_member {
        flags.insert(PropertyFlags::READABLE);
    }
    if property.write.is_some() || (has_member && !property.constant) {
        flags.insert(PropertyFlags::WRITABLE);
    }
    if has_member {
        flags.insert(PropertyFlags::MEMBER);
    }
    if property.reset.is_some() {
        flags.insert(PropertyFlags::RESETTABLE);
    }
    if property.stored {
        flags.insert(PropertyFlags::STORED);
    }
    if property.designable {
        flags.insert(PropertyFlags::DESIGNABLE);
    }
    if property.constant {
        flags.insert(PropertyFlags::CONSTANT);
    }
    if property.is_final {
        flags.insert(PropertyFlags::FINAL);
    }
    flags
}

/// Local index of the notify signal. A signal inherited from an in-batch
/// ancestor is valid but has no local index.
fn resolve_notify(
    index: &ClassIndex<'_>,
    builder: &TableBuilder,
    decl: &ClassDecl,
    property: &PropertyDecl,
    file: &Path,
) -> CompileResult<Option<usize>> {
    let Some(signal) = &property.notify else {
        return Ok(None);
    };

    let local = decl
        .methods
        .iter()
        .find(|f| f.kind == MethodKind::Signal && &f.name == signal);
    if let Some(function) = local {
        let canonical = method_spec(function, function.params.len(), false)
            .signature()
            .canonical();
        return Ok(builder.find_method(&canonical));
    }

    let inherited = index
        .find(&decl.name)
        .map(|i| index.get(i))
        .into_iter()
        .flat_map(|this| index.ancestors(this))
        .any(|ancestor| {
            ancestor
                .methods
                .iter()
                .any(|f| f.kind == MethodKind::Signal && &f.name == signal)
        });
    if inherited {
        return Ok(None);
    }

    Err(CompileError::new(
        file,
        property.line,
        format!(
            "NOTIFY signal `{signal}` of property `{}` is not declared in `{}` or its bases",
            property.name, decl.name
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn parse(source: &str) -> Vec<ClassDecl> {
        parse_source(Path::new("test.h"), source).unwrap()
    }

    fn build_one(source: &str) -> FileTables {
        let classes = parse(source);
        let sources = [SourceClasses {
            file: Path::new("test.h"),
            classes: &classes,
        }];
        build_batch(&sources).unwrap().remove(0)
    }

    #[test]
    fn test_method_order_and_clones() {
        let tables = build_one(
            "class A { H_OBJECT\n\
             public:\n\
               H_INVOKABLE int compute(int x, int y = 2, int z = 3);\n\
             public slots:\n\
               void apply(bool now = true);\n\
             signals:\n\
               void changed(const QString &text);\n\
             };",
        )
        .unwrap();
        let table = &tables[0];
        let signatures: Vec<_> = table.methods.iter().map(|m| table.signature(m)).collect();
        assert_eq!(
            signatures,
            vec![
                "changed(QString)",
                "apply(bool)",
                "apply()",
                "compute(int,int,int)",
                "compute(int,int)",
                "compute(int)",
            ]
        );
        assert!(!table.methods[1].cloned);
        assert!(table.methods[2].cloned);
        assert_eq!(table.string(table.methods[3].return_type), "int");
        assert_eq!(table.string(table.methods[0].declared_types[0]), "const QString&");
    }

    #[test]
    fn test_clone_colliding_with_explicit_overload_is_skipped() {
        let tables = build_one(
            "class A { H_OBJECT\n\
             public slots:\n\
               void set(int a, int b = 0);\n\
               void set(int a);\n\
             };",
        )
        .unwrap();
        let table = &tables[0];
        assert_eq!(table.methods.len(), 2);
        assert!(table.methods.iter().all(|m| !m.cloned));
    }

    #[test]
    fn test_duplicate_signature_is_an_error() {
        let err = build_one(
            "class A { H_OBJECT\n\
             public slots:\n\
               void set(int a);\n\
               void set(const int &b);\n\
             };",
        )
        .unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.message.contains("set(int)"));
    }

    #[test]
    fn test_property_flags_and_notify() {
        let tables = build_one(
            "class A { H_OBJECT\n\
               H_PROPERTY(QString title READ title WRITE setTitle RESET clearTitle NOTIFY titleChanged)\n\
               H_PROPERTY(int id MEMBER m_id CONSTANT)\n\
               H_PROPERTY(bool hidden READ hidden STORED false DESIGNABLE false FINAL)\n\
             signals:\n\
               void titleChanged(const QString &title);\n\
             };",
        )
        .unwrap();
        let table = &tables[0];
        let title = &table.properties[0];
        assert!(title.flags.contains(PropertyFlags::READABLE | PropertyFlags::WRITABLE));
        assert!(title.flags.contains(PropertyFlags::RESETTABLE));
        assert_eq!(title.notify, Some(0));

        let id = &table.properties[1];
        assert!(id.flags.contains(PropertyFlags::MEMBER | PropertyFlags::CONSTANT));
        assert!(!id.flags.contains(PropertyFlags::WRITABLE));

        let hidden = &table.properties[2];
        assert!(!hidden.flags.contains(PropertyFlags::STORED));
        assert!(!hidden.flags.contains(PropertyFlags::DESIGNABLE));
        assert!(hidden.flags.contains(PropertyFlags::FINAL));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn test_unknown_notify_signal_is_an_error() {
        let err = build_one("class A { H_OBJECT H_PROPERTY(int x READ x NOTIFY xChanged) };")
            .unwrap_err();
        assert!(err.message.contains("NOTIFY signal `xChanged`"));
    }

    #[test]
    fn test_notify_signal_from_ancestor() {
        let tables = build_one(
            "class Base { H_OBJECT signals: void changed(); };\n\
             class Derived : public Base { H_OBJECT H_PROPERTY(int x READ x NOTIFY changed) };",
        )
        .unwrap();
        assert_eq!(tables[1].properties[0].notify, None);
        assert_eq!(tables[1].super_class_name(), Some("Base"));
    }

    #[test]
    fn test_registered_enum() {
        let tables = build_one(
            "class A { H_OBJECT public: enum Mode { Off, On }; H_ENUM(Mode) };",
        )
        .unwrap();
        let entry = &tables[0].enums[0];
        assert_eq!(tables[0].string(entry.name), "Mode");
        assert_eq!(entry.keys.len(), 2);

        let err = build_one("class A { H_OBJECT H_FLAG(Missing) };").unwrap_err();
        assert!(err.message.contains("unknown enum `Missing`"));
    }

    #[test]
    fn test_bases_resolve_through_namespaces_and_order() {
        let classes = parse(
            "namespace ui {\n\
               class Button : public Widget { H_OBJECT };\n\
               class Widget : public ::core::Object { H_OBJECT };\n\
             }\n\
             namespace core { class Object { H_OBJECT }; }",
        );
        let sources = [SourceClasses {
            file: Path::new("test.h"),
            classes: &classes,
        }];
        let index = ClassIndex::new(&sources);
        let button = index.find("ui::Button").unwrap();
        assert_eq!(index.resolve_base(index.get(button), "Widget"), index.find("ui::Widget"));

        let order: Vec<_> = index
            .topological_order()
            .unwrap()
            .into_iter()
            .map(|i| index.get(i).name.as_str())
            .collect();
        assert_eq!(order, vec!["core::Object", "ui::Widget", "ui::Button"]);

        let tables = build_batch(&sources).unwrap().remove(0).unwrap();
        assert_eq!(tables[2].super_class_name(), Some("ui::Widget"));
        assert_eq!(tables[1].super_class_name(), Some("core::Object"));
    }

    #[test]
    fn test_cycle_is_detected() {
        let classes = parse(
            "class A : public C { H_OBJECT };\n\
             class B : public A { H_OBJECT };\n\
             class C : public B { H_OBJECT };",
        );
        let sources = [SourceClasses {
            file: Path::new("test.h"),
            classes: &classes,
        }];
        let err = build_batch(&sources).unwrap_err();
        assert_eq!(err.cycle, vec!["A", "C", "B", "A"]);
    }

    #[test]
    fn test_unresolved_base_is_kept_as_written() {
        let tables = build_one("class A : public horizon::Object { H_OBJECT };").unwrap();
        assert_eq!(tables[0].super_class_name(), Some("horizon::Object"));
    }
}
