//! Meta-object runtime for Horizon.
//!
//! This crate loads the reflection tables produced by `horizon-moc` and
//! provides the runtime half of the signal/slot system:
//!
//! - **Metadata**: Serialized per-class tables and their runtime view
//! - **Type Registry**: Process-wide, append-only class registry
//! - **Object Model**: Registration, lifecycle and context affinity
//! - **Signal/Slot System**: Connections with direct, queued, automatic and
//!   blocking delivery
//! - **Event Loops**: One FIFO invocation queue per execution context
//!
//! # Signal/Slot Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use horizon_meta::table::{MethodKind, MethodSpec, TableBuilder};
//! use horizon_meta::{
//!     ConnectionType, InvokeError, MetaMethod, Object, ObjectBase, Runtime, TypeRegistry, Variant,
//! };
//!
//! struct Label {
//!     base: ObjectBase,
//!     text: Mutex<String>,
//! }
//!
//! impl Object for Label {
//!     fn base(&self) -> &ObjectBase {
//!         &self.base
//!     }
//!
//!     fn class_name(&self) -> &'static str {
//!         "CrateDocLabel"
//!     }
//!
//!     fn invoke_method(
//!         &self,
//!         method: &MetaMethod<'_>,
//!         args: &[Variant],
//!     ) -> Result<Option<Variant>, InvokeError> {
//!         match method.name() {
//!             "setText" => {
//!                 *self.text.lock() = args[0].as_str().unwrap_or_default().to_string();
//!                 Ok(None)
//!             }
//!             _ => Err(InvokeError::NotInvokable(method.signature().to_string())),
//!         }
//!     }
//! }
//!
//! let mut table = TableBuilder::new("CrateDocLabel", None);
//! table.add_method(MethodSpec::new("textChanged", MethodKind::Signal).param("const QString &", "text"));
//! table.add_method(MethodSpec::new("setText", MethodKind::Slot).param("QString", "text"));
//! TypeRegistry::global().register_table(table.build()).unwrap();
//!
//! let runtime = Runtime::new();
//! let source = Arc::new(Label { base: ObjectBase::new(), text: Mutex::default() });
//! let mirror = Arc::new(Label { base: ObjectBase::new(), text: Mutex::default() });
//! let source_id = runtime.register(&source).unwrap();
//! let mirror_id = runtime.register(&mirror).unwrap();
//!
//! runtime
//!     .connect(source_id, "textChanged(QString)", mirror_id, "setText(QString)", ConnectionType::Auto)
//!     .unwrap();
//! source.base().emit("textChanged(QString)", &[Variant::from("hello")]).unwrap();
//! assert_eq!(*mirror.text.lock(), "hello");
//! ```

pub mod connection;
pub mod context;
mod error;
pub mod event_loop;
pub mod invocation;
pub mod logging;
pub mod meta;
pub mod object;
mod runtime;
pub mod signature;
pub mod table;
mod variant;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionInfo, ConnectionState, ConnectionType};
pub use context::ContextId;
pub use error::{
    ConnectionError, DispatchError, DispatchResult, DispatchTimeout, MetadataVersionError,
    RegistrationError,
};
pub use event_loop::{EventLoop, LoopExit, QuitHandle};
pub use logging::RuntimeDebug;
pub use meta::{
    MetaEnum, MetaMethod, MetaObject, MetaProperty, TypeRegistry, lookup_class, register_metadata,
};
pub use object::{
    InvokeError, Object, ObjectBase, ObjectError, ObjectId, ObjectResult, ObjectState, object_cast,
};
pub use runtime::{DispatchConfig, EmitReport, Runtime};
pub use signature::{Signature, SignatureError, normalize_signature, normalize_type};
pub use table::{METADATA_VERSION, MetaArtifact, MetaObjectTable, MethodKind};
pub use variant::Variant;

static_assertions::assert_impl_all!(ObjectBase: Send, Sync);
static_assertions::assert_impl_all!(Variant: Send, Sync, Clone);
