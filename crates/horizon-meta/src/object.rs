//! Objects that participate in reflection and signal delivery.
//!
//! An object is any type implementing [`Object`] that embeds an [`ObjectBase`].
//! Registering it with a [`Runtime`](crate::Runtime) assigns an [`ObjectId`],
//! binds it to the registering thread's context and looks up its
//! [`MetaObject`](crate::MetaObject) by class name.
//!
//! The runtime only holds a weak reference to the object. When the last
//! `Arc` is dropped, the embedded [`ObjectBase`] destroys the registration,
//! which tears down every connection touching the object.
//!
//! # Lifecycle
//!
//! ```text
//! Constructed --register--> Active --destroy--> Destroying --> Destroyed
//! ```
//!
//! Only `Active` objects may emit or receive. A `Destroying` object is skipped
//! by any delivery that reaches it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use horizon_meta::{InvokeError, MetaMethod, Object, ObjectBase, Variant};
//!
//! struct Probe {
//!     base: ObjectBase,
//! }
//!
//! impl Object for Probe {
//!     fn base(&self) -> &ObjectBase {
//!         &self.base
//!     }
//!
//!     fn class_name(&self) -> &'static str {
//!         "Probe"
//!     }
//!
//!     fn invoke_method(
//!         &self,
//!         method: &MetaMethod<'_>,
//!         _args: &[Variant],
//!     ) -> Result<Option<Variant>, InvokeError> {
//!         Err(InvokeError::NotInvokable(method.signature().to_string()))
//!     }
//! }
//!
//! let probe = Arc::new(Probe { base: ObjectBase::new() });
//! assert!(probe.base().id().is_none());
//! ```

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{OnceLock, Weak};

use slotmap::new_key_type;

use crate::error::DispatchResult;
use crate::meta::{MetaMethod, MetaProperty};
use crate::runtime::{EmitReport, Runtime, RuntimeInner};
use crate::variant::Variant;

new_key_type! {
    /// A unique identifier for a registered object.
    ///
    /// Ids are never reused while the runtime lives; a stale id simply fails
    /// to resolve.
    pub struct ObjectId;
}

/// Lifecycle state of a registered object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectState {
    Constructed = 0,
    Active = 1,
    Destroying = 2,
    Destroyed = 3,
}

impl ObjectState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Constructed,
            1 => Self::Active,
            2 => Self::Destroying,
            _ => Self::Destroyed,
        }
    }
}

/// Atomic holder for an [`ObjectState`].
#[derive(Debug)]
pub(crate) struct AtomicObjectState(AtomicU8);

impl AtomicObjectState {
    pub(crate) fn new(state: ObjectState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self) -> ObjectState {
        ObjectState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: ObjectState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Errors that can occur during object operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectError {
    #[error("Invalid or destroyed object ID")]
    InvalidObjectId,
    #[error("Object is being destroyed")]
    Destroying,
    #[error("Object is already registered")]
    AlreadyRegistered,
    #[error("No metadata registered for class `{0}`")]
    UnknownClass(String),
    #[error("Property `{0}` not found")]
    PropertyNotFound(String),
    #[error("Property `{0}` is read-only")]
    PropertyReadOnly(String),
    #[error("Property `{0}` cannot be read")]
    PropertyNotReadable(String),
    #[error("Property `{0}` cannot be reset")]
    PropertyNotResettable(String),
    #[error("Value of type {got} rejected by property `{name}`")]
    PropertyTypeMismatch { name: String, got: &'static str },
}

/// Result type for object operations.
pub type ObjectResult<T> = std::result::Result<T, ObjectError>;

/// Errors returned by an object's reflective method implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokeError {
    #[error("method `{0}` is not invokable")]
    NotInvokable(String),
    #[error("argument {index} has type {got}, expected {expected}")]
    ArgumentType {
        index: usize,
        expected: String,
        got: &'static str,
    },
    #[error("{0}")]
    Failed(String),
}

/// A reflective object.
///
/// Implementations dispatch on the method or property they are handed. The
/// meta-object compiler's metadata tells the runtime which indices exist; the
/// object supplies the behavior.
pub trait Object: Any + Send + Sync {
    /// The embedded base.
    fn base(&self) -> &ObjectBase;

    /// Class name used to look up the registered metadata.
    fn class_name(&self) -> &'static str;

    /// Invoke a method, slot or signal handler by its metadata.
    ///
    /// `args` holds exactly `method.parameter_count()` values.
    fn invoke_method(
        &self,
        method: &MetaMethod<'_>,
        args: &[Variant],
    ) -> Result<Option<Variant>, InvokeError>;

    fn read_property(&self, _property: &MetaProperty<'_>) -> Option<Variant> {
        None
    }

    /// Returns `false` if the value was rejected.
    fn write_property(&self, _property: &MetaProperty<'_>, _value: Variant) -> bool {
        false
    }

    fn reset_property(&self, _property: &MetaProperty<'_>) -> bool {
        false
    }
}

struct Binding {
    id: ObjectId,
    runtime: Weak<RuntimeInner>,
}

/// Per-object registration state. Embed one in every [`Object`].
///
/// Dropping the base destroys the registration.
#[derive(Default)]
pub struct ObjectBase {
    binding: OnceLock<Binding>,
}

impl ObjectBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id assigned at registration.
    pub fn id(&self) -> Option<ObjectId> {
        self.binding.get().map(|b| b.id)
    }

    pub fn is_registered(&self) -> bool {
        self.binding.get().is_some()
    }

    /// The runtime this object is registered with, if it is still alive.
    pub fn runtime(&self) -> Option<Runtime> {
        self.binding
            .get()
            .and_then(|b| b.runtime.upgrade())
            .map(Runtime::from_inner)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ObjectState {
        match (self.id(), self.runtime()) {
            (None, _) => ObjectState::Constructed,
            (Some(id), Some(runtime)) => runtime.object_state(id),
            (Some(_), None) => ObjectState::Destroyed,
        }
    }

    /// Emit a signal of this object by signature.
    ///
    /// Emitting from an unregistered object delivers nothing.
    pub fn emit(&self, signature: &str, args: &[Variant]) -> DispatchResult<EmitReport> {
        match (self.id(), self.runtime()) {
            (Some(id), Some(runtime)) => runtime.emit_by_signature(id, signature, args),
            _ => Ok(EmitReport::default()),
        }
    }

    /// Emit a signal of this object by absolute method index.
    pub fn emit_index(&self, signal_index: usize, args: &[Variant]) -> DispatchResult<EmitReport> {
        match (self.id(), self.runtime()) {
            (Some(id), Some(runtime)) => runtime.emit(id, signal_index, args),
            _ => Ok(EmitReport::default()),
        }
    }

    pub(crate) fn bind(&self, id: ObjectId, runtime: Weak<RuntimeInner>) -> bool {
        self.binding.set(Binding { id, runtime }).is_ok()
    }
}

impl fmt::Debug for ObjectBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBase").field("id", &self.id()).finish()
    }
}

impl Drop for ObjectBase {
    fn drop(&mut self) {
        // Unregister when the object itself goes away.
        if let Some(binding) = self.binding.get()
            && let Some(inner) = binding.runtime.upgrade()
        {
            Runtime::from_inner(inner).destroy(binding.id);
        }
    }
}

/// Safe downcast function for [`Object`] trait objects.
pub fn object_cast<T: Object>(obj: &dyn Object) -> Option<&T> {
    (obj as &dyn Any).downcast_ref::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        base: ObjectBase,
    }

    impl Object for Plain {
        fn base(&self) -> &ObjectBase {
            &self.base
        }

        fn class_name(&self) -> &'static str {
            "Plain"
        }

        fn invoke_method(
            &self,
            method: &MetaMethod<'_>,
            _args: &[Variant],
        ) -> Result<Option<Variant>, InvokeError> {
            Err(InvokeError::NotInvokable(method.signature().to_string()))
        }
    }

    struct Other {
        base: ObjectBase,
    }

    impl Object for Other {
        fn base(&self) -> &ObjectBase {
            &self.base
        }

        fn class_name(&self) -> &'static str {
            "Other"
        }

        fn invoke_method(
            &self,
            _method: &MetaMethod<'_>,
            _args: &[Variant],
        ) -> Result<Option<Variant>, InvokeError> {
            Ok(None)
        }
    }

    #[test]
    fn test_unregistered_base() {
        let plain = Plain {
            base: ObjectBase::new(),
        };
        assert!(!plain.base.is_registered());
        assert_eq!(plain.base.state(), ObjectState::Constructed);
        assert!(plain.base.runtime().is_none());
        let report = plain.base.emit("changed()", &[]).unwrap();
        assert_eq!(report.delivered(), 0);
    }

    #[test]
    fn test_object_cast() {
        let plain = Plain {
            base: ObjectBase::new(),
        };
        let obj: &dyn Object = &plain;
        assert!(object_cast::<Plain>(obj).is_some());
        assert!(object_cast::<Other>(obj).is_none());
    }

    #[test]
    fn test_state_roundtrip() {
        let state = AtomicObjectState::new(ObjectState::Constructed);
        for s in [
            ObjectState::Active,
            ObjectState::Destroying,
            ObjectState::Destroyed,
        ] {
            state.store(s);
            assert_eq!(state.load(), s);
        }
    }
}
