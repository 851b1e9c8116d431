//! Error types for the Horizon meta-object runtime.

use std::time::Duration;

use crate::context::ContextId;
use crate::object::{InvokeError, ObjectError};
use crate::signature::SignatureError;

/// A metadata table was produced for a different runtime layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("metadata format version {found} is not supported (runtime expects {expected})")]
pub struct MetadataVersionError {
    /// Version recorded in the artifact.
    pub found: u32,
    /// Version this runtime reads.
    pub expected: u32,
}

/// Errors raised while loading compiled metadata into the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Version(#[from] MetadataVersionError),
    #[error("malformed metadata artifact: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("class `{class}` has an invalid table: {reason}")]
    InvalidTable { class: String, reason: String },
}

/// Errors raised by `connect`. A failed connect leaves no trace in the runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("{class} has no signal `{signature}`")]
    UnknownSignal { class: String, signature: String },
    #[error("{class} has no method `{signature}`")]
    UnknownSlot { class: String, signature: String },
    #[error("method {index} of {class} is not a signal")]
    NotASignal { class: String, index: usize },
    #[error("incompatible arguments: {signal} cannot be delivered to {slot}")]
    SignatureMismatch { signal: String, slot: String },
    #[error(transparent)]
    InvalidSignature(#[from] SignatureError),
    #[error("{0}")]
    Object(#[from] ObjectError),
}

/// A blocking delivery did not complete within the configured bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("blocking invocation did not complete within {timeout:?}")]
pub struct DispatchTimeout {
    pub timeout: Duration,
}

/// Errors raised while emitting a signal or invoking a method.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("method index {index} is out of range for {class}")]
    InvalidMethodIndex { class: String, index: usize },
    #[error("method {index} of {class} is not a signal")]
    NotASignal { class: String, index: usize },
    #[error("{class} has no method `{signature}`")]
    UnknownMethod { class: String, signature: String },
    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount { expected: usize, got: usize },
    /// The emitter would wait on its own queue.
    #[error("blocking delivery to {context} from the same context would deadlock")]
    BlockingSameContext { context: ContextId },
    #[error(transparent)]
    Timeout(#[from] DispatchTimeout),
    #[error(transparent)]
    InvalidSignature(#[from] SignatureError),
    #[error("{0}")]
    Object(#[from] ObjectError),
    #[error("slot failed: {0}")]
    Invoke(#[from] InvokeError),
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
