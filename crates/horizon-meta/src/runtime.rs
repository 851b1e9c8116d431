//! The object registry and signal dispatcher.
//!
//! A [`Runtime`] owns every registered object, every connection and one
//! invocation queue per context. It is cheap to clone and safe to share
//! across threads.
//!
//! # Dispatch
//!
//! Emitting a signal snapshots the sender's connections for that signal, then
//! delivers to each one in connection order. Whether a delivery is a direct
//! call or a queued invocation is decided per connection at emission time by
//! comparing the emitting thread's context with the receiver's context.
//!
//! No runtime lock is held while a slot runs, so slots may emit, connect,
//! disconnect or destroy objects freely. A connection removed during an
//! emission may still receive that emission; it never receives a later one.
//!
//! # Lock Order
//!
//! Per-object link locks are taken before the object and connection arenas.
//! When two objects are linked at once, the lower [`ObjectId`] is locked first.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use horizon_meta::table::{MethodKind, MethodSpec, TableBuilder};
//! use horizon_meta::{ConnectionType, InvokeError, MetaMethod, Object, ObjectBase, Runtime, TypeRegistry, Variant};
//!
//! struct Thermometer {
//!     base: ObjectBase,
//! }
//!
//! impl Object for Thermometer {
//!     fn base(&self) -> &ObjectBase {
//!         &self.base
//!     }
//!
//!     fn class_name(&self) -> &'static str {
//!         "DocThermometer"
//!     }
//!
//!     fn invoke_method(&self, method: &MetaMethod<'_>, _: &[Variant]) -> Result<Option<Variant>, InvokeError> {
//!         Err(InvokeError::NotInvokable(method.signature().to_string()))
//!     }
//! }
//!
//! let mut table = TableBuilder::new("DocThermometer", None);
//! table.add_method(MethodSpec::new("changed", MethodKind::Signal).param("int", "celsius"));
//! TypeRegistry::global().register_table(table.build()).unwrap();
//!
//! let runtime = Runtime::new();
//! let sensor = Arc::new(Thermometer { base: ObjectBase::new() });
//! let id = runtime.register(&sensor).unwrap();
//!
//! let last = Arc::new(AtomicI64::new(0));
//! let seen = last.clone();
//! runtime
//!     .connect_callback(id, "changed(int)", ConnectionType::Auto, move |args| {
//!         seen.store(args[0].to_int().unwrap_or_default(), Ordering::SeqCst);
//!     })
//!     .unwrap();
//!
//! sensor.base().emit("changed(int)", &[Variant::from(21)]).unwrap();
//! assert_eq!(last.load(Ordering::SeqCst), 21);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use slotmap::SlotMap;

use crate::connection::{
    Connection, ConnectionArena, ConnectionId, ConnectionInfo, ConnectionState, ConnectionType,
    ObjectLinks, SlotTarget,
};
use crate::context::ContextId;
use crate::error::{ConnectionError, DispatchError, DispatchResult, DispatchTimeout};
use crate::event_loop::ContextQueue;
use crate::invocation::{
    Completion, CompletionWaiter, Invocation, InvocationTarget, completion_pair,
};
use crate::logging::targets;
use crate::meta::{MetaMethod, MetaObject, TypeRegistry};
use crate::object::{AtomicObjectState, Object, ObjectError, ObjectId, ObjectResult, ObjectState};
use crate::signature::{Signature, parameters_compatible};
use crate::table::MethodKind;
use crate::variant::Variant;

/// Dispatcher configuration.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Upper bound on a blocking delivery. `None` waits indefinitely.
    pub blocking_timeout: Option<Duration>,
}

impl DispatchConfig {
    /// Bound every blocking delivery by `timeout`.
    pub fn with_blocking_timeout(mut self, timeout: Duration) -> Self {
        self.blocking_timeout = Some(timeout);
        self
    }
}

/// Outcome of one emission.
#[derive(Debug, Default)]
pub struct EmitReport {
    /// Slots called on the emitting thread.
    pub direct: usize,
    /// Invocations posted to another queue.
    pub queued: usize,
    /// Blocking invocations that completed.
    pub blocking: usize,
    /// Connections whose receiver was gone at delivery time.
    pub skipped: usize,
    /// Connections whose delivery failed. Other connections still received.
    pub failures: Vec<(ConnectionId, DispatchError)>,
}

impl EmitReport {
    pub fn delivered(&self) -> usize {
        self.direct + self.queued + self.blocking
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first failure, if any.
    pub fn into_result(mut self) -> DispatchResult<Self> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(self.failures.remove(0).1)
        }
    }
}

/// Registration record of one object.
pub(crate) struct LiveObject {
    object: Weak<dyn Object>,
    meta: &'static MetaObject,
    name: RwLock<String>,
    context: RwLock<ContextId>,
    state: AtomicObjectState,
    signals_blocked: AtomicBool,
    links: Mutex<ObjectLinks>,
}

impl LiveObject {
    fn is_active(&self) -> bool {
        self.state.load() == ObjectState::Active
    }

    fn context(&self) -> ContextId {
        *self.context.read()
    }
}

pub(crate) struct RuntimeInner {
    objects: RwLock<SlotMap<ObjectId, Arc<LiveObject>>>,
    connections: ConnectionArena,
    queues: RwLock<HashMap<ContextId, Arc<ContextQueue>>>,
    config: DispatchConfig,
}

/// How one delivery was carried out.
enum Delivery {
    Direct(Option<Variant>),
    Queued,
    Blocking(CompletionWaiter),
    Skipped,
}

/// Result of calling a target in the current context.
enum Outcome {
    Ran(Option<Variant>),
    Skipped,
}

/// Object registry, connection store and dispatcher.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

static_assertions::assert_impl_all!(Runtime: Send, Sync, Clone);

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                objects: RwLock::new(SlotMap::with_key()),
                connections: ConnectionArena::default(),
                queues: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<RuntimeInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.inner.config
    }

    fn live(&self, id: ObjectId) -> Option<Arc<LiveObject>> {
        self.inner.objects.read().get(id).cloned()
    }

    // ---------------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------------

    /// Register an object in the calling thread's context.
    ///
    /// The object's class must already be present in the [`TypeRegistry`].
    #[tracing::instrument(skip_all, target = "horizon_meta::object", level = "trace")]
    pub fn register<T: Object>(&self, object: &Arc<T>) -> ObjectResult<ObjectId> {
        if object.base().is_registered() {
            return Err(ObjectError::AlreadyRegistered);
        }
        let class_name = object.class_name();
        let meta = TypeRegistry::global()
            .get(class_name)
            .ok_or_else(|| ObjectError::UnknownClass(class_name.to_string()))?;

        let weak: Weak<T> = Arc::downgrade(object);
        let weak: Weak<dyn Object> = weak;
        let context = ContextId::current();
        let live = Arc::new(LiveObject {
            object: weak,
            meta,
            name: RwLock::new(String::new()),
            context: RwLock::new(context),
            state: AtomicObjectState::new(ObjectState::Active),
            signals_blocked: AtomicBool::new(false),
            links: Mutex::new(ObjectLinks::default()),
        });

        let id = self.inner.objects.write().insert(live);
        if !object.base().bind(id, Arc::downgrade(&self.inner)) {
            self.inner.objects.write().remove(id);
            return Err(ObjectError::AlreadyRegistered);
        }

        tracing::debug!(target: targets::OBJECT, ?id, class = class_name, %context, "registered object");
        Ok(id)
    }

    /// Destroy an object: sever every connection touching it, then release
    /// its registration. Queued invocations targeting it are dropped when
    /// they reach the front of their queue.
    ///
    /// Returns `false` if the object was unknown or already being destroyed.
    #[tracing::instrument(skip(self), target = "horizon_meta::object", level = "trace")]
    pub fn destroy(&self, id: ObjectId) -> bool {
        let Some(live) = self.live(id) else {
            return false;
        };

        let severed: Vec<ConnectionId> = {
            let mut links = live.links.lock();
            if !live.is_active() {
                return false;
            }
            live.state.store(ObjectState::Destroying);
            let outgoing = std::mem::take(&mut links.outgoing);
            let incoming = std::mem::take(&mut links.incoming);
            outgoing.into_values().flatten().chain(incoming).collect()
        };

        let mut count = 0;
        for connection_id in severed {
            if let Some(connection) = self.inner.connections.remove(connection_id) {
                self.unlink_peers(id, connection_id, &connection);
                count += 1;
            }
        }

        self.inner.objects.write().remove(id);
        live.state.store(ObjectState::Destroyed);
        tracing::debug!(target: targets::OBJECT, ?id, class = live.meta.class_name(), severed = count, "destroyed object");
        true
    }

    /// Remove a severed connection from the link lists of its endpoints,
    /// except `skip`, whose links are already cleared.
    fn unlink_peers(&self, skip: ObjectId, connection_id: ConnectionId, connection: &Connection) {
        let peers = [Some(connection.sender), connection.target.receiver()];
        for peer in peers.into_iter().flatten() {
            if peer == skip {
                continue;
            }
            if let Some(live) = self.live(peer) {
                live.links.lock().remove(connection_id);
            }
        }
    }

    /// Lifecycle state. Unknown ids report [`ObjectState::Destroyed`].
    pub fn object_state(&self, id: ObjectId) -> ObjectState {
        self.live(id)
            .map_or(ObjectState::Destroyed, |live| live.state.load())
    }

    /// Whether the object is registered and active.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.object_state(id) == ObjectState::Active
    }

    pub fn object(&self, id: ObjectId) -> Option<Arc<dyn Object>> {
        self.live(id)?.object.upgrade()
    }

    pub fn meta_object(&self, id: ObjectId) -> Option<&'static MetaObject> {
        self.live(id).map(|live| live.meta)
    }

    pub fn object_count(&self) -> usize {
        self.inner.objects.read().len()
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.inner.objects.read().keys().collect()
    }

    pub fn object_context(&self, id: ObjectId) -> Option<ContextId> {
        self.live(id).map(|live| live.context())
    }

    /// Rebind an object to another context. Invocations already queued on
    /// the old context still run there.
    pub fn move_to_context(&self, id: ObjectId, context: ContextId) -> ObjectResult<()> {
        let live = self.live(id).ok_or(ObjectError::InvalidObjectId)?;
        if !live.is_active() {
            return Err(ObjectError::Destroying);
        }
        let previous = std::mem::replace(&mut *live.context.write(), context);
        tracing::debug!(target: targets::OBJECT, ?id, from = %previous, to = %context, "moved object");
        Ok(())
    }

    pub fn object_name(&self, id: ObjectId) -> Option<String> {
        self.live(id).map(|live| live.name.read().clone())
    }

    pub fn set_object_name(&self, id: ObjectId, name: impl Into<String>) -> ObjectResult<()> {
        let live = self.live(id).ok_or(ObjectError::InvalidObjectId)?;
        *live.name.write() = name.into();
        Ok(())
    }

    /// Block or unblock all signals of an object. Returns the previous value.
    pub fn block_signals(&self, id: ObjectId, blocked: bool) -> ObjectResult<bool> {
        let live = self.live(id).ok_or(ObjectError::InvalidObjectId)?;
        Ok(live.signals_blocked.swap(blocked, Ordering::AcqRel))
    }

    pub fn signals_blocked(&self, id: ObjectId) -> bool {
        self.live(id)
            .is_some_and(|live| live.signals_blocked.load(Ordering::Acquire))
    }

    // ---------------------------------------------------------------------
    // Connections
    // ---------------------------------------------------------------------

    /// Connect a signal of `sender` to a method of `receiver`, by signature.
    ///
    /// Both signatures are normalized before lookup. The slot's parameter
    /// types must equal the signal's.
    pub fn connect(
        &self,
        sender: ObjectId,
        signal: &str,
        receiver: ObjectId,
        slot: &str,
        connection_type: ConnectionType,
    ) -> Result<ConnectionId, ConnectionError> {
        let signal = Signature::parse(signal)?;
        let slot = Signature::parse(slot)?;
        let sender_live = self.live(sender).ok_or(ObjectError::InvalidObjectId)?;
        let receiver_live = self.live(receiver).ok_or(ObjectError::InvalidObjectId)?;

        let signal_index = resolve_signal(sender_live.meta, &signal)?;
        let slot_index = receiver_live
            .meta
            .index_of_canonical(&slot.canonical())
            .ok_or_else(|| ConnectionError::UnknownSlot {
                class: receiver_live.meta.class_name().to_string(),
                signature: slot.canonical(),
            })?;

        self.connect_by_index(sender, signal_index, receiver, slot_index, connection_type)
    }

    /// Connect by absolute method indices.
    #[tracing::instrument(skip(self), target = "horizon_meta::connection", level = "trace")]
    pub fn connect_by_index(
        &self,
        sender: ObjectId,
        signal_index: usize,
        receiver: ObjectId,
        slot_index: usize,
        connection_type: ConnectionType,
    ) -> Result<ConnectionId, ConnectionError> {
        let sender_live = self.live(sender).ok_or(ObjectError::InvalidObjectId)?;
        let receiver_live = self.live(receiver).ok_or(ObjectError::InvalidObjectId)?;

        let signal = signal_method(sender_live.meta, signal_index)?;
        let slot = receiver_live.meta.method(slot_index).ok_or_else(|| {
            ConnectionError::UnknownSlot {
                class: receiver_live.meta.class_name().to_string(),
                signature: format!("#{slot_index}"),
            }
        })?;
        if !parameters_compatible(&signal.parameter_types(), &slot.parameter_types()) {
            return Err(ConnectionError::SignatureMismatch {
                signal: signal.signature().to_string(),
                slot: slot.signature().to_string(),
            });
        }

        let connection = Connection {
            sender,
            signal_index,
            target: SlotTarget::Method {
                receiver,
                index: slot_index,
            },
            connection_type,
            state: ConnectionState::Proposed,
        };

        let id = if sender == receiver {
            let mut links = sender_live.links.lock();
            if !sender_live.is_active() {
                return Err(ObjectError::Destroying.into());
            }
            let id = self.inner.connections.insert(connection);
            links.outgoing.entry(signal_index).or_default().push(id);
            links.incoming.push(id);
            id
        } else {
            let (mut sender_links, mut receiver_links);
            if sender < receiver {
                sender_links = sender_live.links.lock();
                receiver_links = receiver_live.links.lock();
            } else {
                receiver_links = receiver_live.links.lock();
                sender_links = sender_live.links.lock();
            }
            if !sender_live.is_active() || !receiver_live.is_active() {
                return Err(ObjectError::Destroying.into());
            }
            let id = self.inner.connections.insert(connection);
            sender_links.outgoing.entry(signal_index).or_default().push(id);
            receiver_links.incoming.push(id);
            id
        };

        tracing::debug!(
            target: targets::CONNECTION,
            ?id,
            signal = signal.signature(),
            slot = slot.signature(),
            ?connection_type,
            "connected"
        );
        Ok(id)
    }

    /// Connect a signal to a closure. The closure runs in the calling
    /// thread's context and receives every signal argument.
    pub fn connect_callback<F>(
        &self,
        sender: ObjectId,
        signal: &str,
        connection_type: ConnectionType,
        callback: F,
    ) -> Result<ConnectionId, ConnectionError>
    where
        F: Fn(&[Variant]) + Send + Sync + 'static,
    {
        let signal = Signature::parse(signal)?;
        let sender_live = self.live(sender).ok_or(ObjectError::InvalidObjectId)?;
        let signal_index = resolve_signal(sender_live.meta, &signal)?;

        let connection = Connection {
            sender,
            signal_index,
            target: SlotTarget::Callback {
                context: ContextId::current(),
                callback: Arc::new(callback),
            },
            connection_type,
            state: ConnectionState::Proposed,
        };

        let mut links = sender_live.links.lock();
        if !sender_live.is_active() {
            return Err(ObjectError::Destroying.into());
        }
        let id = self.inner.connections.insert(connection);
        links.outgoing.entry(signal_index).or_default().push(id);
        tracing::debug!(target: targets::CONNECTION, ?id, signal = %signal, "connected callback");
        Ok(id)
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let Some(connection) = self.inner.connections.remove(id) else {
            return false;
        };
        if let Some(live) = self.live(connection.sender) {
            live.links.lock().remove(id);
        }
        if let Some(receiver) = connection.target.receiver()
            && receiver != connection.sender
            && let Some(live) = self.live(receiver)
        {
            live.links.lock().remove(id);
        }
        tracing::debug!(target: targets::CONNECTION, ?id, "disconnected");
        true
    }

    /// Remove every outgoing connection of `sender`. Returns how many were removed.
    pub fn disconnect_all(&self, sender: ObjectId) -> usize {
        let Some(live) = self.live(sender) else {
            return 0;
        };
        let ids: Vec<ConnectionId> = live.links.lock().outgoing.values().flatten().copied().collect();
        ids.into_iter().filter(|&id| self.disconnect(id)).count()
    }

    /// State of a connection. Unknown ids report
    /// [`ConnectionState::Disconnected`].
    pub fn connection_state(&self, id: ConnectionId) -> ConnectionState {
        if self.inner.connections.contains(id) {
            ConnectionState::Active
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn connection_info(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.inner.connections.get(id).map(|c| c.info(id))
    }

    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.inner.connections.infos()
    }

    /// Number of live connections in the runtime.
    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Number of connections on one signal of `sender`.
    pub fn receivers(&self, sender: ObjectId, signal: &str) -> usize {
        let Some(live) = self.live(sender) else {
            return 0;
        };
        let Some(index) = live.meta.index_of_signal(signal) else {
            return 0;
        };
        live.links.lock().outgoing.get(&index).map_or(0, Vec::len)
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Emit a signal by signature.
    pub fn emit_by_signature(
        &self,
        sender: ObjectId,
        signal: &str,
        args: &[Variant],
    ) -> DispatchResult<EmitReport> {
        let signal = Signature::parse(signal)?;
        let live = self.live(sender).ok_or(ObjectError::InvalidObjectId)?;
        let index = live
            .meta
            .index_of_canonical(&signal.canonical())
            .ok_or_else(|| DispatchError::UnknownMethod {
                class: live.meta.class_name().to_string(),
                signature: signal.canonical(),
            })?;
        self.emit(sender, index, args)
    }

    /// Emit a signal by absolute method index.
    ///
    /// `args` must hold exactly one value per signal parameter. Failures of
    /// individual connections are collected in the report; every other
    /// connection still receives the emission.
    #[tracing::instrument(skip(self, args), target = "horizon_meta::dispatch", level = "trace")]
    pub fn emit(
        &self,
        sender: ObjectId,
        signal_index: usize,
        args: &[Variant],
    ) -> DispatchResult<EmitReport> {
        let live = self.live(sender).ok_or(ObjectError::InvalidObjectId)?;
        let signal = live
            .meta
            .method(signal_index)
            .ok_or_else(|| DispatchError::InvalidMethodIndex {
                class: live.meta.class_name().to_string(),
                index: signal_index,
            })?;
        if signal.kind() != MethodKind::Signal {
            return Err(DispatchError::NotASignal {
                class: live.meta.class_name().to_string(),
                index: signal_index,
            });
        }
        if args.len() != signal.parameter_count() {
            return Err(DispatchError::ArgumentCount {
                expected: signal.parameter_count(),
                got: args.len(),
            });
        }

        let mut report = EmitReport::default();
        if !live.is_active() {
            return Ok(report);
        }
        if live.signals_blocked.load(Ordering::Acquire) {
            tracing::trace!(target: targets::DISPATCH, signal = signal.signature(), "signals blocked, skipping emit");
            return Ok(report);
        }

        let snapshot = {
            let links = live.links.lock();
            match links.outgoing.get(&signal_index) {
                Some(ids) => self.inner.connections.snapshot(ids),
                None => Vec::new(),
            }
        };
        tracing::trace!(target: targets::DISPATCH, signal = signal.signature(), connection_count = snapshot.len(), "emitting signal");

        let current = ContextId::current();
        let mut blocking_waiters = Vec::new();
        for (id, connection) in snapshot {
            match self.deliver(&connection, args, current) {
                Ok(Delivery::Direct(_)) => report.direct += 1,
                Ok(Delivery::Queued) => report.queued += 1,
                Ok(Delivery::Blocking(waiter)) => blocking_waiters.push((id, waiter)),
                Ok(Delivery::Skipped) => report.skipped += 1,
                Err(err) => {
                    tracing::warn!(target: targets::DISPATCH, connection = ?id, signal = signal.signature(), error = %err, "delivery failed");
                    report.failures.push((id, err));
                }
            }
        }

        // Wait only after every non-blocking delivery has been made.
        for (id, waiter) in blocking_waiters {
            match self.wait(waiter) {
                Ok(Completion::Delivered) => report.blocking += 1,
                Ok(Completion::Dropped) => report.skipped += 1,
                Err(err) => {
                    tracing::warn!(target: targets::DISPATCH, connection = ?id, error = %err, "blocking delivery failed");
                    report.failures.push((id, err));
                }
            }
        }

        Ok(report)
    }

    /// Invoke a method of an object by signature.
    ///
    /// A direct invocation returns the method's value. Queued invocations
    /// return `None` right away; blocking ones return `None` once the method
    /// has run.
    pub fn invoke_method(
        &self,
        target: ObjectId,
        method: &str,
        connection_type: ConnectionType,
        args: &[Variant],
    ) -> DispatchResult<Option<Variant>> {
        let signature = Signature::parse(method)?;
        let live = self.live(target).ok_or(ObjectError::InvalidObjectId)?;
        let index = live
            .meta
            .index_of_canonical(&signature.canonical())
            .ok_or_else(|| DispatchError::UnknownMethod {
                class: live.meta.class_name().to_string(),
                signature: signature.canonical(),
            })?;
        let expected = live
            .meta
            .method(index)
            .map_or(0, |m| m.parameter_count());
        if args.len() != expected {
            return Err(DispatchError::ArgumentCount {
                expected,
                got: args.len(),
            });
        }
        if !live.is_active() {
            return Err(ObjectError::Destroying.into());
        }

        let invocation = InvocationTarget::Method {
            receiver: target,
            index,
        };
        let current = ContextId::current();
        match self.dispatch(live.context(), invocation, args, connection_type, current)? {
            Delivery::Direct(value) => Ok(value),
            Delivery::Queued | Delivery::Skipped => Ok(None),
            Delivery::Blocking(waiter) => self.wait(waiter).map(|_| None),
        }
    }

    /// Read a property through the object's reflective accessors.
    pub fn read_property(&self, id: ObjectId, name: &str) -> ObjectResult<Variant> {
        let (object, meta) = self.resolve(id)?;
        let property = meta
            .index_of_property(name)
            .and_then(|i| meta.property(i))
            .ok_or_else(|| ObjectError::PropertyNotFound(name.to_string()))?;
        if !property.is_readable() {
            return Err(ObjectError::PropertyNotReadable(name.to_string()));
        }
        object
            .read_property(&property)
            .ok_or_else(|| ObjectError::PropertyNotReadable(name.to_string()))
    }

    /// Write a property. Notification is up to the object's setter.
    pub fn write_property(&self, id: ObjectId, name: &str, value: Variant) -> ObjectResult<()> {
        let (object, meta) = self.resolve(id)?;
        let property = meta
            .index_of_property(name)
            .and_then(|i| meta.property(i))
            .ok_or_else(|| ObjectError::PropertyNotFound(name.to_string()))?;
        if !property.is_writable() {
            return Err(ObjectError::PropertyReadOnly(name.to_string()));
        }
        let got = value.type_name();
        if object.write_property(&property, value) {
            Ok(())
        } else {
            Err(ObjectError::PropertyTypeMismatch {
                name: name.to_string(),
                got,
            })
        }
    }

    pub fn reset_property(&self, id: ObjectId, name: &str) -> ObjectResult<()> {
        let (object, meta) = self.resolve(id)?;
        let property = meta
            .index_of_property(name)
            .and_then(|i| meta.property(i))
            .ok_or_else(|| ObjectError::PropertyNotFound(name.to_string()))?;
        if property.is_resettable() && object.reset_property(&property) {
            Ok(())
        } else {
            Err(ObjectError::PropertyNotResettable(name.to_string()))
        }
    }

    fn resolve(&self, id: ObjectId) -> ObjectResult<(Arc<dyn Object>, &'static MetaObject)> {
        let live = self.live(id).ok_or(ObjectError::InvalidObjectId)?;
        if !live.is_active() {
            return Err(ObjectError::Destroying);
        }
        let object = live.object.upgrade().ok_or(ObjectError::InvalidObjectId)?;
        Ok((object, live.meta))
    }

    /// Deliver one emission over one connection.
    fn deliver(
        &self,
        connection: &Connection,
        args: &[Variant],
        current: ContextId,
    ) -> DispatchResult<Delivery> {
        let (context, target) = match &connection.target {
            SlotTarget::Method { receiver, index } => {
                let Some(live) = self.live(*receiver) else {
                    return Ok(Delivery::Skipped);
                };
                if !live.is_active() {
                    return Ok(Delivery::Skipped);
                }
                let target = InvocationTarget::Method {
                    receiver: *receiver,
                    index: *index,
                };
                (live.context(), target)
            }
            SlotTarget::Callback { context, callback } => {
                (*context, InvocationTarget::Callback(callback.clone()))
            }
        };
        self.dispatch(context, target, args, connection.connection_type, current)
    }

    /// Call now or queue, depending on the connection type and contexts.
    fn dispatch(
        &self,
        context: ContextId,
        target: InvocationTarget,
        args: &[Variant],
        connection_type: ConnectionType,
        current: ContextId,
    ) -> DispatchResult<Delivery> {
        let same_context = context == current;
        match (connection_type, same_context) {
            (ConnectionType::Direct | ConnectionType::Auto, true) => {
                match self.call(&target, args)? {
                    Outcome::Ran(value) => Ok(Delivery::Direct(value)),
                    Outcome::Skipped => Ok(Delivery::Skipped),
                }
            }
            (ConnectionType::Direct, false) => {
                tracing::trace!(target: targets::DISPATCH, %context, "direct delivery across contexts, queueing");
                self.post(context, Invocation::new(target, args.to_vec()));
                Ok(Delivery::Queued)
            }
            (ConnectionType::Auto, false) | (ConnectionType::Queued, _) => {
                self.post(context, Invocation::new(target, args.to_vec()));
                Ok(Delivery::Queued)
            }
            (ConnectionType::BlockingQueued, true) => {
                Err(DispatchError::BlockingSameContext { context })
            }
            (ConnectionType::BlockingQueued, false) => {
                let (handle, waiter) = completion_pair();
                self.post(context, Invocation::with_completion(target, args.to_vec(), handle));
                Ok(Delivery::Blocking(waiter))
            }
        }
    }

    fn wait(&self, waiter: CompletionWaiter) -> DispatchResult<Completion> {
        match self.inner.config.blocking_timeout {
            None => Ok(waiter.wait()),
            Some(timeout) => waiter
                .wait_timeout(timeout)
                .ok_or(DispatchError::Timeout(DispatchTimeout { timeout })),
        }
    }

    /// Call a target on the current thread. Receivers that are gone or
    /// being destroyed are skipped.
    fn call(&self, target: &InvocationTarget, args: &[Variant]) -> DispatchResult<Outcome> {
        match target {
            InvocationTarget::Callback(callback) => {
                callback(args);
                Ok(Outcome::Ran(None))
            }
            InvocationTarget::Method { receiver, index } => {
                let Some(live) = self.live(*receiver) else {
                    return Ok(Outcome::Skipped);
                };
                if !live.is_active() {
                    return Ok(Outcome::Skipped);
                }
                let Some(object) = live.object.upgrade() else {
                    return Ok(Outcome::Skipped);
                };
                let method = live.meta.method(*index).ok_or_else(|| {
                    DispatchError::InvalidMethodIndex {
                        class: live.meta.class_name().to_string(),
                        index: *index,
                    }
                })?;
                let value = object.invoke_method(&method, args)?;
                Ok(Outcome::Ran(value))
            }
        }
    }

    /// Execute a dequeued invocation in the current context.
    pub(crate) fn execute(&self, invocation: Invocation) {
        match self.call(invocation.target(), invocation.args()) {
            Ok(Outcome::Ran(_)) => invocation.complete(),
            Ok(Outcome::Skipped) => {
                tracing::trace!(target: targets::DISPATCH, id = invocation.id(), "receiver gone, dropping invocation");
            }
            Err(err) => {
                tracing::warn!(target: targets::DISPATCH, id = invocation.id(), error = %err, "queued invocation failed");
                invocation.complete();
            }
        }
    }

    /// The queue of a context, created on first use.
    pub(crate) fn queue(&self, context: ContextId) -> Arc<ContextQueue> {
        if let Some(queue) = self.inner.queues.read().get(&context) {
            return queue.clone();
        }
        self.inner
            .queues
            .write()
            .entry(context)
            .or_insert_with(|| Arc::new(ContextQueue::new()))
            .clone()
    }

    /// Drop the map entry for `queue` once nothing else holds it and it is
    /// empty. Work posted to a context that never runs a loop stays queued.
    pub(crate) fn release_queue(&self, context: ContextId, queue: &Arc<ContextQueue>) {
        let mut queues = self.inner.queues.write();
        if let Some(current) = queues.get(&context)
            && Arc::ptr_eq(current, queue)
            && Arc::strong_count(queue) == 2
            && queue.len() == 0
        {
            queues.remove(&context);
            tracing::trace!(target: targets::EVENT_LOOP, %context, "released context queue");
        }
    }

    /// Number of contexts that currently own a queue.
    pub(crate) fn queue_count(&self) -> usize {
        self.inner.queues.read().len()
    }

    pub(crate) fn post(&self, context: ContextId, invocation: Invocation) {
        tracing::trace!(target: targets::DISPATCH, %context, id = invocation.id(), "queued invocation");
        self.queue(context).post(invocation);
    }

    /// Invocations waiting in a context's queue.
    pub fn pending_invocations(&self, context: ContextId) -> usize {
        self.inner
            .queues
            .read()
            .get(&context)
            .map_or(0, |queue| queue.len())
    }

    /// Sorted `(id, class, name, outgoing, incoming)` rows for debugging.
    pub(crate) fn object_rows(&self) -> Vec<(ObjectId, &'static str, String, usize, usize)> {
        let objects: Vec<(ObjectId, Arc<LiveObject>)> = self
            .inner
            .objects
            .read()
            .iter()
            .map(|(id, live)| (id, live.clone()))
            .collect();
        objects
            .into_iter()
            .map(|(id, live)| {
                let links = live.links.lock();
                (
                    id,
                    live.meta.class_name(),
                    live.name.read().clone(),
                    links.outgoing_count(),
                    links.incoming.len(),
                )
            })
            .collect()
    }
}

fn signal_method(meta: &MetaObject, index: usize) -> Result<MetaMethod<'_>, ConnectionError> {
    let method = meta.method(index).ok_or_else(|| ConnectionError::UnknownSignal {
        class: meta.class_name().to_string(),
        signature: format!("#{index}"),
    })?;
    if method.kind() != MethodKind::Signal {
        return Err(ConnectionError::NotASignal {
            class: meta.class_name().to_string(),
            index,
        });
    }
    Ok(method)
}

fn resolve_signal(meta: &MetaObject, signal: &Signature) -> Result<usize, ConnectionError> {
    let canonical = signal.canonical();
    let index = meta
        .index_of_canonical(&canonical)
        .ok_or_else(|| ConnectionError::UnknownSignal {
            class: meta.class_name().to_string(),
            signature: canonical.clone(),
        })?;
    signal_method(meta, index)?;
    Ok(index)
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("objects", &self.object_count())
            .field("connections", &self.connection_count())
            .field("config", &self.inner.config)
            .finish()
    }
}
