use crate::error::EventBusError;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{trace, warn};

/// A safe default for channel buffers.
/// 128 is usually enough for chain notifications between slices.
const DEFAULT_CAPACITY: usize = 128;
const MIN_CAPACITY: usize = 1;

/// Supported channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Broadcast (fan-out) semantics.
    Broadcast { capacity: usize },
    /// MPSC (queue) semantics.
    Mpsc { capacity: usize },
    /// Watch (latest-value) semantics.
    Watch,
}

impl ChannelKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Broadcast { .. } => "Broadcast",
            Self::Mpsc { .. } => "Mpsc",
            Self::Watch => "Watch",
        }
    }
}

/// Marker trait for types that can be sent across the [`EventBus`].
///
/// Any type that is `Send + Sync + 'static` automatically implements this trait.
pub trait Event: Any + Send + Sync + 'static {}
impl<T: Any + Send + Sync + 'static> Event for T {}

#[derive(Debug)]
struct ChannelState {
    kind: ChannelKind,
    sender: Box<dyn Any + Send + Sync>,
}

#[derive(Debug)]
struct MpscChannel<T> {
    sender: mpsc::Sender<Arc<T>>,
    receiver: Option<mpsc::Receiver<Arc<T>>>,
}

fn kind_mismatch<T>(expected: &str, found: ChannelKind) -> EventBusError {
    EventBusError::ChannelKindMismatch {
        message: format!("Expected {expected} but found {} for {}", found.label(), type_name::<T>())
            .into(),
        context: None,
    }
}

fn type_mismatch<T>() -> EventBusError {
    EventBusError::TypeMismatch {
        message: type_name::<T>().into(),
        context: Some("Unexpected event type".into()),
    }
}

fn type_name<T>() -> &'static str {
    std::any::type_name::<T>()
}

fn check_capacity<T>(existing: ChannelKind, requested: usize) {
    let (ChannelKind::Broadcast { capacity } | ChannelKind::Mpsc { capacity }) = existing else {
        return;
    };
    if capacity != requested {
        warn!(
            event = type_name::<T>(),
            existing_capacity = capacity,
            requested_capacity = requested,
            "Channel already initialized with a different capacity"
        );
    }
}

/// A thread-safe event bus.
///
/// Manages channels indexed by [`TypeId`] of the event. The chain publishes
/// its applied-block and applied-transaction notifications here; feature
/// slices subscribe without holding a reference to the chain itself.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    channels: Arc<RwLock<FxHashMap<TypeId, ChannelState>>>,
}

impl EventBus {
    /// Creates a new, empty `EventBus`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to an event of type `T` using broadcast with default capacity.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T`.
    ///
    /// # Examples
    /// ```rust
    /// use stx_event_bus::{EventBus, EventReceiverExt};
    ///
    /// #[derive(Clone, Debug, PartialEq)]
    /// struct BlockApplied(u32);
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), stx_event_bus::EventBusError> {
    /// let bus = EventBus::new();
    /// let mut rx = bus.subscribe::<BlockApplied>()?;
    /// bus.publish(BlockApplied(1))?;
    /// assert_eq!(rx.recv().await.unwrap().0, 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe<T: Event>(&self) -> Result<broadcast::Receiver<Arc<T>>, EventBusError> {
        self.subscribe_with_capacity::<T>(DEFAULT_CAPACITY)
    }

    /// Subscribes to an event of type `T` with a specific broadcast buffer capacity.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T`, or [`EventBusError::InvalidCapacity`] if
    /// `capacity` is zero.
    pub fn subscribe_with_capacity<T: Event>(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Receiver<Arc<T>>, EventBusError> {
        let capacity = validate_capacity(capacity)?;
        Ok(self.broadcast_sender::<T>(capacity)?.subscribe())
    }

    /// Subscribe to a bounded MPSC channel (queue semantics).
    ///
    /// The receiver can only be taken once; subsequent calls fail.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T` or the receiver was already taken, and
    /// [`EventBusError::InvalidCapacity`] if `capacity` is zero.
    pub fn subscribe_mpsc<T: Event>(
        &self,
        capacity: usize,
    ) -> Result<mpsc::Receiver<Arc<T>>, EventBusError> {
        let capacity = validate_capacity(capacity)?;
        let mut channels = self.channels.write();

        if let Some(existing) = channels.get_mut(&TypeId::of::<T>()) {
            if !matches!(existing.kind, ChannelKind::Mpsc { .. }) {
                return Err(kind_mismatch::<T>("Mpsc", existing.kind));
            }
            check_capacity::<T>(existing.kind, capacity);
            let chan =
                existing.sender.downcast_mut::<MpscChannel<T>>().ok_or_else(type_mismatch::<T>)?;
            return chan.receiver.take().ok_or_else(|| EventBusError::ChannelKindMismatch {
                message: "MPSC receiver already taken".into(),
                context: Some(type_name::<T>().into()),
            });
        }

        trace!(event = type_name::<T>(), capacity, "Initializing new mpsc channel");
        let (tx, rx) = mpsc::channel::<Arc<T>>(capacity);
        channels.insert(
            TypeId::of::<T>(),
            ChannelState {
                kind: ChannelKind::Mpsc { capacity },
                sender: Box::new(MpscChannel { sender: tx, receiver: None }),
            },
        );
        Ok(rx)
    }

    /// Subscribe to a watch channel (latest-value semantics). Initializes with
    /// the provided value if absent.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T`.
    pub fn subscribe_watch<T: Event>(
        &self,
        initial: T,
    ) -> Result<watch::Receiver<Arc<T>>, EventBusError> {
        Ok(self.watch_sender(Arc::new(initial))?.subscribe())
    }

    /// Publishes a shared event instance via broadcast.
    ///
    /// Returns the number of active subscribers that received the event.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T`.
    pub fn publish<T: Event>(&self, event: T) -> Result<usize, EventBusError> {
        self.publish_arc(Arc::new(event))
    }

    /// Publishes a shared event instance via broadcast without re-wrapping.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T`.
    pub fn publish_arc<T: Event>(&self, event: Arc<T>) -> Result<usize, EventBusError> {
        let sender = self.broadcast_sender::<T>(DEFAULT_CAPACITY)?;
        sender.send(event).map_or_else(
            |_| {
                trace!(event = type_name::<T>(), "Event dropped: no active subscribers");
                Ok(0)
            },
            |count| {
                trace!(event = type_name::<T>(), count, "Event dispatched");
                Ok(count)
            },
        )
    }

    /// Publishes to a bounded MPSC channel (queue semantics).
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T`, or [`EventBusError::ChannelFull`] if full.
    pub fn publish_mpsc<T: Event>(&self, event: T) -> Result<(), EventBusError> {
        self.publish_mpsc_arc(Arc::new(event))
    }

    /// Publishes to a bounded MPSC channel without re-wrapping.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T`, or [`EventBusError::ChannelFull`] if full.
    pub fn publish_mpsc_arc<T: Event>(&self, event: Arc<T>) -> Result<(), EventBusError> {
        let sender = self.mpsc_sender::<T>(DEFAULT_CAPACITY)?;
        sender.try_send(event).map_err(|e| EventBusError::ChannelFull {
            message: e.to_string().into(),
            context: Some(type_name::<T>().into()),
        })
    }

    /// Publishes to a watch channel (latest-value semantics). Creates a channel if missing.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T`.
    pub fn publish_watch<T: Event>(&self, event: T) -> Result<(), EventBusError> {
        self.publish_watch_arc(Arc::new(event))
    }

    /// Publishes to a watch channel without re-wrapping. Creates a channel if missing.
    ///
    /// # Errors
    /// Returns [`EventBusError::ChannelKindMismatch`] if a different channel kind
    /// was already registered for `T`.
    pub fn publish_watch_arc<T: Event>(&self, event: Arc<T>) -> Result<(), EventBusError> {
        let sender = self.watch_sender(event.clone())?;
        sender.send_replace(event);
        Ok(())
    }

    /// Gracefully shuts down the bus by dropping all underlying channels.
    ///
    /// Returns the number of event channels that were closed.
    #[must_use]
    pub fn shutdown(&self) -> usize {
        let mut channels = self.channels.write();
        let count = channels.len();
        channels.clear();
        count
    }

    fn broadcast_sender<T: Event>(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Sender<Arc<T>>, EventBusError> {
        let mut channels = self.channels.write();

        if let Some(existing) = channels.get(&TypeId::of::<T>()) {
            if !matches!(existing.kind, ChannelKind::Broadcast { .. }) {
                return Err(kind_mismatch::<T>("Broadcast", existing.kind));
            }
            check_capacity::<T>(existing.kind, capacity);
            let sender = existing
                .sender
                .downcast_ref::<broadcast::Sender<Arc<T>>>()
                .ok_or_else(type_mismatch::<T>)?;
            return Ok(sender.clone());
        }

        trace!(event = type_name::<T>(), capacity, "Initializing new broadcast channel");
        let (tx, _) = broadcast::channel::<Arc<T>>(capacity);
        channels.insert(
            TypeId::of::<T>(),
            ChannelState { kind: ChannelKind::Broadcast { capacity }, sender: Box::new(tx.clone()) },
        );
        Ok(tx)
    }

    fn mpsc_sender<T: Event>(
        &self,
        capacity: usize,
    ) -> Result<mpsc::Sender<Arc<T>>, EventBusError> {
        let capacity = validate_capacity(capacity)?;
        let mut channels = self.channels.write();

        if let Some(existing) = channels.get_mut(&TypeId::of::<T>()) {
            if !matches!(existing.kind, ChannelKind::Mpsc { .. }) {
                return Err(kind_mismatch::<T>("Mpsc", existing.kind));
            }
            check_capacity::<T>(existing.kind, capacity);
            let chan =
                existing.sender.downcast_mut::<MpscChannel<T>>().ok_or_else(type_mismatch::<T>)?;
            return Ok(chan.sender.clone());
        }

        trace!(event = type_name::<T>(), capacity, "Initializing new mpsc channel");
        let (tx, rx) = mpsc::channel::<Arc<T>>(capacity);
        channels.insert(
            TypeId::of::<T>(),
            ChannelState {
                kind: ChannelKind::Mpsc { capacity },
                sender: Box::new(MpscChannel { sender: tx.clone(), receiver: Some(rx) }),
            },
        );
        Ok(tx)
    }

    fn watch_sender<T: Event>(
        &self,
        initial: Arc<T>,
    ) -> Result<watch::Sender<Arc<T>>, EventBusError> {
        let mut channels = self.channels.write();

        if let Some(existing) = channels.get(&TypeId::of::<T>()) {
            if existing.kind != ChannelKind::Watch {
                return Err(kind_mismatch::<T>("Watch", existing.kind));
            }
            let sender = existing
                .sender
                .downcast_ref::<watch::Sender<Arc<T>>>()
                .ok_or_else(type_mismatch::<T>)?;
            return Ok(sender.clone());
        }

        trace!(event = type_name::<T>(), "Initializing new watch channel");
        let (tx, _) = watch::channel::<Arc<T>>(initial);
        channels.insert(
            TypeId::of::<T>(),
            ChannelState { kind: ChannelKind::Watch, sender: Box::new(tx.clone()) },
        );
        Ok(tx)
    }
}

fn validate_capacity(capacity: usize) -> Result<usize, EventBusError> {
    if capacity < MIN_CAPACITY {
        return Err(EventBusError::InvalidCapacity {
            message: format!("capacity must be >= {MIN_CAPACITY}").into(),
            context: None,
        });
    }
    Ok(capacity)
}
