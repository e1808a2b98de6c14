//! # Lock-Free Event Bus
//!
//! MPMC (Multi-Producer Multi-Consumer) event bus without locks, for
//! observers that pull [`PipelineEvent`]s from their own thread instead of
//! running callbacks inside the cooperative loop.
//!
//! ## Uso
//!
//! ```ignore
//! use sema_pipeline::lockfree::LockFreeEventBus;
//!
//! let bus = LockFreeEventBus::new();
//! let rx = bus.subscribe();
//!
//! // Producer (cooperative loop)
//! bus.emit(event);
//!
//! // Consumer thread
//! for event in rx.try_iter() {
//!     // Process event
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};

use crate::events::{EventFilter, PipelineEvent};

/// Lock-free event bus using crossbeam MPMC channels
pub struct LockFreeEventBus {
    /// Broadcast senders, one per subscription
    senders: Arc<crossbeam_utils::sync::ShardedLock<Vec<FilteredSender>>>,
    /// Event counter (atomic)
    event_count: AtomicU64,
    /// Subscriber count (atomic)
    subscriber_count: AtomicUsize,
    /// Channel capacity (0 = unbounded)
    capacity: usize,
}

/// Sender with associated filter
struct FilteredSender {
    filter: EventFilter,
    sender: Sender<PipelineEvent>,
}

/// Subscription handle (receiver)
pub struct Subscription {
    receiver: Receiver<PipelineEvent>,
    filter: EventFilter,
}

impl LockFreeEventBus {
    /// Create unbounded event bus
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create bounded event bus (backpressure)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            senders: Arc::new(crossbeam_utils::sync::ShardedLock::new(Vec::new())),
            event_count: AtomicU64::new(0),
            subscriber_count: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> Subscription {
        self.subscribe_filtered(EventFilter::All)
    }

    /// Subscribe with filter
    pub fn subscribe_filtered(&self, filter: EventFilter) -> Subscription {
        let (sender, receiver) = if self.capacity > 0 {
            bounded(self.capacity)
        } else {
            unbounded()
        };

        let filtered_sender = FilteredSender {
            filter: filter.clone(),
            sender,
        };

        {
            let mut senders = self.senders.write().unwrap();
            senders.push(filtered_sender);
        }

        self.subscriber_count.fetch_add(1, Ordering::Relaxed);

        Subscription { receiver, filter }
    }

    /// Emit event to all matching subscribers (non-blocking)
    pub fn emit(&self, event: PipelineEvent) {
        self.event_count.fetch_add(1, Ordering::Relaxed);

        let senders = self.senders.read().unwrap();
        for fs in senders.iter() {
            if fs.filter.matches(&event) {
                // Non-blocking send - drop if channel full
                let _ = fs.sender.try_send(event.clone());
            }
        }
    }

    /// Try to emit, returns false if any channel would block
    pub fn try_emit(&self, event: PipelineEvent) -> bool {
        self.event_count.fetch_add(1, Ordering::Relaxed);

        let senders = self.senders.read().unwrap();
        let mut success = true;

        for fs in senders.iter() {
            if fs.filter.matches(&event) {
                match fs.sender.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => success = false,
                    Err(TrySendError::Disconnected(_)) => {}
                }
            }
        }

        success
    }

    /// Number of events emitted
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::Relaxed)
    }
}

impl Default for LockFreeEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LockFreeEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockFreeEventBus")
            .field("event_count", &self.event_count())
            .field("subscriber_count", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Subscription {
    /// Try to receive next event (non-blocking)
    pub fn try_recv(&self) -> Option<PipelineEvent> {
        self.receiver.try_recv().ok()
    }

    /// Receive next event (blocking)
    pub fn recv(&self) -> Option<PipelineEvent> {
        self.receiver.recv().ok()
    }

    /// Receive with timeout
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<PipelineEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Check if there are pending events
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Get the filter for this subscription
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Try iterate (non-blocking)
    pub fn try_iter(&self) -> impl Iterator<Item = PipelineEvent> + '_ {
        self.receiver.try_iter()
    }
}
