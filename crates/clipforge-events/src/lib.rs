#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]
#![allow(unexpected_cfgs)]

//! Type-indexed, synchronous event bus for job lifecycle events.
//!
//! Unlike a broadcast/replay channel, this bus dispatches each published
//! [`DomainEvent`] synchronously, in registration order, to every handler
//! subscribed to that event's variant. A handler that panics or returns an
//! error is caught and logged; it never prevents the remaining handlers from
//! running, and `publish` never fails on a handler's behalf (§4.5).

mod handlers;

pub use handlers::{ClientPushHandler, ClientPushHub, LoggingHandler};

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use clipforge_core::DomainEvent;
use tracing::error;

/// Discriminator used to index the handler registry. Mirrors
/// [`DomainEvent::kind`] but is declared separately so the bus has no
/// dependency on the exact shape of the event payloads.
pub type EventKind = &'static str;

/// A subscriber invoked synchronously whenever a matching event is published.
///
/// Implementations should be cheap and non-blocking; anything that needs to
/// do real I/O should hand off to a background task and return quickly, since
/// `publish` invokes every handler in the current task.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are logged by the bus; they do not stop
    /// delivery to other handlers.
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError>;
}

/// Error returned by an [`EventHandler`]. Carries only a message: the bus
/// logs it and moves on, so there is no need for a richer error taxonomy.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Wrap any displayable cause as a handler error.
    pub fn from_display(cause: impl std::fmt::Display) -> Self {
        Self(cause.to_string())
    }
}

type HandlerList = Vec<Arc<dyn EventHandler>>;

/// Publisher that dispatches events to type-indexed handler lists.
///
/// Cloning an `EventBus` is cheap; all clones share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Vec<(EventKind, HandlerList)>>>,
}

impl EventBus {
    /// Construct an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every event whose [`DomainEvent::kind`] equals
    /// `event_kind`. Appends to the existing list; no inheritance-based
    /// dispatch. Subscribe to every variant explicitly for cross-cutting
    /// handlers (e.g. logging).
    ///
    /// # Panics
    ///
    /// Panics if the registry mutex has been poisoned.
    pub fn subscribe(&self, event_kind: EventKind, handler: Arc<dyn EventHandler>) {
        let mut registry = self.lock_registry();
        match registry.iter_mut().find(|(kind, _)| *kind == event_kind) {
            Some((_, handlers)) => handlers.push(handler),
            None => registry.push((event_kind, vec![handler])),
        }
    }

    /// Convenience: subscribe `handler` to every known [`DomainEvent`] variant.
    pub fn subscribe_all(&self, handler: Arc<dyn EventHandler>) {
        for kind in Self::ALL_KINDS {
            self.subscribe(kind, handler.clone());
        }
    }

    const ALL_KINDS: [EventKind; 5] = [
        "job_started",
        "job_progress_updated",
        "job_completed",
        "job_failed",
        "job_cancelled",
    ];

    /// Publish `event`, invoking every handler subscribed to its variant in
    /// registration order. Each handler call is isolated: an error is caught,
    /// logged at `ERROR`, and does not stop the remaining handlers.
    ///
    /// Delivery is at-most-once and best-effort: there is no retry and no
    /// persistence. Handlers that need durability must arrange it themselves.
    ///
    /// # Panics
    ///
    /// Panics if the registry mutex has been poisoned.
    pub async fn publish(&self, event: DomainEvent) {
        let handlers = {
            let registry = self.lock_registry();
            registry
                .iter()
                .find(|(kind, _)| *kind == event.kind())
                .map(|(_, handlers)| handlers.clone())
                .unwrap_or_default()
        };
        for handler in handlers {
            if let Err(error) = handler.handle(&event).await {
                error!(
                    event_kind = event.kind(),
                    job_id = %event.job_id(),
                    %error,
                    "event handler failed"
                );
            }
        }
    }

    fn lock_registry(&self) -> MutexGuard<'_, Vec<(EventKind, HandlerList)>> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("event bus registry mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &DomainEvent) -> Result<(), HandlerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        async fn handle(&self, _event: &DomainEvent) -> Result<(), HandlerError> {
            Err(HandlerError("boom".to_string()))
        }
    }

    fn job_started() -> DomainEvent {
        DomainEvent::JobStarted {
            job_id: Uuid::new_v4(),
            url: "https://example.test/v/X".to_string(),
            format_id: "best".to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dispatches_only_to_matching_kind() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("job_started", Arc::new(CountingHandler(count.clone())));
        bus.subscribe(
            "job_completed",
            Arc::new(CountingHandler(Arc::new(AtomicUsize::new(0)))),
        );
        bus.publish(job_started()).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe("job_started", Arc::new(FailingHandler));
        bus.subscribe("job_started", Arc::new(CountingHandler(count.clone())));
        bus.publish(job_started()).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn subscribe_all_receives_every_variant() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe_all(Arc::new(CountingHandler(count.clone())));
        bus.publish(job_started()).await;
        bus.publish(DomainEvent::JobCancelled {
            job_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
        })
        .await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
