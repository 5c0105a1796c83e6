//! Built-in [`EventHandler`](crate::EventHandler) implementations.

use async_trait::async_trait;
use clipforge_core::{DomainEvent, JobId};
use tracing::{info, warn};

use crate::{EventHandler, HandlerError};

/// Cross-cutting handler that logs every event at `INFO`.
///
/// Subscribe this to every [`DomainEvent`] variant via
/// [`crate::EventBus::subscribe_all`]; it never returns an error, so it never
/// appears in the bus's own error log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        info!(event_kind = event.kind(), job_id = %event.job_id(), "domain event");
        Ok(())
    }
}

/// Destination for real-time client push, implemented by the WebSocket room
/// manager in the HTTP layer.
///
/// Every method is infallible from the caller's perspective: implementations
/// must swallow their own transport errors and log at `WARN`, per §4.6 —
/// a disconnected client must never surface as a handler error.
#[async_trait]
pub trait ClientPushHub: Send + Sync {
    /// Push a progress update to the room for `job_id`.
    async fn emit_progress(&self, job_id: JobId, progress: &clipforge_core::JobProgress);

    /// Push a completion notification to the room for `job_id`.
    async fn emit_completed(&self, job_id: JobId, download_url: &str);

    /// Push a failure notification to the room for `job_id`.
    async fn emit_failed(&self, job_id: JobId, error_message: &str, error_category: &str);

    /// Push a cancellation notification to the room for `job_id`.
    async fn emit_cancelled(&self, job_id: JobId);

    /// Whether the push layer is currently enabled. Emitters no-op silently
    /// when this is `false`, per §4.6.
    fn enabled(&self) -> bool;
}

/// Adapts a [`ClientPushHub`] into an [`EventHandler`], translating each
/// [`DomainEvent`] variant into the matching `emit_*` call.
pub struct ClientPushHandler<H> {
    hub: std::sync::Arc<H>,
}

impl<H: ClientPushHub> ClientPushHandler<H> {
    /// Wrap a push hub as an event handler.
    pub const fn new(hub: std::sync::Arc<H>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl<H: ClientPushHub> EventHandler for ClientPushHandler<H> {
    async fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        if !self.hub.enabled() {
            return Ok(());
        }
        match event {
            DomainEvent::JobStarted { .. } => {}
            DomainEvent::JobProgressUpdated { job_id, progress, .. } => {
                self.hub.emit_progress(*job_id, progress).await;
            }
            DomainEvent::JobCompleted {
                job_id,
                download_url,
                ..
            } => {
                self.hub.emit_completed(*job_id, download_url).await;
            }
            DomainEvent::JobFailed {
                job_id,
                error_message,
                error_category,
                ..
            } => {
                self.hub.emit_failed(*job_id, error_message, error_category).await;
            }
            DomainEvent::JobCancelled { job_id, .. } => {
                self.hub.emit_cancelled(*job_id).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingHub {
        completed: AtomicBool,
    }

    #[async_trait]
    impl ClientPushHub for RecordingHub {
        async fn emit_progress(&self, _job_id: JobId, _progress: &clipforge_core::JobProgress) {}

        async fn emit_completed(&self, _job_id: JobId, _download_url: &str) {
            self.completed.store(true, Ordering::SeqCst);
        }

        async fn emit_failed(&self, _job_id: JobId, _error_message: &str, _error_category: &str) {}

        async fn emit_cancelled(&self, _job_id: JobId) {}

        fn enabled(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn completed_event_reaches_the_hub() {
        let hub = Arc::new(RecordingHub::default());
        let handler = ClientPushHandler::new(hub.clone());
        handler
            .handle(&DomainEvent::JobCompleted {
                job_id: Uuid::new_v4(),
                download_url: "https://dl/x".to_string(),
                expire_at: Utc::now(),
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();
        assert!(hub.completed.load(Ordering::SeqCst));
    }

    #[derive(Default)]
    struct DisabledHub;

    #[async_trait]
    impl ClientPushHub for DisabledHub {
        async fn emit_progress(&self, _job_id: JobId, _progress: &clipforge_core::JobProgress) {
            panic!("must not be called while disabled");
        }

        async fn emit_completed(&self, _job_id: JobId, _download_url: &str) {
            panic!("must not be called while disabled");
        }

        async fn emit_failed(&self, _job_id: JobId, _error_message: &str, _error_category: &str) {
            panic!("must not be called while disabled");
        }

        async fn emit_cancelled(&self, _job_id: JobId) {
            panic!("must not be called while disabled");
        }

        fn enabled(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn disabled_hub_is_never_invoked() {
        let handler = ClientPushHandler::new(Arc::new(DisabledHub));
        handler
            .handle(&DomainEvent::JobCancelled {
                job_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();
    }
}
