//! `WebSocket` push hub and the `GET /api/v1/ws` upgrade handler.
//!
//! One room per job id. Each connection tracks the jobs it has subscribed to
//! locally so it can leave every room it joined when the socket closes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use clipforge_core::{JobId, JobProgress};
use clipforge_events::ClientPushHub;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::{ClientMessage, ServerMessage};
use crate::state::ApiState;

type Room = HashMap<Uuid, UnboundedSender<ServerMessage>>;

/// Per-job `WebSocket` subscriber registry, and the [`ClientPushHub`] the
/// event bus pushes domain events through.
pub(crate) struct WsHub {
    rooms: Mutex<HashMap<JobId, Room>>,
}

impl WsHub {
    pub(crate) fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    fn lock_rooms(&self) -> MutexGuard<'_, HashMap<JobId, Room>> {
        match self.rooms.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("websocket room registry mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }

    fn subscribe(&self, job_id: JobId, client_id: Uuid, sender: UnboundedSender<ServerMessage>) {
        self.lock_rooms()
            .entry(job_id)
            .or_default()
            .insert(client_id, sender);
    }

    fn unsubscribe(&self, job_id: JobId, client_id: Uuid) {
        let mut rooms = self.lock_rooms();
        if let Some(room) = rooms.get_mut(&job_id) {
            room.remove(&client_id);
            if room.is_empty() {
                rooms.remove(&job_id);
            }
        }
    }

    fn leave_all(&self, client_id: Uuid, job_ids: &HashSet<JobId>) {
        for job_id in job_ids {
            self.unsubscribe(*job_id, client_id);
        }
    }

    fn broadcast(&self, job_id: JobId, message: &ServerMessage) {
        let rooms = self.lock_rooms();
        let Some(room) = rooms.get(&job_id) else {
            return;
        };
        for sender in room.values() {
            if sender.send(message.clone()).is_err() {
                warn!(%job_id, "dropped websocket push to a disconnected client");
            }
        }
    }
}

#[async_trait]
impl ClientPushHub for WsHub {
    async fn emit_progress(&self, job_id: JobId, progress: &JobProgress) {
        self.broadcast(
            job_id,
            &ServerMessage::JobProgress {
                job_id,
                progress: progress.clone(),
            },
        );
    }

    async fn emit_completed(&self, job_id: JobId, download_url: &str) {
        self.broadcast(
            job_id,
            &ServerMessage::JobCompleted {
                job_id,
                status: "completed".to_string(),
                download_url: download_url.to_string(),
                expire_at: None,
            },
        );
    }

    async fn emit_failed(&self, job_id: JobId, error_message: &str, error_category: &str) {
        self.broadcast(
            job_id,
            &ServerMessage::JobFailed {
                job_id,
                status: "failed".to_string(),
                error: error_message.to_string(),
                error_category: Some(error_category.to_string()),
            },
        );
    }

    async fn emit_cancelled(&self, job_id: JobId) {
        self.broadcast(
            job_id,
            &ServerMessage::JobCancelled {
                job_id,
                status: "cancelled".to_string(),
            },
        );
    }

    fn enabled(&self) -> bool {
        true
    }
}

pub(crate) async fn ws_handler(
    State(state): State<Arc<ApiState>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let client_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, rx) = unbounded_channel::<ServerMessage>();
    let mut subscriptions: HashSet<JobId> = HashSet::new();

    if tx
        .send(ServerMessage::Connected {
            client_id: client_id.to_string(),
        })
        .is_err()
    {
        return;
    }

    let mut outbound = UnboundedReceiverStream::new(rx);
    let forward = tokio::spawn(async move {
        while let Some(message) = outbound.next().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::SubscribeJob { job_id }) => {
                state.ws_hub.subscribe(job_id, client_id, tx.clone());
                subscriptions.insert(job_id);
                Some(ServerMessage::Subscribed { job_id })
            }
            Ok(ClientMessage::UnsubscribeJob { job_id }) => {
                state.ws_hub.unsubscribe(job_id, client_id);
                subscriptions.remove(&job_id);
                Some(ServerMessage::Unsubscribed { job_id })
            }
            Ok(ClientMessage::Ping { .. }) => Some(ServerMessage::Pong {
                timestamp: chrono::Utc::now().timestamp_millis(),
            }),
            Ok(ClientMessage::CancelJob { job_id }) => {
                match state.services.job_orchestrator.cancel(job_id).await {
                    Ok(true) => {
                        let message = ServerMessage::JobCancelled {
                            job_id,
                            status: "cancelled".to_string(),
                        };
                        state.ws_hub.broadcast(job_id, &message);
                        None
                    }
                    Ok(false) => Some(ServerMessage::Error {
                        message: "job not found".to_string(),
                    }),
                    Err(err) => Some(ServerMessage::Error {
                        message: err.to_string(),
                    }),
                }
            }
            Err(err) => Some(ServerMessage::Error {
                message: format!("malformed message: {err}"),
            }),
        };

        if let Some(reply) = reply
            && tx.send(reply).is_err()
        {
            break;
        }
    }

    state.ws_hub.leave_all(client_id, &subscriptions);
    forward.abort();
}
