//! WebSocket transport for remote actions
//!
//! A background task owns the socket and reconnects with exponential backoff.
//! Requests carry a numeric `id`; replies are routed back by that id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use super::action::{Action, ActionResult};
use crate::config::McpConfig;

/// First reconnect delay
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Reconnect delay cap
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How long a request waits for the connection to come up
const CONNECT_WAIT: Duration = Duration::from_secs(5);

/// How long a failed connection attempt suppresses new attempts
const FAILURE_COOLDOWN: Duration = Duration::from_secs(60);

/// How long `close` waits for the connection task
const CLOSE_WAIT: Duration = Duration::from_secs(2);

/// Requests awaiting a reply, keyed by message id
type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

/// Handles to the running connection task
struct Connection {
    outgoing: mpsc::UnboundedSender<String>,
    connected: watch::Receiver<bool>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Sends actions over a persistent WebSocket connection
pub struct WebSocketTransport {
    endpoint: String,
    timeout: Duration,
    connect_wait: Duration,
    failure_cooldown: Duration,
    next_id: u64,
    last_failed_attempt: Option<Instant>,
    pending: PendingReplies,
    connection: Option<Connection>,
}

impl WebSocketTransport {
    /// Create a transport for the configured endpoint; nothing connects until first use
    #[must_use]
    pub fn new(config: &McpConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            timeout: config.timeout,
            connect_wait: CONNECT_WAIT,
            failure_cooldown: FAILURE_COOLDOWN,
            next_id: 1,
            last_failed_attempt: None,
            pending: Arc::new(Mutex::new(HashMap::new())),
            connection: None,
        }
    }

    /// Override how long a request waits for the connection
    #[must_use]
    pub const fn with_connect_wait(mut self, wait: Duration) -> Self {
        self.connect_wait = wait;
        self
    }

    /// Override how long a failed connection suppresses new attempts
    #[must_use]
    pub const fn with_failure_cooldown(mut self, cooldown: Duration) -> Self {
        self.failure_cooldown = cooldown;
        self
    }

    /// Whether the socket is currently open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| *c.connected.borrow())
    }

    /// Execute an action and wait for its reply
    pub async fn execute(&mut self, action: &Action) -> ActionResult {
        if let Some(failed_at) = self.last_failed_attempt {
            if failed_at.elapsed() < self.failure_cooldown {
                tracing::info!("skipping WebSocket connection attempt due to recent failure");
                return ActionResult::failure("WebSocket connection unavailable (skipping retry)");
            }
        }

        let attempt_started = Instant::now();
        let (outgoing, mut connected) = {
            let connection = self.ensure_connection();
            (connection.outgoing.clone(), connection.connected.clone())
        };

        if !*connected.borrow() {
            let came_up = tokio::time::timeout(self.connect_wait, connected.wait_for(|c| *c))
                .await
                .is_ok_and(|r| r.is_ok());

            if !came_up {
                self.last_failed_attempt = Some(attempt_started);
                return ActionResult::failure("Failed to establish WebSocket connection");
            }
        }

        self.last_failed_attempt = None;

        let id = self.next_message_id();
        let message = json!({
            "id": id,
            "action": action.action_type,
            "parameters": action.parameters,
        });

        let (reply_tx, reply_rx) = oneshot::channel();
        lock(&self.pending).insert(id, reply_tx);

        if outgoing.send(message.to_string()).is_err() {
            lock(&self.pending).remove(&id);
            return ActionResult::failure("WebSocket connection closed");
        }

        let result = match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(reply)) => serde_json::from_value(reply).unwrap_or_else(|e| {
                tracing::error!(id, error = %e, "malformed action reply");
                ActionResult::failure(format!("Invalid response: {e}"))
            }),
            Ok(Err(_)) => ActionResult::failure("WebSocket connection closed"),
            Err(_) => {
                tracing::error!(id, "timeout waiting for response");
                ActionResult::failure("Timeout waiting for response")
            }
        };

        lock(&self.pending).remove(&id);
        result
    }

    /// Stop the connection task
    pub async fn close(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let _ = connection.shutdown.send(true);
        let mut task = connection.task;
        if tokio::time::timeout(CLOSE_WAIT, &mut task).await.is_err() {
            task.abort();
        }
        lock(&self.pending).clear();
    }

    fn next_message_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Return the running connection task, starting one if needed
    fn ensure_connection(&mut self) -> &Connection {
        if self
            .connection
            .as_ref()
            .is_some_and(|c| c.task.is_finished())
        {
            self.connection = None;
        }

        let endpoint = &self.endpoint;
        let pending = &self.pending;
        self.connection
            .get_or_insert_with(|| Connection::start(endpoint.clone(), Arc::clone(pending)))
    }
}

impl Connection {
    fn start(endpoint: String, pending: PendingReplies) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(run_connection(
            endpoint,
            outgoing_rx,
            pending,
            connected_tx,
            shutdown_rx,
        ));

        Self {
            outgoing: outgoing_tx,
            connected: connected_rx,
            shutdown: shutdown_tx,
            task,
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.shutdown.send(true);
            connection.task.abort();
        }
    }
}

fn lock(pending: &PendingReplies) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Value>>> {
    pending
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Connection loop: connect, pump messages, reconnect with backoff
async fn run_connection(
    endpoint: String,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    pending: PendingReplies,
    connected: watch::Sender<bool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut retry_delay = INITIAL_RETRY_DELAY;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let attempt = tokio::select! {
            result = tokio_tungstenite::connect_async(endpoint.as_str()) => result,
            _ = shutdown.changed() => break,
        };

        match attempt {
            Ok((socket, _)) => {
                tracing::info!(endpoint = %endpoint, "WebSocket connection established");
                connected.send_replace(true);
                retry_delay = INITIAL_RETRY_DELAY;

                let (mut sink, mut stream) = socket.split();
                let keep_running = loop {
                    tokio::select! {
                        _ = shutdown.changed() => {
                            let _ = sink.close().await;
                            break false;
                        }
                        message = outgoing.recv() => {
                            let Some(text) = message else {
                                let _ = sink.close().await;
                                break false;
                            };
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                tracing::error!(error = %e, "error sending message");
                                break true;
                            }
                        }
                        incoming = stream.next() => match incoming {
                            Some(Ok(Message::Text(text))) => dispatch_reply(&pending, text.as_str()),
                            Some(Ok(Message::Close(_))) | None => break true,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "WebSocket receive error");
                                break true;
                            }
                        }
                    }
                };

                connected.send_replace(false);
                tracing::info!("WebSocket connection closed");

                if !keep_running {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(endpoint = %endpoint, error = %e, "WebSocket connection error");
                connected.send_replace(false);
            }
        }

        tokio::select! {
            () = tokio::time::sleep(retry_delay) => {}
            _ = shutdown.changed() => break,
        }
        retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
    }

    connected.send_replace(false);
}

/// Route a reply to the request waiting on its id
fn dispatch_reply(pending: &PendingReplies, text: &str) {
    let reply: Value = match serde_json::from_str(text) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(error = %e, message = %text, "received invalid JSON message");
            return;
        }
    };

    let Some(id) = reply.get("id").and_then(Value::as_u64) else {
        tracing::debug!(message = %text, "ignoring message without id");
        return;
    };

    match lock(pending).remove(&id) {
        Some(waiter) => {
            let _ = waiter.send(reply);
        }
        None => tracing::debug!(id, "ignoring reply for unknown request"),
    }
}
