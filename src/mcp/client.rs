//! Action execution client

use super::action::{Action, ActionResult};
use super::handlers::HandlerRegistry;
use super::http::HttpTransport;
use super::websocket::WebSocketTransport;
use crate::config::McpConfig;
use crate::{Error, Result};

/// Remote transport chosen from the endpoint scheme
pub enum Transport {
    Http(HttpTransport),
    WebSocket(WebSocketTransport),
}

impl Transport {
    /// Build the transport matching `config.endpoint`
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is not a ws, wss, http or https URL
    pub fn from_config(config: &McpConfig) -> Result<Self> {
        let url = url::Url::parse(&config.endpoint)
            .map_err(|e| Error::Mcp(format!("invalid endpoint {}: {e}", config.endpoint)))?;

        match url.scheme() {
            "ws" | "wss" => Ok(Self::WebSocket(WebSocketTransport::new(config))),
            "http" | "https" => Ok(Self::Http(HttpTransport::new(config)?)),
            other => Err(Error::Mcp(format!("unsupported endpoint scheme: {other}"))),
        }
    }

    async fn execute(&mut self, action: &Action) -> ActionResult {
        match self {
            Self::Http(transport) => transport.execute(action).await,
            Self::WebSocket(transport) => transport.execute(action).await,
        }
    }

    async fn close(&mut self) {
        if let Self::WebSocket(transport) = self {
            transport.close().await;
        }
    }
}

/// Executes actions locally when a handler exists, remotely otherwise
pub struct McpClient {
    handlers: HandlerRegistry,
    transport: Transport,
}

impl McpClient {
    /// Create a client with the built-in local handlers
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint is invalid
    pub fn new(config: &McpConfig) -> Result<Self> {
        let transport = Transport::from_config(config)?;
        tracing::info!(endpoint = %config.endpoint, "MCP client initialized");
        Ok(Self {
            handlers: HandlerRegistry::with_defaults(),
            transport,
        })
    }

    /// Replace the local handler registry
    #[must_use]
    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Replace the remote transport
    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Execute an action
    pub async fn execute(&mut self, action: &Action) -> ActionResult {
        tracing::info!(
            action = %action.action_type,
            parameters = %serde_json::Value::Object(action.parameters.clone()),
            "executing action"
        );

        if let Some(handler) = self.handlers.get(&action.action_type) {
            tracing::debug!(action = %action.action_type, "using local handler");
            return handler.handle(&action.parameters);
        }

        self.transport.execute(action).await
    }

    /// Close the remote connection
    pub async fn close(&mut self) {
        self.transport.close().await;
        tracing::info!("MCP client closed");
    }
}
