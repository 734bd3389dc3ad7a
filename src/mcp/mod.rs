//! Tool invocation over the Model Context Protocol
//!
//! Actions run through a local handler when one is registered. Otherwise they
//! go to the remote endpoint over HTTP or WebSocket, depending on its scheme.

mod action;
mod client;
mod handlers;
mod http;
mod websocket;

pub use action::{Action, ActionResult};
pub use client::{McpClient, Transport};
pub use handlers::{
    ActionHandler, ExecuteTaskHandler, FetchInformationHandler, HandlerRegistry, SearchHandler,
    SendMessageHandler,
};
pub use http::HttpTransport;
pub use websocket::WebSocketTransport;
