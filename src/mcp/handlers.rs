//! Local action handlers
//!
//! Actions with a registered handler run in-process instead of going to the
//! remote endpoint.

use std::collections::HashMap;

use serde_json::{Value, json};

use super::action::ActionResult;
use crate::nlu::Entities;

/// Executes one action type locally
pub trait ActionHandler: Send + Sync {
    /// Handle an action with the given parameters
    fn handle(&self, parameters: &Entities) -> ActionResult;
}

/// Handlers keyed by action type
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn ActionHandler>>,
}

impl HandlerRegistry {
    /// Registry with no handlers; every action goes to the remote endpoint
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register("fetch_information", FetchInformationHandler);
        registry.register("send_message", SendMessageHandler);
        registry.register("execute_task", ExecuteTaskHandler);
        registry.register("search", SearchHandler);
        registry
    }

    /// Register a handler, replacing any existing one for the type
    pub fn register(&mut self, action_type: &str, handler: impl ActionHandler + 'static) {
        self.handlers
            .insert(action_type.to_string(), Box::new(handler));
    }

    /// Handler for an action type
    #[must_use]
    pub fn get(&self, action_type: &str) -> Option<&dyn ActionHandler> {
        self.handlers.get(action_type).map(|h| &**h)
    }

    /// Whether a handler is registered for the type
    #[must_use]
    pub fn contains(&self, action_type: &str) -> bool {
        self.handlers.contains_key(action_type)
    }
}

/// A parameter that is present and not empty
fn present<'a>(parameters: &'a Entities, name: &str) -> Option<&'a Value> {
    parameters.get(name).filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    })
}

/// Render a parameter as display text
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Fetches information on a topic
pub struct FetchInformationHandler;

impl FetchInformationHandler {
    fn canned_data(topic: &str) -> Option<Value> {
        let data = match topic {
            "weather" => json!({
                "temperature": 72,
                "condition": "sunny",
                "humidity": 45,
                "wind_speed": 5
            }),
            "news" => json!({
                "headlines": [
                    "New AI breakthrough announced",
                    "Global climate summit begins today",
                    "Stock market reaches record high"
                ]
            }),
            "schedule" => json!({
                "upcoming_events": [
                    {"time": "2:00 PM", "title": "Team meeting"},
                    {"time": "4:30 PM", "title": "Client call"}
                ]
            }),
            _ => return None,
        };
        Some(data)
    }

    /// Keep only the keys named by `filters`, unless nothing would remain
    fn apply_filters(data: Entities, filters: &Value) -> Entities {
        let wanted = |key: &str| match filters {
            Value::Object(map) => map.contains_key(key),
            Value::Array(items) => items.iter().any(|i| i.as_str() == Some(key)),
            Value::String(s) => s == key,
            _ => false,
        };

        let filtered: Entities = data
            .iter()
            .filter(|(k, _)| wanted(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        if filtered.is_empty() { data } else { filtered }
    }
}

impl ActionHandler for FetchInformationHandler {
    fn handle(&self, parameters: &Entities) -> ActionResult {
        let Some(topic) = present(parameters, "topic").map(as_text) else {
            return ActionResult::missing_parameter("topic");
        };

        tracing::info!(topic = %topic, "fetching information");

        let mut data = match Self::canned_data(&topic.to_lowercase()) {
            Some(Value::Object(map)) => map,
            _ => {
                let mut map = Entities::new();
                map.insert(
                    "info".to_string(),
                    Value::String(format!("No specific data available for {topic}")),
                );
                map
            }
        };

        if let Some(filters) = present(parameters, "filters") {
            data = Self::apply_filters(data, filters);
        }

        let mut payload = Entities::new();
        payload.insert("topic".to_string(), Value::String(topic));
        payload.extend(data);

        ActionResult::success(Value::Object(payload))
    }
}

/// Sends a message to a recipient
pub struct SendMessageHandler;

impl ActionHandler for SendMessageHandler {
    fn handle(&self, parameters: &Entities) -> ActionResult {
        let Some(recipient) = present(parameters, "recipient") else {
            return ActionResult::missing_parameter("recipient");
        };
        if present(parameters, "content").is_none() {
            return ActionResult::missing_parameter("content");
        }

        tracing::info!(recipient = %as_text(recipient), "sending message");

        ActionResult::success(json!({
            "message_id": format!("msg_{}", uuid::Uuid::new_v4().simple()),
            "recipient": recipient,
            "status": "sent"
        }))
    }
}

/// Executes a generic task
pub struct ExecuteTaskHandler;

impl ActionHandler for ExecuteTaskHandler {
    fn handle(&self, parameters: &Entities) -> ActionResult {
        let Some(task) = present(parameters, "task").map(as_text) else {
            return ActionResult::missing_parameter("task");
        };

        tracing::info!(task = %task, "executing task");

        ActionResult::success(json!({
            "task": task,
            "status": "completed",
            "result": format!("Task '{task}' executed successfully")
        }))
    }
}

/// Searches for information
pub struct SearchHandler;

impl SearchHandler {
    const DEFAULT_LIMIT: usize = 5;
}

impl ActionHandler for SearchHandler {
    fn handle(&self, parameters: &Entities) -> ActionResult {
        let Some(query) = present(parameters, "query").map(as_text) else {
            return ActionResult::missing_parameter("query");
        };

        let limit = parameters
            .get("limit")
            .and_then(Value::as_u64)
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(Self::DEFAULT_LIMIT);

        tracing::info!(query = %query, limit, "searching");

        let results: Vec<Value> = (1..=Self::DEFAULT_LIMIT)
            .take(limit)
            .map(|i| {
                json!({
                    "title": format!("Result {i}"),
                    "description": format!("Description for result {i}")
                })
            })
            .collect();

        ActionResult::success(json!({
            "query": query,
            "total_results": results.len(),
            "results": results
        }))
    }
}
