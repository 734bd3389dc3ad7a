//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use voicebot::agent::Agent;
use voicebot::config::{AgentConfig, NluConfig};
use voicebot::llm::{ChatModel, ChatRequest};
use voicebot::nlu::{Entities, NluEngine};
use voicebot::{Emotion, Error, Heard, Listen, Result, Speak};

/// Chat model that replays canned replies and records every request
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    /// Model that answers with `replies` in order, then errors
    pub fn new<I, S>(replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::default();
        model
            .replies
            .lock()
            .unwrap()
            .extend(replies.into_iter().map(|r| Ok(r.into())));
        Arc::new(model)
    }

    /// Queue a failing reply
    pub fn push_error(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::Llm(message.to_string())));
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// User message of the `n`th request
    pub fn user_prompt(&self, n: usize) -> String {
        self.requests()[n]
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Number of requests received
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Llm("no scripted reply left".to_string())))
    }
}

/// NLU engine backed by a scripted model
pub fn nlu_engine(model: &Arc<ScriptedModel>) -> NluEngine {
    NluEngine::new(model.clone(), NluConfig::default())
}

/// Agent backed by a scripted model
pub fn agent(model: &Arc<ScriptedModel>) -> Agent {
    Agent::new(nlu_engine(model), &AgentConfig::default())
}

/// JSON object literal as an entity map
pub fn entities(value: Value) -> Entities {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Model reply in the response-generation format
pub fn reply(response: &str, emotion: &str) -> String {
    serde_json::json!({ "response": response, "emotion": emotion }).to_string()
}

/// Model reply in the intent-extraction format
pub fn intent(intent: &str, entities: Value) -> String {
    serde_json::json!({ "intent": intent, "entities": entities }).to_string()
}

/// Input that replays scripted utterances, then reports end of input
pub struct ScriptedInput {
    heard: VecDeque<Heard>,
    pub closed: bool,
}

impl ScriptedInput {
    pub fn new<I: IntoIterator<Item = Heard>>(heard: I) -> Self {
        Self {
            heard: heard.into_iter().collect(),
            closed: false,
        }
    }

    pub fn utterances(lines: &[&str]) -> Self {
        Self::new(lines.iter().map(|l| Heard::Utterance((*l).to_string())))
    }
}

#[async_trait(?Send)]
impl Listen for ScriptedInput {
    async fn listen(&mut self) -> Result<Heard> {
        Ok(self.heard.pop_front().unwrap_or(Heard::EndOfInput))
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Output that records what would have been spoken
#[derive(Default)]
pub struct RecordingOutput {
    pub spoken: Vec<(String, Emotion)>,
    pub closed: bool,
}

#[async_trait(?Send)]
impl Speak for RecordingOutput {
    async fn speak(&mut self, text: &str, emotion: Emotion) -> bool {
        self.spoken.push((text.to_string(), emotion));
        true
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
