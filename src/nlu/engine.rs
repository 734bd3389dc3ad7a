//! Intent extraction and response generation through the language model

use std::sync::Arc;

use serde_json::{Value, json};

use super::context::ConversationContext;
use super::intent::{Entities, Intent};
use crate::config::NluConfig;
use crate::emotion::Emotion;
use crate::llm::{ChatMessage, ChatModel, ChatRequest};
use crate::mcp::ActionResult;

/// Temperature used when phrasing responses, for more varied wording
const RESPONSE_TEMPERATURE: f32 = 0.8;

/// Spoken when the model reply has no usable text
pub const FALLBACK_RESPONSE: &str = "I'm not sure how to respond to that.";

/// Spoken when response generation fails outright
pub const TROUBLE_RESPONSE: &str = "I'm having trouble processing that right now.";

const INTENT_SYSTEM_PROMPT: &str = r#"You are an AI assistant that analyzes user speech to extract intent and entities.
Output ONLY a JSON object with the following structure:
{
    "intent": "the_primary_intent",
    "entities": {
        "entity_name": "entity_value",
        ...
    }
}

Common intents include:
- greeting: User is greeting the system
- information_request: User is asking for information (put the subject in "topic")
- action_request: User wants the system to perform an action (use "action_type" and "task")
- clarification: User is asking for clarification
- confirmation: User is confirming something
- rejection: User is rejecting something
- farewell: User is saying goodbye
- smalltalk: User is making small talk
- task_specific: User is referring to a specific task (specify it in "task")
- personal_question: User is asking about you personally
- opinion_request: User is asking for your opinion
- feedback: User is providing feedback
- set_preference: User states a preference ("preference_name", "preference_value")
- language_change: User wants to switch language ("language")

Be flexible in your intent classification. Don't overclassify casual questions as philosophical inquiries about AI personhood.
Focus on the practical intent behind the user's words rather than literal interpretation.

Extract all relevant entities from the user's speech."#;

const RESPONSE_SYSTEM_PROMPT: &str = r#"You are an emotional AI assistant that generates natural, conversational responses.
Your responses should be concise, helpful, and emotionally appropriate.

IMPORTANT GUIDELINES:
1. Avoid philosophical discussions about AI consciousness or personhood unless explicitly asked
2. Focus on being helpful and addressing the user's actual needs
3. Vary your responses - don't repeat the same phrases
4. Be conversational and natural, not robotic
5. Keep responses brief but informative
6. Don't start responses with phrases like "As an AI assistant..."

Output ONLY a JSON object with the following structure:
{
    "response": "Your natural language response here",
    "emotion": "appropriate_emotion"
}

Available emotions: neutral, happy, sad, angry, surprised, concerned

Choose the most appropriate emotion based on the context and content of your response."#;

/// What a generated response should accomplish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseGoal {
    /// Respond to the user's intent directly
    Reply(Intent),
    /// Ask the user to rephrase
    RequestClarification,
    /// Tell the user information is being fetched
    InformationRequestProcessing,
    /// Answer from what is already known
    InformationProvision,
    /// Confirm an action is under way
    ActionAcknowledgment,
    /// Confirm a task is under way
    TaskAcknowledgment,
    /// Explain a task that needs no action
    TaskInformation,
    /// Report a successful action
    ActionSuccess,
    /// Report a failed action
    ActionFailure,
}

impl ResponseGoal {
    /// Label passed to the model as the response intent
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Reply(intent) => intent.as_str(),
            Self::RequestClarification => "request_clarification",
            Self::InformationRequestProcessing => "information_request_processing",
            Self::InformationProvision => "information_provision",
            Self::ActionAcknowledgment => "action_acknowledgment",
            Self::TaskAcknowledgment => "task_acknowledgment",
            Self::TaskInformation => "task_information",
            Self::ActionSuccess => "action_success",
            Self::ActionFailure => "action_failure",
        }
    }
}

/// Intent and entities extracted from an utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Understanding {
    pub intent: Intent,
    pub entities: Entities,
}

impl Understanding {
    fn new(intent: Intent, entities: Entities) -> Self {
        Self { intent, entities }
    }
}

/// Language understanding engine backed by a chat model
pub struct NluEngine {
    model: Arc<dyn ChatModel>,
    config: NluConfig,
    context: ConversationContext,
}

impl NluEngine {
    /// Create a new engine
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, config: NluConfig) -> Self {
        let context = ConversationContext::new(config.context_window);
        tracing::info!(model = %config.model, "NLU engine initialized");
        Self {
            model,
            config,
            context,
        }
    }

    /// Extract intent and entities from user text
    ///
    /// Failures are reported as the `error` intent rather than an `Err`.
    pub async fn process(&mut self, text: &str) -> Understanding {
        if text.is_empty() {
            return Understanding::new(Intent::Null, Entities::new());
        }

        self.context.add_user_message(text);

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(INTENT_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Conversation history:\n{}\n\nCurrent user message: {text}",
                    self.context.formatted_history()
                )),
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let content = match self.model.complete(&request).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(error = %e, "NLU processing failed");
                return failed_understanding(&e.to_string());
            }
        };

        let understanding = match parse_reply(&content) {
            ModelReply::Object(mut result) => {
                let intent = result
                    .get("intent")
                    .and_then(Value::as_str)
                    .map_or(Intent::Unknown, Intent::from);
                let entities = match result.remove("entities") {
                    Some(Value::Object(map)) => map,
                    _ => Entities::new(),
                };
                Understanding::new(intent, entities)
            }
            ModelReply::NotAnObject => {
                tracing::error!(content = %content, "NLU response is not a JSON object");
                return failed_understanding(NOT_AN_OBJECT);
            }
            ModelReply::NotJson => {
                tracing::warn!(content = %content, "failed to parse NLU response as JSON");
                Understanding::new(Intent::Unknown, Entities::new())
            }
        };

        tracing::info!(
            intent = %understanding.intent,
            entities = %serde_json::Value::Object(understanding.entities.clone()),
            "extracted intent"
        );
        understanding
    }

    /// Generate a spoken response and its emotion
    pub async fn generate_response(
        &mut self,
        goal: &ResponseGoal,
        entities: &Entities,
        action_result: Option<&ActionResult>,
    ) -> (String, Emotion) {
        self.generate_response_with(goal, entities, action_result, Emotion::Neutral)
            .await
    }

    /// Generate a spoken response, using `fallback` when the model names no emotion
    pub async fn generate_response_with(
        &mut self,
        goal: &ResponseGoal,
        entities: &Entities,
        action_result: Option<&ActionResult>,
        fallback: Emotion,
    ) -> (String, Emotion) {
        let input = json!({
            "intent": goal.as_str(),
            "entities": entities,
            "conversation_history": self.context.formatted_history(),
            "action_result": action_result,
        });

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(RESPONSE_SYSTEM_PROMPT),
                ChatMessage::user(format!("Generate a response for: {input}")),
            ],
            temperature: RESPONSE_TEMPERATURE,
            max_tokens: self.config.max_tokens,
        };

        let content = match self.model.complete(&request).await {
            Ok(content) => content,
            Err(e) => {
                tracing::error!(error = %e, goal = goal.as_str(), "response generation failed");
                return (TROUBLE_RESPONSE.to_string(), Emotion::Concerned);
            }
        };

        let (text, emotion) = match parse_reply(&content) {
            ModelReply::Object(result) => {
                let text = result
                    .get("response")
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(FALLBACK_RESPONSE)
                    .to_string();
                let emotion = result
                    .get("emotion")
                    .and_then(Value::as_str)
                    .map_or(fallback, |label| Emotion::resolve(Some(label)));
                (text, emotion)
            }
            ModelReply::NotAnObject => {
                tracing::error!(content = %content, "generated response is not a JSON object");
                return (TROUBLE_RESPONSE.to_string(), Emotion::Concerned);
            }
            ModelReply::NotJson => {
                tracing::warn!(content = %content, "failed to parse generated response as JSON");
                let text = if content.is_empty() {
                    FALLBACK_RESPONSE.to_string()
                } else {
                    content
                };
                (text, fallback)
            }
        };

        self.context.add_assistant_message(&text);

        tracing::info!(goal = goal.as_str(), %emotion, response = %text, "generated response");
        (text, emotion)
    }

    /// Conversation history seen by the engine
    #[must_use]
    pub const fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Mutable access to the conversation history
    pub const fn context_mut(&mut self) -> &mut ConversationContext {
        &mut self.context
    }
}

const NOT_AN_OBJECT: &str = "model reply is not a JSON object";

/// A model reply after JSON decoding
enum ModelReply {
    Object(serde_json::Map<String, Value>),
    /// Valid JSON of the wrong shape, treated like a failed call
    NotAnObject,
    /// Free text, used as-is where a fallback allows it
    NotJson,
}

/// Parse a model reply, tolerating a Markdown code fence
fn parse_reply(content: &str) -> ModelReply {
    match serde_json::from_str(strip_code_fence(content)) {
        Ok(Value::Object(map)) => ModelReply::Object(map),
        Ok(_) => ModelReply::NotAnObject,
        Err(_) => ModelReply::NotJson,
    }
}

fn failed_understanding(message: &str) -> Understanding {
    let mut entities = Entities::new();
    entities.insert(
        "error_message".to_string(),
        Value::String(message.to_string()),
    );
    Understanding::new(Intent::Error, entities)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
