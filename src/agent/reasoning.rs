//! Turn-level reasoning: from an understood utterance to a reply and an action

use serde_json::Value;

use super::decision::{DecisionEngine, fetch_information};
use super::memory::AgentMemory;
use crate::config::AgentConfig;
use crate::emotion::Emotion;
use crate::mcp::{Action, ActionResult};
use crate::nlu::{Entities, Intent, NluEngine, ResponseGoal, Understanding, entity_str};

/// Greeting spoken at start-up and for the first greeting of a session
pub const GREETING: &str = "Hello! I'm your emotional voicebot assistant. How can I help you today?";

/// Verbs that mark a task as needing an action
const ACTION_VERBS: &[&str] = &[
    "send", "create", "update", "delete", "modify", "execute", "run", "start", "stop",
];

/// What the agent decided to do with a user turn
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Reply to speak now
    pub response: String,
    /// Action to execute, if any
    pub action: Option<Action>,
    /// Emotion for the reply
    pub emotion: Emotion,
}

impl Decision {
    fn reply((response, emotion): (String, Emotion)) -> Self {
        Self {
            response,
            action: None,
            emotion,
        }
    }

    fn with_action((response, emotion): (String, Emotion), action: Action) -> Self {
        Self {
            response,
            action: Some(action),
            emotion,
        }
    }
}

/// Conversational agent combining understanding, memory and action selection
pub struct Agent {
    nlu: NluEngine,
    memory: AgentMemory,
    decisions: DecisionEngine,
    max_clarification_turns: u32,
}

impl Agent {
    /// Create an agent around a language understanding engine
    #[must_use]
    pub fn new(nlu: NluEngine, config: &AgentConfig) -> Self {
        tracing::info!(
            max_clarification_turns = config.max_clarification_turns,
            "agent initialized"
        );
        Self {
            nlu,
            memory: AgentMemory::new(config.clarification_window),
            decisions: DecisionEngine::new(),
            max_clarification_turns: config.max_clarification_turns,
        }
    }

    /// Extract intent and entities from user text
    pub async fn understand(&mut self, text: &str) -> Understanding {
        self.nlu.process(text).await
    }

    /// Decide how to respond to a user turn
    pub async fn decide(&mut self, intent: &Intent, entities: &Entities) -> Decision {
        tracing::info!(%intent, "agent deciding");

        let first_interaction = self.memory.is_first_interaction();
        let topic_known = entity_str(entities, "topic")
            .is_some_and(|t| self.memory.has_information_on_topic(t));
        self.memory.update_from_interaction(intent, entities);

        if *intent == Intent::Unknown && self.should_clarify() {
            return Decision::reply(self.clarify().await);
        }

        match intent {
            Intent::Greeting if first_interaction => {
                Decision::reply((GREETING.to_string(), Emotion::Happy))
            }
            Intent::Greeting | Intent::Farewell => Decision::reply(
                self.nlu
                    .generate_response(&ResponseGoal::Reply(intent.clone()), entities, None)
                    .await,
            ),
            Intent::InformationRequest => self.information_request(entities, topic_known).await,
            Intent::ActionRequest => self.action_request(intent, entities).await,
            Intent::TaskSpecific => self.task_specific(entities).await,
            _ if self.decisions.spec(intent.as_str()).is_some() => {
                self.action_request(intent, entities).await
            }
            _ => Decision::reply(
                self.nlu
                    .generate_response(&ResponseGoal::Reply(intent.clone()), entities, None)
                    .await,
            ),
        }
    }

    /// Turn an action outcome into a reply
    pub async fn handle_result(&mut self, result: &ActionResult) -> (String, Emotion) {
        self.memory.update_from_action_result(result);

        let (goal, fallback) = if result.success {
            (ResponseGoal::ActionSuccess, Emotion::Happy)
        } else {
            (ResponseGoal::ActionFailure, Emotion::Concerned)
        };

        self.nlu
            .generate_response_with(&goal, &Entities::new(), Some(result), fallback)
            .await
    }

    fn should_clarify(&mut self) -> bool {
        self.memory.recent_clarification_count() < self.max_clarification_turns
    }

    async fn clarify(&mut self) -> (String, Emotion) {
        self.memory.increment_clarification_count();

        let mut entities = Entities::new();
        entities.insert(
            "reason".to_string(),
            Value::String("unclear_intent".to_string()),
        );
        self.nlu
            .generate_response(&ResponseGoal::RequestClarification, &entities, None)
            .await
    }

    async fn information_request(&mut self, entities: &Entities, topic_known: bool) -> Decision {
        match entity_str(entities, "topic") {
            Some(topic) if !topic_known => {
                let action = fetch_information(topic, entities);
                let reply = self
                    .nlu
                    .generate_response(&ResponseGoal::InformationRequestProcessing, entities, None)
                    .await;
                Decision::with_action(reply, action)
            }
            _ => Decision::reply(
                self.nlu
                    .generate_response(&ResponseGoal::InformationProvision, entities, None)
                    .await,
            ),
        }
    }

    /// Pick the action for an action request, or answer it directly
    ///
    /// Also covers intents that name a catalogued action.
    async fn action_request(&mut self, intent: &Intent, entities: &Entities) -> Decision {
        let known_topics = self.memory.known_topics();
        let Some(action) = self.decisions.decide_action(intent, entities, &known_topics) else {
            // Content the model can produce itself, such as a poem or a summary
            return Decision::reply(
                self.nlu
                    .generate_response(&ResponseGoal::Reply(intent.clone()), entities, None)
                    .await,
            );
        };

        let mut ack = Entities::new();
        ack.insert(
            "action_type".to_string(),
            Value::String(action.action_type.clone()),
        );
        let reply = self
            .nlu
            .generate_response(&ResponseGoal::ActionAcknowledgment, &ack, None)
            .await;
        Decision::with_action(reply, action)
    }

    async fn task_specific(&mut self, entities: &Entities) -> Decision {
        let Some(task) = entity_str(entities, "task").map(str::to_string) else {
            return Decision::reply(self.clarify().await);
        };

        let mut task_entities = Entities::new();
        task_entities.insert("task".to_string(), Value::String(task.clone()));

        if requires_action(&task) {
            let mut parameters = task_entities.clone();
            parameters.insert("details".to_string(), Value::Object(entities.clone()));
            let action = Action::new("execute_task", parameters);

            let reply = self
                .nlu
                .generate_response(&ResponseGoal::TaskAcknowledgment, &task_entities, None)
                .await;
            Decision::with_action(reply, action)
        } else {
            Decision::reply(
                self.nlu
                    .generate_response(&ResponseGoal::TaskInformation, &task_entities, None)
                    .await,
            )
        }
    }

    /// The agent's memory
    #[must_use]
    pub const fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    /// Mutable access to the agent's memory
    pub const fn memory_mut(&mut self) -> &mut AgentMemory {
        &mut self.memory
    }

    /// The action decision engine
    #[must_use]
    pub const fn decisions(&self) -> &DecisionEngine {
        &self.decisions
    }

    /// The language understanding engine
    #[must_use]
    pub const fn nlu(&self) -> &NluEngine {
        &self.nlu
    }
}

/// Whether a task description names something to do rather than to explain
fn requires_action(task: &str) -> bool {
    let task = task.to_lowercase();
    ACTION_VERBS.iter().any(|verb| task.contains(verb))
}
