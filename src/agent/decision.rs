//! Action selection and validation

use serde_json::Value;

use crate::mcp::Action;
use crate::nlu::{Entities, Intent, entity_str};

/// An action the agent can request, with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

/// Actions the agent knows how to request
pub const ACTION_CATALOGUE: &[ActionSpec] = &[
    ActionSpec {
        name: "fetch_information",
        description: "Fetch information on a topic",
        required: &["topic"],
        optional: &["filters"],
    },
    ActionSpec {
        name: "send_message",
        description: "Send a message",
        required: &["recipient", "content"],
        optional: &["priority"],
    },
    ActionSpec {
        name: "create_item",
        description: "Create a new item",
        required: &["item_type", "details"],
        optional: &[],
    },
    ActionSpec {
        name: "update_item",
        description: "Update an existing item",
        required: &["item_id", "updates"],
        optional: &[],
    },
    ActionSpec {
        name: "delete_item",
        description: "Delete an item",
        required: &["item_id"],
        optional: &["confirm"],
    },
    ActionSpec {
        name: "execute_task",
        description: "Execute a specific task",
        required: &["task"],
        optional: &["details"],
    },
    ActionSpec {
        name: "search",
        description: "Search for information",
        required: &["query"],
        optional: &["filters", "limit"],
    },
];

/// Requests the bot can answer itself without calling a tool
const CONTENT_GENERATION_TASKS: &[&str] =
    &["recite a poem", "tell a story", "sing a song", "read poetry"];

const POEM_KEYWORDS: &[&str] = &["poem", "poetry", "诗", "朗读", "念", "recite", "read"];
const STORY_KEYWORDS: &[&str] = &["story", "tale", "narrative", "故事"];
const SONG_KEYWORDS: &[&str] = &["song", "sing", "歌"];
const SUMMARY_KEYWORDS: &[&str] = &["summary", "summarize", "summarization", "overview", "brief"];

/// Task verbs and the action each selects, checked in order
const TASK_VERBS: &[(&str, &str)] = &[
    ("send", "send_message"),
    ("create", "create_item"),
    ("update", "update_item"),
    ("delete", "delete_item"),
    ("search", "search"),
    ("find", "search"),
];

/// Chooses which action, if any, an intent calls for
#[derive(Debug, Clone, Copy)]
pub struct DecisionEngine {
    catalogue: &'static [ActionSpec],
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionEngine {
    /// Create an engine over the built-in catalogue
    #[must_use]
    pub const fn new() -> Self {
        Self {
            catalogue: ACTION_CATALOGUE,
        }
    }

    /// Look up an action by name
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<&'static ActionSpec> {
        self.catalogue.iter().find(|s| s.name == name)
    }

    /// Decide the action for an intent, or `None` when no tool is needed
    ///
    /// `known_topics` are lower-cased topics the agent already has facts for.
    #[must_use]
    pub fn decide_action(
        &self,
        intent: &Intent,
        entities: &Entities,
        known_topics: &[String],
    ) -> Option<Action> {
        tracing::debug!(%intent, "deciding action");

        if *intent == Intent::LanguageChange {
            tracing::info!(
                language = entity_str(entities, "language").unwrap_or("unknown"),
                "language change requested"
            );
            return None;
        }

        if let Some(spec) = self.spec(intent.as_str()) {
            return Some(Self::action_from_spec(spec, entities));
        }

        match intent {
            Intent::ActionRequest => self.action_request(entities),
            Intent::InformationRequest => Self::information_request(entities, known_topics),
            Intent::TaskSpecific => Self::task_specific(entities),
            _ => None,
        }
    }

    /// Check that an action is catalogued and carries its required parameters
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found
    pub fn validate_action(&self, action: &Action) -> std::result::Result<(), String> {
        let spec = self
            .spec(&action.action_type)
            .ok_or_else(|| format!("Unsupported action type: {}", action.action_type))?;

        match spec
            .required
            .iter()
            .find(|p| !action.parameters.contains_key(**p))
        {
            Some(missing) => Err(format!("Action is missing required parameter: {missing}")),
            None => Ok(()),
        }
    }

    fn action_from_spec(spec: &ActionSpec, entities: &Entities) -> Action {
        let parameters = spec
            .required
            .iter()
            .chain(spec.optional)
            .filter_map(|p| entities.get(*p).map(|v| ((*p).to_string(), v.clone())))
            .collect();
        Action::new(spec.name, parameters)
    }

    fn action_request(&self, entities: &Entities) -> Option<Action> {
        if is_content_generation(entities) {
            return None;
        }

        let action_type = entity_str(entities, "action_type")
            .filter(|t| self.spec(t).is_some())
            .unwrap_or("execute_task");

        let parameters = entities
            .iter()
            .filter(|(k, _)| k.as_str() != "action_type")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(Action::new(action_type, parameters))
    }

    fn information_request(entities: &Entities, known_topics: &[String]) -> Option<Action> {
        let topic = entity_str(entities, "topic")?;
        if known_topics.contains(&topic.to_lowercase()) {
            return None;
        }
        Some(fetch_information(topic, entities))
    }

    fn task_specific(entities: &Entities) -> Option<Action> {
        let task = entity_str(entities, "task")?;
        let lowered = task.to_lowercase();

        let action_type = TASK_VERBS
            .iter()
            .find(|(verb, _)| lowered.contains(verb))
            .map_or("execute_task", |(_, action)| *action);

        let mut parameters = Entities::new();
        parameters.insert("task".to_string(), Value::String(task.to_string()));
        parameters.insert("details".to_string(), Value::Object(entities.clone()));
        Some(Action::new(action_type, parameters))
    }
}

/// A `fetch_information` action for `topic`, carrying the request's filters
#[must_use]
pub fn fetch_information(topic: &str, entities: &Entities) -> Action {
    let mut parameters = Entities::new();
    parameters.insert("topic".to_string(), Value::String(topic.to_string()));
    parameters.insert(
        "filters".to_string(),
        entities
            .get("filters")
            .cloned()
            .unwrap_or_else(|| Value::Object(Entities::new())),
    );
    Action::new("fetch_information", parameters)
}

/// Whether an action request asks for content the model can produce itself
fn is_content_generation(entities: &Entities) -> bool {
    let task = entity_str(entities, "task");

    if let Some(task) = task {
        if CONTENT_GENERATION_TASKS.iter().any(|t| *t == task) {
            tracing::info!(task, "content generation request detected");
            return true;
        }
    }

    if let Some(detail) = entity_str(entities, "task_specific") {
        let detail = detail.to_lowercase();
        let matched = [POEM_KEYWORDS, STORY_KEYWORDS, SONG_KEYWORDS, SUMMARY_KEYWORDS]
            .concat()
            .iter()
            .any(|k| detail.contains(k));
        if matched {
            tracing::info!(task_specific = %detail, "content generation request detected");
            return true;
        }
    }

    task.is_some_and(|t| {
        let t = t.to_lowercase();
        SUMMARY_KEYWORDS.iter().any(|k| t.contains(k))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entities(value: Value) -> Entities {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_language_change_needs_no_action() {
        let engine = DecisionEngine::new();
        let action = engine.decide_action(
            &Intent::LanguageChange,
            &entities(json!({"language": "fr"})),
            &[],
        );
        assert!(action.is_none());
    }

    #[test]
    fn test_catalogue_intent_keeps_listed_parameters() {
        let engine = DecisionEngine::new();
        let action = engine
            .decide_action(
                &Intent::from("search"),
                &entities(json!({"query": "rust", "limit": 3, "mood": "curious"})),
                &[],
            )
            .unwrap();

        assert_eq!(action.action_type, "search");
        assert_eq!(action.parameters.len(), 2);
        assert!(action.parameters.get("mood").is_none());
    }

    #[test]
    fn test_action_request() {
        let engine = DecisionEngine::new();

        let action = engine
            .decide_action(
                &Intent::ActionRequest,
                &entities(json!({"action_type": "send_message", "recipient": "Ada", "content": "hi"})),
                &[],
            )
            .unwrap();
        assert_eq!(action.action_type, "send_message");
        assert!(action.parameters.get("action_type").is_none());

        let action = engine
            .decide_action(
                &Intent::ActionRequest,
                &entities(json!({"action_type": "launch_rocket", "task": "launch"})),
                &[],
            )
            .unwrap();
        assert_eq!(action.action_type, "execute_task");
    }

    #[test]
    fn test_content_generation_stays_local() {
        let engine = DecisionEngine::new();
        for request in [
            json!({"task": "tell a story"}),
            json!({"task_specific": "Recite a POEM please"}),
            json!({"task_specific": "唱一首歌"}),
            json!({"task": "quick summary of the news"}),
        ] {
            assert!(
                engine
                    .decide_action(&Intent::ActionRequest, &entities(request.clone()), &[])
                    .is_none(),
                "{request} should not need an action"
            );
        }
    }

    #[test]
    fn test_information_request() {
        let engine = DecisionEngine::new();
        let request = entities(json!({"topic": "Weather"}));

        let action = engine
            .decide_action(&Intent::InformationRequest, &request, &[])
            .unwrap();
        assert_eq!(action.action_type, "fetch_information");
        assert_eq!(action.parameters["filters"], json!({}));

        let known = vec!["weather".to_string()];
        assert!(
            engine
                .decide_action(&Intent::InformationRequest, &request, &known)
                .is_none()
        );
        assert!(
            engine
                .decide_action(&Intent::InformationRequest, &Entities::new(), &[])
                .is_none()
        );
    }

    #[test]
    fn test_task_specific_verbs() {
        let engine = DecisionEngine::new();
        let decide = |task: &str| {
            engine
                .decide_action(&Intent::TaskSpecific, &entities(json!({"task": task})), &[])
                .map(|a| a.action_type)
        };

        assert_eq!(decide("Send the report").as_deref(), Some("send_message"));
        assert_eq!(decide("find my keys").as_deref(), Some("search"));
        assert_eq!(decide("water the plants").as_deref(), Some("execute_task"));
        assert!(
            engine
                .decide_action(&Intent::TaskSpecific, &Entities::new(), &[])
                .is_none()
        );
    }

    #[test]
    fn test_validate_action() {
        let engine = DecisionEngine::new();

        assert!(
            engine
                .validate_action(&Action::new("search", entities(json!({"query": "x"}))))
                .is_ok()
        );
        assert_eq!(
            engine.validate_action(&Action::new("send_message", entities(json!({"recipient": "Ada"})))),
            Err("Action is missing required parameter: content".to_string())
        );
        assert_eq!(
            engine.validate_action(&Action::new("teleport", Entities::new())),
            Err("Unsupported action type: teleport".to_string())
        );
    }
}
