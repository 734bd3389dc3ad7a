//! Short-term agent memory
//!
//! Keeps recent interactions, facts learned per topic, user preferences and
//! the clarification counter. Nothing here outlives the process.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::mcp::ActionResult;
use crate::nlu::{Entities, Intent, entity_str};

/// Number of memory entries retained
pub const MEMORY_CAPACITY: usize = 20;

/// One remembered event
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEntry {
    /// A user turn
    Interaction {
        timestamp: DateTime<Utc>,
        intent: Intent,
        entities: Entities,
    },
    /// The outcome of an executed action
    ActionOutcome {
        timestamp: DateTime<Utc>,
        result: ActionResult,
    },
}

impl MemoryEntry {
    /// When the entry was recorded
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Interaction { timestamp, .. } | Self::ActionOutcome { timestamp, .. } => {
                *timestamp
            }
        }
    }
}

/// The agent's memory of the conversation
#[derive(Debug)]
pub struct AgentMemory {
    entries: VecDeque<MemoryEntry>,
    facts: HashMap<String, Entities>,
    preferences: HashMap<String, Value>,
    clarification_count: u32,
    last_clarification: Option<Instant>,
    clarification_window: Duration,
    interaction_count: u64,
}

impl AgentMemory {
    /// Create an empty memory whose clarification count resets after `clarification_window`
    #[must_use]
    pub fn new(clarification_window: Duration) -> Self {
        tracing::debug!("agent memory initialized");
        Self {
            entries: VecDeque::with_capacity(MEMORY_CAPACITY),
            facts: HashMap::new(),
            preferences: HashMap::new(),
            clarification_count: 0,
            last_clarification: None,
            clarification_window,
            interaction_count: 0,
        }
    }

    fn push(&mut self, entry: MemoryEntry) {
        if self.entries.len() == MEMORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Record a user turn, learning facts and preferences from its entities
    pub fn update_from_interaction(&mut self, intent: &Intent, entities: &Entities) {
        self.push(MemoryEntry::Interaction {
            timestamp: Utc::now(),
            intent: intent.clone(),
            entities: entities.clone(),
        });

        self.learn_facts(entities);
        self.learn_preferences(intent, entities);
        self.interaction_count += 1;

        tracing::debug!(%intent, "memory updated from interaction");
    }

    /// Record an action outcome, learning facts from its data
    pub fn update_from_action_result(&mut self, result: &ActionResult) {
        self.push(MemoryEntry::ActionOutcome {
            timestamp: Utc::now(),
            result: result.clone(),
        });

        if let Some(Value::Object(data)) = &result.data {
            self.learn_facts(data);
        }

        tracing::debug!(success = result.success, "memory updated from action result");
    }

    /// Store every other field of a record that names a `topic`
    fn learn_facts(&mut self, record: &Entities) {
        let Some(topic) = entity_str(record, "topic") else {
            return;
        };
        let topic = topic.to_lowercase();

        for (key, value) in record.iter().filter(|(k, _)| k.as_str() != "topic") {
            tracing::debug!(topic = %topic, key = %key, "stored fact");
            self.facts
                .entry(topic.clone())
                .or_default()
                .insert(key.clone(), value.clone());
        }
    }

    fn learn_preferences(&mut self, intent: &Intent, entities: &Entities) {
        if *intent == Intent::SetPreference {
            let name = entity_str(entities, "preference_name");
            let value = entities.get("preference_value").filter(|v| !v.is_null());
            if let (Some(name), Some(value)) = (name, value) {
                tracing::info!(name, value = %value, "stored user preference");
                self.preferences.insert(name.to_string(), value.clone());
            }
        } else if let Some(Value::Object(preferences)) = entities.get("preference") {
            for (name, value) in preferences {
                tracing::info!(name = %name, value = %value, "stored implicit user preference");
                self.preferences.insert(name.clone(), value.clone());
            }
        }
    }

    /// Clarifications requested inside the current window
    ///
    /// The count resets once the last clarification is older than the window.
    pub fn recent_clarification_count(&mut self) -> u32 {
        let expired = self
            .last_clarification
            .is_none_or(|at| at.elapsed() > self.clarification_window);
        if expired {
            self.clarification_count = 0;
        }
        self.clarification_count
    }

    /// Note that a clarification was requested
    pub fn increment_clarification_count(&mut self) {
        self.clarification_count += 1;
        self.last_clarification = Some(Instant::now());
    }

    /// Whether no interaction has been recorded yet
    #[must_use]
    pub const fn is_first_interaction(&self) -> bool {
        self.interaction_count == 0
    }

    /// Whether facts are known about a topic
    #[must_use]
    pub fn has_information_on_topic(&self, topic: &str) -> bool {
        self.facts.contains_key(&topic.to_lowercase())
    }

    /// Facts known about a topic
    #[must_use]
    pub fn facts_about_topic(&self, topic: &str) -> Option<&Entities> {
        self.facts.get(&topic.to_lowercase())
    }

    /// Topics with known facts
    #[must_use]
    pub fn known_topics(&self) -> Vec<String> {
        self.facts.keys().cloned().collect()
    }

    /// A stored user preference
    #[must_use]
    pub fn user_preference(&self, name: &str) -> Option<&Value> {
        self.preferences.get(name)
    }

    /// The most recent `count` entries, oldest first
    #[must_use]
    pub fn recent_interactions(&self, count: usize) -> Vec<&MemoryEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).collect()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
        self.facts.clear();
        self.preferences.clear();
        self.clarification_count = 0;
        self.last_clarification = None;
        self.interaction_count = 0;
        tracing::info!("agent memory cleared");
    }
}
