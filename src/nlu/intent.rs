//! User intents and their extracted entities

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Entities extracted alongside an intent
pub type Entities = serde_json::Map<String, serde_json::Value>;

/// Primary intent behind a user utterance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Intent {
    Greeting,
    InformationRequest,
    ActionRequest,
    Clarification,
    Confirmation,
    Rejection,
    Farewell,
    Smalltalk,
    TaskSpecific,
    PersonalQuestion,
    OpinionRequest,
    Feedback,
    SetPreference,
    LanguageChange,
    /// The model could not classify the utterance
    Unknown,
    /// Understanding failed (model or transport error)
    Error,
    /// Nothing was said
    Null,
    /// Any other label the model produced
    Other(String),
}

impl Intent {
    /// Wire label of the intent
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Greeting => "greeting",
            Self::InformationRequest => "information_request",
            Self::ActionRequest => "action_request",
            Self::Clarification => "clarification",
            Self::Confirmation => "confirmation",
            Self::Rejection => "rejection",
            Self::Farewell => "farewell",
            Self::Smalltalk => "smalltalk",
            Self::TaskSpecific => "task_specific",
            Self::PersonalQuestion => "personal_question",
            Self::OpinionRequest => "opinion_request",
            Self::Feedback => "feedback",
            Self::SetPreference => "set_preference",
            Self::LanguageChange => "language_change",
            Self::Unknown => "unknown",
            Self::Error => "error",
            Self::Null => "null",
            Self::Other(label) => label,
        }
    }
}

impl From<&str> for Intent {
    fn from(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "greeting" => Self::Greeting,
            "information_request" => Self::InformationRequest,
            "action_request" => Self::ActionRequest,
            "clarification" => Self::Clarification,
            "confirmation" => Self::Confirmation,
            "rejection" => Self::Rejection,
            "farewell" => Self::Farewell,
            "smalltalk" => Self::Smalltalk,
            "task_specific" => Self::TaskSpecific,
            "personal_question" => Self::PersonalQuestion,
            "opinion_request" => Self::OpinionRequest,
            "feedback" => Self::Feedback,
            "set_preference" => Self::SetPreference,
            "language_change" => Self::LanguageChange,
            "unknown" | "" => Self::Unknown,
            "error" => Self::Error,
            "null" => Self::Null,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Intent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Intent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from(label.as_str()))
    }
}

/// Read a string entity, ignoring empty values
#[must_use]
pub fn entity_str<'a>(entities: &'a Entities, key: &str) -> Option<&'a str> {
    entities
        .get(key)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
}
