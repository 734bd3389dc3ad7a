//! Action requests and their results

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::nlu::Entities;

/// An action the agent wants executed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action type, e.g. `fetch_information`
    #[serde(rename = "type")]
    pub action_type: String,

    /// Action parameters
    #[serde(default)]
    pub parameters: Entities,
}

impl Action {
    /// Create an action with the given parameters
    pub fn new(action_type: impl Into<String>, parameters: Entities) -> Self {
        Self {
            action_type: action_type.into(),
            parameters,
        }
    }
}

/// Outcome of an executed action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the action succeeded
    #[serde(default)]
    pub success: bool,

    /// Result payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    /// Successful result carrying `data`
    #[must_use]
    pub const fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed result with a reason
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Failure for a missing required parameter
    #[must_use]
    pub fn missing_parameter(name: &str) -> Self {
        Self::failure(format!("Missing required parameter: {name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_uses_type_key() {
        let action: Action =
            serde_json::from_value(json!({"type": "search", "parameters": {"query": "rust"}}))
                .unwrap();

        assert_eq!(action.action_type, "search");
        assert_eq!(action.parameters["query"], "rust");
        assert_eq!(serde_json::to_value(&action).unwrap()["type"], "search");
    }

    #[test]
    fn test_result_tolerates_extra_and_missing_fields() {
        let result: ActionResult = serde_json::from_value(json!({"id": 7})).unwrap();
        assert!(!result.success);
        assert!(result.data.is_none());

        let result: ActionResult =
            serde_json::from_value(json!({"id": 7, "success": true, "data": {"x": 1}})).unwrap();
        assert!(result.success);
        assert_eq!(result.data, Some(json!({"x": 1})));
    }

    #[test]
    fn test_failure_serialization_omits_data() {
        let value = serde_json::to_value(ActionResult::missing_parameter("topic")).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "error": "Missing required parameter: topic"})
        );
    }
}
