//! Language understanding integration tests

use serde_json::json;
use voicebot::Emotion;
use voicebot::mcp::ActionResult;
use voicebot::nlu::{Entities, FALLBACK_RESPONSE, Intent, ResponseGoal, TROUBLE_RESPONSE};

mod common;
use common::{ScriptedModel, intent, nlu_engine, reply};

#[tokio::test]
async fn test_process_extracts_intent_and_entities() {
    let model = ScriptedModel::new([intent(
        "information_request",
        json!({"topic": "weather", "city": "Oslo"}),
    )]);
    let mut nlu = nlu_engine(&model);

    let understanding = nlu.process("What's the weather in Oslo?").await;

    assert_eq!(understanding.intent, Intent::InformationRequest);
    assert_eq!(understanding.entities["city"], "Oslo");
    assert!(model.user_prompt(0).contains("Current user message: What's the weather in Oslo?"));
}

#[tokio::test]
async fn test_process_tolerates_code_fence() {
    let model = ScriptedModel::new(["```json\n{\"intent\": \"farewell\", \"entities\": {}}\n```"]);
    let mut nlu = nlu_engine(&model);

    assert_eq!(nlu.process("bye").await.intent, Intent::Farewell);
}

#[tokio::test]
async fn test_process_unparseable_reply_is_unknown() {
    let model = ScriptedModel::new(["I think the user is greeting"]);
    let mut nlu = nlu_engine(&model);

    let understanding = nlu.process("hi").await;

    assert_eq!(understanding.intent, Intent::Unknown);
    assert!(understanding.entities.is_empty());
}

#[tokio::test]
async fn test_process_model_error_is_error_intent() {
    let model = ScriptedModel::new(Vec::<String>::new());
    model.push_error("rate limited");
    let mut nlu = nlu_engine(&model);

    let understanding = nlu.process("hi").await;

    assert_eq!(understanding.intent, Intent::Error);
    assert!(
        understanding.entities["error_message"]
            .as_str()
            .unwrap()
            .contains("rate limited")
    );
}

#[tokio::test]
async fn test_non_object_json_is_treated_as_failure() {
    let model = ScriptedModel::new(["[\"greeting\"]", "42"]);
    let mut nlu = nlu_engine(&model);

    let understanding = nlu.process("hi").await;
    assert_eq!(understanding.intent, Intent::Error);
    assert!(understanding.entities.contains_key("error_message"));

    let (text, emotion) = nlu
        .generate_response(&ResponseGoal::Reply(Intent::Greeting), &Entities::new(), None)
        .await;
    assert_eq!(text, TROUBLE_RESPONSE);
    assert_eq!(emotion, Emotion::Concerned);

    // Only the user message was recorded
    assert_eq!(nlu.context().len(), 1);
}

#[tokio::test]
async fn test_process_empty_text_skips_model() {
    let model = ScriptedModel::new(Vec::<String>::new());
    let mut nlu = nlu_engine(&model);

    let understanding = nlu.process("").await;

    assert_eq!(understanding.intent, Intent::Null);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_history_reaches_later_prompts() {
    let model = ScriptedModel::new([
        intent("greeting", json!({})),
        reply("Hello there!", "happy"),
        intent("smalltalk", json!({})),
    ]);
    let mut nlu = nlu_engine(&model);

    nlu.process("hello").await;
    nlu.generate_response(&ResponseGoal::Reply(Intent::Greeting), &Entities::new(), None)
        .await;
    nlu.process("nice day").await;

    let prompt = model.user_prompt(2);
    assert!(prompt.contains("User: hello\nAssistant: Hello there!"));
    assert_eq!(nlu.context().len(), 3);
}

#[tokio::test]
async fn test_generate_response_reads_emotion() {
    let model = ScriptedModel::new([reply("Oh no, that's unfortunate.", "sad")]);
    let mut nlu = nlu_engine(&model);

    let (text, emotion) = nlu
        .generate_response(&ResponseGoal::Reply(Intent::Feedback), &Entities::new(), None)
        .await;

    assert_eq!(text, "Oh no, that's unfortunate.");
    assert_eq!(emotion, Emotion::Sad);
    assert!(model.user_prompt(0).contains("\"intent\":\"feedback\""));
}

#[tokio::test]
async fn test_generate_response_unknown_emotion_is_neutral() {
    let model = ScriptedModel::new([reply("Sure.", "ecstatic")]);
    let mut nlu = nlu_engine(&model);

    let (_, emotion) = nlu
        .generate_response(&ResponseGoal::Reply(Intent::Confirmation), &Entities::new(), None)
        .await;

    assert_eq!(emotion, Emotion::Neutral);
}

#[tokio::test]
async fn test_generate_response_fallbacks() {
    let model = ScriptedModel::new(["{\"emotion\": \"happy\"}", "plain words"]);
    model.push_error("offline");
    let mut nlu = nlu_engine(&model);
    let goal = ResponseGoal::Reply(Intent::Smalltalk);

    let (text, emotion) = nlu.generate_response(&goal, &Entities::new(), None).await;
    assert_eq!(text, FALLBACK_RESPONSE);
    assert_eq!(emotion, Emotion::Happy);

    let (text, emotion) = nlu.generate_response(&goal, &Entities::new(), None).await;
    assert_eq!(text, "plain words");
    assert_eq!(emotion, Emotion::Neutral);

    let (text, emotion) = nlu.generate_response(&goal, &Entities::new(), None).await;
    assert_eq!(text, TROUBLE_RESPONSE);
    assert_eq!(emotion, Emotion::Concerned);
}

#[tokio::test]
async fn test_generate_response_includes_action_result() {
    let model = ScriptedModel::new([reply("It's sunny.", "happy")]);
    let mut nlu = nlu_engine(&model);
    let result = ActionResult::success(json!({"topic": "weather", "condition": "sunny"}));

    nlu.generate_response(&ResponseGoal::ActionSuccess, &Entities::new(), Some(&result))
        .await;

    let prompt = model.user_prompt(0);
    assert!(prompt.contains("\"intent\":\"action_success\""));
    assert!(prompt.contains("\"condition\":\"sunny\""));
}
