//! Voice pipeline integration tests
//!
//! Tests speech providers against local mock servers and the audio helpers
//! without requiring audio hardware

use axum::extract::RawQuery;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use voicebot::Emotion;
use voicebot::config::{Config, SpeechConfig, SttEngine};
use voicebot::emotion::VoiceSettings;
use voicebot::voice::{
    DetectorEvent, SpeechToText, SttProvider, Synthesizer, TextToSpeech, Transcriber,
    TtsProvider, UtteranceDetector, samples_to_wav,
};

mod common;
use common::serve;

const SAMPLE_RATE: u32 = 16_000;

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

fn wav() -> Vec<u8> {
    samples_to_wav(&generate_sine_samples(440.0, 0.2, 0.5), SAMPLE_RATE).unwrap()
}

fn stt_router() -> Router {
    Router::new()
        .route(
            "/v1/speech-to-text",
            post(|headers: HeaderMap| async move {
                if headers.get("xi-api-key").and_then(|v| v.to_str().ok()) != Some("el-key") {
                    return (StatusCode::UNAUTHORIZED, "bad key").into_response();
                }
                Json(json!({"text": "Whats up"})).into_response()
            }),
        )
        .route(
            "/audio/transcriptions",
            post(|headers: HeaderMap| async move {
                let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
                if auth != Some("Bearer oa-key") {
                    return (StatusCode::UNAUTHORIZED, "bad key").into_response();
                }
                Json(json!({"text": "i dont know"})).into_response()
            }),
        )
        .route(
            "/v1/listen",
            post(|RawQuery(query): RawQuery| async move {
                let query = query.unwrap_or_default();
                Json(json!({
                    "results": {"channels": [{"alternatives": [{"transcript": query}]}]}
                }))
            }),
        )
}

#[tokio::test]
async fn test_elevenlabs_transcription_is_normalized() {
    let base = serve(stt_router()).await;
    let stt = SpeechToText::new_elevenlabs("el-key".to_string())
        .unwrap()
        .with_base_url(&base);

    assert_eq!(stt.transcribe(&wav()).await.unwrap(), "Whats up");

    let transcriber = Transcriber::new(vec![stt]);
    assert_eq!(transcriber.transcribe(&wav()).await.as_deref(), Some("What's up"));
}

#[tokio::test]
async fn test_transcriber_falls_back_to_whisper() {
    let base = serve(stt_router()).await;
    let transcriber = Transcriber::new(vec![
        SpeechToText::new_elevenlabs("wrong-key".to_string())
            .unwrap()
            .with_base_url(&base),
        SpeechToText::new_whisper("oa-key".to_string(), &base).unwrap(),
    ]);

    assert_eq!(
        transcriber.providers(),
        vec![SttProvider::ElevenLabs, SttProvider::Whisper]
    );
    assert_eq!(
        transcriber.transcribe(&wav()).await.as_deref(),
        Some("I don't know")
    );
}

#[tokio::test]
async fn test_transcriber_all_providers_fail() {
    let base = serve(stt_router()).await;
    let transcriber = Transcriber::new(vec![
        SpeechToText::new_whisper("wrong-key".to_string(), &base).unwrap(),
    ]);

    assert!(transcriber.transcribe(&wav()).await.is_none());
    assert!(Transcriber::new(Vec::new()).transcribe(&wav()).await.is_none());
}

#[tokio::test]
async fn test_deepgram_sends_language_subtag() {
    let base = serve(stt_router()).await;
    let stt = SpeechToText::new_deepgram("dg-key".to_string())
        .unwrap()
        .with_base_url(&base)
        .with_language("fr-FR");

    let query = stt.transcribe(&wav()).await.unwrap();

    assert!(query.contains("model=nova-2"));
    assert!(query.contains("language=fr"));
    assert!(!query.contains("fr-FR"));
}

#[tokio::test]
async fn test_auto_language_is_not_sent() {
    let base = serve(stt_router()).await;
    let stt = SpeechToText::new_deepgram("dg-key".to_string())
        .unwrap()
        .with_base_url(&base)
        .with_language("auto");

    let query = stt.transcribe(&wav()).await.unwrap();

    assert!(!query.contains("language="));
}

#[test]
fn test_transcriber_from_config_skips_missing_keys() {
    let mut config = Config::default();
    assert_eq!(config.speech.engine, SttEngine::ElevenLabs);
    assert!(Transcriber::from_config(&config).providers().is_empty());

    config.api_keys.openai = Some("oa-key".to_string());
    assert_eq!(
        Transcriber::from_config(&config).providers(),
        vec![SttProvider::Whisper]
    );

    config.api_keys.elevenlabs = Some("el-key".to_string());
    assert_eq!(
        Transcriber::from_config(&config).providers(),
        vec![SttProvider::ElevenLabs, SttProvider::Whisper]
    );
}

/// TTS mock that returns the request body as the "audio"
fn tts_router() -> Router {
    Router::new()
        .route(
            "/v1/text-to-speech/{voice}",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if headers.get("xi-api-key").and_then(|v| v.to_str().ok()) != Some("el-key") {
                    return (StatusCode::UNAUTHORIZED, "bad key").into_response();
                }
                Json(body).into_response()
            }),
        )
        .route(
            "/audio/speech",
            post(|Json(body): Json<Value>| async move { Json(body) }),
        )
}

fn echoed(audio: &[u8]) -> Value {
    serde_json::from_slice(audio).unwrap()
}

fn close_to(value: &Value, expected: f64) -> bool {
    value.as_f64().is_some_and(|v| (v - expected).abs() < 1e-6)
}

#[tokio::test]
async fn test_elevenlabs_uses_emotion_voice_settings() {
    let base = serve(tts_router()).await;
    let tts = TextToSpeech::new_elevenlabs(
        "el-key".to_string(),
        "voice-1".to_string(),
        "eleven_multilingual_v2".to_string(),
        VoiceSettings::NEUTRAL,
    )
    .unwrap()
    .with_base_url(&base);

    let sad = echoed(&tts.synthesize("Oh no.", Emotion::Sad).await.unwrap());
    assert_eq!(sad["text"], "Oh no.");
    assert_eq!(sad["model_id"], "eleven_multilingual_v2");
    assert!(close_to(&sad["voice_settings"]["stability"], 0.85));
    assert!(close_to(&sad["voice_settings"]["style"], 0.1));

    let happy = echoed(&tts.synthesize("Great!", Emotion::Happy).await.unwrap());
    assert!(close_to(&happy["voice_settings"]["stability"], 0.65));
}

#[tokio::test]
async fn test_openai_speed_follows_emotion() {
    let base = serve(tts_router()).await;
    let tts = TextToSpeech::new_openai("oa-key".to_string(), &base).unwrap();

    let concerned = echoed(&tts.synthesize("Hmm.", Emotion::Concerned).await.unwrap());
    assert_eq!(concerned["voice"], "alloy");
    assert!(close_to(&concerned["speed"], 0.9));

    let neutral = echoed(&tts.synthesize("Okay.", Emotion::Neutral).await.unwrap());
    assert!(close_to(&neutral["speed"], 1.0));
}

#[tokio::test]
async fn test_synthesizer_falls_back_to_openai() {
    let base = serve(tts_router()).await;
    let synthesizer = Synthesizer::new(vec![
        TextToSpeech::new_elevenlabs(
            "wrong-key".to_string(),
            "voice-1".to_string(),
            "eleven_multilingual_v2".to_string(),
            VoiceSettings::NEUTRAL,
        )
        .unwrap()
        .with_base_url(&base),
        TextToSpeech::new_openai("oa-key".to_string(), &base).unwrap(),
    ]);

    assert_eq!(
        synthesizer.providers(),
        vec![TtsProvider::ElevenLabs, TtsProvider::OpenAi]
    );

    let audio = synthesizer.synthesize("Hello", Emotion::Happy).await.unwrap();
    assert_eq!(echoed(&audio)["input"], "Hello");
    assert!(Synthesizer::new(Vec::new()).synthesize("Hello", Emotion::Happy).await.is_none());
}

#[test]
fn test_empty_api_keys_rejected() {
    assert!(SpeechToText::new_elevenlabs(String::new()).is_err());
    assert!(TextToSpeech::new_openai(String::new(), "http://localhost").is_err());
}

#[test]
fn test_detector_captures_phrase_between_silences() {
    let speech = SpeechConfig {
        sample_rate: SAMPLE_RATE,
        ..SpeechConfig::default()
    };
    let mut detector = UtteranceDetector::new(&speech);
    detector.calibrate(&[0.0; 1600]);

    assert_eq!(detector.process(&[0.0; 1600]), DetectorEvent::Waiting);
    assert_eq!(
        detector.process(&generate_sine_samples(440.0, 0.5, 0.5)),
        DetectorEvent::Speaking
    );

    let silence = vec![0.0; SAMPLE_RATE as usize * 2];
    match detector.process(&silence) {
        DetectorEvent::Complete(samples) => assert!(samples.len() >= 8000),
        other => panic!("expected a complete phrase, got {other:?}"),
    }
}
