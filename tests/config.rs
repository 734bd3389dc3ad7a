//! Configuration file integration tests

use std::io::Write;
use std::time::Duration;

use voicebot::config::{Config, ConfigFileStatus, SttEngine, load_config_file};
use voicebot::{Emotion, Error};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
        [api_keys]
        openai = "sk-file"

        [speech]
        engine = "deepgram"
        language = "de-DE"
        timeout = 2.5
        non_speaking_duration = 0.8

        [agent]
        max_clarification_turns = 4
        clarification_window = 60

        [mcp]
        endpoint = "https://tools.example.com/mcp"
        retry_attempts = 0

        [emotions]
        voice_id = "custom-voice"
        stability = 0.5

        [audio]
        volume = 0.7
        "#,
    );

    let (fc, status) = load_config_file(Some(file.path())).unwrap();
    let config = Config::from_sources(fc, |_| None).unwrap();

    assert_eq!(status, ConfigFileStatus::Loaded(file.path().to_path_buf()));
    assert_eq!(config.api_keys.openai.as_deref(), Some("sk-file"));
    assert_eq!(config.speech.engine, SttEngine::Deepgram);
    assert_eq!(config.speech.language, "de-DE");
    assert_eq!(config.speech.timeout, Duration::from_millis(2500));
    assert_eq!(config.speech.non_speaking_duration, Duration::from_millis(800));
    assert_eq!(config.agent.max_clarification_turns, 4);
    assert_eq!(config.agent.clarification_window, Duration::from_secs(60));
    assert_eq!(config.mcp.endpoint, "https://tools.example.com/mcp");
    // At least one attempt is always made
    assert_eq!(config.mcp.retry_attempts, 1);
    assert_eq!(config.emotions.voice_id, "custom-voice");
    assert!((config.emotions.baseline.stability - 0.5).abs() < f32::EPSILON);
    assert!((config.audio.volume - 0.7).abs() < f32::EPSILON);

    // Neutral speech uses the configured baseline
    let neutral = Emotion::Neutral.voice_settings(config.emotions.baseline);
    assert!((neutral.stability - 0.5).abs() < f32::EPSILON);
}

#[test]
fn test_env_wins_over_file() {
    let file = write_config("[api_keys]\nopenai = \"sk-file\"\n[speech]\nlanguage = \"de-DE\"\n");

    let (fc, _) = load_config_file(Some(file.path())).unwrap();
    let config = Config::from_sources(fc, |key| match key {
        "OPENAI_API_KEY" => Some("sk-env".to_string()),
        "VOICEBOT_LANGUAGE" => Some("auto".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.api_keys.openai.as_deref(), Some("sk-env"));
    assert_eq!(config.speech.language, "auto");
}

#[test]
fn test_explicit_file_errors() {
    let missing = load_config_file(Some(std::path::Path::new("/nonexistent/voicebot.toml")));
    assert!(matches!(missing, Err(Error::Config(_))));

    let broken = write_config("[speech\nengine = ");
    assert!(matches!(
        load_config_file(Some(broken.path())),
        Err(Error::Toml(_))
    ));
}

#[test]
fn test_negative_durations_rejected() {
    let file = write_config("[speech]\ntimeout = -1.0\n");

    let (fc, _) = load_config_file(Some(file.path())).unwrap();

    assert!(matches!(
        Config::from_sources(fc, |_| None),
        Err(Error::Config(_))
    ));
}
