//! Configuration management for the voicebot
//!
//! Values are resolved as env > TOML file > built-in default.

pub mod file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::emotion::VoiceSettings;
use crate::{Error, Result};

pub use file::{ConfigFileStatus, VoicebotConfigFile, config_file_path, load_config_file};

/// Default `OpenAI`-compatible API base URL
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

/// Default `ElevenLabs` voice
pub const DEFAULT_VOICE_ID: &str = "EXAVITQu4vr4xnSDxMaL";

/// Voicebot configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// API keys
    pub api_keys: ApiKeys,

    /// Speech recognition settings
    pub speech: SpeechConfig,

    /// Language understanding settings
    pub nlu: NluConfig,

    /// Agent settings
    pub agent: AgentConfig,

    /// Tool invocation settings
    pub mcp: McpConfig,

    /// Emotional voice settings
    pub emotions: EmotionConfig,

    /// Audio device settings
    pub audio: AudioConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat completions, Whisper, fallback TTS)
    pub openai: Option<String>,

    /// `ElevenLabs` API key (TTS and speech-to-text)
    pub elevenlabs: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |k: &Option<String>| k.as_ref().map(|_| "<set>");
        f.debug_struct("ApiKeys")
            .field("openai", &mask(&self.openai))
            .field("elevenlabs", &mask(&self.elevenlabs))
            .field("deepgram", &mask(&self.deepgram))
            .finish()
    }
}

/// Speech-to-text engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttEngine {
    /// `ElevenLabs` speech-to-text, falling back to Whisper
    ElevenLabs,
    /// `OpenAI` Whisper API
    OpenAi,
    /// Deepgram, falling back to Whisper
    Deepgram,
}

impl FromStr for SttEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "elevenlabs" | "elevenlabs_api" => Ok(Self::ElevenLabs),
            "openai" | "openai_api" | "whisper" => Ok(Self::OpenAi),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown speech engine: {other}"))),
        }
    }
}

/// Speech recognition configuration
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// Primary STT engine
    pub engine: SttEngine,

    /// Recognition language, or "auto"
    pub language: String,

    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// How long to wait for speech to start
    pub timeout: Duration,

    /// Minimum speech duration for a phrase
    pub phrase_threshold: Duration,

    /// Silence duration that ends a phrase
    pub non_speaking_duration: Duration,

    /// Maximum duration of a single phrase
    pub phrase_time_limit: Duration,

    /// RMS floor for speech detection
    pub energy_threshold: f32,

    /// Ambient calibration duration at startup
    pub calibration: Duration,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            engine: SttEngine::ElevenLabs,
            language: "en-US".to_string(),
            sample_rate: 16000,
            timeout: Duration::from_secs(5),
            phrase_threshold: Duration::from_millis(300),
            non_speaking_duration: Duration::from_secs(1),
            phrase_time_limit: Duration::from_secs(10),
            energy_threshold: 0.012,
            calibration: Duration::from_secs(2),
        }
    }
}

/// Language understanding configuration
#[derive(Debug, Clone)]
pub struct NluConfig {
    /// Chat model identifier
    pub model: String,

    /// Sampling temperature for intent extraction
    pub temperature: f32,

    /// Completion token cap
    pub max_tokens: u32,

    /// Conversation turns kept in context
    pub context_window: usize,

    /// `OpenAI`-compatible API base URL
    pub base_url: String,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 150,
            context_window: 10,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Clarification requests allowed inside the window
    pub max_clarification_turns: u32,

    /// Window after which the clarification count resets
    pub clarification_window: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_clarification_turns: 2,
            clarification_window: Duration::from_secs(300),
        }
    }
}

/// Tool invocation configuration
#[derive(Debug, Clone)]
pub struct McpConfig {
    /// Remote endpoint URL
    pub endpoint: String,

    /// Per-request timeout
    pub timeout: Duration,

    /// HTTP attempts per action
    pub retry_attempts: u32,

    /// Delay between HTTP attempts
    pub retry_delay: Duration,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8765".to_string(),
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Emotional voice configuration
#[derive(Debug, Clone)]
pub struct EmotionConfig {
    /// `ElevenLabs` voice identifier
    pub voice_id: String,

    /// `ElevenLabs` model identifier
    pub tts_model: String,

    /// Voice settings used for the neutral emotion
    pub baseline: VoiceSettings,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.to_string(),
            tts_model: "eleven_multilingual_v2".to_string(),
            baseline: VoiceSettings::NEUTRAL,
        }
    }
}

/// Audio device configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Input device name
    pub input_device: Option<String>,

    /// Output device name
    pub output_device: Option<String>,

    /// Playback volume multiplier
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device: None,
            output_device: None,
            volume: 1.0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive
    pub level: String,

    /// Log file path
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(PathBuf::from("voicebot.log")),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the TOML file
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unreadable or a value is invalid
    pub fn load(config_path: Option<&Path>) -> Result<(Self, ConfigFileStatus)> {
        let (fc, status) = load_config_file(config_path)?;
        let config = Self::from_sources(fc, |key| std::env::var(key).ok())?;
        Ok((config, status))
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn from_sources<F>(fc: VoicebotConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
        };

        let speech_defaults = SpeechConfig::default();
        let engine = match env("VOICEBOT_STT_ENGINE").or(fc.speech.engine) {
            Some(name) => name.parse()?,
            None => speech_defaults.engine,
        };
        let speech = SpeechConfig {
            engine,
            language: env("VOICEBOT_LANGUAGE")
                .or(fc.speech.language)
                .unwrap_or(speech_defaults.language),
            sample_rate: fc.speech.sample_rate.unwrap_or(speech_defaults.sample_rate),
            timeout: seconds(fc.speech.timeout, "speech.timeout")?
                .unwrap_or(speech_defaults.timeout),
            phrase_threshold: seconds(fc.speech.phrase_threshold, "speech.phrase_threshold")?
                .unwrap_or(speech_defaults.phrase_threshold),
            non_speaking_duration: seconds(
                fc.speech.non_speaking_duration,
                "speech.non_speaking_duration",
            )?
            .unwrap_or(speech_defaults.non_speaking_duration),
            phrase_time_limit: seconds(fc.speech.phrase_time_limit, "speech.phrase_time_limit")?
                .unwrap_or(speech_defaults.phrase_time_limit),
            energy_threshold: fc
                .speech
                .energy_threshold
                .unwrap_or(speech_defaults.energy_threshold),
            calibration: seconds(fc.speech.calibration, "speech.calibration")?
                .unwrap_or(speech_defaults.calibration),
        };

        let nlu_defaults = NluConfig::default();
        let nlu = NluConfig {
            model: env("VOICEBOT_NLU_MODEL")
                .or(fc.nlu.model)
                .unwrap_or(nlu_defaults.model),
            temperature: fc.nlu.temperature.unwrap_or(nlu_defaults.temperature),
            max_tokens: fc.nlu.max_tokens.unwrap_or(nlu_defaults.max_tokens),
            context_window: fc.nlu.context_window.unwrap_or(nlu_defaults.context_window),
            base_url: env("VOICEBOT_LLM_BASE_URL")
                .or(fc.nlu.base_url)
                .unwrap_or(nlu_defaults.base_url),
        };

        let agent_defaults = AgentConfig::default();
        let agent = AgentConfig {
            max_clarification_turns: fc
                .agent
                .max_clarification_turns
                .unwrap_or(agent_defaults.max_clarification_turns),
            clarification_window: fc
                .agent
                .clarification_window
                .map_or(agent_defaults.clarification_window, Duration::from_secs),
        };

        let mcp_defaults = McpConfig::default();
        let mcp = McpConfig {
            endpoint: env("VOICEBOT_MCP_ENDPOINT")
                .or(fc.mcp.endpoint)
                .unwrap_or(mcp_defaults.endpoint),
            timeout: fc.mcp.timeout.map_or(mcp_defaults.timeout, Duration::from_secs),
            retry_attempts: fc
                .mcp
                .retry_attempts
                .unwrap_or(mcp_defaults.retry_attempts)
                .max(1),
            retry_delay: fc
                .mcp
                .retry_delay
                .map_or(mcp_defaults.retry_delay, Duration::from_secs),
        };

        let emotion_defaults = EmotionConfig::default();
        let emotions = EmotionConfig {
            voice_id: env("VOICEBOT_VOICE_ID")
                .or(fc.emotions.voice_id)
                .unwrap_or(emotion_defaults.voice_id),
            tts_model: fc.emotions.tts_model.unwrap_or(emotion_defaults.tts_model),
            baseline: VoiceSettings {
                stability: fc
                    .emotions
                    .stability
                    .unwrap_or(emotion_defaults.baseline.stability),
                similarity_boost: fc
                    .emotions
                    .similarity_boost
                    .unwrap_or(emotion_defaults.baseline.similarity_boost),
                style: fc.emotions.style.unwrap_or(emotion_defaults.baseline.style),
                use_speaker_boost: fc
                    .emotions
                    .use_speaker_boost
                    .unwrap_or(emotion_defaults.baseline.use_speaker_boost),
            },
        };

        let audio = AudioConfig {
            input_device: fc.audio.input_device,
            output_device: fc.audio.output_device,
            volume: fc.audio.volume.unwrap_or(1.0).max(0.0),
        };

        let logging_defaults = LoggingConfig::default();
        let logging = LoggingConfig {
            level: fc.logging.level.unwrap_or(logging_defaults.level),
            file: match env("VOICEBOT_LOG_FILE").or(fc.logging.file) {
                Some(path) if path.trim().is_empty() => None,
                Some(path) => Some(PathBuf::from(path)),
                None => logging_defaults.file,
            },
        };

        validate_endpoint(&mcp.endpoint)?;

        Ok(Self {
            api_keys,
            speech,
            nlu,
            agent,
            mcp,
            emotions,
            audio,
            logging,
        })
    }

    /// Names of the API keys required to run the voice loop that are not set
    #[must_use]
    pub fn missing_api_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_keys.openai.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        if self.api_keys.elevenlabs.is_none() {
            missing.push("ELEVENLABS_API_KEY");
        }
        missing
    }
}

/// Convert an optional seconds value to a duration, rejecting negatives
fn seconds(value: Option<f64>, field: &str) -> Result<Option<Duration>> {
    value
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| Error::Config(format!("{field} must be a non-negative number")))
        })
        .transpose()
}

/// Check that the MCP endpoint uses a supported scheme
fn validate_endpoint(endpoint: &str) -> Result<()> {
    let parsed = url::Url::parse(endpoint)
        .map_err(|e| Error::Config(format!("invalid MCP endpoint {endpoint}: {e}")))?;
    match parsed.scheme() {
        "ws" | "wss" | "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "unsupported MCP endpoint scheme: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = Config::from_sources(VoicebotConfigFile::default(), no_env).unwrap();

        assert_eq!(config.speech.engine, SttEngine::ElevenLabs);
        assert_eq!(config.speech.language, "en-US");
        assert_eq!(config.speech.timeout, Duration::from_secs(5));
        assert_eq!(config.nlu.model, "gpt-4o-mini");
        assert_eq!(config.nlu.context_window, 10);
        assert_eq!(config.agent.max_clarification_turns, 2);
        assert_eq!(config.mcp.endpoint, "ws://localhost:8765");
        assert_eq!(config.mcp.retry_attempts, 3);
        assert_eq!(config.emotions.voice_id, DEFAULT_VOICE_ID);
        assert_eq!(config.logging.file, Some(PathBuf::from("voicebot.log")));
    }

    #[test]
    fn test_env_overrides_file() {
        let fc: VoicebotConfigFile = toml::from_str(
            r#"
            [nlu]
            model = "file-model"

            [mcp]
            endpoint = "http://file.example/mcp"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(fc, |key| match key {
            "VOICEBOT_NLU_MODEL" => Some("env-model".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.nlu.model, "env-model");
        assert_eq!(config.mcp.endpoint, "http://file.example/mcp");
    }

    #[test]
    fn test_missing_api_keys() {
        let config = Config::from_sources(VoicebotConfigFile::default(), |key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.missing_api_keys(), vec!["ELEVENLABS_API_KEY"]);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let config = Config::from_sources(VoicebotConfigFile::default(), |key| match key {
            "OPENAI_API_KEY" => Some("   ".to_string()),
            _ => None,
        })
        .unwrap();

        assert!(config.api_keys.openai.is_none());
    }

    #[test]
    fn test_unknown_engine_is_rejected() {
        let result = Config::from_sources(VoicebotConfigFile::default(), |key| match key {
            "VOICEBOT_STT_ENGINE" => Some("sphinx".to_string()),
            _ => None,
        });

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_bad_endpoint_scheme_is_rejected() {
        let result = Config::from_sources(VoicebotConfigFile::default(), |key| match key {
            "VOICEBOT_MCP_ENDPOINT" => Some("ftp://example.com".to_string()),
            _ => None,
        });

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_log_file_disables_file_logging() {
        let fc: VoicebotConfigFile = toml::from_str("[logging]\nfile = \"\"\n").unwrap();
        let config = Config::from_sources(fc, no_env).unwrap();

        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_api_keys_debug_is_redacted() {
        let keys = ApiKeys {
            openai: Some("sk-secret".to_string()),
            ..ApiKeys::default()
        };

        let debug = format!("{keys:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<set>"));
    }
}
