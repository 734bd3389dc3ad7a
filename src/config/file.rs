//! TOML configuration file loading
//!
//! Supports `~/.config/voicebot/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoicebotConfigFile {
    /// Speech recognition configuration
    #[serde(default)]
    pub speech: SpeechFileConfig,

    /// Language understanding configuration
    #[serde(default)]
    pub nlu: NluFileConfig,

    /// Agent behaviour configuration
    #[serde(default)]
    pub agent: AgentFileConfig,

    /// Tool invocation endpoint configuration
    #[serde(default)]
    pub mcp: McpFileConfig,

    /// Emotional voice configuration
    #[serde(default)]
    pub emotions: EmotionsFileConfig,

    /// Audio device configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Speech recognition configuration
#[derive(Debug, Default, Deserialize)]
pub struct SpeechFileConfig {
    /// STT engine ("elevenlabs", "openai", "deepgram")
    pub engine: Option<String>,

    /// Recognition language (e.g. "en-US", or "auto")
    pub language: Option<String>,

    /// Capture sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Seconds to wait for speech to start
    pub timeout: Option<f64>,

    /// Minimum seconds of speech for a phrase
    pub phrase_threshold: Option<f64>,

    /// Seconds of silence that end a phrase
    pub non_speaking_duration: Option<f64>,

    /// Maximum seconds of a single phrase
    pub phrase_time_limit: Option<f64>,

    /// RMS floor for speech detection (0.0 to 1.0)
    pub energy_threshold: Option<f32>,

    /// Seconds of ambient audio sampled at startup
    pub calibration: Option<f64>,
}

/// Language understanding configuration
#[derive(Debug, Default, Deserialize)]
pub struct NluFileConfig {
    /// Chat model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// Sampling temperature for intent extraction
    pub temperature: Option<f32>,

    /// Completion token cap
    pub max_tokens: Option<u32>,

    /// Conversation turns kept in context
    pub context_window: Option<usize>,

    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,
}

/// Agent behaviour configuration
#[derive(Debug, Default, Deserialize)]
pub struct AgentFileConfig {
    /// Clarification requests allowed inside the window
    pub max_clarification_turns: Option<u32>,

    /// Seconds after which the clarification count resets
    pub clarification_window: Option<u64>,
}

/// Tool invocation endpoint configuration
#[derive(Debug, Default, Deserialize)]
pub struct McpFileConfig {
    /// Remote endpoint (`ws://`, `wss://`, `http://` or `https://`)
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    pub timeout: Option<u64>,

    /// HTTP attempts per action
    pub retry_attempts: Option<u32>,

    /// Seconds between HTTP attempts
    pub retry_delay: Option<u64>,
}

/// Emotional voice configuration
#[derive(Debug, Default, Deserialize)]
pub struct EmotionsFileConfig {
    /// `ElevenLabs` voice identifier
    pub voice_id: Option<String>,

    /// `ElevenLabs` model identifier
    pub tts_model: Option<String>,

    /// Neutral stability
    pub stability: Option<f32>,

    /// Neutral similarity boost
    pub similarity_boost: Option<f32>,

    /// Neutral style exaggeration
    pub style: Option<f32>,

    /// Speaker boost toggle
    pub use_speaker_boost: Option<bool>,
}

/// Audio device configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Input device name (default device when unset)
    pub input_device: Option<String>,

    /// Output device name (default device when unset)
    pub output_device: Option<String>,

    /// Playback volume multiplier
    pub volume: Option<f32>,
}

/// Logging configuration
#[derive(Debug, Default, Deserialize)]
pub struct LoggingFileConfig {
    /// Default filter directive (e.g. "info")
    pub level: Option<String>,

    /// Log file path; empty string disables the file
    pub file: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Where the file layer of the configuration came from
///
/// Loading runs before the log subscriber exists, so the outcome is kept
/// and reported through [`ConfigFileStatus::log`] once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigFileStatus {
    /// No config file was found
    Defaults,
    /// Settings were read from this file
    Loaded(PathBuf),
    /// The standard file exists but was unusable, so defaults apply
    Skipped { path: PathBuf, reason: String },
}

impl ConfigFileStatus {
    /// Emit the outcome as a log event
    pub fn log(&self) {
        match self {
            Self::Defaults => tracing::debug!("no config file found, using defaults"),
            Self::Loaded(path) => tracing::info!(path = %path.display(), "loaded config file"),
            Self::Skipped { path, reason } => tracing::warn!(
                path = %path.display(),
                error = %reason,
                "failed to load config file, using defaults"
            ),
        }
    }
}

/// Load the TOML config file
///
/// With an explicit path the file must exist and parse. Without one, the
/// standard path is tried and any problem falls back to defaults.
///
/// # Errors
///
/// Returns error if an explicitly requested file cannot be read or parsed
pub fn load_config_file(
    explicit: Option<&Path>,
) -> Result<(VoicebotConfigFile, ConfigFileStatus)> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config = toml::from_str(&content)?;
        return Ok((config, ConfigFileStatus::Loaded(path.to_path_buf())));
    }

    match config_file_path() {
        Some(path) if path.exists() => Ok(load_standard_file(path)),
        _ => Ok((VoicebotConfigFile::default(), ConfigFileStatus::Defaults)),
    }
}

/// Read the standard config file, falling back to defaults on any problem
fn load_standard_file(path: PathBuf) -> (VoicebotConfigFile, ConfigFileStatus) {
    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|content| toml::from_str(&content).map_err(|e| e.to_string()));

    match parsed {
        Ok(config) => (config, ConfigFileStatus::Loaded(path)),
        Err(reason) => (
            VoicebotConfigFile::default(),
            ConfigFileStatus::Skipped { path, reason },
        ),
    }
}

/// Return the config file path: `~/.config/voicebot/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voicebot").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_broken_standard_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[speech\nengine = ").unwrap();

        let (config, status) = load_standard_file(file.path().to_path_buf());

        assert!(config.speech.engine.is_none());
        assert!(matches!(
            status,
            ConfigFileStatus::Skipped { ref path, .. } if path == file.path()
        ));
    }

    #[test]
    fn test_standard_file_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[speech]\nengine = \"deepgram\"\n").unwrap();

        let (config, status) = load_standard_file(file.path().to_path_buf());

        assert_eq!(config.speech.engine.as_deref(), Some("deepgram"));
        assert_eq!(status, ConfigFileStatus::Loaded(file.path().to_path_buf()));
    }
}
