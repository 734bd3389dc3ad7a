//! Speech-to-text (STT) processing

use super::transcript::normalize_transcript;
use crate::config::{Config, SttEngine};
use crate::{Error, Result};

/// Default `ElevenLabs` API base URL
pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";

/// Default Deepgram API base URL
pub const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";

/// Prompt that biases Whisper towards conversational text
const WHISPER_PROMPT: &str = "This is a conversation with an AI assistant.";

/// Response from transcription APIs that return `{ "text": ... }`
#[derive(serde::Deserialize)]
struct TextResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    ElevenLabs,
    Whisper,
    Deepgram,
}

impl SttProvider {
    /// Provider name for logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ElevenLabs => "elevenlabs",
            Self::Whisper => "whisper",
            Self::Deepgram => "deepgram",
        }
    }
}

/// Transcribes speech to text through one hosted provider
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    language: Option<String>,
    provider: SttProvider,
}

impl SpeechToText {
    fn new(api_key: String, base_url: &str, provider: SttProvider) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(format!(
                "{} API key required for speech-to-text",
                provider.name()
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: None,
            provider,
        })
    }

    /// Create a new STT instance using `ElevenLabs` `scribe_v1`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: String) -> Result<Self> {
        Self::new(api_key, ELEVENLABS_BASE_URL, SttProvider::ElevenLabs)
    }

    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(api_key: String, base_url: &str) -> Result<Self> {
        Self::new(api_key, base_url, SttProvider::Whisper)
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: String) -> Result<Self> {
        Self::new(api_key, DEEPGRAM_BASE_URL, SttProvider::Deepgram)
    }

    /// Override the API base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Set the recognition language; "auto" leaves detection to the provider
    #[must_use]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language_hint(language).map(str::to_string);
        self
    }

    /// Which provider this instance talks to
    #[must_use]
    pub const fn provider(&self) -> SttProvider {
        self.provider
    }

    /// Transcribe WAV audio to raw text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the provider rejects it
    pub async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(
            provider = self.provider.name(),
            audio_bytes = audio.len(),
            "starting transcription"
        );

        let text = match self.provider {
            SttProvider::ElevenLabs => self.transcribe_elevenlabs(audio).await?,
            SttProvider::Whisper => self.transcribe_whisper(audio).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await?,
        };

        tracing::info!(provider = self.provider.name(), transcript = %text, "transcription complete");
        Ok(text)
    }

    fn wav_part(audio: &[u8]) -> Result<reqwest::multipart::Part> {
        reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| Error::Stt(e.to_string()))
    }

    /// Transcribe using `ElevenLabs` speech-to-text
    async fn transcribe_elevenlabs(&self, audio: &[u8]) -> Result<String> {
        let form = reqwest::multipart::Form::new()
            .part("file", Self::wav_part(audio)?)
            .text("model_id", "scribe_v1");

        let response = self
            .client
            .post(format!("{}/v1/speech-to-text", self.base_url))
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let result: TextResponse = Self::check(response, "ElevenLabs").await?.json().await?;
        Ok(result.text)
    }

    /// Transcribe using `OpenAI` Whisper
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        let mut form = reqwest::multipart::Form::new()
            .part("file", Self::wav_part(audio)?)
            .text("model", "whisper-1")
            .text("temperature", "0")
            .text("prompt", WHISPER_PROMPT);

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let result: TextResponse = Self::check(response, "Whisper").await?.json().await?;
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        let mut url = format!("{}/v1/listen?model=nova-2&punctuate=true", self.base_url);
        if let Some(language) = &self.language {
            url.push_str("&language=");
            url.push_str(language);
        }

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await?;

        let result: DeepgramResponse = Self::check(response, "Deepgram").await?.json().await?;

        Ok(result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default())
    }

    async fn check(response: reqwest::Response, name: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, "{name} API error");
        Err(Error::Stt(format!("{name} API error {status}: {body}")))
    }
}

/// ISO-639-1 primary subtag of a language tag, or `None` for "auto"
fn language_hint(language: &str) -> Option<&str> {
    let language = language.trim();
    if language.is_empty() || language.eq_ignore_ascii_case("auto") {
        return None;
    }
    language.split(['-', '_']).next()
}

/// Tries each configured provider in order until one produces text
pub struct Transcriber {
    providers: Vec<SpeechToText>,
}

impl Transcriber {
    /// Create a transcriber from an explicit provider chain
    #[must_use]
    pub const fn new(providers: Vec<SpeechToText>) -> Self {
        Self { providers }
    }

    /// Build the provider chain for the configured engine
    ///
    /// Providers without an API key are left out.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let keys = &config.api_keys;
        let language = config.speech.language.as_str();

        let whisper = keys.openai.clone().and_then(|key| {
            SpeechToText::new_whisper(key, &config.nlu.base_url).ok()
        });
        let primary = match config.speech.engine {
            SttEngine::ElevenLabs => keys
                .elevenlabs
                .clone()
                .and_then(|key| SpeechToText::new_elevenlabs(key).ok()),
            SttEngine::Deepgram => keys
                .deepgram
                .clone()
                .and_then(|key| SpeechToText::new_deepgram(key).ok()),
            SttEngine::OpenAi => None,
        };

        let providers: Vec<SpeechToText> = primary
            .into_iter()
            .chain(whisper)
            .map(|p| p.with_language(language))
            .collect();

        if providers.is_empty() {
            tracing::warn!("no speech-to-text provider has an API key");
        } else {
            tracing::info!(
                providers = ?providers.iter().map(|p| p.provider().name()).collect::<Vec<_>>(),
                "speech-to-text initialized"
            );
        }

        Self::new(providers)
    }

    /// Providers in the order they are tried
    #[must_use]
    pub fn providers(&self) -> Vec<SttProvider> {
        self.providers.iter().map(SpeechToText::provider).collect()
    }

    /// Transcribe WAV audio, returning the cleaned-up text
    ///
    /// Returns `None` when every provider fails or the transcript is empty.
    pub async fn transcribe(&self, audio: &[u8]) -> Option<String> {
        for provider in &self.providers {
            match provider.transcribe(audio).await {
                Ok(text) => {
                    let text = normalize_transcript(&text);
                    return if text.is_empty() { None } else { Some(text) };
                }
                Err(e) => {
                    tracing::error!(
                        provider = provider.provider().name(),
                        error = %e,
                        "transcription failed, trying next provider"
                    );
                }
            }
        }

        tracing::error!("speech recognition failed with every provider");
        None
    }
}
