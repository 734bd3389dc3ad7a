//! Text-to-speech (TTS) processing

use serde::Serialize;

use super::stt::ELEVENLABS_BASE_URL;
use crate::config::Config;
use crate::emotion::{Emotion, VoiceSettings};
use crate::{Error, Result};

/// `OpenAI` voice used for the fallback provider
const OPENAI_VOICE: &str = "alloy";

/// `OpenAI` speech model used for the fallback provider
const OPENAI_TTS_MODEL: &str = "tts-1";

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    ElevenLabs,
    OpenAi,
}

impl TtsProvider {
    /// Provider name for logs
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ElevenLabs => "elevenlabs",
            Self::OpenAi => "openai",
        }
    }
}

/// Synthesizes speech through one hosted provider
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    voice: String,
    model: String,
    baseline: VoiceSettings,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `ElevenLabs`
    ///
    /// `baseline` is the voice setting used for the neutral emotion.
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(
        api_key: String,
        voice_id: String,
        model: String,
        baseline: VoiceSettings,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: ELEVENLABS_BASE_URL.to_string(),
            voice: voice_id,
            model,
            baseline,
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, base_url: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            voice: OPENAI_VOICE.to_string(),
            model: OPENAI_TTS_MODEL.to_string(),
            baseline: VoiceSettings::NEUTRAL,
            provider: TtsProvider::OpenAi,
        })
    }

    /// Override the API base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Which provider this instance talks to
    #[must_use]
    pub const fn provider(&self) -> TtsProvider {
        self.provider
    }

    /// Synthesize text to MP3 audio in the given emotion
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str, emotion: Emotion) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAi => self.synthesize_openai(text, emotion).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text, emotion).await,
        }
    }

    /// Synthesize using `OpenAI` TTS, conveying emotion through speed
    async fn synthesize_openai(&self, text: &str, emotion: Emotion) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: emotion.speaking_rate(),
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using `ElevenLabs` with the emotion's voice settings
    async fn synthesize_elevenlabs(&self, text: &str, emotion: Emotion) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            voice_settings: VoiceSettings,
        }

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            voice_settings: emotion.voice_settings(self.baseline),
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

/// Tries each configured provider in order until one produces audio
pub struct Synthesizer {
    providers: Vec<TextToSpeech>,
}

impl Synthesizer {
    /// Create a synthesizer from an explicit provider chain
    #[must_use]
    pub const fn new(providers: Vec<TextToSpeech>) -> Self {
        Self { providers }
    }

    /// `ElevenLabs` first, then `OpenAI`, skipping providers without a key
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let keys = &config.api_keys;
        let emotions = &config.emotions;

        let elevenlabs = keys.elevenlabs.clone().and_then(|key| {
            TextToSpeech::new_elevenlabs(
                key,
                emotions.voice_id.clone(),
                emotions.tts_model.clone(),
                emotions.baseline,
            )
            .ok()
        });
        let openai = keys
            .openai
            .clone()
            .and_then(|key| TextToSpeech::new_openai(key, &config.nlu.base_url).ok());

        let providers: Vec<TextToSpeech> = elevenlabs.into_iter().chain(openai).collect();
        if providers.is_empty() {
            tracing::warn!("no text-to-speech provider has an API key");
        }

        Self::new(providers)
    }

    /// Providers in the order they are tried
    #[must_use]
    pub fn providers(&self) -> Vec<TtsProvider> {
        self.providers.iter().map(TextToSpeech::provider).collect()
    }

    /// Synthesize text, returning `None` when every provider fails
    pub async fn synthesize(&self, text: &str, emotion: Emotion) -> Option<Vec<u8>> {
        for provider in &self.providers {
            match provider.synthesize(text, emotion).await {
                Ok(audio) => {
                    tracing::debug!(
                        provider = provider.provider().name(),
                        %emotion,
                        audio_bytes = audio.len(),
                        "speech synthesized"
                    );
                    return Some(audio);
                }
                Err(e) => {
                    tracing::error!(
                        provider = provider.provider().name(),
                        error = %e,
                        "speech synthesis failed, trying next provider"
                    );
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKeys;

    #[test]
    fn test_chain_prefers_elevenlabs() {
        let mut config = Config {
            api_keys: ApiKeys {
                openai: Some("sk-test".to_string()),
                elevenlabs: Some("el-test".to_string()),
                deepgram: None,
            },
            ..Config::default()
        };
        assert_eq!(
            Synthesizer::from_config(&config).providers(),
            vec![TtsProvider::ElevenLabs, TtsProvider::OpenAi]
        );

        config.api_keys.elevenlabs = None;
        assert_eq!(
            Synthesizer::from_config(&config).providers(),
            vec![TtsProvider::OpenAi]
        );
    }

    #[tokio::test]
    async fn test_no_providers_yields_nothing() {
        let synthesizer = Synthesizer::new(Vec::new());
        assert!(synthesizer.synthesize("hello", Emotion::Happy).await.is_none());
    }
}
