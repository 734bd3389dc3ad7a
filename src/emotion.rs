//! Emotions and the voice settings that express them

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Emotion attached to a spoken response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Angry,
    Surprised,
    Concerned,
}

impl Emotion {
    /// All supported emotions
    pub const ALL: [Self; 6] = [
        Self::Neutral,
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Surprised,
        Self::Concerned,
    ];

    /// Resolve a label to an emotion
    ///
    /// Agent state labels ("greeting", "error", ...) map to their emotion first,
    /// then emotion names are matched. Anything else is neutral.
    #[must_use]
    pub fn resolve(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return Self::default();
        };
        let label = label.trim().to_lowercase();

        Self::from_state(&label)
            .or_else(|| label.parse().ok())
            .unwrap_or_default()
    }

    /// Map an agent state label to an emotion
    fn from_state(state: &str) -> Option<Self> {
        match state {
            "greeting" | "success" => Some(Self::Happy),
            "information" => Some(Self::Neutral),
            "error" | "warning" => Some(Self::Concerned),
            "apology" => Some(Self::Sad),
            _ => None,
        }
    }

    /// Lowercase name of the emotion
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Surprised => "surprised",
            Self::Concerned => "concerned",
        }
    }

    /// Voice settings for this emotion, with `baseline` used for neutral
    #[must_use]
    pub const fn voice_settings(self, baseline: VoiceSettings) -> VoiceSettings {
        match self {
            Self::Neutral => baseline,
            Self::Happy => VoiceSettings::new(0.65, 0.75, 0.3),
            Self::Sad => VoiceSettings::new(0.85, 0.65, 0.1),
            Self::Angry => VoiceSettings::new(0.55, 0.85, 0.4),
            Self::Surprised => VoiceSettings::new(0.6, 0.8, 0.3),
            Self::Concerned => VoiceSettings::new(0.8, 0.7, 0.2),
        }
    }

    /// Speaking rate for providers without expressive voice settings
    #[must_use]
    pub const fn speaking_rate(self) -> f32 {
        match self {
            Self::Sad | Self::Concerned => 0.9,
            Self::Happy | Self::Surprised | Self::Angry => 1.1,
            Self::Neutral => 1.0,
        }
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown emotion: {s}"))
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `ElevenLabs` voice settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl VoiceSettings {
    /// Settings for a calm, neutral delivery
    pub const NEUTRAL: Self = Self::new(0.75, 0.75, 0.0);

    const fn new(stability: f32, similarity_boost: f32, style: f32) -> Self {
        Self {
            stability,
            similarity_boost,
            style,
            use_speaker_boost: true,
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::NEUTRAL
    }
}
