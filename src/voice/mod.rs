//! Voice processing module
//!
//! Handles audio capture, utterance detection, speech recognition,
//! speech synthesis and playback.

mod capture;
mod detector;
mod devices;
mod listener;
mod playback;
mod stt;
mod transcript;
mod tts;

pub use capture::{AudioCapture, samples_to_wav};
pub use detector::{DetectorEvent, DetectorState, UtteranceDetector, calculate_energy};
pub use devices::{DeviceInfo, DeviceList, list_devices};
pub use listener::MicrophoneListener;
pub use playback::{AudioPlayback, DecodedAudio, apply_volume, decode_mp3, resample};
pub use stt::{DEEPGRAM_BASE_URL, ELEVENLABS_BASE_URL, SpeechToText, SttProvider, Transcriber};
pub use transcript::normalize_transcript;
pub use tts::{Synthesizer, TextToSpeech, TtsProvider};
