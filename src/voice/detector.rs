//! Utterance detection
//!
//! Energy-based end-pointing: a phrase starts when the RMS energy of a chunk
//! crosses the threshold and ends after enough trailing silence.

use std::time::Duration;

use crate::config::SpeechConfig;

/// Ambient energy multiplier applied during calibration
const CALIBRATION_FACTOR: f32 = 1.5;

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech to start
    Waiting,
    /// Inside a phrase, accumulating samples
    Speaking,
}

/// Outcome of feeding a chunk to the detector
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
    /// No speech yet
    Waiting,
    /// A phrase is in progress
    Speaking,
    /// A phrase finished; carries its samples
    Complete(Vec<f32>),
    /// No speech started within the timeout
    TimedOut,
}

/// Detects spoken phrases in a stream of audio chunks
#[derive(Debug)]
pub struct UtteranceDetector {
    floor: f32,
    threshold: f32,
    timeout_samples: usize,
    min_speech_samples: usize,
    silence_samples: usize,
    max_phrase_samples: usize,
    state: DetectorState,
    speech_buffer: Vec<f32>,
    speech_counter: usize,
    silence_counter: usize,
    waited: usize,
}

impl UtteranceDetector {
    /// Create a detector from the speech settings
    #[must_use]
    pub fn new(config: &SpeechConfig) -> Self {
        let rate = config.sample_rate;
        Self {
            floor: config.energy_threshold,
            threshold: config.energy_threshold,
            timeout_samples: samples_for(config.timeout, rate),
            min_speech_samples: samples_for(config.phrase_threshold, rate),
            silence_samples: samples_for(config.non_speaking_duration, rate).max(1),
            max_phrase_samples: samples_for(config.phrase_time_limit, rate).max(1),
            state: DetectorState::Waiting,
            speech_buffer: Vec::new(),
            speech_counter: 0,
            silence_counter: 0,
            waited: 0,
        }
    }

    /// Adjust the threshold to the ambient noise level
    ///
    /// The threshold never drops below the configured floor.
    pub fn calibrate(&mut self, ambient: &[f32]) -> f32 {
        let ambient_energy = calculate_energy(ambient);
        self.threshold = self.floor.max(ambient_energy * CALIBRATION_FACTOR);
        tracing::debug!(
            ambient_energy,
            threshold = self.threshold,
            "calibrated energy threshold"
        );
        self.threshold
    }

    /// Feed a chunk of samples
    pub fn process(&mut self, samples: &[f32]) -> DetectorEvent {
        let energy = calculate_energy(samples);
        let is_speech = !samples.is_empty() && energy > self.threshold;

        match self.state {
            DetectorState::Waiting => {
                if is_speech {
                    self.state = DetectorState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.speech_counter = samples.len();
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech detected");
                    return self.check_phrase_limit();
                }

                self.waited += samples.len();
                if self.waited >= self.timeout_samples {
                    self.reset();
                    return DetectorEvent::TimedOut;
                }
                DetectorEvent::Waiting
            }
            DetectorState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.speech_counter += samples.len();
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if let event @ DetectorEvent::Complete(_) = self.check_phrase_limit() {
                    return event;
                }

                if self.silence_counter >= self.silence_samples {
                    if self.speech_counter >= self.min_speech_samples {
                        tracing::debug!(
                            samples = self.speech_buffer.len(),
                            "speech segment complete"
                        );
                        return self.complete();
                    }

                    // Too short to be a phrase
                    tracing::trace!(samples = self.speech_counter, "discarding short burst");
                    self.waited += self.speech_buffer.len();
                    self.state = DetectorState::Waiting;
                    self.speech_buffer.clear();
                    self.speech_counter = 0;
                    self.silence_counter = 0;
                    return DetectorEvent::Waiting;
                }

                DetectorEvent::Speaking
            }
        }
    }

    fn check_phrase_limit(&mut self) -> DetectorEvent {
        if self.speech_buffer.len() >= self.max_phrase_samples {
            tracing::debug!("phrase time limit reached");
            self.speech_buffer.truncate(self.max_phrase_samples);
            return self.complete();
        }
        DetectorEvent::Speaking
    }

    fn complete(&mut self) -> DetectorEvent {
        let phrase = std::mem::take(&mut self.speech_buffer);
        self.reset();
        DetectorEvent::Complete(phrase)
    }

    /// Reset detector to the waiting state
    pub fn reset(&mut self) {
        self.state = DetectorState::Waiting;
        self.speech_buffer.clear();
        self.speech_counter = 0;
        self.silence_counter = 0;
        self.waited = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }

    /// Current energy threshold
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SpeechConfig {
        // 100 samples per second keeps the arithmetic readable
        SpeechConfig {
            sample_rate: 100,
            timeout: Duration::from_secs(1),
            phrase_threshold: Duration::from_millis(300),
            non_speaking_duration: Duration::from_millis(500),
            phrase_time_limit: Duration::from_secs(2),
            energy_threshold: 0.1,
            ..SpeechConfig::default()
        }
    }

    fn loud(n: usize) -> Vec<f32> {
        vec![0.5; n]
    }

    fn quiet(n: usize) -> Vec<f32> {
        vec![0.0; n]
    }

    #[test]
    fn test_energy_calculation() {
        assert!(calculate_energy(&quiet(100)) < 0.001);
        assert!(calculate_energy(&loud(100)) > 0.4);
        assert!(calculate_energy(&[]).abs() < f32::EPSILON);
    }

    #[test]
    fn test_phrase_completes_after_silence() {
        let mut detector = UtteranceDetector::new(&config());

        assert_eq!(detector.process(&quiet(10)), DetectorEvent::Waiting);
        assert_eq!(detector.process(&loud(40)), DetectorEvent::Speaking);
        assert_eq!(detector.state(), DetectorState::Speaking);
        assert_eq!(detector.process(&quiet(30)), DetectorEvent::Speaking);

        match detector.process(&quiet(20)) {
            DetectorEvent::Complete(samples) => assert_eq!(samples.len(), 90),
            other => panic!("expected complete phrase, got {other:?}"),
        }
        assert_eq!(detector.state(), DetectorState::Waiting);
    }

    #[test]
    fn test_short_burst_is_discarded() {
        let mut detector = UtteranceDetector::new(&config());

        assert_eq!(detector.process(&loud(10)), DetectorEvent::Speaking);
        assert_eq!(detector.process(&quiet(50)), DetectorEvent::Waiting);
        assert_eq!(detector.state(), DetectorState::Waiting);
    }

    #[test]
    fn test_times_out_without_speech() {
        let mut detector = UtteranceDetector::new(&config());

        assert_eq!(detector.process(&quiet(60)), DetectorEvent::Waiting);
        assert_eq!(detector.process(&quiet(40)), DetectorEvent::TimedOut);
    }

    #[test]
    fn test_phrase_time_limit_truncates() {
        let mut detector = UtteranceDetector::new(&config());

        assert_eq!(detector.process(&loud(150)), DetectorEvent::Speaking);
        match detector.process(&loud(100)) {
            DetectorEvent::Complete(samples) => assert_eq!(samples.len(), 200),
            other => panic!("expected truncated phrase, got {other:?}"),
        }
    }

    #[test]
    fn test_calibration_respects_floor() {
        let mut detector = UtteranceDetector::new(&config());

        assert!((detector.calibrate(&quiet(100)) - 0.1).abs() < f32::EPSILON);
        assert!((detector.calibrate(&vec![0.2; 100]) - 0.3).abs() < 1e-4);

        // Speech below the calibrated threshold no longer counts
        assert_eq!(detector.process(&vec![0.25; 10]), DetectorEvent::Waiting);
    }
}
