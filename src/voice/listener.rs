//! Microphone listening: capture plus utterance detection

use std::time::{Duration, Instant};

use super::capture::{AudioCapture, samples_to_wav};
use super::detector::{DetectorEvent, UtteranceDetector};
use crate::Result;
use crate::config::{AudioConfig, SpeechConfig};

/// How often the capture buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Records one spoken phrase at a time from the microphone
pub struct MicrophoneListener {
    capture: AudioCapture,
    detector: UtteranceDetector,
    calibration: Duration,
    max_wait: Duration,
    calibrated: bool,
}

impl MicrophoneListener {
    /// Open the configured input device
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened
    pub fn new(speech: &SpeechConfig, audio: &AudioConfig) -> Result<Self> {
        let capture = AudioCapture::new(audio.input_device.as_deref(), speech.sample_rate)?;

        Ok(Self {
            capture,
            detector: UtteranceDetector::new(speech),
            calibration: speech.calibration,
            // Wall-clock bound in case the device stops delivering samples
            max_wait: speech.timeout + speech.phrase_time_limit + Duration::from_secs(1),
            calibrated: false,
        })
    }

    /// Measure ambient noise and set the speech threshold from it
    ///
    /// # Errors
    ///
    /// Returns error if capture cannot be started
    pub async fn calibrate(&mut self) -> Result<f32> {
        self.capture.start()?;
        self.capture.clear_buffer();

        tracing::info!(
            seconds = self.calibration.as_secs_f32(),
            "adjusting for ambient noise"
        );
        tokio::time::sleep(self.calibration).await;

        let ambient = self.capture.take_buffer();
        let threshold = self.detector.calibrate(&ambient);
        self.calibrated = true;

        tracing::info!(threshold, "microphone calibrated");
        Ok(threshold)
    }

    /// Wait for one phrase and return it as WAV bytes
    ///
    /// Returns `None` when no speech starts before the timeout.
    ///
    /// # Errors
    ///
    /// Returns error if capture or WAV encoding fails
    pub async fn listen(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.calibrated {
            self.calibrate().await?;
        }
        self.capture.start()?;
        self.capture.clear_buffer();
        self.detector.reset();

        tracing::info!("listening");
        let started = Instant::now();

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            match self.detector.process(&self.capture.take_buffer()) {
                DetectorEvent::Complete(samples) => {
                    tracing::debug!(samples = samples.len(), "phrase captured");
                    return samples_to_wav(&samples, self.capture.sample_rate()).map(Some);
                }
                DetectorEvent::TimedOut => {
                    tracing::info!("no speech detected within timeout period");
                    return Ok(None);
                }
                DetectorEvent::Waiting | DetectorEvent::Speaking => {}
            }

            if started.elapsed() > self.max_wait {
                tracing::warn!("microphone delivered too little audio, giving up");
                self.detector.reset();
                return Ok(None);
            }
        }
    }

    /// Stop the input stream
    pub fn stop(&mut self) {
        self.capture.stop();
    }

    /// Sample rate of the captured audio
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.capture.sample_rate()
    }
}
