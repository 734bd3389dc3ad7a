//! Voicebot orchestration
//!
//! One turn: listen, understand, decide, optionally act, then speak.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use crate::agent::{Agent, GREETING};
use crate::config::Config;
use crate::emotion::Emotion;
use crate::llm::OpenAiChat;
use crate::mcp::{ActionResult, McpClient};
use crate::nlu::NluEngine;
use crate::voice::{AudioPlayback, MicrophoneListener, Synthesizer, Transcriber};
use crate::{Error, Result};

/// Pause between turns
const TURN_PAUSE: Duration = Duration::from_millis(500);

/// Longest wait between retries after consecutive failed turns
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Wait before the next turn after `failures` consecutive errors
///
/// Starts at the turn pause and doubles per failure up to [`MAX_RETRY_BACKOFF`]
fn retry_backoff(failures: u32) -> Duration {
    let factor = 1u32 << failures.saturating_sub(1).min(6);
    TURN_PAUSE.saturating_mul(factor).min(MAX_RETRY_BACKOFF)
}

/// What one listen call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Heard {
    /// The user said something
    Utterance(String),
    /// Nothing usable was heard
    Silence,
    /// The input is exhausted
    EndOfInput,
}

/// Source of user utterances
#[async_trait(?Send)]
pub trait Listen {
    /// Wait for the next utterance
    async fn listen(&mut self) -> Result<Heard>;

    /// Release the input
    async fn close(&mut self) {}
}

/// Sink for spoken replies
#[async_trait(?Send)]
pub trait Speak {
    /// Say `text` in the given emotion; returns whether it was delivered
    async fn speak(&mut self, text: &str, emotion: Emotion) -> bool;

    /// Release the output
    async fn close(&mut self) {}
}

/// Microphone input transcribed by the hosted STT chain
pub struct VoiceInput {
    listener: MicrophoneListener,
    transcriber: Transcriber,
}

impl VoiceInput {
    #[must_use]
    pub const fn new(listener: MicrophoneListener, transcriber: Transcriber) -> Self {
        Self {
            listener,
            transcriber,
        }
    }
}

#[async_trait(?Send)]
impl Listen for VoiceInput {
    async fn listen(&mut self) -> Result<Heard> {
        let Some(wav) = self.listener.listen().await? else {
            return Ok(Heard::Silence);
        };

        Ok(match self.transcriber.transcribe(&wav).await {
            Some(text) => Heard::Utterance(text),
            None => Heard::Silence,
        })
    }

    async fn close(&mut self) {
        self.listener.stop();
        tracing::info!("speech recognizer closed");
    }
}

/// Emotional speech through the hosted TTS chain and the speakers
pub struct VoiceOutput {
    synthesizer: Synthesizer,
    playback: AudioPlayback,
}

impl VoiceOutput {
    #[must_use]
    pub const fn new(synthesizer: Synthesizer, playback: AudioPlayback) -> Self {
        Self {
            synthesizer,
            playback,
        }
    }
}

#[async_trait(?Send)]
impl Speak for VoiceOutput {
    async fn speak(&mut self, text: &str, emotion: Emotion) -> bool {
        if text.trim().is_empty() {
            tracing::warn!("empty text provided for speech synthesis");
            return false;
        }

        let Some(audio) = self.synthesizer.synthesize(text, emotion).await else {
            tracing::error!("all speech synthesis providers failed");
            return false;
        };

        match self.playback.play_mp3(&audio).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "failed to play synthesized speech");
                false
            }
        }
    }
    async fn close(&mut self) {
        tracing::info!("speech synthesizer closed");
    }
}

/// Line-based input, one utterance per line
pub struct ConsoleInput<R> {
    lines: Lines<R>,
}

impl ConsoleInput<BufReader<tokio::io::Stdin>> {
    /// Read utterances from standard input
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> ConsoleInput<R> {
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait(?Send)]
impl<R: AsyncBufRead + Unpin> Listen for ConsoleInput<R> {
    async fn listen(&mut self) -> Result<Heard> {
        Ok(match self.lines.next_line().await? {
            Some(line) if line.trim().is_empty() => Heard::Silence,
            Some(line) => Heard::Utterance(line.trim().to_string()),
            None => Heard::EndOfInput,
        })
    }
}

/// Writes replies as `[emotion] text` lines
pub struct ConsoleOutput<W> {
    writer: W,
}

impl ConsoleOutput<tokio::io::Stdout> {
    /// Write replies to standard output
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin> ConsoleOutput<W> {
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait(?Send)]
impl<W: AsyncWrite + Unpin> Speak for ConsoleOutput<W> {
    async fn speak(&mut self, text: &str, emotion: Emotion) -> bool {
        if text.trim().is_empty() {
            tracing::warn!("empty text provided for speech synthesis");
            return false;
        }

        let line = format!("[{emotion}] {text}\n");
        let written = self.writer.write_all(line.as_bytes()).await;
        match written.and(self.writer.flush().await) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "failed to write reply");
                false
            }
        }
    }
}

/// Build the agent from configuration
///
/// # Errors
///
/// Returns error if the `OpenAI` key is missing
pub fn agent_from_config(config: &Config) -> Result<Agent> {
    let api_key = config
        .api_keys
        .openai
        .clone()
        .ok_or_else(|| Error::Config("OPENAI_API_KEY is required".to_string()))?;
    let model = OpenAiChat::from_config(api_key, &config.nlu)?;
    let nlu = NluEngine::new(Arc::new(model), config.nlu.clone());
    Ok(Agent::new(nlu, &config.agent))
}

/// Coordinates input, agent, tools and output
pub struct Voicebot<L, S> {
    input: L,
    output: S,
    agent: Agent,
    mcp: McpClient,
    turn_pause: Duration,
}

impl<L: Listen, S: Speak> Voicebot<L, S> {
    /// Assemble a voicebot from its parts
    pub fn new(input: L, output: S, agent: Agent, mcp: McpClient) -> Self {
        tracing::info!("voicebot initialized");
        Self {
            input,
            output,
            agent,
            mcp,
            turn_pause: TURN_PAUSE,
        }
    }

    /// Override the pause between turns
    #[must_use]
    pub const fn with_turn_pause(mut self, pause: Duration) -> Self {
        self.turn_pause = pause;
        self
    }

    /// Speak the start-up greeting
    pub async fn greet(&mut self) -> bool {
        self.say(GREETING, Emotion::resolve(Some("greeting"))).await
    }

    /// Run until SIGINT, SIGTERM or end of input
    pub async fn start(&mut self) {
        self.run_until(shutdown_signal()).await;
    }

    /// Greet, then run turns until `shutdown` resolves or the input ends
    pub async fn run_until<F: Future<Output = ()>>(&mut self, shutdown: F) {
        tracing::info!("starting voicebot");
        self.greet().await;

        tokio::pin!(shutdown);
        let mut failures = 0u32;
        loop {
            let turn = tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                turn = self.turn() => turn,
            };

            match turn {
                Ok(true) => failures = 0,
                Ok(false) => {
                    tracing::info!("input closed");
                    break;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let backoff = retry_backoff(failures);
                    tracing::error!(
                        error = %e,
                        failures,
                        retry_in = ?backoff,
                        "error in voicebot turn"
                    );
                    tokio::select! {
                        () = &mut shutdown => {
                            tracing::info!("shutdown requested");
                            break;
                        }
                        () = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    /// Run one listen-respond cycle; returns `false` when the input has ended
    ///
    /// # Errors
    ///
    /// Returns error if the input fails
    pub async fn turn(&mut self) -> Result<bool> {
        tracing::info!("listening for speech");
        let text = match self.input.listen().await? {
            Heard::Utterance(text) => text,
            Heard::Silence => return Ok(true),
            Heard::EndOfInput => return Ok(false),
        };
        tracing::info!(text = %text, "recognized");

        if let Some((response, emotion)) = self.respond(&text).await {
            self.say(&response, emotion).await;
        }

        tokio::time::sleep(self.turn_pause).await;
        Ok(true)
    }

    /// Produce the reply to an utterance, executing any action it calls for
    pub async fn respond(&mut self, text: &str) -> Option<(String, Emotion)> {
        let understanding = self.agent.understand(text).await;
        let decision = self
            .agent
            .decide(&understanding.intent, &understanding.entities)
            .await;

        let (response, emotion) = match decision.action {
            Some(action) => {
                tracing::info!(action = %action.action_type, "executing action");
                let result = match self.agent.decisions().validate_action(&action) {
                    Ok(()) => self.mcp.execute(&action).await,
                    Err(reason) => {
                        tracing::warn!(reason = %reason, "rejected invalid action");
                        ActionResult::failure(reason)
                    }
                };
                self.agent.handle_result(&result).await
            }
            None => (decision.response, decision.emotion),
        };

        (!response.is_empty()).then_some((response, emotion))
    }

    async fn say(&mut self, text: &str, emotion: Emotion) -> bool {
        tracing::info!(%emotion, text = %text, "speaking");
        self.output.speak(text, emotion).await
    }

    /// Close the input, output and tool connection
    pub async fn stop(&mut self) {
        tracing::info!("stopping voicebot");
        self.input.close().await;
        self.output.close().await;
        self.mcp.close().await;
        tracing::info!("Voicebot stopped");
    }

    /// The agent driving the conversation
    #[must_use]
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The output sink
    #[must_use]
    pub const fn output(&self) -> &S {
        &self.output
    }

    /// Take the voicebot apart, returning its output sink
    pub fn into_output(self) -> S {
        self.output
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
