//! Emotive Voicebot - an emotional voice assistant
//!
//! This library provides the pieces of a spoken conversation loop:
//! - Voice capture, end-of-utterance detection, STT and emotional TTS
//! - Language understanding via an `OpenAI`-compatible chat model
//! - An agent that remembers the conversation and decides on actions
//! - Tool invocation over HTTP or WebSocket MCP endpoints
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Voicebot                          │
//! │   Listen  │  Agent  │  MCP client  │  Speak         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │   Voice (mic, STT, TTS, speakers)  │  NLU (LLM)     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod bot;
pub mod config;
pub mod emotion;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod nlu;
pub mod voice;

pub use bot::{Heard, Listen, Speak, Voicebot};
pub use config::Config;
pub use emotion::Emotion;
pub use error::{Error, Result};
