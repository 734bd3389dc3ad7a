//! Natural language understanding
//!
//! Turns transcripts into intents and entities, and phrases the agent's
//! replies, using a chat model and a rolling conversation context.

mod context;
mod engine;
mod intent;

pub use context::{ConversationContext, ConversationMessage, Role};
pub use engine::{FALLBACK_RESPONSE, NluEngine, ResponseGoal, TROUBLE_RESPONSE, Understanding};
pub use intent::{Entities, Intent, entity_str};
