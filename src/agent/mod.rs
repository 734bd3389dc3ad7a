//! Conversational agent
//!
//! Remembers the conversation, decides which action a turn calls for and
//! phrases replies through the NLU engine.

mod decision;
mod memory;
mod reasoning;

pub use decision::{ACTION_CATALOGUE, ActionSpec, DecisionEngine, fetch_information};
pub use memory::{AgentMemory, MEMORY_CAPACITY, MemoryEntry};
pub use reasoning::{Agent, Decision, GREETING};
