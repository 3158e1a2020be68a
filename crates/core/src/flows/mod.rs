pub mod engine;
pub mod prompts;
pub mod states;

pub use engine::ConversationEngine;
pub use states::{ConversationState, Input, Outbound, TransitionOutcome};
