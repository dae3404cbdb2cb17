pub mod controller;

pub use controller::{ComposeState, ConversationController, ConversationEvent};
