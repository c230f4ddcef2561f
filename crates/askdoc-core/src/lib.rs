pub mod ai;
pub mod config;
pub mod controller;
pub mod state;

// Re-export main types for convenience
pub use ai::{Answer, AnswerEndpoint, AskClient, AskError};
pub use config::{Config, Overrides, Settings};
pub use controller::InteractionController;
pub use state::{Citation, Conversation, PendingRequest, Role, Turn, FALLBACK_MESSAGE};
