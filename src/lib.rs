//! pyeonan - Rust-native mental health coach chat
//!
//! Core pieces are usable without the terminal host:
//! - `history`: conversation log and bounded context window
//! - `completion`: retrying completion client with exponential backoff
//! - `session`: host-owned chat session tying the two together

pub mod client;
pub mod completion;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod models;
pub mod prompt;
pub mod retry;
pub mod session;

pub use client::{CompletionProvider, GeminiClient};
pub use completion::{complete, Advisory, AdvisorySink, RetryingClient, Severity};
pub use error::{CallFailure, ProviderError};
pub use history::{window_for, Conversation, HistoryWindow, Role, Turn};
pub use models::SupportedModel;
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use session::{ChatSession, PendingTurn, Recorded, SubmitError};
