//! Conversation log and the bounded context window
//!
//! Turn 0 of a seeded conversation is the local greeting. It is rendered
//! but never sent back to the model.

use serde::{Deserialize, Serialize};

/// Prior turns submitted alongside a new prompt (3 user/assistant pairs)
pub const DEFAULT_WINDOW: usize = 6;

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role name on the Gemini wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

/// Append-only conversation log
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh conversation holding only the greeting
    pub fn seeded(greeting: &str) -> Self {
        Self {
            turns: vec![Turn::assistant(greeting)],
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Record a completed exchange
    pub fn push_exchange(&mut self, prompt: &str, reply: &str) {
        self.turns.push(Turn::user(prompt));
        self.turns.push(Turn::assistant(reply));
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Turns after the greeting (or all turns if the log was never seeded)
    fn prior_turns(&self) -> &[Turn] {
        match self.turns.first() {
            Some(first) if first.role == Role::Assistant => &self.turns[1..],
            _ => &self.turns,
        }
    }
}

/// Sizing rule for the context window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    size: usize,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self { size: DEFAULT_WINDOW }
    }
}

impl HistoryWindow {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Most recent prior turns plus the pending prompt, oldest first.
    ///
    /// The greeting is skipped. The conversation is only read.
    pub fn window_for(&self, conversation: &Conversation, new_prompt: &str) -> Vec<Turn> {
        let prior = conversation.prior_turns();
        let start = prior.len().saturating_sub(self.size);

        let mut window = Vec::with_capacity(prior.len() - start + 1);
        window.extend_from_slice(&prior[start..]);
        window.push(Turn::user(new_prompt));
        window
    }
}

/// `HistoryWindow::default().window_for(..)`
pub fn window_for(conversation: &Conversation, new_prompt: &str) -> Vec<Turn> {
    HistoryWindow::default().window_for(conversation, new_prompt)
}
