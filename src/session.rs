//! Chat session owned by the host
//!
//! Holds the conversation, the selected model and the (optional) client.
//! A turn goes through three steps so the host can run the network call
//! off its event loop:
//!
//! - `prepare`: validate the prompt and snapshot the context window
//! - `PendingTurn::execute`: run the retrying completion call
//! - `record`: apply the outcome to the conversation

use thiserror::Error;

use crate::client::CompletionProvider;
use crate::completion::{AdvisorySink, RetryingClient};
use crate::error::CallFailure;
use crate::history::{Conversation, HistoryWindow, Turn};
use crate::models::SupportedModel;
use crate::prompt::{self, GREETING};

/// Prompt rejected before any call was made
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("a reply is still being generated")]
    Busy,
}

/// What `record` did with an outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    /// Exchange appended; holds the assistant text that was stored
    Appended(String),
    /// Nothing to show (empty reply or exhausted retries)
    Dropped,
}

/// A validated prompt waiting for its reply
pub struct PendingTurn<P> {
    prompt: String,
    context: Vec<Turn>,
    model: SupportedModel,
    system_instruction: String,
    client: Option<RetryingClient<P>>,
}

impl<P: CompletionProvider> PendingTurn<P> {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Context window submitted with this turn
    pub fn context(&self) -> &[Turn] {
        &self.context
    }

    pub fn model(&self) -> SupportedModel {
        self.model
    }

    /// Call the model; without a client this fails fast with `NotInitialized`
    pub async fn execute(&self, sink: &dyn AdvisorySink) -> Result<String, CallFailure> {
        match &self.client {
            Some(client) => {
                client
                    .complete(self.model.id(), &self.system_instruction, &self.context, sink)
                    .await
            }
            None => {
                tracing::warn!("completion requested before the client was initialized");
                Err(CallFailure::NotInitialized)
            }
        }
    }
}

pub struct ChatSession<P> {
    id: String,
    model: SupportedModel,
    conversation: Conversation,
    client: Option<RetryingClient<P>>,
    window: HistoryWindow,
    system_instruction: String,
    busy: bool,
}

impl<P: CompletionProvider> ChatSession<P> {
    /// Uninitialized session: empty conversation, no client
    pub fn new(model: SupportedModel, window: HistoryWindow) -> Self {
        Self {
            id: generate_session_id(),
            model,
            conversation: Conversation::new(),
            client: None,
            window,
            system_instruction: prompt::system_instruction(),
            busy: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> SupportedModel {
        self.model
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_initialized(&self) -> bool {
        self.client.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Install a client for `model` and seed the greeting.
    ///
    /// No-op (returns false) when already initialized with the same model
    /// or while a call is in flight.
    pub fn attach(&mut self, client: RetryingClient<P>, model: SupportedModel) -> bool {
        if self.busy || (self.client.is_some() && self.model == model) {
            return false;
        }
        self.client = Some(client);
        self.model = model;
        self.restart();
        tracing::info!(session = %self.id, model = %model, "chat initialized");
        true
    }

    /// Switch model; the conversation starts over. Refused while busy.
    pub fn select_model(&mut self, model: SupportedModel) -> bool {
        if self.busy || self.model == model {
            return false;
        }
        self.model = model;
        if self.client.is_some() {
            self.restart();
        }
        tracing::info!(session = %self.id, model = %model, "model changed");
        true
    }

    /// Drop the conversation and the client; the host re-attaches.
    ///
    /// A running call is never cancelled, so this is refused while busy.
    pub fn reset(&mut self) -> bool {
        if self.busy {
            tracing::debug!(session = %self.id, "reset ignored, call in flight");
            return false;
        }
        self.conversation.clear();
        self.client = None;
        tracing::info!(session = %self.id, "session reset");
        true
    }

    fn restart(&mut self) {
        self.conversation = Conversation::seeded(GREETING);
    }

    /// Validate `prompt` and snapshot its context window
    pub fn prepare(&mut self, prompt: &str) -> Result<PendingTurn<P>, SubmitError> {
        if prompt.trim().is_empty() {
            return Err(SubmitError::EmptyPrompt);
        }
        if self.busy {
            return Err(SubmitError::Busy);
        }

        let context = self.window.window_for(&self.conversation, prompt);
        self.busy = true;

        Ok(PendingTurn {
            prompt: prompt.to_string(),
            context,
            model: self.model,
            system_instruction: self.system_instruction.clone(),
            client: self.client.clone(),
        })
    }

    /// Apply a finished call to the conversation.
    ///
    /// Non-empty replies and fallback strings are appended with their prompt;
    /// empty replies and exhausted retries leave the conversation untouched.
    pub fn record(
        &mut self,
        pending: PendingTurn<P>,
        outcome: &Result<String, CallFailure>,
    ) -> Recorded {
        self.busy = false;

        let reply = match outcome {
            Ok(text) => Some(text.as_str()),
            Err(failure) => failure.fallback_text(),
        };

        match reply {
            Some(text) if !text.is_empty() => {
                self.conversation.push_exchange(&pending.prompt, text);
                Recorded::Appended(text.to_string())
            }
            _ => Recorded::Dropped,
        }
    }

    /// `prepare`, `execute` and `record` in one go
    pub async fn submit(
        &mut self,
        prompt: &str,
        sink: &dyn AdvisorySink,
    ) -> Result<(Recorded, Result<String, CallFailure>), SubmitError> {
        let pending = self.prepare(prompt)?;
        let outcome = pending.execute(sink).await;
        let recorded = self.record(pending, &outcome);
        Ok((recorded, outcome))
    }
}

/// Short random id shown in the UI
fn generate_session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
