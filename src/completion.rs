//! Retrying completion client
//!
//! Drives one logical completion call: attempts run sequentially, only rate
//! limits are retried, and every failure is converted to a `CallFailure` at
//! this boundary. Progress is reported to the host as `Advisory` values.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::client::CompletionProvider;
use crate::error::{CallFailure, ProviderError};
use crate::history::Turn;
use crate::retry::{RetryDecision, RetryPolicy, Sleeper, TokioSleeper};

/// How loudly the host should show an advisory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Side-channel message for the host while a call is running
#[derive(Debug, Clone, PartialEq)]
pub enum Advisory {
    /// Rate limited; attempt `attempt` (1-based) failed, next one after `delay`
    RetryScheduled {
        attempt: u32,
        max_retries: u32,
        delay: Duration,
    },
    /// Rate limit ceiling reached
    RateLimitExceeded,
    ProviderError(String),
    UnexpectedError(String),
}

impl Advisory {
    pub fn severity(&self) -> Severity {
        match self {
            Advisory::RetryScheduled { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Text shown to the user
    pub fn message(&self) -> String {
        match self {
            Advisory::RetryScheduled { attempt, max_retries, delay } => format!(
                "⚠️ API 요청 제한(429)으로 인해 {:.1}초 후 재시도합니다. (시도: {}/{})",
                delay.as_secs_f64(),
                attempt,
                max_retries
            ),
            Advisory::RateLimitExceeded => {
                "죄송합니다. 현재 API 요청 제한을 초과했습니다. 잠시 후 다시 시도해 주세요.".into()
            }
            Advisory::ProviderError(e) => format!("API 오류 발생: {}", e),
            Advisory::UnexpectedError(e) => format!("예상치 못한 오류 발생: {}", e),
        }
    }
}

/// Receives advisories from a running call
pub trait AdvisorySink: Send + Sync {
    fn advise(&self, advisory: Advisory);
}

impl AdvisorySink for mpsc::UnboundedSender<Advisory> {
    fn advise(&self, advisory: Advisory) {
        // Host may have gone away mid-call; nothing left to tell.
        let _ = self.send(advisory);
    }
}

/// Keeps every advisory, in order
#[derive(Debug, Default)]
pub struct CollectingSink {
    seen: Mutex<Vec<Advisory>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advisories(&self) -> Vec<Advisory> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl AdvisorySink for CollectingSink {
    fn advise(&self, advisory: Advisory) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(advisory);
        }
    }
}

/// Provider plus retry policy; cheap to clone into a spawned task
pub struct RetryingClient<P> {
    provider: Arc<P>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

impl<P> Clone for RetryingClient<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            sleeper: Arc::clone(&self.sleeper),
            policy: self.policy,
        }
    }
}

impl<P: CompletionProvider> RetryingClient<P> {
    pub fn new(provider: P, policy: RetryPolicy) -> Self {
        Self {
            provider: Arc::new(provider),
            sleeper: Arc::new(TokioSleeper),
            policy,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run one completion call to a terminal state
    pub async fn complete(
        &self,
        model: &str,
        system_instruction: &str,
        context: &[Turn],
        sink: &dyn AdvisorySink,
    ) -> Result<String, CallFailure> {
        complete(
            self.provider.as_ref(),
            self.sleeper.as_ref(),
            sink,
            model,
            system_instruction,
            context,
            self.policy,
        )
        .await
    }
}

/// Run attempts until success, a terminal error, or the retry ceiling.
///
/// With `policy.max_retries == 0` no attempt is made.
pub async fn complete(
    provider: &dyn CompletionProvider,
    sleeper: &dyn Sleeper,
    sink: &dyn AdvisorySink,
    model: &str,
    system_instruction: &str,
    context: &[Turn],
    policy: RetryPolicy,
) -> Result<String, CallFailure> {
    if policy.max_retries == 0 {
        tracing::warn!(model, "max_retries is 0, no attempt made");
        return Err(CallFailure::RetriesExhausted { attempts: 0 });
    }

    let mut attempt = 0;
    loop {
        tracing::debug!(model, attempt, turns = context.len(), "completion attempt");

        match provider.generate(model, system_instruction, context).await {
            Ok(text) => {
                tracing::info!(model, attempt, chars = text.len(), "completion succeeded");
                return Ok(text);
            }
            Err(ProviderError::RateLimited(reason)) => match policy.on_rate_limit(attempt) {
                RetryDecision::Retry { next_attempt, delay } => {
                    tracing::warn!(model, attempt, ?delay, %reason, "rate limited, backing off");
                    sink.advise(Advisory::RetryScheduled {
                        attempt: attempt + 1,
                        max_retries: policy.max_retries,
                        delay,
                    });
                    sleeper.sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryDecision::GiveUp => {
                    tracing::error!(model, attempts = attempt + 1, %reason, "rate limit retries exhausted");
                    sink.advise(Advisory::RateLimitExceeded);
                    return Err(CallFailure::RetriesExhausted { attempts: attempt + 1 });
                }
            },
            Err(err) if err.is_api() => {
                tracing::error!(model, attempt, error = %err, "provider rejected request");
                sink.advise(Advisory::ProviderError(err.to_string()));
                return Err(CallFailure::Provider(err.to_string()));
            }
            Err(err) => {
                tracing::error!(model, attempt, error = %err, "unexpected completion failure");
                sink.advise(Advisory::UnexpectedError(err.to_string()));
                return Err(CallFailure::Unexpected(err.to_string()));
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider and recording sleeper shared by unit tests

    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    pub enum Step {
        Reply(&'static str),
        RateLimit,
        Api(u16),
        Transport,
    }

    /// Plays back `steps` in order; repeats the last one when exhausted
    pub struct ScriptedProvider {
        steps: Mutex<VecDeque<Step>>,
        last: Step,
        pub calls: Mutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedProvider {
        pub fn new(steps: Vec<Step>, last: Step) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                last,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn always(step: Step) -> Self {
            Self::new(Vec::new(), step)
        }

        pub fn attempts(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    fn play(step: &Step) -> Result<String, ProviderError> {
        match step {
            Step::Reply(t) => Ok(t.to_string()),
            Step::RateLimit => Err(ProviderError::RateLimited("quota".into())),
            Step::Api(status) => Err(ProviderError::Api { status: *status, message: "nope".into() }),
            Step::Transport => Err(ProviderError::Transport("connection reset".into())),
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn generate(
            &self,
            _model: &str,
            _system_instruction: &str,
            contents: &[Turn],
        ) -> Result<String, ProviderError> {
            self.calls.lock().unwrap().push(contents.to_vec());
            let next = self.steps.lock().unwrap().pop_front();
            match next {
                Some(step) => play(&step),
                None => play(&self.last),
            }
        }
    }

    #[derive(Default)]
    pub struct RecordingSleeper {
        pub delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleeper {
        pub fn delays(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, delay: Duration) {
            self.delays.lock().unwrap().push(delay);
        }
    }
}
