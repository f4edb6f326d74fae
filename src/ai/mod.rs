pub mod openai;

pub use openai::OpenAIClient;

use async_trait::async_trait;
use rand::Rng;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    RateLimited,
    AuthFailure,
    QuotaExceeded,
    TransientServiceError,
    Unknown,
}

impl GenerationErrorKind {
    /// Whether another attempt can possibly succeed. Auth and quota
    /// failures won't fix themselves, so they surface immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationErrorKind::RateLimited | GenerationErrorKind::TransientServiceError
        )
    }
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GenerationErrorKind::RateLimited => "rate limited",
            GenerationErrorKind::AuthFailure => "auth failure",
            GenerationErrorKind::QuotaExceeded => "quota exceeded",
            GenerationErrorKind::TransientServiceError => "transient service error",
            GenerationErrorKind::Unknown => "unknown error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One generation attempt against the model service. Retries live in
/// [`generate_with_retry`], not in implementations.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GenerationError>;
}

/// Backoff schedule for retryable generation failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(750),
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failure number `attempt`
    /// (1-based): base * 2^(attempt-1), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(31));
        exp.min(self.max_delay)
    }
}

fn jittered(delay: Duration) -> Duration {
    delay.mul_f64(rand::thread_rng().gen_range(0.8..1.2))
}

/// Drive a generator through the retry policy. The same message slice is
/// re-sent on every attempt; the last error is surfaced after the attempt
/// cap.
pub async fn generate_with_retry<G>(
    generator: &G,
    policy: &RetryPolicy,
    messages: &[ChatMessage],
) -> Result<String, GenerationError>
where
    G: ResponseGenerator + ?Sized,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match generator.generate(messages).await {
            Ok(text) => return Ok(text),
            Err(err) if err.kind.is_retryable() && attempt < policy.max_attempts => {
                let delay = jittered(policy.delay_for(attempt));
                log::warn!(
                    "generation attempt {} failed ({}), retrying in {:.2}s",
                    attempt,
                    err,
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retryable_kinds() {
        assert!(GenerationErrorKind::RateLimited.is_retryable());
        assert!(GenerationErrorKind::TransientServiceError.is_retryable());
        assert!(!GenerationErrorKind::AuthFailure.is_retryable());
        assert!(!GenerationErrorKind::QuotaExceeded.is_retryable());
        assert!(!GenerationErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(750));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(3000));
        assert_eq!(policy.delay_for(10), Duration::from_secs(20));
    }

    struct ScriptedGenerator {
        script: Mutex<Vec<Result<String, GenerationErrorKind>>>,
        calls: AtomicU32,
    }

    impl ScriptedGenerator {
        fn new(mut script: Vec<Result<String, GenerationErrorKind>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ResponseGenerator for ScriptedGenerator {
        async fn generate(&self, _messages: &[ChatMessage]) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop() {
                Some(Ok(text)) => Ok(text),
                Some(Err(kind)) => Err(GenerationError::new(kind, "scripted failure")),
                None => panic!("generator called more times than scripted"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_failures_then_succeeds() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationErrorKind::TransientServiceError),
            Err(GenerationErrorKind::RateLimited),
            Ok("third time".to_string()),
        ]);
        let policy = RetryPolicy::default();
        let reply = generate_with_retry(&generator, &policy, &[])
            .await
            .unwrap();
        assert_eq!(reply, "third time");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_immediately() {
        let generator = ScriptedGenerator::new(vec![Err(GenerationErrorKind::AuthFailure)]);
        let policy = RetryPolicy::default();
        let err = generate_with_retry(&generator, &policy, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::AuthFailure);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_cap_surfaces_last_error() {
        let generator = ScriptedGenerator::new(vec![
            Err(GenerationErrorKind::TransientServiceError),
            Err(GenerationErrorKind::TransientServiceError),
            Err(GenerationErrorKind::TransientServiceError),
            Err(GenerationErrorKind::RateLimited),
        ]);
        let policy = RetryPolicy::default();
        let err = generate_with_retry(&generator, &policy, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::RateLimited);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 4);
    }
}
