use crate::config::RetryConfig;
use crate::error::ExtractionError;
use crate::llm::{LlmError, LlmProvider};
use crate::session::SessionToken;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::sleep;

/// Bounded retry for the overloaded response class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    /// Multiplied by the 1-based attempt number that just failed
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(2000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.attempts.max(1),
            base_delay: Duration::from_millis(config.delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Run `provider.complete` with cancellation checkpoints and backoff
///
/// The token is checked right before and right after every request. Only
/// [`LlmError::Overloaded`] is retried; anything else ends the loop at once.
/// A cancellation during a backoff sleep wakes it early.
pub async fn complete_with_retry(
    provider: &dyn LlmProvider,
    prompt: &str,
    policy: &RetryPolicy,
    token: &SessionToken,
) -> Result<String, ExtractionError> {
    for attempt in 1..=policy.max_attempts {
        token.check()?;

        if attempt == 1 {
            info!("Sending request to {}", provider.provider_name());
        } else {
            info!(
                "Retry attempt {}/{} for {} request",
                attempt,
                policy.max_attempts,
                provider.provider_name()
            );
        }

        let result = provider.complete(prompt).await;

        token.check()?;

        match result {
            Ok(text) => return Ok(text),
            Err(LlmError::Overloaded { status }) => {
                warn!(
                    "{} overloaded with status {} (attempt {}/{})",
                    provider.provider_name(),
                    status,
                    attempt,
                    policy.max_attempts
                );

                if attempt < policy.max_attempts {
                    let delay = policy.delay_after(attempt);
                    debug!("Waiting {:?} before retry", delay);
                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = token.cancelled() => return Err(ExtractionError::Cancelled),
                    }
                }
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(ExtractionError::Overloaded {
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays canned results and records when each call happened
    struct ScriptedProvider {
        results: Mutex<Vec<Result<String, LlmError>>>,
        calls: Mutex<Vec<Instant>>,
        cancel_on_call: Option<SessionToken>,
    }

    impl ScriptedProvider {
        fn new(mut results: Vec<Result<String, LlmError>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
                calls: Mutex::new(Vec::new()),
                cancel_on_call: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn provider_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(Instant::now());
            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(LlmError::Request("script exhausted".to_string())))
        }
    }

    fn overloaded() -> Result<String, LlmError> {
        Err(LlmError::Overloaded { status: 529 })
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_overloads_exhaust_retries() {
        let provider = ScriptedProvider::new(vec![overloaded(), overloaded(), overloaded()]);
        let token = SessionToken::new();

        let err = complete_with_retry(&provider, "p", &RetryPolicy::default(), &token)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransientServiceOverload);
        assert_eq!(provider.call_count(), 3);

        let calls = provider.calls.lock().unwrap();
        let first_gap = calls[1] - calls[0];
        let second_gap = calls[2] - calls[1];
        assert!(first_gap >= Duration::from_millis(2000) && first_gap < Duration::from_millis(2100));
        assert!(second_gap >= Duration::from_millis(4000) && second_gap < Duration::from_millis(4100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_overload() {
        let provider = ScriptedProvider::new(vec![overloaded(), Ok("done".to_string())]);
        let token = SessionToken::new();

        let text = complete_with_retry(&provider, "p", &RetryPolicy::default(), &token)
            .await
            .unwrap();

        assert_eq!(text, "done");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_terminal() {
        let provider = ScriptedProvider::new(vec![
            Err(LlmError::Api {
                status: 401,
                message: "bad key".to_string(),
            }),
            Ok("never".to_string()),
        ]);
        let token = SessionToken::new();

        let err = complete_with_retry(&provider, "p", &RetryPolicy::default(), &token)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RemoteRejected(401));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_call_sends_nothing() {
        let provider = ScriptedProvider::new(vec![Ok("never".to_string())]);
        let token = SessionToken::new();
        token.cancel();

        let err = complete_with_retry(&provider, "p", &RetryPolicy::default(), &token)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_call_is_not_retried() {
        let token = SessionToken::new();
        let mut provider = ScriptedProvider::new(vec![overloaded(), Ok("never".to_string())]);
        provider.cancel_on_call = Some(token.clone());

        let err = complete_with_retry(&provider, "p", &RetryPolicy::default(), &token)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            attempts: 0,
            delay_ms: 50,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_after(2), Duration::from_millis(100));
    }
}
