//! Bounded retry loop for structured model output.
//!
//! Wraps a "produce text from a prompt" function: each attempt's output goes
//! through the strict-JSON parser; on a parse failure the next attempt is fed
//! the corrective re-prompt. After the attempt cap, callers get the last raw
//! text back as a degraded result rather than an error — the model responded,
//! it just never produced the expected structure.

use std::future::Future;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::backoff::BackoffPolicy;
use crate::error::LlmResult;
use crate::parser::parse_structured;

/// Configuration for one structured-generation task.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Maximum produce+parse attempts.
    pub max_attempts: u32,
    /// Delay policy between attempts.
    pub backoff: BackoffPolicy,
    /// Task name for logging.
    pub operation: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::parse_default(),
            operation: "structured-generation".to_string(),
        }
    }
}

impl GeneratorConfig {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Outcome of a structured-generation task.
///
/// `Raw` is total failure dressed as data: the caller must treat it as a hard
/// stop, never as partial success.
#[derive(Debug, Clone)]
pub enum StructuredOutput<T> {
    /// The model produced valid structure.
    Parsed(T),
    /// Attempts exhausted; the last raw response text.
    Raw(String),
}

impl<T> StructuredOutput<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    pub fn into_parsed(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

/// Run `produce` up to `config.max_attempts` times until its output parses as `T`.
///
/// Transport-level errors from `produce` propagate immediately; only parse
/// failures are retried. Parse exhaustion never returns `Err`.
pub async fn generate_structured<T, F, Fut>(
    config: &GeneratorConfig,
    initial_prompt: String,
    produce: F,
) -> LlmResult<StructuredOutput<T>>
where
    T: DeserializeOwned,
    F: Fn(String) -> Fut,
    Fut: Future<Output = LlmResult<String>>,
{
    let mut prompt = initial_prompt;
    let mut last_raw = String::new();

    for attempt in 1..=config.max_attempts.max(1) {
        let raw = produce(prompt.clone()).await?;

        match parse_structured::<T>(&raw) {
            Ok(value) => {
                debug!(
                    operation = %config.operation,
                    attempt,
                    "Structured output parsed"
                );
                return Ok(StructuredOutput::Parsed(value));
            }
            Err(repair) => {
                warn!(
                    operation = %config.operation,
                    attempt,
                    error = %repair.parse_error,
                    "Model response was not valid JSON"
                );
                last_raw = raw;
                if attempt < config.max_attempts {
                    prompt = repair.to_message();
                    tokio::time::sleep(config.backoff.delay_for_attempt(attempt)).await;
                }
            }
        }
    }

    warn!(
        operation = %config.operation,
        attempts = config.max_attempts,
        "Structured generation exhausted; returning raw content"
    );
    Ok(StructuredOutput::Raw(last_raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Deserialize)]
    struct Plan {
        name: String,
    }

    fn fast_config() -> GeneratorConfig {
        GeneratorConfig::new("test")
            .with_backoff(BackoffPolicy::Constant(Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn test_first_attempt_success_makes_one_call() {
        let calls = AtomicU32::new(0);
        let result = generate_structured::<Plan, _, _>(&fast_config(), "go".into(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(r#"{"name": "ok"}"#.to_string()) }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.into_parsed().unwrap().name, "ok");
    }

    #[tokio::test]
    async fn test_always_failing_parse_returns_raw_after_cap() {
        let calls = AtomicU32::new(0);
        let result = generate_structured::<Plan, _, _>(&fast_config(), "go".into(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(format!("not json #{n}")) }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            StructuredOutput::Raw(raw) => assert_eq!(raw, "not json #3"),
            StructuredOutput::Parsed(_) => panic!("expected raw fallback"),
        }
    }

    #[tokio::test]
    async fn test_retry_prompt_quotes_previous_response() {
        let prompts = Mutex::new(Vec::new());
        let _ = generate_structured::<Plan, _, _>(&fast_config(), "initial".into(), |prompt| {
            prompts.lock().unwrap().push(prompt);
            async { Ok("garbage output".to_string()) }
        })
        .await
        .unwrap();

        let prompts = prompts.into_inner().unwrap();
        assert_eq!(prompts[0], "initial");
        assert!(prompts[1].contains("garbage output"));
        assert!(prompts[2].contains("garbage output"));
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let result = generate_structured::<Plan, _, _>(&fast_config(), "go".into(), |_| async {
            Err(crate::LlmError::EmptyCompletion)
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let calls = AtomicU32::new(0);
        let result = generate_structured::<Plan, _, _>(&fast_config(), "go".into(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok("```broken".to_string())
                } else {
                    Ok("```json\n{\"name\": \"fixed\"}\n```".to_string())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.into_parsed().unwrap().name, "fixed");
    }
}
