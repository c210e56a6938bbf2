//! Retry loop with backoff, runnable inline or on the tokio worker pool.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, warn, Instrument};

use super::policy::RetryPolicy;

/// Terminal outcome of a retried operation that never succeeded.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Every allowed attempt failed; `source` is the last failure.
    #[error("{label}: gave up after {attempts} attempt(s): {source}")]
    Exhausted {
        label: String,
        attempts: u32,
        source: E,
    },

    /// The spawned retry task panicked or was cancelled by the runtime.
    #[error("{label}: retry task aborted: {reason}")]
    Aborted { label: String, reason: String },
}

impl<E> RetryError<E> {
    pub fn label(&self) -> &str {
        match self {
            RetryError::Exhausted { label, .. } | RetryError::Aborted { label, .. } => label,
        }
    }

    /// Attempts made before giving up (0 when the task aborted).
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::Aborted { .. } => 0,
        }
    }

    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Aborted { .. } => None,
        }
    }
}

/// Run `operation` until it succeeds or `policy` runs out of retries.
///
/// `operation` receives the 1-indexed attempt number. Between attempts the
/// current task sleeps on the runtime timer; no thread is blocked.
pub async fn retry_with_backoff<T, E, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut retries = 0u32;

    loop {
        let attempt = retries + 1;

        match operation(attempt).await {
            Ok(value) => {
                if retries > 0 {
                    debug!(label, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if policy.should_retry(retries) => {
                retries += 1;
                let delay = policy.delay_for_retry(retries);
                warn!(
                    label,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => {
                return Err(RetryError::Exhausted {
                    label: label.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }
        }
    }
}

/// Spawn [`retry_with_backoff`] onto the tokio runtime and return immediately.
///
/// The returned [`RetryHandle`] resolves to the final outcome. The spawned task
/// inherits the caller's span and subscriber.
///
/// Must be called from within a tokio runtime.
pub fn spawn_with_backoff<T, E, F, Fut>(
    label: impl Into<String>,
    policy: RetryPolicy,
    operation: F,
) -> RetryHandle<T, E>
where
    T: Send + 'static,
    E: Display + Send + 'static,
    F: FnMut(u32) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let label = label.into();
    let task_label = label.clone();

    let task = async move { retry_with_backoff(&task_label, &policy, operation).await }
        .in_current_span()
        .with_current_subscriber();

    RetryHandle {
        label,
        inner: tokio::spawn(task),
    }
}

/// Future returned by [`spawn_with_backoff`].
///
/// Dropping the handle detaches the task; it keeps retrying in the background.
#[derive(Debug)]
pub struct RetryHandle<T, E> {
    label: String,
    inner: JoinHandle<Result<T, RetryError<E>>>,
}

impl<T, E> RetryHandle<T, E> {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T, E> Future for RetryHandle<T, E> {
    type Output = Result<T, RetryError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.inner).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(join_error)) => Poll::Ready(Err(RetryError::Aborted {
                label: self.label.clone(),
                reason: join_error.to_string(),
            })),
        }
    }
}
