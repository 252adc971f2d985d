//! Bounded retry around a fallible async fetch.
//!
//! Every error kind is retried. The shared run deadline is checked before each
//! attempt and caps each back-off sleep.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::ImportError;

/// One finished attempt, as reported to the observer.
#[derive(Debug)]
pub struct FetchAttempt<'a> {
    pub operation: &'a str,
    /// 1-based.
    pub attempt: u32,
    pub max_attempts: u32,
    /// `None` on success.
    pub error: Option<&'a ImportError>,
}

#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    pub(crate) max_attempts: u32,
    pub(crate) delay: Duration,
    pub(crate) deadline: Option<Instant>,
}

impl RetryingFetcher {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, ImportError> {
        if max_attempts == 0 {
            return Err(ImportError::InvalidConfiguration(
                "max_attempts must be >= 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
            deadline: None,
        })
    }

    /// Stop starting attempts once `deadline` has passed.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    async fn back_off(&self) {
        let wake = Instant::now() + self.delay;
        let wake = match self.deadline {
            Some(d) if d < wake => d,
            _ => wake,
        };
        tokio::time::sleep_until(wake).await;
    }

    /// Run `op` until it succeeds or attempts run out.
    pub async fn fetch<T, E, F, Fut>(&self, operation: &str, op: F) -> Result<T, ImportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.fetch_observed(operation, op, |_| {}).await
    }

    /// As [`fetch`](Self::fetch), reporting every attempt to `observe`.
    pub async fn fetch_observed<T, E, F, Fut, O>(
        &self,
        operation: &str,
        mut op: F,
        mut observe: O,
    ) -> Result<T, ImportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        O: FnMut(&FetchAttempt<'_>),
    {
        let mut attempt: u32 = 0;
        loop {
            if self.deadline_passed() {
                tracing::warn!(operation, attempt, "fetch abandoned: deadline exceeded");
                return Err(ImportError::DeadlineExceeded {
                    operation: operation.to_string(),
                });
            }

            attempt += 1;
            let message = match op().await {
                Ok(value) => {
                    observe(&FetchAttempt {
                        operation,
                        attempt,
                        max_attempts: self.max_attempts,
                        error: None,
                    });
                    tracing::debug!(operation, attempt, "fetch succeeded");
                    return Ok(value);
                }
                Err(e) => e.to_string(),
            };

            let err = ImportError::TransientFetch {
                operation: operation.to_string(),
                attempt,
                message: message.clone(),
            };
            observe(&FetchAttempt {
                operation,
                attempt,
                max_attempts: self.max_attempts,
                error: Some(&err),
            });
            tracing::warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                error = %err,
                "fetch attempt failed"
            );

            if attempt >= self.max_attempts {
                return Err(ImportError::FetchExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    last: message,
                });
            }
            self.back_off().await;
        }
    }
}
