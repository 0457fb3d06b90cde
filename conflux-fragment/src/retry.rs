use std::future::Future;

use conflux_error::{ConfluxError, ConfluxResult};

/// Substring identifying a transient failure of the security negotiation with the external source.
pub const SECURITY_FAILURE_SIGNATURE: &str = "GSS initiate failed";

pub fn is_security_negotiation_failure(err: &ConfluxError) -> bool {
    err.message().contains(SECURITY_FAILURE_SIGNATURE)
}

/// Retries an operation that failed the security negotiation.
///
/// Only secure sources are retried: with `retries = n` a secure source is attempted at most `n + 1`
/// times, an insecure source exactly once. Any other failure is returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityRetry {
    secure: bool,
    retries: u32,
}

impl SecurityRetry {
    pub fn new(secure: bool, retries: u32) -> Self {
        Self { secure, retries }
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn max_attempts(&self) -> u32 {
        if self.secure {
            self.retries.saturating_add(1)
        } else {
            1
        }
    }

    pub async fn execute<T, F, Fut>(&self, operation: F) -> ConfluxResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ConfluxResult<T>>,
    {
        self.execute_with_callback(operation, || Ok(())).await
    }

    /// Runs `operation`, calling `before_retry` ahead of every retry.
    ///
    /// A failing `before_retry` aborts the loop with its own error.
    pub async fn execute_with_callback<T, F, Fut, C>(
        &self,
        mut operation: F,
        mut before_retry: C,
    ) -> ConfluxResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ConfluxResult<T>>,
        C: FnMut() -> ConfluxResult<()>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_security_negotiation_failure(&err) => {
                    log::warn!(
                        "security negotiation failed on attempt {attempt} of {max_attempts}, retrying: {err}"
                    );
                    before_retry()?;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use conflux_error::conflux_err;
    use rstest::rstest;

    use super::*;

    fn gss_failure() -> ConfluxError {
        conflux_err!(Computation: "oops: GSS initiate failed on connect")
    }

    #[rstest]
    #[case(true, 0, 1)]
    #[case(true, 1, 2)]
    #[case(true, 2, 3)]
    #[case(true, 5, 6)]
    #[case(false, 0, 1)]
    #[case(false, 3, 1)]
    #[tokio::test]
    async fn attempts_until_exhausted(
        #[case] secure: bool,
        #[case] retries: u32,
        #[case] expected_attempts: u32,
    ) {
        let attempts = AtomicU32::new(0);
        let callbacks = AtomicU32::new(0);
        let result: ConfluxResult<()> = SecurityRetry::new(secure, retries)
            .execute_with_callback(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(gss_failure()) }
                },
                || {
                    callbacks.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
            )
            .await;

        assert!(is_security_negotiation_failure(&result.unwrap_err()));
        assert_eq!(attempts.load(Ordering::SeqCst), expected_attempts);
        assert_eq!(callbacks.load(Ordering::SeqCst), expected_attempts - 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failure() {
        let attempts = AtomicU32::new(0);
        let result = SecurityRetry::new(true, 2)
            .execute(|| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(gss_failure())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: ConfluxResult<()> = SecurityRetry::new(true, 3)
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(conflux_err!(Computation: "connection refused")) }
            })
            .await;

        assert_eq!(result.unwrap_err().message(), "connection refused");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_callback_aborts() {
        let attempts = AtomicU32::new(0);
        let result: ConfluxResult<()> = SecurityRetry::new(true, 3)
            .execute_with_callback(
                || {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async { Err(gss_failure()) }
                },
                || Err(conflux_err!(Computation: "relogin failed")),
            )
            .await;

        assert_eq!(result.unwrap_err().message(), "relogin failed");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
