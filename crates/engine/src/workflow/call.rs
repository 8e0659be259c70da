//! Guarded stage invocation.
//!
//! Every executor call passes through [`CallGate`], which caps the number of
//! calls in flight across all workflows, applies the per-stage deadline, and
//! aborts the call once the engine's shutdown token fires.

use std::time::Duration;

use sparta_types::RemoteError;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::executor::{StageContext, StageOutput};
use crate::pipeline::StageDescriptor;

/// How failed stage calls are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per stage; 1 disables retry.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `backoff * n` before the next try.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

#[derive(Debug)]
pub(crate) struct CallGate {
    limiter: Semaphore,
    stage_timeout: Duration,
    pub(crate) retry: RetryPolicy,
    pub(crate) shutdown: CancellationToken,
}

impl CallGate {
    pub(crate) fn new(max_concurrent_calls: usize, stage_timeout: Duration, retry: RetryPolicy, shutdown: CancellationToken) -> Self {
        Self {
            limiter: Semaphore::new(max_concurrent_calls.clamp(1, Semaphore::MAX_PERMITS)),
            stage_timeout,
            retry,
            shutdown,
        }
    }

    /// Run one attempt of `descriptor` against `context`.
    pub(crate) async fn invoke_once(&self, descriptor: &StageDescriptor, context: &StageContext) -> Result<StageOutput, RemoteError> {
        let _permit = tokio::select! {
            permit = self.limiter.acquire() => permit.map_err(|_| RemoteError::interrupted("stage call limiter closed"))?,
            _ = self.shutdown.cancelled() => return Err(shutdown_error()),
        };
        debug!(
            workflow_id = %context.workflow_id,
            stage = descriptor.stage.as_str(),
            executor = descriptor.executor.name(),
            "invoking stage executor"
        );

        tokio::select! {
            outcome = tokio::time::timeout(self.stage_timeout, descriptor.executor.execute(context)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(RemoteError::timeout(
                    format!("{} call", descriptor.stage.as_str()),
                    u64::try_from(self.stage_timeout.as_millis()).unwrap_or(u64::MAX),
                )),
            },
            _ = self.shutdown.cancelled() => Err(shutdown_error()),
        }
    }
}

fn shutdown_error() -> RemoteError {
    RemoteError::interrupted("stage call interrupted by orchestrator shutdown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::StageExecutor;
    use async_trait::async_trait;
    use sparta_types::{RemoteErrorKind, WorkflowStage};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Sleepy {
        delay: Duration,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StageExecutor for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn execute(&self, _context: &StageContext) -> Result<StageOutput, RemoteError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(StageOutput::default())
        }
    }

    fn sleepy(delay: Duration) -> (StageDescriptor, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        let executor = Sleepy {
            delay,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
        };
        (StageDescriptor::new(WorkflowStage::Parsing, executor), peak)
    }

    #[test]
    fn oversized_concurrency_limit_is_clamped() {
        let gate = CallGate::new(usize::MAX, Duration::from_secs(1), RetryPolicy::default(), CancellationToken::new());
        assert_eq!(gate.limiter.available_permits(), Semaphore::MAX_PERMITS);
    }

    #[test]
    fn retry_delay_grows_linearly() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(200));
        assert_eq!(policy.delay_after(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn slow_executor_times_out() {
        let gate = CallGate::new(4, Duration::from_millis(20), RetryPolicy::default(), CancellationToken::new());
        let (descriptor, _) = sleepy(Duration::from_secs(5));

        let err = gate.invoke_once(&descriptor, &StageContext::default()).await.unwrap_err();
        assert_eq!(err.kind, RemoteErrorKind::Timeout);
        assert_eq!(err.message, "parsing call timed out after 20ms");
    }

    #[tokio::test]
    async fn limiter_caps_concurrent_calls() {
        let gate = Arc::new(CallGate::new(2, Duration::from_secs(5), RetryPolicy::default(), CancellationToken::new()));
        let (descriptor, peak) = sleepy(Duration::from_millis(30));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let gate = Arc::clone(&gate);
            let descriptor = descriptor.clone();
            handles.push(tokio::spawn(async move {
                gate.invoke_once(&descriptor, &StageContext::default()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_token_interrupts_in_flight_call() {
        let token = CancellationToken::new();
        let gate = CallGate::new(1, Duration::from_secs(30), RetryPolicy::default(), token.clone());
        let (descriptor, _) = sleepy(Duration::from_secs(30));

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let err = gate.invoke_once(&descriptor, &StageContext::default()).await.unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err.kind, RemoteErrorKind::Interrupted);
    }
}
