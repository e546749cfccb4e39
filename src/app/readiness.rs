use tracing::{error, info, warn};

use crate::domain::{DomainError, RetryPolicy};
use crate::ports::{HostBridge, Scheduler};

/// Poll the host bridge until it answers or the policy runs out.
///
/// Returns the number of probes it took.
pub async fn wait_for_host(
    host: &dyn HostBridge,
    scheduler: &dyn Scheduler,
    policy: &RetryPolicy,
) -> Result<u32, DomainError> {
    let attempts = policy.attempts();

    for probe in 0..attempts {
        if host.probe().await {
            info!(probes = probe + 1, "Host bridge available");
            return Ok(probe + 1);
        }

        let left = attempts - probe - 1;
        if left > 0 {
            warn!(attempts_left = left, "Host bridge not available, retrying");
            scheduler.delay(policy.delay_after(probe)).await;
        }
    }

    error!(attempts, "Host bridge not available after retries");
    Err(DomainError::HostUnavailable { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use tokio::sync::broadcast;

    use crate::domain::config::Backoff;
    use crate::domain::{AppEvent, Capability, UserContext};
    use crate::ports::{OverlayStream, TaskHandle, TickFn};

    struct ScriptedHost {
        answers: Mutex<VecDeque<bool>>,
        probes: Mutex<u32>,
    }

    impl ScriptedHost {
        fn new(answers: &[bool]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().copied().collect()),
                probes: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl HostBridge for ScriptedHost {
        async fn probe(&self) -> bool {
            *self.probes.lock() += 1;
            self.answers.lock().pop_front().unwrap_or(false)
        }

        async fn configure(&self, _capabilities: &[Capability]) -> Result<(), DomainError> {
            Ok(())
        }

        async fn notify_app_event(&self, _event: &AppEvent) -> Result<(), DomainError> {
            Ok(())
        }

        async fn post_message(&self, _message: Value) -> Result<(), DomainError> {
            Ok(())
        }

        async fn set_video_filter(&self, _stream: Option<OverlayStream>) -> Result<(), DomainError> {
            Ok(())
        }

        async fn user_context(&self) -> Result<UserContext, DomainError> {
            Ok(UserContext::default())
        }

        fn subscribe(&self) -> broadcast::Receiver<Value> {
            broadcast::channel(1).1
        }
    }

    #[derive(Default)]
    struct RecordingDelays {
        delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Scheduler for RecordingDelays {
        fn every(&self, _period: Duration, _callback: TickFn) -> TaskHandle {
            TaskHandle::new(Default::default())
        }

        async fn delay(&self, delay: Duration) {
            self.delays.lock().push(delay);
        }
    }

    fn policy(retries: u32, delay_ms: u64, backoff: Backoff) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::from_millis(delay_ms),
            backoff,
        }
    }

    #[tokio::test]
    async fn test_ready_on_first_probe() {
        let host = ScriptedHost::new(&[true]);
        let scheduler = RecordingDelays::default();

        let probes = wait_for_host(&host, &scheduler, &policy(5, 1000, Backoff::Fixed))
            .await
            .unwrap();

        assert_eq!(probes, 1);
        assert!(scheduler.delays.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ready_after_retries() {
        let host = ScriptedHost::new(&[false, false, true]);
        let scheduler = RecordingDelays::default();

        let probes = wait_for_host(&host, &scheduler, &policy(5, 1000, Backoff::Fixed))
            .await
            .unwrap();

        assert_eq!(probes, 3);
        assert_eq!(
            *scheduler.delays.lock(),
            vec![Duration::from_secs(1), Duration::from_secs(1)]
        );
    }

    #[tokio::test]
    async fn test_unavailable_after_exhausting_retries() {
        let host = ScriptedHost::new(&[]);
        let scheduler = RecordingDelays::default();

        let err = wait_for_host(&host, &scheduler, &policy(5, 1000, Backoff::Fixed)).await;

        assert_eq!(err, Err(DomainError::HostUnavailable { attempts: 6 }));
        assert_eq!(*host.probes.lock(), 6);
        // No delay after the final probe.
        assert_eq!(scheduler.delays.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_exponential_delays() {
        let host = ScriptedHost::new(&[]);
        let scheduler = RecordingDelays::default();

        let _ = wait_for_host(&host, &scheduler, &policy(3, 100, Backoff::Exponential)).await;

        assert_eq!(
            *scheduler.delays.lock(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
    }
}
