//! Waiting for CI to settle on the release commit

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::config::ProjectConfig;
use crate::error::CiWaitError;
use crate::retry::{retry, RetryStrategyConfig};
use crate::traits::{CiProvider, CiStatus};

/// Poll `ci` for `reference` until it passes.
///
/// A failing result ends the wait at once; pending and unknown results are
/// polled again every `ci-poll-interval` seconds, up to `ci-timeout` in total.
pub async fn wait_for_green(
    ci: &dyn CiProvider,
    reference: &str,
    config: &ProjectConfig,
    retry_config: &RetryStrategyConfig,
) -> Result<(), CiWaitError> {
    let interval = Duration::from_secs(config.ci_poll_interval);
    let poll = async {
        loop {
            match retry(retry_config, "ci status", || ci.status(reference)).await? {
                CiStatus::Passing => return Ok(()),
                CiStatus::Failing(detail) => {
                    return Err(CiWaitError::Failed {
                        reference: reference.to_string(),
                        detail,
                    })
                }
                status => {
                    debug!(provider = ci.name(), reference, ?status, "CI not settled");
                    sleep(interval).await;
                }
            }
        }
    };
    info!(provider = ci.name(), reference, timeout_secs = config.ci_timeout, "waiting for CI");
    match timeout(Duration::from_secs(config.ci_timeout), poll).await {
        Ok(result) => result,
        Err(_) => Err(CiWaitError::TimedOut {
            reference: reference.to_string(),
            seconds: config.ci_timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::FakeCi;

    fn config() -> ProjectConfig {
        ProjectConfig {
            ci_timeout: 60,
            ci_poll_interval: 10,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_through_pending() {
        let ci = FakeCi::new(CiStatus::Unknown).script(
            "rev-2",
            vec![
                CiStatus::Pending("queued".into()),
                CiStatus::Pending("running".into()),
                CiStatus::Passing,
            ],
        );
        wait_for_green(&ci, "rev-2", &config(), &RetryStrategyConfig::immediate(1))
            .await
            .unwrap();
        assert_eq!(ci.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_stops_waiting() {
        let ci = FakeCi::new(CiStatus::Failing("lint failure".into()));
        let err = wait_for_green(&ci, "rev-2", &config(), &RetryStrategyConfig::immediate(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CiWaitError::Failed { ref detail, .. } if detail == "lint failure"));
        assert_eq!(ci.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_by_ci_timeout() {
        let ci = FakeCi::new(CiStatus::Pending("queued".into()));
        let err = wait_for_green(&ci, "rev-2", &config(), &RetryStrategyConfig::immediate(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CiWaitError::TimedOut { seconds: 60, .. }));
        assert!(ci.calls() >= 6, "{}", ci.calls());
    }
}
