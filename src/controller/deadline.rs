use std::future::Future;
use std::time::Duration;

use crate::error::ControlError;

/// Default outer deadline for one whole command run. Must stay above the
/// coordinator's combined wait intervals, otherwise a silent player turns
/// into a spurious top-level timeout instead of a best-effort answer.
pub const COMMAND_DEADLINE: Duration = Duration::from_millis(2000);

/// Run `operation` to completion or abandon it when `deadline` elapses.
/// Elapsing is reported as [`ControlError::Timeout`], distinct from any
/// error the operation itself can produce; the operation's side effects on
/// the player (an already-issued transport command) are left as-is.
pub async fn with_deadline<T, F>(deadline: Duration, operation: F) -> Result<T, ControlError>
where
    F: Future<Output = Result<T, ControlError>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ControlError::Timeout { deadline }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn completed_operations_pass_through() {
        let result = with_deadline(Duration::from_millis(10), async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn errors_pass_through_unchanged() {
        let result: Result<(), _> = with_deadline(Duration::from_millis(10), async {
            Err(ControlError::NotFound { requested: None })
        })
        .await;
        assert!(matches!(result, Err(ControlError::NotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_deadline_becomes_timeout() {
        let result: Result<(), _> =
            with_deadline(Duration::from_millis(10), std::future::pending()).await;
        assert!(matches!(
            result,
            Err(ControlError::Timeout { deadline }) if deadline == Duration::from_millis(10)
        ));
    }
}
