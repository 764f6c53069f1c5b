//! Timeout and cancellation helpers.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::LoopError;

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, LoopError>>,
) -> Result<T, LoopError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(LoopError::Timeout(duration.as_millis() as u64)),
    }
}

/// Like [`with_timeout`], but a `None` duration waits indefinitely.
pub async fn with_optional_timeout<T>(
    duration: Option<Duration>,
    future: impl Future<Output = Result<T, LoopError>>,
) -> Result<T, LoopError> {
    match duration {
        Some(duration) => with_timeout(duration, future).await,
        None => future.await,
    }
}

/// Race a future against cancellation. Cancellation wins ties.
pub async fn with_cancel<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T, LoopError>>,
) -> Result<T, LoopError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LoopError::Canceled),
        result = future => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_on_slow_future() {
        let result: Result<(), LoopError> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(LoopError::Timeout(50))));
    }

    #[tokio::test]
    async fn cancel_wins_over_pending_future() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), LoopError> =
            with_cancel(&cancel, futures::future::pending()).await;
        assert!(matches!(result, Err(LoopError::Canceled)));
    }

    #[tokio::test]
    async fn no_timeout_passes_value_through() {
        let value = with_optional_timeout(None, async { Ok::<_, LoopError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
