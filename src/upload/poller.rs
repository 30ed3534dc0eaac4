//! Asset delivery state poller
//!
//! After the upload is reported complete, the server processes the asset
//! asynchronously. The poller queries the delivery state at a fixed interval
//! until it observes a terminal value, the caller's deadline passes, or the
//! caller cancels. This is state-machine polling for a bounded human-scale
//! process, so the interval is fixed rather than adaptive backoff.

use super::{DeliveryState, UploadError};
use crate::client::ApiError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default fixed poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Poll `fetch_state` until the asset reaches a terminal delivery state.
///
/// Returns the final state on `COMPLETE`, fails with
/// [`UploadError::ProcessingFailed`] on `FAILED` (carrying the
/// server-reported reasons), and keeps waiting on any other value, including
/// an absent state. Deadline and cancellation are checked at every iteration
/// boundary, and the sleep itself races against cancellation so the poller
/// never sleeps past a cancel.
#[tracing::instrument(
    name = "upload.poll_delivery",
    skip_all,
    fields(asset.id = %asset_id),
    err
)]
pub async fn poll_delivery<F, Fut>(
    asset_id: &str,
    mut fetch_state: F,
    interval: Duration,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
) -> Result<DeliveryState, UploadError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<DeliveryState>, ApiError>>,
{
    loop {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(UploadError::DeadlineExceeded);
        }

        match fetch_state().await? {
            Some(state) if state.is_complete() => {
                tracing::info!(asset_id = %asset_id, "asset delivery complete");
                return Ok(state);
            }
            Some(state) if state.is_failed() => {
                return Err(UploadError::ProcessingFailed {
                    reasons: state.reasons(),
                });
            }
            state => {
                tracing::debug!(
                    asset_id = %asset_id,
                    state = state.as_ref().map(|s| s.state.as_str()).unwrap_or("none"),
                    "asset still processing"
                );
            }
        }

        let next = Instant::now() + interval;
        let wake = match deadline {
            Some(d) if d < next => d,
            _ => next,
        };
        tokio::select! {
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            _ = tokio::time::sleep_until(wake) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::DeliveryIssue;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn queued(
        states: Vec<Option<DeliveryState>>,
    ) -> (
        Arc<Mutex<VecDeque<Option<DeliveryState>>>>,
        impl FnMut() -> std::pin::Pin<
            Box<dyn Future<Output = Result<Option<DeliveryState>, ApiError>> + Send>,
        >,
    ) {
        let queue = Arc::new(Mutex::new(VecDeque::from(states)));
        let fetch_queue = queue.clone();
        let fetch = move || {
            let queue = fetch_queue.clone();
            Box::pin(async move {
                Ok(queue.lock().unwrap().pop_front().flatten())
            })
                as std::pin::Pin<
                    Box<dyn Future<Output = Result<Option<DeliveryState>, ApiError>> + Send>,
                >
        };
        (queue, fetch)
    }

    #[tokio::test]
    async fn test_immediate_complete() {
        let (_queue, fetch) = queued(vec![Some(DeliveryState::new("COMPLETE"))]);
        let cancel = CancellationToken::new();

        let state = poll_delivery("asset-1", fetch, Duration::from_secs(60), None, &cancel)
            .await
            .unwrap();

        // Terminal on the first observation, no sleep involved.
        assert!(state.is_complete());
    }

    #[tokio::test]
    async fn test_immediate_failure_carries_reasons() {
        let failed = DeliveryState {
            state: DeliveryState::FAILED.into(),
            errors: vec![DeliveryIssue {
                code: None,
                description: "corrupt image data".into(),
            }],
        };
        let (_queue, fetch) = queued(vec![Some(failed)]);
        let cancel = CancellationToken::new();

        let err = poll_delivery("asset-1", fetch, Duration::from_secs(60), None, &cancel)
            .await
            .unwrap_err();

        match err {
            UploadError::ProcessingFailed { reasons } => {
                assert_eq!(reasons, vec!["corrupt image data".to_string()]);
            }
            other => panic!("expected ProcessingFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_waits_through_in_progress_states() {
        let (_queue, fetch) = queued(vec![
            None,
            Some(DeliveryState::new("UPLOAD_COMPLETE")),
            Some(DeliveryState::new("COMPLETE")),
        ]);
        let cancel = CancellationToken::new();

        let state = poll_delivery("asset-1", fetch, Duration::from_millis(5), None, &cancel)
            .await
            .unwrap();
        assert!(state.is_complete());
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let never_done = || {
            Box::pin(async { Ok(Some(DeliveryState::new("PROCESSING"))) })
                as std::pin::Pin<
                    Box<dyn Future<Output = Result<Option<DeliveryState>, ApiError>> + Send>,
                >
        };
        let cancel = CancellationToken::new();
        let deadline = Some(Instant::now() + Duration::from_millis(25));

        let err = poll_delivery(
            "asset-1",
            never_done,
            Duration::from_millis(5),
            deadline,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UploadError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_sleep() {
        let never_done = || {
            Box::pin(async { Ok(None) })
                as std::pin::Pin<
                    Box<dyn Future<Output = Result<Option<DeliveryState>, ApiError>> + Send>,
                >
        };
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = poll_delivery(
            "asset-1",
            never_done,
            Duration::from_secs(3600),
            None,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let failing = || {
            Box::pin(async {
                Err::<Option<DeliveryState>, _>(ApiError::Status {
                    status: 500,
                    message: "internal".into(),
                })
            })
                as std::pin::Pin<
                    Box<dyn Future<Output = Result<Option<DeliveryState>, ApiError>> + Send>,
                >
        };
        let cancel = CancellationToken::new();

        let err = poll_delivery("asset-1", failing, Duration::from_millis(5), None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Api(ApiError::Status { .. })));
    }
}
