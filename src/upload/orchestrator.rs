//! Upload orchestrator
//!
//! Drives one asset through the whole pipeline:
//!
//! ```text
//! CREATING -> CHECKSUMMING -> UPLOADING -> REPORTING -> POLLING -> {DONE | FAILED}
//! ```
//!
//! Any step's failure aborts the remaining steps. The orchestrator never
//! cleans up a partially uploaded asset; deleting the placeholder is left to
//! the operator. Each call is independent, so separate assets may upload in
//! parallel at the caller's discretion.

use super::{checksum, executor, poller, AssetService, UploadError, UploadTransport};
use crate::upload::DeliveryState;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Orchestrator knobs, usually derived from
/// [`UploadConfig`](crate::config::UploadConfig).
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Fixed delivery-state poll interval.
    pub poll_interval: Duration,
    /// Overall deadline for the whole upload, measured from the first step.
    /// `None` waits indefinitely.
    pub deadline: Option<Duration>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            poll_interval: poller::DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }
}

/// Result of a finished upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub asset_id: String,
    pub state: DeliveryState,
}

/// Upload one file as a new asset and wait for the server to finish
/// processing it.
///
/// Steps, in order: create the placeholder, checksum the file, execute every
/// upload operation, report completion with the checksum, poll until a
/// terminal delivery state. The commit is only sent after all operations
/// succeed, and polling only starts after the commit succeeds.
#[tracing::instrument(
    name = "upload.asset",
    skip_all,
    fields(
        file = %path.display(),
        asset.id = tracing::field::Empty,
        upload.bytes = tracing::field::Empty
    ),
    err
)]
pub async fn upload_asset(
    service: &dyn AssetService,
    transport: &dyn UploadTransport,
    path: &Path,
    options: &UploadOptions,
    cancel: &CancellationToken,
) -> Result<UploadOutcome, UploadError> {
    let deadline = options.deadline.map(|d| Instant::now() + d);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "asset".to_string());

    let mut file = tokio::fs::File::open(path).await?;
    let file_size = file.metadata().await?.len();
    tracing::Span::current().record("upload.bytes", file_size);

    // CREATING
    let handle = service.create(&file_name, file_size).await?;
    if handle.operations.is_empty() && file_size > 0 {
        return Err(UploadError::NoUploadOperations);
    }
    tracing::Span::current().record("asset.id", handle.id.as_str());
    tracing::info!(
        asset_id = %handle.id,
        operations = handle.operations.len(),
        bytes = file_size,
        "created asset placeholder"
    );

    // CHECKSUMMING: fresh read of the very bytes the executor will send.
    let file_checksum = checksum::digest_file(&mut file).await?;

    // UPLOADING
    executor::execute_operations(transport, &mut file, file_size, &handle.operations, cancel)
        .await?;

    // REPORTING
    if cancel.is_cancelled() {
        return Err(UploadError::Cancelled);
    }
    service.commit(&handle.id, &file_checksum).await?;
    tracing::info!(asset_id = %handle.id, checksum = %file_checksum, "marked asset uploaded");

    // POLLING
    let state = poller::poll_delivery(
        &handle.id,
        || service.delivery_state(&handle.id),
        options.poll_interval,
        deadline,
        cancel,
    )
    .await?;

    Ok(UploadOutcome {
        asset_id: handle.id,
        state,
    })
}
