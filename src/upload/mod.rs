//! Asset upload pipeline
//!
//! Implements the multi-step, chunked, asynchronously-processed upload flow:
//! reserve an asset on the server, checksum the file, transmit the
//! server-specified byte ranges, report completion, and poll the delivery
//! state until it reaches a terminal value.
//!
//! The pipeline is deliberately split along its seams:
//!
//! - [`UploadTransport`] performs one raw HTTP transfer per
//!   [`UploadOperation`] (implemented by
//!   [`HttpApiClient`](crate::client::HttpApiClient)).
//! - [`AssetService`] speaks the typed asset endpoints (implemented by
//!   [`AssetApi`](crate::client::assets::AssetApi)).
//! - [`orchestrator::upload_asset`] composes checksum, executor and poller on
//!   top of those seams.

use crate::client::ApiError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod checksum;
pub mod executor;
pub mod orchestrator;
pub mod poller;

pub use orchestrator::{upload_asset, UploadOptions, UploadOutcome};

/// Upload pipeline errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("upload transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: ApiError,
    },

    #[error("short read at offset {offset}: operation needs {expected} bytes, file has {actual}")]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    #[error("server returned no upload operations for a non-empty file")]
    NoUploadOperations,

    #[error("asset processing failed: {}", reasons.join("; "))]
    ProcessingFailed { reasons: Vec<String> },

    #[error("deadline exceeded while waiting for asset delivery")]
    DeadlineExceeded,

    #[error("upload cancelled")]
    Cancelled,
}

/// One header to send verbatim with an upload operation.
///
/// Kept as a list rather than a map: the server may specify the same header
/// name more than once and every occurrence must be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadHeader {
    pub name: String,
    pub value: String,
}

/// One server-specified instruction for transmitting a contiguous byte range.
///
/// The union of all operations for one asset covers `[0, file_size)` without
/// gaps or overlaps. Operations may execute in any order, but all of them
/// must succeed before the asset is marked uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOperation {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub request_headers: Vec<UploadHeader>,
    pub offset: u64,
    pub length: u64,
}

impl UploadOperation {
    /// Exclusive end of the byte range this operation transmits.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Server-assigned identifier for an in-progress upload, plus the operations
/// to execute against it. Created before any bytes are sent.
#[derive(Debug, Clone)]
pub struct AssetHandle {
    pub id: String,
    pub operations: Vec<UploadOperation>,
}

/// One human-readable reason attached to a failed delivery state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub description: String,
}

/// Server-side processing state of an uploaded asset.
///
/// `COMPLETE` and `FAILED` are terminal; every other value (and an absent
/// state) means processing is still in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryState {
    pub state: String,
    #[serde(default)]
    pub errors: Vec<DeliveryIssue>,
}

impl DeliveryState {
    pub const COMPLETE: &'static str = "COMPLETE";
    pub const FAILED: &'static str = "FAILED";

    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            errors: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == Self::COMPLETE
    }

    pub fn is_failed(&self) -> bool {
        self.state == Self::FAILED
    }

    pub fn is_terminal(&self) -> bool {
        self.is_complete() || self.is_failed()
    }

    /// Human-readable failure reasons reported by the server.
    pub fn reasons(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.description.clone()).collect()
    }
}

/// Raw byte-range transfer, one HTTP call per [`UploadOperation`].
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Send `body` to the operation's destination with its exact method and
    /// headers. Any non-2xx status is an error.
    async fn transmit(&self, operation: &UploadOperation, body: Bytes) -> Result<(), ApiError>;
}

/// Typed asset endpoints the orchestrator drives.
#[async_trait]
pub trait AssetService: Send + Sync {
    /// Create the server-side placeholder and obtain the upload operations.
    async fn create(&self, file_name: &str, file_size: u64) -> Result<AssetHandle, ApiError>;

    /// Report that every operation succeeded, together with the content
    /// checksum the server verifies against.
    async fn commit(&self, asset_id: &str, checksum: &str) -> Result<(), ApiError>;

    /// Fetch the current delivery state, if the server reports one yet.
    async fn delivery_state(&self, asset_id: &str) -> Result<Option<DeliveryState>, ApiError>;
}
