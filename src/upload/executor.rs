//! Chunked upload executor
//!
//! Runs the server-specified upload operations against an open file: seek to
//! the operation's offset, read exactly its length, and transmit the slice
//! with the exact method and headers the server asked for.
//!
//! Operations run sequentially and the first failure aborts the asset; retry
//! policy belongs to the caller. Cancellation is observed between operations
//! and while a transfer is in flight.

use super::{UploadError, UploadOperation, UploadTransport};
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::sync::CancellationToken;

/// Execute every upload operation, in order, against `transport`.
///
/// Fails with [`UploadError::ShortRead`] when the file cannot supply an
/// operation's full byte range, and with [`UploadError::Transport`] when an
/// HTTP call does not return 2xx. No operation is skipped; the first failure
/// aborts the remainder.
#[tracing::instrument(
    name = "upload.execute_operations",
    skip_all,
    fields(
        upload.operations = operations.len(),
        upload.bytes = operations.iter().map(|op| op.length).sum::<u64>()
    ),
    err
)]
pub async fn execute_operations(
    transport: &dyn UploadTransport,
    file: &mut File,
    file_size: u64,
    operations: &[UploadOperation],
    cancel: &CancellationToken,
) -> Result<(), UploadError> {
    for operation in operations {
        if cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let body = read_range(file, file_size, operation).await?;

        // Dropping the transmit future on cancellation aborts the in-flight
        // HTTP call.
        tokio::select! {
            _ = cancel.cancelled() => return Err(UploadError::Cancelled),
            result = transport.transmit(operation, body) => {
                result.map_err(|source| UploadError::Transport {
                    url: operation.url.clone(),
                    source,
                })?;
            }
        }

        tracing::debug!(
            url = %operation.url,
            offset = operation.offset,
            length = operation.length,
            "upload operation complete"
        );
    }

    Ok(())
}

/// Read exactly the byte range one operation transmits.
async fn read_range(
    file: &mut File,
    file_size: u64,
    operation: &UploadOperation,
) -> Result<Bytes, UploadError> {
    let short_read = || UploadError::ShortRead {
        offset: operation.offset,
        expected: operation.length,
        actual: file_size.saturating_sub(operation.offset),
    };

    if operation.end() > file_size {
        return Err(short_read());
    }

    file.seek(SeekFrom::Start(operation.offset)).await?;

    let mut buf = vec![0u8; operation.length as usize];
    match file.read_exact(&mut buf).await {
        Ok(_) => Ok(buf.into()),
        // File shrank after the size check.
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(short_read()),
        Err(e) => Err(UploadError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiError;
    use async_trait::async_trait;
    use rand::RngCore;
    use std::io::Write;
    use std::sync::Mutex;

    struct RecordingTransport {
        sent: Mutex<Vec<(u64, Bytes)>>,
        fail_from_call: Option<usize>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_from_call: None,
            }
        }

        fn failing_from(call: usize) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_from_call: Some(call),
            }
        }
    }

    #[async_trait]
    impl UploadTransport for RecordingTransport {
        async fn transmit(&self, operation: &UploadOperation, body: Bytes) -> Result<(), ApiError> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_from_call.is_some_and(|n| sent.len() >= n) {
                return Err(ApiError::Status {
                    status: 500,
                    message: "storage backend unavailable".into(),
                });
            }
            sent.push((operation.offset, body));
            Ok(())
        }
    }

    fn op(offset: u64, length: u64) -> UploadOperation {
        UploadOperation {
            method: "PUT".into(),
            url: format!("https://upload.courier.example/part-{offset}"),
            request_headers: Vec::new(),
            offset,
            length,
        }
    }

    async fn temp_file(data: &[u8]) -> (tempfile::NamedTempFile, File) {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(data).unwrap();
        tmp.flush().unwrap();
        let file = File::open(tmp.path()).await.unwrap();
        (tmp, file)
    }

    #[tokio::test]
    async fn test_reassembly_reproduces_file() {
        let mut data = vec![0u8; 50_000];
        rand::rng().fill_bytes(&mut data);
        let (_tmp, mut file) = temp_file(&data).await;

        // Uneven partition that exactly covers [0, size), executed out of
        // offset order.
        let ops = vec![op(20_000, 30_000), op(0, 12_345), op(12_345, 7_655)];
        let transport = RecordingTransport::new();
        let cancel = CancellationToken::new();

        execute_operations(&transport, &mut file, data.len() as u64, &ops, &cancel)
            .await
            .unwrap();

        let mut sent = transport.sent.into_inner().unwrap();
        assert_eq!(sent.len(), 3);
        sent.sort_by_key(|(offset, _)| *offset);
        let reassembled: Vec<u8> = sent.iter().flat_map(|(_, b)| b.iter().copied()).collect();
        assert_eq!(reassembled, data);
    }

    #[tokio::test]
    async fn test_short_read() {
        let (_tmp, mut file) = temp_file(&[1u8; 100]).await;
        let ops = vec![op(0, 100), op(100, 50)];
        let transport = RecordingTransport::new();
        let cancel = CancellationToken::new();

        let err = execute_operations(&transport, &mut file, 100, &ops, &cancel)
            .await
            .unwrap_err();

        match err {
            UploadError::ShortRead {
                offset,
                expected,
                actual,
            } => {
                assert_eq!(offset, 100);
                assert_eq!(expected, 50);
                assert_eq!(actual, 0);
            }
            other => panic!("expected ShortRead, got {other:?}"),
        }
        // The first operation still went out before the failure.
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_first_failure_aborts_remaining_operations() {
        let (_tmp, mut file) = temp_file(&[9u8; 300]).await;
        let ops = vec![op(0, 100), op(100, 100), op(200, 100)];
        let transport = RecordingTransport::failing_from(1);
        let cancel = CancellationToken::new();

        let err = execute_operations(&transport, &mut file, 300, &ops, &cancel)
            .await
            .unwrap_err();

        match err {
            UploadError::Transport { url, .. } => assert!(url.contains("part-100")),
            other => panic!("expected Transport, got {other:?}"),
        }
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (_tmp, mut file) = temp_file(&[0u8; 10]).await;
        let ops = vec![op(0, 10)];
        let transport = RecordingTransport::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = execute_operations(&transport, &mut file, 10, &ops, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
        assert!(transport.sent.lock().unwrap().is_empty());
    }
}
