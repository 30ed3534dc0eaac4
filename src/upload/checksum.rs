//! Content checksum computation
//!
//! Streams a file once, start to finish, to produce the SHA-256 digest the
//! server verifies the uploaded bytes against. The digest must come from a
//! fresh read of the exact bytes that are transmitted, so the computer works
//! on the same open file handle the executor later reads ranges from.

use super::UploadError;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

/// Read buffer size. Keeps memory flat regardless of file size.
const READ_BUF_SIZE: usize = 64 * 1024;

/// Compute the hex-encoded SHA-256 digest of the whole file.
///
/// Seeks to the start first, then reads in fixed-size chunks without ever
/// buffering the full content.
pub async fn digest_file(file: &mut File) -> Result<String, UploadError> {
    file.seek(SeekFrom::Start(0)).await?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the hex-encoded SHA-256 digest of an in-memory buffer.
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
