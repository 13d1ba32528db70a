//! Streaming a response body into a cache entry.

use std::path::PathBuf;

use reqwest::Response;

use crate::http::{FetchError, StreamError, stream_body};
use crate::store::{CacheDir, StoreError};

/// Failure of [`stream_to_entry`]. Nothing is left at the target on either variant.
#[derive(Debug)]
pub(crate) enum TransferError {
    Fetch(FetchError),
    Storage(StoreError),
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        Self::Storage(e)
    }
}

/// Streams `response` into a hidden temp file and renames it to `name`.
///
/// Returns the final path and the number of bytes written. The temp file is
/// removed when the body or the disk fails.
pub(crate) async fn stream_to_entry(
    dir: &CacheDir,
    name: &str,
    response: Response,
    url: &str,
) -> Result<(PathBuf, u64), TransferError> {
    let mut partial = dir.create_partial(name).await?;
    match stream_body(response, url, &mut partial.file).await {
        Ok(bytes) => {
            let path = dir.commit_partial(partial).await?;
            Ok((path, bytes))
        }
        Err(StreamError::Fetch(e)) => {
            dir.discard_partial(partial).await;
            Err(TransferError::Fetch(e))
        }
        Err(StreamError::Write(e)) => {
            let temp = partial.temp_path().to_path_buf();
            dir.discard_partial(partial).await;
            Err(TransferError::Storage(StoreError::io(temp, e)))
        }
    }
}
