//! Timeout enforcement.
//!
//! HTTP deadlines are set on the reqwest client; this covers everything
//! else that can hang (archival subprocesses).

use std::future::Future;
use std::time::Duration;

/// Await `fut`, giving up after `limit`. `None` means the deadline passed.
pub async fn with_deadline<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}
