//! Incremental, bounded capture of child output streams

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

const CHUNK_SIZE: usize = 8 * 1024;

/// Byte budget shared by all streams of one run
#[derive(Debug, Clone)]
pub(crate) struct OutputBudget {
    remaining: Arc<AtomicUsize>,
    truncated: Arc<AtomicBool>,
}

impl OutputBudget {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            remaining: Arc::new(AtomicUsize::new(limit)),
            truncated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim up to `want` bytes, returning how many may be kept
    pub(crate) fn reserve(&self, want: usize) -> usize {
        let mut current = self.remaining.load(Ordering::Acquire);
        loop {
            let grant = current.min(want);
            match self.remaining.compare_exchange_weak(
                current,
                current - grant,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if grant < want {
                        self.truncated.store(true, Ordering::Release);
                    }
                    return grant;
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn is_truncated(&self) -> bool {
        self.truncated.load(Ordering::Acquire)
    }
}

/// A background task draining one stream into a request-local buffer
///
/// Bytes past the budget are read and discarded so the child never blocks
/// on a full pipe.
#[derive(Debug)]
pub(crate) struct StreamCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl StreamCapture {
    pub(crate) fn spawn<R>(reader: Option<R>, budget: OutputBudget) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let task = tokio::spawn(async move {
            let Some(mut reader) = reader else {
                return;
            };
            let mut chunk = vec![0u8; CHUNK_SIZE];

            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        let keep = budget.reserve(n);
                        if keep > 0 {
                            sink.lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .extend_from_slice(&chunk[..keep]);
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!(error = %e, "output stream read failed");
                        break;
                    }
                }
            }
        });

        Self { buffer, task }
    }

    /// Wait up to `grace` for the stream to reach EOF
    pub(crate) async fn settle(&mut self, grace: Duration) -> bool {
        if self.task.is_finished() {
            return true;
        }
        tokio::time::timeout(grace, &mut self.task).await.is_ok()
    }

    /// Stop reading and take everything captured so far
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.task.abort();
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buffer)
    }
}

impl Drop for StreamCapture {
    fn drop(&mut self) {
        self.task.abort();
    }
}
