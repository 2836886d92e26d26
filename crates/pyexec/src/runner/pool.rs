//! Admission control for interpreter runs

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};

/// Errors returned when a submission cannot get an execution slot
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no execution slot became free within {0:?}")]
    Saturated(Duration),

    #[error("execution pool is closed")]
    Closed,
}

/// Bounded set of execution slots
///
/// Holding a permit entitles a submission to materialize one artifact and
/// run one interpreter. The permit is released when dropped.
#[derive(Debug, Clone)]
pub struct ExecutionPool {
    /// Semaphore limiting concurrent runs
    semaphore: Arc<Semaphore>,

    /// Number of slots in the pool
    capacity: usize,

    /// How long a submission waits for a slot
    queue_timeout: Duration,
}

impl ExecutionPool {
    /// Create a pool with `capacity` slots (at least one)
    pub fn new(capacity: usize, queue_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_timeout,
        }
    }

    /// Wait for a free slot
    #[instrument(skip(self))]
    pub async fn admit(&self) -> Result<OwnedSemaphorePermit, PoolError> {
        let acquire = Arc::clone(&self.semaphore).acquire_owned();

        match tokio::time::timeout(self.queue_timeout, acquire).await {
            Ok(Ok(permit)) => {
                debug!(available = self.available(), "execution slot acquired");
                Ok(permit)
            }
            Ok(Err(_)) => Err(PoolError::Closed),
            Err(_) => {
                warn!(capacity = self.capacity, wait = ?self.queue_timeout, "execution pool saturated");
                Err(PoolError::Saturated(self.queue_timeout))
            }
        }
    }

    /// Stop admitting submissions; waiters fail with [`PoolError::Closed`]
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Get the number of free slots
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get the total number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
