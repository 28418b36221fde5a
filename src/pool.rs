use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ImportError;

/// Caps how many pages are rendered at once.
///
/// Each render holds a permit for its whole lifetime. Callers that cannot get
/// one within the queue timeout are turned away with [`ImportError::Busy`].
#[derive(Debug, Clone)]
pub struct RenderPool {
    permits: Arc<Semaphore>,
    capacity: usize,
    queue_timeout: Duration,
}

impl RenderPool {
    pub fn new(capacity: usize, queue_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        RenderPool {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            queue_timeout,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free render slots right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ImportError> {
        match tokio::time::timeout(self.queue_timeout, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(ImportError::Busy("render pool is closed".to_string())),
            Err(_) => Err(ImportError::Busy(format!(
                "all {} render slots stayed taken for {:?}",
                self.capacity, self.queue_timeout
            ))),
        }
    }
}
