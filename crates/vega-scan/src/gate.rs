// vega-scan/src/gate.rs
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::debug;
use vega_classify::{EngineError, Result};
use vega_model::InferenceError;

/// Counting gate bounding how many full-image scans hold compute resources
/// at once. Cloning shares the same slots.
#[derive(Debug, Clone)]
pub struct ScanGate {
    slots: Arc<Semaphore>,
    capacity: usize,
}

/// One held slot; released when dropped.
#[derive(Debug)]
pub struct ScanPermit {
    _permit: OwnedSemaphorePermit,
}

impl ScanGate {
    /// A gate with `capacity` slots; zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a slot frees. There is no timeout.
    pub async fn acquire(&self) -> Result<ScanPermit> {
        if self.slots.available_permits() == 0 {
            debug!(capacity = self.capacity, "scan gate full, waiting");
        }
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| EngineError::Inference(InferenceError::Backend(format!("scan gate closed: {e}"))))?;
        Ok(ScanPermit { _permit: permit })
    }

    /// A slot if one is free right now.
    pub fn try_acquire(&self) -> Option<ScanPermit> {
        match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => Some(ScanPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ScanGate {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_ok, task};

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(ScanGate::new(0).capacity(), 1);
    }

    #[test]
    fn permits_return_on_drop() {
        let gate = ScanGate::new(2);
        let a = gate.try_acquire().unwrap();
        let b = gate.try_acquire().unwrap();
        assert!(gate.try_acquire().is_none());
        drop(a);
        assert_eq!(gate.available(), 1);
        drop(b);
        assert_eq!(gate.available(), 2);
    }

    #[test]
    fn third_caller_waits_for_a_slot() {
        let gate = ScanGate::new(2);
        let first = gate.try_acquire().unwrap();
        let _second = gate.try_acquire().unwrap();

        let mut waiting = task::spawn(gate.acquire());
        assert_pending!(waiting.poll());

        drop(first);
        assert!(waiting.is_woken());
        let _third = assert_ready_ok!(waiting.poll());
        assert_eq!(gate.available(), 0);
    }
}
