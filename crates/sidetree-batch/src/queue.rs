use std::collections::VecDeque;
use std::sync::Mutex;

use sidetree_types::{OperationRequest, OperationType, UniqueSuffix};

use crate::error::BatchResult;

/// An operation accepted at ingress, waiting to be batched.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingOperation {
    pub unique_suffix: UniqueSuffix,
    pub request: OperationRequest,
}

impl PendingOperation {
    pub fn new(unique_suffix: UniqueSuffix, request: OperationRequest) -> Self {
        Self {
            unique_suffix,
            request,
        }
    }

    pub fn operation_type(&self) -> OperationType {
        self.request.operation_type()
    }
}

/// A pending operation stamped with its enqueue sequence number.
///
/// Sequence numbers are strictly increasing per queue and define FIFO order.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedOperation {
    pub seq: u64,
    pub operation: PendingOperation,
}

/// FIFO of pending operations for one namespace.
///
/// Many producers call [`add`](Self::add); a single consumer detaches the
/// head with [`take`](Self::take), then either [`ack`](Self::ack)s the
/// operations once their anchor commits or [`requeue`](Self::requeue)s them.
pub trait OperationQueue: Send + Sync {
    /// Append and return the queue length after the append.
    fn add(&self, operation: PendingOperation) -> BatchResult<usize>;

    /// Detach up to `max` operations from the head.
    fn take(&self, max: usize) -> BatchResult<Vec<QueuedOperation>>;

    /// Return detached operations to the head, preserving their order.
    fn requeue(&self, operations: Vec<QueuedOperation>) -> BatchResult<()>;

    /// Durably forget detached operations.
    fn ack(&self, operations: &[QueuedOperation]) -> BatchResult<()>;

    /// Snapshot of the queue; does not detach anything.
    fn peek(&self) -> Vec<QueuedOperation>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared FIFO state used by both queue implementations.
#[derive(Debug, Default)]
pub(crate) struct Fifo {
    pub(crate) items: VecDeque<QueuedOperation>,
    pub(crate) next_seq: u64,
    /// Operations taken but neither acked nor requeued.
    pub(crate) in_flight: usize,
}

impl Fifo {
    pub(crate) fn push(&mut self, operation: PendingOperation) -> QueuedOperation {
        let queued = QueuedOperation {
            seq: self.next_seq,
            operation,
        };
        self.next_seq += 1;
        self.items.push_back(queued.clone());
        queued
    }

    pub(crate) fn take(&mut self, max: usize) -> Vec<QueuedOperation> {
        let n = max.min(self.items.len());
        let taken: Vec<_> = self.items.drain(..n).collect();
        self.in_flight += taken.len();
        taken
    }

    pub(crate) fn requeue(&mut self, operations: Vec<QueuedOperation>) {
        self.in_flight = self.in_flight.saturating_sub(operations.len());
        for op in operations.into_iter().rev() {
            self.items.push_front(op);
        }
    }

    pub(crate) fn settle(&mut self, count: usize) {
        self.in_flight = self.in_flight.saturating_sub(count);
    }
}

/// Volatile queue. Operations are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    fifo: Mutex<Fifo>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OperationQueue for InMemoryQueue {
    fn add(&self, operation: PendingOperation) -> BatchResult<usize> {
        let mut fifo = self.fifo.lock().expect("lock poisoned");
        fifo.push(operation);
        Ok(fifo.items.len())
    }

    fn take(&self, max: usize) -> BatchResult<Vec<QueuedOperation>> {
        Ok(self.fifo.lock().expect("lock poisoned").take(max))
    }

    fn requeue(&self, operations: Vec<QueuedOperation>) -> BatchResult<()> {
        self.fifo.lock().expect("lock poisoned").requeue(operations);
        Ok(())
    }

    fn ack(&self, operations: &[QueuedOperation]) -> BatchResult<()> {
        self.fifo.lock().expect("lock poisoned").settle(operations.len());
        Ok(())
    }

    fn peek(&self) -> Vec<QueuedOperation> {
        self.fifo
            .lock()
            .expect("lock poisoned")
            .items
            .iter()
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.fifo.lock().expect("lock poisoned").items.len()
    }
}
