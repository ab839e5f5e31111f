use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sidetree_protocol::ProtocolRegistry;
use sidetree_types::Namespace;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{BatchError, BatchResult};
use crate::queue::{OperationQueue, PendingOperation, QueuedOperation};

/// Outcome of [`BatchCutter::cut`].
#[derive(Clone, Debug, PartialEq)]
pub enum CutResult {
    Empty,
    Ready(Vec<QueuedOperation>),
    Pending { size: usize },
}

/// Cut policy over a namespace's operation queue.
///
/// A cut detaches `max_operations_per_batch` operations of the current
/// protocol as soon as that many are queued, or everything when forced.
pub struct BatchCutter {
    namespace: Namespace,
    queue: Arc<dyn OperationQueue>,
    protocols: Arc<ProtocolRegistry>,
    closed: AtomicBool,
    added: Notify,
}

impl BatchCutter {
    pub fn new(queue: Arc<dyn OperationQueue>, protocols: Arc<ProtocolRegistry>) -> Self {
        Self {
            namespace: protocols.namespace().clone(),
            queue,
            protocols,
            closed: AtomicBool::new(false),
            added: Notify::new(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Enqueue and return the queue length. Refused once closed.
    pub fn add(&self, operation: PendingOperation) -> BatchResult<usize> {
        if self.is_closed() {
            return Err(BatchError::Shutdown);
        }
        let len = self.queue.add(operation)?;
        self.added.notify_one();
        Ok(len)
    }

    pub fn cut(&self, force: bool) -> BatchResult<CutResult> {
        let n = self.queue.len();
        let max = self.protocols.current().max_operations_per_batch as usize;
        if n == 0 {
            return Ok(CutResult::Empty);
        }
        if n < max && !force {
            return Ok(CutResult::Pending { size: n });
        }
        let ops = self.queue.take(max)?;
        if ops.is_empty() {
            return Ok(CutResult::Empty);
        }
        debug!(
            namespace = %self.namespace,
            ops = ops.len(),
            remaining = self.queue.len(),
            force,
            "batch cut"
        );
        Ok(CutResult::Ready(ops))
    }

    pub fn peek(&self) -> Vec<QueuedOperation> {
        self.queue.peek()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn requeue(&self, operations: Vec<QueuedOperation>) -> BatchResult<()> {
        self.queue.requeue(operations)
    }

    pub fn ack(&self, operations: &[QueuedOperation]) -> BatchResult<()> {
        self.queue.ack(operations)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.added.notify_one();
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves after the next `add` (or immediately if one happened since
    /// the last wait).
    pub async fn added(&self) {
        self.added.notified().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::tests::pending;
    use crate::queue::InMemoryQueue;
    use sidetree_protocol::ProtocolParameters;

    fn cutter(max: u32) -> BatchCutter {
        let params = ProtocolParameters {
            max_operations_per_batch: max,
            ..ProtocolParameters::default()
        };
        let registry =
            ProtocolRegistry::new(Namespace::new("did:sidetree").unwrap(), vec![params]).unwrap();
        BatchCutter::new(Arc::new(InMemoryQueue::new()), Arc::new(registry))
    }

    fn fill(c: &BatchCutter, n: usize) {
        for i in 0..n {
            c.add(pending(&format!("op{i}"))).unwrap();
        }
    }

    // ---- cut policy ----

    #[test]
    fn empty_queue_cuts_empty_even_when_forced() {
        let c = cutter(3);
        assert_eq!(c.cut(false).unwrap(), CutResult::Empty);
        assert_eq!(c.cut(true).unwrap(), CutResult::Empty);
    }

    #[test]
    fn below_max_is_pending_unless_forced() {
        let c = cutter(3);
        fill(&c, 2);
        assert_eq!(c.cut(false).unwrap(), CutResult::Pending { size: 2 });
        match c.cut(true).unwrap() {
            CutResult::Ready(ops) => assert_eq!(ops.len(), 2),
            other => panic!("expected Ready, got {other:?}"),
        }
        assert!(c.is_empty());
    }

    #[test]
    fn exactly_max_produces_one_full_batch() {
        let c = cutter(3);
        fill(&c, 3);
        match c.cut(false).unwrap() {
            CutResult::Ready(ops) => assert_eq!(ops.len(), 3),
            other => panic!("expected Ready, got {other:?}"),
        }
        assert!(c.is_empty());
    }

    #[test]
    fn max_plus_k_leaves_k() {
        let c = cutter(3);
        fill(&c, 5);
        match c.cut(false).unwrap() {
            CutResult::Ready(ops) => {
                let names: Vec<_> = ops
                    .iter()
                    .map(|q| q.operation.unique_suffix.to_string())
                    .collect();
                assert_eq!(names, vec!["op0", "op1", "op2"]);
            }
            other => panic!("expected Ready, got {other:?}"),
        }
        assert_eq!(c.len(), 2);
        assert_eq!(c.cut(false).unwrap(), CutResult::Pending { size: 2 });
    }

    #[test]
    fn forced_cut_is_bounded_by_max() {
        let c = cutter(2);
        fill(&c, 5);
        match c.cut(true).unwrap() {
            CutResult::Ready(ops) => assert_eq!(ops.len(), 2),
            other => panic!("expected Ready, got {other:?}"),
        }
        assert_eq!(c.len(), 3);
    }

    // ---- shutdown ----

    #[test]
    fn closed_cutter_rejects_add() {
        let c = cutter(3);
        c.close();
        assert!(matches!(c.add(pending("x")), Err(BatchError::Shutdown)));
        c.reopen();
        assert_eq!(c.add(pending("x")).unwrap(), 1);
    }

    #[tokio::test]
    async fn add_wakes_waiter() {
        let c = Arc::new(cutter(3));
        let waiter = {
            let c = Arc::clone(&c);
            tokio::spawn(async move { c.added().await })
        };
        c.add(pending("x")).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
