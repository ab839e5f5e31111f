use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use sidetree_types::{Namespace, Operation, UniqueSuffix};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::events::{MutationHub, MutationListener};
use crate::traits::OperationStore;

type LogKey = (Namespace, UniqueSuffix);

/// In-memory operation store.
///
/// Intended for tests and embedding. Logs live in a `HashMap` behind a
/// `RwLock`; writes are serialized, reads run concurrently.
#[derive(Default)]
pub struct InMemoryOperationStore {
    logs: RwLock<HashMap<LogKey, Vec<Operation>>>,
    hub: MutationHub,
}

impl InMemoryOperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored operations across all logs.
    pub fn len(&self) -> usize {
        self.logs
            .read()
            .expect("lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Suffixes with at least one operation in `namespace`, sorted.
    pub fn suffixes(&self, namespace: &Namespace) -> Vec<UniqueSuffix> {
        let logs = self.logs.read().expect("lock poisoned");
        let mut out: Vec<_> = logs
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, s)| s.clone())
            .collect();
        out.sort();
        out
    }
}

impl OperationStore for InMemoryOperationStore {
    fn put(&self, ops: &[Operation]) -> StoreResult<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut touched: Vec<LogKey> = Vec::new();
        {
            let mut logs = self.logs.write().expect("lock poisoned");

            // Validate everything before mutating so the write is atomic.
            let mut incoming: HashSet<(&Namespace, &UniqueSuffix, _)> = HashSet::new();
            for op in ops {
                let key = (op.namespace.clone(), op.unique_suffix.clone());
                let exists = logs
                    .get(&key)
                    .is_some_and(|log| log.binary_search_by(|o| o.position.cmp(&op.position)).is_ok());
                if exists || !incoming.insert((&op.namespace, &op.unique_suffix, op.position)) {
                    return Err(StoreError::Duplicate {
                        suffix: op.unique_suffix.clone(),
                        position: op.position,
                    });
                }
            }

            let mut seen: BTreeSet<LogKey> = BTreeSet::new();
            for op in ops {
                let key = (op.namespace.clone(), op.unique_suffix.clone());
                let log = logs.entry(key.clone()).or_default();
                match log.last() {
                    Some(last) if last.position > op.position => {
                        let idx = log.partition_point(|o| o.position < op.position);
                        log.insert(idx, op.clone());
                    }
                    _ => log.push(op.clone()),
                }
                if seen.insert(key.clone()) {
                    touched.push(key);
                }
            }
        }

        debug!(ops = ops.len(), suffixes = touched.len(), "operations stored");
        for (namespace, suffix) in &touched {
            self.hub.notify(namespace, suffix);
        }
        Ok(())
    }

    fn get(&self, namespace: &Namespace, suffix: &UniqueSuffix) -> StoreResult<Vec<Operation>> {
        let logs = self.logs.read().expect("lock poisoned");
        Ok(logs
            .get(&(namespace.clone(), suffix.clone()))
            .cloned()
            .unwrap_or_default())
    }

    fn subscribe(&self, listener: &Arc<dyn MutationListener>) {
        self.hub.subscribe(listener);
    }
}

impl std::fmt::Debug for InMemoryOperationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryOperationStore")
            .field("operations", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sidetree_types::{CasAddress, OperationRequest, TxnPosition};
    use std::sync::Mutex;

    fn ns() -> Namespace {
        Namespace::new("did:sidetree").unwrap()
    }

    fn suffix(s: &str) -> UniqueSuffix {
        UniqueSuffix::new(s).unwrap()
    }

    fn op(s: &str, t: u64, n: u32, i: u32) -> Operation {
        Operation {
            namespace: ns(),
            unique_suffix: suffix(s),
            position: TxnPosition::new(t, n, i),
            protocol_generation: 0,
            anchor_origin: CasAddress::new("EiAcore").unwrap(),
            request: OperationRequest::Deactivate {
                did_suffix: suffix(s),
                reveal_value: "EiAr".into(),
                signed_data: "a.b.c".into(),
            },
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<UniqueSuffix>>);

    impl MutationListener for Recorder {
        fn on_suffix_mutated(&self, _ns: &Namespace, suffix: &UniqueSuffix) {
            self.0.lock().unwrap().push(suffix.clone());
        }
    }

    // -----------------------------------------------------------------------
    // Put / get
    // -----------------------------------------------------------------------

    #[test]
    fn put_and_get_in_order() {
        let store = InMemoryOperationStore::new();
        store.put(&[op("A", 1, 0, 0), op("B", 1, 0, 1), op("A", 1, 0, 2)]).unwrap();
        let log = store.get(&ns(), &suffix("A")).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].position, TxnPosition::new(1, 0, 0));
        assert_eq!(log[1].position, TxnPosition::new(1, 0, 2));
        assert_eq!(store.len(), 3);
        assert_eq!(store.suffixes(&ns()), vec![suffix("A"), suffix("B")]);
    }

    #[test]
    fn unknown_suffix_is_empty() {
        let store = InMemoryOperationStore::new();
        assert!(store.get(&ns(), &suffix("nope")).unwrap().is_empty());
    }

    #[test]
    fn namespaces_are_isolated() {
        let store = InMemoryOperationStore::new();
        store.put(&[op("A", 1, 0, 0)]).unwrap();
        let other = Namespace::new("did:other").unwrap();
        assert!(store.get(&other, &suffix("A")).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Duplicate rejection
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_position_rejects_whole_put() {
        let store = InMemoryOperationStore::new();
        store.put(&[op("A", 1, 0, 0)]).unwrap();
        let err = store.put(&[op("B", 2, 0, 0), op("A", 1, 0, 0)]).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
        assert!(store.get(&ns(), &suffix("B")).unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_within_one_put_rejected() {
        let store = InMemoryOperationStore::new();
        assert!(store.put(&[op("A", 1, 0, 0), op("A", 1, 0, 0)]).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn contains_checks_position() {
        let store = InMemoryOperationStore::new();
        store.put(&[op("A", 4, 1, 2)]).unwrap();
        assert!(store.contains(&ns(), &suffix("A"), &TxnPosition::new(4, 1, 2)).unwrap());
        assert!(!store.contains(&ns(), &suffix("A"), &TxnPosition::new(4, 1, 3)).unwrap());
    }

    // -----------------------------------------------------------------------
    // Notifications
    // -----------------------------------------------------------------------

    #[test]
    fn notifies_once_per_suffix() {
        let store = InMemoryOperationStore::new();
        let rec = Arc::new(Recorder::default());
        let listener: Arc<dyn MutationListener> = rec.clone();
        store.subscribe(&listener);
        store
            .put(&[op("A", 1, 0, 0), op("A", 1, 0, 1), op("B", 1, 0, 2)])
            .unwrap();
        assert_eq!(*rec.0.lock().unwrap(), vec![suffix("A"), suffix("B")]);
    }

    #[test]
    fn failed_put_does_not_notify() {
        let store = InMemoryOperationStore::new();
        store.put(&[op("A", 1, 0, 0)]).unwrap();
        let rec = Arc::new(Recorder::default());
        let listener: Arc<dyn MutationListener> = rec.clone();
        store.subscribe(&listener);
        assert!(store.put(&[op("A", 1, 0, 0)]).is_err());
        assert!(rec.0.lock().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Ordering invariant
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn logs_stay_strictly_ordered(
            positions in proptest::collection::vec((0u64..20, 0u32..3, 0u32..3), 1..40)
        ) {
            let store = InMemoryOperationStore::new();
            for (t, n, i) in positions {
                // Duplicates are rejected; ordering must hold regardless.
                let _ = store.put(&[op("A", t, n, i)]);
            }
            let log = store.get(&ns(), &suffix("A")).unwrap();
            prop_assert!(log.windows(2).all(|w| w[0].position < w[1].position));
        }
    }
}
