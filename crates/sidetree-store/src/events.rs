use std::sync::{Arc, RwLock, Weak};

use sidetree_types::{Namespace, UniqueSuffix};

/// Receives `suffix_mutated` notifications.
///
/// Called synchronously on the writer's thread after the write is visible,
/// so a listener that drops cached state observes the new log on its next read.
pub trait MutationListener: Send + Sync {
    fn on_suffix_mutated(&self, namespace: &Namespace, suffix: &UniqueSuffix);
}

/// Fan-out of mutation notifications to weakly-held listeners.
///
/// Dropped listeners are pruned on the next notification.
#[derive(Default)]
pub struct MutationHub {
    listeners: RwLock<Vec<Weak<dyn MutationListener>>>,
}

impl MutationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: &Arc<dyn MutationListener>) {
        self.listeners
            .write()
            .expect("lock poisoned")
            .push(Arc::downgrade(listener));
    }

    pub fn notify(&self, namespace: &Namespace, suffix: &UniqueSuffix) {
        let live: Vec<Arc<dyn MutationListener>> = {
            let mut listeners = self.listeners.write().expect("lock poisoned");
            listeners.retain(|w| w.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in live {
            listener.on_suffix_mutated(namespace, suffix);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for MutationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
