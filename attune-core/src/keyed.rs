//! Map of independently locked per-key slots.
//!
//! The outer `RwLock` is held only to find or create a slot; all work on a
//! key's state happens under that key's own `Mutex`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

pub(crate) struct KeyedSlots<K, V> {
    slots: RwLock<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> KeyedSlots<K, V>
where
    K: Eq + Hash + Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Find a key's slot, creating it with `init` on first use.
    pub(crate) async fn get_or_insert_with(&self, key: &K, init: impl FnOnce() -> V) -> Arc<Mutex<V>> {
        if let Some(slot) = self.slots.read().await.get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(init()))),
        )
    }

    pub(crate) async fn get(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.slots.read().await.get(key).cloned()
    }

    pub(crate) async fn len(&self) -> usize {
        self.slots.read().await.len()
    }
}
