use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::state::FormState;
use super::value::FieldName;

/// External home of the synchronized form state.
///
/// The control reads the slot to skip redundant writes and writes it at every
/// synchronization point. A UI layer implements this to learn when to
/// re-render. Implementations must not call back into the control from `set`.
pub trait FormStateSlot<K: FieldName>: Send + Sync + 'static {
    fn get(&self) -> FormState<K>;
    fn set(&self, state: FormState<K>);
}

#[derive(Clone)]
pub struct InMemoryStateSlot<K: FieldName> {
    state: Arc<RwLock<FormState<K>>>,
    version: Arc<AtomicU64>,
}

impl<K: FieldName> InMemoryStateSlot<K> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(FormState::default())),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of writes the slot has received.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

impl<K: FieldName> Default for InMemoryStateSlot<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: FieldName> FormStateSlot<K> for InMemoryStateSlot<K> {
    fn get(&self) -> FormState<K> {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.clone()
    }

    fn set(&self, state: FormState<K>) {
        let mut slot = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = state;
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}
