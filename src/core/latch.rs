use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Remembers which generations already had their terminal state reported.
///
/// Clones share the same set, so a poller and a realtime reconciler watching
/// the same id surface its completion or failure exactly once between them.
#[derive(Debug, Clone, Default)]
pub struct TerminalLatch {
    notified: Arc<Mutex<HashSet<String>>>,
}

impl TerminalLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first caller only.
    pub fn try_mark(&self, generation_id: &str) -> bool {
        self.notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(generation_id.to_string())
    }

    pub fn is_marked(&self, generation_id: &str) -> bool {
        self.notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(generation_id)
    }

    /// Forget an id so a later terminal transition is reported again.
    #[allow(dead_code)]
    pub fn clear(&self, generation_id: &str) {
        self.notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(generation_id);
    }
}
