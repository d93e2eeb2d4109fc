//! Push-channel status updates for a set of tracked generations

use crate::core::generation::{GenerationEvent, GenerationRecord, GenerationStatus};
use crate::core::latch::TerminalLatch;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

pub type EventHandler = Arc<dyn Fn(GenerationEvent) + Send + Sync>;
pub type RecordCallback = Arc<dyn Fn(&GenerationRecord) + Send + Sync>;

/// Live subscription to a feed. Dropping it does not unsubscribe on its own;
/// the owner calls [`unsubscribe`](Subscription::unsubscribe).
pub trait Subscription: Send {
    fn unsubscribe(&mut self);
}

/// A source of generation update events scoped to one user.
pub trait GenerationFeed: Send + Sync {
    fn subscribe(&self, user_id: &str, handler: EventHandler) -> Box<dyn Subscription>;
}

/// Callbacks dispatched by status. Swapped in place, never resubscribing.
#[derive(Clone, Default)]
pub struct RealtimeHandlers {
    pub on_complete: Option<RecordCallback>,
    pub on_failed: Option<RecordCallback>,
    pub on_processing: Option<RecordCallback>,
}

impl RealtimeHandlers {
    pub fn on_complete(mut self, callback: impl Fn(&GenerationRecord) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    pub fn on_failed(mut self, callback: impl Fn(&GenerationRecord) + Send + Sync + 'static) -> Self {
        self.on_failed = Some(Arc::new(callback));
        self
    }

    pub fn on_processing(
        mut self,
        callback: impl Fn(&GenerationRecord) + Send + Sync + 'static,
    ) -> Self {
        self.on_processing = Some(Arc::new(callback));
        self
    }
}

/// Stable key for a subscription: the user plus the sorted, deduplicated ids.
pub fn subscription_key(user_id: &str, generation_ids: &[String]) -> String {
    let ids: BTreeSet<&str> = generation_ids.iter().map(String::as_str).collect();
    let joined: Vec<&str> = ids.into_iter().collect();
    format!("{user_id}:{}", joined.join(","))
}

/// Routes push events for tracked generations to status callbacks.
///
/// The subscription lives as long as the user and the tracked id set stay
/// the same; handler changes go through [`set_handlers`](Self::set_handlers).
pub struct RealtimeReconciler {
    feed: Arc<dyn GenerationFeed>,
    handlers: Arc<RwLock<RealtimeHandlers>>,
    latch: Option<TerminalLatch>,
    subscription: Option<Box<dyn Subscription>>,
    key: Option<String>,
}

impl RealtimeReconciler {
    pub fn new(feed: Arc<dyn GenerationFeed>) -> Self {
        Self {
            feed,
            handlers: Arc::new(RwLock::new(RealtimeHandlers::default())),
            latch: None,
            subscription: None,
            key: None,
        }
    }

    pub fn with_latch(mut self, latch: TerminalLatch) -> Self {
        self.latch = Some(latch);
        self
    }

    pub fn set_handlers(&self, handlers: RealtimeHandlers) {
        *self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handlers;
    }

    pub fn subscription_key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    #[allow(dead_code)]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Re-evaluate the subscription for a user and the ids they care about.
    pub fn update(&mut self, user_id: Option<&str>, generation_ids: &[String]) {
        let user_id = match user_id {
            Some(user) if !user.trim().is_empty() && !generation_ids.is_empty() => user,
            _ => {
                self.teardown();
                return;
            }
        };

        let key = subscription_key(user_id, generation_ids);
        if self.key.as_deref() == Some(key.as_str()) {
            return;
        }

        self.teardown();

        let tracked: HashSet<String> = generation_ids.iter().cloned().collect();
        let handlers = Arc::clone(&self.handlers);
        let latch = self.latch.clone();
        let handler: EventHandler =
            Arc::new(move |event| dispatch(&tracked, &handlers, latch.as_ref(), event));

        info!(
            "Subscribing to generation updates for {user_id} ({} tracked)",
            generation_ids.len()
        );
        self.subscription = Some(self.feed.subscribe(user_id, handler));
        self.key = Some(key);
    }

    fn teardown(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!("Unsubscribed from generation updates");
        }
        self.key = None;
    }
}

impl Drop for RealtimeReconciler {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn dispatch(
    tracked: &HashSet<String>,
    handlers: &RwLock<RealtimeHandlers>,
    latch: Option<&TerminalLatch>,
    event: GenerationEvent,
) {
    let record = event.new;
    if !tracked.contains(&record.id) {
        debug!("Ignoring update for untracked generation {}", record.id);
        return;
    }

    let callback = {
        let handlers = handlers.read().unwrap_or_else(PoisonError::into_inner);
        match record.status {
            GenerationStatus::Completed => handlers.on_complete.clone(),
            GenerationStatus::Failed => handlers.on_failed.clone(),
            GenerationStatus::Processing => handlers.on_processing.clone(),
            GenerationStatus::Pending => None,
        }
    };

    if let Some(latch) = latch {
        let suppressed = match record.status {
            GenerationStatus::Completed | GenerationStatus::Failed => !latch.try_mark(&record.id),
            GenerationStatus::Processing => latch.is_marked(&record.id),
            GenerationStatus::Pending => false,
        };
        if suppressed {
            warn!(
                "Dropping {} update for {}: terminal state already reported",
                record.status, record.id
            );
            return;
        }
    }

    if let Some(callback) = callback {
        callback(&record);
    }
}
