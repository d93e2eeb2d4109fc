use crate::core::generation::{
    FetchError, GenerationEvent, GenerationRecord, GenerationSource, GenerationStatus,
};
use crate::core::realtime::{EventHandler, GenerationFeed, Subscription};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn sample_record(id: &str, status: GenerationStatus) -> GenerationRecord {
    let mut record = GenerationRecord::new(id, status);
    record.project_id = Some("project-1".to_string());
    record.input_url = Some(format!("https://cdn.example.com/inputs/{id}.png"));
    record
}

/// Replays canned responses in order. The last response repeats forever.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<GenerationRecord, FetchError>>>,
    requested: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<GenerationRecord, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requested: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(record: GenerationRecord) -> Self {
        Self::new(vec![Ok(record)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested_ids(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationSource for ScriptedSource {
    async fn fetch_generation_status(&self, id: &str) -> Result<GenerationRecord, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(id.to_string());

        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            responses
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::NotFound(id.to_string())))
        } else {
            responses
                .front()
                .cloned()
                .unwrap_or_else(|| Err(FetchError::NotFound(id.to_string())))
        }
    }
}

#[derive(Default)]
struct FeedInner {
    next_id: u64,
    subscribers: HashMap<u64, (String, EventHandler)>,
}

/// In-process feed. `publish` delivers synchronously to every subscriber of
/// that user, outside the internal lock.
#[derive(Clone, Default)]
pub struct InMemoryFeed {
    inner: Arc<Mutex<FeedInner>>,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, user_id: &str, record: GenerationRecord) -> usize {
        let handlers: Vec<EventHandler> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner
                .subscribers
                .values()
                .filter(|(owner, _)| owner == user_id)
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        for handler in &handlers {
            handler(GenerationEvent {
                new: record.clone(),
            });
        }
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }
}

impl GenerationFeed for InMemoryFeed {
    fn subscribe(&self, user_id: &str, handler: EventHandler) -> Box<dyn Subscription> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .subscribers
            .insert(id, (user_id.to_string(), handler));
        Box::new(InMemorySubscription {
            feed: Arc::clone(&self.inner),
            id: Some(id),
        })
    }
}

struct InMemorySubscription {
    feed: Arc<Mutex<FeedInner>>,
    id: Option<u64>,
}

impl Subscription for InMemorySubscription {
    fn unsubscribe(&mut self) {
        if let Some(id) = self.id.take() {
            self.feed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .subscribers
                .remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_source_repeats_last_response() {
        let source = ScriptedSource::new(vec![
            Ok(sample_record("a", GenerationStatus::Pending)),
            Ok(sample_record("a", GenerationStatus::Completed)),
        ]);

        let first = source.fetch_generation_status("a").await.unwrap();
        let second = source.fetch_generation_status("a").await.unwrap();
        let third = source.fetch_generation_status("a").await.unwrap();

        assert_eq!(first.status, GenerationStatus::Pending);
        assert_eq!(second.status, GenerationStatus::Completed);
        assert_eq!(third.status, GenerationStatus::Completed);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_reports_not_found() {
        let source = ScriptedSource::new(vec![]);
        let result = source.fetch_generation_status("missing").await;
        assert_eq!(result, Err(FetchError::NotFound("missing".to_string())));
    }
}
