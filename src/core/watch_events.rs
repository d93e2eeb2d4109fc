//! Events funnelled from the poller, the realtime feed and the progress driver into the watch loop

use crate::core::generation::GenerationStatus;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Progress(f64),
    Status(GenerationStatus),
    Completed { output_url: Option<String> },
    Failed { message: String },
}

/// Callbacks fire from synchronous contexts, so the channel never applies backpressure
pub type WatchSender = mpsc::UnboundedSender<WatchEvent>;
pub type WatchReceiver = mpsc::UnboundedReceiver<WatchEvent>;

pub fn create_watch_channel() -> (WatchSender, WatchReceiver) {
    mpsc::unbounded_channel()
}
