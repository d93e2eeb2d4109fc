pub mod animation;
pub mod api_client;
pub mod config;
pub mod error_log;
pub mod generation;
pub mod latch;
pub mod models;
pub mod poller;
pub mod progress_bar;
pub mod realtime;
pub mod seeded_random;
pub mod sync_tracker;
pub mod watch_events;
