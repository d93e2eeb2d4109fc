pub mod plain_reporter;
pub mod progress_view;

pub use plain_reporter::PlainReporter;
pub use progress_view::{InlineRenderer, ProgressView};
