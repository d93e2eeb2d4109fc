use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Structured error context for detailed error reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub operation: String,
    pub generation_id: Option<String>,
    pub timestamp: String,
    pub error_type: String,
    pub error_message: String,
    pub request_url: Option<String>,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            generation_id: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            error_type: String::new(),
            error_message: String::new(),
            request_url: None,
            status_code: None,
            response_body: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_generation(mut self, generation_id: &str) -> Self {
        self.generation_id = Some(generation_id.to_string());
        self
    }

    pub fn with_error(mut self, error_type: &str, message: &str) -> Self {
        self.error_type = error_type.to_string();
        self.error_message = message.to_string();
        self
    }

    pub fn with_request_details(
        mut self,
        url: &str,
        status_code: Option<u16>,
        response_body: Option<&str>,
    ) -> Self {
        self.request_url = Some(url.to_string());
        self.status_code = status_code;
        self.response_body = response_body.map(|s| s.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Log through `log` and, when a path is given, append a JSON line to it.
    pub fn log_error(&self, error_log: Option<&Path>) {
        log::error!(
            target: "generation_errors",
            "Generation error | Operation: {} | Type: {} | Message: {} | Generation: {:?} | URL: {:?} | Status: {:?} | Context: {:?}",
            self.operation,
            self.error_type,
            self.error_message,
            self.generation_id,
            self.request_url,
            self.status_code,
            self.metadata
        );

        if let Some(path) = error_log {
            if let Err(e) = self.append_to(path) {
                log::warn!("Failed to write to error log file: {e}");
            }
        }
    }

    fn append_to(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let error_json = serde_json::to_string(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{error_json}")
    }
}

/// Utility functions for reading error logs
pub struct ErrorLogReader;

impl ErrorLogReader {
    /// Most recent errors first, optionally only those of one operation.
    pub fn read_recent_errors(
        path: &Path,
        limit: usize,
        operation_filter: Option<&str>,
    ) -> io::Result<Vec<ErrorContext>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut errors = Vec::new();

        for line in reader.lines() {
            let line = line?;
            match serde_json::from_str::<ErrorContext>(&line) {
                Ok(error) => {
                    if let Some(operation) = operation_filter {
                        if error.operation != operation {
                            continue;
                        }
                    }
                    errors.push(error);
                }
                Err(e) => log::debug!("Skipping unreadable error log line: {e}"),
            }
        }

        errors.reverse();
        errors.truncate(limit);
        Ok(errors)
    }

    /// Returns `false` when there was no log to remove.
    pub fn clear(path: &Path) -> io::Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_error_context_builder_pattern() {
        let error = ErrorContext::new("fetch_generation_status")
            .with_generation("gen-1")
            .with_error("api_error", "HTTP 500")
            .with_request_details(
                "https://api.example.com/api/generations/gen-1",
                Some(500),
                Some("Internal Server Error"),
            )
            .with_metadata("attempt", "3");

        assert_eq!(error.operation, "fetch_generation_status");
        assert_eq!(error.generation_id.as_deref(), Some("gen-1"));
        assert_eq!(error.error_type, "api_error");
        assert_eq!(error.error_message, "HTTP 500");
        assert_eq!(error.status_code, Some(500));
        assert_eq!(error.response_body.as_deref(), Some("Internal Server Error"));
        assert_eq!(error.metadata.get("attempt"), Some(&"3".to_string()));
        assert!(!error.timestamp.is_empty());
    }

    #[test]
    fn test_reader_on_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("error.log");

        let errors = ErrorLogReader::read_recent_errors(&path, 10, None).expect("Should read");
        assert!(errors.is_empty());
        assert!(!ErrorLogReader::clear(&path).expect("Should clear"));
    }

    #[test]
    fn test_log_then_read_most_recent_first() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("error.log");

        ErrorContext::new("fetch_generation_status")
            .with_generation("g1")
            .with_error("network_error", "Connection refused")
            .log_error(Some(&path));
        ErrorContext::new("subscribe_updates")
            .with_error("stream_error", "EOF")
            .log_error(Some(&path));
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "not json"))
            .expect("Should append garbage line");

        let errors = ErrorLogReader::read_recent_errors(&path, 10, None).expect("Should read");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].operation, "subscribe_updates");
        assert_eq!(errors[1].generation_id.as_deref(), Some("g1"));

        let filtered = ErrorLogReader::read_recent_errors(&path, 10, Some("fetch_generation_status"))
            .expect("Should read filtered");
        assert_eq!(filtered.len(), 1);

        let limited = ErrorLogReader::read_recent_errors(&path, 1, None).expect("Should read");
        assert_eq!(limited.len(), 1);

        assert!(ErrorLogReader::clear(&path).expect("Should clear"));
        assert!(!path.exists());
    }
}
