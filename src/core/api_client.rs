//! HTTP transport: status fetches and the server-sent update stream

use crate::core::config::ApiConfig;
use crate::core::error_log::ErrorContext;
use crate::core::generation::{FetchError, GenerationEvent, GenerationRecord, GenerationSource};
use crate::core::realtime::{EventHandler, GenerationFeed, Subscription};
use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, error, info, warn};
use reqwest::{Client, StatusCode};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "imagelingo/0.4";

fn build_client(timeout: Option<Duration>) -> io::Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| io::Error::other(format!("Failed to create HTTP client: {e}")))
}

fn bearer(token: &str) -> Option<String> {
    if token.trim().is_empty() {
        None
    } else {
        Some(format!("Bearer {}", token.trim()))
    }
}

/// Fetches generation rows from `GET {base}/api/generations/{id}`.
pub struct HttpGenerationSource {
    client: Client,
    api_base_url: String,
    auth_header: Option<String>,
    error_log: Option<PathBuf>,
}

impl HttpGenerationSource {
    pub fn new(config: &ApiConfig) -> io::Result<Self> {
        let client = build_client(Some(REQUEST_TIMEOUT))?;
        let api_base_url = config.api_base_url();
        info!("Created generation status client for {api_base_url}");

        Ok(Self {
            client,
            api_base_url,
            auth_header: bearer(&config.token),
            error_log: None,
        })
    }

    pub fn with_error_log(mut self, path: PathBuf) -> Self {
        self.error_log = Some(path);
        self
    }

    fn generation_url(&self, id: &str) -> String {
        format!(
            "{}/generations/{}",
            self.api_base_url,
            urlencoding::encode(id)
        )
    }
}

#[async_trait]
impl GenerationSource for HttpGenerationSource {
    async fn fetch_generation_status(&self, id: &str) -> Result<GenerationRecord, FetchError> {
        let url = self.generation_url(id);
        debug!("Fetching generation status: {url}");

        let mut request = self.client.get(&url);
        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await.map_err(|e| {
            ErrorContext::new("fetch_generation_status")
                .with_generation(id)
                .with_error("network_error", &e.to_string())
                .with_request_details(&url, None, None)
                .log_error(self.error_log.as_deref());
            FetchError::ConnectionError(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(id.to_string()));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            ErrorContext::new("fetch_generation_status")
                .with_generation(id)
                .with_error("api_error", &format!("HTTP {status}"))
                .with_request_details(&url, Some(status.as_u16()), Some(&error_text))
                .log_error(self.error_log.as_deref());
            return Err(FetchError::ApiError {
                status: status.as_u16(),
                message: if error_text.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    error_text
                },
            });
        }

        let text = response.text().await.map_err(|e| {
            error!("Failed to read generation response: {e}");
            FetchError::ConnectionError(format!("Failed to read response: {e}"))
        })?;

        serde_json::from_str::<GenerationRecord>(&text).map_err(|e| {
            ErrorContext::new("fetch_generation_status")
                .with_generation(id)
                .with_error("json_parse_error", &e.to_string())
                .with_request_details(&url, Some(status.as_u16()), Some(&text))
                .log_error(self.error_log.as_deref());
            FetchError::DataParseError(e.to_string())
        })
    }
}

/// Incremental `text/event-stream` decoder. Yields the payload of each event's
/// `data:` lines once the blank line ending the event arrives.
///
/// Chunks are raw bytes: a UTF-8 sequence may straddle two chunks, so only
/// complete lines are decoded.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
            // comments (":") and other fields (event, id, retry) are not used
        }

        events
    }
}

/// Push feed over server-sent events at `GET {base}/api/generations/events`.
pub struct HttpEventFeed {
    client: Client,
    api_base_url: String,
    auth_header: Option<String>,
    reconnect_delay: Duration,
    error_log: Option<PathBuf>,
}

impl HttpEventFeed {
    pub fn new(config: &ApiConfig, reconnect_delay: Duration) -> io::Result<Self> {
        // No overall timeout: the stream stays open
        let client = build_client(None)?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url(),
            auth_header: bearer(&config.token),
            reconnect_delay,
            error_log: None,
        })
    }

    pub fn with_error_log(mut self, path: PathBuf) -> Self {
        self.error_log = Some(path);
        self
    }
}

impl GenerationFeed for HttpEventFeed {
    fn subscribe(&self, user_id: &str, handler: EventHandler) -> Box<dyn Subscription> {
        let stream = EventStream {
            client: self.client.clone(),
            url: format!("{}/generations/events", self.api_base_url),
            user_id: user_id.to_string(),
            auth_header: self.auth_header.clone(),
            reconnect_delay: self.reconnect_delay,
            error_log: self.error_log.clone(),
        };
        let task = tokio::spawn(stream.run(handler));
        Box::new(StreamSubscription { task: Some(task) })
    }
}

struct StreamSubscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription for StreamSubscription {
    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct EventStream {
    client: Client,
    url: String,
    user_id: String,
    auth_header: Option<String>,
    reconnect_delay: Duration,
    error_log: Option<PathBuf>,
}

impl EventStream {
    async fn run(self, handler: EventHandler) {
        loop {
            match self.consume(&handler).await {
                Ok(()) => debug!("Generation event stream closed, reconnecting"),
                Err(e) => {
                    warn!("Generation event stream failed: {e}");
                    ErrorContext::new("subscribe_updates")
                        .with_error("stream_error", &e)
                        .with_request_details(&self.url, None, None)
                        .with_metadata("user_id", &self.user_id)
                        .log_error(self.error_log.as_deref());
                }
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn consume(&self, handler: &EventHandler) -> Result<(), String> {
        let mut request = self
            .client
            .get(&self.url)
            .query(&[("user_id", self.user_id.as_str())])
            .header("Accept", "text/event-stream");
        if let Some(auth) = &self.auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        info!("Connected to generation event stream for {}", self.user_id);
        let mut parser = SseParser::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| e.to_string())?;
            for data in parser.push(&chunk) {
                match serde_json::from_str::<GenerationEvent>(&data) {
                    Ok(event) => handler(event),
                    Err(e) => warn!("Skipping malformed generation event: {e}"),
                }
            }
        }

        Ok(())
    }
}
