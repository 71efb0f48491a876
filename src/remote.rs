//! Push integration with a Loki-style remote log-aggregation backend.
//!
//! [`RemoteWriter`] consumes the same `io::Write` contract as every other
//! sink: it parses each JSON line back into labeled fields, buffers entries,
//! and a background flusher batches them to the backend.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded, select, tick};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{Error, Result};

const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const PUSH_PATH: &str = "/loki/api/v1/push";

/// Connection settings for the remote backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Labels attached to every pushed stream.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval")]
    pub flush_interval: Duration,
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_flush_interval() -> Duration {
    DEFAULT_FLUSH_INTERVAL
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            tenant_id: None,
            labels: HashMap::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build a configuration from `LOKI_*` environment variables, falling
    /// back to a localhost backend.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("LOKI_URL").unwrap_or_else(|_| "http://localhost:3100".to_string()),
        );
        config.username = std::env::var("LOKI_USERNAME").ok().filter(|v| !v.is_empty());
        config.password = std::env::var("LOKI_PASSWORD").ok().filter(|v| !v.is_empty());
        config.tenant_id = std::env::var("LOKI_TENANT_ID").ok().filter(|v| !v.is_empty());
        if let Ok(batch) = std::env::var("LOKI_BATCH_SIZE")
            && let Ok(batch) = batch.parse()
        {
            config.batch_size = batch;
        }
        config
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// One buffered log entry awaiting a push.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub labels: HashMap<String, String>,
    pub message: String,
    pub time: OffsetDateTime,
}

/// One backend stream: a label set and its timestamped lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stream {
    pub stream: HashMap<String, String>,
    pub values: Vec<[String; 2]>,
}

#[derive(Serialize)]
struct PushRequest {
    streams: Vec<Stream>,
}

/// Group entries into streams keyed by their full label set; timestamps are
/// encoded as unix nanoseconds, as the backend expects.
pub fn group_streams(entries: &[LogEntry]) -> Vec<Stream> {
    let mut keyed: Vec<(String, Stream)> = Vec::new();

    for entry in entries {
        let mut sorted: Vec<_> = entry.labels.iter().collect();
        sorted.sort();
        let key = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v},"))
            .collect::<String>();

        let value = [
            entry.time.unix_timestamp_nanos().to_string(),
            entry.message.clone(),
        ];

        match keyed.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, stream)) => stream.values.push(value),
            None => keyed.push((
                key,
                Stream {
                    stream: entry.labels.clone(),
                    values: vec![value],
                },
            )),
        }
    }

    keyed.into_iter().map(|(_, stream)| stream).collect()
}

/// Blocking HTTP client for the backend's push endpoint.
pub struct RemoteClient {
    config: RemoteConfig,
    http: reqwest::blocking::Client,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::Config("remote backend URL must be set".to_string()));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Remote(e.to_string()))?;
        Ok(Self { config, http })
    }

    /// POST a batch of streams to the push endpoint.
    pub fn push(&self, streams: Vec<Stream>) -> Result<()> {
        if streams.is_empty() {
            return Ok(());
        }

        let mut request = self
            .http
            .post(format!("{}{PUSH_PATH}", self.config.url))
            .json(&PushRequest { streams });

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            request = request.basic_auth(username, Some(password));
        }
        if let Some(tenant) = &self.config.tenant_id {
            request = request.header("X-Scope-OrgID", tenant);
        }

        let response = request.send().map_err(|e| Error::Remote(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Remote(format!(
                "backend returned status {status}: {body}"
            )));
        }
        Ok(())
    }
}

struct RemoteShared {
    client: RemoteClient,
    labels: HashMap<String, String>,
    batch_size: usize,
    buffer: Mutex<Vec<LogEntry>>,
}

impl RemoteShared {
    fn flush(&self) -> Result<()> {
        let entries = {
            let mut buffer = self.buffer.lock().unwrap();
            if buffer.is_empty() {
                return Ok(());
            }
            std::mem::take(&mut *buffer)
        };
        self.client.push(group_streams(&entries))
    }
}

/// Parse a wire line into an entry, lifting the record's identifying fields
/// into labels on top of the configured defaults.
fn entry_from_line(line: &[u8], defaults: &HashMap<String, String>) -> Result<LogEntry> {
    let data: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(line)
        .map_err(|e| Error::Remote(format!("failed to parse log line: {e}")))?;

    let field = |name: &str| data.get(name).and_then(|v| v.as_str());

    let message = field("msg").unwrap_or_default().to_string();
    let time = field("time")
        .and_then(|t| OffsetDateTime::parse(t, &Rfc3339).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);

    let mut labels = defaults.clone();
    for name in ["level", "file", "package", "function", "line"] {
        if let Some(value) = field(name) {
            labels.insert(name.to_string(), value.to_string());
        }
    }

    Ok(LogEntry {
        labels,
        message,
        time,
    })
}

/// An `io::Write` sink that forwards records to the remote backend in
/// batches, with a periodic background flusher.
pub struct RemoteWriter {
    shared: Arc<RemoteShared>,
    shutdown: Sender<()>,
    flusher: Option<JoinHandle<()>>,
}

impl RemoteWriter {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let labels = config.labels.clone();
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval;
        let shared = Arc::new(RemoteShared {
            client: RemoteClient::new(config)?,
            labels,
            batch_size,
            buffer: Mutex::new(Vec::new()),
        });

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let flusher_shared = Arc::clone(&shared);
        let flusher = thread::Builder::new()
            .name("pipelog-remote".to_string())
            .spawn(move || {
                let ticker = tick(flush_interval);
                loop {
                    select! {
                        recv(shutdown_rx) -> _ => return,
                        recv(ticker) -> _ => {
                            if let Err(err) = flusher_shared.flush() {
                                eprintln!("remote flush failed: {err}");
                            }
                        }
                    }
                }
            })
            .map_err(Error::Io)?;

        Ok(Self {
            shared,
            shutdown: shutdown_tx,
            flusher: Some(flusher),
        })
    }

    /// Push everything currently buffered.
    pub fn flush_buffer(&self) -> Result<()> {
        self.shared.flush()
    }

    /// Number of entries awaiting the next push.
    pub fn buffered(&self) -> usize {
        self.shared.buffer.lock().unwrap().len()
    }

    /// A cheap `io::Write` handle over the same buffer, suitable for
    /// registration as a fan-out target while the writer itself stays with
    /// the application for [`RemoteWriter::graceful_shutdown`].
    pub fn target(&self) -> RemoteTarget {
        RemoteTarget {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stop the background flusher and push any remaining entries, bounded
    /// by the client timeout.
    pub fn graceful_shutdown(mut self) -> Result<()> {
        let _ = self.shutdown.send(());
        if let Some(flusher) = self.flusher.take() {
            let _ = flusher.join();
        }
        self.shared.flush()
    }
}

impl Write for RemoteWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        buffer_line(&self.shared, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.shared.flush().map_err(io::Error::other)
    }
}

/// A handle to a [`RemoteWriter`]'s buffer implementing the sink contract.
pub struct RemoteTarget {
    shared: Arc<RemoteShared>,
}

impl Write for RemoteTarget {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        buffer_line(&self.shared, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.shared.flush().map_err(io::Error::other)
    }
}

fn buffer_line(shared: &RemoteShared, buf: &[u8]) -> io::Result<usize> {
    let entry = entry_from_line(buf, &shared.labels).map_err(io::Error::other)?;

    let over_batch = {
        let mut buffer = shared.buffer.lock().unwrap();
        buffer.push(entry);
        buffer.len() >= shared.batch_size
    };

    if over_batch {
        shared.flush().map_err(io::Error::other)?;
    }
    Ok(buf.len())
}
