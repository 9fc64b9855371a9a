//! Chat service HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Covers the two
//! endpoints the assistant needs, chat completions and file upload, both
//! wrapped in the retry loop from [`crate::retry`].

use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pricelens_core::{ApiError, ErrorKind};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use crate::activity::{ActivityAction, ActivityEvent, ActivityHook, ActivityLevel, LogHook};
use crate::formatter::WireMessage;
use crate::retry::{with_retry, CancelToken, RetryPolicy};

pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

const CHAT_PATH: &str = "/v1/chat/completions";
const FILES_PATH: &str = "/v1/files";
const UPLOAD_PURPOSE: &str = "assistants";
const USER_AGENT: &str = concat!("pricelens/", env!("CARGO_PKG_VERSION"));

/// Appended to the pre-flight error when no key is configured.
pub const MISSING_KEY_HINT: &str =
    "Pass --api-key, store a key in the system keychain, or set PRICELENS_DEEPSEEK_KEY.";

/// Connection settings and per-call defaults.
#[derive(Clone)]
pub struct ClientConfig {
    /// Service root without the `/v1/...` path.
    pub api_base: String,
    /// Bearer credential. `None` makes every call fail before sending.
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Per-call chat options. `None` fields fall back to [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub file_ids: Vec<String>,
    pub retry: bool,
    pub max_retries: Option<u32>,
    pub cancel: Option<CancelToken>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
            stream: false,
            file_ids: Vec::new(),
            retry: true,
            max_retries: None,
            cancel: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    /// Reply text from the first choice.
    pub content: String,
    /// Full response body, or the array of stream chunks when streaming.
    pub raw: Value,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    file_ids: &'a [String],
}

/// Upload progress callback: `(bytes_sent, total_bytes)`.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

#[derive(Clone)]
pub struct UploadOptions {
    pub retry: bool,
    pub max_retries: Option<u32>,
    pub cancel: Option<CancelToken>,
    pub progress: Option<ProgressCallback>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self { retry: true, max_retries: None, cancel: None, progress: None }
    }
}

/// An in-memory file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlob {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl FileBlob {
    /// The MIME type is guessed from the file name.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = mime_for(&name).to_string();
        Self { name, mime, bytes }
    }

    pub fn from_path(path: &Path) -> Result<Self, ApiError> {
        let bytes = std::fs::read(path).map_err(|e| {
            ApiError::validation(format!("cannot read {}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

fn mime_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "png" => "image/png",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Server record of an uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub id: String,
    pub filename: Option<String>,
    pub bytes: Option<u64>,
    pub raw: Value,
}

/// Wraps a body reader and reports `(sent, total)` as the transport reads it.
pub struct ProgressReader<R> {
    inner: R,
    sent: u64,
    total: u64,
    last_reported: Option<u64>,
    callback: Option<ProgressCallback>,
}

impl<R: Read> ProgressReader<R> {
    pub fn new(inner: R, total: u64, callback: Option<ProgressCallback>) -> Self {
        Self { inner, sent: 0, total, last_reported: None, callback }
    }

    fn report(&mut self) {
        if let Some(cb) = &self.callback {
            cb(self.sent, self.total);
        }
        self.last_reported = Some(self.sent);
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.sent += n as u64;
        // EOF reports once so empty bodies still reach (0, 0)
        if n > 0 || self.last_reported != Some(self.sent) {
            self.report();
        }
        Ok(n)
    }
}

/// Chat service client (blocking). Cheap to clone; clones share the
/// connection pool and activity hook.
#[derive(Clone)]
pub struct AssistantClient {
    http: Client,
    config: ClientConfig,
    hook: Arc<dyn ActivityHook>,
}

impl AssistantClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ApiError::new(ErrorKind::Unknown, format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self { http, config, hook: Arc::new(LogHook) })
    }

    /// Replace the default [`LogHook`].
    pub fn with_hook(mut self, hook: Arc<dyn ActivityHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a chat completion request.
    pub fn send_chat(
        &self,
        messages: &[WireMessage],
        opts: &ChatOptions,
    ) -> Result<ChatCompletion, ApiError> {
        let key = self.require_key("chat")?;
        let url = self.url(CHAT_PATH);
        let body = ChatRequest {
            model: opts.model.as_deref().unwrap_or(&self.config.model),
            messages,
            temperature: opts.temperature.unwrap_or(self.config.temperature),
            max_tokens: opts.max_tokens.unwrap_or(self.config.max_tokens),
            stream: opts.stream,
            file_ids: &opts.file_ids,
        };
        let budget = self.config.retry.budget(opts.retry, opts.max_retries);

        log::debug!(
            "chat request: {} messages, model {}, stream {}",
            messages.len(),
            body.model,
            body.stream
        );

        with_retry("chat", &self.config.retry, budget, opts.cancel.as_ref(), self.hook.as_ref(), |_| {
            let response = self
                .http
                .post(&url)
                .bearer_auth(key)
                .json(&body)
                .send()
                .map_err(|e| ApiError::network(e.to_string()))?;
            let response = check_status(response)?;

            if opts.stream {
                parse_stream(BufReader::new(response))
            } else {
                let text = response.text().map_err(|e| ApiError::network(e.to_string()))?;
                parse_completion(&text)
            }
        })
    }

    /// Upload a file as multipart form data (`file`, `purpose=assistants`).
    pub fn upload_file(&self, file: &FileBlob, opts: &UploadOptions) -> Result<UploadedFile, ApiError> {
        let key = self.require_key("upload")?;
        let url = self.url(FILES_PATH);
        let budget = self.config.retry.budget(opts.retry, opts.max_retries);
        let total = file.size();

        log::debug!("uploading {} ({} bytes, {})", file.name, total, file.mime);

        with_retry("upload", &self.config.retry, budget, opts.cancel.as_ref(), self.hook.as_ref(), |_| {
            let reader = ProgressReader::new(Cursor::new(file.bytes.clone()), total, opts.progress.clone());
            let part = Part::reader_with_length(reader, total)
                .file_name(file.name.clone())
                .mime_str(&file.mime)
                .map_err(|e| ApiError::validation(format!("invalid MIME type {}: {}", file.mime, e)))?;
            let form = Form::new().part("file", part).text("purpose", UPLOAD_PURPOSE);

            let response = self
                .http
                .post(&url)
                .bearer_auth(key)
                .multipart(form)
                .send()
                .map_err(|e| ApiError::network(e.to_string()))?;
            let response = check_status(response)?;
            let text = response.text().map_err(|e| ApiError::network(e.to_string()))?;
            parse_upload(&text)
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Pre-flight credential check. Never retried, never sent.
    fn require_key(&self, operation: &str) -> Result<&str, ApiError> {
        match self.config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Ok(key),
            None => {
                let err = ApiError::missing_key(MISSING_KEY_HINT);
                self.hook.record(
                    &ActivityEvent::new(operation, ActivityAction::Rejected, 0)
                        .with_error(&err, ActivityLevel::Error),
                );
                Err(err)
            }
        }
    }
}

/// Pass successful responses through; turn anything else into a classified error.
fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let fallback = status.canonical_reason().unwrap_or("unknown error").to_string();
    let text = response.text().unwrap_or_default();
    let body: Option<Value> = serde_json::from_str(&text).ok();
    let detail = body
        .as_ref()
        .and_then(|b| b["error"]["message"].as_str())
        .map(str::to_string)
        .unwrap_or(fallback);

    Err(ApiError::from_status(code, &detail, body))
}

fn parse_json(text: &str) -> Result<Value, ApiError> {
    serde_json::from_str(text).map_err(|e| {
        ApiError::new(ErrorKind::Unknown, format!("Could not parse service response: {}", e))
    })
}

fn parse_completion(text: &str) -> Result<ChatCompletion, ApiError> {
    let raw = parse_json(text)?;
    let choice = raw["choices"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| ApiError::validation("response contained no choices"))?;
    let content = choice["message"]["content"].as_str().unwrap_or_default().to_string();
    Ok(ChatCompletion { content, raw })
}

/// Accumulate `choices[0].delta.content` from `data:` lines until `[DONE]`.
fn parse_stream(reader: impl BufRead) -> Result<ChatCompletion, ApiError> {
    let mut content = String::new();
    let mut chunks = Vec::new();
    let mut saw_choice = false;

    for line in reader.lines() {
        let line = line.map_err(|e| ApiError::network(format!("stream interrupted: {}", e)))?;
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            break;
        }
        let chunk = parse_json(data)?;
        if let Some(choice) = chunk["choices"].as_array().and_then(|c| c.first()) {
            saw_choice = true;
            if let Some(delta) = choice["delta"]["content"].as_str() {
                content.push_str(delta);
            }
        }
        chunks.push(chunk);
    }

    if !saw_choice {
        return Err(ApiError::validation("response contained no choices"));
    }
    Ok(ChatCompletion { content, raw: Value::Array(chunks) })
}

fn parse_upload(text: &str) -> Result<UploadedFile, ApiError> {
    let raw = parse_json(text)?;
    let id = raw["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::validation("upload succeeded but no id returned"))?
        .to_string();
    Ok(UploadedFile {
        id,
        filename: raw["filename"].as_str().map(str::to_string),
        bytes: raw["bytes"].as_u64(),
        raw,
    })
}
