//! Chat assistant client, shared between the CLI and any other front end.
//!
//! This crate owns the chat service wire contract: chat completions, file
//! upload, retry with backoff, and the conversation history that feeds them.
//!
//! No settings lookup here. Credentials and endpoints arrive through
//! [`ClientConfig`].

mod activity;
mod client;
mod conversation;
mod formatter;
mod retry;

pub use activity::{
    ActivityAction, ActivityEvent, ActivityHook, ActivityLevel, LogHook, RecordingHook,
};
pub use client::{
    AssistantClient, ChatCompletion, ChatOptions, ClientConfig, FileBlob, ProgressCallback,
    ProgressReader, UploadOptions, UploadedFile, DEFAULT_API_BASE, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_TEMPERATURE, MISSING_KEY_HINT,
};
pub use conversation::{Conversation, DEFAULT_SYSTEM_PROMPT, GREETING};
pub use formatter::{format_messages, format_value, ChatMessage, Role, WireMessage};
pub use retry::{sleep_cancellable, with_retry, CancelToken, RetryPolicy};
