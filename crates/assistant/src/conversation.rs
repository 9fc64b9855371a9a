// Conversation session: history, persona prompt and uploaded file ids

use pricelens_core::ApiError;

use crate::client::{AssistantClient, ChatOptions, FileBlob, UploadOptions};
use crate::formatter::{format_messages, ChatMessage};

/// First assistant line of every new conversation.
pub const GREETING: &str =
    "您好！我是专业的价格弹性分析助手，可以为您提供营销策略和定价分析等专业建议。请问有什么可以帮您的吗？";

/// Persona sent as the system message unless the caller supplies another.
pub const DEFAULT_SYSTEM_PROMPT: &str = "您是一位专业的价格弹性分析助手，专注于提供营销和定价相关的咨询服务。您的主要职责包括：
- 价格弹性分析和建议
- 定价策略制定
- 市场营销策略咨询
- 促销活动效果评估
- 读取用户所上传excel文件的分析结果，并进行解读和回复

如果用户询问与营销和定价无关的问题，请礼貌地说明您的专业领域，并建议用户咨询其他相关专家。";

/// Append-only chat history. Failed calls leave the user's message in
/// place and add a `System` line carrying the error message.
#[derive(Debug, Clone)]
pub struct Conversation {
    history: Vec<ChatMessage>,
    system_prompt: String,
    file_ids: Vec<String>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_system_prompt(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            history: vec![ChatMessage::assistant(GREETING)],
            system_prompt: prompt.into(),
            file_ids: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn file_ids(&self) -> &[String] {
        &self.file_ids
    }

    /// Send `text` and append the reply. Returns the reply text.
    pub fn send(
        &mut self,
        client: &AssistantClient,
        text: &str,
        opts: &ChatOptions,
    ) -> Result<String, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::validation("message is empty"));
        }
        self.history.push(ChatMessage::user(text));
        self.complete(client, opts)
    }

    /// Upload `file`, then send a chat turn that references it.
    pub fn send_with_file(
        &mut self,
        client: &AssistantClient,
        file: &FileBlob,
        upload: &UploadOptions,
        opts: &ChatOptions,
    ) -> Result<String, ApiError> {
        let uploaded = match client.upload_file(file, upload) {
            Ok(uploaded) => uploaded,
            Err(err) => {
                self.history.push(ChatMessage::system(err.message.clone()));
                return Err(err);
            }
        };
        log::info!("uploaded {} as {}", file.name, uploaded.id);
        self.file_ids.push(uploaded.id.clone());

        self.history.push(ChatMessage::user(format!(
            "Uploaded file: {} ({:.2} KB, type: {})",
            file.name,
            file.size() as f64 / 1024.0,
            file.mime
        )));

        let mut opts = opts.clone();
        if !opts.file_ids.contains(&uploaded.id) {
            opts.file_ids.push(uploaded.id);
        }
        self.complete(client, &opts)
    }

    fn complete(&mut self, client: &AssistantClient, opts: &ChatOptions) -> Result<String, ApiError> {
        let wire = format_messages(&self.history, Some(&self.system_prompt));
        match client.send_chat(&wire, opts) {
            Ok(completion) => {
                self.history.push(ChatMessage::assistant(completion.content.clone()));
                Ok(completion.content)
            }
            Err(err) => {
                self.history.push(ChatMessage::system(err.message.clone()));
                Err(err)
            }
        }
    }
}
