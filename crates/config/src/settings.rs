// Application settings
// Loaded from ~/.config/pricelens/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default chat service endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Environment variable overriding `assistant.api_base`.
pub const API_BASE_ENV: &str = "PRICELENS_API_BASE";

/// Environment variable overriding the settings file location.
pub const CONFIG_PATH_ENV: &str = "PRICELENS_CONFIG";

/// Retry behaviour for calls to the chat service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// When false every call is tried exactly once.
    pub enabled: bool,

    /// Retries after the first attempt.
    pub max_retries: u32,

    /// First backoff step in milliseconds; doubled per attempt.
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff step in milliseconds.
    pub max_delay_ms: u64,

    /// Uniform jitter added to each backoff, in `[0, jitter_ms)`.
    pub jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 5,
            base_delay_ms: 2000,
            max_delay_ms: 30_000,
            jitter_ms: 1000,
        }
    }
}

/// Chat service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    /// Service root, without the `/v1/...` path.
    pub api_base: String,

    /// Model identifier sent with every chat request.
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Request server-sent-event streaming for chat replies.
    pub stream: bool,

    /// Persona prompt. `None` uses the built-in pricing assistant prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    pub retry: RetrySettings,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 60,
            stream: false,
            system_prompt: None,
            retry: RetrySettings::default(),
        }
    }
}

impl AssistantSettings {
    /// The endpoint to use: `PRICELENS_API_BASE` wins over the file value.
    /// Trailing slashes are removed.
    pub fn effective_api_base(&self) -> String {
        let base = std::env::var(API_BASE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.api_base.clone());
        base.trim().trim_end_matches('/').to_string()
    }

    /// Get the effective model (user-specified or the default)
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            DEFAULT_MODEL
        } else {
            &self.model
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Output
    #[serde(rename = "output.decimals")]
    pub decimals: usize,

    #[serde(rename = "output.json")]
    pub json_output: bool,

    // Assistant
    #[serde(rename = "assistant", default)]
    pub assistant: AssistantSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            decimals: 4,
            json_output: false,
            assistant: AssistantSettings::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pricelens");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(&path);
            return settings;
        }

        Self::load_from(&path)
    }

    /// Load settings from `path`. Missing or invalid files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, ignoring lines that start with `//`.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(path, json).map_err(|e| e.to_string())
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::debug!("cannot create config directory {}: {}", parent.display(), e);
                return;
            }
        }

        let default_config = r#"{
    // Output formatting
    "output.decimals": 4,
    "output.json": false,

    // Chat assistant (DeepSeek / OpenAI-compatible)
    // API keys are stored in the system keychain or PRICELENS_DEEPSEEK_KEY,
    // never in this file
    "assistant": {
        "api_base": "https://api.deepseek.com",
        "model": "deepseek-chat",
        "temperature": 0.7,
        "max_tokens": 1000,
        "timeout_secs": 60,
        "stream": false,
        "retry": {
            "enabled": true,
            "max_retries": 5,
            "base_delay_ms": 2000,
            "max_delay_ms": 30000,
            "jitter_ms": 1000
        }
    }
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            log::debug!("cannot write default {}: {}", path.display(), e);
        }
    }

    /// Get the config file path for display/opening
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
