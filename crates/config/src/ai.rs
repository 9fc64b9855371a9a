// Assistant credentials and the resolved assistant configuration
//
// Key precedence: explicit value (--api-key), then the system keychain,
// then PRICELENS_<PROVIDER>_KEY. settings.json never holds a key.
// PRICELENS_NO_KEYCHAIN=1 takes the keychain out of every lookup.

use std::env;

use crate::settings::{AssistantSettings, RetrySettings, Settings};

/// Keychain service the key is filed under.
const KEYCHAIN_SERVICE: &str = "pricelens";

/// Set to anything but `0` or empty to bypass the system keychain.
pub const NO_KEYCHAIN_ENV: &str = "PRICELENS_NO_KEYCHAIN";

/// The chat provider this tool talks to.
pub const PROVIDER: &str = "deepseek";

/// Where the effective API key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Flag,
    Keychain,
    Environment,
    None,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Flag => "flag",
            KeySource::Keychain => "keychain",
            KeySource::Environment => "environment",
            KeySource::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

impl KeyLookup {
    fn found(key: impl Into<String>, source: KeySource) -> Self {
        Self { key: Some(key.into()), source }
    }

    fn missing() -> Self {
        Self { key: None, source: KeySource::None }
    }
}

/// `PRICELENS_DEEPSEEK_KEY` for provider `deepseek`.
pub fn env_var_name(provider: &str) -> String {
    format!("PRICELENS_{}_KEY", provider.to_uppercase())
}

fn keychain_account(provider: &str) -> String {
    format!("ai/{}", provider.to_lowercase())
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

pub fn keychain_disabled() -> bool {
    env::var(NO_KEYCHAIN_ENV).is_ok_and(|v| !matches!(v.trim(), "" | "0"))
}

#[cfg(feature = "keychain")]
fn keychain_entry(provider: &str) -> Result<keyring::Entry, String> {
    if keychain_disabled() {
        return Err(format!("keychain disabled by {}", NO_KEYCHAIN_ENV));
    }
    keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider))
        .map_err(|e| format!("keychain unavailable: {}", e))
}

#[cfg(feature = "keychain")]
fn keychain_key(provider: &str) -> Option<String> {
    let password = keychain_entry(provider).ok()?.get_password().ok()?;
    non_empty(&password).map(str::to_string)
}

#[cfg(not(feature = "keychain"))]
fn keychain_key(_provider: &str) -> Option<String> {
    None
}

fn env_key(provider: &str) -> Option<String> {
    let value = env::var(env_var_name(provider)).ok()?;
    non_empty(&value).map(str::to_string)
}

/// Stored key for `provider`: keychain first, then environment.
pub fn get_api_key(provider: &str) -> KeyLookup {
    if let Some(key) = keychain_key(provider) {
        return KeyLookup::found(key, KeySource::Keychain);
    }
    match env_key(provider) {
        Some(key) => KeyLookup::found(key, KeySource::Environment),
        None => KeyLookup::missing(),
    }
}

/// Like [`get_api_key`], but an explicit non-empty value wins.
pub fn resolve_api_key(explicit: Option<&str>, provider: &str) -> KeyLookup {
    match explicit.and_then(non_empty) {
        Some(key) => KeyLookup::found(key, KeySource::Flag),
        None => get_api_key(provider),
    }
}

#[cfg(feature = "keychain")]
pub fn set_api_key(provider: &str, key: &str) -> Result<(), String> {
    keychain_entry(provider)?
        .set_password(key)
        .map_err(|e| format!("could not store key in keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn set_api_key(provider: &str, _key: &str) -> Result<(), String> {
    Err(format!(
        "built without keychain support; set {} instead",
        env_var_name(provider)
    ))
}

#[cfg(feature = "keychain")]
pub fn delete_api_key(provider: &str) -> Result<(), String> {
    keychain_entry(provider)?
        .delete_credential()
        .map_err(|e| format!("could not remove key from keychain: {}", e))
}

#[cfg(not(feature = "keychain"))]
pub fn delete_api_key(_provider: &str) -> Result<(), String> {
    Err("built without keychain support".to_string())
}

pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keychain_entry(PROVIDER).is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}

// ============================================================================
// Resolved assistant configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStatus {
    /// A key is available; requests can be sent.
    Ready,
    MissingKey,
}

impl ConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigStatus::Ready => "ready",
            ConfigStatus::MissingKey => "missing_key",
        }
    }

    pub fn is_ready(&self) -> bool {
        *self == ConfigStatus::Ready
    }
}

/// Settings, environment overrides and the key folded into one value. The
/// CLI builds its client from this; nothing downstream reads settings again.
#[derive(Debug, Clone)]
pub struct ResolvedAssistantConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub stream: bool,
    pub system_prompt: Option<String>,
    pub retry: RetrySettings,
    pub api_key: Option<String>,
    pub key_source: KeySource,
    pub status: ConfigStatus,
    /// Why requests cannot be sent, when `status` is not ready.
    pub blocking_reason: Option<String>,
}

impl ResolvedAssistantConfig {
    /// `explicit_key` comes from the command line and beats stored keys.
    pub fn from_settings(settings: &AssistantSettings, explicit_key: Option<&str>) -> Self {
        Self::with_lookup(settings, resolve_api_key(explicit_key, PROVIDER))
    }

    fn with_lookup(settings: &AssistantSettings, lookup: KeyLookup) -> Self {
        let status = if lookup.key.is_some() {
            ConfigStatus::Ready
        } else {
            ConfigStatus::MissingKey
        };
        let blocking_reason = (status == ConfigStatus::MissingKey).then(|| {
            format!(
                "No API key found. Pass --api-key, store one in the keychain, or set {}",
                env_var_name(PROVIDER)
            )
        });

        Self {
            api_base: settings.effective_api_base(),
            model: settings.effective_model().to_string(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout_secs: settings.timeout_secs,
            stream: settings.stream,
            system_prompt: settings.system_prompt.clone(),
            retry: settings.retry.clone(),
            api_key: lookup.key,
            key_source: lookup.source,
            status,
            blocking_reason,
        }
    }

    /// Read the settings file, then resolve.
    pub fn load(explicit_key: Option<&str>) -> Self {
        Self::from_settings(&Settings::load().assistant, explicit_key)
    }
}

// ============================================================================
// Diagnostics (`plens ai doctor`)
// ============================================================================

#[derive(Debug)]
pub struct AssistantDiagnostics {
    pub provider: String,
    pub api_base: String,
    pub model: String,
    pub status: ConfigStatus,
    pub key_present: bool,
    pub key_source: KeySource,
    pub keychain_available: bool,
    pub retry_enabled: bool,
    pub max_retries: u32,
    pub config_path: String,
}

impl AssistantDiagnostics {
    pub fn from_resolved(config: &ResolvedAssistantConfig) -> Self {
        Self {
            provider: PROVIDER.to_string(),
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            status: config.status,
            key_present: config.api_key.is_some(),
            key_source: config.key_source,
            keychain_available: keychain_available(),
            retry_enabled: config.retry.enabled,
            max_retries: config.retry.max_retries,
            config_path: Settings::config_path_display(),
        }
    }

    /// Stable machine-readable form; bump `schema_version` on breaking changes.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "schema_version": 1,
            "status": self.status.as_str(),
            "provider": self.provider,
            "api_base": self.api_base,
            "model": self.model,
            "key": if self.key_present { "present" } else { "missing" },
            "key_source": self.key_source.as_str(),
            "keychain": if self.keychain_available { "ok" } else { "unavailable" },
            "retry": {
                "enabled": self.retry_enabled,
                "max_retries": self.max_retries,
            },
            "config_path": self.config_path,
        })
    }
}

impl std::fmt::Display for AssistantDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let yes_no = |flag: bool| if flag { "yes" } else { "no" };
        writeln!(f, "Assistant Doctor")?;
        writeln!(f, "----------------")?;
        writeln!(f, "status:       {}", self.status.as_str())?;
        writeln!(f, "provider:     {}", self.provider)?;
        writeln!(f, "endpoint:     {}", self.api_base)?;
        writeln!(f, "model:        {}", self.model)?;
        writeln!(f, "key:          {} (source: {})", yes_no(self.key_present), self.key_source.as_str())?;
        writeln!(f, "keychain:     {}", if self.keychain_available { "ok" } else { "unavailable" })?;
        if self.retry_enabled {
            writeln!(f, "retries:      {}", self.max_retries)?;
        } else {
            writeln!(f, "retries:      off")?;
        }
        writeln!(f, "settings:     {}", self.config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name() {
        assert_eq!(env_var_name("deepseek"), "PRICELENS_DEEPSEEK_KEY");
        assert_eq!(env_var_name("DeepSeek"), "PRICELENS_DEEPSEEK_KEY");
    }

    #[test]
    fn test_keychain_account_is_lowercase() {
        assert_eq!(keychain_account("DeepSeek"), "ai/deepseek");
    }

    #[test]
    fn test_env_key_is_trimmed() {
        env::set_var("PRICELENS_ENVTRIM_KEY", "  sk-env  ");
        assert_eq!(env_key("envtrim").as_deref(), Some("sk-env"));
        env::remove_var("PRICELENS_ENVTRIM_KEY");
    }

    #[test]
    fn test_blank_env_key_is_missing() {
        env::set_var("PRICELENS_ENVBLANK_KEY", "   ");
        assert_eq!(env_key("envblank"), None);
        env::remove_var("PRICELENS_ENVBLANK_KEY");
    }

    #[test]
    fn test_no_keychain_falls_through_to_env() {
        env::set_var(NO_KEYCHAIN_ENV, "1");
        env::set_var("PRICELENS_NOKEYCHAIN_KEY", "sk-env");
        assert!(keychain_disabled());
        assert!(!keychain_available());
        let lookup = get_api_key("nokeychain");
        assert_eq!(lookup.source, KeySource::Environment);
        assert_eq!(lookup.key.as_deref(), Some("sk-env"));
        assert!(set_api_key("nokeychain", "sk-new").is_err());
        env::remove_var("PRICELENS_NOKEYCHAIN_KEY");
        assert_eq!(get_api_key("nokeychain").source, KeySource::None);
    }

    #[test]
    fn test_explicit_key_wins() {
        let lookup = resolve_api_key(Some("  sk-flag  "), "nonexistent_provider_xyz");
        assert_eq!(lookup.source, KeySource::Flag);
        assert_eq!(lookup.key.as_deref(), Some("sk-flag"));

        let lookup = resolve_api_key(Some(""), "nonexistent_provider_xyz");
        assert_eq!(lookup.source, KeySource::None);
        assert!(lookup.key.is_none());
    }

    #[test]
    fn test_resolved_status() {
        let settings = AssistantSettings::default();
        let ready = ResolvedAssistantConfig::with_lookup(
            &settings,
            KeyLookup::found("sk", KeySource::Flag),
        );
        assert!(ready.status.is_ready());
        assert!(ready.blocking_reason.is_none());
        assert_eq!(ready.model, "deepseek-chat");

        let missing = ResolvedAssistantConfig::with_lookup(&settings, KeyLookup::missing());
        assert_eq!(missing.status, ConfigStatus::MissingKey);
        assert!(missing.blocking_reason.unwrap().contains("PRICELENS_DEEPSEEK_KEY"));
    }

    #[test]
    fn test_diagnostics_json() {
        let config =
            ResolvedAssistantConfig::with_lookup(&AssistantSettings::default(), KeyLookup::missing());
        let json = AssistantDiagnostics::from_resolved(&config).to_json();
        assert_eq!(json["status"], "missing_key");
        assert_eq!(json["key"], "missing");
        assert_eq!(json["retry"]["max_retries"], 5);
    }

    #[test]
    fn test_diagnostics_text() {
        let config = ResolvedAssistantConfig::with_lookup(
            &AssistantSettings::default(),
            KeyLookup::found("sk", KeySource::Environment),
        );
        let text = AssistantDiagnostics::from_resolved(&config).to_string();
        assert!(text.contains("status:       ready"));
        assert!(text.contains("key:          yes (source: environment)"));
        assert!(text.contains("retries:      5"));
    }
}
