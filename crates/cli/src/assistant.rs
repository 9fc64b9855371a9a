// Assistant commands: chat, upload, ai doctor and keychain management

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pricelens_assistant::{
    format_value, AssistantClient, ChatOptions, ClientConfig, Conversation, FileBlob,
    ProgressCallback, RetryPolicy, Role, UploadOptions, WireMessage, DEFAULT_SYSTEM_PROMPT,
    GREETING,
};
use pricelens_config::ai::{self, AssistantDiagnostics, ConfigStatus, ResolvedAssistantConfig};
use pricelens_config::settings::RetrySettings;
use pricelens_core::{ApiError, ErrorKind};
use serde_json::json;

use crate::exit_codes::EXIT_AI_MISSING_KEY;
use crate::CliError;

/// Per-invocation overrides shared by `chat` and `upload`.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub api_key: Option<String>,
    pub no_retry: bool,
    pub max_retries: Option<u32>,
}

pub struct ChatArgs {
    pub message: Option<String>,
    pub call: CallOptions,
    pub history: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub stream: bool,
    pub model: Option<String>,
    pub json: bool,
}

fn retry_policy(settings: &RetrySettings) -> RetryPolicy {
    RetryPolicy {
        max_retries: settings.max_retries,
        base_delay: Duration::from_millis(settings.base_delay_ms),
        max_delay: Duration::from_millis(settings.max_delay_ms),
        jitter: Duration::from_millis(settings.jitter_ms),
    }
}

fn client_config(resolved: &ResolvedAssistantConfig) -> ClientConfig {
    ClientConfig {
        api_base: resolved.api_base.clone(),
        api_key: resolved.api_key.clone(),
        timeout: Duration::from_secs(resolved.timeout_secs),
        model: resolved.model.clone(),
        temperature: resolved.temperature,
        max_tokens: resolved.max_tokens,
        retry: retry_policy(&resolved.retry),
    }
}

/// Resolve settings and credentials, then build the client. A missing key
/// is not an error here; the client rejects the first call before sending.
fn connect(api_key: Option<&str>) -> Result<(AssistantClient, ResolvedAssistantConfig), CliError> {
    let resolved = ResolvedAssistantConfig::load(api_key);
    log::debug!(
        "assistant endpoint {} model {} key source {}",
        resolved.api_base,
        resolved.model,
        resolved.key_source.as_str()
    );
    let client = AssistantClient::new(client_config(&resolved)).map_err(CliError::assistant)?;
    Ok((client, resolved))
}

/// `(retry, max_retries)` for a call: the flags win, then settings.
fn retry_budget(call: &CallOptions, settings: &RetrySettings) -> (bool, Option<u32>) {
    (settings.enabled && !call.no_retry, call.max_retries)
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn read_history(path: &Path) -> Result<serde_json::Value, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&text)
        .map_err(|e| CliError::io(format!("{} is not valid JSON: {}", path.display(), e)))
}

// ============================================================================
// chat
// ============================================================================

pub fn cmd_chat(args: ChatArgs) -> Result<(), CliError> {
    let (client, resolved) = connect(args.call.api_key.as_deref())?;
    let (retry, max_retries) = retry_budget(&args.call, &resolved.retry);
    let opts = ChatOptions {
        model: args.model.clone(),
        stream: args.stream || resolved.stream,
        retry,
        max_retries,
        ..ChatOptions::default()
    };
    let system_prompt = resolved
        .system_prompt
        .clone()
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    if let Some(path) = &args.history {
        let message = args
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| CliError::args("--history needs a MESSAGE to continue the conversation"))?;
        return chat_with_history(&client, path, message, &system_prompt, &opts, args.json);
    }

    let mut conversation = Conversation::with_system_prompt(system_prompt);

    if let Some(path) = &args.file {
        let blob = FileBlob::from_path(path).map_err(|e| CliError::io(e.message))?;
        let upload = UploadOptions {
            retry,
            max_retries,
            progress: (!args.json).then(|| progress_reporter(&blob.name)),
            ..UploadOptions::default()
        };
        let reply = conversation
            .send_with_file(&client, &blob, &upload, &opts)
            .map_err(CliError::assistant)?;
        if args.message.is_none() {
            return print_reply(&reply, &conversation, &client, &opts, args.json);
        }
        if !args.json {
            println!("{}\n", reply);
        }
    }

    match args.message {
        Some(message) => {
            let reply = conversation
                .send(&client, &message, &opts)
                .map_err(CliError::assistant)?;
            print_reply(&reply, &conversation, &client, &opts, args.json)
        }
        None => repl(&client, &mut conversation, &opts),
    }
}

fn print_reply(
    reply: &str,
    conversation: &Conversation,
    client: &AssistantClient,
    opts: &ChatOptions,
    json: bool,
) -> Result<(), CliError> {
    if json {
        return print_json(&json!({
            "reply": reply,
            "model": opts.model.as_deref().unwrap_or(&client.config().model),
            "file_ids": conversation.file_ids(),
            "turns": conversation.history().len(),
        }));
    }
    println!("{}", reply);
    Ok(())
}

/// One-shot turn on top of a saved history. The conversation is not kept.
fn chat_with_history(
    client: &AssistantClient,
    path: &Path,
    message: &str,
    system_prompt: &str,
    opts: &ChatOptions,
    json: bool,
) -> Result<(), CliError> {
    let history = read_history(path)?;
    let mut messages = format_value(&history, Some(system_prompt))
        .map_err(|e| CliError::io(format!("{}: {}", path.display(), e.message)))?;
    messages.push(WireMessage { role: Role::User, content: message.to_string() });
    log::info!("continuing {} with {} messages", path.display(), messages.len());

    let completion = client.send_chat(&messages, opts).map_err(CliError::assistant)?;
    if json {
        return print_json(&json!({
            "reply": completion.content,
            "model": opts.model.as_deref().unwrap_or(&client.config().model),
            "messages": messages.len(),
        }));
    }
    println!("{}", completion.content);
    Ok(())
}

/// Interactive session: one message per line until EOF, `exit` or `quit`.
/// Transient failures are reported and the session continues; a rejected
/// or missing key ends it.
fn repl(
    client: &AssistantClient,
    conversation: &mut Conversation,
    opts: &ChatOptions,
) -> Result<(), CliError> {
    let stdin = io::stdin();
    let stdout = io::stdout();

    println!("{}", GREETING);
    prompt(&stdout)?;
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| CliError::io(e.to_string()))?;
        let text = line.trim();
        if text == "exit" || text == "quit" {
            break;
        }
        if !text.is_empty() {
            match conversation.send(client, text, opts) {
                Ok(reply) => println!("{}\n", reply),
                Err(err) if err.kind == ErrorKind::Auth => return Err(CliError::assistant(err)),
                Err(err) => eprintln!("error: {}", err.message),
            }
        }
        prompt(&stdout)?;
    }
    Ok(())
}

fn prompt(stdout: &io::Stdout) -> Result<(), CliError> {
    let mut handle = stdout.lock();
    write!(handle, "> ").map_err(|e| CliError::io(e.to_string()))?;
    handle.flush().map_err(|e| CliError::io(e.to_string()))
}

// ============================================================================
// upload
// ============================================================================

/// Progress line on stderr, redrawn in place.
fn progress_reporter(name: &str) -> ProgressCallback {
    let name = name.to_string();
    Arc::new(move |sent, total| {
        let pct = if total == 0 { 100 } else { sent * 100 / total };
        eprint!("\ruploading {}: {:>3}% ({}/{} bytes)", name, pct, sent, total);
        if sent >= total {
            eprintln!();
        }
    })
}

pub fn cmd_upload(file: PathBuf, call: CallOptions, json: bool) -> Result<(), CliError> {
    let (client, resolved) = connect(call.api_key.as_deref())?;
    let (retry, max_retries) = retry_budget(&call, &resolved.retry);
    let blob = FileBlob::from_path(&file).map_err(|e| CliError::io(e.message))?;

    let opts = UploadOptions {
        retry,
        max_retries,
        progress: (!json).then(|| progress_reporter(&blob.name)),
        ..UploadOptions::default()
    };
    let uploaded = client.upload_file(&blob, &opts).map_err(CliError::assistant)?;

    if json {
        return print_json(&json!({
            "id": uploaded.id,
            "filename": uploaded.filename.as_deref().unwrap_or(&blob.name),
            "bytes": uploaded.bytes.unwrap_or(blob.size()),
            "mime": blob.mime,
        }));
    }
    println!("{}", uploaded.id);
    Ok(())
}

// ============================================================================
// ai doctor
// ============================================================================

pub fn cmd_ai_doctor(json: bool, test: bool, api_key: Option<String>) -> Result<(), CliError> {
    let resolved = ResolvedAssistantConfig::load(api_key.as_deref());
    let diag = AssistantDiagnostics::from_resolved(&resolved);

    let test_result = if test && resolved.status.is_ready() {
        Some(connectivity_test(&resolved))
    } else {
        None
    };
    let test_label = match &test_result {
        None if !test => "skipped".to_string(),
        None => "not_run".to_string(),
        Some(Ok(())) => "ok".to_string(),
        Some(Err(err)) => err.kind.as_str().to_string(),
    };

    if json {
        let mut out = diag.to_json();
        out["blocking_reason"] = json!(resolved.blocking_reason);
        out["test"] = json!(test_label);
        print_json(&out)?;
    } else {
        print!("{}", diag);
        match &test_result {
            None if !test => println!("test:         skipped (use --test)"),
            None => println!("test:         not run (no key)"),
            Some(Ok(())) => println!("test:         ok"),
            Some(Err(err)) => println!("test:         {} ({})", err.kind.as_str(), err.message),
        }

        // Actionable fix suggestions
        if let Some(reason) = &resolved.blocking_reason {
            println!();
            println!("Fix: {}", reason);
        }
    }

    if resolved.status == ConfigStatus::MissingKey {
        return Err(CliError { code: EXIT_AI_MISSING_KEY, message: String::new(), hint: None });
    }
    match test_result {
        Some(Err(err)) => Err(CliError { message: String::new(), hint: None, ..CliError::assistant(err) }),
        _ => Ok(()),
    }
}

pub fn cmd_ai_set_key(key: Option<String>) -> Result<(), CliError> {
    let key = match key {
        Some(key) => key,
        None => {
            let mut line = String::new();
            io::stdin()
                .read_line(&mut line)
                .map_err(|e| CliError::io(e.to_string()))?;
            line
        }
    };
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::args("API key is empty"));
    }
    ai::set_api_key(ai::PROVIDER, key).map_err(|e| {
        CliError::keychain(e).with_hint(format!("set {} instead", ai::env_var_name(ai::PROVIDER)))
    })?;
    eprintln!("stored {} key in the system keychain", ai::PROVIDER);
    Ok(())
}

pub fn cmd_ai_clear_key() -> Result<(), CliError> {
    ai::delete_api_key(ai::PROVIDER).map_err(CliError::keychain)?;
    eprintln!("removed {} key from the system keychain", ai::PROVIDER);
    Ok(())
}

/// Single attempt, no retries: doctor reports what the service says now.
fn connectivity_test(resolved: &ResolvedAssistantConfig) -> Result<(), ApiError> {
    let client = AssistantClient::new(client_config(resolved))?;
    let messages = vec![WireMessage { role: Role::User, content: "ping".to_string() }];
    let opts = ChatOptions {
        max_tokens: Some(1),
        retry: false,
        ..ChatOptions::default()
    };
    client.send_chat(&messages, &opts).map(|_| ())
}
