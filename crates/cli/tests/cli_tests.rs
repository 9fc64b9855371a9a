// Integration tests for the plens binary: exit codes and the --json contract.
//
// Every invocation gets its own settings path, bypasses the system keychain
// and sees no API key in the environment, so the host configuration never
// leaks in.
//
// Run with: cargo test -p pricelens-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use httpmock::prelude::*;
use tempfile::TempDir;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn plens(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_plens"));
        cmd.current_dir(self.dir.path())
            .env("PRICELENS_CONFIG", self.dir.path().join("settings.json"))
            .env("PRICELENS_API_BASE", "http://127.0.0.1:9")
            .env("PRICELENS_NO_KEYCHAIN", "1")
            .env_remove("PRICELENS_DEEPSEEK_KEY")
            .env_remove("PRICELENS_API_KEY")
            .env_remove("PRICELENS_LOG")
            .env_remove("RUST_LOG");
        cmd
    }
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run plens")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn json_stdout(output: &Output) -> serde_json::Value {
    let text = stdout(output);
    serde_json::from_str(text.trim())
        .unwrap_or_else(|e| panic!("stdout must be valid JSON: {}\n{}", e, text))
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

const SALES_CSV: &str = "date,price,quantity\n2024-01,12,80\n2024-02,10,100\n2024-03,14,70\n";

const BASKET_CSV: &str = "\
price_a,quantity_a,price_b,quantity_b
10,100,20,50
10,110,22,45
11,120,24,40
";

// ===========================================================================
// columns / price / cross
// ===========================================================================

#[test]
fn columns_json_lists_roles() {
    let env = Env::new();
    let csv = env.file("sales.csv", SALES_CSV);

    let output = run(env.plens().args(["columns", arg(&csv), "--json"]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = json_stdout(&output);
    assert_eq!(val["rows"], 3);
    assert_eq!(val["columns"], serde_json::json!(["date", "price", "quantity"]));
    assert_eq!(val["price"], serde_json::json!(["price"]));
    assert_eq!(val["quantity"], serde_json::json!(["quantity"]));
}

#[test]
fn price_text_output_sorted_by_price() {
    let env = Env::new();
    let csv = env.file("sales.csv", SALES_CSV);

    let output = run(env.plens().args(["price", arg(&csv), "--decimals", "2"]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = stdout(&output);
    let first = text.find("10.00 - 12.00").expect("first segment");
    let second = text.find("12.00 - 14.00").expect("second segment");
    assert!(first < second);
    assert!(text.contains("ELASTIC"));
}

#[test]
fn price_json_reports_segments() {
    let env = Env::new();
    let csv = env.file("sales.csv", SALES_CSV);

    let output = run(env.plens().args(["price", arg(&csv), "--json"]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = json_stdout(&output);
    assert_eq!(val["price_column"], "price");
    let segments = val["segments"].as_array().unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0]["class"], "ELASTIC");
    let e = segments[0]["value"].as_f64().unwrap();
    assert!((e - 1.2222).abs() < 1e-3, "got {}", e);
    assert!(val["skipped"].as_array().unwrap().is_empty());
}

#[test]
fn price_without_columns_is_validation_error() {
    let env = Env::new();
    let csv = env.file("bad.csv", "cost,units\n1,2\n3,4\n");

    let output = run(env.plens().args(["price", arg(&csv)]));
    assert_eq!(output.status.code(), Some(4));
    let err = stderr(&output);
    assert!(err.contains("error:"), "stderr: {}", err);
    assert!(err.contains("hint:  name the columns with --price and --quantity"));
}

#[test]
fn price_single_row_is_validation_error() {
    let env = Env::new();
    let csv = env.file("one.csv", "price,quantity\n10,100\n");

    let output = run(env.plens().args(["price", arg(&csv)]));
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr(&output).contains("at least 2 observations"));
}

#[test]
fn missing_input_file_is_read_error() {
    let env = Env::new();
    let output = run(env.plens().args(["price", "nope.csv"]));
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn price_export_writes_workbook() {
    let env = Env::new();
    let csv = env.file("sales.csv", SALES_CSV);
    let out = env.dir.path().join("results.xlsx");

    let output = run(env.plens().args(["price", arg(&csv), "--json", "--export", arg(&out)]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = json_stdout(&output);
    assert_eq!(val["export"]["sheets"], 2);
    assert_eq!(val["export"]["raw_rows"], 3);
    assert_eq!(val["export"]["result_rows"], 2);

    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn cross_json_classifies_goods() {
    let env = Env::new();
    let csv = env.file("basket.csv", BASKET_CSV);

    let output = run(env.plens().args(["cross", arg(&csv), "--json"]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let val = json_stdout(&output);
    assert_eq!(val["good_a"]["quantity"], "quantity_a");
    assert_eq!(val["good_b"]["price"], "price_b");
    assert_eq!(val["segments"].as_array().unwrap().len(), 2);
    // Good B's price rises while good A's demand rises.
    assert_eq!(val["class"], "SUBSTITUTE");
    assert!(val["average_elasticity"].as_f64().unwrap() > 0.0);
}

#[test]
fn cross_same_good_is_validation_error() {
    let env = Env::new();
    let csv = env.file("basket.csv", BASKET_CSV);

    let output = run(env.plens().args([
        "cross",
        arg(&csv),
        "--price-a",
        "price_a",
        "--quantity-a",
        "quantity_a",
        "--price-b",
        "price_a",
        "--quantity-b",
        "quantity_b",
    ]));
    assert_eq!(output.status.code(), Some(4));
}

// ===========================================================================
// chat / upload / ai doctor
// ===========================================================================

#[test]
fn chat_ignores_keychain_and_uses_env_key() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-env");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"content": "ok"}}]
        }));
    });

    let env = Env::new();
    let output = run(env
        .plens()
        .env("PRICELENS_API_BASE", server.base_url())
        .env("PRICELENS_DEEPSEEK_KEY", "sk-env")
        .args(["chat", "hello"]));

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    mock.assert();
}

#[test]
fn cross_export_numbers_rows_from_one() {
    let env = Env::new();
    let csv = env.file("basket.csv", BASKET_CSV);
    let out = env.dir.path().join("cross.xlsx");

    let output = run(env.plens().args(["cross", arg(&csv), "--json", "--export", arg(&out)]));
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(json_stdout(&output)["export"]["result_rows"], 3);
}

#[test]
fn chat_without_key_exits_missing_key() {
    let env = Env::new();
    let output = run(env.plens().args(["chat", "hello"]));

    assert_eq!(output.status.code(), Some(10));
    let err = stderr(&output);
    assert!(err.contains("API key is not configured"), "stderr: {}", err);
    assert!(err.contains("PRICELENS_DEEPSEEK_KEY"));
}

#[test]
fn chat_prints_reply() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test")
            .body_includes("\"content\":\"hello\"");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Raise prices slowly."}}]
            }));
    });

    let env = Env::new();
    let output = run(env
        .plens()
        .env("PRICELENS_API_BASE", server.base_url())
        .args(["chat", "hello", "--api-key", "sk-test"]));

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "Raise prices slowly.");
    mock.assert();
}

#[test]
fn chat_server_error_without_retry() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(503).body("busy");
    });

    let env = Env::new();
    let output = run(env
        .plens()
        .env("PRICELENS_API_BASE", server.base_url())
        .args(["chat", "hello", "--api-key", "sk-test", "--no-retry"]));

    assert_eq!(output.status.code(), Some(14));
    mock.assert_calls(1);
}

#[test]
fn chat_with_history_file() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .body_includes("\"content\":\"earlier question\"")
            .body_includes("\"content\":\"follow up\"");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"content": "Sure."}}]
        }));
    });

    let env = Env::new();
    let history = env.file(
        "history.json",
        r#"[{"isBot": false, "text": "earlier question"}, {"isBot": true, "text": "earlier answer"}]"#,
    );
    let output = run(env.plens().env("PRICELENS_API_BASE", server.base_url()).args([
        "chat",
        "follow up",
        "--api-key",
        "sk-test",
        "--history",
        arg(&history),
        "--json",
    ]));

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = json_stdout(&output);
    assert_eq!(val["reply"], "Sure.");
    // system prompt + two history entries + the new message
    assert_eq!(val["messages"], 4);
    mock.assert();
}

#[test]
fn upload_json_reports_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/files")
            .header("authorization", "Bearer sk-test")
            .body_includes("assistants");
        then.status(200).json_body(serde_json::json!({"id": "file-42", "bytes": 30}));
    });

    let env = Env::new();
    let csv = env.file("sales.csv", SALES_CSV);
    let output = run(env
        .plens()
        .env("PRICELENS_API_BASE", server.base_url())
        .args(["upload", arg(&csv), "--api-key", "sk-test", "--json"]));

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = json_stdout(&output);
    assert_eq!(val["id"], "file-42");
    assert_eq!(val["mime"], "text/csv");
    mock.assert();
}

#[test]
fn doctor_json_reports_missing_key() {
    let env = Env::new();
    let output = run(env.plens().args(["ai", "doctor", "--json"]));

    assert_eq!(output.status.code(), Some(10));
    let val = json_stdout(&output);
    assert_eq!(val["schema_version"], 1);
    assert_eq!(val["status"], "missing_key");
    assert_eq!(val["key"], "missing");
    assert_eq!(val["keychain"], "unavailable");
    assert_eq!(val["test"], "skipped");
}

#[test]
fn doctor_ready_with_flag_key() {
    let env = Env::new();
    let output = run(env.plens().args(["ai", "doctor", "--json", "--api-key", "sk-test"]));

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let val = json_stdout(&output);
    assert_eq!(val["status"], "ready");
    assert_eq!(val["key_source"], "flag");
}
