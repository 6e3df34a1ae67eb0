use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dewey_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dewey");
    path
}

const CONFIG: &str = r#"[openai]
endpoint = "http://127.0.0.1:9"
chat_deployment = "gpt-4o"
embedding_deployment = "text-embedding-3-large"
timeout_secs = 2

[search]
endpoint = "http://127.0.0.1:9"
index = "articles"
timeout_secs = 2
"#;

fn setup_test_env(content: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("dewey.toml");
    fs::write(&config_path, content).unwrap();
    (tmp, config_path)
}

fn run_dewey(dir: &Path, config_path: &Path, env: &[(&str, &str)], args: &[&str]) -> (String, String, bool) {
    let binary = dewey_binary();
    let mut cmd = Command::new(&binary);
    cmd.current_dir(dir)
        .env_remove("AZURE_OPENAI_API_KEY")
        .env_remove("AZURE_SEARCH_API_KEY")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args);
    for (k, v) in env {
        cmd.env(k, v);
    }
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dewey binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(dewey_binary()).arg("--help").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    for command in ["ask", "intent", "search", "serve"] {
        assert!(stdout.contains(command), "missing {} in help:\n{}", command, stdout);
    }
}

#[test]
fn test_missing_openai_key_is_configuration_error() {
    let (tmp, config) = setup_test_env(CONFIG);
    let (stdout, stderr, ok) = run_dewey(tmp.path(), &config, &[], &["ask", "What happened at City Hall?"]);
    assert!(!ok);
    assert!(stdout.is_empty(), "stdout: {}", stdout);
    assert!(stderr.contains("Configuration error"), "stderr: {}", stderr);
    assert!(stderr.contains("AZURE_OPENAI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_missing_search_key_is_configuration_error() {
    let (tmp, config) = setup_test_env(CONFIG);
    let (_, stderr, ok) = run_dewey(
        tmp.path(),
        &config,
        &[("AZURE_OPENAI_API_KEY", "k")],
        &["search", "council budget"],
    );
    assert!(!ok);
    assert!(stderr.contains("AZURE_SEARCH_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_blank_key_counts_as_missing() {
    let (tmp, config) = setup_test_env(CONFIG);
    let (_, stderr, ok) = run_dewey(
        tmp.path(),
        &config,
        &[("AZURE_OPENAI_API_KEY", "  "), ("AZURE_SEARCH_API_KEY", "k")],
        &["intent", "q"],
    );
    assert!(!ok);
    assert!(stderr.contains("AZURE_OPENAI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn test_empty_message_rejected() {
    let (tmp, config) = setup_test_env(CONFIG);
    let (_, stderr, ok) = run_dewey(tmp.path(), &config, &[], &["ask", "   "]);
    assert!(!ok);
    assert!(stderr.contains("message must not be empty"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_rejected() {
    let content = CONFIG.replace("index = \"articles\"", "index = \"articles\"\nk_nearest = 5\ntop = 10");
    let (tmp, config) = setup_test_env(&content);
    let (_, stderr, ok) = run_dewey(tmp.path(), &config, &[], &["ask", "q"]);
    assert!(!ok);
    assert!(stderr.contains("k_nearest"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_file() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, ok) = run_dewey(tmp.path(), &missing, &[], &["ask", "q"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_unreachable_service_fails_run() {
    let (tmp, config) = setup_test_env(CONFIG);
    let (_, stderr, ok) = run_dewey(
        tmp.path(),
        &config,
        &[("AZURE_OPENAI_API_KEY", "k"), ("AZURE_SEARCH_API_KEY", "k")],
        &["ask", "--no-steps", "What happened at City Hall?"],
    );
    assert!(!ok);
    assert!(stderr.contains("Intent extraction failed"), "stderr: {}", stderr);
}

#[test]
fn test_json_progress_reports_steps_on_stderr() {
    let (tmp, config) = setup_test_env(CONFIG);
    let (stdout, stderr, ok) = run_dewey(
        tmp.path(),
        &config,
        &[("AZURE_OPENAI_API_KEY", "k"), ("AZURE_SEARCH_API_KEY", "k")],
        &["ask", "--progress", "json", "What happened at City Hall?"],
    );
    assert!(!ok);
    assert!(stdout.is_empty(), "stdout: {}", stdout);
    let first_step: serde_json::Value = stderr
        .lines()
        .find(|line| line.starts_with('{'))
        .map(|line| serde_json::from_str(line).unwrap())
        .unwrap_or_else(|| panic!("no JSON progress line in stderr: {}", stderr));
    assert_eq!(first_step["event"], "step");
    assert_eq!(first_step["step"]["title"], "Generating metadata");
    assert_eq!(first_step["step"]["status"], "pending");
}

#[test]
fn test_unknown_progress_mode_rejected() {
    let (tmp, config) = setup_test_env(CONFIG);
    let (_, stderr, ok) = run_dewey(tmp.path(), &config, &[], &["ask", "--progress", "loud", "q"]);
    assert!(!ok);
    assert!(stderr.contains("unknown progress mode"), "stderr: {}", stderr);
}
