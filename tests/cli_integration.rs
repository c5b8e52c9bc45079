//! Integration tests that run the CLI binary.

fn bin() -> std::process::Command {
    let bin = env!(concat!("CARGO_BIN_EXE_ollama", "-", "panel"));
    std::process::Command::new(bin)
}

/// Base URL of a local port with nothing listening on it.
fn dead_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{}", addr)
}

#[test]
fn cli_help_lists_subcommands() {
    let output = bin().arg("--help").output().expect("binary not found");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("models"));
    assert!(stdout.contains("generate"));
    assert!(stdout.contains("--base-url"));
}

#[test]
fn cli_version_succeeds() {
    let output = bin().arg("--version").output().expect("binary not found");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("ollama-panel"));
}

#[test]
fn models_without_server_exits_with_error() {
    let tmp = tempfile::TempDir::new().expect("temp dir");
    let output = bin()
        .current_dir(tmp.path())
        .args(["--base-url", &dead_base_url(), "models"])
        .output()
        .expect("binary not found");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Could not reach"), "stderr: {}", stderr);
}

#[test]
fn generate_without_server_exits_with_error() {
    let output = bin()
        .args(["--base-url", &dead_base_url(), "generate", "hello"])
        .output()
        .expect("binary not found");

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn blank_chat_message_is_ignored_without_network() {
    let tmp = tempfile::TempDir::new().expect("temp dir");
    let output = bin()
        .env("XDG_CONFIG_HOME", tmp.path())
        .args(["--base-url", &dead_base_url(), "chat", "   "])
        .output()
        .expect("binary not found");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty());
    assert!(output.stderr.is_empty());
}

#[test]
fn blank_prompt_is_ignored_without_network() {
    let output = bin()
        .args(["--base-url", &dead_base_url(), "generate", ""])
        .output()
        .expect("binary not found");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn malformed_config_is_reported_and_ignored() {
    let tmp = tempfile::TempDir::new().expect("temp dir");
    let config_dir = tmp.path().join("ollama-panel");
    std::fs::create_dir_all(&config_dir).expect("config dir");
    std::fs::write(config_dir.join("config.json"), "{ not json").expect("write config");

    let output = bin()
        .env("XDG_CONFIG_HOME", tmp.path())
        .env("RUST_LOG", "warn")
        .args(["--base-url", &dead_base_url(), "chat", " "])
        .output()
        .expect("binary not found");

    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Ignoring unreadable config"), "stderr: {}", stderr);
}
