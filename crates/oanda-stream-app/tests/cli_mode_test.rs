/*
[INPUT]:  Built binary, CLI flags and OANDA_* environment
[OUTPUT]: Exit status checks for dry-run configuration validation
[POS]:    Integration test layer - binary entry point
[UPDATE]: When changing CLI flags or configuration validation
*/

use std::process::Command;

fn binary() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_oanda-stream-app"));
    command
        .env("OANDA_API_URL", "http://127.0.0.1:1")
        .env("OANDA_STREAM_URL", "http://127.0.0.1:1")
        .env("OANDA_API_KEY", "dry-run-token")
        .env("OANDA_ACCOUNT", "101-004-1234567-001")
        .env("RUST_LOG", "error");
    command
}

#[test]
fn cli_mode_dry_run_accepts_environment_config() {
    let output = binary()
        .arg("--dry-run")
        .arg("--instruments")
        .arg("EUR_USD,USD_JPY")
        .arg("--log-level")
        .arg("error")
        .output()
        .expect("Failed to start oanda-stream-app binary");

    assert!(
        output.status.success(),
        "Process exited with non-zero status: {}\nStdout: {}\nStderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn cli_mode_dry_run_rejects_blank_instruments() {
    let output = binary()
        .arg("--dry-run")
        .arg("--instruments")
        .arg(" ")
        .output()
        .expect("Failed to start oanda-stream-app binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("instrument"), "stderr: {stderr}");
}

#[test]
fn cli_mode_missing_config_file_fails() {
    let output = binary()
        .arg("--dry-run")
        .arg("--config")
        .arg("/nonexistent/oanda-stream-app.yaml")
        .output()
        .expect("Failed to start oanda-stream-app binary");

    assert!(!output.status.success());
}
