//! CLI integration tests for the faultline binary
//!
//! These tests run the compiled binary, so fatal paths really exit the
//! process and the exit status can be checked.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

const NOTICE: &str = "Error throttling threshold was reached, no more full error reports are shown.";

/// Get a Command instance for the faultline binary with a clean environment
#[allow(deprecated)]
fn faultline_cmd() -> Command {
    let mut cmd = Command::cargo_bin("faultline").expect("Failed to find faultline binary");
    cmd.env_remove("SERVER_PROTOCOL")
        .env_remove("GATEWAY_INTERFACE")
        .env_remove("RUST_LOG")
        .env_remove("FAULTLINE__ERRORS__THROTTLING");
    cmd
}

fn interactive() -> Command {
    let mut cmd = faultline_cmd();
    cmd.args(["--mode", "interactive", "--no-color"]);
    cmd
}

fn served() -> Command {
    let mut cmd = faultline_cmd();
    cmd.args(["--mode", "served"]);
    cmd
}

// ============================================================================
// --help / --version
// ============================================================================

#[test]
fn test_help_lists_commands() {
    faultline_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("event"))
        .stdout(predicate::str::contains("exception"))
        .stdout(predicate::str::contains("shutdown"))
        .stdout(predicate::str::contains("panic"));
}

#[test]
fn test_version_flag() {
    faultline_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_severity_is_rejected() {
    faultline_cmd()
        .args(["event", "--severity", "catastrophic"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown severity"));
}

// ============================================================================
// Interactive mode
// ============================================================================

#[test]
fn test_interactive_warning_line() {
    interactive()
        .args(["event", "--severity", "warning", "-m", "division by zero"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "Warning - division by zero #1 in src/main.rs on line ",
        ));
}

#[test]
fn test_interactive_throttling() {
    let output = interactive()
        .args(["--threshold", "2", "event", "--count", "5", "-m", "w"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Warning - w #1 in "));
    assert!(lines[1].starts_with("Warning - w #2 in "));
    assert_eq!(lines[2], format!("User Notice - {NOTICE} in  on line 0"));
}

#[test]
fn test_interactive_fatal_event_exits_with_one() {
    interactive()
        .args(["event", "--severity", "user-error", "-m", "bad input"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("User Error - bad input #1 in src/main.rs"));
}

#[test]
fn test_interactive_fatal_event_discards_buffered_output() {
    interactive()
        .args(["--prelude", "<p>partial", "event", "--severity", "error", "-m", "boom"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("Error - boom #1 in src/main.rs"))
        .stdout(predicate::str::contains("<p>partial").not());
}

#[test]
fn test_interactive_warning_keeps_buffered_output() {
    interactive()
        .args(["--prelude", "<p>partial\n", "event", "-m", "slow"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<p>partial"))
        .stdout(predicate::str::contains("Warning - slow #1"));
}

#[test]
fn test_numeric_severity_code() {
    interactive()
        .args(["event", "--severity", "8", "-m", "note"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Notice - note #1"));
}

#[test]
fn test_continue_on_keeps_process_alive() {
    interactive()
        .args(["--continue-on", "user_error", "event", "--severity", "user-error", "--count", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("User Error - runtime event #2"));
}

// ============================================================================
// Served mode
// ============================================================================

#[test]
fn test_served_fatal_replaces_buffered_output() {
    served()
        .args(["--prelude", "<p>half rendered", "event", "--severity", "error", "-m", "db down"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with(
            "HTTP/1.1 500 Internal Server Error\r\n\r\n",
        ))
        .stdout(predicate::str::contains("<!DOCTYPE html>"))
        .stdout(predicate::str::contains("db down #1"))
        .stdout(predicate::str::contains("half rendered").not());
}

#[test]
fn test_served_status_line_uses_request_protocol() {
    served()
        .args(["--protocol", "HTTP/1.0", "event", "--severity", "error"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("HTTP/1.0 500 Internal Server Error"));
}

#[test]
fn test_served_protocol_from_environment() {
    faultline_cmd()
        .env("SERVER_PROTOCOL", "HTTP/2.0")
        .args(["event", "--severity", "error"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("HTTP/2.0 500 Internal Server Error"));
}

#[test]
fn test_served_non_fatal_errors_are_inline_and_listed_on_fatal_page() {
    served()
        .args(["--continue-on", "256", "--prelude", "<p>page</p>", "event", "-s", "256", "-n", "2"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("<p>page</p>"))
        .stdout(predicate::str::contains(
            "<div class=\"error-block\"><strong>User Error</strong> - runtime event #2",
        ))
        .stdout(predicate::str::contains("500").not());
}

#[test]
fn test_served_warning_is_escaped() {
    served()
        .args(["event", "-m", "<script>"])
        .assert()
        .success()
        .stdout(predicate::str::contains("&lt;script&gt; #1"))
        .stdout(predicate::str::contains("<script>").not());
}

#[test]
fn test_served_fatal_json_view() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[errors]\nview_fatal = \"errors/json\"").unwrap();

    served()
        .arg("--config")
        .arg(file.path())
        .args(["event", "--severity", "error", "-m", "db down"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("HTTP/1.1 500 Internal Server Error"))
        .stdout(predicate::str::contains("\"severity_label\": \"Error\""))
        .stdout(predicate::str::contains("\"message\": \"db down #1\""))
        .stdout(predicate::str::contains("\"discarded_bytes\": 0"))
        .stdout(predicate::str::contains("<!DOCTYPE html>").not());
}

#[test]
fn test_served_fatal_survives_panicking_renderer() {
    served()
        .args(["--renderer", "panic", "event", "--severity", "error", "-m", "db down"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("500 Internal Server Error"))
        .stdout(predicate::str::contains("Error - db down #1 in src/main.rs"));
}

// ============================================================================
// Exceptions, shutdown and panics
// ============================================================================

#[test]
fn test_self_reporting_exception() {
    served()
        .args(["exception", "--self-report", "false"])
        .assert()
        .success()
        .stdout(predicate::str::contains("error reported itself"))
        .stdout(predicate::str::contains("handled: false"))
        .stdout(predicate::str::contains("error-block").not());
}

#[test]
fn test_uncoded_exception_is_fatal() {
    interactive()
        .args(["exception", "-m", "unreachable state"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("Error - unreachable state in src/main.rs"));
}

#[test]
fn test_exception_with_warning_code_continues() {
    interactive()
        .args(["exception", "--code", "2", "-m", "stale cache"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Warning - stale cache"));
}

#[test]
fn test_shutdown_with_fatal_error() {
    interactive()
        .args(["shutdown", "--severity", "compile-error", "-m", "last words"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("Compile Error - last words in src/main.rs"));
}

#[test]
fn test_shutdown_with_warning_is_silent() {
    interactive()
        .args(["shutdown", "--severity", "warning"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_shutdown_exits_even_when_downgraded() {
    interactive()
        .args(["--continue-on", "error", "shutdown", "--severity", "error"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("Error - unhandled error"));
}

#[test]
fn test_panic_is_reported_and_exits_with_one() {
    interactive()
        .args(["panic", "-m", "kaboom"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("Error - kaboom in src/main.rs"));
}

#[test]
fn test_served_panic_renders_fatal_page() {
    served()
        .args(["--prelude", "<p>gone", "panic", "-m", "kaboom"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("500 Internal Server Error"))
        .stdout(predicate::str::contains("<p class=\"kind\">Panic</p>"))
        .stdout(predicate::str::contains("<p>gone").not());
}

#[test]
fn test_served_panic_with_panicking_renderer_exits_with_one() {
    served()
        .args(["--prelude", "<p>gone", "--renderer", "panic", "panic", "-m", "kaboom"])
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("HTTP/1.1 500 Internal Server Error"))
        .stdout(predicate::str::contains("Error - kaboom in src/main.rs"))
        .stdout(predicate::str::contains("<p>gone").not())
        .stderr(predicate::str::contains("abort").not());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_config_file_threshold() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[errors]\nthrottling = 1").unwrap();

    let output = interactive()
        .arg("--config")
        .arg(file.path())
        .args(["event", "--count", "4"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.contains(NOTICE));
}

#[test]
fn test_config_file_continue_on() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[errors]\ncontinue_on = [1]").unwrap();

    interactive()
        .arg("--config")
        .arg(file.path())
        .args(["event", "--severity", "error"])
        .assert()
        .success();
}

#[test]
fn test_environment_override() {
    let output = interactive()
        .env("FAULTLINE__ERRORS__THROTTLING", "0")
        .args(["event", "--count", "3"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec![format!("User Notice - {NOTICE} in  on line 0")]);
}

#[test]
fn test_missing_config_file() {
    interactive()
        .args(["--config", "does/not/exist.toml", "event"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("configuration file not found"));
}
