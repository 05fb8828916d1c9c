#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use midwire::process::{ExitPolicy, ShutdownGrace};
use midwire::{Bridge, BridgeConfig};

fn midwire_bin() -> &'static str {
    env!("CARGO_BIN_EXE_midwire")
}

fn run_with_stdin(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(midwire_bin())
        .arg("--log-level")
        .arg("error")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("midwire should start");

    {
        let mut input = child.stdin.take().expect("stdin should be piped");
        input.write_all(stdin).expect("stdin write should succeed");
    }

    child.wait_with_output().expect("midwire should finish")
}

fn echo_middleware(flags: &str) -> String {
    format!("{} --log-level error echo {flags}", midwire_bin())
}

#[test]
fn bridge_through_uppercasing_echo() {
    let config = BridgeConfig::default()
        .with_exit_policy(ExitPolicy::Report)
        .with_shutdown_grace(ShutdownGrace::uniform(Duration::from_millis(500)));
    let bridge = Bridge::spawn_with_config(&echo_middleware("--uppercase"), config)
        .expect("bridge should start");

    bridge
        .attach(std::io::Cursor::new(b"abc".to_vec()))
        .expect("attach should succeed");

    let mut buf = [0u8; 16];
    let n = bridge.read(&mut buf).expect("read should succeed");
    assert_eq!(&buf[..n], b"ABC");

    bridge.close().expect("close should succeed");
}

#[test]
fn run_pipes_stdin_through_middleware() {
    let middleware = echo_middleware("--uppercase");
    let output = run_with_stdin(&["run", &middleware], b"abc");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(output.stdout, b"ABC");
}

#[test]
fn run_with_identity_middleware() {
    let output = run_with_stdin(&["run", "cat"], b"GET / HTTP/1.1\r\n\r\n");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"GET / HTTP/1.1\r\n\r\n");
}

#[test]
fn run_with_empty_input_produces_nothing() {
    let output = run_with_stdin(&["run", "cat"], b"");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn run_with_missing_program_exits_with_process_error() {
    let output = run_with_stdin(&["run", "/nonexistent/midwire-filter"], b"");
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn run_with_blank_command_is_usage_error() {
    let output = run_with_stdin(&["run", "  "], b"");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn run_rejects_bad_duration() {
    let output = run_with_stdin(&["run", "cat", "--shutdown-grace", "soon"], b"");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn failing_middleware_terminates_host() {
    let output = run_with_stdin(&["run", "false"], b"");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn interrupted_run_exits_with_interrupt_code() {
    let mut child = Command::new(midwire_bin())
        .args(["--log-level", "error", "run", "cat", "--shutdown-grace", "200ms"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("midwire should start");
    let _held_open = child.stdin.take();

    std::thread::sleep(Duration::from_millis(500));
    let pid = libc::pid_t::try_from(child.id()).expect("pid should fit");
    // SAFETY: `pid` names a child this test spawned and has not reaped.
    assert_eq!(unsafe { libc::kill(pid, libc::SIGINT) }, 0);

    let output = child.wait_with_output().expect("midwire should finish");
    assert_eq!(
        output.status.code(),
        Some(130),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn echo_skips_malformed_frames() {
    let output = run_with_stdin(&["echo"], b"zz\n616263\n\n");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"616263\n");
}

#[test]
fn inspect_prints_json_lines() {
    let output = run_with_stdin(&["--format", "json", "inspect"], b"6869\n7a\n");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json line");
    assert_eq!(first["sequence"], 1);
    assert_eq!(first["payload"], "hi");
    assert_eq!(first["payload_size"], 2);
}

#[test]
fn inspect_honors_count() {
    let output = run_with_stdin(&["--format", "raw", "inspect", "--count", "1"], b"6869\n7a\n");

    assert!(output.status.success());
    assert_eq!(output.stdout, b"hi");
}

#[test]
fn version_reports_package_version() {
    let output = Command::new(midwire_bin())
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("midwire {}", env!("CARGO_PKG_VERSION")));
}
