use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn run_subcommand_prints_exit_code_and_streams() {
    let work = tempdir().expect("work dir");
    let script = work.path().join("hello.py");
    fs::write(&script, "import sys\nprint('hello')\nsys.stderr.write('warn\\n')\n")
        .expect("write script");

    let output = Command::new(binary_path())
        .current_dir(work.path())
        .env("XDG_CONFIG_HOME", work.path())
        .env_remove("LOCALAGENT_PYTHON")
        .arg("run")
        .arg(&script)
        .output()
        .expect("run localagent");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout is utf-8");
    assert_eq!(
        stdout,
        "exit=0\n--- stdout ---\nhello\n\n--- stderr ---\nwarn\n\n"
    );
}

#[test]
fn run_subcommand_reports_nonzero_exit_without_failing() {
    let work = tempdir().expect("work dir");
    let script = work.path().join("fail.py");
    fs::write(&script, "raise SystemExit(4)\n").expect("write script");

    let output = Command::new(binary_path())
        .current_dir(work.path())
        .env("XDG_CONFIG_HOME", work.path())
        .env_remove("LOCALAGENT_PYTHON")
        .args(["run"])
        .arg(&script)
        .output()
        .expect("run localagent");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout is utf-8");
    assert!(stdout.starts_with("exit=4\n"), "stdout: {stdout:?}");
}

#[test]
fn run_subcommand_fails_for_missing_file() {
    let work = tempdir().expect("work dir");

    let output = Command::new(binary_path())
        .current_dir(work.path())
        .env("XDG_CONFIG_HOME", work.path())
        .args(["run", "does-not-exist.py"])
        .output()
        .expect("run localagent");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("stderr is utf-8");
    assert!(
        stderr.contains("Failed to read does-not-exist.py"),
        "stderr: {stderr:?}"
    );
}

#[test]
fn fetch_subcommand_requires_url() {
    let output = Command::new(binary_path())
        .arg("fetch")
        .output()
        .expect("run localagent");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("stderr is utf-8");
    assert!(stderr.contains("<URL>"), "stderr: {stderr:?}");
}

fn binary_path() -> String {
    std::env::var("CARGO_BIN_EXE_localagent")
        .unwrap_or_else(|_| "target/debug/localagent".to_string())
}
