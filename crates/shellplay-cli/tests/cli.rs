use assert_cmd::Command;

fn shellplay(config_dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shellplay").unwrap();
    // Point at a config file that does not exist so defaults apply.
    cmd.arg("--config")
        .arg(config_dir.path().join("config.toml"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn pipeline_streams_uppercase_text() {
    let dir = tempfile::tempdir().unwrap();
    let output = shellplay(&dir)
        .args(["pipeline", "--no-delay"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Streaming characters:"));
    assert!(stdout.contains("HELLO WORLD FROM ASYNC GENERATORS"));
    assert!(stdout.trim_end().ends_with("Done!"));
}

#[test]
fn pipeline_reads_messages_from_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[pipeline]\nmessages = [\"rust\", \"streams\"]\nseparator = \"-\"\n",
    )
    .unwrap();

    let output = shellplay(&dir)
        .args(["pipeline", "--no-delay"])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().contains("RUST-STREAMS-"));
}

#[test]
fn fifo_round_trip_leaves_no_pipe_behind() {
    let dir = tempfile::tempdir().unwrap();
    let fifo = dir.path().join("demo_fifo");

    let output = shellplay(&dir)
        .arg("fifo")
        .arg("--path")
        .arg(&fifo)
        .args(["--message", "ping over fifo"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Received via FIFO: ping over fifo"));
    assert!(!fifo.exists());
}

#[test]
fn shell_runs_scripted_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = shellplay(&dir)
        .args(["shell", "--program", "sh"])
        .args(["-c", "echo scripted-$((6*7))", "-c", "exit"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("scripted-42"), "stdout was: {stdout}");
}

#[test]
fn malformed_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[pipeline\n").unwrap();

    let output = shellplay(&dir).arg("pipeline").output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load config"));
}

#[test]
fn complete_requires_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let output = shellplay(&dir)
        .args(["complete", "--prompt", "hi"])
        .env_remove("ANTHROPIC_API_KEY")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("ANTHROPIC_API_KEY"));
}
