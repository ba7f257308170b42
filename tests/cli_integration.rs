use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write test file");
}

fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn token_line(at: DateTime<Utc>, total: i64, rate_limits: Option<&str>) -> String {
    let limits = rate_limits
        .map(|raw| format!(r#","rate_limits":{raw}"#))
        .unwrap_or_default();
    format!(
        r#"{{"timestamp":"{}","type":"event_msg","payload":{{"type":"token_count","info":{{"total_token_usage":{{"input_tokens":{total},"cached_input_tokens":0,"output_tokens":0,"reasoning_output_tokens":0,"total_tokens":{total}}}}}{limits}}}}}"#,
        iso(at)
    )
}

/// Run the binary against `codex_home`, isolated from any user config
fn run_codex_usage(codex_home: &Path, args: &[&str]) -> (bool, Vec<u8>, Vec<u8>) {
    let bin = std::env::var("CARGO_BIN_EXE_codex-usage").unwrap_or_else(|_| {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("target");
        path.push("debug");
        if cfg!(windows) {
            path.push("codex-usage.exe");
        } else {
            path.push("codex-usage");
        }
        path.to_string_lossy().into_owned()
    });
    let mut cmd = Command::new(bin);
    if !args.contains(&"--config") {
        cmd.arg("--config").arg(codex_home.join("no-such-config.toml"));
    }
    cmd.arg("--no-color")
        .args(args)
        .env("CODEX_HOME", codex_home)
        .env_remove("RUST_LOG");
    let output = cmd.output().expect("run codex-usage");
    (output.status.success(), output.stdout, output.stderr)
}

fn stdout_json(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).expect("json")
}

#[test]
fn snapshot_stdout_reports_usage() {
    let root = tempfile::tempdir().unwrap();
    let codex_home = root.path();
    let now = Utc::now();
    let resets_at = now.timestamp() + 3900;

    write_file(
        &codex_home.join("sessions/2026/02/10/rollout-2026-02-10T10-00-00-live.jsonl"),
        &[
            format!(
                r#"{{"timestamp":"{}","type":"session_meta","payload":{{"id":"live-session","cli_version":"0.98.0"}}}}"#,
                iso(now - Duration::minutes(90))
            ),
            token_line(now - Duration::minutes(60), 100, None),
            token_line(
                now - Duration::minutes(30),
                250,
                Some(&format!(
                    r#"{{"primary":{{"used_percent":36.0,"window_minutes":300,"resets_at":{resets_at}}},"secondary":{{"used_percent":12.0,"window_minutes":10080}}}}"#
                )),
            ),
        ]
        .join("\n"),
    );
    write_file(
        &codex_home.join("archived_sessions/rollout-old.jsonl"),
        &token_line(now - Duration::days(3), 40, None),
    );
    write_file(&codex_home.join("archived_sessions/notes.txt"), "ignored");

    let (ok, stdout, stderr) =
        run_codex_usage(codex_home, &["--timezone", "UTC", "snapshot", "--stdout"]);
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));
    let json = stdout_json(&stdout);

    assert_eq!(json["files_scanned"], 2);
    assert_eq!(json["sessions_count"], 2);
    assert_eq!(json["events_count"], 3);
    assert_eq!(json["windows"]["last_5h"]["total_tokens"], 250);
    assert_eq!(json["windows"]["last_7d"]["total_tokens"], 290);
    assert_eq!(json["windows"]["all_time"]["total_tokens"], 290);
    assert_eq!(json["session_window"]["used_percent"], 36.0);
    assert_eq!(json["session_window"]["resets_at_epoch"], resets_at);
    assert_eq!(json["weekly_window"]["used_percent"], 12.0);
    assert!(json["weekly_window"]["resets_at"].is_null());
    assert_eq!(json["active_session"]["session_id"], "live-session");
    assert_eq!(json["active_session"]["cli_version"], "0.98.0");
    assert_eq!(json["active_session"]["totals"]["total_tokens"], 250);
    assert_eq!(json["top_sessions"][0]["session_id"], "live-session");
    assert_eq!(json["top_sessions"][1]["session_id"], "rollout-old");
    assert_eq!(json["timezone"], "UTC");

    // Newest day first in the document itself
    let text = String::from_utf8_lossy(&stdout);
    let mut days: Vec<&String> = json["daily_totals"]
        .as_object()
        .expect("daily_totals object")
        .keys()
        .collect();
    assert!(days.len() >= 2);
    days.sort_by(|a, b| b.cmp(a));
    let positions: Vec<usize> = days
        .iter()
        .map(|day| text.find(&format!("\"{day}\"")).expect("day key"))
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn empty_home_writes_well_formed_snapshot() {
    let root = tempfile::tempdir().unwrap();
    let codex_home = root.path();

    let (ok, stdout, stderr) = run_codex_usage(codex_home, &["snapshot"]);
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));

    let path = codex_home.join("usage_tracker/latest_snapshot.json");
    let printed = String::from_utf8_lossy(&stdout);
    assert!(printed.contains("Snapshot written:"), "stdout: {printed}");

    let json: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["files_scanned"], 0);
    assert_eq!(json["events_count"], 0);
    assert!(json["last_activity_at"].is_null());
    assert_eq!(json["windows"]["all_time"]["total_tokens"], 0);
    assert!(json["session_window"]["used_percent"].is_null());
    assert!(json["rate_limits"]["captured_at"].is_null());
    assert!(json["active_session"]["session_id"].is_null());
    assert_eq!(json["daily_totals"], serde_json::json!({}));
    assert_eq!(json["top_sessions"], serde_json::json!([]));
    assert_eq!(json["config"]["session_window_minutes"], 300);
    assert_eq!(json["config"]["week_window_minutes"], 10_080);
}

#[test]
fn snapshot_quiet_writes_to_explicit_path() {
    let root = tempfile::tempdir().unwrap();
    let output = root.path().join("out/snap.json");

    let (ok, stdout, stderr) = run_codex_usage(
        root.path(),
        &["snapshot", "--quiet", "--output", output.to_str().unwrap()],
    );
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));
    assert!(stdout.is_empty());
    assert!(output.is_file());
}

#[test]
fn statusline_uses_configured_limit() {
    let root = tempfile::tempdir().unwrap();
    let codex_home = root.path();
    let now = Utc::now();
    write_file(
        &codex_home.join("sessions/rollout-a.jsonl"),
        &token_line(now - Duration::minutes(10), 250, None),
    );
    let config = codex_home.join("tracker.toml");
    write_file(&config, "session_limit_tokens = 1000\n");

    let (ok, stdout, stderr) = run_codex_usage(
        codex_home,
        &["--config", config.to_str().unwrap(), "statusline"],
    );
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));
    assert_eq!(
        String::from_utf8_lossy(&stdout).trim_end(),
        "Codex 5h 25.0% (250) | 7d 250 tok | reset n/a"
    );
}

#[test]
fn report_prints_windows_and_writes_snapshot() {
    let root = tempfile::tempdir().unwrap();
    let codex_home = root.path();
    write_file(
        &codex_home.join("sessions/rollout-a.jsonl"),
        &token_line(Utc::now() - Duration::minutes(5), 1234, None),
    );
    let snapshot = root.path().join("report.json");

    let (ok, stdout, stderr) = run_codex_usage(
        codex_home,
        &["report", "--snapshot-output", snapshot.to_str().unwrap()],
    );
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));
    let text = String::from_utf8_lossy(&stdout);
    assert!(text.contains("Session window"));
    assert!(text.contains("Weekly window"));
    assert!(text.contains("Rolling totals"));
    assert!(text.contains("1 234"));

    let json: Value = serde_json::from_str(&fs::read_to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(json["windows"]["last_24h"]["total_tokens"], 1234);
}

#[test]
fn watch_single_run_writes_snapshot() {
    let root = tempfile::tempdir().unwrap();
    let output = root.path().join("watched.json");

    let (ok, _stdout, stderr) = run_codex_usage(
        root.path(),
        &["watch", "--runs", "1", "--output", output.to_str().unwrap()],
    );
    assert!(ok, "stderr: {}", String::from_utf8_lossy(&stderr));
    let json: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json["events_count"], 0);
}

#[test]
fn invalid_timezone_is_an_error() {
    let root = tempfile::tempdir().unwrap();

    let (ok, _stdout, stderr) =
        run_codex_usage(root.path(), &["--timezone", "Mars/Olympus", "statusline"]);
    assert!(!ok);
    assert!(String::from_utf8_lossy(&stderr).contains("Invalid timezone: Mars/Olympus"));
}
