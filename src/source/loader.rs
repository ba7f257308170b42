//! Discovery → parse pipeline for one aggregation run

use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::core::ParsedSession;

use super::discovery::find_session_files;
use super::parser::parse_session_file;

/// Sessions recovered from disk in discovery order
#[derive(Debug, Default)]
pub(crate) struct LoadResult {
    /// Every discovered file, including ones that yielded nothing
    pub(crate) files_scanned: usize,
    pub(crate) sessions: Vec<ParsedSession>,
}

/// Read every session log under `codex_home`, one file at a time.
///
/// Files that cannot be read or carry no usage are dropped; they still
/// count towards `files_scanned`.
pub(crate) fn load_sessions(codex_home: &Path, now: DateTime<Utc>) -> LoadResult {
    let load_start = Instant::now();

    let files = find_session_files(codex_home);
    debug!(
        codex_home = %codex_home.display(),
        files = files.len(),
        discovery_ms = load_start.elapsed().as_secs_f64() * 1000.0,
        "discovered session logs"
    );

    let sessions: Vec<ParsedSession> = files
        .iter()
        .filter_map(|path| parse_session_file(path, now))
        .collect();

    let elapsed_ms = load_start.elapsed().as_secs_f64() * 1000.0;
    info!(
        files = files.len(),
        sessions = sessions.len(),
        elapsed_ms,
        "parsed session logs"
    );

    LoadResult {
        files_scanned: files.len(),
        sessions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn counts_files_that_yield_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = dir.path().join("sessions");
        fs::create_dir_all(&sessions).unwrap();
        fs::write(
            sessions.join("rollout-used.jsonl"),
            r#"{"timestamp":"2026-02-06T10:00:00Z","type":"event_msg","payload":{"type":"token_count","info":{"total_token_usage":{"total_tokens":10}}}}
"#,
        )
        .unwrap();
        fs::write(
            sessions.join("rollout-idle.jsonl"),
            r#"{"timestamp":"2026-02-06T10:00:00Z","type":"session_meta","payload":{"id":"idle"}}
"#,
        )
        .unwrap();

        let result = load_sessions(dir.path(), Utc::now());
        assert_eq!(result.files_scanned, 2);
        assert_eq!(result.sessions.len(), 1);
        assert_eq!(result.sessions[0].session_id, "rollout-used");
    }

    #[test]
    fn empty_home_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_sessions(&dir.path().join("missing"), Utc::now());
        assert_eq!(result.files_scanned, 0);
        assert!(result.sessions.is_empty());
    }
}
