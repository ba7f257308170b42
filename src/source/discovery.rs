//! Session log discovery
//!
//! Codex keeps live sessions under `<home>/sessions/YYYY/MM/DD/rollout-*.jsonl`
//! and moves finished ones flat into `<home>/archived_sessions/`.

use std::env;
use std::path::{Path, PathBuf};

use crate::consts::{ARCHIVED_SUBDIR, CODEX_HOME_ENV, DEFAULT_CODEX_DIR, SESSIONS_SUBDIR};

/// Resolve the Codex home: explicit path, then `CODEX_HOME`, then `~/.codex`
pub(crate) fn resolve_codex_home(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(codex_home) = env::var(CODEX_HOME_ENV)
        && !codex_home.trim().is_empty()
    {
        return PathBuf::from(codex_home);
    }
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CODEX_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CODEX_DIR))
}

fn glob_sorted(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files: Vec<PathBuf> = match glob::glob(&format!("{escaped}/{pattern}")) {
        Ok(entries) => entries.flatten().filter(|p| p.is_file()).collect(),
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "invalid discovery pattern");
            Vec::new()
        }
    };
    files.sort();
    files
}

/// All candidate session logs: active sessions first, then archived, each
/// sorted lexicographically. Missing roots contribute nothing.
pub(crate) fn find_session_files(codex_home: &Path) -> Vec<PathBuf> {
    let mut files = glob_sorted(&codex_home.join(SESSIONS_SUBDIR), "**/rollout-*.jsonl");
    files.extend(glob_sorted(&codex_home.join(ARCHIVED_SUBDIR), "*.jsonl"));
    files
}
