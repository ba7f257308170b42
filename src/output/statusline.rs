use crate::output::format::{format_duration, format_number};
use crate::output::snapshot::{QuotaWindowDoc, Snapshot};

fn window_part(window: &QuotaWindowDoc) -> String {
    let tokens = format_number(window.usage.total_tokens);
    match window.used_percent {
        Some(percent) => format!("{percent:.1}% ({tokens})"),
        None => format!("{tokens} tok"),
    }
}

/// One line for tmux or shell prompts:
/// "Codex 5h 36.0% (12 345) | 7d 82.0% (1 234 567) | reset 1h 05m"
pub(crate) fn render_statusline(snapshot: &Snapshot) -> String {
    format!(
        "Codex 5h {} | 7d {} | reset {}",
        window_part(&snapshot.session_window),
        window_part(&snapshot.weekly_window),
        format_duration(snapshot.session_window.resets_in_seconds)
    )
}

pub(crate) fn print_statusline(snapshot: &Snapshot) {
    println!("{}", render_statusline(snapshot));
}
