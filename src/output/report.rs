use comfy_table::Cell;
use std::fmt::Write as _;

use crate::core::TokenUsage;
use crate::output::format::{
    create_styled_table, format_duration, format_number, format_percent, header_cell, right_cell,
};
use crate::output::snapshot::{QuotaWindowDoc, Snapshot};

fn write_window(out: &mut String, title: &str, window: &QuotaWindowDoc) {
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "  window:   {} min", window.window_minutes);
    let _ = writeln!(out, "  tokens:   {}", format_number(window.usage.total_tokens));
    let _ = writeln!(out, "  used:     {}", format_percent(window.used_percent));
    let _ = writeln!(
        out,
        "  reset in: {}",
        format_duration(window.resets_in_seconds)
    );
    if let Some(at) = &window.resets_at {
        let _ = writeln!(out, "  reset at: {at}");
    }
    out.push('\n');
}

fn usage_row(label: &str, usage: &TokenUsage, bold: bool) -> Vec<Cell> {
    let mut label_cell = Cell::new(label);
    if bold {
        label_cell = label_cell.add_attribute(comfy_table::Attribute::Bold);
    }
    vec![
        label_cell,
        right_cell(&format_number(usage.input_tokens), false),
        right_cell(&format_number(usage.cached_input_tokens), false),
        right_cell(&format_number(usage.output_tokens), false),
        right_cell(&format_number(usage.reasoning_output_tokens), false),
        right_cell(&format_number(usage.total_tokens), bold),
    ]
}

pub(crate) fn render_report(snapshot: &Snapshot, use_color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Codex CLI usage");
    let _ = writeln!(out, "  generated: {}", snapshot.generated_at);
    let _ = writeln!(
        out,
        "  sessions:  {} ({} files, {} events)",
        format_number(snapshot.sessions_count as i64),
        format_number(snapshot.files_scanned as i64),
        format_number(snapshot.events_count as i64)
    );
    if let Some(last) = &snapshot.last_activity_at {
        let _ = writeln!(out, "  last activity: {last}");
    }
    if let Some(id) = &snapshot.active_session.session_id {
        let _ = writeln!(out, "  active session: {id}");
    }
    out.push('\n');

    write_window(&mut out, "Session window", &snapshot.session_window);
    write_window(&mut out, "Weekly window", &snapshot.weekly_window);

    let mut table = create_styled_table();
    table.set_header(vec![
        header_cell("Window", use_color),
        header_cell("Input", use_color),
        header_cell("Cached", use_color),
        header_cell("Output", use_color),
        header_cell("Reasoning", use_color),
        header_cell("Total", use_color),
    ]);
    let windows = &snapshot.windows;
    table.add_row(usage_row("Last 5h", &windows.last_5h, false));
    table.add_row(usage_row("Last 24h", &windows.last_24h, false));
    table.add_row(usage_row("Last 7d", &windows.last_7d, false));
    table.add_row(usage_row("Last 30d", &windows.last_30d, false));
    table.add_row(usage_row("All time", &windows.all_time, true));

    let _ = writeln!(out, "Rolling totals");
    let _ = writeln!(out, "{table}");
    out
}

pub(crate) fn print_report(snapshot: &Snapshot, use_color: bool) {
    print!("{}", render_report(snapshot, use_color));
}
