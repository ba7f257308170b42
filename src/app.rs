use chrono::Utc;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{error, info};

use crate::cli::{Cli, Commands, parse_command};
use crate::config::Config;
use crate::consts::{SNAPSHOT_FILE, TOP_SESSIONS_LIMIT, TRACKER_SUBDIR};
use crate::core::{AggregationSettings, aggregate};
use crate::error::AppError;
use crate::output::{Snapshot, SnapshotContext, print_report, print_statusline, write_snapshot};
use crate::source::{load_sessions, resolve_codex_home};
use crate::utils::Timezone;

/// Everything a run needs that stays fixed between refreshes
pub(crate) struct CommandContext {
    pub(crate) codex_home: PathBuf,
    pub(crate) config_path: PathBuf,
    pub(crate) settings: AggregationSettings,
    pub(crate) use_color: bool,
}

impl CommandContext {
    /// Resolve the Codex home, config and timezone for this invocation
    pub(crate) fn from_cli(cli: Cli) -> Result<(Self, Commands), AppError> {
        let codex_home = resolve_codex_home(cli.codex_home.as_deref());
        let loaded = Config::load(cli.config.as_deref(), &codex_home);
        let mut cli = cli.with_config(&loaded.config);
        let timezone = Timezone::parse(cli.timezone.as_deref())?;
        let config = &loaded.config;

        let ctx = CommandContext {
            settings: AggregationSettings {
                session_window_minutes: config.session_window_minutes(),
                week_window_minutes: config.week_window_minutes(),
                session_limit_tokens: config.session_limit_tokens,
                week_limit_tokens: config.week_limit_tokens,
                top_sessions: TOP_SESSIONS_LIMIT,
                timezone,
            },
            use_color: cli.use_color(),
            codex_home,
            config_path: loaded.path,
        };
        Ok((ctx, parse_command(cli.command.take())))
    }

    /// One full discovery → parse → aggregate → assemble pass
    pub(crate) fn build_snapshot(&self) -> Snapshot {
        let now = Utc::now();
        let loaded = load_sessions(&self.codex_home, now);
        let summary = aggregate(&loaded.sessions, &self.settings, now);
        Snapshot::assemble(
            &summary,
            &SnapshotContext {
                generated_at: now,
                codex_home: &self.codex_home,
                config_path: &self.config_path,
                settings: &self.settings,
                files_scanned: loaded.files_scanned,
                sessions_count: loaded.sessions.len(),
            },
        )
    }

    fn default_snapshot_path(&self) -> PathBuf {
        self.codex_home.join(TRACKER_SUBDIR).join(SNAPSHOT_FILE)
    }
}

fn handle_report(ctx: &CommandContext, snapshot_output: Option<&Path>) -> Result<(), AppError> {
    let snapshot = ctx.build_snapshot();
    if let Some(path) = snapshot_output {
        write_snapshot(&snapshot, path)?;
    }
    print_report(&snapshot, ctx.use_color);
    Ok(())
}

fn handle_snapshot(
    ctx: &CommandContext,
    output: Option<PathBuf>,
    quiet: bool,
    stdout: bool,
) -> Result<(), AppError> {
    let snapshot = ctx.build_snapshot();
    if stdout {
        println!("{}", snapshot.to_json()?);
        return Ok(());
    }
    let path = output.unwrap_or_else(|| ctx.default_snapshot_path());
    write_snapshot(&snapshot, &path)?;
    if !quiet {
        println!("Snapshot written: {}", path.display());
    }
    Ok(())
}

/// Rebuild and rewrite the snapshot every `interval` seconds. A failed
/// refresh is logged and the loop carries on.
fn handle_watch(
    ctx: &CommandContext,
    interval: u64,
    output: Option<PathBuf>,
    runs: Option<u64>,
) -> Result<(), AppError> {
    let path = output.unwrap_or_else(|| ctx.default_snapshot_path());
    info!(path = %path.display(), interval, "watching Codex usage");

    let mut completed = 0u64;
    loop {
        let snapshot = ctx.build_snapshot();
        match write_snapshot(&snapshot, &path) {
            Ok(()) => info!(
                events = snapshot.events_count,
                generated_at = %snapshot.generated_at,
                "snapshot refreshed"
            ),
            Err(e) => error!("{e}"),
        }

        completed += 1;
        if runs.is_some_and(|runs| completed >= runs) {
            return Ok(());
        }
        thread::sleep(Duration::from_secs(interval));
    }
}

pub(crate) fn run(cli: Cli) -> Result<(), AppError> {
    let (ctx, command) = CommandContext::from_cli(cli)?;
    match command {
        Commands::Report { snapshot_output } => handle_report(&ctx, snapshot_output.as_deref()),
        Commands::Snapshot {
            output,
            quiet,
            stdout,
        } => handle_snapshot(&ctx, output, quiet, stdout),
        Commands::Statusline => {
            print_statusline(&ctx.build_snapshot());
            Ok(())
        }
        Commands::Watch {
            interval,
            output,
            runs,
        } => handle_watch(&ctx, interval, output, runs),
    }
}
