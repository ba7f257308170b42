mod format;
mod report;
mod snapshot;
mod statusline;

pub(crate) use report::print_report;
pub(crate) use snapshot::{Snapshot, SnapshotContext, write_snapshot};
pub(crate) use statusline::print_statusline;
