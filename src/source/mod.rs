//! Codex session logs on disk
//!
//! Discovery finds the logs, the parser turns each one into a
//! `ParsedSession`, and the loader runs both for a whole Codex home.

pub(crate) mod discovery;
pub(crate) mod loader;
pub(crate) mod parser;

pub(crate) use discovery::resolve_codex_home;
pub(crate) use loader::load_sessions;
