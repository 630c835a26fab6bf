use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// Per-variant trouble found while loading a script.
///
/// Faults never abort a load; they are aggregated into a [`LoadReport`]
/// keyed by kind, with the offending type tags listed under each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Fault {
    #[error("no event variant is registered for this tag")]
    UnknownEventTag,
    #[error("no command variant is registered for this tag")]
    UnknownCommandTag,
    #[error("a required parameter is missing")]
    MissingParameter,
    #[error("a parameter has the wrong type or value")]
    InvalidParameter,
}

/// Aggregated load-time faults: fault kind -> offending type tags.
pub type LoadReport = HashMap<Fault, Vec<String>>;

/// Append a tag to the report under the given fault kind.
pub fn record_fault(report: &mut LoadReport, fault: Fault, tag: &str) {
    report.entry(fault).or_default().push(tag.to_string());
}

/// Start/stop protocol failures. None of these tear down hardware
/// sessions; the caller owns user-facing messaging.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("the interpreter is already running")]
    AlreadyRunning,
    #[error("the worker thread did not stop within {0:?}")]
    WorkerStuck(Duration),
    #[error("failed to spawn the worker thread")]
    Spawn(#[from] std::io::Error),
}

/// A sandboxed script failed to parse or run.
#[derive(Debug, Error)]
#[error("script failed to run: {0}")]
pub struct ExprError(pub String);

/// Errors reading a serialized script from disk. Unlike per-variant
/// faults these abort the load, since there is no script to walk.
#[derive(Debug, Error)]
pub enum ScriptFileError {
    #[error("failed to read script file: {0}")]
    Io(#[from] std::io::Error),
    #[error("script file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
