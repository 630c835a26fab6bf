//! Block-skip command executor.
//!
//! Runs one event's command list for one tick. Conditional structure is
//! a flat sentinel-delimited list, not a parsed tree: when a command
//! reports `Skip`, the cursor jumps past the guarded block by scanning
//! forward over the sentinels; when a guarded branch ran and an `Else`
//! follows, the alternate branch is bypassed the same way. The scan is
//! linear per skip, which is fine for the short command lists scripts
//! carry.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::script::command::{Flow, Role};
use crate::script::context::ExecContext;
use crate::script::event::Event;

/// Per-tick record of which command indices ran, keyed by event index.
/// Rebuilt every tick; advisory only.
pub type RunStatus = HashMap<usize, Vec<usize>>;

/// Find where the cursor lands after skipping the one guarded block that
/// follows `from`.
///
/// Scans forward from `from + 1`, incrementing depth at each StartBlock
/// and decrementing at each EndBlock, and returns the index immediately
/// preceding the first position where depth comes back to zero. When the
/// command right after `from` is not a StartBlock (a flat guarded
/// statement), that position itself satisfies depth == 0 and the scan
/// returns `from`, so the caller's one-position advance does the right
/// thing. Malformed nesting that runs off the end terminates at the last
/// valid index.
pub fn skip_scan(roles: &[Role], from: usize) -> usize {
    let mut depth: u32 = 0;
    for i in (from + 1)..roles.len() {
        if roles[i] == Role::StartBlock {
            depth += 1;
        }
        if depth == 0 {
            return i - 1;
        }
        if i == roles.len() - 1 {
            return i;
        }
        if roles[i] == Role::EndBlock {
            depth -= 1;
        }
    }
    from
}

/// Run one event's command list for this tick.
///
/// `suppress_cancel` is set only for the destroy-event pass, so cleanup
/// commands run to completion even while the run is winding down.
pub fn run_event(
    event_index: usize,
    event: &mut Event,
    ctx: &mut ExecContext<'_>,
    status: &Mutex<RunStatus>,
    suppress_cancel: bool,
) {
    let roles: Vec<Role> = event.commands.iter().map(|c| c.role()).collect();
    let mut cursor = 0usize;

    record(status, |s| {
        s.insert(event_index, Vec::new());
    });

    while cursor < event.commands.len() {
        if ctx.is_exiting() && !suppress_cancel {
            break;
        }

        record(status, |s| {
            if let Some(ran) = s.get_mut(&event_index) {
                ran.push(cursor);
            }
        });

        match event.commands[cursor].run(ctx) {
            Flow::Exit => break,
            Flow::Skip => {
                cursor = skip_scan(&roles, cursor) + 1;
            }
            Flow::Continue => {
                if roles.get(cursor + 1) == Some(&Role::Else) {
                    cursor = skip_scan(&roles, cursor + 1) + 1;
                } else {
                    cursor += 1;
                }
            }
        }
    }
}

fn record(status: &Mutex<RunStatus>, f: impl FnOnce(&mut RunStatus)) {
    let mut guard = status.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard);
}
