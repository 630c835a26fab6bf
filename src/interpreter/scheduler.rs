//! Fixed-rate worker loop.
//!
//! Exactly one worker thread runs this body per interpreter run. The
//! tick gate paces the loop to the configured rate without busy-waiting,
//! sleeping in short slices so the exit flag is observed promptly. Each
//! eligible tick walks the events in load order, skipping inactive ones
//! and stopping the tick early once the run is cancelled. After the main
//! loop exits, the reserved destroy event (if the script declares one)
//! runs exactly once with cancellation suppressed.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, trace};

use crate::hardware::{RobotHandle, VisionHandle};
use crate::interpreter::executor::{run_event, RunStatus};
use crate::interpreter::variables::VariableStore;
use crate::script::context::ExecContext;
use crate::script::event::Event;

const WAIT_SLICE: Duration = Duration::from_millis(5);

/// Paces a loop to a fixed tick rate. `wait` sleeps at most one short
/// slice and reports whether the tick boundary has arrived, so the
/// caller keeps polling its own exit condition between slices.
pub struct TickGate {
    period: Duration,
    next: Instant,
}

impl TickGate {
    pub fn new(fps: u32) -> Self {
        let period = Duration::from_secs(1) / fps.max(1);
        Self {
            period,
            next: Instant::now(),
        }
    }

    pub fn wait(&mut self) -> bool {
        let now = Instant::now();
        if now < self.next {
            thread::sleep((self.next - now).min(WAIT_SLICE));
            return false;
        }
        self.next += self.period;
        if self.next < now {
            // Fell behind (a command blocked for a while); restart the
            // cadence from here rather than bursting to catch up.
            self.next = now + self.period;
        }
        true
    }
}

/// Everything the worker thread needs, cloned out of the interpreter at
/// start time.
pub(crate) struct WorkerShared {
    pub exiting: Arc<AtomicBool>,
    pub events: Arc<Mutex<Vec<Event>>>,
    pub generation: Arc<AtomicU64>,
    pub variables: Arc<Mutex<VariableStore>>,
    pub status: Arc<Mutex<RunStatus>>,
    pub robot: Arc<dyn RobotHandle>,
    pub vision: Arc<dyn VisionHandle>,
    pub fps: u32,
}

pub(crate) fn run_worker(shared: WorkerShared) {
    info!(target: "interpreter", "worker started at {} Hz", shared.fps);

    let mut gate = TickGate::new(shared.fps);

    while !shared.exiting.load(Ordering::SeqCst) {
        if !gate.wait() {
            continue;
        }

        lock(&shared.status).clear();

        // The list is taken out of its slot for the duration of the
        // tick, so controller-side loads and reads never queue behind a
        // blocking command.
        let (mut events, generation) = take_events(&shared);
        trace!(target: "interpreter", "tick over {} events", events.len());

        for (index, event) in events.iter_mut().enumerate() {
            if shared.exiting.load(Ordering::SeqCst) {
                break;
            }

            let mut ctx = ExecContext::new(
                &shared.robot,
                &shared.vision,
                &shared.variables,
                &shared.exiting,
            );
            if !event.logic.is_active(&mut ctx) {
                continue;
            }
            run_event(index, event, &mut ctx, &shared.status, false);
        }

        restore_events(&shared, events, generation);
    }

    // Shutdown pass: the destroy event runs even though exiting is set.
    let (mut events, generation) = take_events(&shared);
    if let Some((index, event)) = events
        .iter_mut()
        .enumerate()
        .find(|(_, event)| event.logic.is_destroy())
    {
        info!(target: "interpreter", "running destroy event");
        let mut ctx = ExecContext::new(
            &shared.robot,
            &shared.vision,
            &shared.variables,
            &shared.exiting,
        );
        run_event(index, event, &mut ctx, &shared.status, true);
    }
    restore_events(&shared, events, generation);

    info!(target: "interpreter", "worker stopped");
}

fn take_events(shared: &WorkerShared) -> (Vec<Event>, u64) {
    let mut slot = lock(&shared.events);
    let generation = shared.generation.load(Ordering::SeqCst);
    (std::mem::take(&mut *slot), generation)
}

/// Put the list back unless a load replaced it while it was out; a load
/// bumps the generation, which marks the taken list stale.
fn restore_events(shared: &WorkerShared, events: Vec<Event>, generation: u64) {
    let mut slot = lock(&shared.events);
    if shared.generation.load(Ordering::SeqCst) == generation {
        *slot = events;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
