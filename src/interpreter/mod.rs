//! Script interpreter core.
//!
//! This module owns the run lifecycle (a single cancellable worker per
//! run, modeled as an explicit state machine), the script loader, the
//! fixed-rate scheduler, the block-skip executor, and the sandboxed
//! variable store. The controller side talks to hardware only at the
//! start/stop seams; everything else happens on the worker thread.

pub mod executor;
pub mod scheduler;
pub mod variables;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::Settings;
use crate::errors::{record_fault, ExprError, Fault, LifecycleError, LoadReport, ScriptFileError};
use crate::hardware::{RobotHandle, VisionHandle};
use crate::script::descriptor::EventDescriptor;
use crate::script::event::Event;
use crate::script::registry::VariantRegistry;

pub use executor::{run_event, skip_scan, RunStatus};
pub use variables::{Eval, VariableStore};

use scheduler::{run_worker, WorkerShared};

/// Where the run lifecycle currently stands. `Stuck` is terminal for the
/// run: the worker missed its stop deadline and stays attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Stuck,
}

struct Worker {
    handle: JoinHandle<()>,
    // Receives nothing; the paired sender is dropped when the worker
    // returns, which is what stop()'s bounded wait observes.
    done: mpsc::Receiver<()>,
}

pub struct Interpreter {
    exiting: Arc<AtomicBool>,
    events: Arc<Mutex<Vec<Event>>>,
    // Bumped on every load; lets the worker tell a stale taken list from
    // the current script when it hands the list back after a tick.
    generation: Arc<AtomicU64>,
    variables: Arc<Mutex<VariableStore>>,
    status: Arc<Mutex<RunStatus>>,
    worker: Option<Worker>,
    state: RunState,
    settings: Settings,
}

impl Interpreter {
    pub fn new(settings: Settings) -> Self {
        Self {
            exiting: Arc::new(AtomicBool::new(true)),
            events: Arc::new(Mutex::new(Vec::new())),
            generation: Arc::new(AtomicU64::new(0)),
            variables: Arc::new(Mutex::new(VariableStore::new())),
            status: Arc::new(Mutex::new(RunStatus::new())),
            worker: None,
            state: RunState::Stopped,
            settings,
        }
    }

    // ---- loading ----------------------------------------------------

    /// Instantiate every event and command in `script` through the
    /// registry and populate the event list with them, in order. The
    /// list is populated fresh: whatever a previous load left behind is
    /// dropped first. Trouble never aborts the load: unknown tags fail
    /// closed into the report and construction faults are aggregated
    /// per kind with the offending tag.
    pub fn load_script(
        &mut self,
        script: &[EventDescriptor],
        registry: &VariantRegistry,
    ) -> LoadReport {
        let mut report = LoadReport::new();
        let mut loaded = Vec::new();

        for descriptor in script {
            let Some(factory) = registry.event_factory(&descriptor.type_tag) else {
                record_fault(&mut report, Fault::UnknownEventTag, &descriptor.type_tag);
                continue;
            };

            let logic = factory(&descriptor.parameters);
            for fault in logic.faults() {
                record_fault(&mut report, *fault, &descriptor.type_tag);
            }
            let mut event = Event::new(logic);

            for command_descriptor in &descriptor.command_list {
                let Some(factory) = registry.command_factory(&command_descriptor.type_tag) else {
                    record_fault(
                        &mut report,
                        Fault::UnknownCommandTag,
                        &command_descriptor.type_tag,
                    );
                    continue;
                };
                let command = factory(&command_descriptor.parameters);
                for fault in command.faults() {
                    record_fault(&mut report, *fault, &command_descriptor.type_tag);
                }
                event.add_command(command);
            }

            loaded.push(event);
        }

        if report.is_empty() {
            info!(target: "loader", "loaded {} events cleanly", script.len());
        } else {
            warn!(target: "loader", "loaded with faults: {report:?}");
        }

        // Replace the list and bump the generation under one guard, so a
        // worker mid-tick knows the list it took out is stale.
        let mut slot = lock(&self.events);
        *slot = loaded;
        self.generation.fetch_add(1, Ordering::SeqCst);
        report
    }

    /// Read a `.task` JSON file and load it. I/O and parse failures are
    /// real errors; per-variant trouble comes back in the report.
    pub fn load_script_file(
        &mut self,
        path: &std::path::Path,
        registry: &VariantRegistry,
    ) -> Result<LoadReport, ScriptFileError> {
        let content = std::fs::read_to_string(path)?;
        let script: Vec<EventDescriptor> = serde_json::from_str(&content)?;
        Ok(self.load_script(&script, registry))
    }

    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    // ---- lifecycle --------------------------------------------------

    /// Spawn the worker and begin executing the loaded events. Rejected
    /// while a worker is attached; a second worker is never spawned.
    pub fn start(
        &mut self,
        robot: Arc<dyn RobotHandle>,
        vision: Arc<dyn VisionHandle>,
    ) -> Result<(), LifecycleError> {
        if self.worker.is_some() {
            warn!(target: "interpreter", "start requested but a worker is already running");
            return Err(LifecycleError::AlreadyRunning);
        }

        self.state = RunState::Starting;

        // Make sure the collaborators are not still in exiting mode from
        // an earlier run, and put the arm in a known state.
        vision.set_exiting(false);
        robot.set_exiting(false);
        robot.set_active_servos(true);
        robot.set_speed(self.settings.default_speed);

        lock(&self.status).clear();
        lock(&self.variables).bind_handles(Arc::clone(&robot), Arc::clone(&vision));
        self.exiting.store(false, Ordering::SeqCst);

        let shared = WorkerShared {
            exiting: Arc::clone(&self.exiting),
            events: Arc::clone(&self.events),
            generation: Arc::clone(&self.generation),
            variables: Arc::clone(&self.variables),
            status: Arc::clone(&self.status),
            robot,
            vision,
            fps: self.settings.script_fps,
        };

        let (done_tx, done_rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("armscript-worker".to_string())
            .spawn(move || {
                let _done = done_tx;
                run_worker(shared);
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.exiting.store(true, Ordering::SeqCst);
                self.state = RunState::Stopped;
                return Err(err.into());
            }
        };

        self.worker = Some(Worker {
            handle,
            done: done_rx,
        });
        self.state = RunState::Running;
        Ok(())
    }

    /// Signal cancellation, join the worker within the configured bound,
    /// and reset run state. On a clean stop the event list is dropped
    /// and the variable store returns to its default bindings. If the
    /// worker misses the deadline it stays attached, the state parks in
    /// `Stuck`, and the caller must not assume the stop took effect.
    pub fn stop(
        &mut self,
        robot: Arc<dyn RobotHandle>,
        vision: Arc<dyn VisionHandle>,
    ) -> Result<(), LifecycleError> {
        info!(target: "interpreter", "stopping program thread");
        self.exiting.store(true, Ordering::SeqCst);

        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.state = RunState::Stopping;

        // Unblock any hardware/vision call a command is mid-executing.
        vision.set_exiting(true);
        robot.set_exiting(true);

        let timeout = Duration::from_millis(self.settings.stop_timeout_ms);
        match worker.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(target: "interpreter", "worker was told to close but did not");
                self.worker = Some(worker);
                self.state = RunState::Stuck;
                return Err(LifecycleError::WorkerStuck(timeout));
            }
        }

        // Re-activate the collaborators for future runs.
        vision.set_exiting(false);
        robot.set_exiting(false);
        vision.end_all_trackers();

        lock(&self.events).clear();
        lock(&self.variables).reset();
        self.state = RunState::Stopped;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.exiting.load(Ordering::SeqCst) || self.worker.is_some()
    }

    /// Long-running commands poll this to decide whether to bail out
    /// early.
    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    /// Snapshot of what ran this tick, or `None` while not running.
    /// Best-effort: a read may observe a tick mid-build.
    pub fn status(&self) -> Option<RunStatus> {
        if self.is_exiting() {
            return None;
        }
        Some(lock(&self.status).clone())
    }

    // ---- variables --------------------------------------------------

    pub fn set_variable(&self, name: &str, expression: &str) {
        lock(&self.variables).set(name, expression);
    }

    pub fn get_variable(&self, name: &str) -> (f64, bool) {
        lock(&self.variables).get(name)
    }

    pub fn evaluate_expression(&self, expression: &str) -> Eval {
        lock(&self.variables).evaluate(expression)
    }

    pub fn run_script(&self, text: &str) -> Result<(), ExprError> {
        lock(&self.variables).run_script(text)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
