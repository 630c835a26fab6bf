//! Event trait and the built-in event variants.
//!
//! An event pairs an activation predicate with an ordered command list.
//! The scheduler re-evaluates `is_active` every tick and hands active
//! events to the executor; the destroy variant is never active during the
//! run and is executed exactly once at shutdown.

use crate::errors::Fault;
use crate::script::command::Command;
use crate::script::context::ExecContext;
use crate::script::descriptor::{string_param, Parameters};

/// Activation logic for one event.
pub trait EventLogic: Send {
    /// Re-evaluated every tick; commands run only while this is true.
    fn is_active(&mut self, ctx: &mut ExecContext<'_>) -> bool;

    /// The reserved shutdown variant, run once after the main loop exits.
    fn is_destroy(&self) -> bool {
        false
    }

    /// Construction-time faults. A faulted event still occupies its slot.
    fn faults(&self) -> &[Fault] {
        &[]
    }
}

/// One loaded event: activation logic plus its command list. The command
/// list is append-only during loading and fixed afterwards.
pub struct Event {
    pub logic: Box<dyn EventLogic>,
    pub commands: Vec<Box<dyn Command>>,
}

impl Event {
    pub fn new(logic: Box<dyn EventLogic>) -> Self {
        Self {
            logic,
            commands: Vec::new(),
        }
    }

    pub fn add_command(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }
}

/// Active on the first tick of a run only.
#[derive(Default)]
pub struct InitEvent {
    fired: bool,
}

impl InitEvent {
    pub fn from_params(_params: &Parameters) -> Self {
        Self::default()
    }
}

impl EventLogic for InitEvent {
    fn is_active(&mut self, _ctx: &mut ExecContext<'_>) -> bool {
        let first = !self.fired;
        self.fired = true;
        first
    }
}

/// Active on every tick.
pub struct StepEvent;

impl StepEvent {
    pub fn from_params(_params: &Parameters) -> Self {
        Self
    }
}

impl EventLogic for StepEvent {
    fn is_active(&mut self, _ctx: &mut ExecContext<'_>) -> bool {
        true
    }
}

/// Active whenever its expression evaluates truthy.
pub struct ExpressionEvent {
    expression: String,
    faults: Vec<Fault>,
}

impl ExpressionEvent {
    pub fn from_params(params: &Parameters) -> Self {
        let mut faults = Vec::new();
        Self {
            expression: string_param(params, "expression", &mut faults),
            faults,
        }
    }
}

impl EventLogic for ExpressionEvent {
    fn is_active(&mut self, ctx: &mut ExecContext<'_>) -> bool {
        ctx.evaluate(&self.expression).truthy()
    }

    fn faults(&self) -> &[Fault] {
        &self.faults
    }
}

/// Shutdown hook: never active during the run, executed once with
/// cancellation suppressed so cleanup commands get to finish.
pub struct DestroyEvent;

impl DestroyEvent {
    pub fn from_params(_params: &Parameters) -> Self {
        Self
    }
}

impl EventLogic for DestroyEvent {
    fn is_active(&mut self, _ctx: &mut ExecContext<'_>) -> bool {
        false
    }

    fn is_destroy(&self) -> bool {
        true
    }
}
