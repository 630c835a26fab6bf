//! Command trait and the built-in command variants.
//!
//! A command is one executable step inside an event. Its outcome steers
//! the event's control flow: `Continue` falls through, `Skip` jumps over
//! the guarded block that follows, `Exit` abandons the event for this
//! tick. Block structure is not a parsed tree; it is a flat list with
//! `StartBlock`/`EndBlock`/`Else` sentinel commands the executor scans at
//! run time.

use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::errors::Fault;
use crate::script::context::ExecContext;
use crate::script::descriptor::{string_param, Parameters};

/// Outcome of running one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Skip,
    Exit,
}

/// Structural role a command plays in the skip engine. Everything that
/// is not a sentinel is `Plain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Plain,
    StartBlock,
    EndBlock,
    Else,
}

pub trait Command: Send {
    fn run(&mut self, ctx: &mut ExecContext<'_>) -> Flow;

    fn role(&self) -> Role {
        Role::Plain
    }

    /// Construction-time faults. A faulted command still occupies its
    /// slot in the command list.
    fn faults(&self) -> &[Fault] {
        &[]
    }
}

/// Assigns the value of an expression to a named variable.
pub struct SetVariableCommand {
    variable: String,
    expression: String,
    faults: Vec<Fault>,
}

impl SetVariableCommand {
    pub fn from_params(params: &Parameters) -> Self {
        let mut faults = Vec::new();
        Self {
            variable: string_param(params, "variable", &mut faults),
            expression: string_param(params, "expression", &mut faults),
            faults,
        }
    }
}

impl Command for SetVariableCommand {
    fn run(&mut self, ctx: &mut ExecContext<'_>) -> Flow {
        ctx.set_variable(&self.variable, &self.expression);
        Flow::Continue
    }

    fn faults(&self) -> &[Fault] {
        &self.faults
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Equal,
    NotEqual,
    Less,
    Greater,
}

impl Comparison {
    fn parse(text: &str) -> Option<Self> {
        match text {
            "==" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            "<" => Some(Self::Less),
            ">" => Some(Self::Greater),
            _ => None,
        }
    }

    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Self::Equal => left == right,
            Self::NotEqual => left != right,
            Self::Less => left < right,
            Self::Greater => left > right,
        }
    }
}

/// Conditional: compares a variable against an expression. When the
/// comparison holds the guarded block that follows runs; otherwise it is
/// skipped. A faulted or unevaluable condition counts as false.
pub struct TestVariableCommand {
    variable: String,
    comparison: Option<Comparison>,
    expression: String,
    faults: Vec<Fault>,
}

impl TestVariableCommand {
    pub fn from_params(params: &Parameters) -> Self {
        let mut faults = Vec::new();
        let variable = string_param(params, "variable", &mut faults);
        let expression = string_param(params, "expression", &mut faults);
        let test = string_param(params, "test", &mut faults);
        let comparison = Comparison::parse(&test);
        if comparison.is_none() && !test.is_empty() {
            faults.push(Fault::InvalidParameter);
        }
        Self {
            variable,
            comparison,
            expression,
            faults,
        }
    }
}

impl Command for TestVariableCommand {
    fn run(&mut self, ctx: &mut ExecContext<'_>) -> Flow {
        let Some(comparison) = self.comparison else {
            return Flow::Skip;
        };
        let (left, found) = ctx.get_variable(&self.variable);
        if !found {
            return Flow::Skip;
        }
        match ctx.evaluate(&self.expression).legacy() {
            (Some(right), true) if comparison.holds(left, right) => Flow::Continue,
            _ => Flow::Skip,
        }
    }

    fn faults(&self) -> &[Fault] {
        &self.faults
    }
}

/// Conditional on a bare expression: truthy runs the guarded block.
pub struct TestExpressionCommand {
    expression: String,
    faults: Vec<Fault>,
}

impl TestExpressionCommand {
    pub fn from_params(params: &Parameters) -> Self {
        let mut faults = Vec::new();
        Self {
            expression: string_param(params, "expression", &mut faults),
            faults,
        }
    }
}

impl Command for TestExpressionCommand {
    fn run(&mut self, ctx: &mut ExecContext<'_>) -> Flow {
        if ctx.evaluate(&self.expression).truthy() {
            Flow::Continue
        } else {
            Flow::Skip
        }
    }

    fn faults(&self) -> &[Fault] {
        &self.faults
    }
}

/// Opens the block guarded by the preceding conditional.
pub struct StartBlockCommand;

impl StartBlockCommand {
    pub fn from_params(_params: &Parameters) -> Self {
        Self
    }
}

impl Command for StartBlockCommand {
    fn run(&mut self, _ctx: &mut ExecContext<'_>) -> Flow {
        Flow::Continue
    }

    fn role(&self) -> Role {
        Role::StartBlock
    }
}

/// Closes the innermost open block.
pub struct EndBlockCommand;

impl EndBlockCommand {
    pub fn from_params(_params: &Parameters) -> Self {
        Self
    }
}

impl Command for EndBlockCommand {
    fn run(&mut self, _ctx: &mut ExecContext<'_>) -> Flow {
        Flow::Continue
    }

    fn role(&self) -> Role {
        Role::EndBlock
    }
}

/// Marks the alternate branch after a conditional's guarded block.
pub struct ElseCommand;

impl ElseCommand {
    pub fn from_params(_params: &Parameters) -> Self {
        Self
    }
}

impl Command for ElseCommand {
    fn run(&mut self, _ctx: &mut ExecContext<'_>) -> Flow {
        Flow::Continue
    }

    fn role(&self) -> Role {
        Role::Else
    }
}

/// Stops the containing event for the current tick.
pub struct EndEventCommand;

impl EndEventCommand {
    pub fn from_params(_params: &Parameters) -> Self {
        Self
    }
}

impl Command for EndEventCommand {
    fn run(&mut self, _ctx: &mut ExecContext<'_>) -> Flow {
        Flow::Exit
    }
}

/// Requests the whole run to wind down, then exits the event.
pub struct EndProgramCommand;

impl EndProgramCommand {
    pub fn from_params(_params: &Parameters) -> Self {
        Self
    }
}

impl Command for EndProgramCommand {
    fn run(&mut self, ctx: &mut ExecContext<'_>) -> Flow {
        ctx.request_exit();
        Flow::Exit
    }
}

const WAIT_SLICE: Duration = Duration::from_millis(20);

/// Sleeps for an evaluated number of seconds, polling the exit flag so a
/// stop request interrupts the wait promptly.
pub struct WaitCommand {
    expression: String,
    faults: Vec<Fault>,
}

impl WaitCommand {
    pub fn from_params(params: &Parameters) -> Self {
        let mut faults = Vec::new();
        Self {
            expression: string_param(params, "expression", &mut faults),
            faults,
        }
    }
}

impl Command for WaitCommand {
    fn run(&mut self, ctx: &mut ExecContext<'_>) -> Flow {
        let (value, ok) = ctx.evaluate(&self.expression).legacy();
        let seconds = match value {
            Some(seconds) if ok && seconds.is_finite() && seconds > 0.0 => seconds,
            _ => {
                warn!(target: "interpreter", "wait skipped, expression {:?} did not yield a duration", self.expression);
                return Flow::Continue;
            }
        };

        let deadline = Instant::now() + Duration::from_secs_f64(seconds);
        loop {
            if ctx.is_exiting() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(WAIT_SLICE));
        }
        Flow::Continue
    }

    fn faults(&self) -> &[Fault] {
        &self.faults
    }
}

/// Applies an evaluated actuation speed to the robot.
pub struct SetSpeedCommand {
    expression: String,
    faults: Vec<Fault>,
}

impl SetSpeedCommand {
    pub fn from_params(params: &Parameters) -> Self {
        let mut faults = Vec::new();
        Self {
            expression: string_param(params, "expression", &mut faults),
            faults,
        }
    }
}

impl Command for SetSpeedCommand {
    fn run(&mut self, ctx: &mut ExecContext<'_>) -> Flow {
        match ctx.evaluate(&self.expression).legacy() {
            (Some(speed), true) => ctx.robot().set_speed(speed),
            _ => {
                warn!(target: "interpreter", "set_speed skipped, expression {:?} did not yield a number", self.expression)
            }
        }
        Flow::Continue
    }

    fn faults(&self) -> &[Fault] {
        &self.faults
    }
}

/// Runs multi-statement sandboxed text for its side effects.
pub struct RunScriptCommand {
    script: String,
    faults: Vec<Fault>,
}

impl RunScriptCommand {
    pub fn from_params(params: &Parameters) -> Self {
        let mut faults = Vec::new();
        Self {
            script: string_param(params, "script", &mut faults),
            faults,
        }
    }
}

impl Command for RunScriptCommand {
    fn run(&mut self, ctx: &mut ExecContext<'_>) -> Flow {
        if let Err(err) = ctx.run_script(&self.script) {
            warn!(target: "sandbox", "run_script command failed: {err}");
        }
        Flow::Continue
    }

    fn faults(&self) -> &[Fault] {
        &self.faults
    }
}
