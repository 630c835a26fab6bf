// Tests for the block-skip executor: conditional skipping, else
// suppression, exit semantics, and the destroy-pass cancellation
// override, driven through scripted command doubles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use armscript::hardware::{OfflineRobot, OfflineVision, RobotHandle, VisionHandle};
use armscript::interpreter::executor::{run_event, RunStatus};
use armscript::interpreter::VariableStore;
use armscript::script::command::{
    Command, ElseCommand, EndBlockCommand, Flow, Role, StartBlockCommand,
};
use armscript::script::event::{Event, StepEvent};
use armscript::script::ExecContext;

/// Command double that always reports a fixed outcome.
struct Probe {
    flow: Flow,
}

impl Probe {
    fn returning(flow: Flow) -> Box<dyn Command> {
        Box::new(Probe { flow })
    }
}

impl Command for Probe {
    fn run(&mut self, _ctx: &mut ExecContext<'_>) -> Flow {
        self.flow
    }
}

struct Fixture {
    robot: Arc<dyn RobotHandle>,
    vision: Arc<dyn VisionHandle>,
    variables: Mutex<VariableStore>,
    exiting: AtomicBool,
    status: Mutex<RunStatus>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            robot: Arc::new(OfflineRobot::default()),
            vision: Arc::new(OfflineVision::default()),
            variables: Mutex::new(VariableStore::new()),
            exiting: AtomicBool::new(false),
            status: Mutex::new(RunStatus::new()),
        }
    }

    fn run(&self, event: &mut Event, suppress_cancel: bool) -> Vec<usize> {
        let mut ctx = ExecContext::new(&self.robot, &self.vision, &self.variables, &self.exiting);
        run_event(0, event, &mut ctx, &self.status, suppress_cancel);
        self.status.lock().unwrap()[&0].clone()
    }
}

fn event_of(commands: Vec<Box<dyn Command>>) -> Event {
    let mut event = Event::new(Box::new(StepEvent));
    for command in commands {
        event.add_command(command);
    }
    event
}

#[test]
fn false_conditional_without_block_advances_one() {
    // [If(false), A, B]: with no block to skip over, the skip is a
    // plain one-position advance, so A still runs and so does B.
    let fixture = Fixture::new();
    let mut event = event_of(vec![
        Probe::returning(Flow::Skip),
        Probe::returning(Flow::Continue),
        Probe::returning(Flow::Continue),
    ]);
    let ran = fixture.run(&mut event, false);
    assert_eq!(ran, vec![0, 1, 2]);
}

#[test]
fn false_conditional_skips_its_block() {
    // [If(false), SB, A, B, EB, C]: the cursor lands on C.
    let fixture = Fixture::new();
    let mut event = event_of(vec![
        Probe::returning(Flow::Skip),
        Box::new(StartBlockCommand),
        Probe::returning(Flow::Continue),
        Probe::returning(Flow::Continue),
        Box::new(EndBlockCommand),
        Probe::returning(Flow::Continue),
    ]);
    let ran = fixture.run(&mut event, false);
    assert_eq!(ran, vec![0, 5]);
}

#[test]
fn true_conditional_runs_block_and_suppresses_else() {
    // [If(true), SB, X, EB, Else, SB, Y, EB, Z]: X runs, Y never does,
    // Z runs.
    let fixture = Fixture::new();
    let mut event = event_of(vec![
        Probe::returning(Flow::Continue), // 0: If(true)
        Box::new(StartBlockCommand),      // 1
        Probe::returning(Flow::Continue), // 2: X
        Box::new(EndBlockCommand),        // 3
        Box::new(ElseCommand),            // 4
        Box::new(StartBlockCommand),      // 5
        Probe::returning(Flow::Continue), // 6: Y
        Box::new(EndBlockCommand),        // 7
        Probe::returning(Flow::Continue), // 8: Z
    ]);
    let ran = fixture.run(&mut event, false);
    assert_eq!(ran, vec![0, 1, 2, 3, 8]);
}

#[test]
fn false_conditional_takes_else_branch() {
    // Same layout with If(false): X is skipped, Y and Z run.
    let fixture = Fixture::new();
    let mut event = event_of(vec![
        Probe::returning(Flow::Skip),     // 0: If(false)
        Box::new(StartBlockCommand),      // 1
        Probe::returning(Flow::Continue), // 2: X
        Box::new(EndBlockCommand),        // 3
        Box::new(ElseCommand),            // 4
        Box::new(StartBlockCommand),      // 5
        Probe::returning(Flow::Continue), // 6: Y
        Box::new(EndBlockCommand),        // 7
        Probe::returning(Flow::Continue), // 8: Z
    ]);
    let ran = fixture.run(&mut event, false);
    assert_eq!(ran, vec![0, 4, 5, 6, 7, 8]);
}

#[test]
fn exit_halts_the_event_for_this_tick() {
    let fixture = Fixture::new();
    let mut event = event_of(vec![
        Probe::returning(Flow::Continue),
        Probe::returning(Flow::Exit),
        Probe::returning(Flow::Continue),
    ]);
    let ran = fixture.run(&mut event, false);
    assert_eq!(ran, vec![0, 1]);

    // The next tick starts over from the event's first command.
    let ran = fixture.run(&mut event, false);
    assert_eq!(ran, vec![0, 1]);
}

#[test]
fn exit_inside_a_nested_block_halts_too() {
    let fixture = Fixture::new();
    let mut event = event_of(vec![
        Probe::returning(Flow::Continue), // 0
        Box::new(StartBlockCommand),      // 1
        Probe::returning(Flow::Exit),     // 2
        Box::new(EndBlockCommand),        // 3
        Probe::returning(Flow::Continue), // 4
    ]);
    let ran = fixture.run(&mut event, false);
    assert_eq!(ran, vec![0, 1, 2]);
}

#[test]
fn cancellation_stops_the_event_unless_suppressed() {
    let fixture = Fixture::new();
    fixture.exiting.store(true, Ordering::SeqCst);

    let mut event = event_of(vec![
        Probe::returning(Flow::Continue),
        Probe::returning(Flow::Continue),
    ]);
    let ran = fixture.run(&mut event, false);
    assert!(ran.is_empty());

    // The destroy pass runs to completion even while exiting.
    let ran = fixture.run(&mut event, true);
    assert_eq!(ran, vec![0, 1]);
}

#[test]
fn sentinel_roles_are_exposed() {
    assert_eq!(StartBlockCommand.role(), Role::StartBlock);
    assert_eq!(EndBlockCommand.role(), Role::EndBlock);
    assert_eq!(ElseCommand.role(), Role::Else);
}
