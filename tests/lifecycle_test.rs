// Tests for the run lifecycle: single-worker enforcement, clean stop
// semantics, cooperative cancellation, the stuck-worker failure state,
// and the shutdown destroy pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use armscript::config::Settings;
use armscript::environment::Environment;
use armscript::errors::LifecycleError;
use armscript::hardware::{
    EmptyCatalog, OfflineRobot, OfflineVideoStream, OfflineVision, RobotHandle, VisionHandle,
};
use armscript::interpreter::{Interpreter, RunState};
use armscript::script::command::{Command, Flow};
use armscript::script::descriptor::Parameters;
use armscript::script::{CommandDescriptor, EventDescriptor, ExecContext, VariantRegistry};

fn fast_settings() -> Settings {
    Settings {
        script_fps: 100,
        ..Settings::default()
    }
}

fn event(tag: &str, commands: Vec<CommandDescriptor>) -> EventDescriptor {
    EventDescriptor {
        type_tag: tag.to_string(),
        parameters: Parameters::new(),
        command_list: commands,
    }
}

fn command(tag: &str, parameters: serde_json::Value) -> CommandDescriptor {
    CommandDescriptor {
        type_tag: tag.to_string(),
        parameters: parameters.as_object().cloned().unwrap_or_default(),
    }
}

#[test]
fn start_twice_rejects_the_second_request() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let mut interpreter = Interpreter::new(fast_settings());

    interpreter
        .start(robot.clone(), vision.clone())
        .expect("first start");
    assert!(interpreter.is_running());

    let second = interpreter.start(robot.clone(), vision.clone());
    assert!(matches!(second, Err(LifecycleError::AlreadyRunning)));
    assert!(interpreter.is_running());

    interpreter.stop(robot, vision).expect("clean stop");
}

#[test]
fn clean_stop_resets_events_and_variables() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let registry = VariantRegistry::default();
    let mut interpreter = Interpreter::new(fast_settings());

    interpreter.load_script(
        &[event(
            "step",
            vec![command(
                "set_variable",
                serde_json::json!({"variable": "ticks", "expression": "ticks + 1"}),
            )],
        )],
        &registry,
    );
    assert_eq!(interpreter.event_count(), 1);

    interpreter
        .start(robot.clone(), vision.clone())
        .expect("start");
    vision.add_tracker();

    // Wait until the worker has demonstrably ticked.
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let (ticks, found) = interpreter.get_variable("ticks");
        if found && ticks >= 2.0 {
            break;
        }
        assert!(Instant::now() < deadline, "worker never ticked");
        thread::sleep(Duration::from_millis(10));
    }

    interpreter.stop(robot.clone(), vision.clone()).expect("clean stop");

    assert_eq!(interpreter.run_state(), RunState::Stopped);
    assert!(!interpreter.is_running());
    assert_eq!(interpreter.event_count(), 0);
    assert_eq!(interpreter.get_variable("ticks"), (0.0, false));
    // Default bindings survive the reset.
    assert_eq!(
        interpreter.evaluate_expression("sqrt(16.0)").value(),
        Some(4.0)
    );
    // Trackers were released and the collaborators re-activated.
    assert_eq!(vision.active_tracker_count(), 0);
    assert!(!robot.is_exiting());
    assert!(!vision.is_exiting());
}

#[test]
fn status_reports_executed_commands_while_running() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let registry = VariantRegistry::default();
    let mut interpreter = Interpreter::new(fast_settings());

    assert!(interpreter.status().is_none());

    interpreter.load_script(
        &[event(
            "step",
            vec![command(
                "set_variable",
                serde_json::json!({"variable": "x", "expression": "1"}),
            )],
        )],
        &registry,
    );
    interpreter
        .start(robot.clone(), vision.clone())
        .expect("start");

    let deadline = Instant::now() + Duration::from_secs(2);
    let mut observed = false;
    while Instant::now() < deadline {
        if let Some(status) = interpreter.status() {
            if status.get(&0).is_some_and(|ran| ran.contains(&0)) {
                observed = true;
                break;
            }
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(observed, "status never showed the command running");

    interpreter.stop(robot, vision).expect("clean stop");
    assert!(interpreter.status().is_none());
}

#[test]
fn exit_outcome_only_halts_the_current_tick() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let registry = VariantRegistry::default();
    let mut interpreter = Interpreter::new(fast_settings());

    // The command after end_event must never run, but the ones before it
    // run again on every tick.
    interpreter.load_script(
        &[event(
            "step",
            vec![
                command(
                    "set_variable",
                    serde_json::json!({"variable": "before", "expression": "before + 1"}),
                ),
                command("end_event", serde_json::json!({})),
                command(
                    "set_variable",
                    serde_json::json!({"variable": "after", "expression": "after + 1"}),
                ),
            ],
        )],
        &registry,
    );

    interpreter
        .start(robot.clone(), vision.clone())
        .expect("start");

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let (before, found) = interpreter.get_variable("before");
        if found && before >= 3.0 {
            break;
        }
        assert!(Instant::now() < deadline, "event never re-ran");
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(interpreter.get_variable("after"), (0.0, false));
    interpreter.stop(robot, vision).expect("clean stop");
}

#[test]
fn wait_command_aborts_promptly_on_stop() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let registry = VariantRegistry::default();
    let mut interpreter = Interpreter::new(fast_settings());

    interpreter.load_script(
        &[event(
            "step",
            vec![command("wait", serde_json::json!({"expression": "30"}))],
        )],
        &registry,
    );

    interpreter
        .start(robot.clone(), vision.clone())
        .expect("start");
    thread::sleep(Duration::from_millis(100));

    let begun = Instant::now();
    interpreter.stop(robot, vision).expect("clean stop");
    assert!(
        begun.elapsed() < Duration::from_secs(2),
        "stop took {:?}, wait did not yield",
        begun.elapsed()
    );
}

#[test]
fn controller_calls_do_not_queue_behind_a_blocking_command() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let registry = VariantRegistry::default();
    let mut interpreter = Interpreter::new(fast_settings());

    interpreter.load_script(
        &[event(
            "step",
            vec![command("wait", serde_json::json!({"expression": "5"}))],
        )],
        &registry,
    );
    interpreter
        .start(robot.clone(), vision.clone())
        .expect("start");
    // Let the worker get into the middle of the wait.
    thread::sleep(Duration::from_millis(100));

    let begun = Instant::now();
    let _ = interpreter.event_count();
    let _ = interpreter.get_variable("x");
    let _ = interpreter.status();
    assert!(
        begun.elapsed() < Duration::from_millis(500),
        "controller read stalled for {:?}",
        begun.elapsed()
    );

    interpreter.stop(robot, vision).expect("clean stop");
}

#[test]
fn destroy_event_runs_once_during_shutdown() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let registry = VariantRegistry::default();
    let mut interpreter = Interpreter::new(fast_settings());

    interpreter.load_script(
        &[
            event("step", vec![]),
            event(
                "destroy",
                vec![command("set_speed", serde_json::json!({"expression": "77"}))],
            ),
        ],
        &registry,
    );

    interpreter
        .start(robot.clone(), vision.clone())
        .expect("start");
    thread::sleep(Duration::from_millis(100));

    // The destroy event is not active during the run; the speed is still
    // the default applied at start.
    assert_eq!(robot.speed(), 10.0);

    interpreter.stop(robot.clone(), vision).expect("clean stop");
    assert_eq!(robot.speed(), 77.0);
}

#[test]
fn end_program_command_winds_the_run_down() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let registry = VariantRegistry::default();
    let mut interpreter = Interpreter::new(fast_settings());

    interpreter.load_script(
        &[event("step", vec![command("end_program", serde_json::json!({}))])],
        &registry,
    );

    interpreter
        .start(robot.clone(), vision.clone())
        .expect("start");

    let deadline = Instant::now() + Duration::from_secs(2);
    while !interpreter.is_exiting() {
        assert!(Instant::now() < deadline, "end_program never took effect");
        thread::sleep(Duration::from_millis(10));
    }

    // The run wound itself down; stop still cleans up the worker.
    interpreter.stop(robot, vision).expect("clean stop");
    assert_eq!(interpreter.run_state(), RunState::Stopped);
}

// A command that ignores the cooperative cancellation protocol until the
// test releases it.
static RELEASE_STUBBORN: AtomicBool = AtomicBool::new(false);

struct StubbornCommand;

impl Command for StubbornCommand {
    fn run(&mut self, _ctx: &mut ExecContext<'_>) -> Flow {
        while !RELEASE_STUBBORN.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(10));
        }
        Flow::Continue
    }
}

#[test]
fn uncooperative_command_leaves_the_run_stuck() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let mut registry = VariantRegistry::default();
    registry
        .register_command("stubborn", |_| Box::new(StubbornCommand))
        .expect("fresh tag");

    let mut interpreter = Interpreter::new(Settings {
        script_fps: 100,
        stop_timeout_ms: 300,
        ..Settings::default()
    });

    interpreter.load_script(
        &[event("step", vec![command("stubborn", serde_json::json!({}))])],
        &registry,
    );
    interpreter
        .start(robot.clone(), vision.clone())
        .expect("start");
    thread::sleep(Duration::from_millis(100));

    let stuck = interpreter.stop(robot.clone(), vision.clone());
    assert!(matches!(stuck, Err(LifecycleError::WorkerStuck(_))));
    assert_eq!(interpreter.run_state(), RunState::Stuck);
    assert!(interpreter.is_running(), "stuck worker stays attached");

    // Collaborator shutdown still proceeds while the worker is stuck.
    let stream = Arc::new(OfflineVideoStream::default());
    let environment = Environment::new(
        robot.clone(),
        vision.clone(),
        stream.clone(),
        Arc::new(EmptyCatalog),
        Settings::default(),
    );
    environment.close();
    assert!(stream.is_ended());

    // Once the command finally yields, a later stop succeeds.
    RELEASE_STUBBORN.store(true, Ordering::SeqCst);
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match interpreter.stop(robot.clone(), vision.clone()) {
            Ok(()) => break,
            Err(_) => assert!(Instant::now() < deadline, "worker never recovered"),
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(interpreter.run_state(), RunState::Stopped);
}
