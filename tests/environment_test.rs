// Tests for the resource environment boundary and settings round-trip.

use std::fs;
use std::sync::Arc;

use armscript::config::Settings;
use armscript::environment::Environment;
use armscript::hardware::{OfflineRobot, OfflineVideoStream, OfflineVision, EmptyCatalog, ObjectCatalog};

#[test]
fn close_shuts_down_every_collaborator() {
    let robot = Arc::new(OfflineRobot::default());
    let vision = Arc::new(OfflineVision::default());
    let stream = Arc::new(OfflineVideoStream::default());

    let environment = Environment::new(
        robot.clone(),
        vision.clone(),
        stream.clone(),
        Arc::new(EmptyCatalog),
        Settings::default(),
    );

    environment.close();

    use armscript::hardware::RobotHandle;
    assert!(robot.is_exiting());
    assert!(vision.is_exiting());
    assert!(stream.is_ended());
}

#[test]
fn settings_copies_are_caller_owned() {
    let environment = Environment::offline(Settings {
        script_fps: 25,
        ..Settings::default()
    });

    let mut copy = environment.settings();
    copy.script_fps = 1;
    assert_eq!(environment.settings().script_fps, 25);
}

#[test]
fn offline_catalog_is_empty() {
    let environment = Environment::offline(Settings::default());
    assert!(environment.object_catalog().object_names().is_empty());
}

#[test]
fn settings_round_trip_through_toml() {
    let settings = Settings {
        camera_id: Some(1),
        robot_id: Some("/dev/ttyUSB0".to_string()),
        script_fps: 60,
        default_speed: 25.0,
        stop_timeout_ms: 1500,
    };

    let path = std::env::temp_dir().join("armscript_settings_test.toml");
    settings.save(&path).expect("save settings");
    let loaded = Settings::load(&path).expect("load settings");

    assert_eq!(loaded.camera_id, Some(1));
    assert_eq!(loaded.robot_id.as_deref(), Some("/dev/ttyUSB0"));
    assert_eq!(loaded.script_fps, 60);
    assert_eq!(loaded.default_speed, 25.0);
    assert_eq!(loaded.stop_timeout_ms, 1500);

    let _ = fs::remove_file(&path);
}

#[test]
fn partial_settings_fill_in_defaults() {
    let path = std::env::temp_dir().join("armscript_partial_settings_test.toml");
    fs::write(&path, "script_fps = 30\n").expect("write settings");

    let loaded = Settings::load(&path).expect("load settings");
    assert_eq!(loaded.script_fps, 30);
    assert_eq!(loaded.camera_id, None);
    assert_eq!(loaded.stop_timeout_ms, 3000);

    let _ = fs::remove_file(&path);
}
