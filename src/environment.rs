//! Shared resource environment.
//!
//! `Environment` owns the hardware/vision/video/catalogue handles and
//! hands out shared references to whoever needs them. Rule of thumb
//! carried over from the original design: if an `Environment` is passed
//! to a component, the component pulls the handles it needs and keeps
//! those, never the environment itself. The environment does not hold an
//! interpreter; an interpreter can run another interpreter inside itself,
//! so the two stay separate.

use std::sync::Arc;

use crate::config::Settings;
use crate::hardware::{
    EmptyCatalog, ObjectCatalog, OfflineRobot, OfflineVideoStream, OfflineVision, RobotHandle,
    VideoStreamHandle, VisionHandle,
};

pub struct Environment {
    robot: Arc<dyn RobotHandle>,
    vision: Arc<dyn VisionHandle>,
    video_stream: Arc<dyn VideoStreamHandle>,
    object_catalog: Arc<dyn ObjectCatalog>,
    settings: Settings,
}

impl Environment {
    pub fn new(
        robot: Arc<dyn RobotHandle>,
        vision: Arc<dyn VisionHandle>,
        video_stream: Arc<dyn VideoStreamHandle>,
        object_catalog: Arc<dyn ObjectCatalog>,
        settings: Settings,
    ) -> Self {
        Self {
            robot,
            vision,
            video_stream,
            object_catalog,
            settings,
        }
    }

    /// Build an environment with no hardware attached.
    pub fn offline(settings: Settings) -> Self {
        Self::new(
            Arc::new(OfflineRobot::default()),
            Arc::new(OfflineVision::default()),
            Arc::new(OfflineVideoStream::default()),
            Arc::new(EmptyCatalog),
            settings,
        )
    }

    pub fn robot(&self) -> Arc<dyn RobotHandle> {
        Arc::clone(&self.robot)
    }

    pub fn vision(&self) -> Arc<dyn VisionHandle> {
        Arc::clone(&self.vision)
    }

    pub fn video_stream(&self) -> Arc<dyn VideoStreamHandle> {
        Arc::clone(&self.video_stream)
    }

    pub fn object_catalog(&self) -> Arc<dyn ObjectCatalog> {
        Arc::clone(&self.object_catalog)
    }

    /// Callers get their own copy; the environment's settings never
    /// change underneath a running interpreter.
    pub fn settings(&self) -> Settings {
        self.settings.clone()
    }

    /// Safely shut down every owned collaborator that runs threads.
    pub fn close(&self) {
        self.robot.set_exiting(true);
        self.vision.set_exiting(true);
        self.video_stream.end_thread();
    }
}
