//! Collaborator boundaries for the physical side of the system.
//!
//! The interpreter drives hardware through these narrow traits and never
//! owns the implementations. Every method is callable from either the
//! controller side or the worker thread, so implementations use interior
//! mutability. `set_exiting` is the cooperative cancellation signal:
//! blocking calls inside a driver are expected to unwind quickly once it
//! is set.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// Robot arm driver boundary.
pub trait RobotHandle: Send + Sync {
    fn set_exiting(&self, exiting: bool);
    fn is_exiting(&self) -> bool;
    /// Enable or disable all actuator channels at once.
    fn set_active_servos(&self, on: bool);
    fn set_speed(&self, speed: f64);
    fn speed(&self) -> f64;
}

/// Vision subsystem boundary.
pub trait VisionHandle: Send + Sync {
    fn set_exiting(&self, exiting: bool);
    /// Release every tracker the run left active.
    fn end_all_trackers(&self);
    fn active_tracker_count(&self) -> usize;
}

/// Video-capture boundary. Only shutdown is the core's business.
pub trait VideoStreamHandle: Send + Sync {
    fn end_thread(&self);
}

/// Catalogue of known recognizable objects.
pub trait ObjectCatalog: Send + Sync {
    fn object_names(&self) -> Vec<String>;
}

/// Robot stand-in used when no arm is attached. The original product runs
/// fine without hardware connected, so this is regular runtime state, not
/// a test-only double.
#[derive(Debug, Default)]
pub struct OfflineRobot {
    exiting: AtomicBool,
    servos_on: AtomicBool,
    speed: Mutex<f64>,
}

impl RobotHandle for OfflineRobot {
    fn set_exiting(&self, exiting: bool) {
        self.exiting.store(exiting, Ordering::SeqCst);
    }

    fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    fn set_active_servos(&self, on: bool) {
        self.servos_on.store(on, Ordering::SeqCst);
    }

    fn set_speed(&self, speed: f64) {
        *self.speed.lock().unwrap_or_else(|e| e.into_inner()) = speed;
    }

    fn speed(&self) -> f64 {
        *self.speed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl OfflineRobot {
    pub fn servos_active(&self) -> bool {
        self.servos_on.load(Ordering::SeqCst)
    }
}

/// Vision stand-in used when no camera is attached.
#[derive(Debug, Default)]
pub struct OfflineVision {
    exiting: AtomicBool,
    trackers: AtomicUsize,
}

impl VisionHandle for OfflineVision {
    fn set_exiting(&self, exiting: bool) {
        self.exiting.store(exiting, Ordering::SeqCst);
    }

    fn end_all_trackers(&self) {
        self.trackers.store(0, Ordering::SeqCst);
    }

    fn active_tracker_count(&self) -> usize {
        self.trackers.load(Ordering::SeqCst)
    }
}

impl OfflineVision {
    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    pub fn add_tracker(&self) {
        self.trackers.fetch_add(1, Ordering::SeqCst);
    }
}

/// Video stream stand-in for camera-less runs.
#[derive(Debug, Default)]
pub struct OfflineVideoStream {
    ended: AtomicBool,
}

impl VideoStreamHandle for OfflineVideoStream {
    fn end_thread(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }
}

impl OfflineVideoStream {
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

/// An object catalogue with nothing in it.
#[derive(Debug, Default)]
pub struct EmptyCatalog;

impl ObjectCatalog for EmptyCatalog {
    fn object_names(&self) -> Vec<String> {
        Vec::new()
    }
}
