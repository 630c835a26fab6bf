//! Execution context handed to events and commands.
//!
//! Components borrow the context for the duration of one call and never
//! store it; the handles inside live exactly as long as the run that
//! produced them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::errors::ExprError;
use crate::hardware::{RobotHandle, VisionHandle};
use crate::interpreter::variables::{Eval, VariableStore};

pub struct ExecContext<'a> {
    robot: &'a Arc<dyn RobotHandle>,
    vision: &'a Arc<dyn VisionHandle>,
    variables: &'a Mutex<VariableStore>,
    exiting: &'a AtomicBool,
}

impl<'a> ExecContext<'a> {
    pub fn new(
        robot: &'a Arc<dyn RobotHandle>,
        vision: &'a Arc<dyn VisionHandle>,
        variables: &'a Mutex<VariableStore>,
        exiting: &'a AtomicBool,
    ) -> Self {
        Self {
            robot,
            vision,
            variables,
            exiting,
        }
    }

    pub fn robot(&self) -> &dyn RobotHandle {
        self.robot.as_ref()
    }

    pub fn vision(&self) -> &dyn VisionHandle {
        self.vision.as_ref()
    }

    /// Long-running commands poll this between chunks of work and bail
    /// out as soon as it flips.
    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    /// Ask the whole run to wind down, as if stop had been requested.
    pub fn request_exit(&self) {
        self.exiting.store(true, Ordering::SeqCst);
    }

    pub fn set_variable(&self, name: &str, expression: &str) {
        self.lock_variables().set(name, expression);
    }

    pub fn get_variable(&self, name: &str) -> (f64, bool) {
        self.lock_variables().get(name)
    }

    pub fn evaluate(&self, expression: &str) -> Eval {
        self.lock_variables().evaluate(expression)
    }

    pub fn run_script(&self, text: &str) -> Result<(), ExprError> {
        self.lock_variables().run_script(text)
    }

    // The store is locked per call, never across a blocking command, so
    // controller-side variable reads stay responsive mid-tick.
    fn lock_variables(&self) -> std::sync::MutexGuard<'a, VariableStore> {
        self.variables.lock().unwrap_or_else(|poisoned| {
            warn!(target: "interpreter", "variable store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
