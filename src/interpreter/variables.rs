//! Variable store and expression sandbox.
//!
//! Named numeric bindings plus a restricted evaluator. The engine is
//! built raw: no standard library, no modules, no file or string access;
//! only arithmetic, comparisons, an explicit math allow-list, the
//! constants `pi`/`e`, and the live robot/vision API handles are visible
//! to an expression. Resource limits cap runaway scripts.

use std::collections::HashMap;
use std::sync::Arc;

use rhai::packages::{ArithmeticPackage, LogicPackage, Package};
use rhai::{Dynamic, Engine, Scope};
use tracing::warn;

use crate::errors::ExprError;
use crate::hardware::{RobotHandle, VisionHandle};

/// Result of evaluating one expression.
///
/// The original runtime collapsed "crashed" and "evaluated to nothing"
/// into a single failure signal; they are kept distinguishable here.
/// `legacy()` gives the collapsed shape for call sites that only care
/// whether a usable number came out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eval {
    Value(f64),
    Empty,
    Crashed,
}

impl Eval {
    pub fn legacy(self) -> (Option<f64>, bool) {
        match self {
            Eval::Value(value) => (Some(value), true),
            Eval::Empty | Eval::Crashed => (None, false),
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Eval::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn truthy(self) -> bool {
        matches!(self, Eval::Value(value) if value != 0.0)
    }
}

/// Robot handle as seen from inside the sandbox.
#[derive(Clone)]
pub struct RobotApi(pub Arc<dyn RobotHandle>);

/// Vision handle as seen from inside the sandbox.
#[derive(Clone)]
pub struct VisionApi(pub Arc<dyn VisionHandle>);

pub struct VariableStore {
    engine: Engine,
    values: HashMap<String, f64>,
    robot: Option<RobotApi>,
    vision: Option<VisionApi>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self {
            engine: build_engine(),
            values: HashMap::new(),
            robot: None,
            vision: None,
        }
    }

    /// Bind the live hardware handles the sandbox exposes as `robot` and
    /// `vision`. Called when a run starts; the bindings survive resets.
    pub fn bind_handles(&mut self, robot: Arc<dyn RobotHandle>, vision: Arc<dyn VisionHandle>) {
        self.robot = Some(RobotApi(robot));
        self.vision = Some(VisionApi(vision));
    }

    /// Drop every user variable, restoring the default bindings.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Assign the value of `expression` to `name`. A name that has never
    /// been set springs into existence with value 0 first; if the
    /// expression then fails to produce a number the binding keeps its
    /// previous value. Failures are logged, never returned.
    pub fn set(&mut self, name: &str, expression: &str) {
        if !self.values.contains_key(name) {
            self.values.insert(name.to_string(), 0.0);
        }
        match self.evaluate(expression) {
            Eval::Value(value) => {
                self.values.insert(name.to_string(), value);
            }
            outcome => {
                warn!(target: "sandbox", "assignment to `{name}` kept its previous value ({outcome:?})");
            }
        }
    }

    /// Read-only probe: unknown names report `(0.0, false)` and are not
    /// created.
    pub fn get(&self, name: &str) -> (f64, bool) {
        match self.values.get(name) {
            Some(value) => (*value, true),
            None => (0.0, false),
        }
    }

    /// Evaluate a single expression against the sandbox scope.
    pub fn evaluate(&self, expression: &str) -> Eval {
        let mut scope = self.scope();
        match self
            .engine
            .eval_expression_with_scope::<Dynamic>(&mut scope, expression)
        {
            Ok(value) => match coerce_number(value) {
                Some(value) => Eval::Value(value),
                None => Eval::Empty,
            },
            Err(err) => {
                warn!(target: "sandbox", "expression {expression:?} crashed: {err}");
                Eval::Crashed
            }
        }
    }

    /// Run multi-statement text for its side effects. The scope exposes
    /// only the robot/vision bindings; user variables stay out of reach.
    pub fn run_script(&self, text: &str) -> Result<(), ExprError> {
        let mut scope = Scope::new();
        self.push_handles(&mut scope);
        self.engine
            .run_with_scope(&mut scope, text)
            .map_err(|err| ExprError(err.to_string()))
    }

    fn scope(&self) -> Scope<'static> {
        let mut scope = Scope::new();
        scope.push_constant("pi", std::f64::consts::PI);
        scope.push_constant("e", std::f64::consts::E);
        self.push_handles(&mut scope);
        for (name, value) in &self.values {
            scope.push(name.clone(), *value);
        }
        scope
    }

    fn push_handles(&self, scope: &mut Scope<'static>) {
        if let Some(robot) = &self.robot {
            scope.push_constant("robot", robot.clone());
        }
        if let Some(vision) = &self.vision {
            scope.push_constant("vision", vision.clone());
        }
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

fn coerce_number(value: Dynamic) -> Option<f64> {
    if value.is::<f64>() {
        value.try_cast::<f64>()
    } else if value.is::<i64>() {
        value.try_cast::<i64>().map(|v| v as f64)
    } else if value.is::<bool>() {
        value
            .try_cast::<bool>()
            .map(|b| if b { 1.0 } else { 0.0 })
    } else {
        None
    }
}

fn register_unary(engine: &mut Engine, name: &str, f: fn(f64) -> f64) {
    engine.register_fn(name, f);
    engine.register_fn(name, move |x: i64| f(x as f64));
}

fn register_binary(engine: &mut Engine, name: &str, f: fn(f64, f64) -> f64) {
    engine.register_fn(name, f);
    engine.register_fn(name, move |x: i64, y: i64| f(x as f64, y as f64));
}

fn build_engine() -> Engine {
    let mut engine = Engine::new_raw();

    // Operators and comparisons only; nothing else from the stdlib.
    engine.register_global_module(ArithmeticPackage::new().as_shared_module());
    engine.register_global_module(LogicPackage::new().as_shared_module());

    engine.set_max_expr_depths(64, 64);
    engine.set_max_call_levels(64);
    engine.set_max_operations(100_000);

    // The math allow-list.
    register_unary(&mut engine, "abs", f64::abs);
    register_unary(&mut engine, "acos", f64::acos);
    register_unary(&mut engine, "asin", f64::asin);
    register_unary(&mut engine, "atan", f64::atan);
    register_unary(&mut engine, "ceil", f64::ceil);
    register_unary(&mut engine, "cos", f64::cos);
    register_unary(&mut engine, "cosh", f64::cosh);
    register_unary(&mut engine, "degrees", f64::to_degrees);
    register_unary(&mut engine, "exp", f64::exp);
    register_unary(&mut engine, "fabs", f64::abs);
    register_unary(&mut engine, "floor", f64::floor);
    register_unary(&mut engine, "log", f64::ln);
    register_unary(&mut engine, "log10", f64::log10);
    register_unary(&mut engine, "radians", f64::to_radians);
    register_unary(&mut engine, "sin", f64::sin);
    register_unary(&mut engine, "sinh", f64::sinh);
    register_unary(&mut engine, "sqrt", f64::sqrt);
    register_unary(&mut engine, "tan", f64::tan);
    register_unary(&mut engine, "tanh", f64::tanh);

    register_binary(&mut engine, "atan2", f64::atan2);
    register_binary(&mut engine, "fmod", |x, y| x % y);
    register_binary(&mut engine, "hypot", f64::hypot);
    register_binary(&mut engine, "pow", f64::powf);

    // The live handle bindings.
    engine.register_type_with_name::<RobotApi>("Robot");
    engine.register_fn("speed", |r: &mut RobotApi| r.0.speed());
    engine.register_fn("set_speed", |r: &mut RobotApi, v: f64| r.0.set_speed(v));
    engine.register_fn("set_speed", |r: &mut RobotApi, v: i64| {
        r.0.set_speed(v as f64)
    });
    engine.register_fn("exiting", |r: &mut RobotApi| r.0.is_exiting());

    engine.register_type_with_name::<VisionApi>("Vision");
    engine.register_fn("tracker_count", |v: &mut VisionApi| {
        v.0.active_tracker_count() as i64
    });
    engine.register_fn("end_trackers", |v: &mut VisionApi| v.0.end_all_trackers());

    engine
}
