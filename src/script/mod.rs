//! Script object model for the interpreter.
//!
//! This module defines the serialized script format, the Event/Command
//! traits the interpreter executes, the built-in variant catalogue, and
//! the closed registry that resolves type tags to constructors. Variant
//! construction collects faults instead of failing, so a partially bad
//! script still loads and reports every problem at once.

pub mod command;
pub mod context;
pub mod descriptor;
pub mod event;
pub mod registry;

// Re-export commonly used types
pub use command::{Command, Flow, Role};
pub use context::ExecContext;
pub use descriptor::{CommandDescriptor, EventDescriptor, Parameters};
pub use event::{Event, EventLogic};
pub use registry::{CommandFactory, EventFactory, VariantRegistry};
