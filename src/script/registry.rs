//! Closed registry of Event/Command variants.
//!
//! Scripts reference variants by type tag; the registry maps each tag to
//! a constructor. Lookups of unknown tags fail closed: the loader records
//! a fault and occupies no slot, instead of guessing. Factories never
//! fail; a variant that rejects its parameters still constructs and
//! reports through `faults()`.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::script::command::{
    Command, ElseCommand, EndBlockCommand, EndEventCommand, EndProgramCommand, RunScriptCommand,
    SetSpeedCommand, SetVariableCommand, StartBlockCommand, TestExpressionCommand,
    TestVariableCommand, WaitCommand,
};
use crate::script::descriptor::Parameters;
use crate::script::event::{DestroyEvent, EventLogic, ExpressionEvent, InitEvent, StepEvent};

/// Factory function type for creating event logic from parameters
pub type EventFactory = fn(&Parameters) -> Box<dyn EventLogic>;

/// Factory function type for creating command instances from parameters
pub type CommandFactory = fn(&Parameters) -> Box<dyn Command>;

#[derive(Debug, Error)]
#[error("a variant is already registered for tag `{0}`")]
pub struct DuplicateTag(pub String);

pub struct VariantRegistry {
    events: HashMap<String, EventFactory>,
    commands: HashMap<String, CommandFactory>,
}

impl VariantRegistry {
    /// A registry with no variants at all. Embedders building a custom
    /// catalogue start here.
    pub fn empty() -> Self {
        Self {
            events: HashMap::new(),
            commands: HashMap::new(),
        }
    }

    /// Register an event variant. Tags are validated at registration
    /// time; a duplicate is rejected rather than silently replaced.
    pub fn register_event(
        &mut self,
        tag: impl Into<String>,
        factory: EventFactory,
    ) -> Result<(), DuplicateTag> {
        let tag = tag.into();
        if self.events.contains_key(&tag) {
            return Err(DuplicateTag(tag));
        }
        debug!(target: "loader", "Registering event variant: {tag}");
        self.events.insert(tag, factory);
        Ok(())
    }

    /// Register a command variant. Same duplicate rule as events.
    pub fn register_command(
        &mut self,
        tag: impl Into<String>,
        factory: CommandFactory,
    ) -> Result<(), DuplicateTag> {
        let tag = tag.into();
        if self.commands.contains_key(&tag) {
            return Err(DuplicateTag(tag));
        }
        debug!(target: "loader", "Registering command variant: {tag}");
        self.commands.insert(tag, factory);
        Ok(())
    }

    pub fn event_factory(&self, tag: &str) -> Option<EventFactory> {
        self.events.get(tag).copied()
    }

    pub fn command_factory(&self, tag: &str) -> Option<CommandFactory> {
        self.commands.get(tag).copied()
    }

    pub fn event_tags(&self) -> Vec<String> {
        self.events.keys().cloned().collect()
    }

    pub fn command_tags(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    // Built-in tags are distinct by construction.
    fn insert_event(&mut self, tag: &'static str, factory: EventFactory) {
        self.events.insert(tag.to_string(), factory);
    }

    fn insert_command(&mut self, tag: &'static str, factory: CommandFactory) {
        self.commands.insert(tag.to_string(), factory);
    }
}

impl Default for VariantRegistry {
    /// The built-in catalogue.
    fn default() -> Self {
        let mut registry = Self::empty();

        registry.insert_event("init", |p| Box::new(InitEvent::from_params(p)));
        registry.insert_event("step", |p| Box::new(StepEvent::from_params(p)));
        registry.insert_event("expression", |p| Box::new(ExpressionEvent::from_params(p)));
        registry.insert_event("destroy", |p| Box::new(DestroyEvent::from_params(p)));

        registry.insert_command("set_variable", |p| {
            Box::new(SetVariableCommand::from_params(p))
        });
        registry.insert_command("test_variable", |p| {
            Box::new(TestVariableCommand::from_params(p))
        });
        registry.insert_command("test_expression", |p| {
            Box::new(TestExpressionCommand::from_params(p))
        });
        registry.insert_command("start_block", |p| {
            Box::new(StartBlockCommand::from_params(p))
        });
        registry.insert_command("end_block", |p| Box::new(EndBlockCommand::from_params(p)));
        registry.insert_command("else", |p| Box::new(ElseCommand::from_params(p)));
        registry.insert_command("end_event", |p| Box::new(EndEventCommand::from_params(p)));
        registry.insert_command("end_program", |p| {
            Box::new(EndProgramCommand::from_params(p))
        });
        registry.insert_command("wait", |p| Box::new(WaitCommand::from_params(p)));
        registry.insert_command("set_speed", |p| Box::new(SetSpeedCommand::from_params(p)));
        registry.insert_command("run_script", |p| Box::new(RunScriptCommand::from_params(p)));

        registry
    }
}
