//! Serialized script format.
//!
//! A `.task` file is a JSON array of event descriptors, each carrying a
//! type tag, a parameter map, and an ordered command list. The descriptor
//! graph is immutable once parsed; the registry turns it into live
//! Event/Command objects.

use serde::{Deserialize, Serialize};

use crate::errors::Fault;

/// Free-form parameter map attached to every descriptor.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDescriptor {
    pub type_tag: String,
    #[serde(default)]
    pub parameters: Parameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    pub type_tag: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub command_list: Vec<CommandDescriptor>,
}

/// Pull a required string parameter, recording a fault when it is
/// missing or mistyped. Variant constructors never fail outright; a
/// faulted variant still occupies its slot and reports through
/// `faults()`.
pub fn string_param(params: &Parameters, key: &str, faults: &mut Vec<Fault>) -> String {
    match params.get(key) {
        Some(serde_json::Value::String(value)) => value.clone(),
        Some(_) => {
            faults.push(Fault::InvalidParameter);
            String::new()
        }
        None => {
            faults.push(Fault::MissingParameter);
            String::new()
        }
    }
}
