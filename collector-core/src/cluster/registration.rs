use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One process instance registered for a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRegistration {
    pub module_name: String,
    pub provider_name: String,
    pub instance_id: String,
    /// Sub-index of the registration within the instance, normally `0`.
    pub sequence: u32,
}

impl ModuleRegistration {
    pub fn new(module_name: &str, provider_name: &str, instance_id: &str, sequence: u32) -> Self {
        Self {
            module_name: module_name.to_owned(),
            provider_name: provider_name.to_owned(),
            instance_id: instance_id.to_owned(),
            sequence,
        }
    }

    /// `<instance_id>_<sequence>`, unique among the module's peers.
    pub fn key(&self) -> String {
        format!("{}_{}", self.instance_id, self.sequence)
    }

    /// Same instance and sequence, ignoring provider details.
    pub fn same_member(&self, other: &ModuleRegistration) -> bool {
        self.instance_id == other.instance_id && self.sequence == other.sequence
    }
}

impl Ord for ModuleRegistration {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.instance_id, self.sequence, &self.module_name, &self.provider_name).cmp(&(
            &other.instance_id,
            other.sequence,
            &other.module_name,
            &other.provider_name,
        ))
    }
}

impl PartialOrd for ModuleRegistration {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Random 128-bit instance id rendered as 32 hex digits.
pub fn new_instance_id() -> String {
    let id: u128 = rand::rng().random();
    format!("{:032x}", id)
}
