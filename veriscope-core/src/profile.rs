//! Declared-profile intake

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The customer's self-reported environment and asset claims.
///
/// Supplied by the intake collaborator before session processing begins and
/// immutable for the session's duration. Taken as given, not independently
/// verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredProfile {
    /// Declared environment label, e.g. "Home", "Office", "Shop"
    pub environment: Option<String>,
    /// Declared object label -> declared count; keys are unique
    #[serde(default)]
    pub objects: BTreeMap<String, u32>,
}

impl DeclaredProfile {
    /// Validate the profile before a session starts.
    ///
    /// A malformed profile is rejected up front: comparing against it would
    /// produce a meaningless report.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(env) = &self.environment {
            if env.trim().is_empty() {
                return Err("Declared environment label is empty".to_string());
            }
        }

        // A claim beyond this is a data-entry error, not an inventory
        const MAX_DECLARED_COUNT: u32 = 100_000;

        for (label, &count) in &self.objects {
            if label.trim().is_empty() {
                return Err("Declared object label is empty".to_string());
            }
            if count == 0 {
                return Err(format!("Declared count for '{}' is zero", label));
            }
            if count > MAX_DECLARED_COUNT {
                return Err(format!(
                    "Declared count for '{}' exceeds {}",
                    label, MAX_DECLARED_COUNT
                ));
            }
        }

        Ok(())
    }
}
