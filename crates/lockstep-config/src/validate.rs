use std::collections::HashSet;

use crate::error::ConfigError;
use crate::scenario::{Action, Scenario};

/// Validate a [`Scenario`], returning all detected violations.
///
/// Cross-references between actions and instance ids are deliberately not
/// checked here; the orchestrator verifies them before opening any adapter
/// connection, so reference errors surface with the runner's own taxonomy.
pub fn validate(scenario: &Scenario) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut seen_ids = HashSet::new();

    for instance in &scenario.instances {
        if instance.id.is_empty() {
            errors.push(ConfigError::Validation {
                field: "instances.id".to_string(),
                message: "must not be empty".to_string(),
            });
            continue;
        }
        if !seen_ids.insert(instance.id.as_str()) {
            errors.push(ConfigError::Validation {
                field: format!("instances.{}", instance.id),
                message: "duplicate instance id".to_string(),
            });
        }
        if instance.program.is_empty() {
            errors.push(ConfigError::Validation {
                field: format!("instances.{}.program", instance.id),
                message: "must not be empty".to_string(),
            });
        }
        if let Err(e) = instance.env_map() {
            errors.push(e);
        }
    }

    for (index, action) in scenario.sequence.iter().enumerate() {
        if let Action::Pause { marker, file, .. } = action {
            if marker.is_empty() {
                errors.push(ConfigError::Validation {
                    field: format!("sequence[{index}].marker"),
                    message: "must not be empty".to_string(),
                });
            }
            if file.as_os_str().is_empty() {
                errors.push(ConfigError::Validation {
                    field: format!("sequence[{index}].file"),
                    message: "must not be empty".to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
