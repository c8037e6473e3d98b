use std::path::Path;

use crate::error::ConfigError;
use crate::scenario::Scenario;
use crate::validate::validate;

/// Load and validate a scenario file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file is missing or unreadable, fails to
/// parse as TOML, or fails validation.
pub fn load_scenario(path: &Path) -> Result<Scenario, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let scenario = load_from_str(&content)?;
    tracing::debug!(
        path = %path.display(),
        instances = scenario.instances.len(),
        actions = scenario.sequence.len(),
        "loaded scenario"
    );
    Ok(scenario)
}

/// Parse a TOML string directly into a validated [`Scenario`].
///
/// Useful for tests or one-off parsing without file I/O.
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn load_from_str(toml_str: &str) -> Result<Scenario, ConfigError> {
    let scenario: Scenario =
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    validate(&scenario).map_err(|errors| {
        errors
            .into_iter()
            .next()
            .unwrap_or_else(|| ConfigError::Validation {
                field: "unknown".to_string(),
                message: "validation failed".to_string(),
            })
    })?;

    Ok(scenario)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{Action, AdapterKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
        [[instances]]
        id = "a"
        name = "Instance A"
        adapter = "delve"
        program = "./cmd/readModifyWrite"
        env = "DATABASE_URL=postgres://localhost:5433/postgres;APP=alpha"
        cwd = "./work"

        [[instances]]
        id = "b"
        program = "./cmd/readModifyWrite"
        env = "DATABASE_URL=postgres://localhost:5433/postgres"
        cwd = "./work"

        [[sequence]]
        action = "run"
        instance = "a"

        [[sequence]]
        action = "pause"
        instance = "a"
        file = "cmd/readModifyWrite/main.go"
        marker = "CL_PAUSE_1"

        [[sequence]]
        action = "sleep"
        seconds = 2

        [[sequence]]
        action = "continue"
        instance = "a"
    "#;

    #[test]
    fn load_from_str_parses_full_scenario() {
        let scenario = load_from_str(SAMPLE).unwrap();
        assert_eq!(scenario.instances.len(), 2);
        assert_eq!(scenario.sequence.len(), 4);

        let a = scenario.instance("a").unwrap();
        assert_eq!(a.name, "Instance A");
        assert_eq!(a.adapter, AdapterKind::Delve);
        assert_eq!(a.env_map().unwrap().len(), 2);

        // Unnamed instance defaults apply.
        let b = scenario.instance("b").unwrap();
        assert_eq!(b.name, "");
        assert_eq!(b.adapter, AdapterKind::Delve);

        assert_eq!(
            scenario.sequence[1],
            Action::Pause {
                instance: "a".into(),
                file: PathBuf::from("cmd/readModifyWrite/main.go"),
                marker: "CL_PAUSE_1".into(),
            }
        );
        assert_eq!(scenario.sequence[2], Action::Sleep { seconds: 2 });
    }

    #[test]
    fn load_from_str_rejects_invalid_toml() {
        assert!(matches!(
            load_from_str("{{bad}}"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_str_rejects_unknown_action() {
        let toml_str = r#"
            [[sequence]]
            action = "dance"
            instance = "a"
        "#;
        assert!(matches!(
            load_from_str(toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_str_rejects_invalid_values() {
        let toml_str = r#"
            [[instances]]
            id = "a"
            program = ""
            cwd = "."
        "#;
        assert!(matches!(
            load_from_str(toml_str),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn load_scenario_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scenario.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let scenario = load_scenario(&path).unwrap();
        assert_eq!(scenario.instances.len(), 2);
    }

    #[test]
    fn load_scenario_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");
        assert!(matches!(
            load_scenario(&path),
            Err(ConfigError::NotFound(_))
        ));
    }
}
