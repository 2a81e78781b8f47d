use std::path::{Path, PathBuf};

use crate::config::schema::GradebookConfig;
use crate::error::ConfigError;
use crate::tree::validate;

const SCHEMA_JSON: &str = include_str!("../../schema/gradebook-v1.json");

/// File name looked up when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "datos_aules.json";

/// Reads and validates the gradebook file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GradebookConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Parses gradebook JSON, checks it against the embedded schema and
/// validates the declared tree. Every problem found is reported at once.
pub fn load_config_from_str(content: &str) -> Result<GradebookConfig, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: GradebookConfig = serde_json::from_value(json_value)?;

    let errors = validate(&config.declared_tree());
    if !errors.is_empty() {
        return Err(ConfigError::InvalidTree(errors));
    }

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Picks the config file: the explicit path if given, otherwise
/// `datos_aules.json` in the working directory, then in the home directory.
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ConfigError::NotFound {
                searched: vec![path.to_path_buf()],
            })
        };
    }

    let mut searched = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        searched.push(cwd.join(DEFAULT_CONFIG_FILE));
    }
    if let Some(home) = dirs::home_dir() {
        searched.push(home.join(DEFAULT_CONFIG_FILE));
    }

    match searched.iter().find(|p| p.is_file()) {
        Some(found) => Ok(found.clone()),
        None => Err(ConfigError::NotFound { searched }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
    {
        "base_url": "https://aules.example.org",
        "username": "teacher",
        "password": "secret",
        "course_id": 1234,
        "categoria_padre": "Resultados de aprendizaje",
        "configuracion_global": {
            "aggregation": 10,
            "aggregateonlygraded": true,
            "grademax": 10,
            "gradepass": 5
        },
        "categorias_hijas": [
            {
                "nombre": "RA1",
                "aggregationcoef": 40,
                "elementos": ["CE1.1", {"nombre": "CE1.2", "idnumber": "ce12"}]
            }
        ]
    }
    "#;

    #[test]
    fn test_load_valid_config() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.course_id, 1234);
        assert_eq!(config.parent_category, "Resultados de aprendizaje");
        assert_eq!(config.child_categories[0].items.len(), 2);
    }

    #[test]
    fn test_schema_rejects_unknown_aggregation() {
        let json = MINIMAL.replace("\"aggregation\": 10", "\"aggregation\": 3");
        assert!(matches!(
            load_config_from_str(&json),
            Err(ConfigError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_schema_rejects_missing_course() {
        let json = MINIMAL.replace("\"course_id\": 1234,", "");
        assert!(matches!(
            load_config_from_str(&json),
            Err(ConfigError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_tree_rules_are_enforced() {
        let json = MINIMAL.replace("\"CE1.1\", {\"nombre\": \"CE1.2\"", "\"CE1.1\", {\"nombre\": \"CE1.1\"");
        match load_config_from_str(&json) {
            Err(ConfigError::InvalidTree(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected invalid tree, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_find_explicit_missing_file() {
        let err = find_config_file(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, MINIMAL).unwrap();

        assert_eq!(find_config_file(Some(&path)).unwrap(), path);
        let config = load_config(&path).unwrap();
        assert_eq!(config.username, "teacher");
    }
}
