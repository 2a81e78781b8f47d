//! Starter file for `gradesync init`.

use std::path::Path;

use crate::config::schema::{ChildCategory, GradebookConfig, ItemEntry, ItemSpec, SyncSettings};
use crate::error::ConfigError;
use crate::tree::{AggregationMethod, GlobalGradeConfig, DEFAULT_ITEM_COEFFICIENT};

/// Environment variable the skeleton points `password_env` at.
pub const DEFAULT_PASSWORD_ENV: &str = "GRADESYNC_PASSWORD";

/// Values `gradesync init` fills into the starter file.
#[derive(Debug, Clone)]
pub struct SkeletonOptions {
    pub base_url: String,
    pub username: String,
    pub course_id: u64,
    pub parent_category: String,
}

impl Default for SkeletonOptions {
    fn default() -> Self {
        Self {
            base_url: "https://aules.edu.gva.es/fp".to_string(),
            username: "usuario".to_string(),
            course_id: 1,
            parent_category: "RA CE".to_string(),
        }
    }
}

fn criterion(name: &str) -> ItemEntry {
    ItemEntry::Detailed(ItemSpec {
        name: name.to_string(),
        aggregation_coefficient: DEFAULT_ITEM_COEFFICIENT,
        formula: None,
        id_number: None,
    })
}

fn outcome(name: &str, criteria: &[&str]) -> ChildCategory {
    ChildCategory {
        name: name.to_string(),
        aggregation_coefficient: 0.0,
        formula: None,
        items: criteria.iter().map(|c| criterion(c)).collect(),
    }
}

/// Two learning outcomes with two criteria each, weighted mean of grades,
/// graded out of 10 with a pass mark of 5.
pub fn skeleton(options: &SkeletonOptions) -> GradebookConfig {
    GradebookConfig {
        base_url: options.base_url.clone(),
        username: options.username.clone(),
        password: None,
        password_file: None,
        password_env: Some(DEFAULT_PASSWORD_ENV.to_string()),
        course_id: options.course_id,
        parent_category: options.parent_category.clone(),
        parent_coefficient: None,
        global: GlobalGradeConfig {
            aggregation: AggregationMethod::WeightedMean,
            only_graded: true,
            grade_max: 10.0,
            grade_pass: 5.0,
        },
        child_categories: vec![
            outcome(
                "RA1: [Descripción del primer resultado de aprendizaje]",
                &[
                    "CE1.1: [Primer criterio de evaluación]",
                    "CE1.2: [Segundo criterio de evaluación]",
                ],
            ),
            outcome(
                "RA2: [Descripción del segundo resultado de aprendizaje]",
                &[
                    "CE2.1: [Primer criterio de evaluación]",
                    "CE2.2: [Segundo criterio de evaluación]",
                ],
            ),
        ],
        sync: SyncSettings::default(),
    }
}

/// Writes the skeleton as pretty JSON. An existing file is only replaced
/// when `overwrite` is set.
pub fn write_skeleton(
    path: &Path,
    options: &SkeletonOptions,
    overwrite: bool,
) -> Result<GradebookConfig, ConfigError> {
    if path.exists() && !overwrite {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }

    let config = skeleton(options);
    let json = serde_json::to_string_pretty(&config)?;
    std::fs::write(path, json + "\n").map_err(|e| ConfigError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    log::info!("Wrote skeleton gradebook file to {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;

    #[test]
    fn test_skeleton_passes_validation() {
        let config = skeleton(&SkeletonOptions::default());
        let json = serde_json::to_string(&config).unwrap();
        let loaded = crate::config::load_config_from_str(&json).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.declared_tree().node_count(), 7);
    }

    #[test]
    fn test_write_skeleton_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("datos_aules.json");

        let options = SkeletonOptions {
            parent_category: "Evaluación".into(),
            course_id: 42,
            ..Default::default()
        };
        write_skeleton(&path, &options, false).unwrap();
        assert!(matches!(
            write_skeleton(&path, &options, false),
            Err(ConfigError::AlreadyExists(_))
        ));
        write_skeleton(&path, &options, true).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.course_id, 42);
        assert_eq!(loaded.parent_category, "Evaluación");
    }
}
