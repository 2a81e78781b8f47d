//! Structural checks on a declared tree, run before any plan is built.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::model::{DeclaredTree, EntityKind, GlobalGradeConfig, GradeNode};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Parent category name is empty")]
    EmptyParentName,

    #[error("A {kind} under '{parent}' has an empty name")]
    EmptyName { kind: EntityKind, parent: String },

    #[error("'{parent}' declares more than one child named '{name}'")]
    DuplicateSibling { parent: String, name: String },

    #[error("{kind} '{name}' has invalid aggregation coefficient {value} (must be a non-negative number)")]
    InvalidCoefficient {
        kind: EntityKind,
        name: String,
        value: f64,
    },

    #[error("idnumber '{id_number}' is used by both '{first}' and '{second}'")]
    DuplicateIdNumber {
        id_number: String,
        first: String,
        second: String,
    },

    #[error("Grade to pass {grade_pass} exceeds maximum grade {grade_max}")]
    GradePassAboveMax { grade_pass: f64, grade_max: f64 },
}

/// Validator for declared trees. Collects every problem instead of stopping
/// at the first one.
#[derive(Default)]
pub struct TreeValidator {
    errors: Vec<ValidationError>,
}

impl TreeValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the whole tree and returns the collected errors.
    pub fn validate(mut self, tree: &DeclaredTree) -> Vec<ValidationError> {
        if tree.parent_name().trim().is_empty() {
            self.errors.push(ValidationError::EmptyParentName);
        }

        self.validate_config(tree.config());

        // Sibling names and coefficients, level by level.
        for entry in tree.walk() {
            self.validate_coefficient(entry.node);
            self.validate_siblings(entry.node);
        }

        self.validate_id_numbers(tree);
        self.errors
    }

    fn validate_config(&mut self, config: &GlobalGradeConfig) {
        if config.grade_pass > config.grade_max {
            self.errors.push(ValidationError::GradePassAboveMax {
                grade_pass: config.grade_pass,
                grade_max: config.grade_max,
            });
        }
    }

    fn validate_coefficient(&mut self, node: &GradeNode) {
        let value = node.aggregation_coefficient();
        if !value.is_finite() || value < 0.0 {
            self.errors.push(ValidationError::InvalidCoefficient {
                kind: node.kind(),
                name: node.name().to_string(),
                value,
            });
        }
    }

    fn validate_siblings(&mut self, parent: &GradeNode) {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for child in parent.children() {
            let name = child.name();
            if name.trim().is_empty() {
                self.errors.push(ValidationError::EmptyName {
                    kind: child.kind(),
                    parent: parent.name().to_string(),
                });
                continue;
            }
            if !seen.insert(name) && reported.insert(name) {
                self.errors.push(ValidationError::DuplicateSibling {
                    parent: parent.name().to_string(),
                    name: name.to_string(),
                });
            }
        }
    }

    fn validate_id_numbers(&mut self, tree: &DeclaredTree) {
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for entry in tree.walk() {
            let Some(id_number) = entry.node.id_number() else {
                continue;
            };
            match owners.get(id_number) {
                Some(first) => self.errors.push(ValidationError::DuplicateIdNumber {
                    id_number: id_number.to_string(),
                    first: first.to_string(),
                    second: entry.node.name().to_string(),
                }),
                None => {
                    owners.insert(id_number, entry.node.name());
                }
            }
        }
    }
}

/// Returns every rule violation in `tree`; an empty list means the tree is
/// safe to plan against.
pub fn validate(tree: &DeclaredTree) -> Vec<ValidationError> {
    TreeValidator::new().validate(tree)
}
