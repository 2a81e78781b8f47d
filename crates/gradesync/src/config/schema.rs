//! Typed form of the declared gradebook file.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::resolver::{AmbiguityPolicy, RetryPolicy};
use crate::secrets::{resolve_secret, SecretError};
use crate::tree::{
    DeclaredTree, EntityKind, GlobalGradeConfig, GradeNode, DEFAULT_CATEGORY_COEFFICIENT,
    DEFAULT_ITEM_COEFFICIENT,
};

/// The declared gradebook file: connection settings plus the tree to
/// reconcile. Tree keys keep the Spanish names existing files already use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradebookConfig {
    pub base_url: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
    pub course_id: u64,

    #[serde(rename = "categoria_padre")]
    pub parent_category: String,
    /// Weight of the parent category inside the course; the category
    /// default when absent.
    #[serde(rename = "aggregationcoef", default, skip_serializing_if = "Option::is_none")]
    pub parent_coefficient: Option<f64>,
    #[serde(rename = "configuracion_global", default)]
    pub global: GlobalGradeConfig,
    #[serde(rename = "categorias_hijas", default)]
    pub child_categories: Vec<ChildCategory>,

    #[serde(default)]
    pub sync: SyncSettings,
}

/// One entry of `categorias_hijas`: a category directly under the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildCategory {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "aggregationcoef", default = "default_category_coefficient")]
    pub aggregation_coefficient: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(rename = "elementos", default)]
    pub items: Vec<ItemEntry>,
}

/// A grade item: either just its name or a full object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemEntry {
    Name(String),
    Detailed(ItemSpec),
}

/// The object form of an `elementos` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "aggregationcoef", default = "default_item_coefficient")]
    pub aggregation_coefficient: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(rename = "idnumber", default, skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
}

fn default_category_coefficient() -> f64 {
    DEFAULT_CATEGORY_COEFFICIENT
}

fn default_item_coefficient() -> f64 {
    DEFAULT_ITEM_COEFFICIENT
}

/// Timing and matching knobs for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default = "default_initial_delay_ms")]
    pub resolve_initial_delay_ms: u64,
    #[serde(default = "default_resolve_attempts")]
    pub resolve_attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub resolve_interval_ms: u64,
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,
}

fn default_initial_delay_ms() -> u64 {
    2000
}

fn default_resolve_attempts() -> u32 {
    3
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_pacing_ms() -> u64 {
    500
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            resolve_initial_delay_ms: default_initial_delay_ms(),
            resolve_attempts: default_resolve_attempts(),
            resolve_interval_ms: default_interval_ms(),
            pacing_ms: default_pacing_ms(),
            ambiguity: AmbiguityPolicy::default(),
        }
    }
}

impl SyncSettings {
    /// Wait schedule for finding a freshly created entity.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(self.resolve_initial_delay_ms),
            attempts: self.resolve_attempts,
            interval: Duration::from_millis(self.resolve_interval_ms),
            multiplier: 1,
        }
    }

    /// Pause between bulk item creates and deletes.
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl ItemEntry {
    pub fn name(&self) -> &str {
        match self {
            ItemEntry::Name(name) => name,
            ItemEntry::Detailed(spec) => &spec.name,
        }
    }

    fn to_node(&self) -> GradeNode {
        match self {
            ItemEntry::Name(name) => GradeNode::item(name.clone()),
            ItemEntry::Detailed(spec) => GradeNode::Item {
                name: spec.name.clone(),
                aggregation_coefficient: spec.aggregation_coefficient,
                formula: spec.formula.clone(),
                id_number: spec.id_number.clone(),
            },
        }
    }
}

impl ChildCategory {
    fn to_node(&self) -> GradeNode {
        GradeNode::Category {
            name: self.name.clone(),
            aggregation_coefficient: self.aggregation_coefficient,
            formula: self.formula.clone(),
            children: self.items.iter().map(ItemEntry::to_node).collect(),
        }
    }
}

impl GradebookConfig {
    /// The declared tree described by this file.
    pub fn declared_tree(&self) -> DeclaredTree {
        let tree = DeclaredTree::new(
            self.parent_category.clone(),
            self.child_categories
                .iter()
                .map(ChildCategory::to_node)
                .collect(),
            self.global.clone(),
        );
        let coefficient = self
            .parent_coefficient
            .unwrap_or_else(|| EntityKind::Category.default_coefficient());
        tree.with_parent_coefficient(coefficient)
    }

    /// Resolves the password from the file, a secret file or the environment.
    pub fn password(&self) -> Result<SecretString, SecretError> {
        resolve_secret(
            self.password.as_deref(),
            self.password_file.as_deref(),
            self.password_env.as_deref(),
        )
    }

    /// True when any of the three password keys is set.
    pub fn has_password_source(&self) -> bool {
        [&self.password, &self.password_file, &self.password_env]
            .iter()
            .any(|source| source.as_deref().is_some_and(|s| !s.is_empty()))
    }
}
