//! Declared and observed gradebook structure.
//!
//! The declared side (`DeclaredTree`, `GradeNode`) is parsed once from the
//! configuration file and never mutated afterwards. The observed side
//! (`ObservedEntity`, `ObservedSnapshot`) is a read-only snapshot of what the
//! remote gradebook showed at scrape time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Aggregation coefficient assumed for a category when none is declared.
pub const DEFAULT_CATEGORY_COEFFICIENT: f64 = 0.0;
/// Aggregation coefficient assumed for an item when none is declared.
pub const DEFAULT_ITEM_COEFFICIENT: f64 = 1.0;

/// The two kinds of gradebook entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Category,
    Item,
}

impl EntityKind {
    /// Coefficient used when the declaration leaves it out.
    pub fn default_coefficient(self) -> f64 {
        match self {
            EntityKind::Category => DEFAULT_CATEGORY_COEFFICIENT,
            EntityKind::Item => DEFAULT_ITEM_COEFFICIENT,
        }
    }

    /// Token prefix the gradebook uses for identifiers of this kind.
    pub fn id_prefix(self) -> &'static str {
        match self {
            EntityKind::Category => "cg",
            EntityKind::Item => "ig",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Category => write!(f, "category"),
            EntityKind::Item => write!(f, "item"),
        }
    }
}

/// Errors parsing a remote identifier token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteIdError {
    #[error("Unknown identifier prefix in '{0}' (expected 'cg' or 'ig')")]
    UnknownPrefix(String),

    #[error("Identifier '{0}' has no numeric suffix")]
    MissingNumber(String),
}

/// Remote identifier: a kind prefix plus the numeric id the gradebook assigned.
///
/// Category and item identifiers share a number space on the remote side but
/// are never interchangeable, so the kind travels with the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteId {
    kind: EntityKind,
    number: u64,
}

impl RemoteId {
    pub fn new(kind: EntityKind, number: u64) -> Self {
        Self { kind, number }
    }

    pub fn category(number: u64) -> Self {
        Self::new(EntityKind::Category, number)
    }

    pub fn item(number: u64) -> Self {
        Self::new(EntityKind::Item, number)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The bare number, as edit forms expect it.
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.id_prefix(), self.number)
    }
}

impl FromStr for RemoteId {
    type Err = RemoteIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let (kind, rest) = if let Some(rest) = token.strip_prefix("cg") {
            (EntityKind::Category, rest)
        } else if let Some(rest) = token.strip_prefix("ig") {
            (EntityKind::Item, rest)
        } else {
            return Err(RemoteIdError::UnknownPrefix(token.to_string()));
        };

        let number = rest
            .parse::<u64>()
            .map_err(|_| RemoteIdError::MissingNumber(token.to_string()))?;
        Ok(Self { kind, number })
    }
}

impl Serialize for RemoteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RemoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Aggregation methods with the gradebook's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationMethod {
    Mean,
    Median,
    Lowest,
    Highest,
    Mode,
    WeightedMean,
    SimpleWeightedMean,
    MeanWithExtraCredit,
    Natural,
}

/// An aggregation code the gradebook does not define.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown aggregation code {0} (expected one of 0, 2, 4, 6, 8, 10, 11, 12, 13)")]
pub struct UnknownAggregation(pub i64);

impl AggregationMethod {
    /// Every method, in the order the gradebook lists them.
    pub const ALL: [AggregationMethod; 9] = [
        AggregationMethod::Mean,
        AggregationMethod::WeightedMean,
        AggregationMethod::SimpleWeightedMean,
        AggregationMethod::MeanWithExtraCredit,
        AggregationMethod::Median,
        AggregationMethod::Lowest,
        AggregationMethod::Highest,
        AggregationMethod::Mode,
        AggregationMethod::Natural,
    ];

    /// Numeric code used in config files and forms.
    pub fn code(self) -> i64 {
        match self {
            AggregationMethod::Mean => 0,
            AggregationMethod::Median => 2,
            AggregationMethod::Lowest => 4,
            AggregationMethod::Highest => 6,
            AggregationMethod::Mode => 8,
            AggregationMethod::WeightedMean => 10,
            AggregationMethod::SimpleWeightedMean => 11,
            AggregationMethod::MeanWithExtraCredit => 12,
            AggregationMethod::Natural => 13,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AggregationMethod::Mean => "Mean of grades",
            AggregationMethod::Median => "Median of grades",
            AggregationMethod::Lowest => "Lowest grade",
            AggregationMethod::Highest => "Highest grade",
            AggregationMethod::Mode => "Mode of grades",
            AggregationMethod::WeightedMean => "Weighted mean of grades",
            AggregationMethod::SimpleWeightedMean => "Simple weighted mean of grades",
            AggregationMethod::MeanWithExtraCredit => "Mean of grades (with extra credits)",
            AggregationMethod::Natural => "Natural",
        }
    }
}

impl TryFrom<i64> for AggregationMethod {
    type Error = UnknownAggregation;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        AggregationMethod::ALL
            .into_iter()
            .find(|m| m.code() == code)
            .ok_or(UnknownAggregation(code))
    }
}

impl Serialize for AggregationMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for AggregationMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        AggregationMethod::try_from(code).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}

/// Grade settings applied to every category and item the tool writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalGradeConfig {
    #[serde(default = "default_aggregation")]
    pub aggregation: AggregationMethod,
    #[serde(rename = "aggregateonlygraded", default = "default_true")]
    pub only_graded: bool,
    #[serde(rename = "grademax", default = "default_grade_max")]
    pub grade_max: f64,
    #[serde(rename = "gradepass", default = "default_grade_pass")]
    pub grade_pass: f64,
}

fn default_aggregation() -> AggregationMethod {
    AggregationMethod::Mean
}

fn default_true() -> bool {
    true
}

fn default_grade_max() -> f64 {
    100.0
}

fn default_grade_pass() -> f64 {
    50.0
}

impl Default for GlobalGradeConfig {
    fn default() -> Self {
        Self {
            aggregation: default_aggregation(),
            only_graded: true,
            grade_max: default_grade_max(),
            grade_pass: default_grade_pass(),
        }
    }
}

/// A node of the declared tree.
#[derive(Debug, Clone, PartialEq)]
pub enum GradeNode {
    Category {
        name: String,
        aggregation_coefficient: f64,
        formula: Option<String>,
        children: Vec<GradeNode>,
    },
    Item {
        name: String,
        aggregation_coefficient: f64,
        formula: Option<String>,
        id_number: Option<String>,
    },
}

impl GradeNode {
    /// A category with default coefficient and no formula.
    pub fn category(name: impl Into<String>, children: Vec<GradeNode>) -> Self {
        GradeNode::Category {
            name: name.into(),
            aggregation_coefficient: DEFAULT_CATEGORY_COEFFICIENT,
            formula: None,
            children,
        }
    }

    /// An item with default coefficient, no formula and no idnumber.
    pub fn item(name: impl Into<String>) -> Self {
        GradeNode::Item {
            name: name.into(),
            aggregation_coefficient: DEFAULT_ITEM_COEFFICIENT,
            formula: None,
            id_number: None,
        }
    }

    /// Weight of this node inside its parent's aggregation.
    pub fn with_coefficient(mut self, value: f64) -> Self {
        match &mut self {
            GradeNode::Category {
                aggregation_coefficient,
                ..
            }
            | GradeNode::Item {
                aggregation_coefficient,
                ..
            } => *aggregation_coefficient = value,
        }
        self
    }

    pub fn with_formula(mut self, value: impl Into<String>) -> Self {
        match &mut self {
            GradeNode::Category { formula, .. } | GradeNode::Item { formula, .. } => {
                *formula = Some(value.into())
            }
        }
        self
    }

    /// Sets the external idnumber. No-op on categories.
    pub fn with_id_number(mut self, value: impl Into<String>) -> Self {
        if let GradeNode::Item { id_number, .. } = &mut self {
            *id_number = Some(value.into());
        }
        self
    }

    pub fn name(&self) -> &str {
        match self {
            GradeNode::Category { name, .. } | GradeNode::Item { name, .. } => name,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            GradeNode::Category { .. } => EntityKind::Category,
            GradeNode::Item { .. } => EntityKind::Item,
        }
    }

    pub fn aggregation_coefficient(&self) -> f64 {
        match self {
            GradeNode::Category {
                aggregation_coefficient,
                ..
            }
            | GradeNode::Item {
                aggregation_coefficient,
                ..
            } => *aggregation_coefficient,
        }
    }

    /// The declared formula, verbatim. `Some("")` means "no calculation".
    pub fn formula(&self) -> Option<&str> {
        match self {
            GradeNode::Category { formula, .. } | GradeNode::Item { formula, .. } => {
                formula.as_deref()
            }
        }
    }

    /// The declared formula when it actually computes something.
    pub fn effective_formula(&self) -> Option<&str> {
        self.formula().filter(|f| !f.trim().is_empty())
    }

    /// External idnumber; blank counts as none.
    pub fn id_number(&self) -> Option<&str> {
        match self {
            GradeNode::Item { id_number, .. } => id_number.as_deref().filter(|s| !s.is_empty()),
            GradeNode::Category { .. } => None,
        }
    }

    /// Children in declaration order; always empty for items.
    pub fn children(&self) -> &[GradeNode] {
        match self {
            GradeNode::Category { children, .. } => children,
            GradeNode::Item { .. } => &[],
        }
    }
}

/// The declared structure: a parent category owning an ordered list of
/// child categories, plus the grade settings applied to all of it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredTree {
    root: GradeNode,
    config: GlobalGradeConfig,
}

impl DeclaredTree {
    pub fn new(
        parent_name: impl Into<String>,
        children: Vec<GradeNode>,
        config: GlobalGradeConfig,
    ) -> Self {
        Self {
            root: GradeNode::category(parent_name, children),
            config,
        }
    }

    /// Sets the parent category's own weight inside its container.
    pub fn with_parent_coefficient(mut self, value: f64) -> Self {
        self.root = self.root.with_coefficient(value);
        self
    }

    pub fn parent_name(&self) -> &str {
        self.root.name()
    }

    /// The parent category as a node, so traversal can treat it uniformly.
    pub fn root(&self) -> &GradeNode {
        &self.root
    }

    pub fn children(&self) -> &[GradeNode] {
        self.root.children()
    }

    pub fn config(&self) -> &GlobalGradeConfig {
        &self.config
    }

    /// Number of declared nodes, parent category included.
    pub fn node_count(&self) -> usize {
        self.walk().count()
    }
}

/// One entity as scraped from the remote gradebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedEntity {
    pub remote_id: RemoteId,
    pub name: String,
    pub parent_id: Option<RemoteId>,
    pub depth: u32,
}

impl ObservedEntity {
    pub fn new(
        remote_id: RemoteId,
        name: impl Into<String>,
        parent_id: Option<RemoteId>,
        depth: u32,
    ) -> Self {
        Self {
            remote_id,
            name: name.into(),
            parent_id,
            depth,
        }
    }

    /// Derived from the identifier so the two can never disagree.
    pub fn kind(&self) -> EntityKind {
        self.remote_id.kind()
    }
}

/// A full scrape of the remote tree at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedSnapshot {
    entities: Vec<ObservedEntity>,
    taken_at: DateTime<Utc>,
}

impl ObservedSnapshot {
    pub fn new(entities: Vec<ObservedEntity>) -> Self {
        Self {
            entities,
            taken_at: Utc::now(),
        }
    }

    pub fn entities(&self) -> &[ObservedEntity] {
        &self.entities
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &RemoteId) -> Option<&ObservedEntity> {
        self.entities.iter().find(|e| &e.remote_id == id)
    }

    pub fn categories(&self) -> impl Iterator<Item = &ObservedEntity> {
        self.entities
            .iter()
            .filter(|e| e.kind() == EntityKind::Category)
    }

    /// Direct children of `parent`, in scrape order.
    pub fn children_of(&self, parent: RemoteId) -> impl Iterator<Item = &ObservedEntity> + '_ {
        self.entities
            .iter()
            .filter(move |e| e.parent_id == Some(parent))
    }
}
