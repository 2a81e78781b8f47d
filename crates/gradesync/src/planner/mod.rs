//! Reconciliation planning: turning a declared tree (and, for updates, an
//! observed snapshot) into an ordered list of remote actions.

mod create;
mod update;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resolver::ResolutionFailure;
use crate::tree::{EntityKind, GlobalGradeConfig, RemoteId};

pub use create::plan_create;
pub use update::plan_update;

/// What a run is meant to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Create => write!(f, "create"),
            Intent::Update => write!(f, "update"),
            Intent::Delete => write!(f, "delete"),
        }
    }
}

/// Position of an action in its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ActionId(pub usize);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an action's entity lives (or which entity it targets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    /// Top of the course gradebook.
    CourseRoot,
    /// An entity whose identifier is already known.
    Existing { id: RemoteId },
    /// The entity created by an earlier action of the same plan.
    Created { by: ActionId },
}

/// One change to apply to the gradebook.
///
/// Creates name their parent through a [`Target`], so a child can point at
/// a category that only exists once an earlier action has run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    CreateCategory {
        name: String,
        parent: Target,
        aggregation_coefficient: f64,
    },
    CreateItem {
        name: String,
        parent: Target,
        aggregation_coefficient: f64,
        id_number: Option<String>,
    },
    UpdateCategory {
        id: RemoteId,
        name: String,
        aggregation_coefficient: f64,
    },
    UpdateItem {
        id: RemoteId,
        name: String,
        aggregation_coefficient: f64,
        id_number: Option<String>,
    },
    /// An empty formula clears the calculation.
    SetFormula {
        target: Target,
        kind: EntityKind,
        name: String,
        formula: String,
    },
    DeleteEntity {
        id: RemoteId,
        name: String,
    },
}

/// [`Action`] without its payload, for counting and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateCategory,
    CreateItem,
    UpdateCategory,
    UpdateItem,
    SetFormula,
    DeleteEntity,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::CreateCategory => "create category",
            ActionKind::CreateItem => "create item",
            ActionKind::UpdateCategory => "update category",
            ActionKind::UpdateItem => "update item",
            ActionKind::SetFormula => "set formula",
            ActionKind::DeleteEntity => "delete",
        };
        f.write_str(label)
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::CreateCategory { .. } => ActionKind::CreateCategory,
            Action::CreateItem { .. } => ActionKind::CreateItem,
            Action::UpdateCategory { .. } => ActionKind::UpdateCategory,
            Action::UpdateItem { .. } => ActionKind::UpdateItem,
            Action::SetFormula { .. } => ActionKind::SetFormula,
            Action::DeleteEntity { .. } => ActionKind::DeleteEntity,
        }
    }

    /// Name of the entity the action touches.
    pub fn entity_name(&self) -> &str {
        match self {
            Action::CreateCategory { name, .. }
            | Action::CreateItem { name, .. }
            | Action::UpdateCategory { name, .. }
            | Action::UpdateItem { name, .. }
            | Action::SetFormula { name, .. }
            | Action::DeleteEntity { name, .. } => name,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::DeleteEntity { id, name } => write!(f, "delete '{}' ({})", name, id),
            Action::UpdateCategory { id, name, .. } | Action::UpdateItem { id, name, .. } => {
                write!(f, "{} '{}' ({})", self.kind(), name, id)
            }
            Action::SetFormula { name, formula, .. } if formula.is_empty() => {
                write!(f, "clear formula of '{}'", name)
            }
            Action::SetFormula { name, formula, .. } => {
                write!(f, "set formula of '{}' to {}", name, formula)
            }
            _ => write!(f, "{} '{}'", self.kind(), self.entity_name()),
        }
    }
}

/// An action with its place in the plan and the action it waits on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedAction {
    pub id: ActionId,
    #[serde(flatten)]
    pub action: Action,
    /// The earlier action whose outcome this one needs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<ActionId>,
}

/// Why a declared node got no action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnresolvedReason {
    Resolution { failure: ResolutionFailure },
    ParentUnresolved { parent: String },
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::Resolution { failure } => write!(f, "{}", failure),
            UnresolvedReason::ParentUnresolved { parent } => {
                write!(f, "parent '{}' could not be resolved", parent)
            }
        }
    }
}

/// A declared node the planner could not map to a remote entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedNode {
    pub kind: EntityKind,
    pub name: String,
    pub reason: UnresolvedReason,
}

/// Ordered actions for one run, plus the declared nodes left out of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionPlan {
    intent: Intent,
    config: GlobalGradeConfig,
    actions: Vec<PlannedAction>,
    unresolved: Vec<UnresolvedNode>,
}

impl ActionPlan {
    pub fn new(intent: Intent, config: GlobalGradeConfig) -> Self {
        Self {
            intent,
            config,
            actions: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    /// Appends an action and returns its id.
    pub fn push(&mut self, action: Action, depends_on: Option<ActionId>) -> ActionId {
        let id = ActionId(self.actions.len());
        self.actions.push(PlannedAction {
            id,
            action,
            depends_on,
        });
        id
    }

    /// Records a declared node the plan could not place.
    pub fn push_unresolved(&mut self, node: UnresolvedNode) {
        self.unresolved.push(node);
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// Grade settings sent with creates and updates.
    pub fn config(&self) -> &GlobalGradeConfig {
        &self.config
    }

    pub fn actions(&self) -> &[PlannedAction] {
        &self.actions
    }

    /// Declared nodes left out of the plan, with the reason.
    pub fn unresolved(&self) -> &[UnresolvedNode] {
        &self.unresolved
    }

    pub fn get(&self, id: ActionId) -> Option<&PlannedAction> {
        self.actions.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// True when `earlier` must run before `later`, directly or through a
    /// chain of dependencies.
    pub fn precedes(&self, earlier: ActionId, later: ActionId) -> bool {
        let mut current = self.get(later).and_then(|a| a.depends_on);
        while let Some(dep) = current {
            if dep == earlier {
                return true;
            }
            current = self.get(dep).and_then(|a| a.depends_on);
        }
        false
    }

    pub fn count_by_kind(&self) -> BTreeMap<ActionKind, usize> {
        let mut counts = BTreeMap::new();
        for planned in &self.actions {
            *counts.entry(planned.action.kind()).or_insert(0) += 1;
        }
        counts
    }
}
