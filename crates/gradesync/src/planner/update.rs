use std::collections::HashSet;

use crate::resolver::{ResolutionFailure, Resolver};
use crate::scope::descendants;
use crate::tree::{
    validate, DeclaredTree, EntityKind, GradeNode, ObservedEntity, ObservedSnapshot, RemoteId,
    ValidationError,
};

use super::{Action, ActionPlan, Intent, Target, UnresolvedNode, UnresolvedReason};

/// Builds the plan that pushes declared settings onto existing entities.
///
/// Every declared node, the parent category included, gets an update
/// carrying its coefficient plus a formula action carrying its formula (an
/// empty one clears the calculation). Nodes are resolved under their
/// resolved parent first, then anywhere below the parent category. Nodes
/// that cannot be resolved, and everything below them, are listed as
/// unresolved instead.
pub fn plan_update(
    tree: &DeclaredTree,
    observed: &ObservedSnapshot,
    resolver: &Resolver,
) -> Result<ActionPlan, Vec<ValidationError>> {
    let errors = validate(tree);
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut planner = UpdatePlanner {
        observed,
        resolver,
        plan: ActionPlan::new(Intent::Update, tree.config().clone()),
        claimed: HashSet::new(),
        subtree: Vec::new(),
    };

    match resolver.resolve(EntityKind::Category, tree.parent_name(), observed.entities()) {
        Ok(root) => {
            planner.subtree = descendants(observed, root.id)
                .into_iter()
                .map(|(entity, _)| entity.clone())
                .collect();
            planner.claimed.insert(root.id);
            planner.visit(tree.root(), root.id);
        }
        Err(failure) => planner.unresolved_subtree(tree.root(), failure),
    }

    log::debug!(
        "Update plan for '{}': {} actions, {} unresolved",
        tree.parent_name(),
        planner.plan.len(),
        planner.plan.unresolved().len()
    );
    Ok(planner.plan)
}

struct UpdatePlanner<'a> {
    observed: &'a ObservedSnapshot,
    resolver: &'a Resolver,
    plan: ActionPlan,
    claimed: HashSet<RemoteId>,
    /// Everything below the parent category, for the second lookup pass.
    subtree: Vec<ObservedEntity>,
}

impl UpdatePlanner<'_> {
    fn visit(&mut self, node: &GradeNode, id: RemoteId) {
        let update = match node {
            GradeNode::Category {
                name,
                aggregation_coefficient,
                ..
            } => Action::UpdateCategory {
                id,
                name: name.clone(),
                aggregation_coefficient: *aggregation_coefficient,
            },
            GradeNode::Item {
                name,
                aggregation_coefficient,
                ..
            } => Action::UpdateItem {
                id,
                name: name.clone(),
                aggregation_coefficient: *aggregation_coefficient,
                id_number: node.id_number().map(str::to_string),
            },
        };
        self.plan.push(update, None);
        self.plan.push(
            Action::SetFormula {
                target: Target::Existing { id },
                kind: node.kind(),
                name: node.name().to_string(),
                formula: node.effective_formula().unwrap_or_default().to_string(),
            },
            None,
        );

        for child in node.children() {
            match self.resolve_child(child, id) {
                Ok(child_id) => {
                    self.claimed.insert(child_id);
                    self.visit(child, child_id);
                }
                Err(failure) => self.unresolved_subtree(child, failure),
            }
        }
    }

    fn resolve_child(&self, child: &GradeNode, parent: RemoteId) -> Result<RemoteId, ResolutionFailure> {
        let direct: Vec<ObservedEntity> = self.observed.children_of(parent).cloned().collect();
        let first = self
            .resolver
            .resolve_excluding(child.kind(), child.name(), &direct, &self.claimed);
        match first {
            Err(ResolutionFailure::NotFound { .. }) => self
                .resolver
                .resolve_excluding(child.kind(), child.name(), &self.subtree, &self.claimed)
                .map(|found| found.id),
            other => other.map(|found| found.id),
        }
    }

    fn unresolved_subtree(&mut self, node: &GradeNode, failure: ResolutionFailure) {
        log::warn!("Cannot update {} '{}': {}", node.kind(), node.name(), failure);
        self.plan.push_unresolved(UnresolvedNode {
            kind: node.kind(),
            name: node.name().to_string(),
            reason: UnresolvedReason::Resolution { failure },
        });
        self.unresolved_children(node);
    }

    fn unresolved_children(&mut self, parent: &GradeNode) {
        for child in parent.children() {
            self.plan.push_unresolved(UnresolvedNode {
                kind: child.kind(),
                name: child.name().to_string(),
                reason: UnresolvedReason::ParentUnresolved {
                    parent: parent.name().to_string(),
                },
            });
            self.unresolved_children(child);
        }
    }
}
