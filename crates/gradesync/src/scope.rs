//! Deletion scope: everything below a category, ordered so the gradebook
//! never sees a delete for a category that still has children.

use std::collections::{HashSet, VecDeque};

use crate::planner::{Action, ActionPlan, Intent};
use crate::resolver::{ResolutionFailure, Resolver};
use crate::tree::{EntityKind, GlobalGradeConfig, ObservedEntity, ObservedSnapshot, RemoteId};

/// Breadth-first closure below `root`, each entity paired with its distance
/// from `root` (children are 1). Each entity appears once; parent cycles in
/// malformed markup are cut.
pub fn descendants(snapshot: &ObservedSnapshot, root: RemoteId) -> Vec<(&ObservedEntity, u32)> {
    let mut seen: HashSet<RemoteId> = HashSet::from([root]);
    let mut queue = VecDeque::from([(root, 0u32)]);
    let mut found = Vec::new();

    while let Some((parent, distance)) = queue.pop_front() {
        for child in snapshot.children_of(parent) {
            if !seen.insert(child.remote_id) {
                continue;
            }
            found.push((child, distance + 1));
            if child.kind() == EntityKind::Category {
                queue.push_back((child.remote_id, distance + 1));
            }
        }
    }
    found
}

/// The entities removed by deleting one category.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionScope {
    pub target: ObservedEntity,
    /// Every item below the target.
    pub items: Vec<ObservedEntity>,
    /// Every category below the target, deepest first, then the target.
    pub categories: Vec<ObservedEntity>,
}

impl DeletionScope {
    /// Items first, then categories deepest first.
    pub fn ordered(&self) -> impl Iterator<Item = &ObservedEntity> {
        self.items.iter().chain(self.categories.iter())
    }

    pub fn len(&self) -> usize {
        self.items.len() + self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves `target_name` to a category and collects what lies below it.
pub fn find_deletion_scope(
    snapshot: &ObservedSnapshot,
    target_name: &str,
    resolver: &Resolver,
) -> Result<DeletionScope, ResolutionFailure> {
    let target = resolver.resolve(EntityKind::Category, target_name, snapshot.entities())?;
    let target = snapshot
        .get(&target.id)
        .cloned()
        .ok_or_else(|| ResolutionFailure::NotFound {
            kind: EntityKind::Category,
            name: target_name.to_string(),
        })?;

    let mut items = Vec::new();
    let mut categories = Vec::new();
    for (entity, distance) in descendants(snapshot, target.remote_id) {
        match entity.kind() {
            EntityKind::Item => items.push(entity.clone()),
            EntityKind::Category => categories.push((entity.clone(), distance)),
        }
    }

    // Distance from the target orders strictly by ancestry even when the
    // scraped depth classes are missing or inconsistent. Stable sort keeps
    // scrape order among equals.
    categories.sort_by(|a, b| b.1.cmp(&a.1));
    let mut categories: Vec<ObservedEntity> = categories.into_iter().map(|(e, _)| e).collect();
    categories.push(target.clone());

    log::debug!(
        "Deletion scope of '{}' ({}): {} items, {} categories",
        target.name,
        target.remote_id,
        items.len(),
        categories.len()
    );

    Ok(DeletionScope {
        target,
        items,
        categories,
    })
}

/// Turns a scope into a delete plan, one independent action per entity.
pub fn plan_delete(scope: &DeletionScope) -> ActionPlan {
    let mut plan = ActionPlan::new(Intent::Delete, GlobalGradeConfig::default());
    for entity in scope.ordered() {
        plan.push(
            Action::DeleteEntity {
                id: entity.remote_id,
                name: entity.name.clone(),
            },
            None,
        );
    }
    plan
}
