//! Builders for declared trees, observed snapshots and executors.

#![allow(dead_code)]

use std::time::Duration;

use gradesync::executor::PlanExecutor;
use gradesync::remote::{CourseId, GradebookClient, Session};
use gradesync::resolver::{NoDelay, Resolver, RetryPolicy, RetryingResolver};
use gradesync::tree::{
    AggregationMethod, DeclaredTree, GlobalGradeConfig, GradeNode, ObservedEntity, RemoteId,
};

pub const COURSE: CourseId = CourseId(4321);

/// Lookups made for each created entity by [`fast_executor`].
pub const RESOLVE_ATTEMPTS: u32 = 3;

/// Builder for declared trees.
pub struct TreeBuilder {
    parent: String,
    children: Vec<GradeNode>,
    config: GlobalGradeConfig,
}

impl TreeBuilder {
    pub fn new(parent: &str) -> Self {
        Self {
            parent: parent.to_string(),
            children: Vec::new(),
            config: GlobalGradeConfig {
                aggregation: AggregationMethod::WeightedMean,
                only_graded: true,
                grade_max: 10.0,
                grade_pass: 5.0,
            },
        }
    }

    /// Adds a child category holding plain items.
    pub fn category(mut self, name: &str, items: &[&str]) -> Self {
        let children = items.iter().map(|item| GradeNode::item(*item)).collect();
        self.children.push(GradeNode::category(name, children));
        self
    }

    pub fn node(mut self, node: GradeNode) -> Self {
        self.children.push(node);
        self
    }

    pub fn config(mut self, config: GlobalGradeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> DeclaredTree {
        DeclaredTree::new(self.parent, self.children, self.config)
    }
}

/// `RA { RA1 { CE1.1, CE1.2 } }`.
pub fn ra_tree() -> DeclaredTree {
    TreeBuilder::new("RA")
        .category("RA1", &["CE1.1", "CE1.2"])
        .build()
}

/// Builder for observed entities. Depths follow the parent chain.
#[derive(Default)]
pub struct RemoteBuilder {
    entities: Vec<ObservedEntity>,
}

impl RemoteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, number: u64, name: &str, parent: Option<u64>) -> Self {
        let parent = parent.map(RemoteId::category);
        let depth = self.depth_under(parent);
        self.entities.push(ObservedEntity::new(
            RemoteId::category(number),
            name,
            parent,
            depth,
        ));
        self
    }

    pub fn item(mut self, number: u64, name: &str, parent: u64) -> Self {
        let parent = Some(RemoteId::category(parent));
        let depth = self.depth_under(parent);
        self.entities
            .push(ObservedEntity::new(RemoteId::item(number), name, parent, depth));
        self
    }

    fn depth_under(&self, parent: Option<RemoteId>) -> u32 {
        parent
            .and_then(|p| self.entities.iter().find(|e| e.remote_id == p))
            .map(|p| p.depth + 1)
            .unwrap_or(1)
    }

    pub fn build(self) -> Vec<ObservedEntity> {
        self.entities
    }
}

/// The remote state matching [`ra_tree`], plus an unrelated category.
pub fn ra_remote() -> Vec<ObservedEntity> {
    RemoteBuilder::new()
        .category(1, "RA", None)
        .category(2, "RA1", Some(1))
        .item(3, "CE1.1", 2)
        .item(4, "CE1.2", 2)
        .category(5, "Other", None)
        .item(6, "Attendance", 5)
        .build()
}

/// An executor that never sleeps.
pub fn fast_executor<'a>(client: &'a dyn GradebookClient) -> PlanExecutor<'a> {
    PlanExecutor::new(client, Session::new("initial"), COURSE)
        .with_resolver(RetryingResolver::new(
            Resolver::default(),
            RetryPolicy::immediate(RESOLVE_ATTEMPTS - 1),
        ))
        .with_delay(Box::new(NoDelay))
        .with_pacing(Duration::ZERO)
}
