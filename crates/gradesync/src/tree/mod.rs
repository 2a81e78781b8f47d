//! Tree model: declared structure, observed remote entities, traversal and
//! validation.

mod model;
mod validation;
mod walk;

pub use model::{
    AggregationMethod, DeclaredTree, EntityKind, GlobalGradeConfig, GradeNode, ObservedEntity,
    ObservedSnapshot, RemoteId, RemoteIdError, UnknownAggregation, DEFAULT_CATEGORY_COEFFICIENT,
    DEFAULT_ITEM_COEFFICIENT,
};
pub use validation::{validate, TreeValidator, ValidationError};
pub use walk::{Walk, WalkEntry};
