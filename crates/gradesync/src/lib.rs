//! Reconciles a declared tree of grade categories and items against a
//! Moodle-style gradebook.
//!
//! The flow is: load a [`GradebookConfig`], turn it into a [`DeclaredTree`],
//! build an [`ActionPlan`] (create, update or delete), then hand the plan to a
//! [`PlanExecutor`] which drives a [`GradebookClient`] and returns an
//! [`ExecutionReport`].

pub mod config;
pub mod error;
pub mod executor;
pub mod planner;
pub mod remote;
pub mod resolver;
pub mod sanitize;
pub mod scope;
pub mod secrets;
pub mod tree;

pub use config::{load_config, load_config_from_str, GradebookConfig};
pub use error::{ConfigError, GradesyncError, Result};
pub use executor::{
    ExecutionEvent, ExecutionObserver, ExecutionReport, NoopObserver, PlanExecutor,
};
pub use planner::{plan_create, plan_update, Action, ActionPlan, Intent, PlannedAction};
pub use remote::{
    CourseId, GradebookClient, MoodleClient, MoodleSessionProvider, RemoteError, Session,
    SessionProvider,
};
pub use resolver::{ResolutionFailure, Resolver, RetryPolicy, RetryingResolver};
pub use scope::{find_deletion_scope, plan_delete, DeletionScope};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use tree::{DeclaredTree, GradeNode, ObservedSnapshot, RemoteId};
