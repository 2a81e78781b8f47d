//! Remote gradebook access: the client capability the engine drives, the
//! session it runs under, and the HTTP implementation for Moodle-style
//! gradebooks.

mod error;
pub mod forms;
pub mod html;
pub mod markers;
mod moodle;
mod session;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tree::{GlobalGradeConfig, ObservedEntity, RemoteId};

pub use error::{RemoteError, Result};
pub use moodle::MoodleClient;
pub use session::{MoodleSessionProvider, Session, SessionProvider};

/// Course whose gradebook is being reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub u64);

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settings written by a category update.
#[derive(Debug, Clone, Copy)]
pub struct CategoryUpdate<'a> {
    pub name: &'a str,
    pub aggregation_coefficient: f64,
}

/// Settings written by an item update.
#[derive(Debug, Clone, Copy)]
pub struct ItemUpdate<'a> {
    pub name: &'a str,
    pub id_number: Option<&'a str>,
    pub aggregation_coefficient: f64,
}

/// The operations the reconciliation engine needs from a gradebook.
///
/// Every call takes the session explicitly; the client itself holds no
/// credentials. Creates return nothing because the gradebook does not hand
/// back the new identifier; callers resolve it by re-scraping.
#[async_trait]
pub trait GradebookClient: Send + Sync {
    async fn fetch_tree(&self, session: &Session, course: CourseId) -> Result<Vec<ObservedEntity>>;

    async fn create_category(
        &self,
        session: &Session,
        course: CourseId,
        name: &str,
        parent: Option<RemoteId>,
        config: &GlobalGradeConfig,
    ) -> Result<()>;

    async fn create_item(
        &self,
        session: &Session,
        course: CourseId,
        name: &str,
        parent: RemoteId,
        config: &GlobalGradeConfig,
        id_number: Option<&str>,
    ) -> Result<()>;

    async fn update_category(
        &self,
        session: &Session,
        course: CourseId,
        id: RemoteId,
        update: CategoryUpdate<'_>,
        config: &GlobalGradeConfig,
    ) -> Result<()>;

    async fn update_item(
        &self,
        session: &Session,
        course: CourseId,
        id: RemoteId,
        update: ItemUpdate<'_>,
        config: &GlobalGradeConfig,
    ) -> Result<()>;

    /// Sets or clears (empty `formula`) the calculation of `id`.
    async fn set_formula(
        &self,
        session: &Session,
        course: CourseId,
        id: RemoteId,
        formula: &str,
    ) -> Result<()>;

    async fn delete_entity(&self, session: &Session, course: CourseId, id: RemoteId)
        -> Result<()>;
}
