//! In-memory gradebook used by the reconciliation tests.
//!
//! Creates assign fresh identifiers, updates rewrite names and settings,
//! and deletes refuse non-empty categories the way the real gradebook does.
//! Faults can be queued or attached to a specific call.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::ExposeSecret;

use gradesync::executor::{ActionStatus, ExecutionEvent, ExecutionObserver};
use gradesync::remote::{
    CategoryUpdate, CourseId, GradebookClient, ItemUpdate, RemoteError, Result, Session,
    SessionProvider,
};
use gradesync::tree::{EntityKind, GlobalGradeConfig, ObservedEntity, RemoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Looks like an expired session.
    Transport,
    /// The gradebook refuses the request.
    Operation,
}

impl Fault {
    fn into_error(self, what: &str) -> RemoteError {
        match self {
            Fault::Transport => RemoteError::SessionExpired(what.to_string()),
            Fault::Operation => RemoteError::Operation(format!("{} refused", what)),
        }
    }
}

#[derive(Default)]
struct MockState {
    entities: Vec<ObservedEntity>,
    next_number: u64,
    hidden: HashSet<String>,
    queued_faults: VecDeque<Fault>,
    call_faults: HashMap<String, Fault>,
    formulas: HashMap<RemoteId, String>,
    coefficients: HashMap<RemoteId, f64>,
    id_numbers: HashMap<RemoteId, String>,
    calls: Vec<String>,
    sesskeys: Vec<String>,
    fetches: usize,
}

#[derive(Default)]
pub struct MockGradebook {
    state: Mutex<MockState>,
}

impl MockGradebook {
    pub fn new() -> Self {
        Self::with_entities(Vec::new())
    }

    pub fn with_entities(entities: Vec<ObservedEntity>) -> Self {
        let next_number = entities
            .iter()
            .map(|e| e.remote_id.number())
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            state: Mutex::new(MockState {
                entities,
                next_number,
                ..Default::default()
            }),
        }
    }

    /// Entities with this name are created but never show up in scrapes.
    pub fn hide(&self, name: &str) {
        self.state.lock().unwrap().hidden.insert(name.to_string());
    }

    /// Fails the next mutating calls, in order.
    pub fn queue_faults(&self, faults: &[Fault]) {
        self.state.lock().unwrap().queued_faults.extend(faults);
    }

    /// Fails one kind of call for one entity, e.g. `("update_category", "RA1")`.
    pub fn fail_call(&self, call: &str, name: &str, fault: Fault) {
        self.state
            .lock()
            .unwrap()
            .call_faults
            .insert(format!("{} {}", call, name), fault);
    }

    pub fn entities(&self) -> Vec<ObservedEntity> {
        self.state.lock().unwrap().entities.clone()
    }

    pub fn find(&self, name: &str) -> Option<ObservedEntity> {
        self.entities().into_iter().find(|e| e.name == name)
    }

    pub fn formula_of(&self, name: &str) -> Option<String> {
        let id = self.find(name)?.remote_id;
        self.state.lock().unwrap().formulas.get(&id).cloned()
    }

    pub fn coefficient_of(&self, name: &str) -> Option<f64> {
        let id = self.find(name)?.remote_id;
        self.state.lock().unwrap().coefficients.get(&id).copied()
    }

    pub fn id_number_of(&self, name: &str) -> Option<String> {
        let id = self.find(name)?.remote_id;
        self.state.lock().unwrap().id_numbers.get(&id).cloned()
    }

    pub fn set_formula_directly(&self, name: &str, formula: &str) {
        if let Some(entity) = self.find(name) {
            self.state
                .lock()
                .unwrap()
                .formulas
                .insert(entity.remote_id, formula.to_string());
        }
    }

    /// Mutating calls in order, as `"<call> <name or id>"`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Session keys seen by mutating calls, in order.
    pub fn sesskeys(&self) -> Vec<String> {
        self.state.lock().unwrap().sesskeys.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    /// Records the call and returns the fault to raise, if any.
    fn enter(&self, session: &Session, call: &str, subject: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let key = format!("{} {}", call, subject);
        state.calls.push(key.clone());
        state
            .sesskeys
            .push(session.sesskey().expose_secret().to_string());

        if let Some(fault) = state.queued_faults.pop_front() {
            return Err(fault.into_error(&key));
        }
        if let Some(fault) = state.call_faults.get(&key).copied() {
            return Err(fault.into_error(&key));
        }
        Ok(())
    }

    fn insert(&self, kind: EntityKind, name: &str, parent: Option<RemoteId>) -> RemoteId {
        let mut state = self.state.lock().unwrap();
        let depth = parent
            .and_then(|p| state.entities.iter().find(|e| e.remote_id == p))
            .map(|p| p.depth + 1)
            .unwrap_or(1);
        let id = RemoteId::new(kind, state.next_number);
        state.next_number += 1;
        state
            .entities
            .push(ObservedEntity::new(id, name, parent, depth));
        id
    }

    fn rename(&self, id: RemoteId, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entity = state
            .entities
            .iter_mut()
            .find(|e| e.remote_id == id)
            .ok_or_else(|| RemoteError::Operation(format!("{} does not exist", id)))?;
        entity.name = name.to_string();
        Ok(())
    }
}

#[async_trait]
impl GradebookClient for MockGradebook {
    async fn fetch_tree(&self, _session: &Session, _course: CourseId) -> Result<Vec<ObservedEntity>> {
        let mut state = self.state.lock().unwrap();
        state.fetches += 1;
        Ok(state
            .entities
            .iter()
            .filter(|e| !state.hidden.contains(&e.name))
            .cloned()
            .collect())
    }

    async fn create_category(
        &self,
        session: &Session,
        _course: CourseId,
        name: &str,
        parent: Option<RemoteId>,
        _config: &GlobalGradeConfig,
    ) -> Result<()> {
        self.enter(session, "create_category", name)?;
        self.insert(EntityKind::Category, name, parent);
        Ok(())
    }

    async fn create_item(
        &self,
        session: &Session,
        _course: CourseId,
        name: &str,
        parent: RemoteId,
        _config: &GlobalGradeConfig,
        id_number: Option<&str>,
    ) -> Result<()> {
        self.enter(session, "create_item", name)?;
        let id = self.insert(EntityKind::Item, name, Some(parent));
        if let Some(id_number) = id_number {
            self.state
                .lock()
                .unwrap()
                .id_numbers
                .insert(id, id_number.to_string());
        }
        Ok(())
    }

    async fn update_category(
        &self,
        session: &Session,
        _course: CourseId,
        id: RemoteId,
        update: CategoryUpdate<'_>,
        _config: &GlobalGradeConfig,
    ) -> Result<()> {
        self.enter(session, "update_category", update.name)?;
        self.rename(id, update.name)?;
        self.state
            .lock()
            .unwrap()
            .coefficients
            .insert(id, update.aggregation_coefficient);
        Ok(())
    }

    async fn update_item(
        &self,
        session: &Session,
        _course: CourseId,
        id: RemoteId,
        update: ItemUpdate<'_>,
        _config: &GlobalGradeConfig,
    ) -> Result<()> {
        self.enter(session, "update_item", update.name)?;
        self.rename(id, update.name)?;
        let mut state = self.state.lock().unwrap();
        state.coefficients.insert(id, update.aggregation_coefficient);
        if let Some(id_number) = update.id_number {
            state.id_numbers.insert(id, id_number.to_string());
        }
        Ok(())
    }

    async fn set_formula(
        &self,
        session: &Session,
        _course: CourseId,
        id: RemoteId,
        formula: &str,
    ) -> Result<()> {
        self.enter(session, "set_formula", &id.to_string())?;
        self.state
            .lock()
            .unwrap()
            .formulas
            .insert(id, formula.to_string());
        Ok(())
    }

    async fn delete_entity(&self, session: &Session, _course: CourseId, id: RemoteId) -> Result<()> {
        self.enter(session, "delete", &id.to_string())?;
        let mut state = self.state.lock().unwrap();
        if state.entities.iter().any(|e| e.parent_id == Some(id)) {
            return Err(RemoteError::Operation(format!(
                "cannot delete {}: it still has children",
                id
            )));
        }
        let before = state.entities.len();
        state.entities.retain(|e| e.remote_id != id);
        if state.entities.len() == before {
            return Err(RemoteError::Operation(format!("{} does not exist", id)));
        }
        Ok(())
    }
}

/// Hands out numbered sessions, or refuses when told to.
pub struct MockSessionProvider {
    established: AtomicUsize,
    refuse: bool,
}

impl MockSessionProvider {
    pub fn new() -> Self {
        Self {
            established: AtomicUsize::new(0),
            refuse: false,
        }
    }

    pub fn refusing() -> Self {
        Self {
            established: AtomicUsize::new(0),
            refuse: true,
        }
    }

    pub fn established(&self) -> usize {
        self.established.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    async fn establish(&self) -> Result<Session> {
        let n = self.established.fetch_add(1, Ordering::SeqCst) + 1;
        if self.refuse {
            return Err(RemoteError::Authentication("login rejected".to_string()));
        }
        Ok(Session::new(format!("renewed{}", n)))
    }
}

/// Records events as short strings; can raise an interrupt after a number
/// of finished actions.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
    finished: AtomicUsize,
    interrupt_after: Option<(usize, Arc<AtomicBool>)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupting_after(actions: usize, flag: Arc<AtomicBool>) -> Self {
        Self {
            interrupt_after: Some((actions, flag)),
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ExecutionObserver for RecordingObserver {
    fn report(&self, event: ExecutionEvent<'_>) {
        let line = match event {
            ExecutionEvent::Started { intent, total } => format!("started {} {}", intent, total),
            ExecutionEvent::ActionStarted { action } => format!("begin {}", action.id),
            ExecutionEvent::ActionFinished { action, status } => {
                let finished = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some((after, flag)) = &self.interrupt_after {
                    if finished >= *after {
                        flag.store(true, Ordering::SeqCst);
                    }
                }
                let status = match status {
                    ActionStatus::Succeeded => "ok",
                    ActionStatus::Failed => "failed",
                    ActionStatus::Skipped => "skipped",
                };
                format!("end {} {}", action.id, status)
            }
            ExecutionEvent::Finished { report } => format!("finished {}", report.total()),
        };
        self.events.lock().unwrap().push(line);
    }
}
