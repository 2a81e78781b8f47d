//! Plan execution against a remote gradebook.
//!
//! Actions run strictly in plan order under one session. A failed action
//! never aborts the plan by itself; its dependents are skipped. Only two
//! consecutive transport-level failures (or a failed session
//! re-establishment after the first one) stop the run.

mod observer;
mod report;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::planner::{Action, ActionId, ActionKind, ActionPlan, PlannedAction, Target};
use crate::remote::{
    CategoryUpdate, CourseId, GradebookClient, ItemUpdate, RemoteError, Session, SessionProvider,
};
use crate::resolver::{Delay, Lookup, ResolutionFailure, ResolveError, RetryingResolver, TokioDelay};
use crate::tree::{EntityKind, GlobalGradeConfig, RemoteId};

pub use observer::{ActionStatus, ExecutionEvent, ExecutionObserver, NoopObserver};
pub use report::{
    ActionRecord, ActionWarning, ExecutionReport, FailedAction, FailureReason, KindSummary,
    SkipReason, SkippedAction,
};

/// Default pause between consecutive item creates or deletes.
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Consecutive transport failures that end a run.
const MAX_TRANSPORT_STRIKES: u32 = 2;

static NOOP_OBSERVER: NoopObserver = NoopObserver;

#[derive(Debug, Error)]
enum ActionError {
    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("depends on {0}, which produced no entity")]
    Dependency(ActionId),
}

impl From<ResolveError> for ActionError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Failure(f) => ActionError::Resolution(f),
            ResolveError::Remote(e) => ActionError::Remote(e),
        }
    }
}

/// Runs action plans. Owns the session for the duration of a run.
pub struct PlanExecutor<'a> {
    client: &'a dyn GradebookClient,
    session: Session,
    course: CourseId,
    sessions: Option<&'a dyn SessionProvider>,
    resolver: RetryingResolver,
    delay: Box<dyn Delay>,
    pacing: Duration,
    observer: &'a dyn ExecutionObserver,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<'a> PlanExecutor<'a> {
    /// An executor for one course, starting from an established session.
    /// Defaults: real timers, default resolution schedule, no observer and
    /// no session provider.
    pub fn new(client: &'a dyn GradebookClient, session: Session, course: CourseId) -> Self {
        Self {
            client,
            session,
            course,
            sessions: None,
            resolver: RetryingResolver::default(),
            delay: Box::new(TokioDelay),
            pacing: DEFAULT_PACING,
            observer: &NOOP_OBSERVER,
            interrupt: None,
        }
    }

    /// Lets the executor log in again after a transport failure.
    pub fn with_session_provider(mut self, provider: &'a dyn SessionProvider) -> Self {
        self.sessions = Some(provider);
        self
    }

    pub fn with_resolver(mut self, resolver: RetryingResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replaces the timer used for resolution waits and pacing.
    pub fn with_delay(mut self, delay: Box<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    /// Pause inserted before each item create and each delete.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn ExecutionObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Flag checked between actions; once set, the rest of the plan is
    /// skipped.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Consumes the executor, handing the (possibly renewed) session back.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Runs `plan` in order and reports every action's outcome.
    ///
    /// Failures stay local to their action and its dependents. Only a second
    /// consecutive transport failure, or an interrupt, stops the run early;
    /// the rest is then reported as skipped.
    pub async fn execute(&mut self, plan: &ActionPlan) -> ExecutionReport {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "reconcile",
            run_id = %run_id,
            intent = %plan.intent(),
            actions = plan.len()
        );
        self.run(plan, run_id).instrument(span).await
    }

    async fn run(&mut self, plan: &ActionPlan, run_id: Uuid) -> ExecutionReport {
        let mut report = ExecutionReport::new(run_id, plan.intent());
        report.unresolved = plan.unresolved().to_vec();

        log::info!(
            "Executing {} plan: {} actions on course {}",
            plan.intent(),
            plan.len(),
            self.course
        );
        self.observer.report(ExecutionEvent::Started {
            intent: plan.intent(),
            total: plan.len(),
        });

        let mut created: HashMap<ActionId, RemoteId> = HashMap::new();
        let mut claimed: HashSet<RemoteId> = HashSet::new();
        let mut succeeded: HashSet<ActionId> = HashSet::new();
        let mut transport_strikes = 0u32;
        let mut paced_before = false;
        let mut stop: Option<SkipReason> = None;

        for planned in plan.actions() {
            if stop.is_none() && self.is_interrupted() {
                log::warn!("Interrupted, skipping the remaining actions");
                report.interrupted = true;
                stop = Some(SkipReason::Interrupted);
            }
            if let Some(reason) = stop {
                self.skip(&mut report, planned, reason);
                continue;
            }

            if let Some(dependency) = planned.depends_on {
                if !succeeded.contains(&dependency) {
                    log::warn!(
                        "Skipping {}: dependency {} did not succeed",
                        planned.action,
                        dependency
                    );
                    self.skip(&mut report, planned, SkipReason::DependencyFailed { dependency });
                    continue;
                }
            }

            if is_paced(planned.action.kind()) {
                if paced_before {
                    self.delay.wait(self.pacing).await;
                }
                paced_before = true;
            }

            self.observer
                .report(ExecutionEvent::ActionStarted { action: planned });
            let span = info_span!(
                "action",
                id = %planned.id,
                kind = %planned.action.kind(),
                name = %planned.action.entity_name()
            );
            let outcome = self
                .apply(planned, plan.config(), &created, &claimed, &mut report)
                .instrument(span)
                .await;

            let status = match outcome {
                Ok(remote_id) => {
                    transport_strikes = 0;
                    if let Some(id) = remote_id {
                        created.insert(planned.id, id);
                        claimed.insert(id);
                    }
                    succeeded.insert(planned.id);
                    log::info!("Done: {}", planned.action);
                    report.record_success(planned, remote_id);
                    ActionStatus::Succeeded
                }
                Err(ActionError::Dependency(dependency)) => {
                    self.skip(&mut report, planned, SkipReason::DependencyFailed { dependency });
                    continue;
                }
                Err(ActionError::Resolution(failure)) => {
                    transport_strikes = 0;
                    log::warn!("Failed: {}: {}", planned.action, failure);
                    report.record_failure(planned, FailureReason::Resolution { failure });
                    ActionStatus::Failed
                }
                Err(ActionError::Remote(err)) if err.is_transport() => {
                    log::error!("Transport failure on {}: {}", planned.action, err);
                    report.record_failure(
                        planned,
                        FailureReason::Transport {
                            message: err.to_string(),
                        },
                    );
                    transport_strikes += 1;
                    if transport_strikes >= MAX_TRANSPORT_STRIKES || !self.reestablish().await {
                        log::error!("Aborting run after repeated transport failures");
                        report.aborted = true;
                        stop = Some(SkipReason::Aborted);
                    }
                    ActionStatus::Failed
                }
                Err(ActionError::Remote(err)) => {
                    transport_strikes = 0;
                    log::warn!("Failed: {}: {}", planned.action, err);
                    report.record_failure(
                        planned,
                        FailureReason::RemoteOperation {
                            message: err.to_string(),
                        },
                    );
                    ActionStatus::Failed
                }
            };
            self.observer.report(ExecutionEvent::ActionFinished {
                action: planned,
                status,
            });
        }

        report.finish();
        log::info!(
            "Run {} finished: {} succeeded, {} failed, {} skipped, {} unresolved",
            run_id,
            report.succeeded.len(),
            report.failed.len(),
            report.skipped.len(),
            report.unresolved.len()
        );
        self.observer
            .report(ExecutionEvent::Finished { report: &report });
        report
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn skip(&self, report: &mut ExecutionReport, planned: &PlannedAction, reason: SkipReason) {
        report.record_skip(planned, reason);
        self.observer.report(ExecutionEvent::ActionFinished {
            action: planned,
            status: ActionStatus::Skipped,
        });
    }

    /// One attempt at a fresh session. Without a provider the run simply
    /// carries on until the next strike.
    async fn reestablish(&mut self) -> bool {
        let Some(provider) = self.sessions else {
            return true;
        };
        match provider.establish().await {
            Ok(session) => {
                log::info!("Session re-established");
                self.session = session;
                true
            }
            Err(e) => {
                log::error!("Could not re-establish session: {}", e);
                false
            }
        }
    }

    /// Performs one action. Returns the identifier of the entity it touched.
    async fn apply(
        &self,
        planned: &PlannedAction,
        config: &GlobalGradeConfig,
        created: &HashMap<ActionId, RemoteId>,
        claimed: &HashSet<RemoteId>,
        report: &mut ExecutionReport,
    ) -> Result<Option<RemoteId>, ActionError> {
        match &planned.action {
            Action::CreateCategory {
                name,
                parent,
                aggregation_coefficient,
            } => {
                let parent = target_id(*parent, created)?;
                let preexisting = self.visible_in_scope(EntityKind::Category, parent).await?;
                self.client
                    .create_category(&self.session, self.course, name, parent, config)
                    .await?;
                let id = self
                    .resolve_created(EntityKind::Category, name, parent, claimed, &preexisting)
                    .await?;

                // The create form only carries the name; everything else is
                // pushed through the edit form once the id is known.
                let update = CategoryUpdate {
                    name,
                    aggregation_coefficient: *aggregation_coefficient,
                };
                if let Err(e) = self
                    .client
                    .update_category(&self.session, self.course, id, update, config)
                    .await
                {
                    self.settle_warning(report, planned, &e);
                }
                Ok(Some(id))
            }
            Action::CreateItem {
                name,
                parent,
                aggregation_coefficient,
                id_number,
            } => {
                let parent = target_id(*parent, created)?.ok_or_else(|| {
                    RemoteError::Operation("items cannot be created at the course root".into())
                })?;
                let preexisting = self.visible_in_scope(EntityKind::Item, Some(parent)).await?;
                self.client
                    .create_item(
                        &self.session,
                        self.course,
                        name,
                        parent,
                        config,
                        id_number.as_deref(),
                    )
                    .await?;
                let id = self
                    .resolve_created(EntityKind::Item, name, Some(parent), claimed, &preexisting)
                    .await?;

                let update = ItemUpdate {
                    name,
                    id_number: id_number.as_deref(),
                    aggregation_coefficient: *aggregation_coefficient,
                };
                if let Err(e) = self
                    .client
                    .update_item(&self.session, self.course, id, update, config)
                    .await
                {
                    self.settle_warning(report, planned, &e);
                }
                Ok(Some(id))
            }
            Action::UpdateCategory {
                id,
                name,
                aggregation_coefficient,
            } => {
                let update = CategoryUpdate {
                    name,
                    aggregation_coefficient: *aggregation_coefficient,
                };
                self.client
                    .update_category(&self.session, self.course, *id, update, config)
                    .await?;
                Ok(Some(*id))
            }
            Action::UpdateItem {
                id,
                name,
                aggregation_coefficient,
                id_number,
            } => {
                let update = ItemUpdate {
                    name,
                    id_number: id_number.as_deref(),
                    aggregation_coefficient: *aggregation_coefficient,
                };
                self.client
                    .update_item(&self.session, self.course, *id, update, config)
                    .await?;
                Ok(Some(*id))
            }
            Action::SetFormula {
                target, formula, ..
            } => {
                let id = target_id(*target, created)?.ok_or_else(|| {
                    RemoteError::Operation("the course root has no formula".into())
                })?;
                self.client
                    .set_formula(&self.session, self.course, id, formula)
                    .await?;
                Ok(Some(id))
            }
            Action::DeleteEntity { id, .. } => {
                self.client
                    .delete_entity(&self.session, self.course, *id)
                    .await?;
                Ok(Some(*id))
            }
        }
    }

    async fn visible_in_scope(
        &self,
        kind: EntityKind,
        parent: Option<RemoteId>,
    ) -> Result<HashSet<RemoteId>, RemoteError> {
        self.resolver
            .visible_in_scope(self.client, &self.session, self.course, kind, parent)
            .await
    }

    async fn resolve_created(
        &self,
        kind: EntityKind,
        name: &str,
        parent: Option<RemoteId>,
        claimed: &HashSet<RemoteId>,
        preexisting: &HashSet<RemoteId>,
    ) -> Result<RemoteId, ResolveError> {
        let lookup = Lookup {
            kind,
            name,
            parent,
            claimed,
            preexisting,
        };
        self.resolver
            .resolve_created(
                self.client,
                &self.session,
                self.course,
                &lookup,
                self.delay.as_ref(),
            )
            .await
    }

    fn settle_warning(&self, report: &mut ExecutionReport, planned: &PlannedAction, err: &RemoteError) {
        log::warn!(
            "Created '{}' but could not apply its settings: {}",
            planned.action.entity_name(),
            err
        );
        report.record_warning(
            planned.id,
            format!("created, but its settings were not applied: {}", err),
        );
    }
}

fn target_id(
    target: Target,
    created: &HashMap<ActionId, RemoteId>,
) -> Result<Option<RemoteId>, ActionError> {
    match target {
        Target::CourseRoot => Ok(None),
        Target::Existing { id } => Ok(Some(id)),
        Target::Created { by } => created
            .get(&by)
            .copied()
            .map(Some)
            .ok_or(ActionError::Dependency(by)),
    }
}

/// Item creates and deletes come in bursts and are throttled.
fn is_paced(kind: ActionKind) -> bool {
    matches!(kind, ActionKind::CreateItem | ActionKind::DeleteEntity)
}
