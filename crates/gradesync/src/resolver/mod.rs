//! Remote entity resolution: mapping a declared name to the identifier the
//! gradebook assigned.
//!
//! The gradebook has no lookup-by-name call and does not return identifiers
//! from create requests, so resolution scrapes the tree and matches names
//! through an ordered chain of [`MatchStrategy`] tiers. The first tier with
//! any candidate decides; several candidates in that tier are an
//! [`ResolutionFailure::AmbiguousMatch`] unless the policy says otherwise.

mod retry;
mod strategy;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::remote::{CourseId, GradebookClient, RemoteError, Session};
use crate::tree::{EntityKind, ObservedEntity, RemoteId};

pub use retry::{Delay, NoDelay, RetryPolicy, TokioDelay};
pub use strategy::{ContainsMatch, ExactMatch, MatchStrategy, PrefixMatch};

/// An observed entity that matched a name, listed when the match is ambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub id: RemoteId,
    pub name: String,
}

/// Why a declared name could not be tied to one remote identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResolutionFailure {
    #[error("No {kind} named '{name}' was found")]
    NotFound { kind: EntityKind, name: String },

    #[error("'{name}' matches {} {kind} entities by {strategy} match", .candidates.len())]
    AmbiguousMatch {
        kind: EntityKind,
        name: String,
        strategy: &'static str,
        candidates: Vec<Candidate>,
    },

    #[error("{kind} '{name}' was still not visible after {attempts} lookups")]
    Unresolved {
        kind: EntityKind,
        name: String,
        attempts: u32,
    },
}

/// What to do when one matching tier yields several candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    #[default]
    Reject,
    /// Take the first candidate in scrape order and log a warning.
    FirstMatch,
}

/// A successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub id: RemoteId,
    pub observed_name: String,
    pub strategy: &'static str,
}

/// Maps declared names onto observed entities.
///
/// Strategies are tried as tiers in order and the first tier with any match
/// decides. Several matches in one tier are an ambiguity, handled per the
/// [`AmbiguityPolicy`]. The default tiers are exact, then prefix.
pub struct Resolver {
    strategies: Vec<Box<dyn MatchStrategy>>,
    ambiguity: AmbiguityPolicy,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(
            vec![Box::new(ExactMatch), Box::new(PrefixMatch)],
            AmbiguityPolicy::default(),
        )
    }
}

impl Resolver {
    pub fn new(strategies: Vec<Box<dyn MatchStrategy>>, ambiguity: AmbiguityPolicy) -> Self {
        Self {
            strategies,
            ambiguity,
        }
    }

    /// Replaces the ambiguity policy.
    pub fn with_ambiguity(mut self, ambiguity: AmbiguityPolicy) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    /// Appends a tier tried after the existing ones.
    pub fn with_strategy(mut self, strategy: Box<dyn MatchStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn ambiguity(&self) -> AmbiguityPolicy {
        self.ambiguity
    }

    /// Resolves `name` among the entities of `kind` in `observed`.
    pub fn resolve(
        &self,
        kind: EntityKind,
        name: &str,
        observed: &[ObservedEntity],
    ) -> Result<Resolution, ResolutionFailure> {
        self.resolve_excluding(kind, name, observed, &HashSet::new())
    }

    /// Like [`Resolver::resolve`], ignoring entities already claimed by
    /// another declared node.
    pub fn resolve_excluding(
        &self,
        kind: EntityKind,
        name: &str,
        observed: &[ObservedEntity],
        claimed: &HashSet<RemoteId>,
    ) -> Result<Resolution, ResolutionFailure> {
        for strategy in &self.strategies {
            let mut candidates: Vec<&ObservedEntity> = Vec::new();
            for entity in observed {
                if entity.kind() == kind
                    && !claimed.contains(&entity.remote_id)
                    && strategy.matches(&entity.name, name)
                    && !candidates.iter().any(|c| c.remote_id == entity.remote_id)
                {
                    candidates.push(entity);
                }
            }

            match candidates.as_slice() {
                [] => continue,
                [only] => return Ok(resolution(only, strategy.name())),
                [first, ..] => match self.ambiguity {
                    AmbiguityPolicy::FirstMatch => {
                        log::warn!(
                            "'{}' matches {} {} entities by {} match; using {}",
                            name,
                            candidates.len(),
                            kind,
                            strategy.name(),
                            first.remote_id
                        );
                        return Ok(resolution(first, strategy.name()));
                    }
                    AmbiguityPolicy::Reject => {
                        return Err(ResolutionFailure::AmbiguousMatch {
                            kind,
                            name: name.to_string(),
                            strategy: strategy.name(),
                            candidates: candidates
                                .iter()
                                .map(|c| Candidate {
                                    id: c.remote_id,
                                    name: c.name.clone(),
                                })
                                .collect(),
                        });
                    }
                },
            }
        }

        Err(ResolutionFailure::NotFound {
            kind,
            name: name.to_string(),
        })
    }
}

fn resolution(entity: &ObservedEntity, strategy: &'static str) -> Resolution {
    Resolution {
        id: entity.remote_id,
        observed_name: entity.name.clone(),
        strategy,
    }
}

/// Errors from post-create resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Failure(#[from] ResolutionFailure),

    /// A transport-level failure while re-scraping; the executor decides
    /// whether to re-establish the session.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// What to look for after a create request.
#[derive(Debug, Clone)]
pub struct Lookup<'a> {
    pub kind: EntityKind,
    pub name: &'a str,
    /// Only entities directly under this parent are considered.
    pub parent: Option<RemoteId>,
    /// Identifiers already bound to other declared nodes in this run.
    pub claimed: &'a HashSet<RemoteId>,
    /// Identifiers visible in the same scope before the create was sent.
    /// None of them can be the new entity.
    pub preexisting: &'a HashSet<RemoteId>,
}

/// A [`Resolver`] combined with the wait schedule used while a freshly
/// created entity becomes visible.
pub struct RetryingResolver {
    resolver: Resolver,
    policy: RetryPolicy,
}

impl Default for RetryingResolver {
    fn default() -> Self {
        Self::new(Resolver::default(), RetryPolicy::default())
    }
}

impl RetryingResolver {
    pub fn new(resolver: Resolver, policy: RetryPolicy) -> Self {
        Self { resolver, policy }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Identifiers of `kind` visible under `parent` right now. Taken before a
    /// create so that an older entity sharing the name (or a prefix of it)
    /// is never mistaken for the new one.
    pub async fn visible_in_scope(
        &self,
        client: &dyn GradebookClient,
        session: &Session,
        course: CourseId,
        kind: EntityKind,
        parent: Option<RemoteId>,
    ) -> Result<HashSet<RemoteId>, RemoteError> {
        let observed = client.fetch_tree(session, course).await?;
        Ok(observed
            .into_iter()
            .filter(|e| e.kind() == kind)
            .filter(|e| parent.is_none() || e.parent_id == parent)
            .map(|e| e.remote_id)
            .collect())
    }

    /// Re-scrapes the tree until `lookup` resolves or the policy runs out.
    ///
    /// Ambiguity is returned at once since waiting cannot fix it. A
    /// transport-level scrape failure is returned at once as well; other
    /// scrape failures count as a missed attempt.
    pub async fn resolve_created(
        &self,
        client: &dyn GradebookClient,
        session: &Session,
        course: CourseId,
        lookup: &Lookup<'_>,
        delay: &dyn Delay,
    ) -> Result<RemoteId, ResolveError> {
        let excluded: HashSet<RemoteId> = lookup
            .claimed
            .union(lookup.preexisting)
            .copied()
            .collect();

        for (attempt, wait) in self.policy.schedule().enumerate() {
            delay.wait(wait).await;

            let observed = match client.fetch_tree(session, course).await {
                Ok(observed) => observed,
                Err(e) if e.is_transport() => return Err(ResolveError::Remote(e)),
                Err(e) => {
                    log::warn!("Tree scrape failed while resolving '{}': {}", lookup.name, e);
                    continue;
                }
            };

            let scoped: Vec<ObservedEntity> = match lookup.parent {
                Some(parent) => observed
                    .into_iter()
                    .filter(|e| e.parent_id == Some(parent))
                    .collect(),
                None => observed,
            };

            match self
                .resolver
                .resolve_excluding(lookup.kind, lookup.name, &scoped, &excluded)
            {
                Ok(found) => {
                    log::debug!(
                        "Resolved {} '{}' to {} ({} match, attempt {})",
                        lookup.kind,
                        lookup.name,
                        found.id,
                        found.strategy,
                        attempt + 1
                    );
                    return Ok(found.id);
                }
                Err(failure @ ResolutionFailure::AmbiguousMatch { .. }) => {
                    return Err(failure.into())
                }
                Err(_) => {
                    log::debug!(
                        "{} '{}' not visible yet (attempt {}/{})",
                        lookup.kind,
                        lookup.name,
                        attempt + 1,
                        self.policy.total_attempts()
                    );
                }
            }
        }

        Err(ResolutionFailure::Unresolved {
            kind: lookup.kind,
            name: lookup.name.to_string(),
            attempts: self.policy.total_attempts(),
        }
        .into())
    }
}
