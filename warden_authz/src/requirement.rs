//! Individual authorization conditions

use std::{error::Error as StdError, fmt, future::Future};

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use thiserror::Error;

use crate::Identity;

/// The result of evaluating a single requirement
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The identity meets the requirement
    Satisfied,

    /// The identity does not meet the requirement, with a reason
    Unsatisfied(String),
}

impl Outcome {
    /// Constructs an unsatisfied outcome
    pub fn unsatisfied(reason: impl Into<String>) -> Self {
        Self::Unsatisfied(reason.into())
    }

    /// Whether the requirement was satisfied
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    fn from_check(satisfied: bool, reason: impl FnOnce() -> String) -> Self {
        if satisfied {
            Self::Satisfied
        } else {
            Self::Unsatisfied(reason())
        }
    }
}

/// A requirement could not be evaluated
///
/// This is distinct from an unsatisfied requirement: it signals that no
/// decision could be reached, for example because a lookup failed.
#[derive(Debug, Error)]
#[error("requirement could not be evaluated")]
pub struct RequirementError {
    #[source]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

impl RequirementError {
    /// Wraps the underlying cause
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// A single testable authorization condition
///
/// Requirements never modify the identity. A missing claim is reported as
/// [`Outcome::Unsatisfied`], never as an error.
#[async_trait]
pub trait Requirement: fmt::Debug + Send + Sync {
    /// A stable name, reported alongside failures
    fn name(&self) -> &str;

    /// Evaluates the requirement against an identity
    async fn evaluate(&self, identity: &Identity) -> Result<Outcome, RequirementError>;
}

/// Requires an authenticated identity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AuthenticatedRequirement;

#[async_trait]
impl Requirement for AuthenticatedRequirement {
    fn name(&self) -> &str {
        "authenticated"
    }

    async fn evaluate(&self, identity: &Identity) -> Result<Outcome, RequirementError> {
        Ok(Outcome::from_check(identity.is_authenticated(), || {
            "identity is not authenticated".to_owned()
        }))
    }
}

/// Requires an identity that is not authenticated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnonymousRequirement;

#[async_trait]
impl Requirement for AnonymousRequirement {
    fn name(&self) -> &str {
        "anonymous"
    }

    async fn evaluate(&self, identity: &Identity) -> Result<Outcome, RequirementError> {
        Ok(Outcome::from_check(!identity.is_authenticated(), || {
            "identity is authenticated".to_owned()
        }))
    }
}

/// Requires that every listed claim is present
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimPresenceRequirement {
    claims: Vec<String>,
}

impl ClaimPresenceRequirement {
    /// Requires each of the given claims
    pub fn new<I, S>(claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            claims: claims.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Requirement for ClaimPresenceRequirement {
    fn name(&self) -> &str {
        "claim-presence"
    }

    async fn evaluate(&self, identity: &Identity) -> Result<Outcome, RequirementError> {
        let missing: Vec<&str> = self
            .claims
            .iter()
            .map(String::as_str)
            .filter(|c| !identity.has_claim(c))
            .collect();

        Ok(Outcome::from_check(missing.is_empty(), || {
            format!("missing claim: {}", missing.join(", "))
        }))
    }
}

/// Requires claims to hold exact values
///
/// Every configured pair must match. A multi-valued claim matches when any
/// of its values is equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimEqualsRequirement {
    expected: Vec<(String, Value)>,
}

impl ClaimEqualsRequirement {
    /// Requires `name` to hold `value`
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            expected: vec![(name.into(), value.into())],
        }
    }

    /// Requires every pair to match
    pub fn all<I, S, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: Into<String>,
        V: Into<Value>,
    {
        Self {
            expected: pairs
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    /// Adds a further pair that must match
    #[must_use]
    pub fn and(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.expected.push((name.into(), value.into()));
        self
    }
}

#[async_trait]
impl Requirement for ClaimEqualsRequirement {
    fn name(&self) -> &str {
        "claim-equality"
    }

    async fn evaluate(&self, identity: &Identity) -> Result<Outcome, RequirementError> {
        let mismatched: Vec<&str> = self
            .expected
            .iter()
            .filter(|(name, value)| !identity.has_claim_value(name, value.clone()))
            .map(|(name, _)| name.as_str())
            .collect();

        Ok(Outcome::from_check(mismatched.is_empty(), || {
            format!("claim does not have the required value: {}", mismatched.join(", "))
        }))
    }
}

/// Requires some value of a claim to be in an allowed set
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimInRequirement {
    claim: String,
    allowed: Vec<Value>,
}

impl ClaimInRequirement {
    /// Requires `claim` to hold one of `allowed`
    pub fn new<I, V>(claim: impl Into<String>, allowed: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            claim: claim.into(),
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl Requirement for ClaimInRequirement {
    fn name(&self) -> &str {
        "claim-set-membership"
    }

    async fn evaluate(&self, identity: &Identity) -> Result<Outcome, RequirementError> {
        let found = identity
            .claims_of(&self.claim)
            .any(|v| self.allowed.contains(v));

        Ok(Outcome::from_check(found, || {
            format!("claim `{}` is not one of the allowed values", self.claim)
        }))
    }
}

/// Requires the identity to hold at least one of the listed roles
///
/// Roles are read from the `roles` claim unless configured otherwise. An
/// empty role list is never satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RolesRequirement {
    roles: Vec<String>,
    claim: String,
}

impl RolesRequirement {
    /// Requires one of the given roles
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
            claim: "roles".to_owned(),
        }
    }

    /// Reads roles from a different claim
    #[must_use]
    pub fn with_claim(self, claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
            ..self
        }
    }

    /// The accepted roles
    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

#[async_trait]
impl Requirement for RolesRequirement {
    fn name(&self) -> &str {
        "role-membership"
    }

    async fn evaluate(&self, identity: &Identity) -> Result<Outcome, RequirementError> {
        if self.roles.is_empty() {
            return Ok(Outcome::unsatisfied("no roles are accepted"));
        }

        let held = identity
            .claims_of(&self.claim)
            .filter_map(Value::as_str)
            .any(|r| self.roles.iter().any(|req| req == r));

        Ok(Outcome::from_check(held, || {
            format!("missing required role: {}", self.roles.join(", "))
        }))
    }
}

/// A requirement backed by a synchronous predicate
pub struct FnRequirement<F> {
    name: String,
    predicate: F,
}

impl<F> FnRequirement<F>
where
    F: Fn(&Identity) -> bool + Send + Sync,
{
    /// Wraps a predicate under the given name
    pub fn new(name: impl Into<String>, predicate: F) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }
}

impl<F> fmt::Debug for FnRequirement<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRequirement")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Requirement for FnRequirement<F>
where
    F: Fn(&Identity) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, identity: &Identity) -> Result<Outcome, RequirementError> {
        Ok(Outcome::from_check((self.predicate)(identity), || {
            format!("condition `{}` was not met", self.name)
        }))
    }
}

type AsyncPredicate =
    dyn Fn(Identity) -> BoxFuture<'static, Result<bool, RequirementError>> + Send + Sync;

/// A requirement backed by an asynchronous predicate
///
/// The predicate receives its own copy of the identity, so that it may
/// suspend on I/O without borrowing from the caller.
pub struct AsyncFnRequirement {
    name: String,
    predicate: Box<AsyncPredicate>,
}

impl AsyncFnRequirement {
    /// Wraps an asynchronous predicate under the given name
    pub fn new<F, Fut>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Identity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, RequirementError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(move |identity| predicate(identity).boxed()),
        }
    }
}

impl fmt::Debug for AsyncFnRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnRequirement")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Requirement for AsyncFnRequirement {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(&self, identity: &Identity) -> Result<Outcome, RequirementError> {
        let met = (self.predicate)(identity.clone()).await?;
        Ok(Outcome::from_check(met, || {
            format!("condition `{}` was not met", self.name)
        }))
    }
}
