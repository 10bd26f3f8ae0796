//! Policies, their decisions, and the registry that names them

use std::{collections::HashMap, sync::Arc};

use crate::{
    error::{AuthorizationError, PolicyNotFound},
    requirement::{AnonymousRequirement, AuthenticatedRequirement, Outcome, Requirement},
    Identity,
};

/// How the requirements of a policy combine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Every requirement must be satisfied
    #[default]
    All,

    /// Any one satisfied requirement is enough
    Sufficient,
}

/// A requirement that was not satisfied, with the reason it gave
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Failure {
    requirement: String,
    reason: String,
}

impl Failure {
    /// Constructs a failure record
    pub fn new(requirement: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            requirement: requirement.into(),
            reason: reason.into(),
        }
    }

    /// The name of the failed requirement
    #[must_use]
    pub fn requirement(&self) -> &str {
        &self.requirement
    }

    /// Why the requirement was not satisfied
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// The outcome of evaluating a policy
///
/// Failures are listed in the order their requirements were evaluated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct Decision {
    succeeded: bool,
    failures: Vec<Failure>,
}

impl Decision {
    /// A successful decision
    pub fn success() -> Self {
        Self {
            succeeded: true,
            failures: Vec::new(),
        }
    }

    /// A failed decision, carrying the diagnostics that led to it
    pub fn failure(failures: Vec<Failure>) -> Self {
        Self {
            succeeded: false,
            failures,
        }
    }

    /// Whether access is granted
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// The requirements that were not satisfied
    #[must_use]
    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }
}

/// A named, ordered set of requirements with a rule for combining them
///
/// An empty policy succeeds in [`Mode::All`] and fails in
/// [`Mode::Sufficient`].
///
/// ```
/// use warden_authz::{requirement::RolesRequirement, Identity, Policy};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let policy = Policy::new("admin-only").require(RolesRequirement::new(["admin"]));
///
/// let user = Identity::builder()
///     .claim("roles", "user")
///     .authenticated("Test")
///     .build();
///
/// let decision = policy.evaluate(&user).await?;
/// assert!(!decision.succeeded());
/// assert_eq!(decision.failures()[0].reason(), "missing required role: admin");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct Policy {
    name: String,
    requirements: Vec<Arc<dyn Requirement>>,
    mode: Mode,
}

impl Policy {
    /// An empty policy in which every requirement must be satisfied
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requirements: Vec::new(),
            mode: Mode::All,
        }
    }

    /// An empty policy in which any one requirement is enough
    pub fn sufficient(name: impl Into<String>) -> Self {
        Self::new(name).with_mode(Mode::Sufficient)
    }

    /// A policy requiring an authenticated identity
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self::new(name).require(AuthenticatedRequirement)
    }

    /// A policy requiring an identity that is not authenticated
    pub fn anonymous(name: impl Into<String>) -> Self {
        Self::new(name).require(AnonymousRequirement)
    }

    /// Sets the combining rule
    pub fn with_mode(self, mode: Mode) -> Self {
        Self { mode, ..self }
    }

    /// Appends a requirement
    pub fn require(self, requirement: impl Requirement + 'static) -> Self {
        self.require_shared(Arc::new(requirement))
    }

    /// Appends a requirement that may also be used by other policies
    pub fn require_shared(mut self, requirement: Arc<dyn Requirement>) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// The policy name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The combining rule
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The requirements, in evaluation order
    #[must_use]
    pub fn requirements(&self) -> &[Arc<dyn Requirement>] {
        &self.requirements
    }

    /// Evaluates the policy against an identity
    ///
    /// Requirements are awaited one at a time in declaration order.
    ///
    /// # Errors
    ///
    /// A requirement could not be evaluated. The error names the requirement.
    pub async fn evaluate(&self, identity: &Identity) -> Result<Decision, AuthorizationError> {
        let mut failures = Vec::new();

        for requirement in &self.requirements {
            let outcome = requirement.evaluate(identity).await.map_err(|source| {
                AuthorizationError::Requirement {
                    requirement: requirement.name().to_owned(),
                    source,
                }
            })?;

            match outcome {
                Outcome::Satisfied if self.mode == Mode::Sufficient => {
                    tracing::trace!(
                        policy = %self.name,
                        requirement = requirement.name(),
                        "sufficient requirement satisfied"
                    );
                    return Ok(Decision::success());
                }
                Outcome::Satisfied => {}
                Outcome::Unsatisfied(reason) => {
                    failures.push(Failure::new(requirement.name(), reason));
                }
            }
        }

        let decision = match self.mode {
            Mode::All if failures.is_empty() => Decision::success(),
            _ => Decision::failure(failures),
        };

        Ok(decision)
    }
}

/// The set of named policies known to an application
///
/// Built once at startup; read-only afterwards.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct PolicyRegistry {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistry {
    /// Starts building a registry
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::default()
    }

    /// Looks up a policy by name
    ///
    /// # Errors
    ///
    /// No policy is registered under that name.
    pub fn get(&self, name: &str) -> Result<&Policy, PolicyNotFound> {
        self.policies
            .get(name)
            .ok_or_else(|| PolicyNotFound::new(name))
    }

    /// The number of registered policies
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no policies are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// A builder for a [`PolicyRegistry`]
///
/// When two policies share a name, the first one added is kept.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct PolicyRegistryBuilder {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistryBuilder {
    /// Registers a policy
    pub fn with_policy(mut self, policy: Policy) -> Self {
        if self.policies.contains_key(policy.name()) {
            tracing::warn!(policy = policy.name(), "ignoring duplicate policy");
        } else {
            self.policies.insert(policy.name.clone(), policy);
        }
        self
    }

    /// Freezes the registry
    pub fn build(self) -> PolicyRegistry {
        PolicyRegistry {
            policies: self.policies,
        }
    }
}

impl Extend<Policy> for PolicyRegistryBuilder {
    fn extend<I: IntoIterator<Item = Policy>>(&mut self, iter: I) {
        for policy in iter {
            let this = std::mem::take(self);
            *self = this.with_policy(policy);
        }
    }
}

impl FromIterator<Policy> for PolicyRegistry {
    fn from_iter<I: IntoIterator<Item = Policy>>(iter: I) -> Self {
        let mut builder = Self::builder();
        builder.extend(iter);
        builder.build()
    }
}
