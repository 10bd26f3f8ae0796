//! Authorization of identities against policies and role targets

use std::{fmt, future::Future, sync::Arc};

use crate::{
    error::AuthorizationError, requirement::RolesRequirement, Decision, Identity, Policy,
    PolicyRegistry,
};

/// What an authorization check is evaluated against
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// A policy registered by name
    Policy(String),

    /// Any one of the listed roles
    Roles(Vec<String>),

    /// The strategy's default policy
    Default,
}

impl Target {
    /// Targets a registered policy
    pub fn policy(name: impl Into<String>) -> Self {
        Self::Policy(name.into())
    }

    /// Targets a set of roles, any one of which is sufficient
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Roles(roles.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy(name) => write!(f, "policy:{}", name),
            Self::Roles(roles) => write!(f, "roles:{}", roles.join(",")),
            Self::Default => f.write_str("default"),
        }
    }
}

/// Issues authorization decisions for identities against policies
///
/// Without a default policy, [`Target::Default`] only requires an
/// authenticated identity.
///
/// ```
/// use warden_authz::{
///     requirement::RolesRequirement, AuthorizationStrategy, Identity, Policy, PolicyRegistry,
///     Target,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = PolicyRegistry::builder()
///     .with_policy(Policy::new("admin-only").require(RolesRequirement::new(["admin"])))
///     .build();
/// let strategy = AuthorizationStrategy::new(registry);
///
/// let editor = Identity::builder()
///     .claim("roles", "editor")
///     .authenticated("Test")
///     .build();
///
/// let decision = strategy
///     .authorize(Some(&editor), &Target::roles(["editor", "admin"]))
///     .await?;
/// assert!(decision.succeeded());
///
/// let err = strategy
///     .authorize(Some(&editor), &Target::policy("admin-only"))
///     .await
///     .unwrap_err();
/// assert!(err.is_forbidden());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct AuthorizationStrategy {
    registry: Arc<PolicyRegistry>,
    default_policy: Option<Policy>,
}

impl AuthorizationStrategy {
    /// Constructs a strategy over a registry
    pub fn new(registry: impl Into<Arc<PolicyRegistry>>) -> Self {
        Self {
            registry: registry.into(),
            default_policy: None,
        }
    }

    /// Sets the policy applied to [`Target::Default`]
    pub fn with_default_policy(self, policy: Policy) -> Self {
        Self {
            default_policy: Some(policy),
            ..self
        }
    }

    /// The registry backing this strategy
    #[must_use]
    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Evaluates the target, returning the decision whether or not it succeeded
    ///
    /// A missing identity is evaluated as an anonymous one.
    ///
    /// # Errors
    ///
    /// The target names an unknown policy, or a requirement could not be
    /// evaluated.
    pub async fn evaluate(
        &self,
        identity: Option<&Identity>,
        target: &Target,
    ) -> Result<Decision, AuthorizationError> {
        let anonymous;
        let identity = match identity {
            Some(identity) => identity,
            None => {
                anonymous = Identity::anonymous();
                &anonymous
            }
        };

        match target {
            Target::Policy(name) => self.registry.get(name)?.evaluate(identity).await,
            Target::Roles(roles) => {
                Policy::new("roles")
                    .require(RolesRequirement::new(roles.iter().cloned()))
                    .evaluate(identity)
                    .await
            }
            Target::Default => match &self.default_policy {
                Some(policy) => policy.evaluate(identity).await,
                None => Policy::authenticated("default").evaluate(identity).await,
            },
        }
    }

    /// Authorizes an identity against a target
    ///
    /// # Errors
    ///
    /// * `Unauthenticated` if the decision failed and the identity is missing
    ///   or not authenticated
    /// * `Forbidden` if the decision failed for an authenticated identity
    /// * `PolicyNotFound` or `Requirement` as for [`evaluate`][Self::evaluate]
    #[tracing::instrument(skip_all, fields(target = %target))]
    pub async fn authorize(
        &self,
        identity: Option<&Identity>,
        target: &Target,
    ) -> Result<Decision, AuthorizationError> {
        let decision = self.evaluate(identity, target).await?;

        if decision.succeeded() {
            return Ok(decision);
        }

        tracing::debug!(failures = ?decision.failures(), "authorization denied");

        match identity {
            Some(identity) if identity.is_authenticated() => {
                Err(AuthorizationError::Forbidden(decision))
            }
            _ => Err(AuthorizationError::Unauthenticated(decision)),
        }
    }

    /// Runs `operation` only if the identity is authorized for the target
    ///
    /// The operation is not polled at all when authorization fails.
    ///
    /// # Errors
    ///
    /// Any error from [`authorize`][Self::authorize].
    pub async fn guard<F>(
        &self,
        identity: Option<&Identity>,
        target: &Target,
        operation: F,
    ) -> Result<F::Output, AuthorizationError>
    where
        F: Future,
    {
        let _decision = self.authorize(identity, target).await?;
        Ok(operation.await)
    }
}
