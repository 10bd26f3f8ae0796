//! Errors raised while reaching an authorization decision

use thiserror::Error;

use crate::{requirement::RequirementError, Decision};

pub use crate::identity::MissingClaim;

/// No policy is registered under the requested name
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("policy not found: {name}")]
pub struct PolicyNotFound {
    name: String,
}

impl PolicyNotFound {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
        }
    }

    /// The requested policy name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Authorization was not granted
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// The decision failed and there is no authenticated identity
    #[error("authentication is required")]
    Unauthenticated(Decision),

    /// The decision failed for an authenticated identity
    #[error("access denied by policy")]
    Forbidden(Decision),

    /// The target names a policy that is not registered
    #[error(transparent)]
    PolicyNotFound(#[from] PolicyNotFound),

    /// A requirement could not be evaluated
    #[error("requirement `{requirement}` could not be evaluated")]
    Requirement {
        /// The name of the requirement
        requirement: String,

        /// The underlying failure
        #[source]
        source: RequirementError,
    },
}

impl AuthorizationError {
    /// The failed decision behind an `Unauthenticated` or `Forbidden` error
    #[must_use]
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            Self::Unauthenticated(d) | Self::Forbidden(d) => Some(d),
            Self::PolicyNotFound(_) | Self::Requirement { .. } => None,
        }
    }

    /// Whether the caller should be asked to authenticate
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated(_))
    }

    /// Whether an authenticated caller was refused
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}
