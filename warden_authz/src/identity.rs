//! The acting identity and its claims

use std::{collections::BTreeMap, slice};

use serde_json::{Map, Value};
use thiserror::Error;

/// A required claim was absent from the identity
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("missing required claim: {name}")]
pub struct MissingClaim {
    name: String,
}

impl MissingClaim {
    /// The name of the missing claim
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An acting identity, described by a set of claims
///
/// Each claim name maps to one or more values, in the order they were
/// asserted. Identities are immutable once built.
///
/// ```
/// use warden_authz::Identity;
///
/// let identity = Identity::builder()
///     .claim("sub", "alice")
///     .claim("roles", "editor")
///     .claim("roles", "admin")
///     .authenticated("Cookie")
///     .build();
///
/// assert_eq!(identity.claim_str("sub"), Some("alice"));
/// assert_eq!(identity.roles().collect::<Vec<_>>(), ["editor", "admin"]);
/// assert!(identity.is_authenticated());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct Identity {
    claims: BTreeMap<String, Vec<Value>>,
    authentication_mode: Option<String>,
    authenticated: bool,
}

impl Identity {
    /// Starts building a new identity
    pub fn builder() -> IdentityBuilder {
        IdentityBuilder::default()
    }

    /// An unauthenticated identity with no claims
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated identity holding the members of a JSON object
    ///
    /// A top-level array contributes each of its elements as a separate value
    /// of that claim. Any other value is held as-is.
    pub fn from_claims(claims: Map<String, Value>, mode: impl Into<String>) -> Self {
        claims
            .into_iter()
            .fold(Self::builder(), |builder, (name, value)| {
                builder.json_claim(name, value)
            })
            .authenticated(mode)
            .build()
    }

    /// Whether the identity was authenticated
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// The mechanism that authenticated this identity, such as `JWT Bearer`
    #[must_use]
    pub fn authentication_mode(&self) -> Option<&str> {
        self.authentication_mode.as_deref()
    }

    /// The first value of a claim
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name).and_then(|v| v.first())
    }

    /// The first value of a claim, which must be present
    ///
    /// # Errors
    ///
    /// The identity holds no value for the claim.
    pub fn require_claim(&self, name: &str) -> Result<&Value, MissingClaim> {
        self.claim(name).ok_or_else(|| MissingClaim {
            name: name.to_owned(),
        })
    }

    /// The first value of a claim, if it is a string
    #[must_use]
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claim(name).and_then(Value::as_str)
    }

    /// Every value of a claim, in assertion order
    pub fn claims_of(&self, name: &str) -> ClaimValues<'_> {
        ClaimValues {
            inner: self.claims.get(name).map(|v| v.iter()).unwrap_or_default(),
        }
    }

    /// Whether the identity carries the claim at all
    #[must_use]
    pub fn has_claim(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    /// Whether any value of the claim equals `value`
    #[must_use]
    pub fn has_claim_value<T>(&self, name: &str, value: T) -> bool
    where
        Value: PartialEq<T>,
    {
        self.claims_of(name).any(|v| *v == value)
    }

    /// The names of all claims held
    pub fn claim_names(&self) -> impl Iterator<Item = &str> {
        self.claims.keys().map(String::as_str)
    }

    /// The `sub` claim
    #[must_use]
    pub fn sub(&self) -> Option<&str> {
        self.claim_str("sub")
    }

    /// The `id` claim, falling back to `sub`
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.claim_str("id").or_else(|| self.sub())
    }

    /// The `name` claim
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.claim_str("name")
    }

    /// The `email` claim
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.claim_str("email")
    }

    /// The string values of the `roles` claim
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.claims_of("roles").filter_map(Value::as_str)
    }
}

/// Every value held by an identity for a single claim
#[derive(Clone, Debug)]
pub struct ClaimValues<'a> {
    inner: slice::Iter<'a, Value>,
}

impl<'a> Iterator for ClaimValues<'a> {
    type Item = &'a Value;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ClaimValues<'_> {}

/// A builder for an [`Identity`]
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct IdentityBuilder {
    claims: BTreeMap<String, Vec<Value>>,
    authentication_mode: Option<String>,
}

impl IdentityBuilder {
    /// Adds a value to a claim, after any values it already holds
    pub fn claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Adds a JSON value to a claim, spreading a top-level array into
    /// individual values
    pub fn json_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        let values = self.claims.entry(name.into()).or_default();
        match value {
            Value::Array(items) => values.extend(items),
            other => values.push(other),
        }
        self
    }

    /// Marks the identity as authenticated by the named mechanism
    pub fn authenticated(self, mode: impl Into<String>) -> Self {
        Self {
            authentication_mode: Some(mode.into()),
            ..self
        }
    }

    /// Builds the identity
    pub fn build(self) -> Identity {
        Identity {
            authenticated: self.authentication_mode.is_some(),
            claims: self.claims,
            authentication_mode: self.authentication_mode,
        }
    }
}
