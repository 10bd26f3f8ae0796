//! Policy-based authorization decisions over claim-bearing identities
//!
//! An [`Identity`] carries the claims asserted about an actor. A
//! [`Policy`] names an ordered set of [`Requirement`]s combined in one of
//! two [`Mode`]s, and an [`AuthorizationStrategy`] evaluates identities
//! against registered policies to produce a [`Decision`].

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]

pub mod error;
mod identity;
mod policy;
pub mod requirement;
mod strategy;

pub use error::AuthorizationError;
pub use identity::{ClaimValues, Identity, IdentityBuilder, MissingClaim};
pub use policy::{Decision, Failure, Mode, Policy, PolicyRegistry, PolicyRegistryBuilder};
pub use requirement::{Outcome, Requirement};
pub use strategy::{AuthorizationStrategy, Target};
