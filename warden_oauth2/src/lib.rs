//! Bearer token validation against JSON Web Key Sets
//!
//! A [`JwksClient`] caches the key set published by an identity provider
//! and refreshes it on demand when a token names a key it has not seen. A
//! [`JwtValidator`] checks a token's structure, signature, and claims, then
//! produces a [`warden_authz::Identity`] that can be handed to an
//! authorization strategy.
//!
//! ```no_run
//! use warden::JwtRef;
//! use warden_oauth2::{AuthorityKeysProvider, JwksClient, JwtValidator, ValidatorConfig};
//!
//! # async fn run(token: &JwtRef) -> Result<(), Box<dyn std::error::Error>> {
//! let provider = AuthorityKeysProvider::new("https://login.example.com/tenant")?;
//! let validator = JwtValidator::asymmetric(
//!     ValidatorConfig::new(["https://login.example.com/tenant"], ["api://orders"]),
//!     JwksClient::new(provider),
//! )?;
//!
//! let identity = validator.validate(token).await?;
//! println!("authenticated {:?}", identity.sub());
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! This crate does not enable TLS support in `reqwest` by itself. If your
//! application already uses `reqwest` with some TLS settings
//! (native/OpenSSL/rustls), then this crate will use those settings
//! automatically. However, if the only reason you are using `reqwest` is
//! transitively through this crate, you may need to enable the
//! `default-tls` or `rustls-tls` feature to call out to an HTTPS endpoint.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod error;
pub mod jwks;
mod settings;
mod validator;

pub use error::{ConfigError, JwksError, ValidationError};
pub use jwks::{
    AuthorityKeysProvider, CachedKeys, JwksClient, JwksClientBuilder, KeysProvider,
    StaticKeysProvider, UrlKeysProvider,
};
pub use settings::ValidatorSettings;
pub use validator::{CompositeJwtValidator, JwtValidator, ValidatorConfig, AUTHENTICATION_MODE};
