//! This crate implements the verification half of the Javascript/JSON Object
//! Signing and Encryption (JOSE) standards:
//!
//! * JSON Web Signature (JWS): [RFC7515][]
//! * JSON Web Key (JWK): [RFC7517][]
//! * JSON Web Algorithms (JWA): [RFC7518][]
//! * JSON Web Token (JWT): [RFC7519][]
//!
//! Supported signature algorithms are the HMAC family (`HS256`, `HS384`,
//! `HS512`), RSA PKCS#1 v1.5 and PSS (`RS*`, `PS*`), and ECDSA over the
//! P-256 and P-384 curves (`ES256`, `ES384`). Signing is available for
//! shared-secret keys only.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use warden::{jwa, jwk, jwt, Jwk, Jwks};
//!
//! let key = Jwk::from(jwa::Hmac::new(b"test".to_vec()))
//!     .with_algorithm(jwa::Algorithm::HS256)
//!     .with_key_id(jwk::KeyId::from_static("test key"));
//!
//! let token = jwt::Claims::new()
//!     .with_subject("warden")
//!     .with_audience("my_api")
//!     .with_issuer("authority")
//!     .with_future_expiration(300)
//!     .sign(&key, &jwt::Headers::new(jwa::Algorithm::HS256).with_key_id("test key"))
//!     .unwrap();
//!
//! let mut keys = Jwks::default();
//! keys.add_key(key);
//!
//! let validator = jwt::CoreValidator::default()
//!     .add_approved_algorithm(jwa::Algorithm::HS256)
//!     .add_allowed_audience(jwt::Audience::from_static("my_api"))
//!     .require_issuer(jwt::Issuer::from_static("authority"));
//!
//! let decomposed: jwt::Decomposed = token.decompose().unwrap();
//! let key_ref = keys
//!     .compatible_keys(decomposed.alg().unwrap())
//!     .find(|k| k.key_id() == decomposed.kid())
//!     .unwrap();
//!
//! let data: jwt::Validated = token.verify(key_ref, &validator)
//!     .expect("JWT was invalid");
//! assert_eq!(data.claims().sub().unwrap().unwrap().as_str(), "warden");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
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
    unsafe_code,
    unused_must_use
)]

mod base64url;
pub mod error;
pub mod jwa;
pub mod jwk;
mod jwks;
pub mod jws;
pub mod jwt;


#[doc(inline)]
pub use jwk::Jwk;
#[doc(inline)]
pub use jwks::Jwks;
#[doc(inline)]
pub use jwt::{Jwt, JwtRef};
