//! Implementations of the JSON Web Algorithms (JWA) standard
//!
//! The specifications for these algorithms can be found in [RFC7518][].
//! Only the signature algorithms needed to verify bearer tokens are
//! implemented.
//!
//! [RFC7518]: https://tools.ietf.org/html/rfc7518

pub mod ec;
pub mod hmac;
pub mod rsa;

#[doc(inline)]
pub use ec::EllipticCurve;
#[doc(inline)]
pub use hmac::Hmac;
#[doc(inline)]
pub use rsa::Rsa;

mod algorithm;
mod usage;

pub use algorithm::{Algorithm, Family};
pub use usage::Usage;
