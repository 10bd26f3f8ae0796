//! Signing and verification seams for JSON Web Signatures (JWS)
//!
//! The specifications for this standard can be found in [RFC7515][].
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515

use std::{error::Error as StdError, fmt};

use crate::jwa::Algorithm;

/// Produces signatures over a JWS signing input
pub trait Signer {
    /// Why a signature could not be produced
    type Error: fmt::Debug + fmt::Display + Sync + Send + 'static;

    /// Whether this signer can produce `alg` signatures
    fn can_sign(&self, alg: Algorithm) -> bool;

    /// Signs `data` with `alg`
    fn sign(&self, alg: Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// Checks signatures over a JWS signing input
pub trait Verifier {
    /// Why a signature was refused
    type Error: StdError + Send + Sync + 'static;

    /// Whether this verifier understands `alg` signatures
    fn can_verify(&self, alg: Algorithm) -> bool;

    /// Checks `signature` over `data` using `alg`
    fn verify(&self, alg: Algorithm, data: &[u8], signature: &[u8]) -> Result<(), Self::Error>;
}

impl<T: Verifier + ?Sized> Verifier for &'_ T {
    type Error = T::Error;

    #[inline]
    fn can_verify(&self, alg: Algorithm) -> bool {
        T::can_verify(self, alg)
    }

    #[inline]
    fn verify(&self, alg: Algorithm, data: &[u8], signature: &[u8]) -> Result<(), Self::Error> {
        T::verify(self, alg, data, signature)
    }
}
