//! HMAC JSON Web Algorithm implementations

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{error, jwa::Algorithm, jws};

/// HMAC secret
///
/// The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct Hmac {
    #[serde(rename = "k", with = "crate::base64url")]
    secret: Vec<u8>,
}

impl fmt::Debug for Hmac {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Hmac { secret }")
    }
}

impl Hmac {
    /// HMAC using the provided raw secret
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn key(&self, alg: Algorithm) -> Result<ring::hmac::Key, error::IncompatibleAlgorithm> {
        let ring_alg = ring_algorithm(alg).ok_or_else(|| error::incompatible_algorithm(alg))?;
        Ok(ring::hmac::Key::new(ring_alg, &self.secret))
    }
}

fn ring_algorithm(alg: Algorithm) -> Option<ring::hmac::Algorithm> {
    match alg {
        Algorithm::HS256 => Some(ring::hmac::HMAC_SHA256),
        Algorithm::HS384 => Some(ring::hmac::HMAC_SHA384),
        Algorithm::HS512 => Some(ring::hmac::HMAC_SHA512),
        _ => None,
    }
}

impl jws::Signer for Hmac {
    type Error = error::SigningError;

    fn can_sign(&self, alg: Algorithm) -> bool {
        alg.is_symmetric()
    }

    fn sign(&self, alg: Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        let key = self.key(alg)?;
        Ok(ring::hmac::sign(&key, data).as_ref().to_vec())
    }
}

impl jws::Verifier for Hmac {
    type Error = error::JwkVerifyError;

    fn can_verify(&self, alg: Algorithm) -> bool {
        alg.is_symmetric()
    }

    fn verify(&self, alg: Algorithm, data: &[u8], signature: &[u8]) -> Result<(), Self::Error> {
        let key = self.key(alg)?;
        ring::hmac::verify(&key, data, signature).map_err(|_| error::signature_mismatch())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::*;
    use crate::jws::{Signer, Verifier};

    #[test]
    fn sign_then_verify() -> Result<()> {
        let key = Hmac::new(b"a shared secret".to_vec());
        let sig = key.sign(Algorithm::HS256, b"message")?;
        key.verify(Algorithm::HS256, b"message", &sig)?;

        let err = key.verify(Algorithm::HS256, b"massage", &sig).unwrap_err();
        assert!(err.is_signature_mismatch());
        Ok(())
    }

    #[test]
    fn refuses_asymmetric_algorithms() {
        let key = Hmac::new(b"secret".to_vec());
        assert!(!key.can_verify(Algorithm::RS256));
        let err = key.verify(Algorithm::RS256, b"m", b"s").unwrap_err();
        assert!(err.is_incompatible_alg());
    }

    #[test]
    fn debug_hides_secret() {
        let key = Hmac::new(b"hunter2".to_vec());
        assert_eq!(format!("{:?}", key), "Hmac { secret }");
    }

    #[test]
    fn deserializes_k_member() -> Result<()> {
        let key: Hmac = serde_json::from_str(r#"{"k":"dGVzdA"}"#)?;
        assert_eq!(key, Hmac::new(b"test".to_vec()));
        Ok(())
    }
}
