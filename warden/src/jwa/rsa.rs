//! RSA JSON Web Algorithm implementations

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::{error, jwa::Algorithm, jws};

/// Smallest modulus accepted, in bytes
const MIN_MODULUS_LEN: usize = 2048 / 8;

/// Largest modulus accepted, in bytes
const MAX_MODULUS_LEN: usize = 8192 / 8;

/// RSA public key components
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyDto")]
#[must_use]
pub struct Rsa {
    /// The public modulus, big-endian without leading zeros
    #[serde(rename = "n", serialize_with = "crate::base64url::serialize")]
    modulus: Vec<u8>,

    /// The public exponent, big-endian without leading zeros
    #[serde(rename = "e", serialize_with = "crate::base64url::serialize")]
    exponent: Vec<u8>,
}

impl Rsa {
    /// Constructs a public key from the big-endian modulus and exponent
    ///
    /// # Errors
    ///
    /// The modulus is shorter than 2048 or longer than 8192 bits, or the
    /// exponent is empty.
    pub fn from_public_components(
        modulus: impl Into<Vec<u8>>,
        exponent: impl Into<Vec<u8>>,
    ) -> Result<Self, error::KeyRejected> {
        let modulus = strip_leading_zeros(modulus.into());
        let exponent = strip_leading_zeros(exponent.into());

        if modulus.len() < MIN_MODULUS_LEN {
            return Err(error::key_rejected("RSA modulus must be at least 2048 bits"));
        }

        if modulus.len() > MAX_MODULUS_LEN {
            return Err(error::key_rejected("RSA modulus must be at most 8192 bits"));
        }

        if exponent.is_empty() {
            return Err(error::key_rejected("RSA exponent missing"));
        }

        Ok(Self { modulus, exponent })
    }

    /// The public key's modulus
    #[must_use]
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// The public key's exponent
    #[must_use]
    pub fn exponent(&self) -> &[u8] {
        &self.exponent
    }
}

fn strip_leading_zeros(mut value: Vec<u8>) -> Vec<u8> {
    let zeros = value.iter().take_while(|&&b| b == 0).count();
    value.drain(..zeros);
    value
}

pub(crate) fn verification_params(
    alg: Algorithm,
) -> Option<&'static ring::signature::RsaParameters> {
    match alg {
        Algorithm::RS256 => Some(&ring::signature::RSA_PKCS1_2048_8192_SHA256),
        Algorithm::RS384 => Some(&ring::signature::RSA_PKCS1_2048_8192_SHA384),
        Algorithm::RS512 => Some(&ring::signature::RSA_PKCS1_2048_8192_SHA512),
        Algorithm::PS256 => Some(&ring::signature::RSA_PSS_2048_8192_SHA256),
        Algorithm::PS384 => Some(&ring::signature::RSA_PSS_2048_8192_SHA384),
        Algorithm::PS512 => Some(&ring::signature::RSA_PSS_2048_8192_SHA512),
        _ => None,
    }
}

impl jws::Verifier for Rsa {
    type Error = error::JwkVerifyError;

    fn can_verify(&self, alg: Algorithm) -> bool {
        verification_params(alg).is_some()
    }

    fn verify(&self, alg: Algorithm, data: &[u8], signature: &[u8]) -> Result<(), Self::Error> {
        let params = verification_params(alg).ok_or_else(|| error::incompatible_algorithm(alg))?;

        let pk = ring::signature::RsaPublicKeyComponents {
            n: self.modulus.as_slice(),
            e: self.exponent.as_slice(),
        };

        pk.verify(params, data, signature)
            .map_err(|_| error::signature_mismatch())?;

        Ok(())
    }
}

#[derive(Deserialize)]
struct PublicKeyDto {
    #[serde(rename = "n", with = "crate::base64url")]
    modulus: Vec<u8>,

    #[serde(rename = "e", with = "crate::base64url")]
    exponent: Vec<u8>,
}

impl TryFrom<PublicKeyDto> for Rsa {
    type Error = error::KeyRejected;

    fn try_from(dto: PublicKeyDto) -> Result<Self, Self::Error> {
        Self::from_public_components(dto.modulus, dto.exponent)
    }
}
