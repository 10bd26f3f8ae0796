//! ECC JSON Web Algorithm implementations

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::{error, jwa::Algorithm, jws};

/// A named ECC curve
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Curve {
    /// The P-256 curve (prime256v1/secp256r1)
    #[serde(rename = "P-256")]
    P256,

    /// The P-384 curve (secp384r1)
    #[serde(rename = "P-384")]
    P384,
}

impl Curve {
    /// Size in bytes of a single coordinate on this curve
    #[must_use]
    pub const fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
        }
    }

    /// The signing algorithm bound to this curve
    #[must_use]
    pub const fn algorithm(self) -> Algorithm {
        match self {
            Self::P256 => Algorithm::ES256,
            Self::P384 => Algorithm::ES384,
        }
    }
}

/// Elliptic curve public key
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PublicKeyDto")]
#[must_use]
pub struct EllipticCurve {
    #[serde(rename = "crv")]
    curve: Curve,

    #[serde(serialize_with = "crate::base64url::serialize")]
    x: Vec<u8>,

    #[serde(serialize_with = "crate::base64url::serialize")]
    y: Vec<u8>,
}

impl EllipticCurve {
    /// Constructs a public key from its affine coordinates
    ///
    /// # Errors
    ///
    /// A coordinate does not have the length required by the curve.
    pub fn from_coordinates(
        curve: Curve,
        x: impl Into<Vec<u8>>,
        y: impl Into<Vec<u8>>,
    ) -> Result<Self, error::KeyRejected> {
        let x = x.into();
        let y = y.into();

        if x.len() != curve.coordinate_len() || y.len() != curve.coordinate_len() {
            return Err(error::key_rejected("EC coordinate length does not match curve"));
        }

        Ok(Self { curve, x, y })
    }

    /// Constructs a public key from an uncompressed SEC1 point (`0x04 || x || y`)
    ///
    /// # Errors
    ///
    /// The point is not uncompressed or has the wrong length for the curve.
    pub fn from_uncompressed_point(curve: Curve, point: &[u8]) -> Result<Self, error::KeyRejected> {
        let len = curve.coordinate_len();
        match point.split_first() {
            Some((&4, coords)) if coords.len() == 2 * len => {
                let (x, y) = coords.split_at(len);
                Self::from_coordinates(curve, x, y)
            }
            _ => Err(error::key_rejected("EC point must be uncompressed")),
        }
    }

    /// The curve this key lies on
    #[must_use]
    pub fn curve(&self) -> Curve {
        self.curve
    }

    fn uncompressed_point(&self) -> Vec<u8> {
        let mut point = Vec::with_capacity(1 + self.x.len() + self.y.len());
        point.push(4);
        point.extend_from_slice(&self.x);
        point.extend_from_slice(&self.y);
        point
    }
}

fn verification_algorithm(
    alg: Algorithm,
) -> Option<&'static ring::signature::EcdsaVerificationAlgorithm> {
    match alg {
        Algorithm::ES256 => Some(&ring::signature::ECDSA_P256_SHA256_FIXED),
        Algorithm::ES384 => Some(&ring::signature::ECDSA_P384_SHA384_FIXED),
        _ => None,
    }
}

impl jws::Verifier for EllipticCurve {
    type Error = error::JwkVerifyError;

    fn can_verify(&self, alg: Algorithm) -> bool {
        self.curve.algorithm() == alg
    }

    fn verify(&self, alg: Algorithm, data: &[u8], signature: &[u8]) -> Result<(), Self::Error> {
        let params = verification_algorithm(alg)
            .filter(|_| self.can_verify(alg))
            .ok_or_else(|| error::incompatible_algorithm(alg))?;

        let point = self.uncompressed_point();
        ring::signature::UnparsedPublicKey::new(params, &point)
            .verify(data, signature)
            .map_err(|_| error::signature_mismatch())?;

        Ok(())
    }
}

#[derive(Deserialize)]
struct PublicKeyDto {
    crv: Curve,
    #[serde(with = "crate::base64url")]
    x: Vec<u8>,
    #[serde(with = "crate::base64url")]
    y: Vec<u8>,
}

impl TryFrom<PublicKeyDto> for EllipticCurve {
    type Error = error::KeyRejected;

    fn try_from(dto: PublicKeyDto) -> Result<Self, Self::Error> {
        Self::from_coordinates(dto.crv, dto.x, dto.y)
    }
}
