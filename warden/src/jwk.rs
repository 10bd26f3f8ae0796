//! Implementations of the JSON Web Keys (JWK) standard
//!
//! The specifications for JSON Web Keys can be found in [RFC7517][].
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517

use std::convert::TryFrom;

use aliri_braid::braid;
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    error,
    jwa::{self, Algorithm},
    jws::{Signer, Verifier},
};

/// An identifier for a JWK
#[braid(serde, ref_doc = "A borrowed reference to JWK identifier ([`KeyId`])")]
pub struct KeyId;

/// Whether a key verifies with a shared secret or a public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// A shared secret (`kty` of `oct`)
    Symmetric,

    /// An RSA or elliptic curve public key
    AsymmetricPublic,
}

/// An identified JSON Web Key
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "JwkDto")]
#[must_use]
pub struct Jwk {
    key_id: Option<KeyId>,
    usage: Option<jwa::Usage>,
    algorithm: Option<Algorithm>,
    key: Key,
}

impl Jwk {
    /// The key ID
    #[must_use]
    pub fn key_id(&self) -> Option<&KeyIdRef> {
        self.key_id.as_deref()
    }

    /// The intended usage of the key
    #[must_use]
    pub fn usage(&self) -> Option<jwa::Usage> {
        self.usage
    }

    /// The algorithm to be used with this JWK
    #[must_use]
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    /// The kind of key material held
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self.key {
            Key::Hmac(_) => KeyKind::Symmetric,
            Key::Rsa(_) | Key::EllipticCurve(_) => KeyKind::AsymmetricPublic,
        }
    }

    /// Whether the key can verify signatures made with the given algorithm
    ///
    /// Accounts for the key material, and for the key's declared algorithm
    /// and usage when present.
    #[must_use]
    pub fn is_compatible(&self, alg: Algorithm) -> bool {
        self.key.can_verify(alg)
            && self.algorithm.map_or(true, |a| a == alg)
            && self.usage.map_or(true, |u| u == alg.to_usage())
    }

    /// Sets the key ID
    pub fn with_key_id(self, kid: impl Into<KeyId>) -> Self {
        Self {
            key_id: Some(kid.into()),
            ..self
        }
    }

    /// Sets the key's usage
    pub fn with_usage(self, usage: jwa::Usage) -> Self {
        Self {
            usage: Some(usage),
            ..self
        }
    }

    /// Sets the algorithm and usage consistent with that algorithm
    pub fn with_algorithm(self, alg: Algorithm) -> Self {
        Self {
            algorithm: Some(alg),
            usage: Some(alg.to_usage()),
            ..self
        }
    }

    fn check_use(&self, alg: Algorithm) -> Result<(), JwkUseError> {
        if self.usage.map_or(false, |u| u != jwa::Usage::Signing) {
            return Err(JwkUseError::Usage);
        }

        match self.algorithm {
            Some(key_alg) if key_alg != alg => Err(JwkUseError::Algorithm),
            _ => Ok(()),
        }
    }
}

enum JwkUseError {
    Usage,
    Algorithm,
}

impl From<jwa::Hmac> for Jwk {
    fn from(key: jwa::Hmac) -> Self {
        Self::from_key(Key::Hmac(key))
    }
}

impl From<jwa::Rsa> for Jwk {
    fn from(key: jwa::Rsa) -> Self {
        Self::from_key(Key::Rsa(key))
    }
}

impl From<jwa::EllipticCurve> for Jwk {
    fn from(key: jwa::EllipticCurve) -> Self {
        Self::from_key(Key::EllipticCurve(key))
    }
}

impl Jwk {
    fn from_key(key: Key) -> Self {
        Self {
            key_id: None,
            usage: None,
            algorithm: None,
            key,
        }
    }
}

impl Verifier for Jwk {
    type Error = error::JwkVerifyError;

    fn can_verify(&self, alg: Algorithm) -> bool {
        self.is_compatible(alg)
    }

    fn verify(&self, alg: Algorithm, data: &[u8], signature: &[u8]) -> Result<(), Self::Error> {
        match self.check_use(alg) {
            Err(JwkUseError::Usage) => return Err(error::jwk_usage_mismatch().into()),
            Err(JwkUseError::Algorithm) => return Err(error::incompatible_algorithm(alg).into()),
            Ok(()) => {}
        }

        self.key.verify(alg, data, signature)
    }
}

impl Signer for Jwk {
    type Error = error::SigningError;

    fn can_sign(&self, alg: Algorithm) -> bool {
        matches!(&self.key, Key::Hmac(h) if h.can_sign(alg)) && self.check_use(alg).is_ok()
    }

    fn sign(&self, alg: Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        match self.check_use(alg) {
            Err(JwkUseError::Usage) => return Err(error::jwk_usage_mismatch().into()),
            Err(JwkUseError::Algorithm) => return Err(error::incompatible_algorithm(alg).into()),
            Ok(()) => {}
        }

        match &self.key {
            Key::Hmac(h) => h.sign(alg, data),
            Key::Rsa(_) | Key::EllipticCurve(_) => Err(error::missing_private_key().into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct JwkDto {
    #[serde(rename = "kid", default)]
    key_id: Option<KeyId>,

    #[serde(rename = "use", default)]
    usage: Option<jwa::Usage>,

    #[serde(rename = "alg", default)]
    algorithm: Option<Algorithm>,

    #[serde(flatten)]
    key: Key,
}

impl TryFrom<JwkDto> for Jwk {
    type Error = error::IncompatibleAlgorithm;

    fn try_from(dto: JwkDto) -> Result<Self, Self::Error> {
        if let Some(alg) = dto.algorithm {
            if !dto.key.can_verify(alg) {
                return Err(error::incompatible_algorithm(alg));
            }
        }

        Ok(Self {
            key_id: dto.key_id,
            usage: dto.usage,
            algorithm: dto.algorithm,
            key: dto.key,
        })
    }
}

#[derive(Serialize)]
struct JwkDtoRef<'a> {
    #[serde(rename = "kid", skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a KeyIdRef>,

    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    usage: Option<jwa::Usage>,

    #[serde(rename = "alg", skip_serializing_if = "Option::is_none")]
    algorithm: Option<Algorithm>,

    #[serde(flatten)]
    key: &'a Key,
}

impl Serialize for Jwk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let dto = JwkDtoRef {
            key_id: self.key_id(),
            usage: self.usage(),
            algorithm: self.algorithm(),
            key: &self.key,
        };

        dto.serialize(serializer)
    }
}

/// Key material, discriminated by `kty`
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kty")]
enum Key {
    #[serde(rename = "RSA")]
    Rsa(jwa::Rsa),

    #[serde(rename = "EC")]
    EllipticCurve(jwa::EllipticCurve),

    #[serde(rename = "oct")]
    Hmac(jwa::Hmac),
}

impl Key {
    fn can_verify(&self, alg: Algorithm) -> bool {
        match self {
            Self::Rsa(k) => k.can_verify(alg),
            Self::EllipticCurve(k) => k.can_verify(alg),
            Self::Hmac(k) => k.can_verify(alg),
        }
    }

    fn verify(
        &self,
        alg: Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), error::JwkVerifyError> {
        match self {
            Self::Rsa(k) => k.verify(alg, data, signature),
            Self::EllipticCurve(k) => k.verify(alg, data, signature),
            Self::Hmac(k) => k.verify(alg, data, signature),
        }
    }
}
