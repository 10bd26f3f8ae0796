#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use ring::{
    rand::SystemRandom,
    signature::{EcdsaKeyPair, KeyPair, RsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING},
};
use warden::{
    error::SigningError,
    jwa::{self, ec::Curve, Algorithm},
    jws,
    jwt::{Claims, Headers},
    Jwk, Jwks, Jwt,
};
use warden_clock::{TestClock, UnixTime};
use warden_oauth2::{JwksError, KeysProvider, ValidatorConfig};

pub const ISSUER: &str = "https://login.example.com/tenant";
pub const AUDIENCE: &str = "api://orders";
pub const NOW: UnixTime = UnixTime(1_700_000_000);

pub const RSA_KID: &str = "rsa-2048";
const RSA_PRIVATE_KEY_PKCS8: &[u8] = include_bytes!("../data/rsa-private.pk8");
pub const RSA_JWK: &str = r#"{
    "kty": "RSA",
    "kid": "rsa-2048",
    "use": "sig",
    "alg": "RS256",
    "n": "r9hhMcIZZdqbLAqpihhXfsXUQOx96zOq6ppQ8DWQU_2ErG-XQINnjgMIcX_LxdUll6b8OK6dEdubl0f3HIWNYANdZvl6S8ka8DXrCFt5J5TLL6VWCzfV58TAV_2lYRadjVYPPF38beMzE6TkcB9vyZ5_L9VxZxouxeaLu-4rN1P0TRAO1iGGaJfJcmNa2tiIEUATDLtMKcX_ZQ_T5-S60zkNpUY5sEaOJH_RGl6Ff8MRIL-W4BwDUtsQqcvgWmGnGbEBOMIHlkaJ_wof3nTCbgU6QYzTVjupiWJ4PdwUy8qXRbMWwR5N_Sy1ynGiQb-yOBIZbs7ENHt7NPS4ukJZpQ",
    "e": "AQAB"
}"#;

/// Signs with the private half of [`RSA_JWK`]
pub struct RsaSigner(RsaKeyPair);

impl RsaSigner {
    pub fn new() -> Self {
        Self(RsaKeyPair::from_pkcs8(RSA_PRIVATE_KEY_PKCS8).unwrap())
    }

    pub fn jwk() -> Jwk {
        serde_json::from_str(RSA_JWK).unwrap()
    }
}

impl jws::Signer for RsaSigner {
    type Error = SigningError;

    fn can_sign(&self, alg: Algorithm) -> bool {
        alg == Algorithm::RS256
    }

    fn sign(&self, alg: Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        assert_eq!(alg, Algorithm::RS256);
        let mut signature = vec![0; self.0.public().modulus_len()];
        self.0
            .sign(
                &ring::signature::RSA_PKCS1_SHA256,
                &SystemRandom::new(),
                data,
                &mut signature,
            )
            .unwrap();
        Ok(signature)
    }
}

/// Signs with a freshly generated P-256 key
pub struct EcSigner(EcdsaKeyPair);

impl EcSigner {
    pub fn generate() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng).unwrap();
        Self(EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng).unwrap())
    }

    pub fn jwk(&self, kid: &str) -> Jwk {
        let public = jwa::EllipticCurve::from_uncompressed_point(
            Curve::P256,
            self.0.public_key().as_ref(),
        )
        .unwrap();
        Jwk::from(public)
            .with_key_id(kid)
            .with_algorithm(Algorithm::ES256)
    }
}

impl jws::Signer for EcSigner {
    type Error = SigningError;

    fn can_sign(&self, alg: Algorithm) -> bool {
        alg == Algorithm::ES256
    }

    fn sign(&self, alg: Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
        assert_eq!(alg, Algorithm::ES256);
        let signature = self.0.sign(&SystemRandom::new(), data).unwrap();
        Ok(signature.as_ref().to_vec())
    }
}

pub fn clock() -> TestClock {
    TestClock::new(NOW)
}

pub fn config(clock: &TestClock) -> ValidatorConfig {
    ValidatorConfig::new([ISSUER], [AUDIENCE]).with_clock(clock.clone())
}

pub fn claims(clock: &TestClock) -> Claims {
    Claims::new()
        .with_issuer(ISSUER)
        .with_audience(AUDIENCE)
        .with_subject("alice")
        .with_claim("roles", serde_json::json!(["editor", "viewer"]))
        .with_future_expiration_from_clock(300, clock)
}

pub fn sign_rs256(claims: &Claims, kid: &str) -> Jwt {
    claims
        .sign(
            &RsaSigner::new(),
            &Headers::new(Algorithm::RS256).with_key_id(kid),
        )
        .unwrap()
}

/// Replaces the first character of the signature section
pub fn tamper(token: &Jwt) -> Jwt {
    let (message, signature) = token.as_str().rsplit_once('.').unwrap();
    let replacement = if signature.starts_with('A') { 'B' } else { 'A' };
    Jwt::from(format!("{}.{}{}", message, replacement, &signature[1..]))
}

/// Serves a replaceable key set, counting fetches
#[derive(Debug, Default)]
pub struct CountingProvider {
    jwks: Mutex<Jwks>,
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingProvider {
    pub fn new(jwks: Jwks) -> Self {
        Self {
            jwks: Mutex::new(jwks),
            ..Self::default()
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    pub fn set_jwks(&self, jwks: Jwks) {
        *self.jwks.lock().unwrap() = jwks;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeysProvider for CountingProvider {
    async fn fetch_keys(&self) -> Result<Jwks, JwksError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.jwks.lock().unwrap().clone())
    }
}
