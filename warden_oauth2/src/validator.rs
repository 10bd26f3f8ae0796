use std::{fmt, sync::Arc, time::Duration};

use warden::{
    jwa::{self, Algorithm},
    jwk::KeyId,
    jwt::{Audience, Claims, CoreValidator, Decomposed, Issuer},
    Jwk, JwtRef,
};
use warden_authz::Identity;
use warden_clock::{Clock, System};

use crate::{ConfigError, JwksClient, ValidationError};

/// The authentication mode recorded on identities built from validated tokens
pub const AUTHENTICATION_MODE: &str = "JWT Bearer";

/// The acceptance rules for a [`JwtValidator`]
///
/// Issuers and audiences are required. Unless overridden, asymmetric
/// validators accept `RS256` and symmetric validators accept `HS256`. Tokens
/// must name a key id, and no clock skew is tolerated.
#[must_use]
pub struct ValidatorConfig {
    issuers: Vec<Issuer>,
    audiences: Vec<Audience>,
    algorithms: Vec<Algorithm>,
    leeway: Duration,
    require_kid: bool,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ValidatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorConfig")
            .field("issuers", &self.issuers)
            .field("audiences", &self.audiences)
            .field("algorithms", &self.algorithms)
            .field("leeway", &self.leeway)
            .field("require_kid", &self.require_kid)
            .finish_non_exhaustive()
    }
}

impl ValidatorConfig {
    /// Accepts tokens from any of `issuers` addressed to any of `audiences`
    pub fn new<I, A>(issuers: I, audiences: A) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Issuer>,
        A: IntoIterator,
        A::Item: Into<Audience>,
    {
        Self {
            issuers: issuers.into_iter().map(Into::into).collect(),
            audiences: audiences.into_iter().map(Into::into).collect(),
            algorithms: Vec::new(),
            leeway: Duration::ZERO,
            require_kid: true,
            clock: Arc::new(System),
        }
    }

    /// Sets the algorithms a token may be signed with
    pub fn with_algorithms(self, algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        Self {
            algorithms: algorithms.into_iter().collect(),
            ..self
        }
    }

    /// Tolerates clock skew when checking `exp` and `nbf`
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// Whether tokens must name the key that signed them
    ///
    /// When not required, a token without a `kid` is checked against every
    /// compatible key in the current key set.
    pub fn require_kid(self, require_kid: bool) -> Self {
        Self {
            require_kid,
            ..self
        }
    }

    /// Sets the clock used for time-based claims
    pub fn with_clock(self, clock: impl Clock + 'static) -> Self {
        Self {
            clock: Arc::new(clock),
            ..self
        }
    }

    fn into_parts(
        self,
        default_algorithm: Algorithm,
    ) -> Result<(CoreValidator, bool, Arc<dyn Clock>), ConfigError> {
        if self.issuers.is_empty() {
            return Err(ConfigError::MissingIssuers);
        }

        if self.audiences.is_empty() {
            return Err(ConfigError::MissingAudiences);
        }

        let algorithms = if self.algorithms.is_empty() {
            vec![default_algorithm]
        } else {
            self.algorithms
        };

        let core = CoreValidator::default()
            .with_leeway(self.leeway)
            .extend_approved_algorithms(algorithms)
            .extend_allowed_issuers(self.issuers)
            .extend_allowed_audiences(self.audiences);

        Ok((core, self.require_kid, self.clock))
    }
}

#[derive(Clone, Debug)]
enum KeySource {
    Jwks(JwksClient),
    Secret(Jwk),
}

/// Validates bearer tokens and produces authenticated identities
///
/// Checks are made in a fixed order: token structure, algorithm, key
/// resolution, signature, and then claims. A signature that does not match
/// is never retried against a refreshed key set.
#[derive(Clone)]
#[must_use]
pub struct JwtValidator {
    core: CoreValidator,
    keys: KeySource,
    require_kid: bool,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtValidator")
            .field("core", &self.core)
            .field("keys", &self.keys)
            .field("require_kid", &self.require_kid)
            .finish_non_exhaustive()
    }
}

impl JwtValidator {
    /// Constructs a validator that resolves keys from a key set
    ///
    /// # Errors
    ///
    /// No issuers or no audiences were configured.
    pub fn asymmetric(config: ValidatorConfig, client: JwksClient) -> Result<Self, ConfigError> {
        let (core, require_kid, clock) = config.into_parts(Algorithm::RS256)?;

        Ok(Self {
            core,
            keys: KeySource::Jwks(client),
            require_kid,
            clock,
        })
    }

    /// Constructs a validator that checks signatures with a shared secret
    ///
    /// # Errors
    ///
    /// * `EmptySecret` if the secret is empty
    /// * `IncompatibleAlgorithm` if a non-HMAC algorithm was configured
    /// * `MissingIssuers` or `MissingAudiences` as for
    ///   [`asymmetric`][Self::asymmetric]
    pub fn symmetric(
        config: ValidatorConfig,
        secret: impl Into<Vec<u8>>,
    ) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        if let Some(&alg) = config.algorithms.iter().find(|a| !a.is_symmetric()) {
            return Err(ConfigError::IncompatibleAlgorithm(alg));
        }

        let (core, _, clock) = config.into_parts(Algorithm::HS256)?;

        Ok(Self {
            core,
            keys: KeySource::Secret(Jwk::from(jwa::Hmac::new(secret))),
            require_kid: false,
            clock,
        })
    }

    /// Validates a token, returning its verified claims
    ///
    /// # Errors
    ///
    /// The token was rejected. See [`ValidationError`] for the reasons.
    #[tracing::instrument(
        skip_all,
        fields(jwt.alg = tracing::field::Empty, jwt.kid = tracing::field::Empty)
    )]
    pub async fn validate_claims(&self, token: &JwtRef) -> Result<Claims, ValidationError> {
        let result = self.check(token).await;

        if let Err(err) = &result {
            let error: &(dyn std::error::Error + 'static) = err;
            tracing::debug!(error, "token rejected");
        }

        result
    }

    /// Validates a token, returning an identity carrying its claims
    ///
    /// # Errors
    ///
    /// The token was rejected. See [`ValidationError`] for the reasons.
    pub async fn validate(&self, token: &JwtRef) -> Result<Identity, ValidationError> {
        let claims = self.validate_claims(token).await?;
        Ok(Identity::from_claims(claims.into_map(), AUTHENTICATION_MODE))
    }

    async fn check(&self, token: &JwtRef) -> Result<Claims, ValidationError> {
        let decomposed = token
            .decompose()
            .map_err(ValidationError::InvalidTokenFormat)?;

        let span = tracing::Span::current();
        let raw_alg = decomposed.untrusted_header().raw_alg();
        span.record("jwt.alg", raw_alg);

        let alg = match decomposed.alg() {
            Ok(alg) if self.core.approves(alg) => alg,
            _ => return Err(ValidationError::UnsupportedAlgorithm(raw_alg.to_owned())),
        };

        let kid: Option<KeyId> = decomposed.kid().map(ToOwned::to_owned);
        if let Some(kid) = &kid {
            span.record("jwt.kid", kid.as_str());
        }

        match (&self.keys, kid) {
            (KeySource::Secret(key), _) => self.verify(decomposed, key, alg),
            (KeySource::Jwks(client), Some(kid)) => {
                let key = client.get_key(&kid).await?;
                self.verify(decomposed, &key, alg)
            }
            (KeySource::Jwks(_), None) if self.require_kid => Err(ValidationError::MissingKeyId),
            (KeySource::Jwks(client), None) => {
                let keys = client.keys().await?;
                let mut tried = false;

                for key in keys.jwks().compatible_keys(alg) {
                    match self.verify(decomposed.clone(), key, alg) {
                        Err(ValidationError::InvalidSignature) => tried = true,
                        other => return other,
                    }
                }

                if tried {
                    Err(ValidationError::InvalidSignature)
                } else {
                    Err(ValidationError::UnknownKey { kid: None })
                }
            }
        }
    }

    fn verify(
        &self,
        decomposed: Decomposed<'_>,
        key: &Jwk,
        alg: Algorithm,
    ) -> Result<Claims, ValidationError> {
        let validated = decomposed
            .verify_with_clock(key, &self.core, &*self.clock)
            .map_err(|err| ValidationError::from_verify(err, alg.name()))?;

        let (_, claims) = validated.extract();
        Ok(claims)
    }
}

/// Tries several validators in order
///
/// The first validator to accept a token wins. If every validator rejects
/// the token, the last rejection is returned.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct CompositeJwtValidator {
    validators: Vec<JwtValidator>,
}

impl CompositeJwtValidator {
    /// Constructs an empty composite
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a validator to try after those already added
    pub fn with_validator(mut self, validator: JwtValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// The validators, in the order they are tried
    #[must_use]
    pub fn validators(&self) -> &[JwtValidator] {
        &self.validators
    }

    /// Validates a token, returning its verified claims
    ///
    /// # Errors
    ///
    /// Every validator rejected the token, or there are no validators.
    pub async fn validate_claims(&self, token: &JwtRef) -> Result<Claims, ValidationError> {
        let mut last = ValidationError::UnknownKey { kid: None };

        for validator in &self.validators {
            match validator.validate_claims(token).await {
                Ok(claims) => return Ok(claims),
                Err(err) => last = err,
            }
        }

        Err(last)
    }

    /// Validates a token, returning an identity carrying its claims
    ///
    /// # Errors
    ///
    /// Every validator rejected the token, or there are no validators.
    pub async fn validate(&self, token: &JwtRef) -> Result<Identity, ValidationError> {
        let claims = self.validate_claims(token).await?;
        Ok(Identity::from_claims(claims.into_map(), AUTHENTICATION_MODE))
    }
}

impl FromIterator<JwtValidator> for CompositeJwtValidator {
    fn from_iter<T: IntoIterator<Item = JwtValidator>>(iter: T) -> Self {
        Self {
            validators: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use tracing_test::traced_test;
    use warden::jwt::Headers;
    use warden_clock::{TestClock, UnixTime};

    use super::*;
    use crate::StaticKeysProvider;

    const SECRET: &[u8] = b"a shared secret of reasonable length";

    fn clock() -> TestClock {
        TestClock::new(UnixTime(1_700_000_000))
    }

    fn config(clock: &TestClock) -> ValidatorConfig {
        ValidatorConfig::new(["https://issuer.example"], ["api"]).with_clock(clock.clone())
    }

    fn claims(clock: &TestClock) -> Claims {
        Claims::new()
            .with_issuer("https://issuer.example")
            .with_audience("api")
            .with_subject("alice")
            .with_future_expiration_from_clock(300, clock)
    }

    fn sign(claims: &Claims, headers: &Headers) -> Result<warden::Jwt> {
        Ok(claims.sign(&Jwk::from(jwa::Hmac::new(SECRET)), headers)?)
    }

    #[tokio::test]
    async fn symmetric_round_trip() -> Result<()> {
        let clock = clock();
        let validator = JwtValidator::symmetric(config(&clock), SECRET)?;
        let token = sign(&claims(&clock), &Headers::new(Algorithm::HS256))?;

        let identity = validator.validate(&token).await?;
        assert!(identity.is_authenticated());
        assert_eq!(identity.authentication_mode(), Some(AUTHENTICATION_MODE));
        assert_eq!(identity.sub(), Some("alice"));
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn rejections_are_logged() -> Result<()> {
        let clock = clock();
        let validator = JwtValidator::symmetric(config(&clock), SECRET)?;
        let token = sign(&claims(&clock), &Headers::new(Algorithm::HS256))?;

        clock.inc(301);
        let err = validator.validate(&token).await.unwrap_err();
        assert_eq!(err.claim(), Some("exp"));
        assert!(logs_contain("token rejected"));
        Ok(())
    }

    #[tokio::test]
    async fn unlisted_algorithm_is_unsupported() -> Result<()> {
        let clock = clock();
        let validator = JwtValidator::symmetric(config(&clock), SECRET)?;
        let token = sign(&claims(&clock), &Headers::new(Algorithm::HS384))?;

        let err = validator.validate(&token).await.unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedAlgorithm(alg) if alg == "HS384"));
        Ok(())
    }

    #[tokio::test]
    async fn garbage_is_invalid_format() -> Result<()> {
        let clock = clock();
        let validator = JwtValidator::symmetric(config(&clock), SECRET)?;

        let err = validator
            .validate(JwtRef::from_str("not-a-token"))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTokenFormat(_)));
        Ok(())
    }

    #[test]
    fn symmetric_configuration_is_checked() {
        let clock = clock();
        assert!(matches!(
            JwtValidator::symmetric(config(&clock), Vec::new()),
            Err(ConfigError::EmptySecret)
        ));
        assert!(matches!(
            JwtValidator::symmetric(
                config(&clock).with_algorithms([Algorithm::HS256, Algorithm::RS256]),
                SECRET
            ),
            Err(ConfigError::IncompatibleAlgorithm(Algorithm::RS256))
        ));
        assert!(matches!(
            JwtValidator::symmetric(
                ValidatorConfig::new(Vec::<Issuer>::new(), ["api"]),
                SECRET
            ),
            Err(ConfigError::MissingIssuers)
        ));
        assert!(matches!(
            JwtValidator::symmetric(
                ValidatorConfig::new(["iss"], Vec::<Audience>::new()),
                SECRET
            ),
            Err(ConfigError::MissingAudiences)
        ));
    }

    fn jwks_validator(clock: &TestClock, require_kid: bool) -> Result<JwtValidator> {
        let jwks = [
            Jwk::from(jwa::Hmac::new(b"some other secret".to_vec())).with_key_id("other"),
            Jwk::from(jwa::Hmac::new(SECRET)).with_key_id("shared"),
        ]
        .into_iter()
        .collect();
        let client = JwksClient::builder(StaticKeysProvider::new(jwks))
            .with_clock(clock.clone())
            .build();

        Ok(JwtValidator::asymmetric(
            config(clock)
                .with_algorithms([Algorithm::HS256])
                .require_kid(require_kid),
            client,
        )?)
    }

    #[tokio::test]
    async fn missing_kid_is_rejected_when_required() -> Result<()> {
        let clock = clock();
        let validator = jwks_validator(&clock, true)?;
        let token = sign(&claims(&clock), &Headers::new(Algorithm::HS256))?;

        assert!(matches!(
            validator.validate(&token).await,
            Err(ValidationError::MissingKeyId)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn missing_kid_tries_every_compatible_key() -> Result<()> {
        let clock = clock();
        let validator = jwks_validator(&clock, false)?;
        let token = sign(&claims(&clock), &Headers::new(Algorithm::HS256))?;

        let identity = validator.validate(&token).await?;
        assert_eq!(identity.sub(), Some("alice"));
        Ok(())
    }

    #[tokio::test]
    async fn named_key_is_used() -> Result<()> {
        let clock = clock();
        let validator = jwks_validator(&clock, true)?;

        let good = sign(
            &claims(&clock),
            &Headers::new(Algorithm::HS256).with_key_id("shared"),
        )?;
        assert_eq!(validator.validate(&good).await?.sub(), Some("alice"));

        let wrong = sign(
            &claims(&clock),
            &Headers::new(Algorithm::HS256).with_key_id("other"),
        )?;
        assert!(matches!(
            validator.validate(&wrong).await,
            Err(ValidationError::InvalidSignature)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn composite_uses_first_acceptance() -> Result<()> {
        let clock = clock();
        let other = JwtValidator::symmetric(
            ValidatorConfig::new(["https://elsewhere.example"], ["api"]).with_clock(clock.clone()),
            b"unrelated".to_vec(),
        )?;
        let ours = JwtValidator::symmetric(config(&clock), SECRET)?;
        let token = sign(&claims(&clock), &Headers::new(Algorithm::HS256))?;

        let composite: CompositeJwtValidator = [other.clone(), ours].into_iter().collect();
        assert_eq!(composite.validators().len(), 2);
        assert_eq!(composite.validate(&token).await?.sub(), Some("alice"));

        let lone = CompositeJwtValidator::new().with_validator(other);
        assert!(matches!(
            lone.validate(&token).await,
            Err(ValidationError::InvalidSignature)
        ));

        assert!(CompositeJwtValidator::new().validate(&token).await.is_err());
        Ok(())
    }
}
