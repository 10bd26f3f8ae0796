//! Key rotation, refresh throttling, and single-flight fetching

mod common;

use std::{sync::Arc, time::Duration};

use color_eyre::Result;
use futures::future::join_all;
use warden::{jwk::KeyId, Jwks};
use warden_oauth2::{JwksClient, JwtValidator, ValidationError};

use common::*;

struct Rotation {
    clock: warden_clock::TestClock,
    provider: Arc<CountingProvider>,
    validator: JwtValidator,
    old: EcSigner,
    new: EcSigner,
}

fn rotation(delay: Duration) -> Result<Rotation> {
    let clock = clock();
    let old = EcSigner::generate();
    let new = EcSigner::generate();

    let provider = Arc::new(
        CountingProvider::new(std::iter::once(old.jwk("old")).collect()).with_delay(delay),
    );
    let client = JwksClient::builder(Arc::clone(&provider))
        .with_clock(clock.clone())
        .with_refresh_interval(Duration::from_secs(120))
        .build();
    let validator = JwtValidator::asymmetric(
        config(&clock).with_algorithms([warden::jwa::Algorithm::ES256]),
        client,
    )?;

    Ok(Rotation {
        clock,
        provider,
        validator,
        old,
        new,
    })
}

impl Rotation {
    fn rotate(&self) {
        let jwks: Jwks = [self.old.jwk("old"), self.new.jwk("new")]
            .into_iter()
            .collect();
        self.provider.set_jwks(jwks);
    }

    fn token(&self, signer: &EcSigner, kid: &str) -> Result<warden::Jwt> {
        Ok(claims(&self.clock).sign(
            signer,
            &warden::jwt::Headers::new(warden::jwa::Algorithm::ES256).with_key_id(kid),
        )?)
    }
}

#[tokio::test]
async fn unknown_kid_inside_refresh_interval_does_not_fetch() -> Result<()> {
    let r = rotation(Duration::ZERO)?;
    let _ = r.validator.validate(&r.token(&r.old, "old")?).await?;
    assert_eq!(r.provider.calls(), 1);

    r.rotate();
    r.clock.inc(119);

    let err = r
        .validator
        .validate(&r.token(&r.new, "new")?)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ValidationError::UnknownKey { kid: Some(kid) } if kid == KeyId::from_static("new")
    ));
    assert_eq!(r.provider.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn unknown_kid_after_refresh_interval_refreshes_once_under_load() -> Result<()> {
    let r = rotation(Duration::from_millis(50))?;
    let identity = r.validator.validate(&r.token(&r.old, "old")?).await?;
    assert_eq!(identity.sub(), Some("alice"));

    r.rotate();
    r.clock.inc(120);

    let token = r.token(&r.new, "new")?;
    let results = join_all((0..16).map(|_| r.validator.validate(&token))).await;

    for result in results {
        assert_eq!(result?.sub(), Some("alice"));
    }
    assert_eq!(r.provider.calls(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_tasks_share_one_fetch() -> Result<()> {
    let r = rotation(Duration::from_millis(50))?;
    let token = r.token(&r.old, "old")?;

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let validator = r.validator.clone();
            let token = token.clone();
            tokio::spawn(async move { validator.validate(&token).await })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await??.sub(), Some("alice"));
    }
    assert_eq!(r.provider.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn abandoned_waiter_does_not_abort_fetch() -> Result<()> {
    let r = rotation(Duration::from_millis(100))?;
    let token = r.token(&r.old, "old")?;

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), r.validator.validate(&token)).await;
    assert!(abandoned.is_err());

    let identity = r.validator.validate(&token).await?;
    assert_eq!(identity.sub(), Some("alice"));
    assert_eq!(r.provider.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn retired_keys_stop_validating_after_refresh() -> Result<()> {
    let r = rotation(Duration::ZERO)?;
    let old_token = r.token(&r.old, "old")?;
    let _ = r.validator.validate(&old_token).await?;

    r.provider.set_jwks(std::iter::once(r.new.jwk("new")).collect());
    r.clock.inc(120);

    let _ = r.validator.validate(&r.token(&r.new, "new")?).await?;
    assert_eq!(r.provider.calls(), 2);

    assert!(matches!(
        r.validator.validate(&old_token).await,
        Err(ValidationError::UnknownKey { .. })
    ));
    assert_eq!(r.provider.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn stale_key_set_is_refetched_after_cache_time() -> Result<()> {
    let clock = clock();
    let signer = EcSigner::generate();
    let provider = Arc::new(CountingProvider::new(
        std::iter::once(signer.jwk("k")).collect(),
    ));
    let client = JwksClient::builder(Arc::clone(&provider))
        .with_clock(clock.clone())
        .with_cache_time(Duration::from_secs(600))
        .build();
    let validator = JwtValidator::asymmetric(
        config(&clock).with_algorithms([warden::jwa::Algorithm::ES256]),
        client,
    )?;

    let sign = |clock: &warden_clock::TestClock| -> Result<warden::Jwt> {
        Ok(claims(clock).sign(
            &signer,
            &warden::jwt::Headers::new(warden::jwa::Algorithm::ES256).with_key_id("k"),
        )?)
    };

    let _ = validator.validate(&sign(&clock)?).await?;
    clock.inc(599);
    let _ = validator.validate(&sign(&clock)?).await?;
    assert_eq!(provider.calls(), 1);

    clock.inc(1);
    let _ = validator.validate(&sign(&clock)?).await?;
    assert_eq!(provider.calls(), 2);
    Ok(())
}
