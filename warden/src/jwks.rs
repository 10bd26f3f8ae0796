use serde::{Deserialize, Serialize};

use crate::{jwa, Jwk};

/// A JSON Web Key Set (JWKS)
///
/// Deserialization is tolerant: entries that cannot be understood (unknown
/// key types, encryption algorithms, unsupported curves) are skipped with a
/// warning instead of failing the whole set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    #[serde(deserialize_with = "deserialize_keys")]
    keys: Vec<Jwk>,
}

impl Jwks {
    /// Adds a key to the set
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }

    /// A view of the keys in this set
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// Whether the set holds no usable keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Every key able to verify signatures made with `alg`, best match first
    pub fn compatible_keys(&self, alg: jwa::Algorithm) -> impl Iterator<Item = &Jwk> {
        let mut scored: Vec<_> = self
            .keys
            .iter()
            .filter_map(|k| score(k, alg).map(|s| (k, s)))
            .collect();
        scored.sort_by(|(_, a), (_, b)| b.cmp(a));
        scored.into_iter().map(|(k, _)| k)
    }
}

impl FromIterator<Jwk> for Jwks {
    fn from_iter<T: IntoIterator<Item = Jwk>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// Scores a key for `alg`, or `None` if it cannot be used
///
/// A declared algorithm outweighs a declared usage. A key that declares a
/// conflicting value is never used.
fn score(k: &Jwk, alg: jwa::Algorithm) -> Option<u8> {
    if !k.is_compatible(alg) {
        return None;
    }

    let mut score = 0;

    if k.algorithm().is_some() {
        score += 2;
    }

    if k.usage().is_some() {
        score += 1;
    }

    Some(score)
}

fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<Jwk>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct MaybeJwksVisitor;

    impl<'de> serde::de::Visitor<'de> for MaybeJwksVisitor {
        type Value = Vec<Jwk>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a list of JWK objects")
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            let mut values = Vec::with_capacity(seq.size_hint().unwrap_or_default());
            let mut index = 0_usize;

            while let Some(value) = seq.next_element()? {
                match value {
                    MaybeJwk::Jwk(jwk) => values.push(jwk),
                    MaybeJwk::Unknown(key) => {
                        tracing::warn!(
                            jwks.idx = index,
                            jwk.kid = ?key.kid,
                            jwk.kty = ?key.kty,
                            "jwk.use" = ?key.r#use,
                            jwk.alg = ?key.alg,
                            "ignoring unsupported JWK"
                        );
                    }
                }
                index += 1;
            }

            Ok(values)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeJwk {
        Jwk(Jwk),
        Unknown(JwkLike),
    }

    #[derive(Deserialize)]
    struct JwkLike {
        #[serde(default)]
        kid: Option<serde_json::Value>,
        #[serde(default)]
        kty: Option<serde_json::Value>,
        #[serde(rename = "use", default)]
        r#use: Option<serde_json::Value>,
        #[serde(default)]
        alg: Option<serde_json::Value>,
    }

    deserializer.deserialize_seq(MaybeJwksVisitor)
}
