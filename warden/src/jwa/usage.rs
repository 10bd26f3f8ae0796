use serde::{Deserialize, Serialize};

/// The intended use for a key, as published in the `use` member of a JWK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub enum Usage {
    /// The key is intended for signing and verification
    #[serde(rename = "sig")]
    Signing,

    /// The key is intended for encryption
    #[serde(rename = "enc")]
    Encryption,
}
