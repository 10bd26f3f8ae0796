//! Unpadded URL-safe base64, as used throughout JOSE

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use serde::{de, Deserialize, Deserializer, Serializer};

/// Encodes without padding; tolerates padding on decode since some key
/// publishers emit it.
const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub(crate) fn encode(data: impl AsRef<[u8]>) -> String {
    ENGINE.encode(data)
}

pub(crate) fn encode_into(data: impl AsRef<[u8]>, out: &mut String) {
    ENGINE.encode_string(data, out);
}

pub(crate) fn decode(data: impl AsRef<[u8]>) -> Result<Vec<u8>, base64::DecodeError> {
    ENGINE.decode(data)
}

pub(crate) fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode(data))
}

pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
    decode(encoded.as_bytes()).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_padded_and_unpadded() {
        assert_eq!(decode("dGVzdA").unwrap(), b"test");
        assert_eq!(decode("dGVzdA==").unwrap(), b"test");
        assert_eq!(encode(b"test"), "dGVzdA");
    }

    #[test]
    fn rejects_standard_alphabet() {
        assert!(decode("a+b/").is_err());
    }
}
