//! Composite index keys and the cache key codec.
//!
//! A [`CompositeKey`] identifies one logical series inside a day of data
//! (for example a host/interface pair). Cache files that belong to a key, or
//! to a table's tuple of index column names, carry the key in their file name:
//!
//! ```text
//! <prefix>_<token>.<extension>
//! ts_WyJob3N0MSIsImV0aDAiXQ.csv.gz
//! ```
//!
//! The token is the URL-safe, unpadded base64 form of the compact JSON array
//! of key parts. Decoding only ever accepts a JSON array of strings.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Ordered sequence of index column values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(Vec<String>);

impl CompositeKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CompositeKey(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the part at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Filename-safe token for this key.
    pub fn encode(&self) -> String {
        encode_key(self)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

impl From<Vec<String>> for CompositeKey {
    fn from(parts: Vec<String>) -> Self {
        CompositeKey(parts)
    }
}

impl From<&[&str]> for CompositeKey {
    fn from(parts: &[&str]) -> Self {
        CompositeKey::new(parts.iter().copied())
    }
}

/// Encode a key into a filename-safe token.
pub fn encode_key(key: &CompositeKey) -> String {
    // A Vec<String> always serializes; the fallback is unreachable in practice.
    let json = serde_json::to_vec(&key.0).unwrap_or_else(|_| b"[]".to_vec());
    URL_SAFE_NO_PAD.encode(json)
}

/// Decode a token produced by [`encode_key`].
pub fn decode_key(token: &str) -> Result<CompositeKey> {
    decode_token(token).map_err(|reason| Error::FilenameDecode {
        filename: token.to_string(),
        reason,
    })
}

/// Recover the key from a cache file's base name.
///
/// Everything up to the first `_` is the artifact prefix and everything from
/// the first `.` on is the extension.
pub fn decode_filename(filename: &str) -> Result<CompositeKey> {
    let fail = |reason: String| Error::FilenameDecode {
        filename: filename.to_string(),
        reason,
    };
    let stem = filename.split('.').next().unwrap_or_default();
    let (_, token) = stem
        .split_once('_')
        .ok_or_else(|| fail("missing artifact prefix".to_string()))?;
    if token.is_empty() {
        return Err(fail("empty key token".to_string()));
    }
    decode_token(token).map_err(fail)
}

fn decode_token(token: &str) -> std::result::Result<CompositeKey, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim_end_matches('='))
        .map_err(|e| format!("base64 decode failed: {e}"))?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| format!("JSON decode failed: {e}"))?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => return Err(format!("expected a sequence of strings, got {other}")),
    };
    items
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(part) => Ok(part),
            other => Err(format!("key part {other} is not a string")),
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map(CompositeKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn token_of(raw: &str) -> String {
        URL_SAFE_NO_PAD.encode(raw.as_bytes())
    }

    #[test]
    fn roundtrip_simple_key() {
        let key = CompositeKey::new(["srvweb1.example.net", "eth0"]);
        assert_eq!(decode_key(&encode_key(&key)).unwrap(), key);
    }

    #[test]
    fn token_is_filename_safe() {
        let key = CompositeKey::new(["a/b", "c.d", "e_f", "ü"]);
        let token = encode_key(&key);
        assert!(!token.contains('/'));
        assert!(!token.contains('.'));
        assert!(!token.contains('='));
    }

    #[test]
    fn encoding_is_deterministic() {
        let key = CompositeKey::new(["host", "0"]);
        assert_eq!(encode_key(&key), encode_key(&key.clone()));
    }

    #[test]
    fn decode_filename_strips_prefix_and_extension() {
        let key = CompositeKey::new(["host1", "eth0"]);
        let name = format!("ts_{}.csv.gz", encode_key(&key));
        assert_eq!(decode_filename(&name).unwrap(), key);

        let name = format!("tsastat_{}.json", encode_key(&key));
        assert_eq!(decode_filename(&name).unwrap(), key);
    }

    #[test]
    fn decode_accepts_padded_token() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode(br#"["ab"]"#);
        assert!(padded.ends_with('='));
        assert_eq!(decode_key(&padded).unwrap(), CompositeKey::new(["ab"]));
    }

    #[test]
    fn decode_rejects_non_sequence() {
        for raw in [r#"{"a":"b"}"#, r#""plain""#, "42", "null"] {
            let err = decode_key(&token_of(raw)).unwrap_err();
            assert!(matches!(err, Error::FilenameDecode { .. }), "{raw}");
        }
    }

    #[test]
    fn decode_rejects_non_string_parts() {
        for raw in [r#"["a", 1]"#, r#"[["nested"]]"#, r#"[null]"#] {
            assert!(decode_key(&token_of(raw)).is_err(), "{raw}");
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_key("!!!not-base64!!!").is_err());
        assert!(decode_key(&token_of("[\"unterminated")).is_err());
        assert!(decode_filename("quantile.json").is_err());
        assert!(decode_filename("ts_.csv.gz").is_err());
    }

    #[test]
    fn display_lists_parts() {
        let key = CompositeKey::new(["a", "b"]);
        assert_eq!(key.to_string(), "(a, b)");
    }

    proptest! {
        #[test]
        fn encode_decode_roundtrip(parts in proptest::collection::vec(".*", 0..6)) {
            let key = CompositeKey::new(parts);
            prop_assert_eq!(decode_key(&encode_key(&key)).unwrap(), key.clone());
            let name = format!("ts_{}.csv.gz", encode_key(&key));
            prop_assert_eq!(decode_filename(&name).unwrap(), key);
        }
    }
}
