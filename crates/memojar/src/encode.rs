//! Canonical argument encoding
//!
//! Every argument becomes a short token that depends only on its content.
//! Tokens longer than the configured bound are replaced by a truncated 128-bit
//! content hash; at 16 hex characters the chance of a collision stays below
//! 1e-6 among ten million distinct tokens.

use crate::value::{ArgValue, ArrayLike};
use sha2::{Digest, Sha256};

/// Default maximum token length before hashing
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 16;

/// Arrays with more elements than this log a slow-hashing warning
pub const LARGE_ARRAY_ELEMENTS: usize = 9_999_999;

/// 128-bit content hash: the leading half of a SHA-256 digest
#[must_use]
pub fn content_hash_128(bytes: &[u8]) -> [u8; 16] {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest[..16]);
    out
}

/// Hex rendering of [`content_hash_128`], truncated to `len` characters (at most 32)
#[must_use]
pub fn short_hash(text: &str, len: usize) -> String {
    let mut hex = hex::encode(content_hash_128(text.as_bytes()));
    hex.truncate(len);
    hex
}

/// Replace `text` by its short hash when it exceeds `max_len` characters
#[must_use]
pub fn bound_length(text: String, max_len: usize) -> String {
    if text.chars().count() > max_len {
        short_hash(&text, max_len)
    } else {
        text
    }
}

/// Encodes argument values into deterministic tokens
#[derive(Debug, Clone, Copy)]
pub struct ArgEncoder {
    max_len: usize,
}

impl Default for ArgEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKEN_LENGTH)
    }
}

impl ArgEncoder {
    /// Create an encoder that hashes tokens longer than `max_len`
    #[must_use]
    pub const fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// Maximum token length before hashing
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max_len
    }

    /// Encode one value. Never fails; unusual values only log a warning.
    #[must_use]
    pub fn encode(&self, value: &ArgValue) -> String {
        let token = match value {
            // Array digests are already fixed-width and are kept whole
            ArgValue::Array(array) => return hash_array(array.as_ref()),
            ArgValue::Map(entries) => {
                let mut sorted: Vec<&(String, ArgValue)> = entries.iter().collect();
                sorted.sort_by(|a, b| a.0.cmp(&b.0));
                sorted.iter().map(|(_, v)| self.encode(v)).collect()
            }
            ArgValue::List(items) => items.iter().map(|v| self.encode(v)).collect(),
            ArgValue::Callable(name) => name.clone(),
            ArgValue::Opaque { type_name, repr } => {
                tracing::warn!(
                    type_name = %type_name,
                    value = %repr,
                    "Including an opaque {type_name} in the cache key; distinct values with the same text will collide"
                );
                self.text_token(value, repr.clone())
            }
            primitive => self.text_token(primitive, canonical_text(primitive)),
        };
        bound_length(token, self.max_len)
    }

    /// `<text>_`, or the hash of `text` when it contains a key separator
    fn text_token(&self, value: &ArgValue, text: String) -> String {
        if is_ambiguous(value, &text) {
            short_hash(&text, self.max_len)
        } else {
            text + "_"
        }
    }
}

/// Whether `text` could be mistaken for key structure once concatenated:
/// `_` separates tokens, and `-` follows a parameter name prefix. Numbers keep
/// their sign.
fn is_ambiguous(value: &ArgValue, text: &str) -> bool {
    text.contains('_')
        || (text.contains('-') && !matches!(value, ArgValue::Int(_) | ArgValue::Float(_)))
}

/// Hex SHA-256 over `"{shape}_{dtype}"` followed by the array's bytes
#[must_use]
pub fn hash_array(array: &dyn ArrayLike) -> String {
    let shape = array.shape();
    let count = array.element_count();
    if count > LARGE_ARRAY_ELEMENTS {
        tracing::warn!(
            shape = ?shape,
            elements = count,
            "Hashing a large array to build the cache key; this may be slow"
        );
    }
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}_{}", shape, array.dtype()).as_bytes());
    hasher.update(array.contiguous_bytes().as_ref());
    hex::encode(hasher.finalize())
}

/// Canonical text of a value as it appears inside tuple tokens
#[must_use]
pub fn canonical_text(value: &ArgValue) -> String {
    match value {
        ArgValue::None => "None".to_string(),
        ArgValue::Bool(b) => b.to_string(),
        ArgValue::Int(i) => i.to_string(),
        ArgValue::Float(x) => format!("{x:?}"),
        ArgValue::Str(s) => s.clone(),
        ArgValue::Tuple(items) => format!("({})", join_text(items.iter())),
        ArgValue::List(items) => format!("[{}]", join_text(items.iter())),
        ArgValue::Map(entries) => {
            let mut sorted: Vec<&(String, ArgValue)> = entries.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            let body: Vec<String> = sorted
                .iter()
                .map(|(k, v)| format!("{k}: {}", canonical_text(v)))
                .collect();
            format!("{{{}}}", body.join(", "))
        }
        ArgValue::Callable(name) => name.clone(),
        ArgValue::Array(array) => hash_array(array.as_ref()),
        ArgValue::Opaque { repr, .. } => repr.clone(),
    }
}

fn join_text<'a>(items: impl Iterator<Item = &'a ArgValue>) -> String {
    items.map(canonical_text).collect::<Vec<_>>().join(", ")
}
