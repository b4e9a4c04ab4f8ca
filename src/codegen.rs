//! Short key generation.
//!
//! [`generate`] is a read-then-check loop and is racy against concurrent
//! generators: two callers can both see a candidate as free. [`mint`] closes
//! that window by claiming the candidate with [`KeyStore::set_if_absent`] and
//! drawing again if the claim loses.

use thiserror::Error;

use crate::storage::models::{ResourceDescriptor, StoredValue};
use crate::storage::{DatabaseError, KeyStore, PROBE_KEY};

/// Symbols a generated key is drawn from.
pub const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Route names that must never resolve to content.
pub const RESERVED_KEYS: &[&str] = &["upload", "short", PROBE_KEY, "populate"];

/// Upper bound on candidates drawn before giving up.
pub const MAX_ATTEMPTS: usize = 1000;

#[derive(Debug, Error)]
pub enum MintError {
    #[error("No free key of length {length} after {attempts} attempts")]
    Exhausted { length: usize, attempts: usize },
    #[error("Key store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Draw one candidate of `length` symbols uniformly from [`ALPHABET`].
pub fn random_code(length: usize) -> String {
    std::iter::repeat_with(|| ALPHABET[rand::random_range(0..ALPHABET.len())] as char)
        .take(length)
        .collect()
}

/// Whether `key` could have come from the generator and is not a route name.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.bytes().all(|b| ALPHABET.contains(&b))
        && !RESERVED_KEYS.contains(&key)
}

/// Draw candidates until one is neither reserved nor reported live by `exists`.
pub fn generate<F>(length: usize, reserved: &[&str], mut exists: F) -> Result<String, MintError>
where
    F: FnMut(&str) -> Result<bool, DatabaseError>,
{
    for _ in 0..MAX_ATTEMPTS {
        let candidate = random_code(length);
        if reserved.contains(&candidate.as_str()) {
            continue;
        }
        if exists(&candidate)? {
            tracing::debug!(key = %candidate, "Generated key already in use");
            continue;
        }
        return Ok(candidate);
    }

    Err(MintError::Exhausted {
        length,
        attempts: MAX_ATTEMPTS,
    })
}

/// Generate a fresh key and atomically store `make(key)` under it.
pub fn mint<F>(store: &KeyStore, length: usize, make: F) -> Result<String, MintError>
where
    F: Fn(&str) -> ResourceDescriptor,
{
    for _ in 0..MAX_ATTEMPTS {
        let key = generate(length, RESERVED_KEYS, |candidate| store.exists(candidate))?;
        let value = StoredValue::structured(&make(&key)).map_err(DatabaseError::from)?;
        if store.set_if_absent(&key, &value)? {
            return Ok(key);
        }
        tracing::warn!(key = %key, "Lost race claiming generated key, retrying");
    }

    Err(MintError::Exhausted {
        length,
        attempts: MAX_ATTEMPTS,
    })
}
