mod admin;
mod entries;
mod upload;

use crate::api::response::ApiError;
use crate::codegen::MintError;
use crate::storage::KeyStore;
use crate::AppState;

pub use admin::{health, populate};
pub use entries::{render_snippet, resolve_entry};
pub use upload::{create_shortlink, upload_file};

/// The key store, or 503 when it failed its startup probe.
fn key_store(state: &AppState) -> Result<&KeyStore, ApiError> {
    state
        .keys
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Key store is unavailable"))
}

/// Map a MintError to an ApiError
fn mint_error(e: MintError) -> ApiError {
    match e {
        MintError::Exhausted { .. } => {
            tracing::error!(error = %e, "Key space exhausted");
            ApiError::unavailable("No free short key available, retry shortly")
        }
        MintError::Store(e) => ApiError::internal(e.to_string()),
    }
}

/// Compare a submitted secret against the configured admin password.
///
/// Compared as SHA-256 digests. An empty configured password never matches.
fn is_admin_secret(state: &AppState, submitted: &str) -> bool {
    let expected = &state.config.admin_password;
    if expected.is_empty() || submitted.is_empty() {
        return false;
    }
    let a = ring::digest::digest(&ring::digest::SHA256, submitted.as_bytes());
    let b = ring::digest::digest(&ring::digest::SHA256, expected.as_bytes());
    a.as_ref() == b.as_ref()
}

/// `base/key` or `base/key.ext`.
fn public_url(state: &AppState, key: &str, ext: &str) -> String {
    let base = state.config.public_base();
    if ext.is_empty() {
        format!("{base}/{key}")
    } else {
        format!("{base}/{key}.{ext}")
    }
}
