use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::{is_admin_secret, key_store, mint_error};
use crate::api::response::{ApiError, AppForm, JSend};
use crate::codegen;
use crate::storage::models::{EntryKind, ResourceDescriptor, StoredValue};
use crate::storage::KeyStore;
use crate::validate;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct PopulateForm {
    #[serde(default)]
    pub passkey: Option<String>,
    #[serde(default)]
    pub clean: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct PopulateResponse {
    pub expired: u64,
    pub registered: u64,
    pub renamed: u64,
    pub skipped: u64,
    pub failed: u64,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<HealthResponse>>, ApiError> {
    key_store(&state)?;
    Ok(JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Register every file already sitting in the upload root.
/// Route: POST /populate (form: `passkey`, optional `clean`)
pub async fn populate(
    State(state): State<Arc<AppState>>,
    AppForm(form): AppForm<PopulateForm>,
) -> Result<Json<JSend<PopulateResponse>>, ApiError> {
    let passkey = form
        .passkey
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::forbidden("Please provide admin password"))?;
    if !is_admin_secret(&state, &passkey) {
        return Err(ApiError::unauthorized("Incorrect admin password"));
    }

    let keys = key_store(&state)?;
    let mut stats = PopulateResponse::default();

    let clean = form
        .clean
        .as_deref()
        .is_some_and(|c| !matches!(c, "" | "0" | "false"));
    if clean {
        stats.expired = keys
            .expire_all()
            .map_err(|e| ApiError::internal(e.to_string()))?;
    }

    let root = state.roots.upload.clone();
    let files = state
        .object_store
        .list(&root)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list uploads: {e}")))?;
    tracing::info!(total = files.len(), "Populating key store from upload root");

    for path in files {
        match register_file(&state, keys, &root, &path).await {
            Ok(Registration::Registered) => stats.registered += 1,
            Ok(Registration::Renamed) => stats.renamed += 1,
            Ok(Registration::AlreadyPresent) => stats.skipped += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = ?e, "Failed to register file");
                stats.failed += 1;
            }
        }
    }

    tracing::info!(
        registered = stats.registered,
        renamed = stats.renamed,
        skipped = stats.skipped,
        failed = stats.failed,
        "Done populating"
    );

    Ok(JSend::success(stats))
}

// ============================================================================
// Helpers
// ============================================================================

enum Registration {
    Registered,
    Renamed,
    AlreadyPresent,
}

fn descriptor_for(path: &Path, ext: &str, mime_type: &str) -> ResourceDescriptor {
    let path = path.to_string_lossy().into_owned();
    match EntryKind::from_mime(mime_type) {
        EntryKind::Code => ResourceDescriptor::Code {
            path,
            mimetype: ext.to_string(),
        },
        EntryKind::File => ResourceDescriptor::File {
            path,
            mimetype: mime_type.to_string(),
        },
    }
}

async fn register_file(
    state: &AppState,
    keys: &KeyStore,
    root: &Path,
    path: &Path,
) -> Result<Registration, ApiError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (file_name.as_str(), ""),
    };

    let data = state
        .object_store
        .get(path)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let mime_type = validate::sniff_mime(&file_name, &data);

    // Keep the file's own name as its key when possible
    if codegen::is_valid_key(stem) {
        let descriptor = descriptor_for(path, ext, &mime_type);
        if keys
            .get_descriptor(stem)
            .map_err(|e| ApiError::internal(e.to_string()))?
            .is_some_and(|existing| existing.path() == descriptor.path())
        {
            return Ok(Registration::AlreadyPresent);
        }
        let value =
            StoredValue::structured(&descriptor).map_err(|e| ApiError::internal(e.to_string()))?;
        if keys
            .set_if_absent(stem, &value)
            .map_err(|e| ApiError::internal(e.to_string()))?
        {
            tracing::debug!(key = %stem, path = %path.display(), "Registered file");
            return Ok(Registration::Registered);
        }
    }

    let ext = validate::storage_extension(&file_name).to_string();
    let target_for = |key: &str| {
        if ext.is_empty() {
            root.join(key)
        } else {
            root.join(format!("{key}.{ext}"))
        }
    };
    let key = codegen::mint(keys, state.config.key_length, |key| {
        descriptor_for(&target_for(key), &ext, &mime_type)
    })
    .map_err(mint_error)?;

    let target = target_for(&key);
    if let Err(e) = state.object_store.rename(path, &target).await {
        if let Err(e) = keys.delete(&key) {
            tracing::warn!(key = %key, error = %e, "Failed to release key after rename failure");
        }
        return Err(ApiError::internal(format!("Failed to rename file: {e}")));
    }

    tracing::warn!(
        from = %path.display(),
        to = %target.display(),
        key = %key,
        "Rerouted file to a fresh key"
    );
    Ok(Registration::Renamed)
}
