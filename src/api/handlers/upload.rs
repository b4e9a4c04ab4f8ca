use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use bytes::{Bytes, BytesMut};
use serde::Deserialize;
use std::sync::Arc;

use super::{is_admin_secret, key_store, mint_error, public_url};
use crate::api::response::{ApiError, AppForm};
use crate::codegen;
use crate::storage::models::{EntryKind, ResourceDescriptor};
use crate::validate::{self, Verdict};
use crate::AppState;

/// Longest `secret` field accepted.
const MAX_SECRET_LEN: u64 = 1024;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ShortlinkForm {
    #[serde(default)]
    pub url: Option<String>,
}

struct UploadedFile {
    name: String,
    content_type: Option<String>,
    data: Bytes,
}

// ============================================================================
// Handlers
// ============================================================================

/// Route: POST /upload (multipart: `file`, optional `secret`)
///
/// The file part is read against the regular size limit unless a valid
/// `secret` part came before it.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<String, ApiError> {
    let mut file: Option<UploadedFile> = None;
    let mut is_admin = false;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(|s| s.to_string());
                let limit = if is_admin {
                    state.config.limits.size_limit_admin
                } else {
                    Some(state.config.limits.size_limit)
                };
                let data = read_capped(&mut field, limit).await.map_err(|e| match e {
                    FieldError::TooLarge(limit) => ApiError::payload_too_large(format!(
                        "File exceeds maximum upload size of {limit} bytes"
                    )),
                    FieldError::Read(e) => {
                        ApiError::bad_request(format!("Failed to read file: {e}"))
                    }
                })?;
                file = Some(UploadedFile {
                    name,
                    content_type,
                    data,
                });
            }
            "secret" => {
                let data = read_capped(&mut field, Some(MAX_SECRET_LEN))
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid secret: {e}")))?;
                let secret = String::from_utf8_lossy(&data);
                is_admin = is_admin_secret(&state, &secret);
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let file = file.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let keys = key_store(&state)?;

    let sniffed = validate::sniff_mime(&file.name, &file.data);
    match state.config.upload_policy().admit(
        &file.name,
        &sniffed,
        file.data.len() as u64,
        is_admin,
    ) {
        Verdict::Admit => {}
        Verdict::RejectType(offending) => {
            tracing::info!(file = %file.name, offending = %offending, "Rejected blacklisted upload");
            return Err(ApiError::unsupported_media_type(format!(
                "File type not allowed: {offending}"
            )));
        }
        Verdict::RejectSize(limit) => {
            return Err(ApiError::payload_too_large(format!(
                "File exceeds maximum upload size of {limit} bytes"
            )));
        }
    }

    let kind = EntryKind::from_mime(&sniffed);
    let ext = validate::storage_extension(&file.name).to_string();
    let root = if is_admin {
        &state.roots.admin
    } else {
        &state.roots.upload
    };

    // Code entries record the extension, files a real MIME type
    let mimetype = match kind {
        EntryKind::Code => ext.clone(),
        EntryKind::File => file
            .content_type
            .clone()
            .filter(|ct| ct != "application/octet-stream")
            .unwrap_or_else(|| sniffed.clone()),
    };

    let stored_name = |key: &str| {
        if ext.is_empty() {
            key.to_string()
        } else {
            format!("{key}.{ext}")
        }
    };

    // Phase 1: claim a key for the descriptor
    let key = codegen::mint(keys, state.config.key_length, |key| {
        let path = root.join(stored_name(key)).to_string_lossy().into_owned();
        match kind {
            EntryKind::Code => ResourceDescriptor::Code {
                path,
                mimetype: mimetype.clone(),
            },
            EntryKind::File => ResourceDescriptor::File {
                path,
                mimetype: mimetype.clone(),
            },
        }
    })
    .map_err(mint_error)?;

    // Phase 2: write the bytes where the descriptor points
    let path = root.join(stored_name(&key));
    let body = match kind {
        EntryKind::Code => Bytes::from(
            String::from_utf8_lossy(&file.data)
                .replace("\r\n", "\n")
                .into_bytes(),
        ),
        EntryKind::File => file.data,
    };
    if let Err(e) = state.object_store.put(&path, body).await {
        // Best-effort cleanup of the claimed key
        if let Err(e) = keys.delete(&key) {
            tracing::warn!(key = %key, error = %e, "Failed to release key after write failure");
        }
        return Err(ApiError::internal(format!("Failed to store file: {e}")));
    }

    tracing::info!(key = %key, kind = ?kind, admin = is_admin, path = %path.display(), "Stored upload");

    Ok(public_url(&state, &key, &ext))
}

/// Route: POST /short (form: `url`)
pub async fn create_shortlink(
    State(state): State<Arc<AppState>>,
    AppForm(form): AppForm<ShortlinkForm>,
) -> Result<String, ApiError> {
    let raw = form
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("No URL provided"))?;
    let parsed = validate::validate_target(&raw).map_err(|e| ApiError::bad_request(e.to_string()))?;

    // Keep the target verbatim unless it needs percent-encoding to fit in a Location header
    let trimmed = raw.trim();
    let target = if trimmed.is_ascii() {
        trimmed.to_string()
    } else {
        parsed.to_string()
    };

    let keys = key_store(&state)?;
    let key = codegen::mint(keys, state.config.key_length, |_| {
        ResourceDescriptor::Short {
            target: target.clone(),
        }
    })
    .map_err(mint_error)?;

    tracing::info!(key = %key, target = %target, "Created short link");

    Ok(public_url(&state, &key, ""))
}

// ============================================================================
// Helpers
// ============================================================================

#[derive(Debug, thiserror::Error)]
enum FieldError {
    #[error("field exceeds {0} bytes")]
    TooLarge(u64),
    #[error("{0}")]
    Read(#[from] axum::extract::multipart::MultipartError),
}

/// Buffer a multipart field chunk by chunk, giving up once it passes `limit`.
async fn read_capped(field: &mut Field<'_>, limit: Option<u64>) -> Result<Bytes, FieldError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await? {
        if let Some(limit) = limit {
            if (buf.len() + chunk.len()) as u64 > limit {
                return Err(FieldError::TooLarge(limit));
            }
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}
