//! Admission rules for uploads and short link targets.

use url::Url;

/// Outcome of checking an upload against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    /// Carries the offending extension or MIME type.
    RejectType(String),
    /// Carries the limit that was exceeded.
    RejectSize(u64),
}

/// Blacklists and size ceilings applied to uploads.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub extension_blacklist: Vec<String>,
    pub mimetype_blacklist: Vec<String>,
    /// Limit for regular uploads in bytes.
    pub size_limit: u64,
    /// Limit for admin uploads in bytes, `None` for unlimited.
    pub admin_size_limit: Option<u64>,
}

impl UploadPolicy {
    pub fn admit(
        &self,
        filename: &str,
        mime_type: &str,
        byte_length: u64,
        is_admin: bool,
    ) -> Verdict {
        if !is_admin {
            let ext = extension(filename);
            if self.extension_blacklist.iter().any(|b| b == ext) {
                return Verdict::RejectType(ext.to_string());
            }
            if self.mimetype_blacklist.iter().any(|b| b == mime_type) {
                return Verdict::RejectType(mime_type.to_string());
            }
        }

        let limit = if is_admin {
            self.admin_size_limit
        } else {
            Some(self.size_limit)
        };
        match limit {
            Some(limit) if byte_length > limit => Verdict::RejectSize(limit),
            _ => Verdict::Admit,
        }
    }
}

/// The part of `filename` after its last `.`, or `""` when there is none.
pub fn extension(filename: &str) -> &str {
    filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Extension safe to embed in a stored file name, or `""`.
pub fn storage_extension(filename: &str) -> &str {
    let ext = extension(filename);
    if ext.len() <= 16 && ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        ext
    } else {
        ""
    }
}

/// Best-effort content type for an upload.
///
/// UTF-8 content without NUL bytes is text. Binary content is identified by
/// its magic bytes, and the filename is only consulted when those are unknown.
pub fn sniff_mime(filename: &str, data: &[u8]) -> String {
    let guessed = mime_guess::from_path(filename).first();
    let is_text = !data.contains(&0) && std::str::from_utf8(data).is_ok();

    if is_text {
        return guessed
            .filter(|m| m.type_() == mime_guess::mime::TEXT)
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "text/plain".to_string());
    }

    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    guessed
        .filter(|m| m.type_() != mime_guess::mime::TEXT)
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("URL cannot be empty")]
    Empty,
    #[error("Invalid protocol: {0}. Only http:// and https:// are allowed")]
    InvalidProtocol(String),
    #[error("Invalid URL format: {0}")]
    InvalidFormat(String),
}

/// Check that a short link target is an absolute http(s) URL with a host.
pub fn validate_target(target: &str) -> Result<Url, TargetError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(TargetError::Empty);
    }
    // The URL parser strips tabs and newlines; the stored target must not carry them
    if target.chars().any(char::is_control) {
        return Err(TargetError::InvalidFormat(
            "control characters are not allowed".to_string(),
        ));
    }

    let url = Url::parse(target).map_err(|e| TargetError::InvalidFormat(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(TargetError::InvalidProtocol(format!("{other}:"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(TargetError::InvalidFormat("missing host".to_string()));
    }
    Ok(url)
}
