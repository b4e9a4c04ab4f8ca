use serde::{Deserialize, Serialize};

/// What a short key resolves to.
///
/// Serialized as a JSON object tagged by `type` (`code`, `file`, `short`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResourceDescriptor {
    /// Text payload on disk. `mimetype` holds the file extension, not a MIME string.
    Code { path: String, mimetype: String },
    /// Opaque payload on disk with a genuine MIME type.
    File { path: String, mimetype: String },
    /// Redirect target, no backing file.
    Short { target: String },
}

impl ResourceDescriptor {
    /// Backing file path, if this kind has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            ResourceDescriptor::Code { path, .. } | ResourceDescriptor::File { path, .. } => {
                Some(path)
            }
            ResourceDescriptor::Short { .. } => None,
        }
    }
}

/// Storage treatment of an upload, derived from its MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Code,
    File,
}

impl EntryKind {
    /// Anything under `text` renders as a snippet, everything else is served as a file.
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("text") {
            EntryKind::Code
        } else {
            EntryKind::File
        }
    }
}

/// A value held by the key store.
///
/// Structured values (objects and arrays) are kept as JSON text and parsed back
/// transparently on read; anything else passes through as a plain string.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Text(String),
    Structured(serde_json::Value),
}

impl StoredValue {
    pub fn structured<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(StoredValue::Structured(serde_json::to_value(value)?))
    }

    /// Interpret a raw stored string.
    pub fn from_raw(raw: String) -> Self {
        let trimmed = raw.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) =
                serde_json::from_str::<serde_json::Value>(&raw)
            {
                return StoredValue::Structured(value);
            }
        }
        StoredValue::Text(raw)
    }

    pub fn to_raw(&self) -> String {
        match self {
            StoredValue::Text(text) => text.clone(),
            StoredValue::Structured(value) => value.to_string(),
        }
    }

    /// Decode as a resource descriptor. Plain strings and unknown shapes yield `None`.
    pub fn descriptor(&self) -> Option<ResourceDescriptor> {
        match self {
            StoredValue::Structured(value) => serde_json::from_value(value.clone()).ok(),
            StoredValue::Text(_) => None,
        }
    }
}

impl From<&str> for StoredValue {
    fn from(text: &str) -> Self {
        StoredValue::Text(text.to_string())
    }
}

/// On-disk wrapper around a stored value (msgpack).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEntry {
    pub value: String,
    /// Absolute expiry as unix seconds. `None` never expires.
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl KeyEntry {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}
