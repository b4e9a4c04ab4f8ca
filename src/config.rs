use std::path::PathBuf;

use thiserror::Error;

use crate::retention::RetentionPolicy;
use crate::validate::UploadPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub retention: RetentionConfig,
    /// Shared secret unlocking admin uploads and bulk import. Empty disables both.
    pub admin_password: String,
    /// Length of generated short keys
    pub key_length: usize,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    /// Directory holding the key store database
    pub data_dir: String,
    /// Public host name used when building returned URLs
    pub host_name: String,
    pub https_mode: bool,
    /// Upper bound on the startup key store probe (seconds)
    pub probe_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub upload_path: PathBuf,
    /// Admin uploads land here; never walked by the reaper.
    pub upload_path_admin: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Upload size limit in bytes for regular uploads
    pub size_limit: u64,
    /// Upload size limit in bytes for admin uploads, `None` for unlimited
    pub size_limit_admin: Option<u64>,
    pub blacklist_extensions: Vec<String>,
    pub blacklist_mimetypes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub min_days: u32,
    pub max_days: u32,
    pub interval_seconds: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:6900".to_string(),
            data_dir: "./data".to_string(),
            host_name: "localhost:6900".to_string(),
            https_mode: false,
            probe_timeout_seconds: 5,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let upload_path = PathBuf::from("./uploads");
        Self {
            upload_path_admin: admin_sibling(&upload_path),
            upload_path,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            size_limit: 50 * 1024 * 1024, // 50MB
            size_limit_admin: None,
            blacklist_extensions: ["exe", "sh", "msi", "bat", "dll", "com"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            blacklist_mimetypes: [
                "application/vnd.microsoft.portable-executable",
                "application/x-msi",
                "application/x-msdos-program",
                "application/x-sh",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_days: 30,
            max_days: 180,
            interval_seconds: 3600,
        }
    }
}

/// `<upload>_admin` next to the upload root.
fn admin_sibling(upload_path: &std::path::Path) -> PathBuf {
    let raw = upload_path.to_string_lossy();
    let trimmed = raw.trim_end_matches(['/', '\\']);
    PathBuf::from(format!("{trimmed}_admin"))
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    parse_value(name, std::env::var(name).ok().as_deref(), default)
}

/// Unset or blank falls back to `default`; anything else must parse.
fn parse_value<T: std::str::FromStr>(
    name: &str,
    raw: Option<&str>,
    default: T,
) -> Result<T, ConfigError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v.parse().map_err(|_| {
            ConfigError::ValidationError(format!("{name} is not a valid number: {v}"))
        }),
    }
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|v| {
        v.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let node_defaults = NodeConfig::default();
        let node = NodeConfig {
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or(node_defaults.bind_address),
            data_dir: std::env::var("DATA_DIR").unwrap_or(node_defaults.data_dir),
            host_name: std::env::var("HOST_NAME").unwrap_or(node_defaults.host_name),
            https_mode: env_flag("HTTPS_MODE", node_defaults.https_mode),
            probe_timeout_seconds: env_parse(
                "PROBE_TIMEOUT_SECONDS",
                node_defaults.probe_timeout_seconds,
            )?,
        };

        let upload_path = std::env::var("UPLOAD_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| StorageConfig::default().upload_path);
        let upload_path_admin = std::env::var("UPLOAD_PATH_ADMIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| admin_sibling(&upload_path));

        let limit_defaults = LimitsConfig::default();
        let size_limit_admin = match std::env::var("SIZE_LIMIT_ADMIN") {
            Ok(v) if v.trim().is_empty() || v.trim().eq_ignore_ascii_case("none") => None,
            Ok(v) => Some(parse_value("SIZE_LIMIT_ADMIN", Some(&v), 0u64)?),
            Err(_) => limit_defaults.size_limit_admin,
        };
        let limits = LimitsConfig {
            size_limit: env_parse("SIZE_LIMIT", limit_defaults.size_limit)?,
            size_limit_admin,
            blacklist_extensions: env_list("BLACKLIST_EXTENSIONS")
                .unwrap_or(limit_defaults.blacklist_extensions),
            blacklist_mimetypes: env_list("BLACKLIST_MIMETYPES")
                .unwrap_or(limit_defaults.blacklist_mimetypes),
        };

        let retention_defaults = RetentionConfig::default();
        let retention = RetentionConfig {
            enabled: env_flag("RETENTION_ENABLED", retention_defaults.enabled),
            min_days: env_parse("RETENTION_MIN_DAYS", retention_defaults.min_days)?,
            max_days: env_parse("RETENTION_MAX_DAYS", retention_defaults.max_days)?,
            interval_seconds: env_parse(
                "RETENTION_INTERVAL_SECONDS",
                retention_defaults.interval_seconds,
            )?,
        };

        let config = Config {
            node,
            storage: StorageConfig {
                upload_path,
                upload_path_admin,
            },
            limits,
            retention,
            admin_password: std::env::var("ADMIN_PASSWORD").unwrap_or_default(),
            key_length: env_parse("KEY_LENGTH", 8)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(4..=64).contains(&self.key_length) {
            return Err(ConfigError::ValidationError(
                "KEY_LENGTH must be between 4 and 64".to_string(),
            ));
        }

        if self.limits.size_limit == 0 {
            return Err(ConfigError::ValidationError(
                "SIZE_LIMIT must be greater than 0".to_string(),
            ));
        }

        if self.retention.min_days > self.retention.max_days {
            return Err(ConfigError::ValidationError(
                "RETENTION_MIN_DAYS cannot exceed RETENTION_MAX_DAYS".to_string(),
            ));
        }

        if self.storage.upload_path == self.storage.upload_path_admin {
            return Err(ConfigError::ValidationError(
                "UPLOAD_PATH and UPLOAD_PATH_ADMIN must differ".to_string(),
            ));
        }

        if self.admin_password.is_empty() {
            tracing::warn!("ADMIN_PASSWORD is empty. Admin uploads and bulk import are disabled.");
        }

        Ok(())
    }

    /// Base for returned URLs, e.g. `https://host`.
    pub fn public_base(&self) -> String {
        let scheme = if self.node.https_mode { "https" } else { "http" };
        format!("{scheme}://{}", self.node.host_name)
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            extension_blacklist: self.limits.blacklist_extensions.clone(),
            mimetype_blacklist: self.limits.blacklist_mimetypes.clone(),
            size_limit: self.limits.size_limit,
            admin_size_limit: self.limits.size_limit_admin,
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            min_days: self.retention.min_days as f64,
            max_days: self.retention.max_days as f64,
            size_limit: self.limits.size_limit,
        }
    }
}
