//! Shared test helpers for shortcdn unit tests.

use std::sync::Arc;

use crate::config::{Config, LimitsConfig, NodeConfig, RetentionConfig, StorageConfig};
use crate::object_store::LocalStore;
use crate::storage::KeyStore;
use crate::{AppState, StorageRoots};

pub const TEST_ADMIN_PASSWORD: &str = "let-me-in";

/// Create a test AppState with a temporary key store and upload roots.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    test_state_with(temp_dir, |_| {})
}

/// Like [`test_state`], with a hook to adjust the configuration first.
pub fn test_state_with(
    temp_dir: &tempfile::TempDir,
    configure: impl FnOnce(&mut Config),
) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");

    let mut config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
            host_name: "host".to_string(),
            https_mode: true,
            probe_timeout_seconds: 5,
        },
        storage: StorageConfig {
            upload_path: temp_dir.path().join("uploads"),
            upload_path_admin: temp_dir.path().join("uploads_admin"),
        },
        limits: LimitsConfig {
            size_limit: 1024,
            size_limit_admin: None,
            blacklist_extensions: vec!["exe".to_string()],
            blacklist_mimetypes: vec![
                "application/x-msdownload".to_string(),
                "application/vnd.microsoft.portable-executable".to_string(),
            ],
        },
        retention: RetentionConfig::default(),
        admin_password: TEST_ADMIN_PASSWORD.to_string(),
        key_length: 8,
    };
    configure(&mut config);

    let roots = StorageRoots::prepare(&config.storage).expect("Failed to create upload roots");
    let keys = KeyStore::open(&data_dir).expect("Failed to open test key store");
    assert!(keys.probe(), "Test key store failed its probe");
    let object_store =
        LocalStore::new(&[&roots.upload, &roots.admin]).expect("Failed to create test object store");

    Arc::new(AppState {
        config,
        roots,
        keys: Some(keys),
        object_store: Arc::new(object_store),
    })
}

/// An AppState whose key store is unavailable.
pub fn degraded_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let state = test_state(temp_dir);
    let roots = state.roots.clone();
    let object_store =
        LocalStore::new(&[&roots.upload, &roots.admin]).expect("Failed to create test object store");
    Arc::new(AppState {
        config: state.config.clone(),
        roots,
        keys: None,
        object_store: Arc::new(object_store),
    })
}
