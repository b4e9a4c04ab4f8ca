use std::path::PathBuf;

use shortcdn::dispatch::{self, DispatchError, Resolution};
use shortcdn::object_store::LocalStore;
use shortcdn::storage::models::{ResourceDescriptor, StoredValue};
use shortcdn::storage::KeyStore;
use tokio::io::AsyncReadExt;

struct Fixture {
    _dir: tempfile::TempDir,
    keys: KeyStore,
    objects: LocalStore,
    root: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let keys = KeyStore::open(dir.path().join("data")).unwrap();
    let objects = LocalStore::new(&[dir.path().join("uploads")]).unwrap();
    let root = objects.roots()[0].clone();
    Fixture {
        _dir: dir,
        keys,
        objects,
        root,
    }
}

impl Fixture {
    fn store_file(&self, key: &str, name: &str, data: &[u8], code: bool) -> PathBuf {
        let path = self.root.join(name);
        std::fs::write(&path, data).unwrap();
        let path_str = path.to_string_lossy().into_owned();
        let descriptor = if code {
            ResourceDescriptor::Code {
                path: path_str,
                mimetype: "rs".to_string(),
            }
        } else {
            ResourceDescriptor::File {
                path: path_str,
                mimetype: "application/pdf".to_string(),
            }
        };
        self.keys.put_descriptor(key, &descriptor).unwrap();
        path
    }
}

#[tokio::test]
async fn test_missing_key_is_not_found() {
    let f = fixture();
    for segment in ["nothere", "nothere.txt", "a1b2c3d4"] {
        let result = dispatch::resolve(&f.keys, &f.objects, segment).await;
        assert!(matches!(result, Err(DispatchError::NotFound(_))));
    }
}

#[tokio::test]
async fn test_code_entry_renders_stored_content() {
    let f = fixture();
    f.store_file("code0001", "code0001.rs", b"fn main() {}\n", true);

    match dispatch::resolve(&f.keys, &f.objects, "code0001.rs").await {
        Ok(Resolution::Snippet(snippet)) => {
            assert_eq!(snippet.key, "code0001");
            assert_eq!(snippet.content, "fn main() {}\n");
            assert_eq!(snippet.preview, "fn main() {}\n");
            assert_eq!(snippet.language, "rs");
        }
        _ => panic!("expected a snippet"),
    }

    // No extension in the request means no highlighting hint
    match dispatch::resolve(&f.keys, &f.objects, "code0001").await {
        Ok(Resolution::Snippet(snippet)) => assert_eq!(snippet.language, ""),
        _ => panic!("expected a snippet"),
    }
}

#[tokio::test]
async fn test_file_entry_streams_exact_bytes() {
    let f = fixture();
    let data = b"%PDF-1.4\x00\x01\x02binary";
    f.store_file("file0001", "file0001.pdf", data, false);

    match dispatch::resolve(&f.keys, &f.objects, "file0001.pdf").await {
        Ok(Resolution::File {
            key,
            mime_type,
            mut reader,
        }) => {
            assert_eq!(key, "file0001");
            assert_eq!(mime_type, "application/pdf");
            assert_eq!(reader.len, data.len() as u64);
            let mut buf = Vec::new();
            reader.reader.read_to_end(&mut buf).await.unwrap();
            assert_eq!(buf, data);
        }
        _ => panic!("expected a file"),
    }
}

#[tokio::test]
async fn test_short_entry_redirects() {
    let f = fixture();
    f.keys
        .put_descriptor(
            "lnk00001",
            &ResourceDescriptor::Short {
                target: "http://example.com/page".to_string(),
            },
        )
        .unwrap();

    match dispatch::resolve(&f.keys, &f.objects, "lnk00001").await {
        Ok(Resolution::Redirect(target)) => assert_eq!(target, "http://example.com/page"),
        _ => panic!("expected a redirect"),
    }
}

#[tokio::test]
async fn test_removed_backing_file_is_gone_once() {
    let f = fixture();
    let code = f.store_file("code0002", "code0002.rs", b"let x = 1;", true);
    let file = f.store_file("file0002", "file0002.pdf", b"%PDF", false);
    std::fs::remove_file(code).unwrap();
    std::fs::remove_file(file).unwrap();

    for key in ["code0002", "file0002"] {
        // Still live in the store until observed
        assert!(f.keys.exists(key).unwrap());

        let result = dispatch::resolve(&f.keys, &f.objects, key).await;
        assert!(matches!(result, Err(DispatchError::Gone(_))), "{key}");
        assert!(!f.keys.exists(key).unwrap());

        let result = dispatch::resolve(&f.keys, &f.objects, key).await;
        assert!(matches!(result, Err(DispatchError::NotFound(_))), "{key}");
    }
}

#[tokio::test]
async fn test_non_descriptor_value_is_not_found() {
    let f = fixture();
    f.keys.set("plain", &StoredValue::from("pong")).unwrap();
    f.keys
        .set(
            "odd",
            &StoredValue::Structured(serde_json::json!({"type": "video", "path": "/x"})),
        )
        .unwrap();

    for key in ["plain", "odd"] {
        let result = dispatch::resolve(&f.keys, &f.objects, key).await;
        assert!(matches!(result, Err(DispatchError::NotFound(_))), "{key}");
    }
}

#[tokio::test]
async fn test_path_outside_roots_is_never_read() {
    let f = fixture();
    let outside = f.root.parent().unwrap().join("outside.txt");
    std::fs::write(&outside, b"do not serve").unwrap();
    f.keys
        .put_descriptor(
            "escape01",
            &ResourceDescriptor::Code {
                path: outside.to_string_lossy().into_owned(),
                mimetype: "txt".to_string(),
            },
        )
        .unwrap();

    let result = dispatch::resolve(&f.keys, &f.objects, "escape01").await;
    assert!(matches!(result, Err(DispatchError::NotFound(_))));
    assert!(outside.exists());
}
