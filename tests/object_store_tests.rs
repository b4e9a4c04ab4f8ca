use bytes::Bytes;
use shortcdn::object_store::{LocalStore, ObjectStore, ObjectStoreError};
use tokio::io::AsyncReadExt;

fn test_store() -> (tempfile::TempDir, LocalStore, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(&[dir.path().join("uploads"), dir.path().join("uploads_admin")])
        .unwrap();
    let root = store.roots()[0].clone();
    (dir, store, root)
}

#[tokio::test]
async fn test_local_store_put_get() {
    let (_dir, store, root) = test_store();
    let path = root.join("test-key.txt");

    let data = Bytes::from("hello world");
    store.put(&path, data.clone()).await.unwrap();

    assert_eq!(store.get(&path).await.unwrap(), data);
    assert_eq!(store.read_text(&path).await.unwrap(), "hello world");
}

#[tokio::test]
async fn test_local_store_open_streams_content() {
    let (_dir, store, root) = test_store();
    let path = root.join("stream.bin");
    store.put(&path, Bytes::from_static(&[1, 2, 3, 0, 4])).await.unwrap();

    let mut object = store.open(&path).await.unwrap();
    assert_eq!(object.len, 5);
    let mut buf = Vec::new();
    object.reader.read_to_end(&mut buf).await.unwrap();
    assert_eq!(buf, vec![1, 2, 3, 0, 4]);
}

#[tokio::test]
async fn test_local_store_exists() {
    let (_dir, store, root) = test_store();

    assert!(!store.exists(&root.join("missing")).await.unwrap());

    store.put(&root.join("present"), Bytes::from("data")).await.unwrap();
    assert!(store.exists(&root.join("present")).await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete() {
    let (_dir, store, root) = test_store();
    let path = root.join("to-delete");

    store.put(&path, Bytes::from("data")).await.unwrap();
    store.delete(&path).await.unwrap();
    assert!(!store.exists(&path).await.unwrap());

    // Deleting a nonexistent object should not error
    store.delete(&path).await.unwrap();
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let (_dir, store, root) = test_store();

    let result = store.get(&root.join("missing")).await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));

    let result = store.open(&root.join("missing")).await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_refuses_paths_outside_roots() {
    let (dir, store, root) = test_store();

    let outside = dir.path().join("elsewhere.txt");
    std::fs::write(&outside, b"secret").unwrap();
    assert!(matches!(
        store.get(&outside).await,
        Err(ObjectStoreError::OutsideRoot(_))
    ));

    let escaping = root.join("..").join("elsewhere.txt");
    assert!(matches!(
        store.read_text(&escaping).await,
        Err(ObjectStoreError::OutsideRoot(_))
    ));
    assert!(matches!(
        store.put(&escaping, Bytes::from("x")).await,
        Err(ObjectStoreError::OutsideRoot(_))
    ));
    assert!(!store.contains(&root));
}

#[tokio::test]
async fn test_local_store_admin_root_is_writable() {
    let (_dir, store, _root) = test_store();
    let admin = store.roots()[1].join("kept.bin");

    store.put(&admin, Bytes::from("admin")).await.unwrap();
    assert!(store.exists(&admin).await.unwrap());
}

#[tokio::test]
async fn test_local_store_rename_and_list() {
    let (_dir, store, root) = test_store();
    store.put(&root.join("b.txt"), Bytes::from("b")).await.unwrap();
    store.put(&root.join("a.txt"), Bytes::from("a")).await.unwrap();
    std::fs::create_dir(root.join("subdir")).unwrap();

    assert_eq!(
        store.list(&root).await.unwrap(),
        vec![root.join("a.txt"), root.join("b.txt")]
    );

    store
        .rename(&root.join("a.txt"), &root.join("c.txt"))
        .await
        .unwrap();
    assert_eq!(
        store.list(&root).await.unwrap(),
        vec![root.join("b.txt"), root.join("c.txt")]
    );
}

#[tokio::test]
async fn test_local_store_overwrite() {
    let (_dir, store, root) = test_store();
    let path = root.join("key");

    store.put(&path, Bytes::from("first")).await.unwrap();
    store.put(&path, Bytes::from("second")).await.unwrap();

    assert_eq!(store.get(&path).await.unwrap(), Bytes::from("second"));
}
