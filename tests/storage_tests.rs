use keny_cafe::storage::{
    LocalStorage, StorageError, StorageService, allowed_extension, generate_upload_name, upload_url,
};
use std::collections::HashSet;
use uuid::Uuid;

// --- Helpers ---

#[test]
fn test_allowed_extension_is_case_insensitive() {
    assert_eq!(allowed_extension("latte.JPG").as_deref(), Some(".jpg"));
    assert_eq!(allowed_extension("latte.jpeg").as_deref(), Some(".jpeg"));
    assert_eq!(allowed_extension("menu.PnG").as_deref(), Some(".png"));
    assert_eq!(allowed_extension("banner.webp").as_deref(), Some(".webp"));
}

#[test]
fn test_disallowed_extensions() {
    for name in ["a.exe", "a.gif", "a.svg", "a.png.exe", "png", ".png", ""] {
        assert_eq!(allowed_extension(name), None, "{name:?}");
    }
}

#[test]
fn test_generated_names_are_unique_and_keep_extension() {
    let names: HashSet<String> = (0..100).map(|_| generate_upload_name(".png")).collect();
    assert_eq!(names.len(), 100);
    assert!(names.iter().all(|n| n.ends_with(".png") && !n.contains('/')));
}

#[test]
fn test_upload_url_prefix() {
    assert_eq!(upload_url("abc.jpg"), "/uploads/abc.jpg");
}

// --- LocalStorage ---

fn temp_root() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("keny-cafe-storage-{}", Uuid::new_v4()))
}

#[tokio::test]
async fn test_local_storage_writes_file() {
    let root = temp_root();
    let storage = LocalStorage::new(&root);
    storage.ensure_ready().await.unwrap();
    assert!(root.is_dir());

    storage.store("abc.jpg", b"jpeg-bytes").await.unwrap();
    let written = tokio::fs::read(root.join("abc.jpg")).await.unwrap();
    assert_eq!(written, b"jpeg-bytes");

    tokio::fs::remove_dir_all(&root).await.unwrap();
}

#[tokio::test]
async fn test_local_storage_creates_missing_root_on_store() {
    let root = temp_root().join("nested");
    let storage = LocalStorage::new(&root);

    storage.store("late.png", b"png").await.unwrap();
    assert!(root.join("late.png").is_file());

    tokio::fs::remove_dir_all(root.parent().unwrap()).await.unwrap();
}

#[tokio::test]
async fn test_local_storage_refuses_path_escapes() {
    let root = temp_root();
    let storage = LocalStorage::new(&root);

    for name in ["../evil.jpg", "nested/evil.jpg", "..", ""] {
        let result = storage.store(name, b"x").await;
        assert!(matches!(result, Err(StorageError::InvalidName(_))), "{name:?}");
    }
    assert!(!root.exists());
}
