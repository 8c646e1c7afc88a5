use schoolbook::media::{MediaStore, image_filename, sanitize_filename};
use std::path::PathBuf;

fn temp_root(tag: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "schoolbook-media-{}-{}",
        tag,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&root);
    root
}

#[test]
fn test_sanitize_replaces_spaces_with_underscores() {
    assert_eq!(
        sanitize_filename("my school photo.png"),
        "my_school_photo.png"
    );
}

#[test]
fn test_sanitize_strips_directory_components() {
    assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
    assert_eq!(sanitize_filename("/tmp/evil.png"), "evil.png");
}

#[test]
fn test_sanitize_falls_back_on_hostile_names() {
    assert_eq!(sanitize_filename(""), "upload");
    assert_eq!(sanitize_filename(".."), "upload");
}

#[test]
fn test_filename_is_timestamp_prefixed() {
    assert_eq!(
        image_filename("a b.png", 1700000000000),
        "1700000000000_a_b.png"
    );
}

#[tokio::test]
async fn test_commit_moves_image_into_public_dir() {
    let root = temp_root("commit");
    let store = MediaStore::new(root.clone());

    let staged = store.stage_image("school.png", b"png-bytes").await.unwrap();
    let public = staged.public_path().to_string();
    assert!(public.starts_with("/schoolimage/"));
    assert!(public.ends_with("school.png"));

    staged.commit().await.unwrap();

    let committed = root.join(public.trim_start_matches('/'));
    assert_eq!(std::fs::read(&committed).unwrap(), b"png-bytes");

    let staging = root.join("schoolimage/.staging");
    assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
}

#[tokio::test]
async fn test_discard_leaves_nothing_behind() {
    let root = temp_root("discard");
    let store = MediaStore::new(root.clone());

    let staged = store.stage_image("school.png", b"png-bytes").await.unwrap();
    staged.discard().await;

    let staging = root.join("schoolimage/.staging");
    assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);

    let committed: Vec<_> = std::fs::read_dir(root.join("schoolimage"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name() != ".staging")
        .collect();
    assert!(committed.is_empty());
}

#[tokio::test]
async fn test_prepare_is_idempotent() {
    let root = temp_root("prepare");
    let store = MediaStore::new(root.clone());
    store.prepare().await.unwrap();
    store.prepare().await.unwrap();
    assert!(root.join("schoolimage/.staging").is_dir());
}
