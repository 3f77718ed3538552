use super::store::{artifact_name, sniff_extension};
use super::*;
use aiimg_types::GenerationError;
use base64::Engine as _;
use std::collections::HashSet;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
const RETENTION: Duration = Duration::from_secs(15 * 60);

fn png() -> Vec<u8> {
    base64::engine::general_purpose::STANDARD.decode(PNG_1X1).unwrap()
}

fn store(dir: &TempDir) -> ArtifactStore {
    ArtifactStore::new(dir.path(), RETENTION)
}

fn set_mtime(path: &std::path::Path, mtime: SystemTime) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(mtime).unwrap();
}

#[test]
fn test_artifact_name_format() {
    let created = chrono::DateTime::parse_from_rfc3339("2025-03-04T05:06:07Z").unwrap().with_timezone(&chrono::Utc);
    let name = artifact_name(created, "png");
    assert!(name.starts_with("aiimg_20250304_050607_"), "{}", name);
    assert!(name.ends_with(".png"));
    assert_eq!(name.len(), "aiimg_20250304_050607_".len() + 8 + ".png".len());
    assert!(is_artifact_name(&name));
}

#[test]
fn test_is_artifact_name() {
    assert!(is_artifact_name("aiimg_20250101_000000_deadbeef.jpg"));
    assert!(is_artifact_name("aiimg_x.WEBP"));
    assert!(!is_artifact_name("aiimg_20250101_000000_deadbeef.png.part"));
    assert!(!is_artifact_name("holiday.png"));
    assert!(!is_artifact_name("aiimg_notes.txt"));
    assert!(!is_artifact_name("aiimg_noext"));
}

#[test]
fn test_sniff_extension() {
    assert_eq!(sniff_extension(&png()).unwrap(), "png");
    assert_eq!(sniff_extension(b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00").unwrap(), "jpg");
    assert_eq!(sniff_extension(b"GIF89a\x01\x00\x01\x00").unwrap(), "gif");
    assert!(matches!(sniff_extension(b""), Err(GenerationError::ArtifactDecode { .. })));
    assert!(matches!(sniff_extension(b"<html>nope</html>"), Err(GenerationError::ArtifactDecode { .. })));
}

#[tokio::test]
async fn test_save_writes_validated_bytes() {
    let dir = TempDir::new().unwrap();
    let handle = store(&dir).save(&png()).await.unwrap();

    assert_eq!(handle.extension(), Some("png"));
    assert_eq!(handle.size, png().len());
    assert_eq!(handle.path, dir.path().join(&handle.id));
    assert_eq!(std::fs::read(&handle.path).unwrap(), png());

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .filter(|n| n.ends_with(PARTIAL_SUFFIX))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_save_creates_missing_directory() {
    let dir = TempDir::new().unwrap();
    let nested = ArtifactStore::new(dir.path().join("a/b"), RETENTION);
    let handle = nested.save(&png()).await.unwrap();
    assert!(handle.path.exists());
}

#[tokio::test]
async fn test_save_rejects_non_image() {
    let dir = TempDir::new().unwrap();
    let err = store(&dir).save(b"definitely not an image").await.unwrap_err();
    assert!(matches!(err, GenerationError::ArtifactDecode { .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_save_base64_accepts_data_uri() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);

    let plain = store.save_base64(PNG_1X1).await.unwrap();
    let uri = store.save_base64(&format!("data:image/png;base64,{}", PNG_1X1)).await.unwrap();
    assert_eq!(std::fs::read(plain.path).unwrap(), std::fs::read(uri.path).unwrap());

    let err = store.save_base64("!!not base64!!").await.unwrap_err();
    assert!(matches!(err, GenerationError::ArtifactDecode { .. }));
}

#[tokio::test]
async fn test_concurrent_saves_get_unique_names() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move { store.save(&png()).await.unwrap().id }));
    }
    let mut ids = HashSet::new();
    for task in tasks {
        ids.insert(task.await.unwrap());
    }
    assert_eq!(ids.len(), 32);
}

#[tokio::test]
async fn test_cleanup_removes_only_expired() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let now = SystemTime::now();

    let old = store.save(&png()).await.unwrap();
    let boundary = store.save(&png()).await.unwrap();
    let young = store.save(&png()).await.unwrap();
    set_mtime(&old.path, now - Duration::from_secs(3600));
    set_mtime(&boundary.path, now - RETENTION);
    set_mtime(&young.path, now - Duration::from_secs(14 * 60));

    let report = store.cleanup(now).await;

    assert_eq!(report.removed, 2);
    assert_eq!(report.retained, 1);
    assert!(report.skipped.is_empty());
    assert!(!old.path.exists());
    assert!(!boundary.path.exists());
    assert!(young.path.exists());
}

#[tokio::test]
async fn test_cleanup_keeps_files_newer_than_scan() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let scan_started = SystemTime::now() - Duration::from_secs(60);

    let handle = store.save(&png()).await.unwrap();
    let report = store.cleanup(scan_started).await;

    assert_eq!(report.removed, 0);
    assert_eq!(report.retained, 1);
    assert!(handle.path.exists());
}

#[tokio::test]
async fn test_cleanup_ignores_foreign_files() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let ancient = SystemTime::now() - Duration::from_secs(24 * 3600);

    for name in ["notes.txt", "photo.png", "aiimg_notes.txt", "holiday.png.part"] {
        let path = dir.path().join(name);
        std::fs::write(&path, b"x").unwrap();
        set_mtime(&path, ancient);
    }

    let report = store.cleanup(SystemTime::now()).await;
    assert_eq!(report, CleanupReport::default());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
}

#[tokio::test]
async fn test_cleanup_reclaims_stale_partial_writes() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let stale = dir.path().join("aiimg_20200101_000000_00000000.png.part");
    let active = dir.path().join("aiimg_20200101_000000_11111111.png.part");
    let reservation = dir.path().join("aiimg_20200101_000000_22222222.png");
    for path in [&stale, &active, &reservation] {
        std::fs::write(path, b"").unwrap();
    }
    set_mtime(&stale, SystemTime::now() - RETENTION - Duration::from_secs(60));
    set_mtime(&reservation, SystemTime::now() - RETENTION - Duration::from_secs(60));

    let report = store.cleanup(SystemTime::now()).await;
    assert_eq!(report.removed, 2);
    assert_eq!(report.retained, 1);
    assert!(!stale.exists());
    assert!(!reservation.exists());
    assert!(active.exists(), "a write in progress must survive");
}

#[tokio::test]
async fn test_cleanup_records_unremovable_entry_and_continues() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let first = store.save(&png()).await.unwrap();
    let second = store.save(&png()).await.unwrap();
    // An artifact-named directory cannot be removed with remove_file
    let blocker = dir.path().join("aiimg_20200101_000000_deadbeef.png");
    std::fs::create_dir(&blocker).unwrap();
    std::fs::write(blocker.join("inner"), b"x").unwrap();

    let later = SystemTime::now() + RETENTION * 2;
    let report = store.cleanup(later).await;

    assert_eq!(report.removed, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, blocker);
    assert!(!report.is_noop());
    assert!(!first.path.exists());
    assert!(!second.path.exists());
    assert!(blocker.join("inner").exists());
}

#[test]
fn test_hint_matches_extension() {
    assert!(hint_matches_extension("png", "png"));
    assert!(hint_matches_extension("image/jpeg", "jpg"));
    assert!(hint_matches_extension("JPEG", "jpg"));
    assert!(!hint_matches_extension("webp", "png"));
    assert!(is_partial_name("aiimg_x.png.part"));
    assert!(!is_partial_name("holiday.png.part"));
}

#[tokio::test]
async fn test_cleanup_is_idempotent_and_tolerates_missing_dir() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let handle = store.save(&png()).await.unwrap();
    let later = SystemTime::now() + RETENTION + Duration::from_secs(1);

    assert_eq!(store.cleanup(later).await.removed, 1);
    assert!(store.cleanup(later).await.is_noop());
    assert!(!handle.path.exists());

    let missing = ArtifactStore::new(dir.path().join("nope"), RETENTION);
    assert_eq!(missing.cleanup(later).await, CleanupReport::default());
}
