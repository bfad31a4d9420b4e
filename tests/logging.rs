use std::{fs, thread::sleep, time::Duration};

use serial_test::serial;
use tempfile::tempdir;

#[test]
#[serial]
fn writes_log_file_and_ignores_reinit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");

    boxento::logging::init(true, Some(path.clone()));
    tracing::info!("dashboard test message");

    sleep(Duration::from_millis(100));

    assert!(path.exists(), "log file was not created");
    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("dashboard test message"));
    assert_eq!(boxento::logging::active_log_file(), Some(path.as_path()));

    let other = dir.path().join("other.txt");
    boxento::logging::init(false, Some(other.clone()));
    tracing::info!("second");
    sleep(Duration::from_millis(50));
    assert!(!other.exists(), "second init should not install a file writer");
    assert_eq!(boxento::logging::active_log_file(), Some(path.as_path()));
}
