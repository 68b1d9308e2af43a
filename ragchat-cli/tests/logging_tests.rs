//! File logging setup. Kept in its own test binary because it installs the
//! global subscriber.

use ragchat_cli::logging;

#[test]
fn init_creates_log_directory_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs/nested");

    let guard = logging::init(Some(&log_dir)).unwrap();
    assert!(guard.is_some());
    tracing::warn!("written to the log file");
    drop(guard);

    let files: Vec<String> = std::fs::read_dir(&log_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(files.len(), 1, "{files:?}");
    assert!(files[0].ends_with(".log"), "{files:?}");

    // A second subscriber cannot be installed in the same process.
    assert!(logging::init(None).is_err());
}
