//! Age-based cleanup of the shared output directory.
//!
//! The engine writes every artifact to disk and never deletes them, so a
//! long-lived worker would eventually fill its volume. [`cleanup_old_outputs`]
//! is a stateless sweep run at worker start.

use std::path::Path;
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

/// Delete regular files under `dir` whose modification time is older than
/// `max_age`. Returns the number of files removed.
///
/// A missing directory is not an error. Files that cannot be inspected or
/// removed are logged and skipped.
pub fn cleanup_old_outputs(dir: &Path, max_age: Duration) -> usize {
    if !dir.exists() {
        return 0;
    }

    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return 0;
    };
    let mut cleaned = 0;

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| match e {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unreadable directory entry");
            None
        }
    }) {
        if !entry.file_type().is_file() {
            continue;
        }

        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            Ok(Err(e)) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "No mtime, skipping");
                continue;
            }
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "No metadata, skipping");
                continue;
            }
        };

        if modified >= cutoff {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => cleaned += 1,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to delete old output");
            }
        }
    }

    if cleaned > 0 {
        tracing::info!(cleaned, dir = %dir.display(), "Cleaned up old output files");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn age_file(path: &Path, age: Duration) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn old_files_removed_new_files_kept() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old_output.mp4");
        let new = dir.path().join("new_output.mp4");
        std::fs::write(&old, b"old data").unwrap();
        std::fs::write(&new, b"new data").unwrap();
        age_file(&old, 2 * DAY);

        let cleaned = cleanup_old_outputs(dir.path(), DAY);

        assert_eq!(cleaned, 1);
        assert!(!old.exists());
        assert!(new.exists());
    }

    #[test]
    fn sweep_recurses_into_subfolders() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("videos");
        std::fs::create_dir(&sub).unwrap();
        let old = sub.join("clip.mp4");
        std::fs::write(&old, b"x").unwrap();
        age_file(&old, 3 * DAY);

        assert_eq!(cleanup_old_outputs(dir.path(), DAY), 1);
        assert!(!old.exists());
        assert!(sub.exists(), "directories are left in place");
    }

    #[test]
    fn missing_directory_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_outputs(&dir.path().join("nope"), DAY), 0);
    }
}
