//! Advisory file locking and atomic JSON writes.
//!
//! Engines on different worktrees share the journal and topology cache, so
//! every write to a shared file is serialised with an advisory lock and made
//! visible atomically: readers observe either the pre-write or the post-write
//! content, never a torn file.
//!
//! The locking discipline:
//! - JSON documents lock a sibling `<name>.lock` file, never the document
//!   itself, so the atomic rename does not race the lock.
//! - Appends (journals) lock the file itself; the lock spans exactly one
//!   line so concurrent writers interleave lines but never tear one.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use fs2::FileExt;

/// Path of the sibling lockfile for a JSON document.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}

/// Append one line to `path` under an exclusive lock.
///
/// Creates parent directories as needed. The file is opened in append mode,
/// so the write lands after any line a concurrent writer just released.
pub fn locked_append(path: &Path, line: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.lock_exclusive()
        .with_context(|| format!("Failed to lock {}", path.display()))?;
    let result = writeln!(file, "{line}")
        .and_then(|()| file.flush())
        .with_context(|| format!("Failed to append to {}", path.display()));
    let _ = fs2::FileExt::unlock(&file);
    result
}

/// Read a whole file under a shared lock.
pub fn read_locked(path: &Path) -> anyhow::Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    file.lock_shared()
        .with_context(|| format!("Failed to lock {}", path.display()))?;
    let mut content = String::new();
    let result = file
        .read_to_string(&mut content)
        .with_context(|| format!("Failed to read {}", path.display()));
    let _ = fs2::FileExt::unlock(&file);
    result?;
    Ok(content)
}

/// Write `data` to `path` atomically.
///
/// Writes to a temporary file in the same directory, then renames over the
/// target. A sibling `.lock` file serialises concurrent writers.
pub fn atomic_write(path: &Path, data: &str) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .context("Atomic write target has no parent directory")?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let lock_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(lock_path(path))
        .with_context(|| format!("Failed to open lock for {}", path.display()))?;
    lock_file
        .lock_exclusive()
        .with_context(|| format!("Failed to lock {}", path.display()))?;

    let result = (|| {
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
        tmp.write_all(data.as_bytes())
            .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
        tmp.persist(path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    })();

    let _ = fs2::FileExt::unlock(&lock_file);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path(Path::new("/a/b/state.json")),
            PathBuf::from("/a/b/state.json.lock")
        );
    }

    #[test]
    fn atomic_write_replaces_content() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("doc.json");
        atomic_write(&target, "{\"v\":1}").unwrap();
        atomic_write(&target, "{\"v\":2}").unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "{\"v\":2}");
        assert!(lock_path(&target).exists());
    }

    #[test]
    fn locked_append_accumulates_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested").join("journal.log");
        locked_append(&target, "first").unwrap();
        locked_append(&target, "second").unwrap();
        let content = std::fs::read_to_string(&target).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn concurrent_atomic_writes_leave_one_intact_document() {
        use std::sync::Arc;

        let tmp = tempfile::tempdir().unwrap();
        let target = Arc::new(tmp.path().join("doc.json"));

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let target = Arc::clone(&target);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let doc = format!("{{\"writer\":{writer},\"iteration\":{i}}}");
                        atomic_write(&target, &doc).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // The surviving file is exactly one of the writes, never a blend.
        let content = std::fs::read_to_string(&*target).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert!(value["writer"].is_u64());
        assert!(value["iteration"].is_u64());
    }

    #[test]
    fn concurrent_appends_never_tear_lines() {
        use std::sync::Arc;

        let tmp = tempfile::tempdir().unwrap();
        let target = Arc::new(tmp.path().join("journal.log"));

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let target = Arc::clone(&target);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        locked_append(&target, &format!("writer-{writer} line-{i}")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let content = std::fs::read_to_string(&*target).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 8 * 25);
        for line in lines {
            assert!(line.starts_with("writer-"), "torn line: {line:?}");
        }
    }
}
