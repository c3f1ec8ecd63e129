// restoretool/src/restore/file_restore.rs
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

use crate::errors::ApplyError;

/// Moves a staged tree (or single file) onto its real location, replacing
/// whatever is there. The parent of `target` must already exist.
pub fn apply(staged: &Path, target: &Path) -> Result<(), ApplyError> {
    move_replacing(staged, target).map_err(|e| ApplyError::FileMove {
        from: staged.to_path_buf(),
        to: target.to_path_buf(),
        reason: format!("{:#}", e),
    })
}

fn move_replacing(staged: &Path, target: &Path) -> Result<()> {
    fs::symlink_metadata(staged)
        .with_context(|| format!("Staged path is missing: {}", staged.display()))?;

    remove_existing(target)?;

    match fs::rename(staged, target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(
                "{} and {} are on different devices, copying instead",
                staged.display(),
                target.display()
            );
            copy_tree(staged, target)?;
            remove_existing(staged)?;
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to rename {} to {}", staged.display(), target.display())
            });
        }
    }

    tracing::info!("Restored {}", target.display());
    Ok(())
}

fn remove_existing(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("Failed to inspect {}", path.display())),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
    .with_context(|| format!("Failed to remove existing {}", path.display()))
}

/// Recursively copies `source` to `destination`. Symlinks are recreated, not followed.
pub fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.with_context(|| format!("Failed to walk directory: {}", source.display()))?;
        let relative = entry.path().strip_prefix(source).with_context(|| {
            format!(
                "Failed to strip prefix {} from {}",
                source.display(),
                entry.path().display()
            )
        })?;
        let out = if relative.as_os_str().is_empty() {
            destination.to_path_buf()
        } else {
            destination.join(relative)
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&out)
                .with_context(|| format!("Failed to create directory {}", out.display()))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &out)?;
        } else {
            fs::copy(entry.path(), &out).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), out.display())
            })?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, out: &Path) -> Result<()> {
    let points_to = fs::read_link(link)?;
    std::os::unix::fs::symlink(&points_to, out)
        .with_context(|| format!("Failed to recreate symlink {}", out.display()))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, out: &Path) -> Result<()> {
    fs::copy(link, out)
        .map(|_| ())
        .with_context(|| format!("Failed to copy {} to {}", link.display(), out.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_tree;

    #[test]
    fn test_apply_replaces_existing_directory() -> anyhow::Result<()> {
        let work = tempfile::tempdir()?;
        let staged = work.path().join("extract/storage/app");
        write_tree(&staged, &[("new.txt", "new"), ("sub/deep.txt", "deep")])?;
        let target = work.path().join("live/app");
        write_tree(&target, &[("stale.txt", "old"), ("new.txt", "old")])?;

        apply(&staged, &target)?;

        assert_eq!(fs::read_to_string(target.join("new.txt"))?, "new");
        assert_eq!(fs::read_to_string(target.join("sub/deep.txt"))?, "deep");
        assert!(!target.join("stale.txt").exists());
        assert!(!staged.exists());
        Ok(())
    }

    #[test]
    fn test_apply_single_file() -> anyhow::Result<()> {
        let work = tempfile::tempdir()?;
        write_tree(work.path(), &[("extract/etc/app.conf", "restored"), ("live/app.conf", "old")])?;

        apply(&work.path().join("extract/etc/app.conf"), &work.path().join("live/app.conf"))?;
        assert_eq!(fs::read_to_string(work.path().join("live/app.conf"))?, "restored");
        Ok(())
    }

    #[test]
    fn test_apply_with_missing_parent_fails() -> anyhow::Result<()> {
        let work = tempfile::tempdir()?;
        let staged = work.path().join("extract/data");
        write_tree(&staged, &[("a.txt", "a")])?;

        let err = apply(&staged, &work.path().join("no/such/parent/data")).unwrap_err();
        assert!(matches!(err, ApplyError::FileMove { .. }));
        assert!(staged.join("a.txt").exists());
        Ok(())
    }

    #[test]
    fn test_apply_missing_staged_path_fails() -> anyhow::Result<()> {
        let work = tempfile::tempdir()?;
        let target = work.path().join("live");
        write_tree(&target, &[("keep.txt", "keep")])?;

        assert!(apply(&work.path().join("extract/gone"), &target).is_err());
        assert!(target.join("keep.txt").exists());
        Ok(())
    }

    #[test]
    fn test_copy_tree() -> anyhow::Result<()> {
        let work = tempfile::tempdir()?;
        let source = work.path().join("source");
        write_tree(&source, &[("a.txt", "a"), ("nested/b.txt", "b")])?;
        fs::create_dir_all(source.join("empty"))?;

        let destination = work.path().join("copy");
        copy_tree(&source, &destination)?;

        assert_eq!(fs::read_to_string(destination.join("a.txt"))?, "a");
        assert_eq!(fs::read_to_string(destination.join("nested/b.txt"))?, "b");
        assert!(destination.join("empty").is_dir());
        assert!(source.join("a.txt").exists());
        Ok(())
    }
}
