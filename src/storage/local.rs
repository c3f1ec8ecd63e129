// restoretool/src/storage/local.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{ArchiveStore, BackupArchiveRef, is_archive_name, sort_newest_first};

/// Archives kept on a locally mounted disk under `<root>/<backup-name>/`.
pub struct LocalArchiveStore {
    backup_name: String,
    directory: PathBuf,
}

impl LocalArchiveStore {
    pub fn new(root: impl Into<PathBuf>, backup_name: &str) -> Self {
        let directory = root.into().join(backup_name);
        LocalArchiveStore {
            backup_name: backup_name.to_string(),
            directory,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl ArchiveStore for LocalArchiveStore {
    fn backup_name(&self) -> &str {
        &self.backup_name
    }

    fn disk_name(&self) -> &str {
        "local"
    }

    async fn list(&self) -> Result<Vec<BackupArchiveRef>> {
        let mut entries = fs::read_dir(&self.directory).await.with_context(|| {
            format!(
                "Failed to read backup directory: {}",
                self.directory.display()
            )
        })?;

        let mut archives = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to list {}", self.directory.display()))?
        {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !is_archive_name(&file_name) {
                continue;
            }
            let metadata = entry
                .metadata()
                .await
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            if !metadata.is_file() {
                continue;
            }
            let created_at: DateTime<Utc> = metadata
                .modified()
                .with_context(|| format!("No modification time for {}", entry.path().display()))?
                .into();
            archives.push(BackupArchiveRef::new(
                entry.path().to_string_lossy(),
                created_at,
                metadata.len(),
            ));
        }

        sort_newest_first(&mut archives);
        Ok(archives)
    }

    async fn fetch(&self, archive: &BackupArchiveRef, destination: &Path) -> Result<u64> {
        let source = Path::new(&archive.location);
        tracing::debug!(
            "Copying {} to {}",
            source.display(),
            destination.display()
        );
        fs::copy(source, destination).await.with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_only_returns_archives() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("my-app");
        std::fs::create_dir_all(dir.join("nested.zip"))?;
        std::fs::write(dir.join("2024-01-01-00-00-00.zip"), b"zip bytes")?;
        std::fs::write(dir.join("database_backup_x.tar.gz"), b"tgz")?;
        std::fs::write(dir.join("readme.txt"), b"ignored")?;

        let store = LocalArchiveStore::new(root.path(), "my-app");
        let mut names: Vec<_> = store.list().await?.iter().map(|a| a.basename()).collect();
        names.sort();
        assert_eq!(names, vec!["2024-01-01-00-00-00.zip", "database_backup_x.tar.gz"]);
        assert_eq!(store.backup_name(), "my-app");
        assert_eq!(store.disk_name(), "local");
        Ok(())
    }

    #[tokio::test]
    async fn test_list_missing_directory_fails() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalArchiveStore::new(root.path(), "absent");
        assert!(store.list().await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_copies_bytes() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let dir = root.path().join("my-app");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("a.zip"), b"0123456789")?;

        let store = LocalArchiveStore::new(root.path(), "my-app");
        let archive = store.list().await?.remove(0);
        assert_eq!(archive.size, 10);

        let target = root.path().join("copy.zip");
        let copied = store.fetch(&archive, &target).await?;
        assert_eq!(copied, 10);
        assert_eq!(std::fs::read(&target)?, b"0123456789");
        Ok(())
    }
}
