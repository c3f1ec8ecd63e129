//! Archive stores: where finished backups live and how to bring one local.

pub mod local;
pub mod s3;
pub mod status;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Date format used to pick an archive by its creation time.
pub const ARCHIVE_DATE_KEY_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// File name suffixes recognised as backup archives.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[".zip", ".tar.gz", ".tgz"];

/// One archive held by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArchiveRef {
    /// Store-specific location (a file path or an object key).
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

impl BackupArchiveRef {
    pub fn new(location: impl Into<String>, created_at: DateTime<Utc>, size: u64) -> Self {
        BackupArchiveRef {
            location: location.into(),
            created_at,
            size,
        }
    }

    /// Last path segment of the location.
    pub fn basename(&self) -> String {
        self.location
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.location)
            .to_string()
    }

    pub fn date_key(&self) -> String {
        self.created_at.format(ARCHIVE_DATE_KEY_FORMAT).to_string()
    }
}

/// Remote (or local) home of the archives for one backup destination.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Normalized backup name this store serves.
    fn backup_name(&self) -> &str;

    /// Short label of the storage kind, e.g. `local` or `s3`.
    fn disk_name(&self) -> &str;

    /// All archives of this destination, newest first.
    async fn list(&self) -> Result<Vec<BackupArchiveRef>>;

    /// Copies the bytes of `archive` to `destination`, returning the number of
    /// bytes written.
    async fn fetch(&self, archive: &BackupArchiveRef, destination: &Path) -> Result<u64>;
}

pub fn is_archive_name(name: &str) -> bool {
    ARCHIVE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Newest first, ties broken by location so listings are stable.
pub(crate) fn sort_newest_first(archives: &mut [BackupArchiveRef]) {
    archives.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.location.cmp(&b.location))
    });
}
