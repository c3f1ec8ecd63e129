// restoretool/src/storage/s3.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::config::Region;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt; // For write_all

use super::{ArchiveStore, BackupArchiveRef, is_archive_name, sort_newest_first};
use crate::config::SpacesConfig;

/// Archives kept in an S3-compatible bucket under `<folder_prefix>/<backup-name>/`.
pub struct S3ArchiveStore {
    client: s3::Client,
    bucket: String,
    prefix: String,
    backup_name: String,
}

impl S3ArchiveStore {
    pub async fn new(spaces_config: &SpacesConfig, backup_name: &str) -> Self {
        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(&spaces_config.endpoint_url)
            .region(Region::new(spaces_config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &spaces_config.access_key_id,
                &spaces_config.secret_access_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ))
            .load()
            .await;

        S3ArchiveStore {
            client: s3::Client::new(&sdk_config),
            bucket: spaces_config.bucket_name.clone(),
            prefix: object_prefix(spaces_config.folder_prefix.as_deref(), backup_name),
            backup_name: backup_name.to_string(),
        }
    }
}

/// Key prefix holding the archives of one backup destination.
fn object_prefix(folder_prefix: Option<&str>, backup_name: &str) -> String {
    match folder_prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}/", prefix, backup_name),
        None => format!("{}/", backup_name),
    }
}

#[async_trait]
impl ArchiveStore for S3ArchiveStore {
    fn backup_name(&self) -> &str {
        &self.backup_name
    }

    fn disk_name(&self) -> &str {
        "s3"
    }

    async fn list(&self) -> Result<Vec<BackupArchiveRef>> {
        let mut archives = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .with_context(|| format!("Failed to list s3://{}/{}", self.bucket, self.prefix))?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                if !is_archive_name(key) {
                    continue;
                }
                let created_at = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_default();
                let size = object.size().unwrap_or(0).max(0) as u64;
                archives.push(BackupArchiveRef::new(key, created_at, size));
            }

            match (page.is_truncated(), page.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        sort_newest_first(&mut archives);
        Ok(archives)
    }

    async fn fetch(&self, archive: &BackupArchiveRef, destination: &Path) -> Result<u64> {
        println!(
            "Downloading s3://{}/{} to {}",
            self.bucket,
            archive.location,
            destination.display()
        );

        let mut output_file = File::create(destination)
            .await
            .with_context(|| format!("Failed to create destination file: {}", destination.display()))?;

        let mut object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&archive.location)
            .send()
            .await
            .with_context(|| format!("Failed to get object s3://{}/{}", self.bucket, archive.location))?;

        let mut total_bytes_downloaded: u64 = 0;
        while let Some(bytes_chunk) = object
            .body
            .try_next()
            .await
            .with_context(|| format!("Failed to read s3://{}/{}", self.bucket, archive.location))?
        {
            output_file
                .write_all(&bytes_chunk)
                .await
                .with_context(|| format!("Failed to write to destination file: {}", destination.display()))?;
            total_bytes_downloaded += bytes_chunk.len() as u64;
        }
        output_file
            .flush()
            .await
            .with_context(|| format!("Failed to flush {}", destination.display()))?;

        println!(
            "✅ Downloaded {} bytes from s3://{}/{}",
            total_bytes_downloaded, self.bucket, archive.location
        );
        Ok(total_bytes_downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_prefix() {
        assert_eq!(object_prefix(None, "my-app"), "my-app/");
        assert_eq!(object_prefix(Some(""), "my-app"), "my-app/");
        assert_eq!(object_prefix(Some("/backups/"), "my-app"), "backups/my-app/");
        assert_eq!(object_prefix(Some("a/b"), "my-app"), "a/b/my-app/");
    }
}
