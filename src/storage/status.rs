// restoretool/src/storage/status.rs
use chrono::{DateTime, Utc};

use super::{ArchiveStore, BackupArchiveRef};
use crate::config::MonitorConfig;

/// Health snapshot of one backup destination, used to decide which
/// destinations are offered for restore.
#[derive(Debug, Clone)]
pub struct DestinationStatus {
    pub backup_name: String,
    pub disk_name: String,
    pub reachable: bool,
    pub backups: Vec<BackupArchiveRef>,
    max_age_in_days: i64,
    max_storage_in_bytes: u64,
}

impl DestinationStatus {
    pub async fn inspect(store: &dyn ArchiveStore, monitor: &MonitorConfig) -> Self {
        let (reachable, backups) = match store.list().await {
            Ok(backups) => (true, backups),
            Err(e) => {
                tracing::warn!("Backup destination '{}' is unreachable: {:#}", store.backup_name(), e);
                (false, Vec::new())
            }
        };
        Self::from_listing(store.backup_name(), store.disk_name(), reachable, backups, monitor)
    }

    pub fn from_listing(
        backup_name: &str,
        disk_name: &str,
        reachable: bool,
        backups: Vec<BackupArchiveRef>,
        monitor: &MonitorConfig,
    ) -> Self {
        DestinationStatus {
            backup_name: backup_name.to_string(),
            disk_name: disk_name.to_string(),
            reachable,
            backups,
            max_age_in_days: monitor.max_age_in_days,
            max_storage_in_bytes: monitor.max_storage_in_bytes,
        }
    }

    pub fn amount_of_backups(&self) -> usize {
        self.backups.len()
    }

    pub fn newest_backup(&self) -> Option<&BackupArchiveRef> {
        self.backups.iter().max_by_key(|b| b.created_at)
    }

    pub fn used_storage(&self) -> u64 {
        self.backups.iter().map(|b| b.size).sum()
    }

    pub fn newest_backup_is_too_old(&self, now: DateTime<Utc>) -> bool {
        match self.newest_backup() {
            Some(newest) => (now - newest.created_at).num_days() >= self.max_age_in_days,
            None => true,
        }
    }

    pub fn uses_too_much_storage(&self) -> bool {
        self.max_storage_in_bytes > 0 && self.used_storage() > self.max_storage_in_bytes
    }

    pub fn is_healthy(&self, now: DateTime<Utc>) -> bool {
        self.reachable && !self.newest_backup_is_too_old(now) && !self.uses_too_much_storage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn monitor(days: i64, bytes: u64) -> MonitorConfig {
        MonitorConfig {
            max_age_in_days: days,
            max_storage_in_bytes: bytes,
        }
    }

    #[test]
    fn test_healthy_destination() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let backups = vec![
            BackupArchiveRef::new("a.zip", now - Duration::hours(3), 100),
            BackupArchiveRef::new("b.zip", now - Duration::days(3), 50),
        ];
        let status = DestinationStatus::from_listing("app", "local", true, backups, &monitor(1, 1000));

        assert_eq!(status.amount_of_backups(), 2);
        assert_eq!(status.used_storage(), 150);
        assert_eq!(status.newest_backup().map(|b| b.location.as_str()), Some("a.zip"));
        assert!(status.is_healthy(now));
    }

    #[test]
    fn test_unhealthy_destinations() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let stale = vec![BackupArchiveRef::new("a.zip", now - Duration::days(2), 10)];
        let status = DestinationStatus::from_listing("app", "local", true, stale, &monitor(1, 1000));
        assert!(status.newest_backup_is_too_old(now));
        assert!(!status.is_healthy(now));

        let big = vec![BackupArchiveRef::new("a.zip", now, 2000)];
        let status = DestinationStatus::from_listing("app", "local", true, big, &monitor(1, 1000));
        assert!(status.uses_too_much_storage());
        assert!(!status.is_healthy(now));

        let empty = DestinationStatus::from_listing("app", "local", true, Vec::new(), &monitor(1, 1000));
        assert!(!empty.is_healthy(now));

        let unreachable = DestinationStatus::from_listing("app", "s3", false, Vec::new(), &monitor(1, 0));
        assert!(!unreachable.is_healthy(now));
    }

    #[tokio::test]
    async fn test_inspect_missing_local_destination_is_unreachable() {
        let root = tempfile::tempdir().unwrap();
        let store = crate::storage::local::LocalArchiveStore::new(root.path(), "nothing-here");
        let status = DestinationStatus::inspect(&store, &MonitorConfig::default()).await;
        assert!(!status.reachable);
        assert_eq!(status.amount_of_backups(), 0);
    }
}
