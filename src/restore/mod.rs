pub(crate) mod archive; // Archive unpacking (zip, tar.gz)
pub(crate) mod db_restore; // Dropping tables and replaying SQL dumps
pub(crate) mod file_restore; // Moving staged trees onto their targets
pub(crate) mod logic; // RestoreEngine
pub(crate) mod plan; // Configured items vs. extracted tree
pub(crate) mod scratch; // Per-attempt temporary directory

use anyhow::{Context, Result};
use chrono::Utc;
use std::io::{Write, stdin, stdout};
use std::sync::Arc;

use crate::config::{AppConfig, EnvironmentGuard, RestoreProfile};
use crate::storage::local::LocalArchiveStore;
use crate::storage::s3::S3ArchiveStore;
use crate::storage::status::DestinationStatus;
use crate::storage::{ArchiveStore, BackupArchiveRef};
use crate::utils::{age_in_days, emoji, human_readable_size, setting::check_db_connection};
use db_restore::PgDatabaseApplier;
use logic::RestoreEngine;
use scratch::ScratchSpace;

/// Selections that would otherwise be asked for interactively.
#[derive(Debug, Clone)]
pub struct RestoreArgs {
    pub backup_name: Option<String>,
    pub backup_date: Option<String>,
    pub restore_files: bool,
    pub restore_databases: bool,
}

impl Default for RestoreArgs {
    fn default() -> Self {
        RestoreArgs {
            backup_name: None,
            backup_date: None,
            restore_files: true,
            restore_databases: true,
        }
    }
}

/// Public entry point for the restore process: pick a destination and an
/// archive, refuse in production, validate, then restore.
pub async fn run_restore_flow(app_config: &AppConfig, args: RestoreArgs) -> Result<()> {
    let mut statuses = Vec::new();
    for backup_name in app_config.backup_names() {
        let store = open_store(app_config, &backup_name).await?;
        let status = DestinationStatus::inspect(store.as_ref(), &app_config.monitor).await;
        statuses.push((store, status));
    }

    let now = Utc::now();
    let (candidates, skipped): (Vec<_>, Vec<_>) = statuses
        .into_iter()
        .partition(|(_, status)| status.reachable && status.is_healthy(now));
    for (_, status) in &skipped {
        tracing::info!("Not offering unhealthy destination '{}'", status.backup_name);
    }

    println!("Available backups for restore");
    print_destination_overview(candidates.iter().map(|(_, s)| s), now);
    if candidates.is_empty() {
        anyhow::bail!("No healthy and reachable backup destination to restore from.");
    }

    let default_name = candidates[0].1.backup_name.clone();
    let backup_name = match args.backup_name {
        Some(name) => name,
        None => prompt("Which backup do you want to restore?", &default_name)?,
    };
    let Some((store, status)) = candidates
        .into_iter()
        .find(|(_, status)| status.backup_name == backup_name)
    else {
        anyhow::bail!("Invalid backup name for restore given: {}", backup_name);
    };

    print_archive_overview(&status.backups);
    let default_date = status
        .backups
        .first()
        .map(BackupArchiveRef::date_key)
        .unwrap_or_default();
    let backup_date = match args.backup_date {
        Some(date) => date,
        None => prompt("Which backup file do you want to restore?", &default_date)?,
    };
    let archive = select_archive(&status.backups, &backup_date)
        .with_context(|| format!("Invalid backup file selected: {}", backup_date))?;

    let guard = EnvironmentGuard::from_config(app_config);
    if guard.is_production() {
        println!("!!! Application in production, can not restore backup !!!");
        anyhow::bail!("Refusing to restore in environment '{}'", guard.environment());
    }

    let profile = app_config
        .find_profile(&backup_name)
        .context("Failed to resolve backup configuration")?;
    if args.restore_databases {
        check_database_connections(&profile).await?;
    }

    let databases = Arc::new(PgDatabaseApplier);
    let engine = match &app_config.scratch_root {
        Some(root) => {
            let scratch = ScratchSpace::acquire_in(root).context("Failed to prepare scratch space")?;
            RestoreEngine::with_scratch(store, databases, archive, profile, scratch)
        }
        None => RestoreEngine::new(store, databases, archive, profile)
            .context("Failed to prepare scratch space")?,
    };
    let mut engine = engine
        .with_files(args.restore_files)
        .with_databases(args.restore_databases);
    tracing::debug!("Using scratch space {}", engine.scratch_path().display());

    println!("🔄 Validating backup...");
    if !engine.validate().await {
        println!("❌ Can not validate backup cause of the following reasons");
        print_restore_errors(engine.errors());
        anyhow::bail!("Backup validation failed");
    }
    println!(
        "✓ Backup is valid: {} paths and {} databases will be replaced.",
        engine.plan().files.len(),
        engine.plan().databases.len()
    );

    if engine.restore().await {
        println!("✅ Restored data successfully");
        Ok(())
    } else {
        println!("❌ Error while restoring the data. Please check your application, maybe it's broken now");
        print_restore_errors(engine.errors());
        anyhow::bail!("Restore failed in state {:?}", engine.state())
    }
}

async fn open_store(app_config: &AppConfig, backup_name: &str) -> Result<Arc<dyn ArchiveStore>> {
    if let Some(spaces_config) = &app_config.spaces_config {
        return Ok(Arc::new(S3ArchiveStore::new(spaces_config, backup_name).await));
    }
    let root = app_config
        .local_backup_dir
        .as_ref()
        .context("local_backup_dir must be set when s3_storage is not configured")?;
    let store = LocalArchiveStore::new(root, backup_name);
    tracing::debug!("Reading local backups from {}", store.directory().display());
    Ok(Arc::new(store))
}

async fn check_database_connections(profile: &RestoreProfile) -> Result<()> {
    for connection in &profile.databases {
        let connect_url = connection.connect_url()?;
        if !check_db_connection(&connect_url).await {
            anyhow::bail!(
                "❌ Cannot proceed with restore - database connection '{}' failed",
                connection.name
            );
        }
    }
    Ok(())
}

/// Picks the archive whose `date_key()` matches `date`.
pub fn select_archive(backups: &[BackupArchiveRef], date: &str) -> Option<BackupArchiveRef> {
    backups.iter().find(|b| b.date_key() == date.trim()).cloned()
}

/// One row of the destination overview; `/` stands in for unknown values.
pub fn destination_row(status: &DestinationStatus, now: chrono::DateTime<Utc>) -> Vec<String> {
    let (amount, newest, used) = if status.reachable {
        (
            status.amount_of_backups().to_string(),
            status
                .newest_backup()
                .map(|b| age_in_days(b.created_at, now))
                .unwrap_or_else(|| "No backups present".to_string()),
            human_readable_size(status.used_storage()),
        )
    } else {
        ("/".to_string(), "/".to_string(), "/".to_string())
    };

    vec![
        status.backup_name.clone(),
        status.disk_name.clone(),
        emoji(status.reachable).to_string(),
        emoji(status.is_healthy(now)).to_string(),
        amount,
        newest,
        used,
    ]
}

fn print_destination_overview<'a>(
    statuses: impl Iterator<Item = &'a DestinationStatus>,
    now: chrono::DateTime<Utc>,
) {
    let headers = ["Name", "Disk", "Reachable", "Healthy", "# of backups", "Newest backup", "Used storage"];
    println!("{}", headers.join(" | "));
    for status in statuses {
        println!("{}", destination_row(status, now).join(" | "));
    }
}

fn print_archive_overview(backups: &[BackupArchiveRef]) {
    println!("Filename | Date | Used storage");
    for backup in backups {
        println!(
            "{} | {} | {}",
            backup.basename(),
            backup.created_at.format("%Y-%m-%d %H:%M:%S"),
            human_readable_size(backup.size)
        );
    }
}

fn print_restore_errors(errors: &[String]) {
    for error in errors {
        eprintln!("  - {}", error);
    }
}

/// Asks a question on stdin, falling back to `default` on an empty answer.
fn prompt(question: &str, default: &str) -> Result<String> {
    print!("{} [{}]: ", question, default);
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    let answer = input.trim();
    Ok(if answer.is_empty() {
        default.to_string()
    } else {
        answer.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_select_archive_by_date_key() {
        let first = Utc.with_ymd_and_hms(2024, 4, 1, 8, 30, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 4, 2, 8, 30, 0).unwrap();
        let backups = vec![
            BackupArchiveRef::new("app/b.zip", second, 2),
            BackupArchiveRef::new("app/a.zip", first, 1),
        ];

        assert_eq!(
            select_archive(&backups, " 2024-04-01-08-30-00 ").map(|b| b.location),
            Some("app/a.zip".to_string())
        );
        assert_eq!(select_archive(&backups, "2024-04-03-00-00-00"), None);
    }

    #[test]
    fn test_destination_row() {
        let now = Utc.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap();
        let monitor = MonitorConfig::default();
        let backups = vec![BackupArchiveRef::new("app/a.zip", now - Duration::days(3), 2_000)];
        let status = DestinationStatus::from_listing("app", "local", true, backups, &monitor);

        let row = destination_row(&status, now);
        assert_eq!(row[0], "app");
        assert_eq!(row[1], "local");
        assert_eq!(row[2], "✅");
        assert_eq!(row[3], "❌");
        assert_eq!(row[4], "1");
        assert_eq!(row[5], "3 days");

        let unreachable = DestinationStatus::from_listing("app", "s3", false, Vec::new(), &monitor);
        let row = destination_row(&unreachable, now);
        assert_eq!(&row[4..], ["/", "/", "/"]);
    }

    #[tokio::test]
    async fn test_open_store_prefers_local_without_s3() -> anyhow::Result<()> {
        let config = AppConfig::from_json_str(
            &serde_json::json!({
                "local_backup_dir": "/var/backups",
                "backups": [{ "name": "app" }]
            })
            .to_string(),
        )?;
        let store = open_store(&config, "app").await?;
        assert_eq!(store.disk_name(), "local");
        assert_eq!(store.backup_name(), "app");
        Ok(())
    }
}
