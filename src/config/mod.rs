// restoretool/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::errors::ProfileError;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
const DEFAULT_SCHEMA: &str = "public";
const DEFAULT_MAX_AGE_IN_DAYS: i64 = 1;
const DEFAULT_MAX_STORAGE_IN_MEGABYTES: u64 = 5000;

static BACKUP_NAME_FILTER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[^a-zA-Z0-9.]").expect("static regex is valid"));

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonS3StorageConfig {
    pub bucket_name: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint_url: Option<String>,
    pub folder_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonBackupProfile {
    pub name: String,
    #[serde(default)]
    pub include: Vec<PathBuf>,
    #[serde(default)]
    pub databases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonDatabaseConnection {
    pub url: String,
    pub database: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonMonitorOptions {
    pub max_age_in_days: Option<i64>,
    pub max_storage_in_megabytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJsonConfig {
    pub environment: Option<String>,
    pub scratch_root: Option<PathBuf>,
    pub local_backup_dir: Option<PathBuf>,
    pub s3_storage: Option<JsonS3StorageConfig>,
    pub backups: Option<serde_json::Value>,
    pub database_connections: Option<HashMap<String, JsonDatabaseConnection>>,
    pub monitor: Option<JsonMonitorOptions>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct SpacesConfig {
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub folder_prefix: Option<String>,
}

/// Connection parameters for one logical database connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConnection {
    pub name: String,
    pub url: String,
    pub database: String,
    pub schema: String,
}

impl DatabaseConnection {
    /// The configured URL with its path pointed at `database`, so an override
    /// of the database name switches the connection to that database.
    pub fn connect_url(&self) -> Result<String> {
        let mut url = url::Url::parse(&self.url)
            .with_context(|| format!("Invalid database URL for connection '{}'", self.name))?;
        url.set_path(&format!("/{}", self.database));
        Ok(url.to_string())
    }
}

/// What one named backup source contains: file paths and database connections,
/// both in configuration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreProfile {
    pub name: String,
    pub include: Vec<PathBuf>,
    pub databases: Vec<DatabaseConnection>,
}

impl RestoreProfile {
    /// Name of the storage destination this profile's archives live under.
    pub fn backup_name(&self) -> String {
        normalize_backup_name(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub max_age_in_days: i64,
    pub max_storage_in_bytes: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            max_age_in_days: DEFAULT_MAX_AGE_IN_DAYS,
            max_storage_in_bytes: DEFAULT_MAX_STORAGE_IN_MEGABYTES * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub scratch_root: Option<PathBuf>,
    pub local_backup_dir: Option<PathBuf>,
    pub spaces_config: Option<SpacesConfig>,
    pub monitor: MonitorConfig,
    profiles: Vec<JsonBackupProfile>,
    connections: HashMap<String, JsonDatabaseConnection>,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        Self::from_json_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })
    }

    pub fn from_json_str(config_content: &str) -> Result<Self> {
        let raw_json_config: RawJsonConfig =
            serde_json::from_str(config_content).context("Invalid configuration JSON")?;

        let spaces_config = raw_json_config
            .s3_storage
            .as_ref()
            .and_then(parse_spaces_config);

        if spaces_config.is_none() && raw_json_config.local_backup_dir.is_none() {
            anyhow::bail!(
                "Either local_backup_dir or a complete s3_storage section must be set in config.json."
            );
        }

        let profiles = parse_backup_profiles(&raw_json_config.backups)?;
        if profiles.is_empty() {
            anyhow::bail!("'backups' in config.json must define at least one backup.");
        }

        let monitor = raw_json_config
            .monitor
            .as_ref()
            .map(|m| MonitorConfig {
                max_age_in_days: m.max_age_in_days.unwrap_or(DEFAULT_MAX_AGE_IN_DAYS),
                max_storage_in_bytes: m
                    .max_storage_in_megabytes
                    .unwrap_or(DEFAULT_MAX_STORAGE_IN_MEGABYTES)
                    .saturating_mul(1024 * 1024),
            })
            .unwrap_or_default();

        Ok(AppConfig {
            environment: raw_json_config
                .environment
                .clone()
                .unwrap_or_else(|| "production".to_string()),
            scratch_root: raw_json_config.scratch_root.clone(),
            local_backup_dir: raw_json_config.local_backup_dir.clone(),
            spaces_config,
            monitor,
            profiles,
            connections: raw_json_config.database_connections.unwrap_or_default(),
        })
    }

    /// Destination names of all configured backups, normalized.
    pub fn backup_names(&self) -> Vec<String> {
        self.profiles
            .iter()
            .map(|p| normalize_backup_name(&p.name))
            .collect()
    }

    /// Finds the profile whose normalized name equals `backup_name` and resolves
    /// its database connections.
    pub fn find_profile(&self, backup_name: &str) -> std::result::Result<RestoreProfile, ProfileError> {
        let profile = self
            .profiles
            .iter()
            .find(|p| normalize_backup_name(&p.name) == backup_name)
            .ok_or_else(|| ProfileError::NoMatchingProfile(backup_name.to_string()))?;

        let databases = profile
            .databases
            .iter()
            .map(|connection_name| {
                self.connection(connection_name)?
                    .ok_or_else(|| ProfileError::UnknownConnection {
                        profile: profile.name.clone(),
                        connection: connection_name.clone(),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(RestoreProfile {
            name: profile.name.clone(),
            include: profile.include.clone(),
            databases,
        })
    }

    /// `Ok(None)` when no connection is configured under `name`.
    pub fn connection(
        &self,
        name: &str,
    ) -> std::result::Result<Option<DatabaseConnection>, ProfileError> {
        let Some(raw) = self.connections.get(name) else {
            return Ok(None);
        };
        let database = match &raw.database {
            Some(db) if !db.trim().is_empty() => db.clone(),
            _ => get_db_name_from_url(&raw.url).map_err(|e| ProfileError::InvalidConnectionUrl {
                connection: name.to_string(),
                reason: format!("{:#}", e),
            })?,
        };
        Ok(Some(DatabaseConnection {
            name: name.to_string(),
            url: raw.url.clone(),
            database,
            schema: raw
                .schema
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
        }))
    }
}

/// Decides whether destructive restores are allowed on this machine.
#[derive(Debug, Clone)]
pub struct EnvironmentGuard {
    environment: String,
}

impl EnvironmentGuard {
    /// `APP_ENV` wins over the `environment` key of config.json.
    pub fn from_config(app_config: &AppConfig) -> Self {
        Self::new(&app_config.environment, std::env::var("APP_ENV").ok())
    }

    pub fn new(configured: &str, env_override: Option<String>) -> Self {
        let environment = env_override
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| configured.to_string());
        EnvironmentGuard {
            environment: environment.trim().to_string(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Replaces every character outside `[A-Za-z0-9.]` with `-`, the way backup
/// destinations are named on disk.
pub fn normalize_backup_name(name: &str) -> String {
    BACKUP_NAME_FILTER.replace_all(name, "-").into_owned()
}

/// Extracts the database name from a PostgreSQL connection URL.
pub fn get_db_name_from_url(db_url: &str) -> Result<String> {
    let parsed_url =
        url::Url::parse(db_url).with_context(|| format!("Invalid database URL format: {}", db_url))?;
    let path = parsed_url.path().trim_start_matches('/');
    if path.is_empty() {
        Err(anyhow::anyhow!("Database name not found in URL path: {}", db_url))
    } else {
        Ok(path.to_string())
    }
}

fn parse_spaces_config(s3_raw: &JsonS3StorageConfig) -> Option<SpacesConfig> {
    if let (Some(bucket), Some(region), Some(key_id), Some(secret), Some(endpoint)) = (
        s3_raw.bucket_name.as_ref().filter(|s| !s.is_empty()),
        s3_raw.region.as_ref().filter(|s| !s.is_empty()),
        s3_raw.access_key_id.as_ref().filter(|s| !s.is_empty()),
        s3_raw.secret_access_key.as_ref().filter(|s| !s.is_empty()),
        s3_raw.endpoint_url.as_ref().filter(|s| !s.is_empty()),
    ) {
        Some(SpacesConfig {
            bucket_name: bucket.clone(),
            region: region.clone(),
            access_key_id: key_id.clone(),
            secret_access_key: secret.clone(),
            endpoint_url: endpoint.clone(),
            folder_prefix: s3_raw.folder_prefix.clone().filter(|s| !s.is_empty()),
        })
    } else {
        tracing::warn!(
            "s3_storage is present in config.json but some required fields (bucket_name, region, access_key_id, secret_access_key, endpoint_url) are missing or empty. S3 storage is disabled."
        );
        None
    }
}

/// Parses the `backups` section: either an array of backup objects or a single
/// backup object.
fn parse_backup_profiles(backups: &Option<serde_json::Value>) -> Result<Vec<JsonBackupProfile>> {
    match backups {
        Some(value) if value.is_array() => {
            serde_json::from_value(value.clone()).context("Failed to parse backups as array")
        }
        Some(value) if value.is_object() => {
            let single: JsonBackupProfile = serde_json::from_value(value.clone())
                .context("Failed to parse backups as a single backup object")?;
            Ok(vec![single])
        }
        Some(_) => Err(anyhow::anyhow!(
            "backups must be either an array of backup objects or a single backup object"
        )),
        None => Ok(Vec::new()),
    }
}
