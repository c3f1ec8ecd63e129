//! Backup Restore Tool
//!
//! Provides a CLI to restore file and database backups from local or S3 destinations

// restoretool/src/main.rs
mod config;
mod errors;
mod restore;
mod storage;
mod utils;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use config::{AppConfig, DEFAULT_CONFIG_PATH};
use dotenv::dotenv;
use restore::RestoreArgs;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    let config_path = env::var("RESTORE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let app_config = AppConfig::load_from_json(&config_path).with_context(|| {
        format!(
            "Failed to load application configuration from {}",
            config_path.display()
        )
    })?;

    let args: Vec<String> = env::args().skip(1).collect();
    let (command, restore_args) = parse_args(&args)?;

    match command.as_str() {
        "restore" => {
            println!("🔄 Starting Restore Process...");
            restore::run_restore_flow(&app_config, restore_args)
                .await
                .context("Restore process failed")?;
        }
        _ => {
            println!("❌ Invalid command. Usage: restoretool restore [backup-name] [date] [--files-only|--databases-only]");
            anyhow::bail!("Invalid command: {}", command);
        }
    }
    Ok(())
}

/// `restore [backup-name] [date] [--files-only|--databases-only]`; the
/// command defaults to `restore`.
fn parse_args(args: &[String]) -> Result<(String, RestoreArgs)> {
    let mut restore_args = RestoreArgs::default();
    let mut positional = Vec::new();

    for arg in args {
        match arg.trim() {
            "--files-only" => restore_args.restore_databases = false,
            "--databases-only" => restore_args.restore_files = false,
            flag if flag.starts_with("--") => anyhow::bail!("Unknown option: {}", flag),
            value => positional.push(value.to_string()),
        }
    }
    if !restore_args.restore_files && !restore_args.restore_databases {
        anyhow::bail!("--files-only and --databases-only can not be combined");
    }

    let mut positional = positional.into_iter();
    let command = positional.next().unwrap_or_else(|| "restore".to_string());
    restore_args.backup_name = positional.next();
    restore_args.backup_date = positional.next();
    Ok((command, restore_args))
}
