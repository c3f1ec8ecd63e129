// Connectivity checks run before anything destructive happens
use sqlx::{Connection, PgConnection};

use super::redact_url;

pub async fn check_db_connection(db_url: &str) -> bool {
    match PgConnection::connect(db_url).await {
        Ok(conn) => {
            let _ = conn.close().await;
            println!("✅ Successfully connected to {}", redact_url(db_url));
            true
        }
        Err(e) => {
            eprintln!("❌ Failed to connect to {}: {}", redact_url(db_url), e);
            false
        }
    }
}
