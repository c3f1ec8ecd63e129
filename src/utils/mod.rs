pub mod setting;

use chrono::{DateTime, Utc};
use humansize::{DECIMAL, format_size};
use url::Url;

/// Connection URL with the password masked, safe for logs.
pub fn redact_url(db_url: &str) -> String {
    match Url::parse(db_url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("****"));
            }
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}

pub fn human_readable_size(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

/// "0 days", "1 day", "12 days" old, relative to `now`.
pub fn age_in_days(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now - then).num_days().max(0);
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}

/// Status glyph for a boolean column.
pub fn emoji(flag: bool) -> &'static str {
    if flag { "✅" } else { "❌" }
}
