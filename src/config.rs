// src/config.rs
// Env-driven configuration. `.env` is loaded by the binary before this runs.
// Missing credentials disable the matching collaborator instead of failing
// startup, so the status surface stays reachable even half-configured.

use std::str::FromStr;

const DEFAULT_PORTAL_URL: &str = "https://tp.bitmesra.co.in";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub portal_base_url: String,
    pub portal_username: Option<String>,
    pub portal_password: Option<String>,

    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub whatsapp_phone: Option<String>,
    pub whatsapp_apikey: Option<String>,

    pub db_path: String,

    /// Seconds between scheduled detection cycles.
    pub check_interval_secs: u64,
    /// How far back a candidate's publish time may be to still count as current.
    pub lookback_hours: i64,
    /// How long a fingerprint stays in the active dedup set.
    pub retention_days: i64,
    /// Per-request timeout on outbound notification calls.
    pub notify_timeout_secs: u64,

    pub port: u16,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Like `env_parse`, but a zero or negative value would invert the window
/// semantics, so those fall back to the default too.
fn env_parse_window(key: &str, default: i64) -> i64 {
    match env_parse(key, default) {
        v if v > 0 => v,
        _ => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            portal_base_url: env_opt("TP_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PORTAL_URL.to_string()),
            portal_username: env_opt("TP_USERNAME"),
            portal_password: env_opt("TP_PASSWORD"),
            telegram_bot_token: env_opt("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: env_opt("TELEGRAM_CHAT_ID"),
            whatsapp_phone: env_opt("WHATSAPP_PHONE"),
            whatsapp_apikey: env_opt("WHATSAPP_APIKEY"),
            db_path: env_opt("TNP_DB_PATH").unwrap_or_else(|| "tnp_monitor.db".to_string()),
            check_interval_secs: env_parse("CHECK_INTERVAL_SECS", 600),
            lookback_hours: env_parse_window("LOOKBACK_HOURS", 24),
            retention_days: env_parse_window("RETENTION_DAYS", 7),
            notify_timeout_secs: env_parse("NOTIFY_TIMEOUT_SECS", 15),
            port: env_parse("PORT", 5000),
        }
    }

    pub fn has_portal_credentials(&self) -> bool {
        self.portal_username.is_some() && self.portal_password.is_some()
    }
}
