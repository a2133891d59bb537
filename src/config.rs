use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::{AppError, Result};
use crate::mailer::MailConfig;
use crate::novelty::WatchList;

pub const DEFAULT_APPOINTMENT_URL: &str = "https://telegov.njportal.com/njmvc/AppointmentWizard/11";
pub const DEFAULT_MAIL_API_URL: &str = "https://api.brevo.com/v3/smtp/email";
const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub appointment_url: String,
    pub default_cutoff: NaiveDate,
    pub target_locations: Vec<String>,
    pub enable_email: bool,
    pub refresh_interval: Duration,
    pub scrape_timeout: Duration,
    pub state_file: PathBuf,
    pub mail: MailConfig,
    pub mail_dry_run: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `load` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // Load server configuration with defaults
        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = get("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let default_cutoff = match get("DEFAULT_CUTOFF_DATE") {
            Some(raw) => NaiveDate::parse_from_str(&raw, DATE_FMT)
                .map_err(|e| AppError::ConfigError(format!("Invalid DEFAULT_CUTOFF_DATE {:?}: {}", raw, e)))?,
            None => NaiveDate::from_ymd_opt(2025, 8, 15)
                .ok_or_else(|| AppError::ConfigError("Invalid built-in cutoff date".to_string()))?,
        };

        let refresh_minutes = parse_number(get("REFRESH_MINUTES"), "REFRESH_MINUTES", 10)?;
        if refresh_minutes == 0 {
            return Err(AppError::ConfigError("REFRESH_MINUTES must be at least 1".to_string()));
        }
        let scrape_timeout_ms = parse_number(get("SCRAPE_TIMEOUT_MS"), "SCRAPE_TIMEOUT_MS", 25_000)?;
        if scrape_timeout_ms == 0 {
            return Err(AppError::ConfigError("SCRAPE_TIMEOUT_MS must be at least 1".to_string()));
        }

        let mail = MailConfig {
            api_url: get("MAIL_API_URL").unwrap_or_else(|| DEFAULT_MAIL_API_URL.to_string()),
            api_key: get("MAIL_API_KEY"),
            from: get("MAIL_FROM"),
            to: get("MAIL_TO").map(|v| split_list(&v)).unwrap_or_default(),
            subject_prefix: lookup("MAIL_SUBJECT_PREFIX").unwrap_or_else(|| "[NJ MVC]".to_string()),
        };

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            appointment_url: get("APPOINTMENT_URL").unwrap_or_else(|| DEFAULT_APPOINTMENT_URL.to_string()),
            default_cutoff,
            target_locations: get("TARGET_LOCATIONS").map(|v| split_list(&v)).unwrap_or_default(),
            enable_email: parse_flag(get("ENABLE_EMAIL"), true),
            refresh_interval: Duration::from_secs(refresh_minutes * 60),
            scrape_timeout: Duration::from_millis(scrape_timeout_ms),
            state_file: get("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("state").join("notification_state.json")),
            mail,
            mail_dry_run: parse_flag(get("MAIL_DRY_RUN"), false),
        })
    }

    /// No configured targets means every location is watched.
    pub fn watch_list(&self) -> WatchList {
        if self.target_locations.is_empty() {
            WatchList::All
        } else {
            WatchList::only(&self.target_locations)
        }
    }
}

fn parse_number(raw: Option<String>, key: &str, default: u64) -> Result<u64> {
    match raw {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {} {:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(raw) => matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.server_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(cfg.appointment_url, DEFAULT_APPOINTMENT_URL);
        assert_eq!(cfg.default_cutoff, NaiveDate::from_ymd_opt(2025, 8, 15).unwrap());
        assert!(cfg.enable_email);
        assert_eq!(cfg.refresh_interval, Duration::from_secs(600));
        assert_eq!(cfg.scrape_timeout, Duration::from_millis(25_000));
        assert_eq!(cfg.state_file, PathBuf::from("state/notification_state.json"));
        assert_eq!(cfg.mail.subject_prefix, "[NJ MVC]");
        assert_eq!(cfg.watch_list(), WatchList::All);
        assert!(!cfg.mail_dry_run);
    }

    #[test]
    fn reads_overrides() {
        let cfg = load(&[
            ("PORT", "8080"),
            ("DEFAULT_CUTOFF_DATE", "2025-09-01"),
            ("TARGET_LOCATIONS", "Bayonne, Rahway ,,"),
            ("ENABLE_EMAIL", "off"),
            ("MAIL_TO", "a@example.com,b@example.com"),
            ("MAIL_DRY_RUN", "yes"),
        ])
        .unwrap();
        assert_eq!(cfg.server_addr.port(), 8080);
        assert_eq!(cfg.default_cutoff, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
        assert_eq!(cfg.target_locations, ["Bayonne", "Rahway"]);
        assert!(cfg.watch_list().matches("rahway"));
        assert!(!cfg.watch_list().matches("Lodi"));
        assert!(!cfg.enable_email);
        assert_eq!(cfg.mail.to.len(), 2);
        assert!(cfg.mail_dry_run);
    }

    #[test]
    fn malformed_values_are_config_errors() {
        for pairs in [
            [("PORT", "eighty")],
            [("DEFAULT_CUTOFF_DATE", "08/15/2025")],
            [("REFRESH_MINUTES", "0")],
            [("SCRAPE_TIMEOUT_MS", "-1")],
            [("SCRAPE_TIMEOUT_MS", "0")],
            [("HOST", "not-an-ip")],
        ] {
            assert!(matches!(load(&pairs), Err(AppError::ConfigError(_))), "{:?}", pairs);
        }
    }
}
