use crate::utils::{get_env, get_env_or};
use chrono::{TimeDelta, Utc};
use std::time::Duration;

pub const MEMORY_DATABASE_URL: &str = "memory";
pub const SHORT_CODE_LENGTH: usize = 10;
pub const DEFAULT_LOG_FILTER: &str = "shortly=debug,tower_http=debug";

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub server_address: String,
    pub database_max_connections: u32,
    pub password: PasswordSettings,
    /// `None` keeps sessions valid until they are deleted.
    pub session_ttl: Option<TimeDelta>,
    pub session_cleanup_cron: String,
    pub short_code_max_attempts: u32,
    pub request_timeout: Duration,
    pub log_filter: String,
}

/// Argon2 work factor.
#[derive(Debug, Clone, Copy)]
pub struct PasswordSettings {
    pub iterations: u32,
    pub memory_kib: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            iterations: 2,
            memory_kib: 19_456,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Settings::default();
        let session_ttl = session_ttl(get_env_or("SESSION_TTL_MINUTES", 10_080)?)?;
        let request_timeout = request_timeout(get_env_or("REQUEST_TIMEOUT_MS", 3_000)?)?;
        let short_code_max_attempts =
            get_env_or("SHORT_CODE_MAX_ATTEMPTS", defaults.short_code_max_attempts)?;
        if short_code_max_attempts == 0 {
            return Err("SHORT_CODE_MAX_ATTEMPTS must be at least 1".into());
        }
        Ok(Self {
            database_url: get_env("DATABASE_URL")?,
            server_address: get_env_or("SERVER_ADDRESS", defaults.server_address)?,
            database_max_connections: get_env_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            password: PasswordSettings {
                iterations: get_env_or("PASSWORD_HASH_COST", defaults.password.iterations)?,
                memory_kib: get_env_or("PASSWORD_HASH_MEMORY_KIB", defaults.password.memory_kib)?,
            },
            session_ttl,
            session_cleanup_cron: get_env_or("SESSION_CLEANUP_CRON", defaults.session_cleanup_cron)?,
            short_code_max_attempts,
            request_timeout,
            log_filter: get_env_or("RUST_LOG", defaults.log_filter)?,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}

/// `0` disables expiry. Sessions opened now must still get a representable expiry.
fn session_ttl(minutes: i64) -> Result<Option<TimeDelta>, String> {
    if minutes < 0 {
        return Err("SESSION_TTL_MINUTES must not be negative".into());
    }
    if minutes == 0 {
        return Ok(None);
    }
    TimeDelta::try_minutes(minutes)
        .filter(|ttl| Utc::now().checked_add_signed(*ttl).is_some())
        .map(Some)
        .ok_or_else(|| format!("SESSION_TTL_MINUTES is too large: {}", minutes))
}

fn request_timeout(millis: u64) -> Result<Duration, String> {
    if millis == 0 {
        return Err("REQUEST_TIMEOUT_MS must be at least 1".into());
    }
    Ok(Duration::from_millis(millis))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: MEMORY_DATABASE_URL.into(),
            server_address: "0.0.0.0:5000".into(),
            database_max_connections: 20,
            password: PasswordSettings::default(),
            session_ttl: Some(TimeDelta::days(7)),
            session_cleanup_cron: "0 */10 * * * *".into(),
            short_code_max_attempts: 5,
            request_timeout: Duration::from_secs(3),
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}
