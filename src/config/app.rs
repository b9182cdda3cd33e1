use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Identity shown by the header profile widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileConfig {
    pub name: String,
    pub email: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub api_base_url: String,
    pub api_timeout: Duration,
    pub users_per_page: u32,
    /// Freshness window of a listing page
    pub users_stale_time: Duration,
    /// Freshness window of a single user, used by hover prefetch
    pub user_stale_time: Duration,
    /// How long a page render waits for a pending fetch before showing the spinner
    pub render_timeout: Duration,
    pub cache_gc_time: Duration,
    pub profile: ProfileConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_base_url: "http://localhost:3000/api".to_string(),
            api_timeout: Duration::from_secs(30),
            users_per_page: 10,
            users_stale_time: Duration::from_secs(600),
            user_stale_time: Duration::from_secs(600),
            render_timeout: Duration::from_millis(1500),
            cache_gc_time: Duration::from_secs(300),
            profile: ProfileConfig {
                name: "Admin".to_string(),
                email: "admin@example.com".to_string(),
                avatar_url: "/static/avatar.svg".to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            host: env_string("HOST", defaults.host),
            port: env_parse("PORT", defaults.port)?,
            api_base_url: env_string("API_BASE_URL", defaults.api_base_url),
            api_timeout: Duration::from_secs(env_parse(
                "API_TIMEOUT_SECS",
                defaults.api_timeout.as_secs(),
            )?),
            users_per_page: positive("USERS_PER_PAGE", env_parse("USERS_PER_PAGE", 10u32)?)?,
            users_stale_time: Duration::from_secs(env_parse(
                "USERS_STALE_SECS",
                defaults.users_stale_time.as_secs(),
            )?),
            user_stale_time: Duration::from_secs(env_parse(
                "USER_STALE_SECS",
                defaults.user_stale_time.as_secs(),
            )?),
            render_timeout: Duration::from_millis(env_parse(
                "RENDER_TIMEOUT_MS",
                defaults.render_timeout.as_millis() as u64,
            )?),
            cache_gc_time: Duration::from_secs(env_parse(
                "CACHE_GC_SECS",
                defaults.cache_gc_time.as_secs(),
            )?),
            profile: ProfileConfig {
                name: env_string("PROFILE_NAME", defaults.profile.name),
                email: env_string("PROFILE_EMAIL", defaults.profile.email),
                avatar_url: env_string("PROFILE_AVATAR_URL", defaults.profile.avatar_url),
            },
        })
    }
}

fn env_string(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(default)
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value,
            })
        }
        _ => Ok(default),
    }
}

fn positive(key: &str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(value)
}
