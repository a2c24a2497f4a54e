use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub openweather_api_key: String,
    pub openweather_base_url: String,
    pub openweather_current_path: String,
    pub openweather_forecast_path: String,
    pub upstream_timeout_secs: u64,
    pub allowed_origin: String,
    pub bind_address: String,
    pub cache_max_capacity: u64,
    pub cache_ttl_secs: Option<u64>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default = |name: &str, default: &str| {
            lookup(name).unwrap_or_else(|| default.to_string())
        };

        Ok(Config {
            openweather_api_key: lookup("OPENWEATHER_API_KEY")
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("OPENWEATHER_API_KEY not set"))?,
            openweather_base_url: or_default("OPENWEATHER_BASE_URL", "https://api.openweathermap.org"),
            openweather_current_path: or_default("OPENWEATHER_CURRENT_PATH", "/data/2.5/weather"),
            openweather_forecast_path: or_default("OPENWEATHER_FORECAST_PATH", "/data/2.5/forecast"),
            upstream_timeout_secs: parse_var(&lookup, "UPSTREAM_TIMEOUT_SECS")?.unwrap_or(10),
            allowed_origin: or_default("ALLOWED_ORIGIN", "http://localhost:3000"),
            bind_address: or_default("BIND_ADDRESS", "0.0.0.0:8080"),
            cache_max_capacity: parse_var(&lookup, "CACHE_MAX_CAPACITY")?.unwrap_or(1000),
            cache_ttl_secs: parse_var(&lookup, "CACHE_TTL_SECS")?,
        })
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
impl Config {
    /// Configuration pointing at a mock upstream, with a short timeout.
    pub fn for_upstream(base_url: &str) -> Self {
        Config {
            openweather_api_key: "test-key".to_string(),
            openweather_base_url: base_url.to_string(),
            openweather_current_path: "/data/2.5/weather".to_string(),
            openweather_forecast_path: "/data/2.5/forecast".to_string(),
            upstream_timeout_secs: 1,
            allowed_origin: "http://localhost:3000".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            cache_max_capacity: 100,
            cache_ttl_secs: None,
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> anyhow::Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw)),
        None => Ok(None),
    }
}
