pub mod openweather;
pub mod service;
pub mod types;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::time::Duration;

/// Per-city cache, keyed by the city string exactly as requested.
pub type WeatherCache<T> = Cache<String, CachedEntry<T>>;

pub fn init_cache<T>(max_capacity: u64, ttl: Option<Duration>) -> WeatherCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    let builder = Cache::builder().max_capacity(max_capacity);
    match ttl {
        Some(ttl) => builder.time_to_live(ttl).build(),
        None => builder.build(),
    }
}

#[derive(Clone, Debug)]
pub struct CachedEntry<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedEntry<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.cached_at).num_seconds()
    }
}
