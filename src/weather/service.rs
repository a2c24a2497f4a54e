use super::openweather::{OpenWeatherClient, OpenWeatherError};
use super::types::{CurrentWeather, Forecast};
use super::{init_cache, CachedEntry, WeatherCache};
use crate::config::Config;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeatherError {
    #[error("City not found: {0}")]
    CityNotFound(String),
    #[error("{0}")]
    Upstream(String),
}

/// Cache-or-fetch lookup in front of OpenWeather.
///
/// Current weather and forecasts live in separate caches. Concurrent misses
/// for the same city share one upstream request, and failures are never
/// cached.
pub struct WeatherService {
    client: OpenWeatherClient,
    current_cache: WeatherCache<CurrentWeather>,
    forecast_cache: WeatherCache<Forecast>,
}

impl WeatherService {
    pub fn new(client: OpenWeatherClient, config: &Config) -> Self {
        Self {
            client,
            current_cache: init_cache(config.cache_max_capacity, config.cache_ttl()),
            forecast_cache: init_cache(config.cache_max_capacity, config.cache_ttl()),
        }
    }

    pub async fn current_weather(&self, city: &str) -> Result<CurrentWeather, WeatherError> {
        if let Some(entry) = self.current_cache.get(city).await {
            tracing::debug!("Weather cache hit for {} (age {}s)", city, entry.age_secs());
            return Ok(entry.data);
        }

        let entry = self
            .current_cache
            .try_get_with(city.to_string(), async {
                tracing::debug!("Weather cache miss for {}, calling OpenWeather", city);
                let upstream = self
                    .client
                    .fetch_current(city)
                    .await
                    .map_err(|e| upstream_failure("weather", city, e))?;
                Ok::<_, WeatherError>(CachedEntry::new(CurrentWeather::from(&upstream)))
            })
            .await
            .map_err(|e| (*e).clone())?;

        Ok(entry.data)
    }

    pub async fn forecast(&self, city: &str) -> Result<Forecast, WeatherError> {
        if let Some(entry) = self.forecast_cache.get(city).await {
            tracing::debug!("Forecast cache hit for {} (age {}s)", city, entry.age_secs());
            return Ok(entry.data);
        }

        let entry = self
            .forecast_cache
            .try_get_with(city.to_string(), async {
                tracing::debug!("Forecast cache miss for {}, calling OpenWeather", city);
                let upstream = self
                    .client
                    .fetch_forecast(city)
                    .await
                    .map_err(|e| upstream_failure("forecast", city, e))?;
                Ok::<_, WeatherError>(CachedEntry::new(Forecast::from(&upstream)))
            })
            .await
            .map_err(|e| (*e).clone())?;

        Ok(entry.data)
    }
}

fn upstream_failure(kind: &str, city: &str, err: OpenWeatherError) -> WeatherError {
    match err {
        OpenWeatherError::CityNotFound(_) => {
            tracing::info!("OpenWeather has no {} data for {}", kind, city);
            WeatherError::CityNotFound(city.to_string())
        }
        other => {
            tracing::warn!("OpenWeather {} request for {} failed: {}", kind, city, other);
            WeatherError::Upstream(format!("Error fetching {} data: {}", kind, other))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(base_url: &str) -> WeatherService {
        let config = Config::for_upstream(base_url);
        let client = OpenWeatherClient::new(config.clone()).unwrap();
        WeatherService::new(client, &config)
    }

    fn london_payload() -> serde_json::Value {
        json!({
            "main": { "temp": 15.2, "humidity": 70 },
            "wind": { "speed": 3.1 },
            "weather": [{ "main": "Clouds", "description": "overcast" }],
            "name": "London"
        })
    }

    #[tokio::test]
    async fn test_second_lookup_served_from_cache() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_payload()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let service = service_for(&mock_server.uri());

        let first = service.current_weather("London").await.unwrap();
        let second = service.current_weather("London").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.main.temp, 15.2);
        assert_eq!(first.weather[0].main, "Clouds");
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(london_payload())
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let service = service_for(&mock_server.uri());

        let (a, b) = tokio::join!(
            service.current_weather("London"),
            service.current_weather("London")
        );

        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[tokio::test]
    async fn test_city_names_are_case_sensitive_keys() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("q", "Paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "Paris" })))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "paris"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "paris" })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let service = service_for(&mock_server.uri());

        assert_eq!(service.current_weather("Paris").await.unwrap().name, "Paris");
        assert_eq!(service.current_weather("paris").await.unwrap().name, "paris");
        assert_eq!(service.current_weather("Paris").await.unwrap().name, "Paris");

        assert!(service.current_cache.get("Paris").await.is_some());
        assert!(service.current_cache.get("paris").await.is_some());
        assert!(service.current_cache.get("PARIS").await.is_none());
    }

    #[tokio::test]
    async fn test_forecast_cache_is_separate() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(london_payload()))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "list": [
                    { "dt": 1700000000, "main": { "temp": 11.0 }, "weather": [{ "main": "Rain", "description": "light rain" }] },
                    { "dt": 1700010800, "main": { "temp": 10.0 } }
                ],
                "city": { "name": "London", "country": "GB" }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let service = service_for(&mock_server.uri());

        service.current_weather("London").await.unwrap();
        let forecast = service.forecast("London").await.unwrap();
        let cached = service.forecast("London").await.unwrap();

        assert_eq!(forecast, cached);
        assert_eq!(forecast.list.len(), 2);
        assert_eq!(forecast.list[0].weather[0].main, "Rain");
        assert_eq!(forecast.city.country, "GB");
    }

    #[tokio::test]
    async fn test_not_found_maps_to_city_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "cod": "404",
                "message": "city not found"
            })))
            .mount(&mock_server)
            .await;

        let service = service_for(&mock_server.uri());

        let err = service.current_weather("Atlantis").await.unwrap_err();
        assert_eq!(err, WeatherError::CityNotFound("Atlantis".to_string()));
        assert!(err.to_string().contains("Atlantis"));

        let err = service.forecast("Atlantis").await.unwrap_err();
        assert_eq!(err, WeatherError::CityNotFound("Atlantis".to_string()));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(2)
            .mount(&mock_server)
            .await;

        let service = service_for(&mock_server.uri());

        for _ in 0..2 {
            match service.current_weather("London").await {
                Err(WeatherError::Upstream(message)) => {
                    assert!(message.starts_with("Error fetching weather data:"));
                    assert!(message.contains("503"));
                }
                other => panic!("expected upstream error, got {:?}", other),
            }
        }

        assert!(service.current_cache.get("London").await.is_none());
    }

    #[tokio::test]
    async fn test_connection_failure_is_upstream_error() {
        // Nothing listens on port 1.
        let service = service_for("http://127.0.0.1:1");

        let err = service.forecast("London").await.unwrap_err();

        match err {
            WeatherError::Upstream(message) => {
                assert!(message.starts_with("Error fetching forecast data:"))
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
        assert!(service.forecast_cache.get("London").await.is_none());
    }
}
