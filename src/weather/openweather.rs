use super::types::*;
use crate::config::Config;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenWeatherError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("City not found: {0}")]
    CityNotFound(String),
    #[error("API error: {0}")]
    ApiError(String),
}

// Request URLs carry the API key in `appid`, so they never go into the error.
impl From<reqwest::Error> for OpenWeatherError {
    fn from(err: reqwest::Error) -> Self {
        OpenWeatherError::RequestFailed(err.without_url())
    }
}

pub struct OpenWeatherClient {
    client: Client,
    config: Config,
}

impl OpenWeatherClient {
    pub fn new(config: Config) -> Result<Self, OpenWeatherError> {
        let client = Client::builder()
            .user_agent(concat!("weda-server/", env!("CARGO_PKG_VERSION")))
            .timeout(config.upstream_timeout())
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn fetch_current(&self, city: &str) -> Result<OwCurrentResponse, OpenWeatherError> {
        let url = format!(
            "{}{}",
            self.config.openweather_base_url, self.config.openweather_current_path
        );
        self.get_json(&url, city).await
    }

    pub async fn fetch_forecast(&self, city: &str) -> Result<OwForecastResponse, OpenWeatherError> {
        let url = format!(
            "{}{}",
            self.config.openweather_base_url, self.config.openweather_forecast_path
        );
        self.get_json(&url, city).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, city: &str) -> Result<T, OpenWeatherError> {
        // The query builder percent-encodes the city name.
        let response = self
            .client
            .get(url)
            .query(&[
                ("q", city),
                ("appid", self.config.openweather_api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await?;
                Ok(serde_json::from_slice(&body)?)
            }
            reqwest::StatusCode::NOT_FOUND => Err(OpenWeatherError::CityNotFound(city.to_string())),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(OpenWeatherError::ApiError(format!("HTTP {}: {}", status, error_text)))
            }
        }
    }
}

impl From<&OwWeather> for Condition {
    fn from(weather: &OwWeather) -> Self {
        Self {
            main: weather.main.clone(),
            description: weather.description.clone(),
        }
    }
}

impl From<&OwMain> for Measurements {
    fn from(main: &OwMain) -> Self {
        Self {
            temp: main.temp,
            humidity: main.humidity,
            pressure: main.pressure,
            temp_min: main.temp_min,
            temp_max: main.temp_max,
        }
    }
}

impl From<&OwWind> for Wind {
    fn from(wind: &OwWind) -> Self {
        Self { speed: wind.speed }
    }
}

impl From<&OwCurrentResponse> for CurrentWeather {
    fn from(current: &OwCurrentResponse) -> Self {
        Self {
            main: Measurements::from(&current.main),
            wind: Wind::from(&current.wind),
            sys: SunTimes {
                sunrise: current.sys.sunrise,
                sunset: current.sys.sunset,
            },
            name: current.name.clone(),
            weather: current.weather.iter().map(Condition::from).collect(),
        }
    }
}

impl From<&OwForecastItem> for ForecastEntry {
    fn from(item: &OwForecastItem) -> Self {
        Self {
            dt: item.dt,
            main: Measurements::from(&item.main),
            weather: item.weather.iter().map(Condition::from).collect(),
            wind: Wind::from(&item.wind),
        }
    }
}

impl From<&OwForecastResponse> for Forecast {
    fn from(forecast: &OwForecastResponse) -> Self {
        Self {
            list: forecast.list.iter().map(ForecastEntry::from).collect(),
            city: Location {
                name: forecast.city.name.clone(),
                country: forecast.city.country.clone(),
            },
        }
    }
}
