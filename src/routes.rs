use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, CorsLayer};

use crate::{
    error::{AppError, AppResult},
    weather::{
        service::WeatherService,
        types::{CurrentWeather, Forecast},
    },
};

/// Everything under this prefix is public; nothing else is.
pub const WEATHER_PREFIX: &str = "/api/weather";

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub weather_service: Arc<WeatherService>,
}

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    pub city: Option<String>,
}

impl CityQuery {
    fn require_city(&self) -> AppResult<&str> {
        match self.city.as_deref() {
            Some(city) if !city.trim().is_empty() => Ok(city),
            _ => Err(AppError::BadRequest(
                "Query parameter 'city' is required".to_string(),
            )),
        }
    }
}

pub async fn get_current_weather(
    State(state): State<AppState>,
    Query(params): Query<CityQuery>,
) -> AppResult<Json<CurrentWeather>> {
    let city = params.require_city()?;
    let weather = state.weather_service.current_weather(city).await?;
    Ok(Json(weather))
}

pub async fn get_forecast(
    State(state): State<AppState>,
    Query(params): Query<CityQuery>,
) -> AppResult<Json<Forecast>> {
    let city = params.require_city()?;
    let forecast = state.weather_service.forecast(city).await?;
    Ok(Json(forecast))
}

// Paths outside the public prefix would need authentication, which this
// service does not offer.
async fn fallback(uri: Uri) -> Response {
    if uri.path() == WEATHER_PREFIX || uri.path().starts_with("/api/weather/") {
        (StatusCode::NOT_FOUND, "Not found").into_response()
    } else {
        tracing::debug!("Rejecting request outside the public routes: {}", uri.path());
        (StatusCode::UNAUTHORIZED, "Authentication required").into_response()
    }
}

/// Browser access is limited to the single configured origin.
pub fn cors_layer(allowed_origin: &str) -> anyhow::Result<CorsLayer> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|_| anyhow::anyhow!("ALLOWED_ORIGIN is not a valid header value: {}", allowed_origin))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET])
        .allow_headers(AllowHeaders::mirror_request()))
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(WEATHER_PREFIX, get(get_current_weather))
        .route("/api/weather/forecast", get(get_forecast))
        .fallback(fallback)
        .with_state(state)
}
