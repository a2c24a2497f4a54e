use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod routes;
mod weather;

use config::Config;
use error::handle_panic;
use routes::{cors_layer, create_router, AppState};
use weather::{openweather::OpenWeatherClient, service::WeatherService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weda_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // The service owns both caches for the life of the process
    let weather_client = OpenWeatherClient::new(config.clone())?;
    let weather_service = Arc::new(WeatherService::new(weather_client, &config));

    let state = AppState { weather_service };

    let app = create_router(state)
        .layer(cors_layer(&config.allowed_origin)?)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic));

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(
        "Server starting on http://{} (allowed origin {}, cache capacity {})",
        config.bind_address,
        config.allowed_origin,
        config.cache_max_capacity
    );

    axum::serve(listener, app).await?;

    Ok(())
}
