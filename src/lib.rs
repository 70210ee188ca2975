pub mod adapters;
mod app;
pub mod config;
pub mod locations;
pub mod ports;
pub mod push;
pub mod registry;
pub mod state;
pub mod store;
pub mod summary;
mod templates;
pub mod types;

#[cfg(test)]
mod testing;

pub use app::app;
pub use push::generate_vapid_credentials;

use adapters::{GeminiClient, MetNoClient, PlaceholderWeather, TokioTimeProvider, WebPushSender};
use config::{AppConfig, WeatherSource};
use locations::{LocationError, Locations};
use ports::{StoreError, SummarizeError, WeatherError};
use push::{Collaborators, WorkerSettings};
use registry::{RegistryError, SubscriptionRegistry};
use state::{AppState, CoreState};
use store::SqliteStore;
use summary::SummaryCache;

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to set up weather client: {0}")]
    Weather(#[from] WeatherError),
    #[error("failed to set up summarizer: {0}")]
    Summarizer(#[from] SummarizeError),
    #[error("failed to set up push client: {0}")]
    WebPush(#[from] web_push::WebPushError),
}

/// Opens the store, rebuilds in-memory state, starts the background workers
/// and serves HTTP until Ctrl-C.
pub async fn serve(config: AppConfig) -> Result<(), ServeError> {
    match config.weather.clone() {
        WeatherSource::MetNo { user_agent } => {
            let weather = MetNoClient::new(&user_agent)?;
            serve_with(config, weather).await
        }
        WeatherSource::Placeholder => {
            info!("using placeholder forecasts");
            serve_with(config, PlaceholderWeather::new(TokioTimeProvider)).await
        }
    }
}

async fn serve_with<W: ports::WeatherProvider>(
    config: AppConfig,
    weather: W,
) -> Result<(), ServeError> {
    match push::public_key_for(&config.vapid.private_key) {
        Ok(derived) if derived != config.vapid.public_key => {
            warn!("VAPID public key does not match the private key");
        }
        Ok(_) => {}
        Err(err) => warn!(error = %err, "could not derive VAPID public key"),
    }

    std::fs::create_dir_all(&config.data_dir)?;
    let store = SqliteStore::open(config.data_dir.join("sevenam.db")).await?;
    let locations = Arc::new(Locations::supported()?);
    let registry = SubscriptionRegistry::load(store.clone(), locations.keys()).await?;
    let cache = SummaryCache::new(locations.keys());
    cache.hydrate(&store).await;
    let core = CoreState {
        locations,
        cache: Arc::new(cache),
        registry: Arc::new(registry),
    };

    let collaborators = Collaborators {
        time: TokioTimeProvider,
        weather,
        summarizer: GeminiClient::new(&config.gemini.api_key, &config.gemini.model)?,
        sender: WebPushSender::new(config.vapid.clone(), config.push_ttl)?,
        store,
    };
    let settings = WorkerSettings {
        update_at: config.update_at,
        fanout_limit: config.fanout_limit,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    let shutdown = CancellationToken::new();
    let workers = push::start_workers(collaborators, core.clone(), settings, shutdown);
    let router = app(AppState { config, core });
    serve_until(listener, router, workers, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutting down");
    })
    .await
}

/// Serves until `signal` resolves, then stops the workers. They are stopped
/// even when serving fails.
async fn serve_until<F>(
    listener: tokio::net::TcpListener,
    router: Router,
    workers: push::Workers,
    signal: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(signal)
        .await;
    workers.shutdown().await;
    Ok(served?)
}
