use std::{net::SocketAddr, sync::Arc};

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trailquest::{
    AppState,
    collection::CollectionManager,
    config::EngineConfig,
    create_router,
    database::PgItemStore,
    directions::{DirectionsProvider, OsrmDirections, UnavailableDirections},
    poi::{CachedPoiSearch, OverpassPoiSearch, PoiRefiner},
    store::{ItemStore, MemoryItemStore},
    synthesizer::RouteSynthesizer,
};

/// Themed route search and collectible hunting server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Postgres URL for collected items (in-memory store when absent)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// OSRM server used for directions (routes are simulated when absent)
    #[arg(long, env = "OSRM_ENDPOINT")]
    osrm_endpoint: Option<String>,

    /// Overpass API endpoint used to name collectibles after real places
    #[arg(long, env = "OVERPASS_ENDPOINT")]
    overpass_endpoint: Option<String>,

    /// Override the collection radius in meters
    #[arg(long)]
    collection_radius_m: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trailquest=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::from_env();
    if let Some(radius) = args.collection_radius_m.filter(|r| r.is_finite() && *r > 0.0) {
        config.collection_radius_m = radius;
    }
    tracing::info!("engine config: {config:?}");

    let store: Arc<dyn ItemStore> = match args.database_url.as_deref() {
        Some(url) => {
            let store = PgItemStore::connect(url).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, collected items will not survive a restart");
            Arc::new(MemoryItemStore::new())
        }
    };

    let directions: Arc<dyn DirectionsProvider> = match args.osrm_endpoint.as_deref() {
        Some(endpoint) => {
            tracing::info!("using OSRM directions at {endpoint}");
            Arc::new(OsrmDirections::new(endpoint)?)
        }
        None => {
            tracing::warn!("OSRM_ENDPOINT not set, all routes will be simulated");
            Arc::new(UnavailableDirections)
        }
    };

    let refiner = match args.overpass_endpoint.as_deref() {
        Some(endpoint) => {
            tracing::info!("resolving collectible names via {endpoint}");
            let search = Arc::new(OverpassPoiSearch::new(endpoint)?);
            let cached = CachedPoiSearch::new(search, config.poi_cache_capacity);
            Some(PoiRefiner::new(Arc::new(cached), config.poi_search_radius_m))
        }
        None => None,
    };

    let mut manager = CollectionManager::new(store, config);
    manager.load_persisted().await;

    let state = AppState::new(RouteSynthesizer::new(directions), refiner, manager, config);
    let app = create_router(state);

    tracing::info!("starting trailquest on http://{}", args.bind);
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
