pub mod collectibles;
pub mod collection;
pub mod collection_handlers;
pub mod config;
pub mod database;
pub mod directions;
pub mod error;
pub mod geo;
pub mod gpx_export;
pub mod models;
pub mod player;
pub mod poi;
pub mod policy;
pub mod store;
pub mod synthesizer;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tokio::sync::{Mutex, mpsc};
use tower_http::cors::CorsLayer;

use crate::collection::CollectionManager;
use crate::config::EngineConfig;
use crate::error::RouteError;
use crate::geo::approximate_distance_km;
use crate::gpx_export::encode_route_as_gpx;
use crate::models::{
    ApiError, RouteExportRequest, RouteExportResponse, RoutePreview, RoutePreviewRequest,
    RouteSearchRequest, RouteSearchResponse, ThemeSummary,
};
use crate::player::{MIN_STEP_SPACING_M, RoutePlayer, resampled_len, route_vertices};
use crate::poi::{PoiRefinement, PoiRefiner};
use crate::policy::theme_catalog;
use crate::synthesizer::RouteSynthesizer;

const MAX_PREVIEW_POINTS: usize = 100_000;

#[derive(Clone)]
pub struct AppState {
    pub synthesizer: RouteSynthesizer,
    pub refiner: Option<PoiRefiner>,
    pub session: Arc<Mutex<CollectionManager>>,
    pub refinements: mpsc::UnboundedSender<PoiRefinement>,
    pub config: EngineConfig,
}

impl AppState {
    /// Build the shared state and start the task that applies POI
    /// refinements to the session. Must be called inside a Tokio runtime.
    pub fn new(
        synthesizer: RouteSynthesizer,
        refiner: Option<PoiRefiner>,
        manager: CollectionManager,
        config: EngineConfig,
    ) -> Self {
        let session = Arc::new(Mutex::new(manager));
        let (refinements, mut receiver) = mpsc::unbounded_channel::<PoiRefinement>();

        let listener_session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(refinement) = receiver.recv().await {
                let applied = listener_session.lock().await.apply_refinement(&refinement);
                if applied {
                    tracing::debug!(
                        "point {} renamed to {:?}",
                        refinement.point_id,
                        refinement.name
                    );
                }
            }
        });

        Self {
            synthesizer,
            refiner,
            session,
            refinements,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/themes", get(themes_handler))
        .route("/api/routes/search", post(search_handler))
        .route("/api/routes/preview", post(preview_handler))
        .route("/api/routes/export", post(export_handler))
        .route("/api/session/start", post(collection_handlers::start_session))
        .route("/api/session/end", post(collection_handlers::end_session))
        .route("/api/session/location", post(collection_handlers::update_location))
        .route("/api/collectibles", get(collection_handlers::list_collectibles))
        .route("/api/collectibles/collect", post(collection_handlers::collect))
        .route("/api/collection", get(collection_handlers::list_collection))
        .route("/api/collection/stats", get(collection_handlers::collection_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn themes_handler() -> Json<Vec<ThemeSummary>> {
    Json(theme_catalog())
}

async fn search_handler(
    State(state): State<AppState>,
    Json(req): Json<RouteSearchRequest>,
) -> Json<RouteSearchResponse> {
    let transports = if req.transport_types.is_empty() {
        models::default_transport_types()
    } else {
        req.transport_types
    };

    let routes = state
        .synthesizer
        .search(req.start, req.end, &transports, req.special_route_type)
        .await;

    Json(RouteSearchResponse { routes })
}

async fn preview_handler(
    State(state): State<AppState>,
    Json(req): Json<RoutePreviewRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let spacing = req.step_spacing_m.unwrap_or(state.config.step_spacing_m);
    if !(spacing.is_finite() && spacing >= MIN_STEP_SPACING_M) {
        return Err(bad_request(format!(
            "step spacing must be at least {MIN_STEP_SPACING_M} m, got {spacing}"
        )));
    }

    let point_count = resampled_len(&route_vertices(&req.route), spacing);
    if point_count > MAX_PREVIEW_POINTS {
        return Err(bad_request(format!(
            "preview would have {point_count} points, limit is {MAX_PREVIEW_POINTS}; use a larger step spacing"
        )));
    }

    let mut player = RoutePlayer::new(spacing);
    player.load(&req.route);
    let path = player.path();
    let distance_km = approximate_distance_km(&path);

    Ok(Json(RoutePreview { path, distance_km }))
}

async fn export_handler(
    Json(req): Json<RouteExportRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ApiError>)> {
    let gpx_base64 = encode_route_as_gpx(&req.route).map_err(route_error)?;
    Ok(Json(RouteExportResponse { gpx_base64 }))
}

fn bad_request(message: String) -> (StatusCode, Json<ApiError>) {
    (StatusCode::BAD_REQUEST, Json(ApiError { message }))
}

fn route_error(err: RouteError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        RouteError::EmptyRoute => StatusCode::BAD_REQUEST,
        RouteError::Gpx(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
