// Handlers for the collection session endpoints
// All session state lives behind the AppState mutex

use axum::{Json, extract::State, http::StatusCode};

use crate::AppState;
use crate::collectibles::generate_collectibles;
use crate::collection::CollectError;
use crate::models::{
    ApiError, CollectRequest, CollectibleItem, CollectiblePoint, CollectionStats, InRangeResponse,
    LocationUpdate, SessionStartRequest, SessionStartResponse,
};

/// POST /api/session/start - Generate collectibles for a route and make it the active session
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<SessionStartRequest>,
) -> Json<SessionStartResponse> {
    let theme = req.route.special_route_type;
    let points = {
        let mut rng = rand::thread_rng();
        generate_collectibles(theme, &req.route.instructions, &mut rng)
    };

    let (session_id, collectibles) = {
        let mut manager = state.session.lock().await;
        let session_id = manager.begin_session(theme, points);
        (session_id, manager.available().to_vec())
    };

    if let Some(refiner) = &state.refiner {
        refiner.spawn(session_id, &collectibles, state.refinements.clone());
    }

    Json(SessionStartResponse {
        session_id,
        collectibles,
    })
}

/// POST /api/session/end - Drop the session's points, keep the collection
pub async fn end_session(State(state): State<AppState>) -> StatusCode {
    state.session.lock().await.end_session();
    StatusCode::NO_CONTENT
}

/// POST /api/session/location - Record a position and return collectibles in range
pub async fn update_location(
    State(state): State<AppState>,
    Json(update): Json<LocationUpdate>,
) -> Json<InRangeResponse> {
    let mut manager = state.session.lock().await;
    manager.set_location(update.coordinate, update.heading);
    Json(InRangeResponse {
        in_range: manager.in_range(update.coordinate),
    })
}

/// GET /api/collectibles - Points of the active session
pub async fn list_collectibles(State(state): State<AppState>) -> Json<Vec<CollectiblePoint>> {
    Json(state.session.lock().await.available().to_vec())
}

/// POST /api/collectibles/collect - Collect a point of the active session
pub async fn collect(
    State(state): State<AppState>,
    Json(req): Json<CollectRequest>,
) -> Result<Json<CollectibleItem>, (StatusCode, Json<ApiError>)> {
    state
        .session
        .lock()
        .await
        .collect_by_id(req.point_id)
        .await
        .map(Json)
        .map_err(collect_error_to_api_error)
}

/// GET /api/collection - Collected items, newest first
pub async fn list_collection(State(state): State<AppState>) -> Json<Vec<CollectibleItem>> {
    Json(state.session.lock().await.collected().to_vec())
}

/// GET /api/collection/stats - Totals per category
pub async fn collection_stats(State(state): State<AppState>) -> Json<CollectionStats> {
    Json(state.session.lock().await.stats())
}

fn collect_error_to_api_error(err: CollectError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        CollectError::AlreadyCollected(_) => StatusCode::CONFLICT,
        CollectError::UnknownPoint(_) => StatusCode::NOT_FOUND,
        CollectError::StoreWriteFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}
