use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::Request,
};
use hyper::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower::ServiceExt;
use trailquest::{
    AppState,
    collection::CollectionManager,
    config::EngineConfig,
    create_router,
    directions::UnavailableDirections,
    models::{
        CollectibleItem, CollectiblePoint, CollectionStats, Coordinate, InRangeResponse, RouteInfo,
        RoutePreview, RouteSearchResponse, SessionStartResponse, SpecialRouteType, ThemeSummary,
        TransportType,
    },
    poi::{PoiError, PoiItem, PoiRefiner, PoiSearchProvider},
    store::MemoryItemStore,
    synthesizer::RouteSynthesizer,
};

fn test_app() -> axum::Router {
    app_with_refiner(None)
}

fn app_with_refiner(refiner: Option<PoiRefiner>) -> axum::Router {
    let config = EngineConfig::default();
    let manager = CollectionManager::new(Arc::new(MemoryItemStore::new()), config);
    let synthesizer = RouteSynthesizer::new(Arc::new(UnavailableDirections));
    create_router(AppState::new(synthesizer, refiner, manager, config))
}

/// Answers every lookup with the same nearby place.
struct FixedPlaces;

#[async_trait]
impl PoiSearchProvider for FixedPlaces {
    async fn search_nearby(
        &self,
        _keyword: &str,
        _center: Coordinate,
        _radius_m: f64,
    ) -> Result<Vec<PoiItem>, PoiError> {
        Ok(vec![PoiItem {
            name: "南锣鼓巷".into(),
            phone_number: Some("010-64000000".into()),
        }])
    }
}

fn post(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn search(app: &axum::Router, theme: &str, transports: Value) -> Vec<RouteInfo> {
    let payload = json!({
        "start": {"lat": 39.9042, "lon": 116.4074},
        "end": {"lat": 39.9142, "lon": 116.4174},
        "transport_types": transports,
        "special_route_type": theme
    });
    let response = app
        .clone()
        .oneshot(post("/api/routes/search", &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    read_json::<RouteSearchResponse>(response).await.routes
}

#[tokio::test]
async fn plain_walking_search_simulates_three_routes() {
    let app = test_app();
    let routes = search(&app, "none", json!(["walking"])).await;

    assert_eq!(routes.len(), 3);
    for route in &routes {
        assert_eq!(route.transport_type, TransportType::Walking);
        assert_eq!(route.special_route_type, SpecialRouteType::None);
        assert!(route.polyline.is_none());
        assert_eq!(route.instructions.len(), 8);
    }
}

#[tokio::test]
async fn food_search_across_transports_keeps_request_order() {
    let app = test_app();
    let routes = search(&app, "food", json!(["driving", "walking"])).await;

    assert_eq!(routes.len(), 4);
    assert!(routes[..2].iter().all(|r| r.transport_type == TransportType::Driving));
    assert!(routes[2..].iter().all(|r| r.transport_type == TransportType::Walking));
    assert!(routes.iter().all(|r| r.special_route_type == SpecialRouteType::Food));
    assert!(routes.iter().all(|r| !r.highlights.is_empty()));
}

#[tokio::test]
async fn themes_endpoint_lists_every_theme() {
    let app = test_app();
    let response = app.oneshot(get("/api/themes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let themes: Vec<ThemeSummary> = read_json(response).await;
    assert_eq!(themes.len(), 8);
    let scenic = themes
        .iter()
        .find(|t| t.theme == SpecialRouteType::Scenic)
        .unwrap();
    assert_eq!(scenic.max_detour_percentage, 50);
}

#[tokio::test]
async fn preview_resamples_simulated_route() {
    let app = test_app();
    let route = search(&app, "scenic", json!(["walking"])).await.remove(0);

    let response = app
        .clone()
        .oneshot(post(
            "/api/routes/preview",
            &json!({"route": route, "step_spacing_m": 50.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let preview: RoutePreview = read_json(response).await;
    assert!(preview.path.len() > route.instructions.len());
    assert_eq!(preview.path.first(), route.instructions.first().map(|i| &i.coordinate));
    assert!(preview.distance_km > 0.0);
}

#[tokio::test]
async fn preview_rejects_non_positive_spacing() {
    let app = test_app();
    let route = search(&app, "none", json!(["walking"])).await.remove(0);

    let response = app
        .oneshot(post(
            "/api/routes/preview",
            &json!({"route": route, "step_spacing_m": 0.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preview_rejects_sub_meter_spacing() {
    let app = test_app();
    let route = search(&app, "none", json!(["walking"])).await.remove(0);

    let response = app
        .oneshot(post(
            "/api/routes/preview",
            &json!({"route": route, "step_spacing_m": 1e-9}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn preview_rejects_oversized_paths() {
    let app = test_app();
    let mut route = search(&app, "none", json!(["driving"])).await.remove(0);
    route.polyline = Some(vec![
        Coordinate::new(39.9042, 116.4074),
        Coordinate::new(31.2304, 121.4737),
    ]);

    let response = app
        .oneshot(post(
            "/api/routes/preview",
            &json!({"route": route, "step_spacing_m": 1.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_returns_gpx_payload() {
    let app = test_app();
    let route = search(&app, "none", json!(["driving"])).await.remove(0);

    let response = app
        .oneshot(post("/api/routes/export", &json!({"route": route})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = read_json(response).await;
    assert!(!body["gpx_base64"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn collection_session_flow() {
    let app = test_app();
    let route = search(&app, "food", json!(["walking"])).await.remove(0);

    let response = app
        .clone()
        .oneshot(post("/api/session/start", &json!({"route": route})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let session: SessionStartResponse = read_json(response).await;
    assert!(session.collectibles.len() >= 3);

    let target = session.collectibles[0].clone();
    let response = app
        .clone()
        .oneshot(post(
            "/api/session/location",
            &json!({"coordinate": target.coordinate, "heading": 45.0}),
        ))
        .await
        .unwrap();
    let in_range: InRangeResponse = read_json(response).await;
    assert!(in_range.in_range.iter().any(|p| p.id == target.id));

    let response = app
        .clone()
        .oneshot(post("/api/collectibles/collect", &json!({"point_id": target.id})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let item: CollectibleItem = read_json(response).await;
    assert_eq!(item.category, target.category);
    assert_eq!(item.route_type_tag, "food");

    let response = app
        .clone()
        .oneshot(post("/api/collectibles/collect", &json!({"point_id": target.id})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app.clone().oneshot(get("/api/collection/stats")).await.unwrap();
    let stats: CollectionStats = read_json(response).await;
    assert_eq!(stats.total, 1);
    assert_eq!(stats.by_category[&target.category], 1);

    let response = app.clone().oneshot(get("/api/collection")).await.unwrap();
    let items: Vec<CollectibleItem> = read_json(response).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, item.id);

    let response = app
        .clone()
        .oneshot(post("/api/session/end", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/api/collectibles")).await.unwrap();
    let remaining: Vec<Value> = read_json(response).await;
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn collecting_unknown_point_is_not_found() {
    let app = test_app();
    let response = app
        .oneshot(post(
            "/api/collectibles/collect",
            &json!({"point_id": "7f1d6f0e-5a4e-4b0c-9f59-2f7b8b2d1c11"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn plain_route_session_has_no_collectibles() {
    let app = test_app();
    let route = search(&app, "none", json!(["walking"])).await.remove(0);

    let response = app
        .oneshot(post("/api/session/start", &json!({"route": route})))
        .await
        .unwrap();
    let session: SessionStartResponse = read_json(response).await;
    assert!(session.collectibles.is_empty());
}

#[tokio::test]
async fn session_points_pick_up_resolved_place_names() {
    let app = app_with_refiner(Some(PoiRefiner::new(Arc::new(FixedPlaces), 200.0)));
    let route = search(&app, "scenic", json!(["walking"])).await.remove(0);

    let response = app
        .clone()
        .oneshot(post("/api/session/start", &json!({"route": route})))
        .await
        .unwrap();
    let session: SessionStartResponse = read_json(response).await;
    assert!(!session.collectibles.is_empty());

    let mut points: Vec<CollectiblePoint> = Vec::new();
    for _ in 0..100 {
        let response = app.clone().oneshot(get("/api/collectibles")).await.unwrap();
        points = read_json(response).await;
        if points.iter().all(|p| p.name == "南锣鼓巷") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(points.len(), session.collectibles.len());
    for point in &points {
        assert_eq!(point.name, "南锣鼓巷");
        assert_eq!(point.description, "电话：010-64000000");
    }
}
