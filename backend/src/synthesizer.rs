//! Themed route synthesis on top of an external directions provider, with a
//! scripted straight-line simulation whenever the provider has nothing to say.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    directions::{DirectionsProvider, DirectionsRoute, DirectionsStep},
    geo::haversine_m,
    models::{
        Coordinate, NavigationInstruction, RouteInfo, RouteType, SpecialRouteType, TransportType,
    },
    policy::{detour_fraction, route_narrative},
};

const MIN_SIMULATED_MINUTES: f64 = 10.0;
const SIMULATED_INSTRUCTION_COUNT: usize = 8;
const TRANSIT_PRICE_TEXT: &str = "¥3-8";

const ICON_START: &str = "location.circle.fill";
const ICON_END: &str = "flag.checkered";
const ICON_LEFT: &str = "arrow.turn.up.left";
const ICON_RIGHT: &str = "arrow.turn.up.right";
const ICON_STRAIGHT: &str = "arrow.up";

/// Scripted fallback: (text, distance text, icon) for each simulated step.
const SIMULATED_SCRIPT: [(&str, &str, &str); SIMULATED_INSTRUCTION_COUNT] = [
    ("从起点出发", "0米", ICON_START),
    ("直行200米", "200米", ICON_STRAIGHT),
    ("向右转", "150米", ICON_RIGHT),
    ("继续直行", "300米", ICON_STRAIGHT),
    ("向左转", "100米", ICON_LEFT),
    ("继续直行", "250米", ICON_STRAIGHT),
    ("向右转", "80米", ICON_RIGHT),
    ("到达目的地", "50米", ICON_END),
];

#[derive(Clone)]
pub struct RouteSynthesizer {
    directions: Arc<dyn DirectionsProvider>,
}

impl RouteSynthesizer {
    pub fn new(directions: Arc<dyn DirectionsProvider>) -> Self {
        Self { directions }
    }

    /// Candidate routes for one transport type. Never fails and never returns
    /// an empty list: provider errors degrade to [`simulate_routes`].
    pub async fn request_routes(
        &self,
        start: Coordinate,
        end: Coordinate,
        transport: TransportType,
        theme: SpecialRouteType,
    ) -> Vec<RouteInfo> {
        match self
            .directions
            .request_routes(start, end, transport, true)
            .await
        {
            Ok(routes) if !routes.is_empty() => {
                tracing::info!(
                    "directions returned {} {:?} candidate(s) for {theme} route",
                    routes.len(),
                    transport
                );
                routes
                    .iter()
                    .enumerate()
                    .map(|(index, route)| {
                        route_info_from_directions(index, route, start, end, transport, theme)
                    })
                    .collect()
            }
            Ok(_) => {
                tracing::warn!("directions returned no {transport:?} routes, simulating");
                simulate_routes(start, end, transport, theme)
            }
            Err(err) => {
                tracing::warn!("directions unavailable for {transport:?} ({err}), simulating");
                simulate_routes(start, end, transport, theme)
            }
        }
    }

    /// Request every transport type concurrently and join on all of them.
    /// Results keep the order of `transports`.
    pub async fn search(
        &self,
        start: Coordinate,
        end: Coordinate,
        transports: &[TransportType],
        theme: SpecialRouteType,
    ) -> Vec<RouteInfo> {
        let handles: Vec<_> = transports
            .iter()
            .map(|&transport| {
                let synthesizer = self.clone();
                let handle = tokio::spawn(async move {
                    synthesizer
                        .request_routes(start, end, transport, theme)
                        .await
                });
                (transport, handle)
            })
            .collect();

        let mut routes = Vec::new();
        for (transport, handle) in handles {
            match handle.await {
                Ok(candidates) => routes.extend(candidates),
                Err(err) => {
                    tracing::error!("{transport:?} route task failed ({err}), simulating");
                    routes.extend(simulate_routes(start, end, transport, theme));
                }
            }
        }

        tracing::info!(
            "route search finished: {} route(s) across {} transport type(s)",
            routes.len(),
            transports.len()
        );
        routes
    }
}

fn route_info_from_directions(
    index: usize,
    route: &DirectionsRoute,
    start: Coordinate,
    end: Coordinate,
    transport: TransportType,
    theme: SpecialRouteType,
) -> RouteInfo {
    let narrative = route_narrative(theme, route.distance_m, transport, index == 0);
    let minutes = (route.travel_time_s / 60.0).ceil().max(1.0);

    RouteInfo {
        id: Uuid::new_v4(),
        route_type: route_type_for(theme, index),
        transport_type: transport,
        distance_text: format_route_distance(route.distance_m),
        duration_text: format_duration(minutes),
        price_text: price_text(transport, route.distance_m / 1000.0, index),
        polyline: Some(route.polyline.clone()),
        description: narrative.description,
        instructions: instructions_from_steps(&route.steps, start, end),
        special_route_type: theme,
        highlights: narrative.highlights,
        difficulty: narrative.difficulty,
    }
}

fn route_type_for(theme: SpecialRouteType, index: usize) -> RouteType {
    match (theme, index) {
        (SpecialRouteType::None, 0) => RouteType::Fastest,
        (SpecialRouteType::None, 1) => RouteType::Alternative,
        (SpecialRouteType::None, _) => RouteType::Scenic,
        (_, 0) => RouteType::Recommended,
        (_, _) => RouteType::Alternative,
    }
}

fn price_text(transport: TransportType, distance_km: f64, slot: usize) -> String {
    match transport {
        TransportType::Driving => {
            let rate = match slot {
                0 => 0.8,
                1 => 0.7,
                _ => 0.9,
            };
            format!("¥{}", (distance_km * rate).floor() as u64)
        }
        TransportType::Transit => TRANSIT_PRICE_TEXT.to_string(),
        TransportType::Walking => String::new(),
    }
}

/// Straight-line fallback used whenever no real route is available.
///
/// Produces three candidates (fastest, shortest, cheapest) for plain routes
/// and two (recommended, alternative) inflated by the theme's detour budget
/// otherwise.
pub fn simulate_routes(
    start: Coordinate,
    end: Coordinate,
    transport: TransportType,
    theme: SpecialRouteType,
) -> Vec<RouteInfo> {
    let distance_m = haversine_m(start, end);
    let base_minutes = (distance_m / 1000.0 * minutes_per_km(transport)).max(MIN_SIMULATED_MINUTES);

    let candidates: Vec<(RouteType, f64)> = if theme == SpecialRouteType::None {
        vec![
            (RouteType::Fastest, 1.0),
            (RouteType::Shortest, 0.9),
            (RouteType::Cheapest, 1.1),
        ]
    } else {
        let detour = detour_fraction(theme);
        vec![
            (RouteType::Recommended, 1.0 + detour),
            (RouteType::Alternative, 1.1 + detour),
        ]
    };

    candidates
        .into_iter()
        .enumerate()
        .map(|(slot, (route_type, multiplier))| {
            let route_distance_m = distance_m * multiplier;
            let narrative = route_narrative(theme, route_distance_m, transport, slot == 0);
            RouteInfo {
                id: Uuid::new_v4(),
                route_type,
                transport_type: transport,
                distance_text: format_route_distance(route_distance_m),
                duration_text: format_duration(base_minutes * multiplier),
                price_text: price_text(transport, route_distance_m / 1000.0, slot),
                polyline: None,
                description: narrative.description,
                instructions: simulated_instructions(start, end),
                special_route_type: theme,
                highlights: narrative.highlights,
                difficulty: narrative.difficulty,
            }
        })
        .collect()
}

fn minutes_per_km(transport: TransportType) -> f64 {
    match transport {
        TransportType::Walking => 12.0,
        TransportType::Driving => 2.0,
        TransportType::Transit => 4.0,
    }
}

/// Eight instructions evenly spread on the straight line, following a fixed
/// script rather than the geometry.
pub fn simulated_instructions(start: Coordinate, end: Coordinate) -> Vec<NavigationInstruction> {
    let last = (SIMULATED_INSTRUCTION_COUNT - 1) as f64;
    SIMULATED_SCRIPT
        .iter()
        .enumerate()
        .map(|(i, (text, distance, icon))| NavigationInstruction {
            id: Uuid::new_v4(),
            instruction_text: text.to_string(),
            distance_text: distance.to_string(),
            icon_key: icon.to_string(),
            coordinate: start.interpolate(end, i as f64 / last),
        })
        .collect()
}

/// One instruction per provider step: the first becomes the start marker, the
/// last the arrival marker, and the rest are classified by their raw text.
pub fn instructions_from_steps(
    steps: &[DirectionsStep],
    start: Coordinate,
    end: Coordinate,
) -> Vec<NavigationInstruction> {
    if steps.len() < 2 {
        return vec![
            marker("从起点出发", "0米", ICON_START, start),
            marker("到达目的地", "0米", ICON_END, end),
        ];
    }

    let last_index = steps.len() - 1;
    let mut previous = start;
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let coordinate = if index == last_index {
                step.polyline.last().copied().unwrap_or(end)
            } else {
                step.polyline.first().copied().unwrap_or(previous)
            };
            previous = coordinate;
            let distance = format_step_distance(step.distance_m);

            if index == 0 {
                marker("从起点出发", &distance, ICON_START, coordinate)
            } else if index == last_index {
                marker("到达目的地", &distance, ICON_END, coordinate)
            } else {
                let (text, icon) = classify_step(&step.instruction_text);
                marker(&text, &distance, icon, coordinate)
            }
        })
        .collect()
}

fn classify_step(raw: &str) -> (String, &'static str) {
    let lower = raw.to_lowercase();
    // Road names follow the maneuver and must not be classified
    let maneuver = lower
        .split(" onto ")
        .next()
        .and_then(|head| head.split("进入").next())
        .unwrap_or_default();
    let has_word = |word: &str| {
        maneuver
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == word)
    };

    if maneuver.contains('左') || has_word("left") {
        ("向左转".to_string(), ICON_LEFT)
    } else if maneuver.contains('右') || has_word("right") {
        ("向右转".to_string(), ICON_RIGHT)
    } else if maneuver.contains("直行") || has_word("straight") || has_word("continue") {
        ("继续直行".to_string(), ICON_STRAIGHT)
    } else if raw.trim().is_empty() {
        ("继续前行".to_string(), ICON_STRAIGHT)
    } else {
        (raw.to_string(), ICON_STRAIGHT)
    }
}

fn marker(text: &str, distance: &str, icon: &str, coordinate: Coordinate) -> NavigationInstruction {
    NavigationInstruction {
        id: Uuid::new_v4(),
        instruction_text: text.to_string(),
        distance_text: distance.to_string(),
        icon_key: icon.to_string(),
        coordinate,
    }
}

pub fn format_route_distance(distance_m: f64) -> String {
    format!("{:.1}公里", distance_m / 1000.0)
}

pub fn format_step_distance(distance_m: f64) -> String {
    if distance_m < 1000.0 {
        format!("{}米", distance_m.round() as u64)
    } else {
        format!("{:.1}公里", distance_m / 1000.0)
    }
}

pub fn format_duration(minutes: f64) -> String {
    let total = minutes.round().max(0.0) as u64;
    if total < 60 {
        format!("{total}分钟")
    } else if total % 60 == 0 {
        format!("{}小时", total / 60)
    } else {
        format!("{}小时{}分钟", total / 60, total % 60)
    }
}
