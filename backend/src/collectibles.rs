//! Procedural placement of collectible points along a themed route.

use rand::{seq::SliceRandom, Rng};
use uuid::Uuid;

use crate::{
    geo::offset_coordinate,
    models::{
        CollectibleCategory, CollectiblePoint, Coordinate, NavigationInstruction, SpecialRouteType,
    },
    policy::{collectible_categories, fallback_names},
};

const MIN_OFFSET_M: f64 = 50.0;
const MAX_OFFSET_M: f64 = 200.0;
const MIN_EXTRA_POINTS: usize = 2;

/// Minimum number of points guaranteed on top of the per-instruction ones.
pub fn guaranteed_extra_count(instruction_count: usize) -> usize {
    (instruction_count / 3).max(MIN_EXTRA_POINTS)
}

/// Scatter collectible points 50-200 m around the route's instructions.
///
/// Plain routes, themes without categories and routes without instructions
/// get nothing. Points are not deduplicated against each other; that only
/// happens when a point is collected.
pub fn generate_collectibles<R: Rng + ?Sized>(
    theme: SpecialRouteType,
    instructions: &[NavigationInstruction],
    rng: &mut R,
) -> Vec<CollectiblePoint> {
    let categories = collectible_categories(theme);
    if theme == SpecialRouteType::None || categories.is_empty() || instructions.is_empty() {
        return Vec::new();
    }

    let extras = guaranteed_extra_count(instructions.len());
    let mut points = Vec::with_capacity(instructions.len() + extras);

    for (index, instruction) in instructions.iter().enumerate() {
        if index % 2 == 1 || index % 3 == 2 {
            let Some(&category) = categories.choose(rng) else {
                continue;
            };
            points.push(point_near(instruction.coordinate, category, rng));
        }
    }

    for _ in 0..extras {
        let (Some(instruction), Some(&category)) =
            (instructions.choose(rng), categories.choose(rng))
        else {
            continue;
        };
        points.push(point_near(instruction.coordinate, category, rng));
    }

    tracing::info!(
        "generated {} collectible(s) for {theme} route with {} instruction(s)",
        points.len(),
        instructions.len()
    );
    points
}

fn point_near<R: Rng + ?Sized>(
    anchor: Coordinate,
    category: CollectibleCategory,
    rng: &mut R,
) -> CollectiblePoint {
    let distance = rng.gen_range(MIN_OFFSET_M..=MAX_OFFSET_M);
    let bearing = rng.gen_range(0.0..std::f64::consts::TAU);
    let name = fallback_names(category)
        .choose(rng)
        .copied()
        .unwrap_or_else(|| category.label());

    CollectiblePoint {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category,
        coordinate: offset_coordinate(anchor, distance, bearing),
        description: category.default_description().to_string(),
        is_collected: false,
    }
}
