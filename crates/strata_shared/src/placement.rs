use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::coords::GridPos;
use crate::heightfield::{is_sentinel, Heightfield};
use crate::items::WorldItem;
use crate::poisson::PoissonDiscSampler;
use crate::settings::WorldItemSettings;

/// Upper bound on candidates thrown per Poisson spawn point.
const MAX_POISSON_ATTEMPTS: usize = 64;

/// Mixes the world seed, chunk coordinate, and rule index into one RNG seed.
pub fn placement_seed(world_seed: u64, chunk: GridPos, rule_index: usize) -> u64 {
    world_seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add((chunk.x as i64 as u64).wrapping_mul(2654435761))
        .wrapping_add((chunk.z as i64 as u64).wrapping_mul(40503))
        .wrapping_add((rule_index as u64).wrapping_mul(1442695040888963407))
}

/// Decides which catalog items appear in a chunk and how they are posed.
///
/// A rule's `concentration` drives two separate distributions:
/// - above 1.0 it is the attempt count of a Poisson-disc process, so several
///   well-spaced candidates come out;
/// - at or below 1.0 it is the probability that one uniformly placed candidate exists.
///
/// Candidates that miss the heightfield, leave the altitude band, or exceed the slope
/// limit are dropped without retry.
#[derive(Debug, Clone, Copy)]
pub struct ItemPlacer {
    world_seed: u64,
    sampler: PoissonDiscSampler,
}

impl ItemPlacer {
    pub fn new(world_seed: u64) -> Self {
        Self {
            world_seed,
            sampler: PoissonDiscSampler::default(),
        }
    }

    pub fn place_all(
        &self,
        heightfield: &Heightfield,
        chunk: GridPos,
        rules: &[WorldItemSettings],
        grid_spacing: f32,
    ) -> Vec<WorldItem> {
        rules
            .iter()
            .enumerate()
            .flat_map(|(index, rule)| self.place(heightfield, chunk, index, rule, grid_spacing))
            .collect()
    }

    pub fn place(
        &self,
        heightfield: &Heightfield,
        chunk: GridPos,
        rule_index: usize,
        rule: &WorldItemSettings,
        grid_spacing: f32,
    ) -> Vec<WorldItem> {
        let mut rng = ChaCha8Rng::seed_from_u64(placement_seed(self.world_seed, chunk, rule_index));
        let candidates = if rule.concentration > 1.0 {
            self.density_candidates(heightfield, rule, &mut rng)
        } else {
            chance_candidate(heightfield, rule, &mut rng).into_iter().collect()
        };

        candidates
            .into_iter()
            .filter_map(|location| {
                pose_candidate(heightfield, rule_index, rule, location, grid_spacing, &mut rng)
            })
            .collect()
    }

    fn density_candidates(
        &self,
        heightfield: &Heightfield,
        rule: &WorldItemSettings,
        rng: &mut ChaCha8Rng,
    ) -> Vec<Vec2> {
        let span = interior_span(heightfield);
        if span <= 0.0 {
            return Vec::new();
        }
        let attempts = (rule.concentration as usize).min(MAX_POISSON_ATTEMPTS);
        self.sampler
            .sample(Vec2::splat(span), attempts, rng)
            .into_iter()
            .map(|point| point + Vec2::ONE)
            .collect()
    }
}

/// Rendered cells run from index 1 to `size - 2`.
fn interior_span(heightfield: &Heightfield) -> f32 {
    heightfield.size() as f32 - 3.0
}

fn chance_candidate(heightfield: &Heightfield, rule: &WorldItemSettings, rng: &mut ChaCha8Rng) -> Option<Vec2> {
    let draw: f32 = rng.gen();
    // Written this way so a NaN concentration never fires.
    if !(draw < rule.concentration) {
        return None;
    }
    let span = interior_span(heightfield);
    if span <= 0.0 {
        return None;
    }
    Some(Vec2::new(
        1.0 + rng.gen_range(0.0..span),
        1.0 + rng.gen_range(0.0..span),
    ))
}

fn pose_candidate(
    heightfield: &Heightfield,
    rule_index: usize,
    rule: &WorldItemSettings,
    location: Vec2,
    grid_spacing: f32,
    rng: &mut ChaCha8Rng,
) -> Option<WorldItem> {
    let height = heightfield.get(location.x.round() as i64, location.y.round() as i64)?;
    if height < rule.minimum_spawn_altitude || height > rule.maximum_spawn_altitude {
        return None;
    }
    if let Some(max_slope) = rule.max_slope_degrees {
        let slope = heightfield.slope_at(location, grid_spacing);
        if is_sentinel(slope) || slope > max_slope {
            return None;
        }
    }

    let low = rule.min_size.min(rule.max_size);
    let high = rule.min_size.max(rule.max_size);
    let size = if high > low { rng.gen_range(low..high) } else { low };

    let yaw = if rule.randomize_y_rotation {
        rng.gen_range(0.0..TAU)
    } else {
        0.0
    };
    let (tilt_x, tilt_z) = if rule.randomize_tilt_angle > 0.0 {
        let limit = rule.randomize_tilt_angle;
        (
            rng.gen_range(0.0..limit).to_radians(),
            rng.gen_range(0.0..limit).to_radians(),
        )
    } else {
        (0.0, 0.0)
    };

    let mut item = WorldItem {
        rule_index: rule_index as u32,
        rule_name: rule.name.clone(),
        model: rule.model.clone(),
        category: rule.category,
        grid_location: location,
        scale: Vec3::splat(size),
        rotation: Vec3::new(tilt_x, yaw, tilt_z),
        levitation: rule.levitation,
        content_hash: 0,
        model_handle: None,
    };
    item.refresh_content_hash();
    Some(item)
}
