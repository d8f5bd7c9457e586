use glam::Vec2;
use rand::Rng;

/// Bridson-style dart throwing with a bounded number of expansion steps.
#[derive(Debug, Clone, Copy)]
pub struct PoissonDiscSampler {
    radius: f32,
    max_iterations: usize,
}

impl PoissonDiscSampler {
    pub const DEFAULT_RADIUS: f32 = 10.0;
    pub const DEFAULT_MAX_ITERATIONS: usize = 100;

    pub fn new(radius: f32, max_iterations: usize) -> Self {
        Self {
            radius: radius.max(f32::EPSILON),
            max_iterations,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Points inside `[0, region)` no closer than the radius to each other.
    ///
    /// `attempts` is how many candidates are thrown around a spawn point before it retires.
    /// Growth starts from a random seed point that is not itself emitted.
    pub fn sample<R: Rng + ?Sized>(&self, region: Vec2, attempts: usize, rng: &mut R) -> Vec<Vec2> {
        let mut points: Vec<Vec2> = Vec::new();
        if !(region.x > 0.0 && region.y > 0.0) || attempts == 0 {
            return points;
        }

        let cell_size = self.radius / std::f32::consts::SQRT_2;
        let cols = (region.x / cell_size).ceil() as usize;
        let rows = (region.y / cell_size).ceil() as usize;
        let mut grid: Vec<Option<usize>> = vec![None; cols * rows];

        let origin = Vec2::new(rng.gen_range(0.0..region.x), rng.gen_range(0.0..region.y));
        let mut spawn_points = vec![origin];
        let mut iterations = 0;

        while !spawn_points.is_empty() && iterations < self.max_iterations {
            let spawn_index = rng.gen_range(0..spawn_points.len());
            let centre = spawn_points[spawn_index];
            let mut accepted = false;

            for _ in 0..attempts {
                let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                let distance = rng.gen_range(self.radius..2.0 * self.radius);
                let candidate = centre + Vec2::new(angle.sin(), angle.cos()) * distance;
                if self.is_valid(candidate, region, cell_size, cols, rows, &points, &grid) {
                    let cell = cell_of(candidate, cell_size, cols, rows);
                    points.push(candidate);
                    spawn_points.push(candidate);
                    grid[cell] = Some(points.len() - 1);
                    accepted = true;
                    break;
                }
            }

            if !accepted {
                spawn_points.swap_remove(spawn_index);
            }
            iterations += 1;
        }

        points
    }

    #[allow(clippy::too_many_arguments)]
    fn is_valid(
        &self,
        candidate: Vec2,
        region: Vec2,
        cell_size: f32,
        cols: usize,
        rows: usize,
        points: &[Vec2],
        grid: &[Option<usize>],
    ) -> bool {
        if candidate.x < 0.0 || candidate.y < 0.0 || candidate.x >= region.x || candidate.y >= region.y {
            return false;
        }

        let cell_x = (candidate.x / cell_size) as usize;
        let cell_y = (candidate.y / cell_size) as usize;
        let radius_sq = self.radius * self.radius;
        for y in cell_y.saturating_sub(2)..=(cell_y + 2).min(rows - 1) {
            for x in cell_x.saturating_sub(2)..=(cell_x + 2).min(cols - 1) {
                if let Some(index) = grid[y * cols + x] {
                    if candidate.distance_squared(points[index]) < radius_sq {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl Default for PoissonDiscSampler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RADIUS, Self::DEFAULT_MAX_ITERATIONS)
    }
}

fn cell_of(point: Vec2, cell_size: f32, cols: usize, rows: usize) -> usize {
    let x = ((point.x / cell_size) as usize).min(cols - 1);
    let y = ((point.y / cell_size) as usize).min(rows - 1);
    y * cols + x
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::PoissonDiscSampler;

    #[test]
    fn points_respect_minimum_spacing_and_bounds() {
        let sampler = PoissonDiscSampler::default();
        let region = Vec2::splat(50.0);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let points = sampler.sample(region, 30, &mut rng);

        assert!(!points.is_empty());
        for (i, a) in points.iter().enumerate() {
            assert!(a.x >= 0.0 && a.y >= 0.0 && a.x < region.x && a.y < region.y);
            for b in &points[i + 1..] {
                assert!(a.distance(*b) >= sampler.radius() - 1e-4);
            }
        }
    }

    #[test]
    fn same_seed_same_points() {
        let sampler = PoissonDiscSampler::default();
        let a = sampler.sample(Vec2::splat(50.0), 3, &mut ChaCha8Rng::seed_from_u64(9));
        let b = sampler.sample(Vec2::splat(50.0), 3, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn iteration_cap_bounds_output() {
        let sampler = PoissonDiscSampler::new(1.0, 10);
        let points = sampler.sample(Vec2::splat(500.0), 30, &mut ChaCha8Rng::seed_from_u64(1));
        assert!(points.len() <= 10);
    }

    #[test]
    fn degenerate_inputs_yield_nothing() {
        let sampler = PoissonDiscSampler::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(sampler.sample(Vec2::ZERO, 5, &mut rng).is_empty());
        assert!(sampler.sample(Vec2::splat(40.0), 0, &mut rng).is_empty());
    }
}
