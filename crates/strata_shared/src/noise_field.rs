use glam::IVec2;
use noise::{Fbm, MultiFractal, NoiseFn, OpenSimplex};

use crate::heightfield::Heightfield;
use crate::settings::TerrainPass;

const MIN_HORIZONTAL_SCALE: f64 = 1e-3;

/// Seeded fractal noise evaluated over integer grid windows.
///
/// Sample positions are `(x - width/2 + offset.x) / horizontal_scale` so two chunks
/// whose offsets differ by their grid span read identical values along the shared edge.
#[derive(Debug, Clone, Copy)]
pub struct NoiseField {
    world_seed: u64,
}

impl NoiseField {
    pub fn new(world_seed: u64) -> Self {
        Self { world_seed }
    }

    pub fn world_seed(&self) -> u64 {
        self.world_seed
    }

    /// Each pass gets its own seed so layers never alias.
    pub fn pass_seed(&self, pass_index: usize) -> u32 {
        let folded = (self.world_seed ^ (self.world_seed >> 32)) as u32;
        folded.wrapping_add(pass_index as u32)
    }

    /// Row-major `width * height` values in `[-vertical_scale, vertical_scale]`.
    pub fn sample_grid(
        &self,
        width: usize,
        height: usize,
        pass: &TerrainPass,
        pass_index: usize,
        offset: IVec2,
    ) -> Vec<f32> {
        let fbm = Fbm::<OpenSimplex>::new(self.pass_seed(pass_index))
            .set_octaves(pass.octaves.max(1) as usize)
            .set_frequency(f64::from(pass.frequency));

        let scale_x = f64::from(pass.horizontal_scale.x).max(MIN_HORIZONTAL_SCALE);
        let scale_y = f64::from(pass.horizontal_scale.y).max(MIN_HORIZONTAL_SCALE);
        let half_width = width as f64 / 2.0;
        let half_height = height as f64 / 2.0;

        let mut values = Vec::with_capacity(width * height);
        for y in 0..height {
            let sample_y = (y as f64 - half_height + f64::from(offset.y)) / scale_y;
            for x in 0..width {
                let sample_x = (x as f64 - half_width + f64::from(offset.x)) / scale_x;
                let raw = fbm.get([sample_x, sample_y]).clamp(-1.0, 1.0);
                values.push(raw as f32 * pass.vertical_scale);
            }
        }
        values
    }

    pub fn sample(&self, size: usize, pass: &TerrainPass, pass_index: usize, offset: IVec2) -> Heightfield {
        Heightfield::from_grid(size, self.sample_grid(size, size, pass, pass_index, offset))
    }
}

#[cfg(test)]
mod tests {
    use glam::{IVec2, Vec2};

    use super::NoiseField;
    use crate::settings::TerrainPass;

    fn pass() -> TerrainPass {
        TerrainPass {
            horizontal_scale: Vec2::splat(40.0),
            vertical_scale: 30.0,
            octaves: 3,
            frequency: 1.5,
            ..TerrainPass::default()
        }
    }

    #[test]
    fn same_inputs_give_identical_output() {
        let field = NoiseField::new(1234);
        let a = field.sample_grid(17, 17, &pass(), 0, IVec2::new(50, -50));
        let b = field.sample_grid(17, 17, &pass(), 0, IVec2::new(50, -50));
        assert_eq!(a, b);
    }

    #[test]
    fn output_is_bounded_by_vertical_scale() {
        let field = NoiseField::new(7);
        let values = field.sample_grid(33, 21, &pass(), 2, IVec2::ZERO);
        assert_eq!(values.len(), 33 * 21);
        assert!(values.iter().all(|v| v.is_finite() && v.abs() <= 30.0));
    }

    #[test]
    fn pass_index_changes_the_field() {
        let field = NoiseField::new(1234);
        assert_ne!(field.pass_seed(0), field.pass_seed(1));
        let a = field.sample_grid(9, 9, &pass(), 0, IVec2::ZERO);
        let b = field.sample_grid(9, 9, &pass(), 1, IVec2::ZERO);
        assert_ne!(a, b);
    }

    #[test]
    fn shifted_windows_overlap_exactly() {
        let field = NoiseField::new(99);
        let size = 13;
        let span = 10;
        let left = field.sample_grid(size, size, &pass(), 0, IVec2::ZERO);
        let right = field.sample_grid(size, size, &pass(), 0, IVec2::new(span, 0));
        for y in 0..size {
            for x in 0..size - span as usize {
                assert_eq!(left[y * size + x + span as usize], right[y * size + x]);
            }
        }
    }
}
