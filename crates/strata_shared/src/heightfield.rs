use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Marks a sample as undefined. Never produced by generation itself.
pub const SENTINEL_HEIGHT: f32 = -201.0;

pub fn is_sentinel(value: f32) -> bool {
    value == SENTINEL_HEIGHT
}

/// Square grid of elevations, row-major, `y` growing toward world -Z.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Heightfield {
    size: usize,
    samples: Vec<f32>,
}

impl Heightfield {
    pub fn new_filled(size: usize, value: f32) -> Self {
        Self {
            size,
            samples: vec![value; size * size],
        }
    }

    /// Fallback terrain used when generation or loading fails.
    pub fn flat(size: usize) -> Self {
        Self::new_filled(size, 0.0)
    }

    pub fn from_samples(size: usize, samples: Vec<f32>) -> Option<Self> {
        (samples.len() == size * size).then_some(Self { size, samples })
    }

    pub(crate) fn from_grid(size: usize, samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len(), size * size);
        Self { size, samples }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        let size = self.size as i64;
        if x < 0 || y < 0 || x >= size || y >= size {
            return None;
        }
        Some((y * size + x) as usize)
    }

    /// Defined elevation at a cell, or `None` when out of range or undefined.
    pub fn get(&self, x: i64, y: i64) -> Option<f32> {
        self.index(x, y)
            .map(|index| self.samples[index])
            .filter(|value| !is_sentinel(*value))
    }

    /// Like [`Heightfield::get`] but folds misses into the sentinel.
    pub fn sample(&self, x: i64, y: i64) -> f32 {
        self.get(x, y).unwrap_or(SENTINEL_HEIGHT)
    }

    /// Unchecked-for-sentinel read used by the mesh builder; panics when out of range.
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.samples[y * self.size + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        let index = y * self.size + x;
        self.samples[index] = value;
    }

    /// Height at fractional local coordinates, rounded to the nearest cell.
    pub fn height_at(&self, local: Vec2) -> f32 {
        if !local.is_finite() {
            return SENTINEL_HEIGHT;
        }
        self.sample(local.x.round() as i64, local.y.round() as i64)
    }

    /// Inclination in degrees of the cell at the ceiling of `local`.
    pub fn slope_at(&self, local: Vec2, spacing: f32) -> f32 {
        if !local.is_finite() {
            return SENTINEL_HEIGHT;
        }
        let x = local.x.ceil() as i64;
        let y = local.y.ceil() as i64;
        let (Some(h00), Some(h01), Some(h11)) = (
            self.get(x, y),
            self.get(x, y + 1),
            self.get(x + 1, y + 1),
        ) else {
            return SENTINEL_HEIGHT;
        };

        let v1 = glam::Vec3::new(0.0, h00, 0.0);
        let v2 = glam::Vec3::new(0.0, h01, spacing);
        let v3 = glam::Vec3::new(spacing, h11, spacing);
        let normal = (v2 - v1).cross(v3 - v1).normalize_or_zero();
        normal.dot(glam::Vec3::Y).abs().clamp(0.0, 1.0).acos().to_degrees()
    }

    /// Lowest and highest defined samples.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.samples
            .iter()
            .copied()
            .filter(|value| !is_sentinel(*value))
            .fold(None, |acc, value| match acc {
                None => Some((value, value)),
                Some((lo, hi)) => Some((lo.min(value), hi.max(value))),
            })
    }

    pub fn is_fully_populated(&self) -> bool {
        self.samples
            .iter()
            .all(|value| value.is_finite() && !is_sentinel(*value))
    }
}
