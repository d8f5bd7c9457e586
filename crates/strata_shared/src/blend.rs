use glam::IVec2;

use crate::error::GenerationError;
use crate::heightfield::{is_sentinel, Heightfield};
use crate::noise_field::NoiseField;
use crate::settings::{BlendMode, TerrainPass};

/// Pivot for contrast adjustment.
pub const CONTRAST_MIDPOINT: f32 = 0.0;

/// Folds an ordered list of noise passes into one heightfield.
///
/// Pass 0 sets the base. Every later pass only acts inside its own elevation band,
/// measured against the heightfield accumulated so far, so the order of passes matters.
#[derive(Debug, Clone, Copy)]
pub struct TerrainPassBlender {
    noise: NoiseField,
}

impl TerrainPassBlender {
    pub fn new(noise: NoiseField) -> Self {
        Self { noise }
    }

    pub fn noise(&self) -> &NoiseField {
        &self.noise
    }

    pub fn blend(
        &self,
        passes: &[TerrainPass],
        size: usize,
        sample_offset: IVec2,
    ) -> Result<Heightfield, GenerationError> {
        let (base, rest) = passes.split_first().ok_or(GenerationError::NoPasses)?;
        validate_mask(base, 0, size)?;

        let mut accumulated = self.noise.sample_grid(size, size, base, 0, sample_offset);
        apply_contrast(&mut accumulated, base.contrast);
        check_finite(&accumulated, 0, size)?;

        for (offset, pass) in rest.iter().enumerate() {
            let pass_index = offset + 1;
            validate_mask(pass, pass_index, size)?;
            let mut layer = self.noise.sample_grid(size, size, pass, pass_index, sample_offset);
            apply_contrast(&mut layer, pass.contrast);
            check_finite(&layer, pass_index, size)?;
            blend_pass(&mut accumulated, &layer, pass);
        }

        Ok(Heightfield::from_grid(size, accumulated))
    }
}

/// `mid + (v - mid) * contrast`, leaving undefined cells alone.
pub fn apply_contrast(values: &mut [f32], contrast: f32) {
    if contrast == 1.0 {
        return;
    }
    for value in values.iter_mut().filter(|value| !is_sentinel(**value)) {
        *value = CONTRAST_MIDPOINT + (*value - CONTRAST_MIDPOINT) * contrast;
    }
}

/// Combines `layer` into `accumulated` cell by cell.
///
/// An undefined cell on either side yields the other side's value unchanged.
pub fn blend_pass(accumulated: &mut [f32], layer: &[f32], pass: &TerrainPass) {
    for (index, (current, incoming)) in accumulated.iter_mut().zip(layer).enumerate() {
        let incoming = *incoming;
        if is_sentinel(*current) {
            *current = incoming;
            continue;
        }
        if is_sentinel(incoming) {
            continue;
        }

        let height_mask = smoothstep(pass.min_height, pass.max_height, *current);
        let mask = pass
            .mask
            .as_ref()
            .and_then(|mask| mask.get(index))
            .map_or(1.0, |value| value.clamp(0.0, 1.0));
        let weight = pass.blend_weight * height_mask * mask;

        *current = match pass.blend_mode {
            BlendMode::Mix => *current + (incoming - *current) * weight,
            BlendMode::Add => *current + incoming.max(0.0) * weight,
            BlendMode::Subtract => *current - incoming.max(0.0) * weight,
            BlendMode::None => *current,
        };
    }
}

/// Hermite falloff between `edge0` and `edge1`. A collapsed band acts as a hard step.
pub fn smoothstep(edge0: f32, edge1: f32, value: f32) -> f32 {
    if edge1 <= edge0 {
        return if value >= edge0 { 1.0 } else { 0.0 };
    }
    let t = ((value - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn validate_mask(pass: &TerrainPass, pass_index: usize, size: usize) -> Result<(), GenerationError> {
    match &pass.mask {
        Some(mask) if mask.len() != size * size => Err(GenerationError::MaskSizeMismatch {
            pass: pass_index,
            expected: size * size,
            actual: mask.len(),
        }),
        _ => Ok(()),
    }
}

fn check_finite(values: &[f32], pass_index: usize, size: usize) -> Result<(), GenerationError> {
    match values.iter().position(|value| !value.is_finite()) {
        Some(index) => Err(GenerationError::NonFinite {
            pass: pass_index,
            x: index % size.max(1),
            y: index / size.max(1),
        }),
        None => Ok(()),
    }
}
