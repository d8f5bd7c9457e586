use glam::{EulerRot, Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::coords::{ChunkGeometry, GridPos};
use crate::heightfield::Heightfield;
use crate::settings::ItemCategory;

/// Opaque reference to a model instance owned by the host engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelHandle(pub u64);

/// One placed instance of a catalog rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldItem {
    pub rule_index: u32,
    pub rule_name: String,
    pub model: String,
    pub category: ItemCategory,
    /// Fractional heightfield indices inside the owning chunk.
    pub grid_location: Vec2,
    pub scale: Vec3,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: Vec3,
    pub levitation: f32,
    pub content_hash: u32,
    #[serde(skip)]
    pub model_handle: Option<ModelHandle>,
}

impl WorldItem {
    pub fn compute_content_hash(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(self.rule_name.as_bytes());
        hasher.update(&self.rule_index.to_le_bytes());
        for value in [
            self.grid_location.x,
            self.grid_location.y,
            self.scale.x,
            self.scale.y,
            self.scale.z,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        ] {
            hasher.update(&value.to_bits().to_le_bytes());
        }
        hasher.finalize()
    }

    pub fn refresh_content_hash(&mut self) {
        self.content_hash = self.compute_content_hash();
    }

    pub fn is_realized(&self) -> bool {
        self.model_handle.is_some()
    }

    pub fn world_position(&self, geometry: &ChunkGeometry, chunk: GridPos, heightfield: &Heightfield) -> Vec3 {
        let ground = heightfield.get(
            self.grid_location.x.round() as i64,
            self.grid_location.y.round() as i64,
        );
        let planar = geometry.local_to_world(chunk, self.grid_location);
        Vec3::new(planar.x, ground.unwrap_or(0.0) + self.levitation, planar.y)
    }

    pub fn world_transform(&self, geometry: &ChunkGeometry, chunk: GridPos, heightfield: &Heightfield) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::from_scale_rotation_translation(
            self.scale,
            rotation,
            self.world_position(geometry, chunk, heightfield),
        )
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3, Vec4Swizzles};

    use super::{ModelHandle, WorldItem};
    use crate::coords::{ChunkGeometry, GridPos};
    use crate::heightfield::Heightfield;
    use crate::settings::ItemCategory;

    fn item() -> WorldItem {
        let mut item = WorldItem {
            rule_index: 0,
            rule_name: "tree_2".to_owned(),
            model: "static/tree_2".to_owned(),
            category: ItemCategory::Static,
            grid_location: Vec2::new(26.0, 26.0),
            scale: Vec3::splat(1.1),
            rotation: Vec3::ZERO,
            levitation: 2.0,
            content_hash: 0,
            model_handle: None,
        };
        item.refresh_content_hash();
        item
    }

    #[test]
    fn content_hash_tracks_placement() {
        let a = item();
        let mut b = a.clone();
        assert_eq!(a.content_hash, b.compute_content_hash());
        b.grid_location.x += 1.0;
        assert_ne!(a.content_hash, b.compute_content_hash());

        let mut realized = a.clone();
        realized.model_handle = Some(ModelHandle(7));
        assert_eq!(realized.compute_content_hash(), a.content_hash);
    }

    #[test]
    fn transform_places_item_above_ground() {
        let geometry = ChunkGeometry::new(48, 1.0).expect("supported size");
        let field = Heightfield::new_filled(53, 12.0);
        let pos = GridPos::new(1, -1);
        let transform = item().world_transform(&geometry, pos, &field);
        let origin = transform.col(3).xyz();
        assert_eq!(origin, Vec3::new(50.0, 14.0, -50.0));
    }
}
