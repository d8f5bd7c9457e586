use tracing::debug;

use crate::blend::TerrainPassBlender;
use crate::chunk::{ChunkData, ChunkOrigin};
use crate::coords::{ChunkGeometry, GridPos};
use crate::error::GenerationError;
use crate::noise_field::NoiseField;
use crate::placement::ItemPlacer;
use crate::settings::MapSettings;

/// Noise, blending, and item placement for one world.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    geometry: ChunkGeometry,
    blender: TerrainPassBlender,
    placer: ItemPlacer,
    map: MapSettings,
}

impl TerrainGenerator {
    pub fn new(seed: u64, geometry: ChunkGeometry, map: MapSettings) -> Self {
        Self {
            geometry,
            blender: TerrainPassBlender::new(NoiseField::new(seed)),
            placer: ItemPlacer::new(seed),
            map,
        }
    }

    pub fn geometry(&self) -> &ChunkGeometry {
        &self.geometry
    }

    pub fn map(&self) -> &MapSettings {
        &self.map
    }

    pub fn seed(&self) -> u64 {
        self.blender.noise().world_seed()
    }

    pub fn generate_chunk(&self, pos: GridPos) -> Result<ChunkData, GenerationError> {
        let size = self.geometry.num_verts_per_line();
        let heightfield = self
            .blender
            .blend(&self.map.passes, size, self.geometry.sample_offset(pos))?;
        let items = self.placer.place_all(
            &heightfield,
            pos,
            &self.map.items,
            self.geometry.mesh_scale(),
        );
        debug!("Generated chunk {pos} with {} items", items.len());
        Ok(ChunkData::new(heightfield, items, ChunkOrigin::Generated))
    }
}
