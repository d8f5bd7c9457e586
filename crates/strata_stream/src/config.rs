use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_shared::coords::{nearest_supported_chunk_size, ChunkGeometry};
use strata_shared::error::GenerationError;
use strata_shared::settings::MapSettings;
use tracing::warn;

use crate::lod::{default_lod_table, LodInfo, MAX_LOD};

const MIN_MESH_SCALE: f32 = 0.1;
const MAX_MESH_SCALE: f32 = 16.0;
const MIN_UPDATE_INTERVAL: f32 = 0.05;
const MAX_UPDATE_INTERVAL: f32 = 10.0;
const MAX_VIEWING_DISTANCE: u32 = 32;
const MAX_WORKER_THREADS: usize = 64;

/// Everything the streamer needs from external setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default = "default_mesh_scale")]
    pub mesh_scale: f32,
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: f32,
    /// Rings streamed beyond ring 0.
    #[serde(default = "default_viewing_distance")]
    pub viewing_distance: u32,
    #[serde(default = "default_lod_table")]
    pub lod_rings: Vec<LodInfo>,
    #[serde(default)]
    pub cache_to_disk: bool,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default)]
    pub map: MapSettings,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            chunk_size: default_chunk_size(),
            mesh_scale: default_mesh_scale(),
            update_interval_secs: default_update_interval_secs(),
            viewing_distance: default_viewing_distance(),
            lod_rings: default_lod_table(),
            cache_to_disk: false,
            cache_dir: default_cache_dir(),
            worker_threads: None,
            map: MapSettings::default(),
        }
    }
}

impl WorldConfig {
    pub fn sanitize(mut self) -> Self {
        self.chunk_size = nearest_supported_chunk_size(self.chunk_size);
        self.mesh_scale = if self.mesh_scale.is_finite() {
            self.mesh_scale.clamp(MIN_MESH_SCALE, MAX_MESH_SCALE)
        } else {
            default_mesh_scale()
        };
        self.update_interval_secs = if self.update_interval_secs.is_finite() {
            self.update_interval_secs
                .clamp(MIN_UPDATE_INTERVAL, MAX_UPDATE_INTERVAL)
        } else {
            default_update_interval_secs()
        };
        self.viewing_distance = self.viewing_distance.min(MAX_VIEWING_DISTANCE);
        if self.lod_rings.is_empty() {
            self.lod_rings = default_lod_table();
        }
        for (index, info) in self.lod_rings.iter_mut().enumerate() {
            info.ring = index as u32;
            info.lod = info.lod.min(MAX_LOD);
        }
        self.worker_threads = self
            .worker_threads
            .map(|count| count.clamp(1, MAX_WORKER_THREADS));
        if !(self.map.lowest_point < self.map.highest_point) {
            let defaults = MapSettings::default();
            self.map.lowest_point = defaults.lowest_point;
            self.map.highest_point = defaults.highest_point;
        }
        self
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let parsed = toml::from_str::<Self>(&contents).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to deserialize world config: {e}"),
            )
        })?;
        Ok(parsed.sanitize())
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let config = self.clone().sanitize();
        let serialized = toml::to_string_pretty(&config).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to serialize world config: {e}"),
            )
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serialized)
    }

    pub fn geometry(&self) -> Result<ChunkGeometry, GenerationError> {
        ChunkGeometry::new(self.chunk_size, self.mesh_scale)
    }

    /// The slice of the ring table currently streamed.
    pub fn active_rings(&self) -> &[LodInfo] {
        let count = (self.viewing_distance as usize + 1).min(self.lod_rings.len());
        &self.lod_rings[..count]
    }
}

pub fn load_or_create(path: &Path) -> WorldConfig {
    match WorldConfig::load(path) {
        Ok(config) => config,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let config = WorldConfig::default();
            if let Err(save_err) = config.save(path) {
                warn!(
                    "Failed to create default world config at {}: {save_err}",
                    path.display()
                );
            }
            config
        }
        Err(err) => {
            warn!("Failed to load world config from {}: {err}", path.display());
            WorldConfig::default()
        }
    }
}

fn default_seed() -> u64 {
    1234
}

fn default_chunk_size() -> u32 {
    48
}

fn default_mesh_scale() -> f32 {
    1.0
}

fn default_update_interval_secs() -> f32 {
    1.0
}

fn default_viewing_distance() -> u32 {
    5
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("terrain_cache")
}
