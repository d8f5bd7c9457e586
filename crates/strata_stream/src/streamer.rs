use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec2};
use rustc_hash::FxHashMap;
use strata_core::jobs::ThreadPoolBuildError;
use strata_core::schedule::FixedInterval;
use strata_persist::codec::ChunkCodec;
use strata_shared::chunk::{ChunkData, ChunkOrigin};
use strata_shared::coords::{ChunkGeometry, GridPos, Quadrant};
use strata_shared::error::GenerationError;
use strata_shared::heightfield::SENTINEL_HEIGHT;
use strata_shared::items::WorldItem;
use strata_shared::worldgen::TerrainGenerator;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::chunk::{Chunk, ChunkState, LodTransition};
use crate::config::WorldConfig;
use crate::lod::{ring_of, window, LodInfo};
use crate::mesh::{ChunkMeshBuilder, ColorRamp, TerrainMesh};
use crate::realize::ItemRealizer;
use crate::worker::{TerrainWorker, WorkerResult};

#[derive(Debug, Error)]
pub enum StreamerError {
    #[error("invalid world geometry: {0}")]
    Geometry(#[from] GenerationError),
    #[error("failed to start terrain workers: {0}")]
    WorkerPool(#[from] ThreadPoolBuildError),
}

/// Changes the host should mirror in its scene.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    ChunkReady { pos: GridPos, origin: ChunkOrigin },
    MeshSwapped { pos: GridPos, lod: u8, collider: bool },
    ChunkEvicted { pos: GridPos },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamerStats {
    pub window_refreshes: u64,
    pub created: u64,
    pub relevelled: u64,
    pub evicted: u64,
    /// Results that arrived for a chunk that was evicted or replaced meanwhile.
    pub stale_results: u64,
    pub generation_runs: u64,
}

/// Keeps the ring window of chunks around a moving viewer.
///
/// All chunk bookkeeping happens inside `update` on the caller's thread. Loading and
/// meshing run on the worker pool and are folded back in on later calls.
pub struct ChunkStreamer<R: ItemRealizer> {
    geometry: ChunkGeometry,
    rings: Vec<LodInfo>,
    worker: TerrainWorker,
    realizer: R,
    chunks: FxHashMap<GridPos, Chunk>,
    interval: FixedInterval,
    viewer_chunk: Option<GridPos>,
    viewer_quadrant: Option<Quadrant>,
    window_corner: Option<GridPos>,
    next_epoch: u64,
    events: Vec<StreamEvent>,
    stats: StreamerStats,
}

impl<R: ItemRealizer> ChunkStreamer<R> {
    pub fn new(config: &WorldConfig, realizer: R) -> Result<Self, StreamerError> {
        let config = config.clone().sanitize();
        let geometry = config.geometry()?;
        let generator = TerrainGenerator::new(config.seed, geometry, config.map.clone());

        let codec = if config.cache_to_disk {
            match ChunkCodec::open(
                &config.cache_dir,
                config.map.lowest_point,
                config.map.highest_point,
            ) {
                Ok(codec) => Some(codec),
                Err(err) => {
                    warn!(
                        "Failed to open terrain cache at {}: {err}; caching disabled",
                        config.cache_dir.display()
                    );
                    None
                }
            }
        } else {
            None
        };

        let ramp = ColorRamp {
            lowest: config.map.lowest_point,
            highest: config.map.highest_point,
            ..ColorRamp::default()
        };
        let mesher = ChunkMeshBuilder::with_ramp(geometry.mesh_scale(), ramp);
        let worker = TerrainWorker::new(config.worker_threads, generator, codec, mesher)?;
        info!(
            "Streaming seed {} with chunk size {}, {} rings, caching {}",
            config.seed,
            geometry.chunk_size(),
            config.active_rings().len(),
            if worker.caching() { "on" } else { "off" }
        );

        Ok(Self::with_worker(
            worker,
            config.active_rings().to_vec(),
            config.update_interval_secs,
            realizer,
        ))
    }

    /// Builds a streamer around an existing worker. Ring entries are re-indexed by position.
    pub fn with_worker(
        worker: TerrainWorker,
        rings: Vec<LodInfo>,
        update_interval_secs: f32,
        realizer: R,
    ) -> Self {
        let rings = rings
            .into_iter()
            .enumerate()
            .map(|(index, info)| LodInfo {
                ring: index as u32,
                ..info
            })
            .collect();
        Self {
            geometry: *worker.generator().geometry(),
            rings,
            worker,
            realizer,
            chunks: FxHashMap::default(),
            interval: FixedInterval::new(update_interval_secs),
            viewer_chunk: None,
            viewer_quadrant: None,
            window_corner: None,
            next_epoch: 1,
            events: Vec::new(),
            stats: StreamerStats::default(),
        }
    }

    /// Folds in finished background work, then refreshes the window when the interval elapses.
    /// `viewer` is the viewer's world position on the X/Z plane.
    pub fn update(&mut self, dt: f32, viewer: Vec2) -> Vec<StreamEvent> {
        self.process_results();
        if self.interval.tick(dt) {
            self.refresh_window(viewer);
        }
        std::mem::take(&mut self.events)
    }

    /// Blocks until no load or mesh build is outstanding, or until `timeout` passes.
    pub fn drain_blocking(&mut self, timeout: Duration) -> Vec<StreamEvent> {
        let deadline = Instant::now() + timeout;
        self.process_results();
        while self.has_pending_work() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.worker.wait(remaining) {
                Some(result) => {
                    self.apply_result(result);
                    self.process_results();
                }
                None => break,
            }
        }
        std::mem::take(&mut self.events)
    }

    /// Tracks `pos` and starts loading it unless it is already tracked.
    /// Chunks outside the current window are evicted on the next polling tick.
    pub fn request_chunk(&mut self, pos: GridPos) -> bool {
        if self.chunks.contains_key(&pos) {
            return false;
        }
        let Some(info) = self.ring_for(pos) else {
            return false;
        };
        self.spawn_chunk(pos, info);
        true
    }

    /// Destroys a chunk and releases its items. Evicting an untracked coordinate is a no-op.
    pub fn evict(&mut self, pos: GridPos) -> bool {
        let Some(mut chunk) = self.chunks.remove(&pos) else {
            warn!("Asked to evict untracked chunk {pos}");
            return false;
        };
        if let Some(data) = chunk.destroy() {
            for handle in data.items.iter().filter_map(|item| item.model_handle) {
                self.realizer.release(pos, handle);
            }
        }
        self.stats.evicted += 1;
        self.events.push(StreamEvent::ChunkEvicted { pos });
        true
    }

    /// Terrain height under a world point, or the sentinel when its chunk is not ready.
    pub fn height_at_world(&self, world: Vec2) -> f32 {
        let pos = self.geometry.world_to_chunk(world);
        match self.chunks.get(&pos) {
            Some(chunk) => chunk.height_at(self.geometry.world_to_local(pos, world)),
            None => SENTINEL_HEIGHT,
        }
    }

    /// Ground inclination in degrees under a world point, or the sentinel.
    pub fn inclination_at_world(&self, world: Vec2) -> f32 {
        let pos = self.geometry.world_to_chunk(world);
        match self.chunks.get(&pos) {
            Some(chunk) => chunk.slope_at(self.geometry.world_to_local(pos, world)),
            None => SENTINEL_HEIGHT,
        }
    }

    pub fn chunk(&self, pos: GridPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    pub fn resident_positions(&self) -> Vec<GridPos> {
        let mut positions: Vec<GridPos> = self.chunks.keys().copied().collect();
        positions.sort();
        positions
    }

    pub fn resident_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn ready_count(&self) -> usize {
        self.chunks.values().filter(|chunk| chunk.is_ready()).count()
    }

    pub fn mesh(&self, pos: GridPos) -> Option<&Arc<TerrainMesh>> {
        self.chunks.get(&pos).and_then(Chunk::mesh)
    }

    pub fn items(&self, pos: GridPos) -> &[WorldItem] {
        match self.chunks.get(&pos) {
            Some(chunk) => chunk.items(),
            None => &[],
        }
    }

    /// Items of a ready chunk paired with their world transforms.
    pub fn item_transforms(&self, pos: GridPos) -> Vec<(&WorldItem, Mat4)> {
        let Some(data) = self.chunks.get(&pos).and_then(Chunk::data) else {
            return Vec::new();
        };
        data.items
            .iter()
            .map(|item| {
                (
                    item,
                    item.world_transform(&self.geometry, pos, &data.heightfield),
                )
            })
            .collect()
    }

    pub fn geometry(&self) -> &ChunkGeometry {
        &self.geometry
    }

    pub fn rings(&self) -> &[LodInfo] {
        &self.rings
    }

    pub fn viewer_chunk(&self) -> Option<GridPos> {
        self.viewer_chunk
    }

    pub fn viewer_quadrant(&self) -> Option<Quadrant> {
        self.viewer_quadrant
    }

    pub fn window_corner(&self) -> Option<GridPos> {
        self.window_corner
    }

    pub fn realizer(&self) -> &R {
        &self.realizer
    }

    pub fn stats(&self) -> StreamerStats {
        StreamerStats {
            generation_runs: self.worker.generation_runs(),
            ..self.stats
        }
    }

    pub fn has_pending_work(&self) -> bool {
        self.chunks
            .values()
            .any(|chunk| chunk.state() == ChunkState::Generating || chunk.has_pending_mesh())
    }

    fn refresh_window(&mut self, viewer: Vec2) {
        if !viewer.is_finite() {
            warn!("Ignoring non-finite viewer position {viewer}");
            return;
        }
        let chunk_pos = self.geometry.world_to_chunk(viewer);
        if self.viewer_chunk != Some(chunk_pos) {
            debug!("Viewer entered chunk {chunk_pos}");
            self.viewer_chunk = Some(chunk_pos);
        }
        let quadrant = self.geometry.quadrant(chunk_pos, viewer);
        self.viewer_quadrant = Some(quadrant);

        let corner = quadrant.ring0_corner(chunk_pos);
        if self.window_corner == Some(corner) {
            let evicted = self.evict_outside(corner);
            if evicted > 0 {
                debug!("Evicted {evicted} chunks outside the window at {corner}");
            }
            return;
        }
        self.window_corner = Some(corner);
        self.rebuild_window(corner);
    }

    fn rebuild_window(&mut self, corner: GridPos) {
        let mut created = 0usize;
        let mut relevelled = 0usize;

        for (pos, ring) in window(corner, self.rings.len()) {
            let info = self.rings[ring as usize];
            if let Some(chunk) = self.chunks.get_mut(&pos) {
                if chunk.ring().ring == ring {
                    continue;
                }
                relevelled += 1;
                match chunk.set_lod(info) {
                    LodTransition::Swapped => self.events.push(StreamEvent::MeshSwapped {
                        pos,
                        lod: info.lod,
                        collider: info.collider,
                    }),
                    LodTransition::Requested(request) => self.worker.submit_mesh(request),
                    LodTransition::Deferred | LodTransition::Unchanged => {}
                }
            } else {
                self.spawn_chunk(pos, info);
                created += 1;
            }
        }

        let evicted = self.evict_outside(corner);

        self.stats.window_refreshes += 1;
        self.stats.relevelled += relevelled as u64;
        info!(
            "Window moved to {corner}: {created} created, {relevelled} re-levelled, {evicted} evicted, {} resident",
            self.chunks.len()
        );
    }

    fn evict_outside(&mut self, corner: GridPos) -> usize {
        let ring_count = self.rings.len();
        let outside: Vec<GridPos> = self
            .chunks
            .keys()
            .filter(|&&pos| ring_of(corner, pos) as usize >= ring_count)
            .copied()
            .collect();
        for &pos in &outside {
            self.evict(pos);
        }
        outside.len()
    }

    fn ring_for(&self, pos: GridPos) -> Option<LodInfo> {
        let last = self.rings.len().checked_sub(1)?;
        let ring = match self.window_corner {
            Some(corner) => (ring_of(corner, pos) as usize).min(last),
            None => last,
        };
        Some(self.rings[ring])
    }

    fn spawn_chunk(&mut self, pos: GridPos, info: LodInfo) {
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        let mut chunk = Chunk::new(pos, info, epoch, self.geometry.mesh_scale());
        if let Some(request) = chunk.begin_load() {
            self.worker.submit_load(request);
        }
        self.chunks.insert(pos, chunk);
        self.stats.created += 1;
    }

    fn process_results(&mut self) {
        for result in self.worker.poll() {
            self.apply_result(result);
        }
    }

    fn apply_result(&mut self, result: WorkerResult) {
        match result {
            WorkerResult::Loaded {
                pos,
                epoch,
                mut data,
            } => {
                let Some(chunk) = self.chunks.get_mut(&pos) else {
                    debug!("Dropping load of evicted chunk {pos}");
                    self.stats.stale_results += 1;
                    return;
                };
                if chunk.epoch() != epoch || chunk.state() != ChunkState::Generating {
                    debug!("Dropping stale load of chunk {pos}");
                    self.stats.stale_results += 1;
                    return;
                }

                let realized = realize_items(&mut self.realizer, &self.geometry, pos, &mut data);
                let origin = data.origin;
                if let Some(request) = chunk.finish_load(data, realized) {
                    self.worker.submit_mesh(request);
                }
                debug!("Chunk {pos} ready ({origin:?})");
                self.events.push(StreamEvent::ChunkReady { pos, origin });
            }
            WorkerResult::Meshed {
                pos,
                epoch,
                version,
                mesh,
            } => {
                let Some(chunk) = self.chunks.get_mut(&pos).filter(|chunk| chunk.epoch() == epoch)
                else {
                    self.stats.stale_results += 1;
                    return;
                };
                let lod = mesh.lod;
                if chunk.finish_mesh(version, mesh) {
                    self.events.push(StreamEvent::MeshSwapped {
                        pos,
                        lod,
                        collider: chunk.ring().collider,
                    });
                }
            }
        }
    }
}

fn realize_items<R: ItemRealizer>(
    realizer: &mut R,
    geometry: &ChunkGeometry,
    pos: GridPos,
    data: &mut ChunkData,
) -> bool {
    let ChunkData {
        heightfield, items, ..
    } = data;
    for item in items.iter_mut() {
        let transform = item.world_transform(geometry, pos, heightfield);
        item.model_handle = realizer.bind(pos, item, transform);
    }
    items.iter().all(WorldItem::is_realized)
}
