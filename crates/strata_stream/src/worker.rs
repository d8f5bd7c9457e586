use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use strata_core::events::{self, EventReceiver, EventSender};
use strata_core::jobs::{JobSystem, ThreadPoolBuildError};
use strata_core::schedule::CancellationToken;
use strata_persist::codec::ChunkCodec;
use strata_shared::chunk::{ChunkData, ChunkOrigin};
use strata_shared::coords::GridPos;
use strata_shared::worldgen::TerrainGenerator;
use tracing::{debug, warn};

use crate::mesh::{ChunkMeshBuilder, TerrainMesh};

#[derive(Debug)]
pub struct LoadRequest {
    pub pos: GridPos,
    pub epoch: u64,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub struct MeshRequest {
    pub pos: GridPos,
    pub epoch: u64,
    pub version: u64,
    pub lod: u8,
    pub data: Arc<ChunkData>,
    pub cancel: CancellationToken,
}

/// Completed background work. `epoch` identifies the chunk instance that asked for it.
pub enum WorkerResult {
    Loaded {
        pos: GridPos,
        epoch: u64,
        data: ChunkData,
    },
    Meshed {
        pos: GridPos,
        epoch: u64,
        version: u64,
        mesh: TerrainMesh,
    },
}

/// Runs chunk loads and mesh builds on a job pool and queues their results.
pub struct TerrainWorker {
    jobs: JobSystem,
    generator: Arc<TerrainGenerator>,
    codec: Option<Arc<ChunkCodec>>,
    mesher: ChunkMeshBuilder,
    completed_tx: EventSender<WorkerResult>,
    completed_rx: EventReceiver<WorkerResult>,
    generation_runs: Arc<AtomicU64>,
}

impl TerrainWorker {
    pub fn new(
        worker_threads: Option<usize>,
        generator: TerrainGenerator,
        codec: Option<ChunkCodec>,
        mesher: ChunkMeshBuilder,
    ) -> Result<Self, ThreadPoolBuildError> {
        let jobs = JobSystem::new(worker_threads, "terrain-worker")?;
        let (completed_tx, completed_rx) = events::channel();
        Ok(Self {
            jobs,
            generator: Arc::new(generator),
            codec: codec.map(Arc::new),
            mesher,
            completed_tx,
            completed_rx,
            generation_runs: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    pub fn caching(&self) -> bool {
        self.codec.is_some()
    }

    /// Number of chunks produced by the generator rather than the cache.
    pub fn generation_runs(&self) -> u64 {
        self.generation_runs.load(Ordering::Relaxed)
    }

    pub fn submit_load(&self, request: LoadRequest) {
        let generator = Arc::clone(&self.generator);
        let codec = self.codec.clone();
        let generation_runs = Arc::clone(&self.generation_runs);
        let completed_tx = self.completed_tx.clone();
        self.jobs.spawn(move || {
            if request.cancel.is_cancelled() {
                debug!("Skipping load of {} after eviction", request.pos);
                return;
            }
            let data = load_or_generate(
                request.pos,
                &generator,
                codec.as_deref(),
                &generation_runs,
            );
            let _ = completed_tx.send(WorkerResult::Loaded {
                pos: request.pos,
                epoch: request.epoch,
                data,
            });
        });
    }

    pub fn submit_mesh(&self, request: MeshRequest) {
        let mesher = self.mesher;
        let completed_tx = self.completed_tx.clone();
        self.jobs.spawn(move || {
            if request.cancel.is_cancelled() {
                return;
            }
            let mesh = mesher.build(&request.data.heightfield, request.lod);
            let _ = completed_tx.send(WorkerResult::Meshed {
                pos: request.pos,
                epoch: request.epoch,
                version: request.version,
                mesh,
            });
        });
    }

    pub fn poll(&self) -> Vec<WorkerResult> {
        self.completed_rx.drain()
    }

    pub fn wait(&self, timeout: std::time::Duration) -> Option<WorkerResult> {
        self.completed_rx.recv_timeout(timeout)
    }
}

fn load_or_generate(
    pos: GridPos,
    generator: &TerrainGenerator,
    codec: Option<&ChunkCodec>,
    generation_runs: &AtomicU64,
) -> ChunkData {
    if let Some(codec) = codec {
        match codec.load(pos) {
            Ok(Some((heightfield, items))) => {
                if heightfield.size() == generator.geometry().num_verts_per_line() {
                    debug!("Loaded chunk {pos} from cache");
                    return ChunkData::new(heightfield, items, ChunkOrigin::LoadedFromCache);
                }
                warn!(
                    "Cached chunk {pos} has side {} instead of {}; regenerating",
                    heightfield.size(),
                    generator.geometry().num_verts_per_line()
                );
            }
            Ok(None) => {}
            Err(err) => warn!("Failed to load cached chunk {pos}: {err}; regenerating"),
        }
    }

    generation_runs.fetch_add(1, Ordering::Relaxed);
    let data = match generator.generate_chunk(pos) {
        Ok(data) => data,
        Err(err) => {
            warn!("Failed to generate chunk {pos}: {err}; using flat terrain");
            return ChunkData::fallback(generator.geometry().num_verts_per_line());
        }
    };

    if let Some(codec) = codec {
        if let Err(err) = codec.save(pos, &data.heightfield, &data.items) {
            warn!("Failed to cache chunk {pos}: {err}");
        }
    }
    data
}
