use std::sync::Arc;

use bitflags::bitflags;
use glam::Vec2;
use strata_core::schedule::CancellationToken;
use strata_shared::chunk::ChunkData;
use strata_shared::coords::GridPos;
use strata_shared::heightfield::SENTINEL_HEIGHT;
use strata_shared::items::WorldItem;

use crate::lod::{LodInfo, MAX_LOD};
use crate::mesh::TerrainMesh;
use crate::worker::{LoadRequest, MeshRequest};

const LOD_SLOTS: usize = MAX_LOD as usize + 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChunkState {
    Unloaded,
    Generating,
    Ready,
    Destroyed,
}

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ChunkFlags: u8 {
        const ITEMS_REALIZED = 1 << 0;
        const COLLIDER_ATTACHED = 1 << 1;
        /// Set once the first mesh has been displayed.
        const SURFACE_INITIALIZED = 1 << 2;
    }
}

/// Outcome of moving a chunk to a new ring.
#[derive(Debug)]
pub enum LodTransition {
    Unchanged,
    /// A cached mesh was swapped in immediately.
    Swapped,
    /// The mesh must be built; the current one stays displayed meanwhile.
    Requested(MeshRequest),
    /// A build for this LOD is already in flight, or the chunk is still loading and
    /// will build its mesh once ready.
    Deferred,
}

/// One resident chunk and its LOD mesh cache.
pub struct Chunk {
    pos: GridPos,
    epoch: u64,
    state: ChunkState,
    data: Option<Arc<ChunkData>>,
    meshes: [Option<Arc<TerrainMesh>>; LOD_SLOTS],
    ring: LodInfo,
    previous_ring: Option<LodInfo>,
    displayed_lod: Option<u8>,
    /// Version of the in-flight build per LOD.
    pending_meshes: [Option<u64>; LOD_SLOTS],
    mesh_version: u64,
    flags: ChunkFlags,
    cancel: CancellationToken,
    spacing: f32,
}

impl Chunk {
    /// `spacing` is the world distance between neighbouring heightfield samples.
    pub fn new(pos: GridPos, ring: LodInfo, epoch: u64, spacing: f32) -> Self {
        Self {
            pos,
            epoch,
            state: ChunkState::Unloaded,
            data: None,
            meshes: Default::default(),
            ring: clamp_lod(ring),
            previous_ring: None,
            displayed_lod: None,
            pending_meshes: [None; LOD_SLOTS],
            mesh_version: 0,
            flags: ChunkFlags::empty(),
            cancel: CancellationToken::new(),
            spacing,
        }
    }

    pub fn pos(&self) -> GridPos {
        self.pos
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ChunkState::Ready
    }

    pub fn ring(&self) -> LodInfo {
        self.ring
    }

    pub fn previous_ring(&self) -> Option<LodInfo> {
        self.previous_ring
    }

    pub fn flags(&self) -> ChunkFlags {
        self.flags
    }

    pub fn data(&self) -> Option<&Arc<ChunkData>> {
        self.data.as_ref()
    }

    pub fn items(&self) -> &[WorldItem] {
        match self.data.as_deref() {
            Some(data) => &data.items,
            None => &[],
        }
    }

    pub fn displayed_lod(&self) -> Option<u8> {
        self.displayed_lod
    }

    /// Mesh currently shown, which may lag behind the ring's LOD while a rebuild runs.
    pub fn mesh(&self) -> Option<&Arc<TerrainMesh>> {
        self.displayed_lod
            .and_then(|lod| self.meshes[lod as usize].as_ref())
    }

    pub fn cached_mesh(&self, lod: u8) -> Option<&Arc<TerrainMesh>> {
        self.meshes.get(lod as usize).and_then(Option::as_ref)
    }

    pub fn has_pending_mesh(&self) -> bool {
        self.pending_meshes.iter().any(Option::is_some)
    }

    pub fn height_at(&self, local: Vec2) -> f32 {
        match (&self.state, &self.data) {
            (ChunkState::Ready, Some(data)) => data.heightfield.height_at(local),
            _ => SENTINEL_HEIGHT,
        }
    }

    pub fn slope_at(&self, local: Vec2) -> f32 {
        match (&self.state, &self.data) {
            (ChunkState::Ready, Some(data)) => data.heightfield.slope_at(local, self.spacing),
            _ => SENTINEL_HEIGHT,
        }
    }

    /// Starts the load. Only the first call on a fresh chunk returns a request.
    pub fn begin_load(&mut self) -> Option<LoadRequest> {
        if self.state != ChunkState::Unloaded {
            return None;
        }
        self.state = ChunkState::Generating;
        Some(LoadRequest {
            pos: self.pos,
            epoch: self.epoch,
            cancel: self.cancel.clone(),
        })
    }

    /// Stores loaded data and asks for the mesh of the current ring.
    /// Returns `None` without touching the chunk unless it is generating.
    pub fn finish_load(&mut self, data: ChunkData, items_realized: bool) -> Option<MeshRequest> {
        if self.state != ChunkState::Generating {
            return None;
        }
        self.data = Some(Arc::new(data));
        self.state = ChunkState::Ready;
        self.flags.set(ChunkFlags::ITEMS_REALIZED, items_realized);
        self.request_mesh(self.ring.lod)
    }

    pub fn set_lod(&mut self, ring: LodInfo) -> LodTransition {
        let ring = clamp_lod(ring);
        if ring == self.ring {
            return LodTransition::Unchanged;
        }
        self.previous_ring = Some(self.ring);
        self.ring = ring;

        match self.state {
            ChunkState::Ready => {}
            ChunkState::Destroyed => return LodTransition::Unchanged,
            ChunkState::Unloaded | ChunkState::Generating => return LodTransition::Deferred,
        }

        if self.meshes[ring.lod as usize].is_some() {
            self.display(ring.lod);
            return LodTransition::Swapped;
        }
        match self.request_mesh(ring.lod) {
            Some(request) => LodTransition::Requested(request),
            None => LodTransition::Deferred,
        }
    }

    /// Caches a finished mesh. Returns `true` when it became the displayed mesh.
    /// Meshes for a LOD the chunk has since moved away from are cached but not shown.
    pub fn finish_mesh(&mut self, version: u64, mesh: TerrainMesh) -> bool {
        if self.state != ChunkState::Ready {
            return false;
        }
        let lod = mesh.lod.min(MAX_LOD);
        self.meshes[lod as usize] = Some(Arc::new(mesh));
        if self.pending_meshes[lod as usize] == Some(version) {
            self.pending_meshes[lod as usize] = None;
        }
        if lod != self.ring.lod {
            return false;
        }
        self.display(lod);
        true
    }

    /// Cancels outstanding work and hands back the data so item handles can be released.
    pub fn destroy(&mut self) -> Option<Arc<ChunkData>> {
        if self.state == ChunkState::Destroyed {
            return None;
        }
        self.state = ChunkState::Destroyed;
        self.cancel.cancel();
        self.meshes = Default::default();
        self.displayed_lod = None;
        self.pending_meshes = [None; LOD_SLOTS];
        self.flags = ChunkFlags::empty();
        self.data.take()
    }

    fn request_mesh(&mut self, lod: u8) -> Option<MeshRequest> {
        let slot = lod.min(MAX_LOD) as usize;
        if self.pending_meshes[slot].is_some() {
            return None;
        }
        let data = Arc::clone(self.data.as_ref()?);
        self.mesh_version += 1;
        self.pending_meshes[slot] = Some(self.mesh_version);
        Some(MeshRequest {
            pos: self.pos,
            epoch: self.epoch,
            version: self.mesh_version,
            lod,
            data,
            cancel: self.cancel.clone(),
        })
    }

    fn display(&mut self, lod: u8) {
        self.displayed_lod = Some(lod);
        self.flags.insert(ChunkFlags::SURFACE_INITIALIZED);
        self.flags.set(ChunkFlags::COLLIDER_ATTACHED, self.ring.collider);
    }
}

fn clamp_lod(ring: LodInfo) -> LodInfo {
    LodInfo {
        lod: ring.lod.min(MAX_LOD),
        ..ring
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use strata_shared::chunk::{ChunkData, ChunkOrigin};
    use strata_shared::coords::GridPos;
    use strata_shared::heightfield::{Heightfield, SENTINEL_HEIGHT};

    use super::{Chunk, ChunkFlags, ChunkState, LodTransition};
    use crate::lod::LodInfo;
    use crate::mesh::{ChunkMeshBuilder, TerrainMesh};

    fn ready_chunk(ring: LodInfo) -> (Chunk, u64) {
        let mut chunk = Chunk::new(GridPos::new(1, -1), ring, 5, 1.0);
        chunk.begin_load().expect("fresh chunk should load");
        let mut heightfield = Heightfield::flat(53);
        heightfield.set(10, 10, 12.0);
        let request = chunk
            .finish_load(ChunkData::new(heightfield, Vec::new(), ChunkOrigin::Generated), true)
            .expect("ready chunk requests its first mesh");
        (chunk, request.version)
    }

    fn build(lod: u8) -> TerrainMesh {
        ChunkMeshBuilder::new(1.0).build(&Heightfield::flat(53), lod)
    }

    #[test]
    fn load_is_single_flight() {
        let mut chunk = Chunk::new(GridPos::ZERO, LodInfo::new(0, 0, true), 1, 1.0);
        assert_eq!(chunk.state(), ChunkState::Unloaded);
        assert!(chunk.begin_load().is_some());
        assert!(chunk.begin_load().is_none());
        assert_eq!(chunk.state(), ChunkState::Generating);
    }

    #[test]
    fn queries_return_sentinel_until_ready() {
        let mut chunk = Chunk::new(GridPos::ZERO, LodInfo::new(0, 0, true), 1, 1.0);
        chunk.begin_load().expect("fresh chunk should load");
        assert_eq!(chunk.height_at(Vec2::new(10.0, 10.0)), SENTINEL_HEIGHT);
        assert_eq!(chunk.slope_at(Vec2::new(10.0, 10.0)), SENTINEL_HEIGHT);

        let (ready, _) = ready_chunk(LodInfo::new(0, 0, true));
        assert_eq!(ready.height_at(Vec2::new(10.2, 9.8)), 12.0);
        assert_eq!(ready.height_at(Vec2::new(-5.0, 10.0)), SENTINEL_HEIGHT);
        assert!(ready.slope_at(Vec2::new(20.0, 20.0)).abs() < 1e-3);
        assert!(ready.flags().contains(ChunkFlags::ITEMS_REALIZED));
    }

    #[test]
    fn previous_mesh_stays_displayed_until_rebuild_completes() {
        let (mut chunk, version) = ready_chunk(LodInfo::new(0, 0, true));
        assert!(chunk.mesh().is_none());
        assert!(chunk.finish_mesh(version, build(0)));
        assert_eq!(chunk.displayed_lod(), Some(0));
        assert!(chunk.flags().contains(ChunkFlags::COLLIDER_ATTACHED));

        let LodTransition::Requested(request) = chunk.set_lod(LodInfo::new(3, 4, false)) else {
            panic!("uncached LOD should be requested");
        };
        assert_eq!(request.lod, 4);
        assert_eq!(chunk.displayed_lod(), Some(0));
        assert_eq!(chunk.previous_ring(), Some(LodInfo::new(0, 0, true)));

        assert!(chunk.finish_mesh(request.version, build(4)));
        assert_eq!(chunk.displayed_lod(), Some(4));
        assert!(!chunk.flags().contains(ChunkFlags::COLLIDER_ATTACHED));
        assert!(!chunk.has_pending_mesh());
    }

    #[test]
    fn cached_mesh_swaps_immediately() {
        let (mut chunk, version) = ready_chunk(LodInfo::new(0, 0, true));
        chunk.finish_mesh(version, build(0));
        let LodTransition::Requested(request) = chunk.set_lod(LodInfo::new(1, 2, true)) else {
            panic!("uncached LOD should be requested");
        };
        chunk.finish_mesh(request.version, build(2));

        assert!(matches!(chunk.set_lod(LodInfo::new(0, 0, true)), LodTransition::Swapped));
        assert_eq!(chunk.displayed_lod(), Some(0));
        assert!(matches!(chunk.set_lod(LodInfo::new(0, 0, true)), LodTransition::Unchanged));
    }

    #[test]
    fn superseded_mesh_is_cached_but_not_displayed() {
        let (mut chunk, first) = ready_chunk(LodInfo::new(0, 0, true));
        let LodTransition::Requested(second) = chunk.set_lod(LodInfo::new(2, 3, true)) else {
            panic!("uncached LOD should be requested");
        };

        assert!(!chunk.finish_mesh(first, build(0)));
        assert!(chunk.mesh().is_none());
        assert!(chunk.cached_mesh(0).is_some());
        assert!(chunk.finish_mesh(second.version, build(3)));
        assert_eq!(chunk.displayed_lod(), Some(3));
    }

    #[test]
    fn returning_to_an_in_flight_lod_does_not_rebuild_it() {
        let (mut chunk, first) = ready_chunk(LodInfo::new(0, 0, true));
        let LodTransition::Requested(coarse) = chunk.set_lod(LodInfo::new(3, 4, false)) else {
            panic!("uncached LOD should be requested");
        };
        assert!(matches!(chunk.set_lod(LodInfo::new(0, 0, true)), LodTransition::Deferred));
        assert!(matches!(chunk.set_lod(LodInfo::new(3, 4, false)), LodTransition::Deferred));
        assert!(matches!(chunk.set_lod(LodInfo::new(0, 0, true)), LodTransition::Deferred));

        assert!(!chunk.finish_mesh(coarse.version, build(4)));
        assert!(chunk.has_pending_mesh());
        assert!(chunk.finish_mesh(first, build(0)));
        assert!(!chunk.has_pending_mesh());
        assert_eq!(chunk.displayed_lod(), Some(0));
        assert!(matches!(chunk.set_lod(LodInfo::new(3, 4, false)), LodTransition::Swapped));
    }

    #[test]
    fn lod_change_while_generating_is_deferred() {
        let mut chunk = Chunk::new(GridPos::ZERO, LodInfo::new(2, 3, true), 1, 1.0);
        chunk.begin_load().expect("fresh chunk should load");
        assert!(matches!(chunk.set_lod(LodInfo::new(1, 2, true)), LodTransition::Deferred));
        let request = chunk
            .finish_load(ChunkData::fallback(53), false)
            .expect("ready chunk requests its first mesh");
        assert_eq!(request.lod, 2);
    }

    #[test]
    fn destroyed_chunk_rejects_late_results() {
        let mut chunk = Chunk::new(GridPos::ZERO, LodInfo::new(0, 0, true), 1, 1.0);
        let request = chunk.begin_load().expect("fresh chunk should load");
        assert!(chunk.destroy().is_none());
        assert!(request.cancel.is_cancelled());
        assert!(chunk.finish_load(ChunkData::fallback(53), false).is_none());
        assert!(!chunk.finish_mesh(1, build(0)));
        assert_eq!(chunk.state(), ChunkState::Destroyed);
        assert_eq!(chunk.height_at(Vec2::new(10.0, 10.0)), SENTINEL_HEIGHT);
        assert!(chunk.destroy().is_none());
    }
}
