use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Chunk sizes whose interior divides evenly by every LOD stride (1, 2, 4, 6, 8).
pub const SUPPORTED_CHUNK_SIZES: [u32; 9] = [48, 72, 96, 120, 144, 168, 192, 216, 240];

/// Extra heightfield samples per side: one border ring for normals, one mesh edge ring,
/// and one edge-connection ring, plus the shared closing vertex.
pub const CHUNK_PADDING: usize = 5;

/// Viewer chunk coordinates are clamped to this magnitude. At the largest chunk size the
/// matching sample offsets still fit in an i32.
pub const MAX_CHUNK_COORD: i32 = 1 << 22;

/// Integer chunk coordinate on the horizontal plane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub z: i32,
}

impl GridPos {
    pub const ZERO: GridPos = GridPos { x: 0, z: 0 };

    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chebyshev distance in chunks.
    pub fn chebyshev(self, other: GridPos) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

impl Add for GridPos {
    type Output = GridPos;

    fn add(self, rhs: Self) -> Self::Output {
        GridPos {
            x: self.x + rhs.x,
            z: self.z + rhs.z,
        }
    }
}

impl AddAssign for GridPos {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.z += rhs.z;
    }
}

impl Sub for GridPos {
    type Output = GridPos;

    fn sub(self, rhs: Self) -> Self::Output {
        GridPos {
            x: self.x - rhs.x,
            z: self.z - rhs.z,
        }
    }
}

impl SubAssign for GridPos {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.z -= rhs.z;
    }
}

/// Which quarter of its chunk the viewer stands in. "Upper" is +Z.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quadrant {
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
}

impl Quadrant {
    /// Sign of the quadrant along X and Z.
    pub fn signs(self) -> IVec2 {
        match self {
            Quadrant::UpperLeft => IVec2::new(-1, 1),
            Quadrant::UpperRight => IVec2::new(1, 1),
            Quadrant::LowerLeft => IVec2::new(-1, -1),
            Quadrant::LowerRight => IVec2::new(1, -1),
        }
    }

    /// Lower-left chunk of the 2x2 block touching this quadrant's outer corner.
    pub fn ring0_corner(self, chunk: GridPos) -> GridPos {
        let signs = self.signs();
        GridPos {
            x: if signs.x == -1 { chunk.x.saturating_sub(1) } else { chunk.x },
            z: if signs.y == -1 { chunk.z.saturating_sub(1) } else { chunk.z },
        }
    }
}

/// Sizes and conversions shared by every chunk of one world.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChunkGeometry {
    chunk_size: u32,
    mesh_scale: f32,
}

impl ChunkGeometry {
    pub fn new(chunk_size: u32, mesh_scale: f32) -> Result<Self, GenerationError> {
        if !SUPPORTED_CHUNK_SIZES.contains(&chunk_size) {
            return Err(GenerationError::UnsupportedChunkSize(chunk_size));
        }
        if !(mesh_scale.is_finite() && mesh_scale > 0.0) {
            return Err(GenerationError::InvalidMeshScale(mesh_scale));
        }
        Ok(Self {
            chunk_size,
            mesh_scale,
        })
    }

    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn mesh_scale(&self) -> f32 {
        self.mesh_scale
    }

    pub fn num_verts_per_line(&self) -> usize {
        self.chunk_size as usize + CHUNK_PADDING
    }

    /// Heightfield cells spanned by the rendered part of one chunk.
    pub fn grid_span(&self) -> i32 {
        self.num_verts_per_line() as i32 - 3
    }

    pub fn mesh_world_size(&self) -> f32 {
        self.grid_span() as f32 * self.mesh_scale
    }

    /// Noise sample centre in grid units. Z is flipped so heightfield rows run toward -Z.
    pub fn sample_offset(&self, pos: GridPos) -> IVec2 {
        let span = self.grid_span();
        IVec2::new(pos.x.saturating_mul(span), pos.z.saturating_mul(span).saturating_neg())
    }

    /// `world` is a point on the X/Z plane, with `world.y` holding Z.
    pub fn world_to_chunk(&self, world: Vec2) -> GridPos {
        let size = self.mesh_world_size();
        let axis = |value: f32| -> i32 {
            ((value / size).round() as i32).clamp(-MAX_CHUNK_COORD, MAX_CHUNK_COORD)
        };
        GridPos {
            x: axis(world.x),
            z: axis(world.y),
        }
    }

    pub fn chunk_center(&self, pos: GridPos) -> Vec2 {
        Vec2::new(pos.x as f32, pos.z as f32) * self.mesh_world_size()
    }

    /// Fractional heightfield indices of a world point relative to `pos`.
    pub fn world_to_local(&self, pos: GridPos, world: Vec2) -> Vec2 {
        let center = self.chunk_center(pos);
        let half = self.grid_span() as f32 / 2.0;
        Vec2::new(
            (world.x - center.x) / self.mesh_scale + half + 1.0,
            (center.y - world.y) / self.mesh_scale + half + 1.0,
        )
    }

    pub fn local_to_world(&self, pos: GridPos, local: Vec2) -> Vec2 {
        let center = self.chunk_center(pos);
        let half = self.grid_span() as f32 / 2.0;
        Vec2::new(
            center.x + (local.x - 1.0 - half) * self.mesh_scale,
            center.y - (local.y - 1.0 - half) * self.mesh_scale,
        )
    }

    pub fn quadrant(&self, pos: GridPos, world: Vec2) -> Quadrant {
        let center = self.chunk_center(pos);
        let left = world.x <= center.x;
        let upper = world.y >= center.y;
        match (left, upper) {
            (true, true) => Quadrant::UpperLeft,
            (false, true) => Quadrant::UpperRight,
            (true, false) => Quadrant::LowerLeft,
            (false, false) => Quadrant::LowerRight,
        }
    }
}

/// Closest supported size; ties go to the smaller one.
pub fn nearest_supported_chunk_size(requested: u32) -> u32 {
    let mut best = SUPPORTED_CHUNK_SIZES[0];
    for size in SUPPORTED_CHUNK_SIZES {
        if size.abs_diff(requested) < best.abs_diff(requested) {
            best = size;
        }
    }
    best
}
