use serde::{Deserialize, Serialize};
use strata_shared::coords::GridPos;

/// Coarsest level whose stride (8) still divides every supported chunk size.
pub const MAX_LOD: u8 = 4;

/// Heightfield stride between main mesh vertices at `lod`.
pub fn skip_increment(lod: u8) -> usize {
    match lod.min(MAX_LOD) {
        0 => 1,
        level => level as usize * 2,
    }
}

/// One ring of the streaming window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodInfo {
    pub ring: u32,
    pub lod: u8,
    pub collider: bool,
}

impl LodInfo {
    pub const fn new(ring: u32, lod: u8, collider: bool) -> Self {
        Self { ring, lod, collider }
    }
}

pub fn default_lod_table() -> Vec<LodInfo> {
    vec![
        LodInfo::new(0, 0, true),
        LodInfo::new(1, 2, true),
        LodInfo::new(2, 3, true),
        LodInfo::new(3, 4, false),
        LodInfo::new(4, 4, false),
        LodInfo::new(5, 4, false),
    ]
}

/// Chunks forming ring `ring` around the 2x2 block whose lower-left chunk is `corner`.
///
/// Ring 0 is the block itself; ring k is the perimeter of the block grown by k chunks
/// on every side, so it holds `8k + 4` chunks. Cells are listed clockwise from the
/// lower-left, going up the left side first.
pub fn ring_stencil(corner: GridPos, ring: u32) -> Vec<GridPos> {
    // Rings that would cross the i32 grid edge are clipped there.
    let k = i32::try_from(ring).unwrap_or(i32::MAX);
    let min = GridPos::new(corner.x.saturating_sub(k), corner.z.saturating_sub(k));
    let max = GridPos::new(
        corner.x.saturating_add(1).saturating_add(k),
        corner.z.saturating_add(1).saturating_add(k),
    );

    let mut cells = Vec::with_capacity(8 * ring as usize + 4);
    for z in min.z..=max.z {
        cells.push(GridPos::new(min.x, z));
    }
    for x in min.x.saturating_add(1)..=max.x {
        cells.push(GridPos::new(x, max.z));
    }
    for z in (min.z..max.z).rev() {
        cells.push(GridPos::new(max.x, z));
    }
    for x in (min.x.saturating_add(1)..max.x).rev() {
        cells.push(GridPos::new(x, min.z));
    }
    cells
}

/// Ring index of `pos` relative to the block at `corner`.
pub fn ring_of(corner: GridPos, pos: GridPos) -> u32 {
    let axis = |value: i32, low: i32| -> i64 {
        let (value, low) = (i64::from(value), i64::from(low));
        if value < low {
            low - value
        } else if value > low + 1 {
            value - low - 1
        } else {
            0
        }
    };
    let ring = axis(pos.x, corner.x).max(axis(pos.z, corner.z));
    u32::try_from(ring).unwrap_or(u32::MAX)
}

/// Every chunk of the window paired with its ring, innermost ring first.
pub fn window(corner: GridPos, ring_count: usize) -> Vec<(GridPos, u32)> {
    (0..ring_count as u32)
        .flat_map(|ring| ring_stencil(corner, ring).into_iter().map(move |pos| (pos, ring)))
        .collect()
}
