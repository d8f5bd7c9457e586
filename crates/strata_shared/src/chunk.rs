use serde::{Deserialize, Serialize};

use crate::heightfield::Heightfield;
use crate::items::WorldItem;

/// Where a chunk's data came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkOrigin {
    Generated,
    LoadedFromCache,
    /// Generation or loading failed and flat terrain was substituted.
    Fallback,
}

/// Immutable terrain payload of one chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkData {
    pub heightfield: Heightfield,
    pub items: Vec<WorldItem>,
    pub origin: ChunkOrigin,
}

impl ChunkData {
    pub fn new(heightfield: Heightfield, items: Vec<WorldItem>, origin: ChunkOrigin) -> Self {
        Self {
            heightfield,
            items,
            origin,
        }
    }

    pub fn fallback(size: usize) -> Self {
        Self::new(Heightfield::flat(size), Vec::new(), ChunkOrigin::Fallback)
    }
}
