use glam::Mat4;
use strata_shared::coords::GridPos;
use strata_shared::items::{ModelHandle, WorldItem};

/// Host-side hook that turns placed items into scene objects.
///
/// `bind` runs once per item when its chunk becomes ready; every handle it returns is
/// passed back to `release` when the chunk is evicted.
pub trait ItemRealizer {
    fn bind(&mut self, chunk: GridPos, item: &WorldItem, transform: Mat4) -> Option<ModelHandle>;

    fn release(&mut self, chunk: GridPos, handle: ModelHandle);
}

/// Hands out sequential handles and keeps a live count. Used by headless hosts.
#[derive(Debug, Default)]
pub struct NullRealizer {
    next_handle: u64,
    live: usize,
}

impl NullRealizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }
}

impl ItemRealizer for NullRealizer {
    fn bind(&mut self, _chunk: GridPos, _item: &WorldItem, _transform: Mat4) -> Option<ModelHandle> {
        self.next_handle += 1;
        self.live += 1;
        Some(ModelHandle(self.next_handle))
    }

    fn release(&mut self, _chunk: GridPos, _handle: ModelHandle) {
        self.live = self.live.saturating_sub(1);
    }
}
