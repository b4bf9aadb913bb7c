//! Inspection snapshots shared with a reader outside the emulation thread.

use std::sync::{Arc, Mutex, PoisonError};

use commodore_agnus::{AgnusInfo, BusOwner, Ddf, DdfState, Event, EventSlot};
use commodore_paula_8364::PaulaInfo;

/// A copy of the chipset state taken at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmigaInfo {
    pub agnus: AgnusInfo,
    pub slots: Vec<(EventSlot, Event)>,
    /// Bus owner per DMA cycle of the line the snapshot was taken in.
    pub bus: Vec<BusOwner>,
    pub ddf_lores: Ddf,
    pub ddf_hires: Ddf,
    pub ddf_state: DdfState,
    pub paula: PaulaInfo,
}

/// Read side of the published snapshot. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Inspector {
    shared: Arc<Mutex<AmigaInfo>>,
}

impl Inspector {
    /// The most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> AmigaInfo {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn publish(&self, info: AmigaInfo) {
        *self.shared.lock().unwrap_or_else(PoisonError::into_inner) = info;
    }
}
