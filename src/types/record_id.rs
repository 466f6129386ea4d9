use serde::{Deserialize, Serialize};

use crate::types::{PageId, SlotId};

/// Locator for a stored record: the data page holding it plus a slot
/// number reserved for a future slotted layout (always 0 today).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: SlotId) -> Self {
        Self { page_id, slot }
    }

    pub fn invalid() -> Self {
        Self { page_id: 0, slot: 0 }
    }

    pub fn is_valid(&self) -> bool {
        self.page_id != 0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.page_id, self.slot)
    }
}
