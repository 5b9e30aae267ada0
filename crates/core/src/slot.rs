//! Changer status snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::location::{Location, SlotCategory};
use crate::volume::Serial;

/// One slot as reported by the changer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub location: Location,
    /// Serial of the medium in the slot, `None` if empty.
    pub volume: Option<Serial>,
}

impl Slot {
    pub fn empty(location: Location) -> Self {
        Self {
            location,
            volume: None,
        }
    }

    pub fn occupied(location: Location, serial: Serial) -> Self {
        Self {
            location,
            volume: Some(serial),
        }
    }
}

/// Physical snapshot of the library, grouped by slot category.
///
/// Used for audit and reconciliation only, never as the system of record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    slots: BTreeMap<SlotCategory, Vec<Slot>>,
}

impl SlotStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slot, keeping each category ordered by address.
    pub fn push(&mut self, slot: Slot) {
        let slots = self.slots.entry(slot.location.category).or_default();
        let idx = slots.partition_point(|s| s.location.addr < slot.location.addr);
        if slots.get(idx).is_some_and(|s| s.location == slot.location) {
            slots[idx] = slot;
        } else {
            slots.insert(idx, slot);
        }
    }

    pub fn category(&self, category: SlotCategory) -> &[Slot] {
        self.slots.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// All slots, in category then address order.
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values().flatten()
    }

    /// Occupied slots as `(location, serial)` pairs.
    pub fn occupied(&self) -> impl Iterator<Item = (Location, &Serial)> {
        self.iter()
            .filter_map(|s| s.volume.as_ref().map(|serial| (s.location, serial)))
    }

    pub fn find(&self, serial: &Serial) -> Option<Location> {
        self.occupied()
            .find(|(_, s)| *s == serial)
            .map(|(location, _)| location)
    }

    pub fn as_map(&self) -> &BTreeMap<SlotCategory, Vec<Slot>> {
        &self.slots
    }
}

impl FromIterator<Slot> for SlotStatus {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        let mut status = SlotStatus::new();
        for slot in iter {
            status.push(slot);
        }
        status
    }
}
