//! Record-level rules shared by the backends: allocation, registration and
//! operator updates.

use tapevault_core::{SlotCategory, Volume, VolumeCategory, VolumeFlags};

use crate::r#trait::{InventoryError, InventoryResult};

/// Whether `volume` may be handed out by `alloc`.
pub fn is_alloc_candidate(volume: &Volume) -> bool {
    volume.category.is_allocatable()
        && !volume.is_transfering()
        && volume
            .location
            .is_some_and(|l| l.category == SlotCategory::Storage)
}

/// Sort key for allocation: category name, then serial.
pub fn alloc_order(volume: &Volume) -> (&'static str, &str) {
    (volume.category.as_str(), volume.serial.as_str())
}

/// Category after a volume wins `alloc`.
pub fn allocated_category(current: VolumeCategory) -> VolumeCategory {
    match current {
        VolumeCategory::Filling => VolumeCategory::Filling,
        _ => VolumeCategory::Allocating,
    }
}

/// Checks for a record created out of band.
pub fn check_register(op: &'static str, volume: &Volume) -> InventoryResult<()> {
    if !matches!(volume.category, VolumeCategory::Unknown | VolumeCategory::Scratch) {
        return Err(InventoryError::InvalidCategory {
            op,
            serial: volume.serial.clone(),
            category: volume.category,
        });
    }
    if volume.is_transfering() {
        return Err(InventoryError::invalid_transition(
            op,
            &volume.serial,
            "a new record cannot be in transit",
        ));
    }
    volume
        .check_invariants()
        .map_err(|e| InventoryError::domain(op, e))
}

/// Checks for an operator overwrite of `existing` with `next`.
pub fn check_update(op: &'static str, existing: &Volume, next: &Volume) -> InventoryResult<()> {
    if !existing.category.can_transition_to(next.category) {
        return Err(InventoryError::invalid_transition(
            op,
            &next.serial,
            format!("category {} cannot become {}", existing.category, next.category),
        ));
    }
    if next.is_transfering() && !existing.is_transfering() {
        return Err(InventoryError::invalid_transition(
            op,
            &next.serial,
            format!("{} is only set by a move", VolumeFlags::TRANSFERING),
        ));
    }
    next.check_invariants()
        .map_err(|e| InventoryError::domain(op, e))
}
