//! Fixtures and backend-independent scenarios.
//!
//! Every scenario takes `&dyn Inventory`, so the same checks run against the
//! in-memory backend and, when a database is available, against Postgres.

#![allow(dead_code)]

use std::time::Duration;

use tapevault_changer::{ChangerOp, SimulatedChanger, SimulatedConfig};
use tapevault_core::{Location, Serial, Volume, VolumeCategory, VolumeFlags};
use tapevault_inventory::{InMemoryInventory, Inventory, InventoryError, MemoryConfig};

pub const CLEANING_PREFIX: &str = "CLN";

pub fn serial(s: &str) -> Serial {
    Serial::new(s).unwrap()
}

pub fn memory() -> InMemoryInventory {
    InMemoryInventory::new(MemoryConfig::new(CLEANING_PREFIX))
}

/// 16 storage slots, 2 drives, 2 mail slots.
pub fn library() -> SimulatedChanger {
    SimulatedChanger::new(SimulatedConfig::default().with_slots(16, 2, 2))
}

/// Like [`library`], but every move takes `delay`.
pub fn slow_library(delay: Duration) -> SimulatedChanger {
    SimulatedChanger::new(
        SimulatedConfig::default()
            .with_slots(16, 2, 2)
            .with_move_delay(delay),
    )
}

/// Operator edits that bring a freshly registered scratch volume to `category`.
fn lifecycle_to(category: VolumeCategory) -> Vec<VolumeCategory> {
    use VolumeCategory::*;
    match category {
        Unknown | Scratch => vec![],
        Allocating => vec![Allocating],
        Allocated => vec![Allocating, Allocated],
        Filling | Full => vec![Allocating, Allocated, category],
        Missing | Damaged | Cleaning => vec![category],
    }
}

/// Put a volume in the library, register it, and walk it to `category`.
pub async fn stock(
    inventory: &dyn Inventory,
    changer: &SimulatedChanger,
    s: &str,
    location: Location,
    category: VolumeCategory,
) {
    changer.place(location, serial(s)).unwrap();
    let initial = if category == VolumeCategory::Unknown {
        VolumeCategory::Unknown
    } else {
        VolumeCategory::Scratch
    };
    let mut volume = Volume::new(serial(s), location, initial);
    inventory.register(volume.clone()).await.unwrap();

    for next in lifecycle_to(category) {
        volume.category = next;
        inventory.update(volume.clone()).await.unwrap();
    }
}

/// Every record is consistent and agrees with the library.
pub async fn assert_in_sync(inventory: &dyn Inventory, changer: &SimulatedChanger) {
    for volume in inventory.volumes().await.unwrap() {
        volume.check_invariants().unwrap();
        assert!(!volume.is_transfering(), "{volume} still in transit");
        let location = volume.location.expect("resting volume has a location");
        assert_eq!(
            changer.occupant(location).unwrap(),
            Some(volume.serial.clone()),
            "{volume} not where the library has it"
        );
    }
}

pub async fn load_then_unload_round_trip(inventory: &dyn Inventory) {
    let changer = library();
    stock(inventory, &changer, "V00001", Location::storage(10), VolumeCategory::Scratch).await;

    inventory
        .load(&serial("V00001"), Location::transfer(1), &changer)
        .await
        .unwrap();

    let loaded = inventory.info(&serial("V00001")).await.unwrap();
    assert_eq!(loaded.location, Some(Location::transfer(1)));
    assert_eq!(loaded.category, VolumeCategory::Scratch);
    assert_eq!(loaded.flags, VolumeFlags::MOUNTED);
    assert_eq!(loaded.home, Some(Location::storage(10)));
    assert_eq!(
        inventory.loaded(Location::transfer(1)).await.unwrap(),
        Some(serial("V00001"))
    );

    inventory.unload(&serial("V00001"), None, &changer).await.unwrap();

    let back = inventory.info(&serial("V00001")).await.unwrap();
    assert_eq!(back.location, Some(Location::storage(10)));
    assert_eq!(back.home, None);
    assert!(back.flags.is_empty());
    assert_eq!(inventory.loaded(Location::transfer(1)).await.unwrap(), None);
    assert_in_sync(inventory, &changer).await;
}

pub async fn alloc_prefers_filling(inventory: &dyn Inventory) {
    let changer = library();
    stock(inventory, &changer, "A00001", Location::storage(1), VolumeCategory::Filling).await;
    stock(inventory, &changer, "B00001", Location::storage(2), VolumeCategory::Scratch).await;

    assert_eq!(inventory.alloc().await.unwrap(), serial("A00001"));
    assert_eq!(
        inventory.info(&serial("A00001")).await.unwrap().category,
        VolumeCategory::Filling
    );
    assert_eq!(
        inventory.info(&serial("B00001")).await.unwrap().category,
        VolumeCategory::Scratch
    );
}

pub async fn allocated_volume_is_promoted_on_load(inventory: &dyn Inventory) {
    let changer = library();
    stock(inventory, &changer, "S00002", Location::storage(2), VolumeCategory::Scratch).await;
    stock(inventory, &changer, "S00001", Location::storage(5), VolumeCategory::Scratch).await;

    let winner = inventory.alloc().await.unwrap();
    assert_eq!(winner, serial("S00001"));
    assert_eq!(
        inventory.info(&winner).await.unwrap().category,
        VolumeCategory::Allocating
    );

    assert_eq!(inventory.alloc().await.unwrap(), serial("S00002"));
    assert!(matches!(
        inventory.alloc().await,
        Err(InventoryError::Exhausted { .. })
    ));

    inventory
        .load(&winner, Location::transfer(2), &changer)
        .await
        .unwrap();
    assert_eq!(
        inventory.info(&winner).await.unwrap().category,
        VolumeCategory::Allocated
    );
}

pub async fn unload_requires_a_drive(inventory: &dyn Inventory) {
    let changer = library();
    stock(inventory, &changer, "V00001", Location::storage(10), VolumeCategory::Full).await;

    let err = inventory
        .unload(&serial("V00001"), None, &changer)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTransition { .. }));
    assert!(err.to_string().starts_with("unload: V00001: invalid transition"));

    let err = inventory
        .unload(&serial("V00001"), Some(Location::storage(11)), &changer)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTransition { .. }));

    let untouched = inventory.info(&serial("V00001")).await.unwrap();
    assert_eq!(untouched.location, Some(Location::storage(10)));
    assert!(untouched.flags.is_empty());
    assert!(changer.history().unwrap().is_empty());
}

pub async fn device_fault_is_repaired_by_audit(inventory: &dyn Inventory) {
    let changer = library();
    stock(inventory, &changer, "V00001", Location::storage(10), VolumeCategory::Filling).await;
    changer.fail_next(ChangerOp::Load, 1).unwrap();

    let err = inventory
        .load(&serial("V00001"), Location::transfer(1), &changer)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::Device { op: "load", .. }));
    assert!(!err.is_retryable());

    let stuck = inventory.info(&serial("V00001")).await.unwrap();
    assert_eq!(stuck.location, None);
    assert!(stuck.is_transfering());
    assert!(stuck.check_invariants().is_ok());

    // A stuck volume cannot be moved again until it is reconciled.
    let err = inventory
        .load(&serial("V00001"), Location::transfer(2), &changer)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTransition { .. }));

    let report = inventory.audit(&changer).await.unwrap();
    assert_eq!(report.relocated, vec![serial("V00001")]);

    let repaired = inventory.info(&serial("V00001")).await.unwrap();
    assert_eq!(repaired.location, Some(Location::storage(10)));
    assert!(repaired.flags.is_empty());
    assert_eq!(repaired.home, None);
    assert_eq!(repaired.category, VolumeCategory::Filling);
    assert_in_sync(inventory, &changer).await;
}

pub async fn finalize_failure_is_repaired_by_audit(inventory: &dyn Inventory) {
    let changer = slow_library(Duration::from_millis(500));
    stock(inventory, &changer, "V00001", Location::storage(4), VolumeCategory::Scratch).await;
    let volume = serial("V00001");

    // While the robot is busy, a record for another cartridge claims the
    // destination slot, so the move cannot be recorded.
    let (moved, registered) = tokio::join!(
        inventory.transfer(&volume, Location::storage(5), &changer),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            inventory
                .register(Volume::new(serial("W00001"), Location::storage(5), VolumeCategory::Scratch))
                .await
        },
    );
    registered.unwrap();

    let err = moved.unwrap_err();
    assert!(matches!(
        &err,
        InventoryError::Finalize { op: "transfer", source, .. }
            if matches!(**source, InventoryError::LocationOccupied { .. })
    ));
    assert!(!err.is_retryable());

    let stuck = inventory.info(&volume).await.unwrap();
    assert_eq!(stuck.location, None);
    assert!(stuck.is_transfering());
    assert_eq!(changer.occupant(Location::storage(5)).unwrap(), Some(volume.clone()));

    let report = inventory.audit(&changer).await.unwrap();
    assert_eq!(report.relocated, vec![volume.clone()]);
    assert_eq!(report.displaced, vec![serial("W00001")]);

    let repaired = inventory.info(&volume).await.unwrap();
    assert_eq!(repaired.location, Some(Location::storage(5)));
    assert!(repaired.flags.is_empty());
    assert_eq!(inventory.info(&serial("W00001")).await.unwrap().location, None);
    assert!(inventory.audit(&changer).await.unwrap().is_clean());
}

pub async fn audit_during_a_load_keeps_the_load(inventory: &dyn Inventory) {
    let changer = slow_library(Duration::from_millis(500));
    stock(inventory, &changer, "V00001", Location::storage(10), VolumeCategory::Scratch).await;
    let volume = serial("V00001");

    let (loaded, audited) = tokio::join!(
        inventory.load(&volume, Location::transfer(1), &changer),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            inventory.audit(&changer).await
        },
    );
    loaded.unwrap();
    // The audit saw the cartridge still in storage and took it out of transit.
    assert_eq!(audited.unwrap().relocated, vec![volume.clone()]);

    let record = inventory.info(&volume).await.unwrap();
    assert_eq!(record.location, Some(Location::transfer(1)));
    assert_eq!(record.flags, VolumeFlags::MOUNTED);
    assert_eq!(record.home, Some(Location::storage(10)));
    assert_in_sync(inventory, &changer).await;

    inventory.unload(&volume, None, &changer).await.unwrap();
    assert_in_sync(inventory, &changer).await;
}

pub async fn audit_discovers_and_is_idempotent(inventory: &dyn Inventory) {
    let changer = library();
    changer.place(Location::storage(1), serial("A00001")).unwrap();
    changer.place(Location::storage(2), serial("CLN001")).unwrap();
    changer.place(Location::transfer(2), serial("B00001")).unwrap();
    changer.place(Location::import_export(1), serial("C00001")).unwrap();

    let first = inventory.audit(&changer).await.unwrap();
    assert_eq!(
        first.discovered,
        vec![serial("A00001"), serial("B00001"), serial("C00001"), serial("CLN001")]
    );
    assert!(first.relocated.is_empty());

    let volumes = inventory.volumes().await.unwrap();
    let category = |s: &str| {
        volumes
            .iter()
            .find(|v| v.serial == serial(s))
            .map(|v| v.category)
            .unwrap()
    };
    assert_eq!(category("A00001"), VolumeCategory::Scratch);
    assert_eq!(category("CLN001"), VolumeCategory::Cleaning);
    assert!(
        inventory
            .info(&serial("B00001"))
            .await
            .unwrap()
            .is_mounted()
    );

    let before = inventory.volumes().await.unwrap();
    let second = inventory.audit(&changer).await.unwrap();
    assert!(second.is_clean());
    assert_eq!(second.unchanged, 4);
    assert_eq!(inventory.volumes().await.unwrap(), before);
    assert_in_sync(inventory, &changer).await;
}

pub async fn audit_follows_manual_intervention(inventory: &dyn Inventory) {
    let changer = library();
    stock(inventory, &changer, "A00001", Location::storage(1), VolumeCategory::Full).await;
    stock(inventory, &changer, "B00001", Location::storage(2), VolumeCategory::Full).await;

    // An operator swaps the two cartridges and drops a new one where A was.
    changer.remove(Location::storage(1)).unwrap();
    changer.remove(Location::storage(2)).unwrap();
    changer.place(Location::storage(2), serial("A00001")).unwrap();
    changer.place(Location::storage(1), serial("N00001")).unwrap();
    changer.place(Location::storage(3), serial("B00001")).unwrap();

    let report = inventory.audit(&changer).await.unwrap();
    assert_eq!(report.discovered, vec![serial("N00001")]);
    assert_eq!(report.relocated, vec![serial("A00001"), serial("B00001")]);
    assert!(report.displaced.is_empty());
    assert_eq!(
        inventory.info(&serial("A00001")).await.unwrap().category,
        VolumeCategory::Full
    );
    assert_in_sync(inventory, &changer).await;
}

pub async fn audit_displaces_stale_records(inventory: &dyn Inventory) {
    let changer = library();
    stock(inventory, &changer, "A00001", Location::storage(1), VolumeCategory::Full).await;

    changer.remove(Location::storage(1)).unwrap();
    changer.place(Location::storage(1), serial("N00001")).unwrap();

    let report = inventory.audit(&changer).await.unwrap();
    assert_eq!(report.discovered, vec![serial("N00001")]);
    assert_eq!(report.displaced, vec![serial("A00001")]);

    let gone = inventory.info(&serial("A00001")).await.unwrap();
    assert_eq!(gone.location, None);
    assert_eq!(gone.category, VolumeCategory::Full);
    assert!(inventory.audit(&changer).await.unwrap().is_clean());
}

pub async fn transfer_moves_between_resting_slots(inventory: &dyn Inventory) {
    let changer = library();
    stock(inventory, &changer, "V00001", Location::storage(4), VolumeCategory::Full).await;

    inventory
        .transfer(&serial("V00001"), Location::import_export(2), &changer)
        .await
        .unwrap();
    let moved = inventory.info(&serial("V00001")).await.unwrap();
    assert_eq!(moved.location, Some(Location::import_export(2)));
    assert!(moved.flags.is_empty());

    let err = inventory
        .transfer(&serial("V00001"), Location::transfer(1), &changer)
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidTransition { .. }));

    // Loading from the mail slot is allowed; the mail slot becomes home.
    inventory
        .load(&serial("V00001"), Location::transfer(1), &changer)
        .await
        .unwrap();
    assert_eq!(
        inventory.info(&serial("V00001")).await.unwrap().home,
        Some(Location::import_export(2))
    );
    inventory
        .unload(&serial("V00001"), Some(Location::storage(16)), &changer)
        .await
        .unwrap();
    assert_in_sync(inventory, &changer).await;
}

pub async fn tree_maps_paths_to_volumes(inventory: &dyn Inventory) {
    use tapevault_core::PathName;

    let changer = library();
    stock(inventory, &changer, "V00001", Location::storage(1), VolumeCategory::Scratch).await;
    let path = PathName::new("/archive/2018/db/").unwrap();

    inventory.create(&path, &serial("V00001")).await.unwrap();
    assert!(matches!(
        inventory.create(&path, &serial("V00001")).await,
        Err(InventoryError::AlreadyExists { .. })
    ));
    assert!(matches!(
        inventory
            .create(&PathName::new("/other").unwrap(), &serial("X00001"))
            .await,
        Err(InventoryError::NotFound { .. })
    ));

    inventory
        .load(&serial("V00001"), Location::transfer(1), &changer)
        .await
        .unwrap();
    let found = inventory
        .lookup(&PathName::new("/archive/2018/db").unwrap())
        .await
        .unwrap();
    assert_eq!(found.location, Some(Location::transfer(1)));
}
