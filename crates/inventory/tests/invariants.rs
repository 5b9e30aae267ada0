//! Random operation sequences keep the inventory consistent with the library.

mod common;

use proptest::prelude::*;

use tapevault_changer::{SimulatedChanger, SimulatedConfig};
use tapevault_core::{Location, VolumeCategory};
use tapevault_inventory::{InMemoryInventory, Inventory, InventoryError};

use common::{memory, serial, stock};

const SERIALS: [&str; 4] = ["A00001", "B00001", "C00001", "D00001"];

#[derive(Debug, Clone)]
enum Step {
    Alloc,
    Load(usize, u32),
    Unload(usize, Option<Location>),
    Transfer(usize, Location),
    Audit,
}

fn resting() -> impl Strategy<Value = Location> {
    prop_oneof![
        (1u32..=6).prop_map(Location::storage),
        (1u32..=2).prop_map(Location::import_export),
    ]
}

fn step() -> impl Strategy<Value = Step> {
    let volume = 0..SERIALS.len();
    prop_oneof![
        Just(Step::Alloc),
        Just(Step::Audit),
        (volume.clone(), 1u32..=2).prop_map(|(v, d)| Step::Load(v, d)),
        (volume.clone(), prop::option::of(resting())).prop_map(|(v, dst)| Step::Unload(v, dst)),
        (volume, resting()).prop_map(|(v, dst)| Step::Transfer(v, dst)),
    ]
}

async fn apply(
    inventory: &InMemoryInventory,
    changer: &SimulatedChanger,
    step: &Step,
) -> Result<(), InventoryError> {
    match step {
        Step::Alloc => inventory.alloc().await.map(drop),
        Step::Load(v, drive) => {
            inventory
                .load(&serial(SERIALS[*v]), Location::transfer(*drive), changer)
                .await
        }
        Step::Unload(v, dst) => inventory.unload(&serial(SERIALS[*v]), *dst, changer).await,
        Step::Transfer(v, dst) => inventory.transfer(&serial(SERIALS[*v]), *dst, changer).await,
        Step::Audit => inventory.audit(changer).await.map(drop),
    }
}

fn run(steps: &[Step]) -> Result<(), TestCaseError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    runtime.block_on(async {
        let inventory = memory();
        let changer = SimulatedChanger::new(SimulatedConfig::default().with_slots(6, 2, 2));
        for (addr, s) in (1u32..).zip(SERIALS) {
            stock(&inventory, &changer, s, Location::storage(addr), VolumeCategory::Scratch).await;
        }

        for step in steps {
            match apply(&inventory, &changer, step).await {
                Ok(()) => {}
                Err(
                    InventoryError::InvalidTransition { .. }
                    | InventoryError::LocationOccupied { .. }
                    | InventoryError::Exhausted { .. },
                ) => {}
                Err(other) => {
                    return Err(TestCaseError::fail(format!("{step:?} failed: {other}")));
                }
            }

            let status = tapevault_changer::Changer::status(&changer).await.unwrap();
            for volume in inventory.volumes().await.unwrap() {
                prop_assert!(volume.check_invariants().is_ok(), "{step:?} broke {volume}");
                prop_assert!(!volume.is_transfering(), "{step:?} left {volume} in transit");
                prop_assert_eq!(volume.location, status.find(&volume.serial));
            }
        }
        Ok(())
    })
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 128, ..ProptestConfig::default() })]

    /// Property: whatever sequence of requests arrives, every rejected move
    /// is rejected before the library is touched and every accepted move is
    /// recorded where the library put the volume.
    #[test]
    fn records_track_the_library(steps in prop::collection::vec(step(), 1..40)) {
        run(&steps)?;
    }
}
