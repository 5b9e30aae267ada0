//! Runs the shared scenarios against a real database.
//!
//! Skipped unless `TAPEVAULT_TEST_DATABASE_URL` points at a scratch
//! database; every scenario starts from `reset`, so do not aim it at
//! anything you want to keep.

mod common;

use sqlx::PgPool;

use tapevault_inventory::{Inventory, PostgresInventory};

const DATABASE_URL_VAR: &str = "TAPEVAULT_TEST_DATABASE_URL";

async fn connect() -> Option<PostgresInventory> {
    let url = match std::env::var(DATABASE_URL_VAR) {
        Ok(url) => url,
        Err(_) => {
            eprintln!("{DATABASE_URL_VAR} not set; skipping Postgres scenarios");
            return None;
        }
    };

    let pool = PgPool::connect(&url).await.unwrap();
    let inventory = PostgresInventory::new(pool, common::CLEANING_PREFIX);
    inventory.ensure_schema().await.unwrap();
    Some(inventory)
}

// One test so the scenarios never share the database concurrently.
#[tokio::test]
async fn postgres_scenarios() {
    tapevault_observability::init();
    let Some(inventory) = connect().await else {
        return;
    };

    macro_rules! scenario {
        ($name:ident) => {
            inventory.reset().await.unwrap();
            common::$name(&inventory).await;
        };
    }

    scenario!(load_then_unload_round_trip);
    scenario!(alloc_prefers_filling);
    scenario!(allocated_volume_is_promoted_on_load);
    scenario!(unload_requires_a_drive);
    scenario!(device_fault_is_repaired_by_audit);
    scenario!(finalize_failure_is_repaired_by_audit);
    scenario!(audit_during_a_load_keeps_the_load);
    scenario!(audit_discovers_and_is_idempotent);
    scenario!(audit_follows_manual_intervention);
    scenario!(audit_displaces_stale_records);
    scenario!(transfer_moves_between_resting_slots);
    scenario!(tree_maps_paths_to_volumes);

    inventory.reset().await.unwrap();
}
