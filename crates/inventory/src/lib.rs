//! `tapevault-inventory`: durable volume inventory coordinated with a
//! media changer.
//!
//! The [`Inventory`] trait is the system of record for volumes. Moves go
//! through the three-phase [`protocol`]; [`Inventory::audit`] reconciles
//! records with what the changer reports. Two backends are provided:
//! [`InMemoryInventory`] and [`PostgresInventory`].

pub mod audit;
pub mod config;
pub mod in_memory;
pub mod postgres;
pub mod protocol;
pub mod registry;
pub mod rules;
pub mod r#trait;

pub use audit::AuditPlan;
pub use config::{MemoryConfig, PostgresConfig};
pub use in_memory::InMemoryInventory;
pub use postgres::PostgresInventory;
pub use protocol::{MoveIntent, MoveKind, MoveLedger};
pub use registry::{InventoryFactory, InventoryRegistry};
pub use r#trait::{AuditReport, Inventory, InventoryError, InventoryResult, TreeIndex};
