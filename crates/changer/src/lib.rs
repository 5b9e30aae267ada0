//! `tapevault-changer`: media changer contract and backends.
//!
//! The inventory engine drives a [`Changer`] to move media between slots.
//! Backends are picked by name through a [`ChangerRegistry`].

pub mod null;
pub mod registry;
pub mod simulated;
pub mod r#trait;

pub use null::NullChanger;
pub use r#trait::{Changer, ChangerError, ChangerOp};
pub use registry::{ChangerFactory, ChangerRegistry};
pub use simulated::{FaultPlan, MoveRecord, SimulatedChanger, SimulatedConfig};
