//! `tapevault-core`: tape library domain model.
//!
//! This crate contains **pure domain** types (no I/O): slot locations,
//! volumes with their lifecycle categories and status flags, changer
//! snapshots, tree paths, and the option bags backends are configured with.

pub mod config;
pub mod error;
pub mod location;
pub mod path;
pub mod slot;
pub mod volume;

pub use config::{ConfigError, Options};
pub use error::{DomainError, DomainResult};
pub use location::{Location, SlotCategory};
pub use path::PathName;
pub use slot::{Slot, SlotStatus};
pub use volume::{Serial, Volume, VolumeCategory, VolumeFlags};
