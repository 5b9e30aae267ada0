use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tapevault_changer::{Changer, ChangerError};
use tapevault_core::{ConfigError, DomainError, Location, PathName, Serial, Volume, VolumeCategory};

/// Result type used by every inventory operation.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Inventory operation error.
///
/// Every variant names the operation that failed (`op`), so a log line is
/// enough to tell which step of which call went wrong.
///
/// ## Error Categories
///
/// - **Config**: backend construction failed; fatal, never retried
/// - **InvalidTransition / InvalidCategory / Domain**: preconditions rejected
///   before anything was written
/// - **NotFound / AlreadyExists / LocationOccupied / Exhausted**: lookups and
///   uniqueness conflicts
/// - **Device**: the changer failed after the intent was committed; the volume
///   is left in transit until the next audit
/// - **Status**: the changer could not report its slots
/// - **Finalize**: the physical move succeeded but recording it failed
/// - **Storage**: the persistence layer failed before any physical action
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{op}: {source}")]
    Domain {
        op: &'static str,
        #[source]
        source: DomainError,
    },

    #[error("{op}: {serial}: invalid transition: {reason}")]
    InvalidTransition {
        op: &'static str,
        serial: Serial,
        reason: String,
    },

    #[error("{op}: {serial}: category {category} not allowed here")]
    InvalidCategory {
        op: &'static str,
        serial: Serial,
        category: VolumeCategory,
    },

    #[error("{op}: {what} not found")]
    NotFound { op: &'static str, what: String },

    #[error("{op}: {what} already exists")]
    AlreadyExists { op: &'static str, what: String },

    #[error("{op}: location {location} is already occupied")]
    LocationOccupied { op: &'static str, location: Location },

    #[error("{op}: no allocatable volume")]
    Exhausted { op: &'static str },

    #[error("{op}: {serial}: changer failed, volume left in transit: {source}")]
    Device {
        op: &'static str,
        serial: Serial,
        #[source]
        source: ChangerError,
    },

    /// The changer status could not be read.
    #[error("{op}: changer status unavailable: {source}")]
    Status {
        op: &'static str,
        #[source]
        source: ChangerError,
    },

    #[error("{op}: {serial}: could not record completed move: {source}")]
    Finalize {
        op: &'static str,
        serial: Serial,
        #[source]
        source: Box<InventoryError>,
    },

    #[error("{op}: storage error: {message}")]
    Storage { op: &'static str, message: String },
}

impl InventoryError {
    pub fn domain(op: &'static str, source: DomainError) -> Self {
        Self::Domain { op, source }
    }

    pub fn invalid_transition(op: &'static str, serial: &Serial, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            op,
            serial: serial.clone(),
            reason: reason.into(),
        }
    }

    pub fn not_found(op: &'static str, what: impl std::fmt::Display) -> Self {
        Self::NotFound {
            op,
            what: what.to_string(),
        }
    }

    pub fn already_exists(op: &'static str, what: impl std::fmt::Display) -> Self {
        Self::AlreadyExists {
            op,
            what: what.to_string(),
        }
    }

    pub fn storage(op: &'static str, message: impl Into<String>) -> Self {
        Self::Storage {
            op,
            message: message.into(),
        }
    }

    /// Name of the failing operation.
    pub fn op(&self) -> &'static str {
        match self {
            InventoryError::Config(_) => "config",
            InventoryError::Domain { op, .. }
            | InventoryError::InvalidTransition { op, .. }
            | InventoryError::InvalidCategory { op, .. }
            | InventoryError::NotFound { op, .. }
            | InventoryError::AlreadyExists { op, .. }
            | InventoryError::LocationOccupied { op, .. }
            | InventoryError::Exhausted { op }
            | InventoryError::Device { op, .. }
            | InventoryError::Status { op, .. }
            | InventoryError::Finalize { op, .. }
            | InventoryError::Storage { op, .. } => op,
        }
    }

    /// Whether the whole call can safely be repeated.
    ///
    /// Only persistence failures that happen before any physical action
    /// qualify. A `Device` or `Finalize` error means the recorded state may
    /// no longer match the library; run an audit instead of retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, InventoryError::Storage { .. })
    }
}

/// Outcome of reconciling the inventory against a changer snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// Serials seen for the first time.
    pub discovered: Vec<Serial>,
    /// Known serials whose recorded location or flags changed.
    pub relocated: Vec<Serial>,
    /// Known serials already recorded exactly as observed.
    pub unchanged: usize,
    /// Records that claimed a slot now holding another serial.
    pub displaced: Vec<Serial>,
    pub audited_at: DateTime<Utc>,
}

impl AuditReport {
    /// True when the audit wrote nothing.
    pub fn is_clean(&self) -> bool {
        self.discovered.is_empty() && self.relocated.is_empty() && self.displaced.is_empty()
    }
}

/// Logical path → volume mapping.
#[async_trait::async_trait]
pub trait TreeIndex: Send + Sync {
    /// Map `path` to the volume `serial`.
    ///
    /// Fails with `AlreadyExists` if the path is mapped and `NotFound` if the
    /// serial is not a known volume.
    async fn create(&self, path: &PathName, serial: &Serial) -> InventoryResult<()>;

    /// Resolve `path` to the current record of its volume.
    async fn lookup(&self, path: &PathName) -> InventoryResult<Volume>;
}

/// Durable volume inventory coordinated with a media changer.
///
/// The inventory is the system of record for where every volume is. It is
/// the only component that asks a [`Changer`] to move media, and every move
/// goes through three phases:
///
/// 1. **Lock & validate**: lock the volume record, check the move against
///    the slot-category rules, and commit an intent (`TRANSFERING` set,
///    location cleared). Nothing is held past this point.
/// 2. **Physical action**: call the changer. On failure the record stays in
///    transit and the error surfaces as [`InventoryError::Device`].
/// 3. **Finalize**: record the destination and clear `TRANSFERING`. On
///    failure the error surfaces as [`InventoryError::Finalize`].
///
/// Neither failure is compensated automatically; [`Inventory::audit`]
/// reconciles records with the physical truth.
///
/// ## Concurrency
///
/// Implementations are shared as `Arc<dyn Inventory>` between tasks. Moves
/// on the same serial are serialized by the record lock; the loser of a race
/// sees the winner's intent and fails validation. Keeping a single move in
/// flight per physical drive is the caller's responsibility.
#[async_trait::async_trait]
pub trait Inventory: TreeIndex {
    /// Reserve a volume for writing.
    ///
    /// Picks the first `filling` or `scratch` volume resting in a storage
    /// slot, ordered by category name then serial. A scratch winner is
    /// promoted to `allocating`; a filling winner is left as is.
    async fn alloc(&self) -> InventoryResult<Serial>;

    /// Move `serial` from storage or import/export into the drive at `dst`.
    async fn load(&self, serial: &Serial, dst: Location, changer: &dyn Changer) -> InventoryResult<()>;

    /// Move `serial` out of its drive into `dst`, or back home if `None`.
    async fn unload(
        &self,
        serial: &Serial,
        dst: Option<Location>,
        changer: &dyn Changer,
    ) -> InventoryResult<()>;

    /// Move `serial` between two storage or import/export slots.
    async fn transfer(&self, serial: &Serial, dst: Location, changer: &dyn Changer) -> InventoryResult<()>;

    /// Reconcile every record with the changer's current status.
    ///
    /// Run it while no move is in flight. An audit that lands between
    /// Phase 1 and Phase 3 records the volume where the changer last saw it
    /// and clears `TRANSFERING`, so a second move of the same serial passes
    /// validation and asks the changer to move media from a slot the first
    /// move is emptying. The first move still finalizes at its destination.
    async fn audit(&self, changer: &dyn Changer) -> InventoryResult<AuditReport>;

    /// Serial recorded in the transfer slot with the address of `drive`.
    async fn loaded(&self, drive: Location) -> InventoryResult<Option<Serial>>;

    /// Drop every record and mapping.
    async fn reset(&self) -> InventoryResult<()>;

    /// All volumes, ordered by serial.
    async fn volumes(&self) -> InventoryResult<Vec<Volume>>;

    async fn info(&self, serial: &Serial) -> InventoryResult<Volume>;

    /// Create a record out of band (initial library load, manual entry).
    async fn register(&self, volume: Volume) -> InventoryResult<()>;

    /// Operator overwrite of an existing record.
    async fn update(&self, volume: Volume) -> InventoryResult<()>;
}

#[async_trait::async_trait]
impl<I> TreeIndex for Arc<I>
where
    I: TreeIndex + ?Sized,
{
    async fn create(&self, path: &PathName, serial: &Serial) -> InventoryResult<()> {
        (**self).create(path, serial).await
    }

    async fn lookup(&self, path: &PathName) -> InventoryResult<Volume> {
        (**self).lookup(path).await
    }
}

#[async_trait::async_trait]
impl<I> Inventory for Arc<I>
where
    I: Inventory + ?Sized,
{
    async fn alloc(&self) -> InventoryResult<Serial> {
        (**self).alloc().await
    }

    async fn load(&self, serial: &Serial, dst: Location, changer: &dyn Changer) -> InventoryResult<()> {
        (**self).load(serial, dst, changer).await
    }

    async fn unload(
        &self,
        serial: &Serial,
        dst: Option<Location>,
        changer: &dyn Changer,
    ) -> InventoryResult<()> {
        (**self).unload(serial, dst, changer).await
    }

    async fn transfer(&self, serial: &Serial, dst: Location, changer: &dyn Changer) -> InventoryResult<()> {
        (**self).transfer(serial, dst, changer).await
    }

    async fn audit(&self, changer: &dyn Changer) -> InventoryResult<AuditReport> {
        (**self).audit(changer).await
    }

    async fn loaded(&self, drive: Location) -> InventoryResult<Option<Serial>> {
        (**self).loaded(drive).await
    }

    async fn reset(&self) -> InventoryResult<()> {
        (**self).reset().await
    }

    async fn volumes(&self) -> InventoryResult<Vec<Volume>> {
        (**self).volumes().await
    }

    async fn info(&self, serial: &Serial) -> InventoryResult<Volume> {
        (**self).info(serial).await
    }

    async fn register(&self, volume: Volume) -> InventoryResult<()> {
        (**self).register(volume).await
    }

    async fn update(&self, volume: Volume) -> InventoryResult<()> {
        (**self).update(volume).await
    }
}
