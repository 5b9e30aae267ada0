use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tapevault_core::{Location, SlotCategory, SlotStatus};

/// Operation requested from a changer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangerOp {
    Status,
    Load,
    Unload,
    Transfer,
}

impl ChangerOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangerOp::Status => "status",
            ChangerOp::Load => "load",
            ChangerOp::Unload => "unload",
            ChangerOp::Transfer => "transfer",
        }
    }

    /// Check the slot-type preconditions of a move.
    ///
    /// - load: destination is a transfer slot
    /// - unload: source is a transfer slot
    /// - transfer: neither end is a transfer slot
    pub fn check_slots(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        let invalid = |location: Location, reason: &str| ChangerError::InvalidSlot {
            op: *self,
            location,
            reason: reason.to_string(),
        };

        match self {
            ChangerOp::Status => Ok(()),
            ChangerOp::Load if dst.category != SlotCategory::Transfer => {
                Err(invalid(dst, "load destination must be a transfer slot"))
            }
            ChangerOp::Unload if src.category != SlotCategory::Transfer => {
                Err(invalid(src, "unload source must be a transfer slot"))
            }
            ChangerOp::Transfer if src.is_transfer() => {
                Err(invalid(src, "transfer source cannot be a transfer slot"))
            }
            ChangerOp::Transfer if dst.is_transfer() => {
                Err(invalid(dst, "transfer destination cannot be a transfer slot"))
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for ChangerOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Changer operation error.
///
/// A failed call leaves the physical state exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChangerError {
    #[error("{op}: invalid slot {location}: {reason}")]
    InvalidSlot {
        op: ChangerOp,
        location: Location,
        reason: String,
    },

    #[error("{op}: slot {location} does not exist")]
    UnknownSlot { op: ChangerOp, location: Location },

    #[error("{op}: source slot {location} is empty")]
    SlotEmpty { op: ChangerOp, location: Location },

    #[error("{op}: destination slot {location} is occupied")]
    SlotOccupied { op: ChangerOp, location: Location },

    /// Mechanical fault reported by the device.
    #[error("{op}: device fault: {message}")]
    Fault { op: ChangerOp, message: String },

    #[error("{op}: timed out after {after:?}")]
    Timeout { op: ChangerOp, after: Duration },
}

impl ChangerError {
    pub fn op(&self) -> ChangerOp {
        match self {
            ChangerError::InvalidSlot { op, .. }
            | ChangerError::UnknownSlot { op, .. }
            | ChangerError::SlotEmpty { op, .. }
            | ChangerError::SlotOccupied { op, .. }
            | ChangerError::Fault { op, .. }
            | ChangerError::Timeout { op, .. } => *op,
        }
    }
}

/// Capability surface of a media changer (real or simulated).
///
/// ## Contract
///
/// - `status()` reflects the physical truth at call time; no caching.
/// - Moves are blocking for the duration of the physical action and atomic
///   at this granularity: on error, no partial move happened.
/// - Implementations know nothing about the inventory's persistence.
///
/// At most one move is expected in flight per physical device; serializing
/// moves against the same drive is the caller's obligation.
#[async_trait::async_trait]
pub trait Changer: Send + Sync {
    /// Enumerate every slot the device knows about.
    async fn status(&self) -> Result<SlotStatus, ChangerError>;

    /// Move media from `src` into the drive at `dst`.
    async fn load(&self, src: Location, dst: Location) -> Result<(), ChangerError>;

    /// Move media out of the drive at `src` into `dst`.
    async fn unload(&self, src: Location, dst: Location) -> Result<(), ChangerError>;

    /// Move media between two non-transfer slots.
    async fn transfer(&self, src: Location, dst: Location) -> Result<(), ChangerError>;
}

#[async_trait::async_trait]
impl<C> Changer for Arc<C>
where
    C: Changer + ?Sized,
{
    async fn status(&self) -> Result<SlotStatus, ChangerError> {
        (**self).status().await
    }

    async fn load(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        (**self).load(src, dst).await
    }

    async fn unload(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        (**self).unload(src, dst).await
    }

    async fn transfer(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        (**self).transfer(src, dst).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_preconditions() {
        let storage = Location::storage(10);
        let drive = Location::transfer(1);
        let mail = Location::import_export(1);

        assert!(ChangerOp::Load.check_slots(storage, drive).is_ok());
        assert!(ChangerOp::Load.check_slots(storage, mail).is_err());

        assert!(ChangerOp::Unload.check_slots(drive, storage).is_ok());
        assert!(ChangerOp::Unload.check_slots(storage, mail).is_err());

        assert!(ChangerOp::Transfer.check_slots(storage, mail).is_ok());
        assert!(ChangerOp::Transfer.check_slots(drive, mail).is_err());
        assert!(ChangerOp::Transfer.check_slots(storage, drive).is_err());
    }

    #[test]
    fn errors_name_the_operation() {
        let err = ChangerError::Fault {
            op: ChangerOp::Load,
            message: "gripper jammed".to_string(),
        };
        assert_eq!(err.op(), ChangerOp::Load);
        assert_eq!(err.to_string(), "load: device fault: gripper jammed");
    }
}
