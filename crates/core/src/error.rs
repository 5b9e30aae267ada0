//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic validation failures of the tape domain
/// (names, serials, flag bits, invariants). Persistence and device concerns
/// belong to the inventory and changer crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A volume category name was not recognised.
    #[error("invalid volume category: {0}")]
    InvalidCategory(String),

    /// A slot category name was not recognised.
    #[error("invalid slot category: {0}")]
    InvalidSlotCategory(String),

    /// A flags bitmask carried bits with no defined meaning.
    #[error("invalid volume flags: {0:#x}")]
    InvalidFlag(u32),

    /// A location string was malformed.
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// A volume serial (VOLSER) was malformed.
    #[error("invalid serial: {0}")]
    InvalidSerial(String),

    /// A tree path was malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A volume invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn invalid_category(name: impl Into<String>) -> Self {
        Self::InvalidCategory(name.into())
    }

    pub fn invalid_slot_category(name: impl Into<String>) -> Self {
        Self::InvalidSlotCategory(name.into())
    }

    pub fn invalid_location(msg: impl Into<String>) -> Self {
        Self::InvalidLocation(msg.into())
    }

    pub fn invalid_serial(msg: impl Into<String>) -> Self {
        Self::InvalidSerial(msg.into())
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}
