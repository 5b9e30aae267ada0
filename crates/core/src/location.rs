//! Physical positions inside the library.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Kind of slot a [`Location`] refers to.
///
/// The declaration order is the iteration order used by snapshots and audit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlotCategory {
    /// Drive position; media here is mounted.
    Transfer,
    /// Regular storage cell.
    Storage,
    /// Mail slot used to move media in and out of the library.
    ImportExport,
    /// Dedicated cleaning-cartridge cell.
    Cleaning,
}

impl SlotCategory {
    /// Every slot category, in snapshot order.
    pub const ALL: [SlotCategory; 4] = [
        SlotCategory::Transfer,
        SlotCategory::Storage,
        SlotCategory::ImportExport,
        SlotCategory::Cleaning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotCategory::Transfer => "transfer",
            SlotCategory::Storage => "storage",
            SlotCategory::ImportExport => "import-export",
            SlotCategory::Cleaning => "cleaning",
        }
    }

    /// Storage and import/export cells are where idle media rests.
    pub fn is_resting(&self) -> bool {
        matches!(self, SlotCategory::Storage | SlotCategory::ImportExport)
    }
}

impl fmt::Display for SlotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transfer" => Ok(SlotCategory::Transfer),
            "storage" => Ok(SlotCategory::Storage),
            "import-export" => Ok(SlotCategory::ImportExport),
            "cleaning" => Ok(SlotCategory::Cleaning),
            other => Err(DomainError::invalid_slot_category(other)),
        }
    }
}

/// An addressable slot or drive position.
///
/// Immutable value: two locations are equal iff both `addr` and `category`
/// match.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub addr: u32,
    pub category: SlotCategory,
}

impl Location {
    pub const fn new(addr: u32, category: SlotCategory) -> Self {
        Self { addr, category }
    }

    pub const fn storage(addr: u32) -> Self {
        Self::new(addr, SlotCategory::Storage)
    }

    pub const fn transfer(addr: u32) -> Self {
        Self::new(addr, SlotCategory::Transfer)
    }

    pub const fn import_export(addr: u32) -> Self {
        Self::new(addr, SlotCategory::ImportExport)
    }

    pub const fn cleaning(addr: u32) -> Self {
        Self::new(addr, SlotCategory::Cleaning)
    }

    pub fn is_transfer(&self) -> bool {
        self.category == SlotCategory::Transfer
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.category, self.addr).cmp(&(other.category, other.addr))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.addr)
    }
}

impl FromStr for Location {
    type Err = DomainError;

    /// Parses the `category:addr` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, addr) = s
            .split_once(':')
            .ok_or_else(|| DomainError::invalid_location(s))?;
        let category = category.parse()?;
        let addr = addr
            .parse::<u32>()
            .map_err(|e| DomainError::invalid_location(format!("{s}: {e}")))?;
        Ok(Self { addr, category })
    }
}
