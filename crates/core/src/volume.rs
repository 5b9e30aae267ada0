//! Volumes: serials, lifecycle categories and status flags.
//!
//! All flag bit manipulation in the workspace goes through [`VolumeFlags`];
//! other crates never interpret the raw bits.

use core::fmt;
use core::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::location::Location;

const MAX_SERIAL_LEN: usize = 32;

/// Volume serial number (VOLSER), the primary key of a volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Serial(String);

impl Serial {
    /// Validate and wrap a serial.
    ///
    /// Serials are non-empty ASCII alphanumerics, at most 32 characters.
    pub fn new(serial: impl Into<String>) -> DomainResult<Self> {
        let serial = serial.into();
        if serial.is_empty() {
            return Err(DomainError::invalid_serial("serial cannot be empty"));
        }
        if serial.len() > MAX_SERIAL_LEN {
            return Err(DomainError::invalid_serial(format!(
                "{serial}: longer than {MAX_SERIAL_LEN} characters"
            )));
        }
        if !serial.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DomainError::invalid_serial(format!(
                "{serial}: only ASCII letters and digits are allowed"
            )));
        }
        Ok(Self(serial))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Serial {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Serial {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Serial> for String {
    fn from(value: Serial) -> Self {
        value.0
    }
}

/// Lifecycle state of a volume.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeCategory {
    Unknown,
    Allocating,
    Allocated,
    Scratch,
    Filling,
    Full,
    Missing,
    Damaged,
    Cleaning,
}

impl VolumeCategory {
    pub const ALL: [VolumeCategory; 9] = [
        VolumeCategory::Unknown,
        VolumeCategory::Allocating,
        VolumeCategory::Allocated,
        VolumeCategory::Scratch,
        VolumeCategory::Filling,
        VolumeCategory::Full,
        VolumeCategory::Missing,
        VolumeCategory::Damaged,
        VolumeCategory::Cleaning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeCategory::Unknown => "unknown",
            VolumeCategory::Allocating => "allocating",
            VolumeCategory::Allocated => "allocated",
            VolumeCategory::Scratch => "scratch",
            VolumeCategory::Filling => "filling",
            VolumeCategory::Full => "full",
            VolumeCategory::Missing => "missing",
            VolumeCategory::Damaged => "damaged",
            VolumeCategory::Cleaning => "cleaning",
        }
    }

    /// Categories `alloc` may hand out.
    pub fn is_allocatable(&self) -> bool {
        matches!(self, VolumeCategory::Filling | VolumeCategory::Scratch)
    }

    /// Operator-only categories reachable from any state.
    pub fn is_operator_assigned(&self) -> bool {
        matches!(
            self,
            VolumeCategory::Missing | VolumeCategory::Damaged | VolumeCategory::Cleaning
        )
    }

    /// Whether a volume may move from `self` to `next`.
    ///
    /// Allowed edges:
    /// - Unknown → Scratch (registration)
    /// - Scratch | Filling → Allocating → Allocated → Filling | Full
    /// - any → Missing | Damaged | Cleaning (operator)
    /// - Missing | Damaged | Cleaning → Unknown (operator re-registration)
    pub fn can_transition_to(&self, next: VolumeCategory) -> bool {
        use VolumeCategory::*;

        if *self == next || next.is_operator_assigned() {
            return true;
        }

        matches!(
            (*self, next),
            (Unknown, Scratch)
                | (Scratch, Allocating)
                | (Filling, Allocating)
                | (Allocating, Allocated)
                | (Allocated, Filling)
                | (Allocated, Full)
                | (Missing, Unknown)
                | (Damaged, Unknown)
                | (Cleaning, Unknown)
        )
    }
}

impl fmt::Display for VolumeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VolumeCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::invalid_category(s))
    }
}

bitflags! {
    /// Orthogonal transient/persistent conditions of a volume.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct VolumeFlags: u32 {
        /// A move has committed its intent but not confirmed the physical action.
        const TRANSFERING = 1 << 0;
        /// The volume sits in a drive.
        const MOUNTED = 1 << 1;
        const NEEDS_CLEANING = 1 << 2;
        const FORMATTED = 1 << 3;
    }
}

impl VolumeFlags {
    /// Flags that describe the medium itself rather than its position.
    pub const PERSISTENT: VolumeFlags =
        VolumeFlags::NEEDS_CLEANING.union(VolumeFlags::FORMATTED);

    /// Decode a stored bitmask, rejecting undefined bits.
    pub fn try_from_bits(bits: u32) -> DomainResult<Self> {
        Self::from_bits(bits).ok_or(DomainError::InvalidFlag(bits))
    }

    /// Human readable labels, in a stable order.
    pub fn labels(&self) -> Vec<&'static str> {
        const LABELS: [(VolumeFlags, &str); 4] = [
            (VolumeFlags::TRANSFERING, "transfering"),
            (VolumeFlags::MOUNTED, "mounted"),
            (VolumeFlags::NEEDS_CLEANING, "needs-cleaning"),
            (VolumeFlags::FORMATTED, "formatted"),
        ];

        LABELS
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, label)| *label)
            .collect()
    }
}

impl fmt::Display for VolumeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.labels();
        if labels.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&labels.join(","))
        }
    }
}

/// The durable unit of media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub serial: Serial,
    /// Current position; `None` while a move is in flight.
    pub location: Option<Location>,
    /// Where the volume returns to when unloaded from a drive.
    pub home: Option<Location>,
    pub category: VolumeCategory,
    pub flags: VolumeFlags,
}

impl Volume {
    pub fn new(serial: Serial, location: Location, category: VolumeCategory) -> Self {
        Self {
            serial,
            location: Some(location),
            home: None,
            category,
            flags: VolumeFlags::empty(),
        }
    }

    pub fn with_home(mut self, home: Location) -> Self {
        self.home = Some(home);
        self
    }

    pub fn with_flags(mut self, flags: VolumeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_transfering(&self) -> bool {
        self.flags.contains(VolumeFlags::TRANSFERING)
    }

    pub fn is_mounted(&self) -> bool {
        self.flags.contains(VolumeFlags::MOUNTED)
    }

    /// Check the position/flag invariants of a single record.
    ///
    /// - `MOUNTED` requires a transfer location, or an absent location while
    ///   `TRANSFERING` (the load transit window).
    /// - `home`, when present, is a storage or import/export slot.
    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.is_mounted() {
            let ok = match self.location {
                Some(loc) => loc.is_transfer(),
                None => self.is_transfering(),
            };
            if !ok {
                return Err(DomainError::invariant(format!(
                    "{}: mounted volume must be in a transfer slot",
                    self.serial
                )));
            }
        }

        if let Some(home) = self.home {
            if !home.category.is_resting() {
                return Err(DomainError::invariant(format!(
                    "{}: home {home} is not a storage or import/export slot",
                    self.serial
                )));
            }
        }

        Ok(())
    }
}

fn fmt_location(loc: &Option<Location>) -> String {
    loc.map(|l| l.to_string()).unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {} (loc: {}) (home: {}) (flags: {})]",
            self.serial,
            self.category,
            fmt_location(&self.location),
            fmt_location(&self.home),
            self.flags
        )
    }
}
