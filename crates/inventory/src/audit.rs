//! Reconciliation of inventory records against a changer snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::warn;

use tapevault_core::{Location, Serial, SlotStatus, Volume, VolumeCategory, VolumeFlags};

use crate::r#trait::AuditReport;

/// Writes needed to bring the records in line with a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditPlan {
    /// Serials whose stored location must be vacated before any write, so
    /// that swaps and displacements never collide on a slot.
    pub vacate: Vec<Serial>,
    /// Records to insert or overwrite, ordered by serial.
    pub writes: Vec<Volume>,
    pub discovered: Vec<Serial>,
    pub relocated: Vec<Serial>,
    pub displaced: Vec<Serial>,
    pub unchanged: usize,
}

impl AuditPlan {
    /// Compute the plan.
    ///
    /// - new serials are created as `cleaning` if they carry the cleaning
    ///   prefix, `scratch` otherwise
    /// - known serials take the observed slot; `TRANSFERING` is cleared and
    ///   `MOUNTED` follows the slot type; `home` is dropped outside a drive;
    ///   the category is never touched
    /// - a record claiming an observed slot that holds another serial loses
    ///   its location
    /// - empty slots and unobserved records are left alone
    pub fn new<'a>(
        snapshot: &SlotStatus,
        records: impl IntoIterator<Item = &'a Volume>,
        cleaning_prefix: &str,
    ) -> Self {
        let records: BTreeMap<&Serial, &Volume> = records.into_iter().map(|v| (&v.serial, v)).collect();

        let mut observed: BTreeMap<&Serial, Location> = BTreeMap::new();
        let mut occupants: HashMap<Location, &Serial> = HashMap::new();
        for (location, serial) in snapshot.occupied() {
            if let Some(first) = observed.get(serial) {
                warn!(%serial, %first, %location, "serial reported in two slots; keeping the first");
                continue;
            }
            observed.insert(serial, location);
            occupants.insert(location, serial);
        }

        let mut plan = AuditPlan::default();
        let mut writes: BTreeMap<Serial, Volume> = BTreeMap::new();
        let mut vacate: BTreeSet<Serial> = BTreeSet::new();

        for (&serial, &location) in &observed {
            match records.get(serial) {
                None => {
                    let category = if serial.has_prefix(cleaning_prefix) {
                        VolumeCategory::Cleaning
                    } else {
                        VolumeCategory::Scratch
                    };
                    let mut volume = Volume::new(serial.clone(), location, category);
                    if location.is_transfer() {
                        volume.flags.insert(VolumeFlags::MOUNTED);
                    }
                    plan.discovered.push(serial.clone());
                    writes.insert(serial.clone(), volume);
                }
                Some(&existing) => {
                    let seen = observe(existing, location);
                    if seen == *existing {
                        plan.unchanged += 1;
                        continue;
                    }
                    if existing.location.is_some() && existing.location != seen.location {
                        vacate.insert(serial.clone());
                    }
                    plan.relocated.push(serial.clone());
                    writes.insert(serial.clone(), seen);
                }
            }
        }

        for (&serial, &existing) in &records {
            let Some(location) = existing.location else {
                continue;
            };
            if observed.contains_key(serial) {
                continue;
            }
            match occupants.get(&location) {
                Some(&occupant) if occupant != serial => {
                    let mut displaced = existing.clone();
                    displaced.location = None;
                    displaced.flags.remove(VolumeFlags::MOUNTED);
                    warn!(%serial, %location, %occupant, "record displaced by observed volume");
                    vacate.insert(serial.clone());
                    plan.displaced.push(serial.clone());
                    writes.insert(serial.clone(), displaced);
                }
                _ => {}
            }
        }

        plan.vacate = vacate.into_iter().collect();
        plan.writes = writes.into_values().collect();
        plan
    }

    pub fn report(self, audited_at: DateTime<Utc>) -> AuditReport {
        AuditReport {
            discovered: self.discovered,
            relocated: self.relocated,
            unchanged: self.unchanged,
            displaced: self.displaced,
            audited_at,
        }
    }
}

/// The record of `existing` after it has been seen at `location`.
fn observe(existing: &Volume, location: Location) -> Volume {
    let mut volume = existing.clone();
    volume.location = Some(location);
    volume.flags.remove(VolumeFlags::TRANSFERING);
    volume.flags.set(VolumeFlags::MOUNTED, location.is_transfer());
    if !location.is_transfer() {
        volume.home = None;
    }
    volume
}
