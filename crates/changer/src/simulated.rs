//! In-memory model of a tape library.
//!
//! Tracks which serial sits in which slot and applies moves to that model,
//! so the inventory can be reconciled against a "physical" truth in tests.
//! Faults and slow moves can be injected to exercise recovery paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, warn};

use tapevault_core::{ConfigError, Location, Options, Serial, Slot, SlotCategory, SlotStatus};

use crate::r#trait::{Changer, ChangerError, ChangerOp};

/// Simulated library layout and timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedConfig {
    pub storage_slots: u32,
    pub transfer_slots: u32,
    pub import_export_slots: u32,
    pub cleaning_slots: u32,
    /// Time a single move takes.
    pub move_delay: Duration,
    /// Moves slower than this fail with `ChangerError::Timeout`.
    pub timeout: Option<Duration>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            storage_slots: 32,
            transfer_slots: 2,
            import_export_slots: 4,
            cleaning_slots: 1,
            move_delay: Duration::ZERO,
            timeout: None,
        }
    }
}

impl SimulatedConfig {
    const BACKEND: &'static str = "simulated";
    const KEYS: [&'static str; 6] = [
        "storage-slots",
        "transfer-slots",
        "import-export-slots",
        "cleaning-slots",
        "move-delay-ms",
        "timeout-ms",
    ];

    /// Build from an option bag. Every key is optional.
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        options.ensure_known(Self::BACKEND, &Self::KEYS)?;

        let defaults = Self::default();
        Ok(Self {
            storage_slots: options.parse("storage-slots")?.unwrap_or(defaults.storage_slots),
            transfer_slots: options.parse("transfer-slots")?.unwrap_or(defaults.transfer_slots),
            import_export_slots: options
                .parse("import-export-slots")?
                .unwrap_or(defaults.import_export_slots),
            cleaning_slots: options.parse("cleaning-slots")?.unwrap_or(defaults.cleaning_slots),
            move_delay: options
                .parse::<u64>("move-delay-ms")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.move_delay),
            timeout: options.parse::<u64>("timeout-ms")?.map(Duration::from_millis),
        })
    }

    pub fn with_slots(mut self, storage: u32, transfer: u32, import_export: u32) -> Self {
        self.storage_slots = storage;
        self.transfer_slots = transfer;
        self.import_export_slots = import_export;
        self
    }

    pub fn with_move_delay(mut self, delay: Duration) -> Self {
        self.move_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One move request observed by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub op: ChangerOp,
    pub src: Location,
    pub dst: Location,
    pub succeeded: bool,
}

/// Faults waiting to be injected, counted per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    pending: HashMap<ChangerOp, u32>,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls of `op`.
    pub fn fail_next(mut self, op: ChangerOp, times: u32) -> Self {
        *self.pending.entry(op).or_default() += times;
        self
    }

    pub fn remaining(&self, op: ChangerOp) -> u32 {
        self.pending.get(&op).copied().unwrap_or(0)
    }

    fn take(&mut self, op: ChangerOp) -> bool {
        match self.pending.get_mut(&op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct Library {
    slots: BTreeMap<Location, Option<Serial>>,
    faults: FaultPlan,
    history: Vec<MoveRecord>,
}

/// Simulated changer.
#[derive(Debug)]
pub struct SimulatedChanger {
    config: SimulatedConfig,
    library: Mutex<Library>,
}

impl SimulatedChanger {
    pub fn new(config: SimulatedConfig) -> Self {
        let mut slots = BTreeMap::new();
        let layout = [
            (SlotCategory::Storage, config.storage_slots),
            (SlotCategory::Transfer, config.transfer_slots),
            (SlotCategory::ImportExport, config.import_export_slots),
            (SlotCategory::Cleaning, config.cleaning_slots),
        ];
        for (category, count) in layout {
            for addr in 1..=count {
                slots.insert(Location::new(addr, category), None);
            }
        }

        Self {
            config,
            library: Mutex::new(Library {
                slots,
                ..Default::default()
            }),
        }
    }

    /// Registry constructor.
    pub fn from_options(options: &Options) -> Result<Arc<dyn Changer>, ConfigError> {
        Ok(Arc::new(Self::new(SimulatedConfig::from_options(options)?)))
    }

    /// Replace the pending faults.
    pub fn with_faults(mut self, plan: FaultPlan) -> Self {
        if let Ok(library) = self.library.get_mut() {
            library.faults = plan;
        }
        self
    }

    pub fn config(&self) -> &SimulatedConfig {
        &self.config
    }

    fn library(&self, op: ChangerOp) -> Result<MutexGuard<'_, Library>, ChangerError> {
        self.library.lock().map_err(|_| ChangerError::Fault {
            op,
            message: "simulator state poisoned".to_string(),
        })
    }

    /// Put a medium into an empty slot, as an operator would by hand.
    pub fn place(&self, location: Location, serial: Serial) -> Result<(), ChangerError> {
        let op = ChangerOp::Status;
        let mut library = self.library(op)?;
        match library.slots.get_mut(&location) {
            None => Err(ChangerError::UnknownSlot { op, location }),
            Some(Some(_)) => Err(ChangerError::SlotOccupied { op, location }),
            Some(slot) => {
                *slot = Some(serial);
                Ok(())
            }
        }
    }

    /// Take a medium out of a slot by hand.
    pub fn remove(&self, location: Location) -> Result<Option<Serial>, ChangerError> {
        let op = ChangerOp::Status;
        let mut library = self.library(op)?;
        match library.slots.get_mut(&location) {
            None => Err(ChangerError::UnknownSlot { op, location }),
            Some(slot) => Ok(slot.take()),
        }
    }

    /// Make the next `times` calls of `op` fail with a device fault.
    pub fn fail_next(&self, op: ChangerOp, times: u32) -> Result<(), ChangerError> {
        let mut library = self.library(op)?;
        let plan = std::mem::take(&mut library.faults);
        library.faults = plan.fail_next(op, times);
        Ok(())
    }

    /// Every move request seen so far, in call order.
    pub fn history(&self) -> Result<Vec<MoveRecord>, ChangerError> {
        Ok(self.library(ChangerOp::Status)?.history.clone())
    }

    /// Serial currently in `location`, if any.
    pub fn occupant(&self, location: Location) -> Result<Option<Serial>, ChangerError> {
        let library = self.library(ChangerOp::Status)?;
        Ok(library.slots.get(&location).cloned().flatten())
    }

    async fn travel(&self, op: ChangerOp) -> Result<(), ChangerError> {
        let delay = self.config.move_delay;
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, tokio::time::sleep(delay))
                .await
                .map_err(|_| ChangerError::Timeout { op, after: limit }),
            None => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(())
            }
        }
    }

    async fn perform(&self, op: ChangerOp, src: Location, dst: Location) -> Result<(), ChangerError> {
        op.check_slots(src, dst)?;

        let injected = self.library(op)?.faults.take(op);
        let result = if injected {
            Err(ChangerError::Fault {
                op,
                message: "injected fault".to_string(),
            })
        } else {
            match self.travel(op).await {
                Ok(()) => self.apply(op, src, dst),
                Err(e) => Err(e),
            }
        };

        let mut library = self.library(op)?;
        library.history.push(MoveRecord {
            op,
            src,
            dst,
            succeeded: result.is_ok(),
        });

        match &result {
            Ok(()) => debug!(%op, %src, %dst, "simulated move completed"),
            Err(e) => warn!(%op, %src, %dst, error = %e, "simulated move failed"),
        }
        result
    }

    fn apply(&self, op: ChangerOp, src: Location, dst: Location) -> Result<(), ChangerError> {
        let mut library = self.library(op)?;

        match library.slots.get(&dst) {
            None => return Err(ChangerError::UnknownSlot { op, location: dst }),
            Some(Some(_)) => return Err(ChangerError::SlotOccupied { op, location: dst }),
            Some(None) => {}
        }

        let serial = match library.slots.get_mut(&src) {
            None => return Err(ChangerError::UnknownSlot { op, location: src }),
            Some(slot) => slot.take().ok_or(ChangerError::SlotEmpty { op, location: src })?,
        };

        library.slots.insert(dst, Some(serial));
        Ok(())
    }
}

#[async_trait::async_trait]
impl Changer for SimulatedChanger {
    async fn status(&self) -> Result<SlotStatus, ChangerError> {
        let op = ChangerOp::Status;
        let mut library = self.library(op)?;
        if library.faults.take(op) {
            return Err(ChangerError::Fault {
                op,
                message: "injected fault".to_string(),
            });
        }

        Ok(library
            .slots
            .iter()
            .map(|(location, serial)| Slot {
                location: *location,
                volume: serial.clone(),
            })
            .collect())
    }

    async fn load(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        self.perform(ChangerOp::Load, src, dst).await
    }

    async fn unload(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        self.perform(ChangerOp::Unload, src, dst).await
    }

    async fn transfer(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        self.perform(ChangerOp::Transfer, src, dst).await
    }
}
