use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, instrument};

use tapevault_changer::Changer;
use tapevault_core::{ConfigError, Location, Options, PathName, Serial, Volume};

use crate::audit::AuditPlan;
use crate::config::MemoryConfig;
use crate::protocol::{self, MoveIntent, MoveKind, MoveLedger};
use crate::r#trait::{AuditReport, Inventory, InventoryError, InventoryResult, TreeIndex};
use crate::rules;

#[derive(Debug, Default)]
struct State {
    volumes: BTreeMap<Serial, Volume>,
    tree: BTreeMap<PathName, Serial>,
}

impl State {
    /// Serial other than `except` recorded at `location`.
    fn occupant(&self, location: Location, except: &Serial) -> Option<&Serial> {
        self.volumes
            .values()
            .find(|v| v.location == Some(location) && &v.serial != except)
            .map(|v| &v.serial)
    }

    fn ensure_free(&self, op: &'static str, volume: &Volume) -> InventoryResult<()> {
        match volume.location {
            Some(location) if self.occupant(location, &volume.serial).is_some() => {
                Err(InventoryError::LocationOccupied { op, location })
            }
            _ => Ok(()),
        }
    }

    fn get(&self, op: &'static str, serial: &Serial) -> InventoryResult<&Volume> {
        self.volumes
            .get(serial)
            .ok_or_else(|| InventoryError::not_found(op, format!("volume {serial}")))
    }
}

/// In-memory inventory.
///
/// Intended for tests/dev and as the reference behaviour of the protocol.
/// One mutex guards all records; it plays the role of the row lock and is
/// never held across a changer call.
#[derive(Debug)]
pub struct InMemoryInventory {
    config: MemoryConfig,
    state: Mutex<State>,
}

impl InMemoryInventory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    /// Registry constructor.
    pub fn from_options(options: &Options) -> Result<Arc<dyn Inventory>, ConfigError> {
        Ok(Arc::new(Self::new(MemoryConfig::from_options(options)?)))
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn state(&self, op: &'static str) -> InventoryResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| InventoryError::storage(op, "lock poisoned"))
    }
}

#[async_trait::async_trait]
impl MoveLedger for InMemoryInventory {
    async fn commit_intent(
        &self,
        kind: MoveKind,
        serial: &Serial,
        dst: Option<Location>,
    ) -> InventoryResult<MoveIntent> {
        let op = kind.as_str();
        let mut state = self.state(op)?;

        let intent = protocol::begin(kind, state.get(op, serial)?, dst)?;
        if state.occupant(intent.dst, serial).is_some() {
            return Err(InventoryError::LocationOccupied {
                op,
                location: intent.dst,
            });
        }

        state.volumes.insert(serial.clone(), intent.volume.clone());
        Ok(intent)
    }

    async fn finalize(&self, intent: &MoveIntent) -> InventoryResult<Volume> {
        let op = intent.kind.as_str();
        let mut state = self.state(op)?;

        let volume = protocol::finish(intent, state.get(op, intent.serial())?);
        state.ensure_free(op, &volume)?;

        state.volumes.insert(volume.serial.clone(), volume.clone());
        Ok(volume)
    }
}

#[async_trait::async_trait]
impl TreeIndex for InMemoryInventory {
    #[instrument(skip_all, fields(op = "create", path = %path, serial = %serial), err)]
    async fn create(&self, path: &PathName, serial: &Serial) -> InventoryResult<()> {
        const OP: &str = "create";
        let mut state = self.state(OP)?;

        if state.tree.contains_key(path) {
            return Err(InventoryError::already_exists(OP, format!("path {path}")));
        }
        state.get(OP, serial)?;

        state.tree.insert(path.clone(), serial.clone());
        Ok(())
    }

    async fn lookup(&self, path: &PathName) -> InventoryResult<Volume> {
        const OP: &str = "lookup";
        let state = self.state(OP)?;

        let serial = state
            .tree
            .get(path)
            .ok_or_else(|| InventoryError::not_found(OP, format!("path {path}")))?;
        state.get(OP, serial).cloned()
    }
}

#[async_trait::async_trait]
impl Inventory for InMemoryInventory {
    #[instrument(skip(self), fields(op = "alloc"), err)]
    async fn alloc(&self) -> InventoryResult<Serial> {
        const OP: &str = "alloc";
        let mut state = self.state(OP)?;

        let winner = state
            .volumes
            .values_mut()
            .filter(|v| rules::is_alloc_candidate(v))
            .min_by(|a, b| rules::alloc_order(a).cmp(&rules::alloc_order(b)))
            .ok_or(InventoryError::Exhausted { op: OP })?;

        winner.category = rules::allocated_category(winner.category);
        debug!(serial = %winner.serial, category = %winner.category, "allocated");
        Ok(winner.serial.clone())
    }

    async fn load(&self, serial: &Serial, dst: Location, changer: &dyn Changer) -> InventoryResult<()> {
        protocol::execute(self, MoveKind::Load, serial, Some(dst), changer).await?;
        Ok(())
    }

    async fn unload(
        &self,
        serial: &Serial,
        dst: Option<Location>,
        changer: &dyn Changer,
    ) -> InventoryResult<()> {
        protocol::execute(self, MoveKind::Unload, serial, dst, changer).await?;
        Ok(())
    }

    async fn transfer(&self, serial: &Serial, dst: Location, changer: &dyn Changer) -> InventoryResult<()> {
        protocol::execute(self, MoveKind::Transfer, serial, Some(dst), changer).await?;
        Ok(())
    }

    #[instrument(skip(self, changer), fields(op = "audit"), err)]
    async fn audit(&self, changer: &dyn Changer) -> InventoryResult<AuditReport> {
        const OP: &str = "audit";
        let snapshot = changer
            .status()
            .await
            .map_err(|source| InventoryError::Status { op: OP, source })?;

        let mut state = self.state(OP)?;
        let plan = AuditPlan::new(&snapshot, state.volumes.values(), &self.config.cleaning_prefix);
        for volume in &plan.writes {
            state.volumes.insert(volume.serial.clone(), volume.clone());
        }
        drop(state);

        let report = plan.report(Utc::now());
        info!(
            discovered = report.discovered.len(),
            relocated = report.relocated.len(),
            displaced = report.displaced.len(),
            unchanged = report.unchanged,
            "audit complete"
        );
        Ok(report)
    }

    async fn loaded(&self, drive: Location) -> InventoryResult<Option<Serial>> {
        let state = self.state("loaded")?;
        let slot = Location::transfer(drive.addr);
        Ok(state
            .volumes
            .values()
            .find(|v| v.location == Some(slot))
            .map(|v| v.serial.clone()))
    }

    #[instrument(skip(self), fields(op = "reset"), err)]
    async fn reset(&self) -> InventoryResult<()> {
        let mut state = self.state("reset")?;
        state.volumes.clear();
        state.tree.clear();
        info!("inventory reset");
        Ok(())
    }

    async fn volumes(&self) -> InventoryResult<Vec<Volume>> {
        let state = self.state("volumes")?;
        Ok(state.volumes.values().cloned().collect())
    }

    async fn info(&self, serial: &Serial) -> InventoryResult<Volume> {
        self.state("info")?.get("info", serial).cloned()
    }

    #[instrument(skip(self, volume), fields(op = "register", serial = %volume.serial), err)]
    async fn register(&self, volume: Volume) -> InventoryResult<()> {
        const OP: &str = "register";
        rules::check_register(OP, &volume)?;

        let mut state = self.state(OP)?;
        if state.volumes.contains_key(&volume.serial) {
            return Err(InventoryError::already_exists(OP, format!("volume {}", volume.serial)));
        }
        state.ensure_free(OP, &volume)?;

        state.volumes.insert(volume.serial.clone(), volume);
        Ok(())
    }

    #[instrument(skip(self, volume), fields(op = "update", serial = %volume.serial), err)]
    async fn update(&self, volume: Volume) -> InventoryResult<()> {
        const OP: &str = "update";
        let mut state = self.state(OP)?;

        rules::check_update(OP, state.get(OP, &volume.serial)?, &volume)?;
        state.ensure_free(OP, &volume)?;

        state.volumes.insert(volume.serial.clone(), volume);
        Ok(())
    }
}
