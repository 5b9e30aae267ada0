//! The three-phase move protocol shared by every backend.
//!
//! Backends own the locking and persistence of Phase 1 (commit intent) and
//! Phase 3 (finalize) through [`MoveLedger`]; the state changes themselves
//! are computed here by [`begin`] and [`finish`], and [`execute`] sequences
//! the phases around the changer call.

use serde::{Deserialize, Serialize};
use tracing::{Instrument, Span, debug, error, info_span};
use uuid::Uuid;

use tapevault_changer::{Changer, ChangerError};
use tapevault_core::{Location, Serial, Volume, VolumeCategory, VolumeFlags};

use crate::r#trait::{InventoryError, InventoryResult};

/// Kind of physical move.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    Load,
    Unload,
    Transfer,
}

impl MoveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveKind::Load => "load",
            MoveKind::Unload => "unload",
            MoveKind::Transfer => "transfer",
        }
    }

    /// Whether `src → dst` is allowed for this kind of move.
    pub fn permits(&self, src: Location, dst: Location) -> bool {
        match self {
            MoveKind::Load => src.category.is_resting() && dst.is_transfer(),
            MoveKind::Unload => src.is_transfer() && dst.category.is_resting(),
            MoveKind::Transfer => src.category.is_resting() && dst.category.is_resting(),
        }
    }

    /// Ask the changer to perform the move.
    pub async fn dispatch(
        &self,
        changer: &dyn Changer,
        src: Location,
        dst: Location,
    ) -> Result<(), ChangerError> {
        match self {
            MoveKind::Load => changer.load(src, dst).await,
            MoveKind::Unload => changer.unload(src, dst).await,
            MoveKind::Transfer => changer.transfer(src, dst).await,
        }
    }
}

impl std::fmt::Display for MoveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed Phase 1: what was moved from where to where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub move_id: Uuid,
    pub kind: MoveKind,
    pub src: Location,
    pub dst: Location,
    /// The record as written by Phase 1.
    pub volume: Volume,
}

impl MoveIntent {
    pub fn serial(&self) -> &Serial {
        &self.volume.serial
    }
}

/// Validate a move and compute the intent state (Phase 1).
///
/// `dst` may only be `None` for an unload, which then returns the volume to
/// its home slot.
pub fn begin(kind: MoveKind, current: &Volume, dst: Option<Location>) -> InventoryResult<MoveIntent> {
    let op = kind.as_str();
    let serial = &current.serial;

    if current.is_transfering() {
        return Err(InventoryError::invalid_transition(op, serial, "a move is already in flight"));
    }

    let src = current
        .location
        .ok_or_else(|| InventoryError::invalid_transition(op, serial, "current location is unknown"))?;

    let dst = match (kind, dst) {
        (_, Some(dst)) => dst,
        (MoveKind::Unload, None) => current.home.ok_or_else(|| {
            InventoryError::invalid_transition(op, serial, "no destination given and no home slot recorded")
        })?,
        (_, None) => {
            return Err(InventoryError::invalid_transition(op, serial, "a destination is required"));
        }
    };

    if !kind.permits(src, dst) {
        return Err(InventoryError::invalid_transition(
            op,
            serial,
            format!("cannot {kind} from {src} to {dst}"),
        ));
    }
    if src == dst {
        return Err(InventoryError::invalid_transition(
            op,
            serial,
            format!("already at {dst}"),
        ));
    }

    let mut volume = current.clone();
    volume.flags.insert(VolumeFlags::TRANSFERING);
    volume.location = None;
    match kind {
        MoveKind::Load => {
            volume.flags.insert(VolumeFlags::MOUNTED);
            volume.home = Some(src);
        }
        MoveKind::Unload => volume.flags.remove(VolumeFlags::MOUNTED),
        MoveKind::Transfer => {}
    }

    volume
        .check_invariants()
        .map_err(|e| InventoryError::domain(op, e))?;

    Ok(MoveIntent {
        move_id: Uuid::now_v7(),
        kind,
        src,
        dst,
        volume,
    })
}

/// Compute the finalized record (Phase 3) from the record as currently stored.
///
/// The effects of the move are applied again rather than assumed, so a
/// record rewritten by an audit while the changer was busy still ends up
/// mounted with its home slot after a load.
pub fn finish(intent: &MoveIntent, current: &Volume) -> Volume {
    let mut volume = current.clone();
    volume.flags.remove(VolumeFlags::TRANSFERING);
    volume.location = Some(intent.dst);
    match intent.kind {
        MoveKind::Load => {
            volume.flags.insert(VolumeFlags::MOUNTED);
            volume.home = volume.home.or(Some(intent.src));
            if volume.category == VolumeCategory::Allocating {
                volume.category = VolumeCategory::Allocated;
            }
        }
        MoveKind::Unload | MoveKind::Transfer => {
            volume.flags.remove(VolumeFlags::MOUNTED);
            volume.home = None;
        }
    }
    volume
}

/// Persistence side of the protocol, implemented by each backend.
#[async_trait::async_trait]
pub trait MoveLedger: Send + Sync {
    /// Phase 1: lock the record, run [`begin`], and commit the intent.
    ///
    /// Nothing may stay locked once this returns.
    async fn commit_intent(
        &self,
        kind: MoveKind,
        serial: &Serial,
        dst: Option<Location>,
    ) -> InventoryResult<MoveIntent>;

    /// Phase 3: lock the record again and store [`finish`] of it.
    async fn finalize(&self, intent: &MoveIntent) -> InventoryResult<Volume>;
}

/// Run all three phases of a move.
pub async fn execute<L>(
    ledger: &L,
    kind: MoveKind,
    serial: &Serial,
    dst: Option<Location>,
    changer: &dyn Changer,
) -> InventoryResult<Volume>
where
    L: MoveLedger + ?Sized,
{
    let span = info_span!(
        "move",
        op = kind.as_str(),
        serial = %serial,
        move_id = tracing::field::Empty,
    );

    async move {
        let intent = ledger.commit_intent(kind, serial, dst).await?;
        Span::current().record("move_id", tracing::field::display(intent.move_id));
        debug!(src = %intent.src, dst = %intent.dst, "intent committed");

        if let Err(source) = kind.dispatch(changer, intent.src, intent.dst).await {
            error!(
                src = %intent.src,
                dst = %intent.dst,
                error = %source,
                "changer failed; volume is stuck in transit until the next audit"
            );
            return Err(InventoryError::Device {
                op: kind.as_str(),
                serial: serial.clone(),
                source,
            });
        }
        debug!("physical move completed");

        match ledger.finalize(&intent).await {
            Ok(volume) => {
                debug!(volume = %volume, "move finalized");
                Ok(volume)
            }
            Err(source) => {
                error!(
                    dst = %intent.dst,
                    error = %source,
                    "could not record completed move; volume is stuck in transit until the next audit"
                );
                Err(InventoryError::Finalize {
                    op: kind.as_str(),
                    serial: serial.clone(),
                    source: Box::new(source),
                })
            }
        }
    }
    .instrument(span)
    .await
}
