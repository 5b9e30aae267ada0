//! Changer that does nothing.
//!
//! Accepts any configuration, performs no physical action and always
//! succeeds. Used to exercise the inventory's transactional logic without
//! hardware.

use std::sync::Arc;

use tracing::trace;

use tapevault_core::{ConfigError, Location, Options, SlotStatus};

use crate::r#trait::{Changer, ChangerError};

#[derive(Debug, Default, Clone, Copy)]
pub struct NullChanger;

impl NullChanger {
    pub fn new() -> Self {
        Self
    }

    /// Registry constructor. Every option is ignored.
    pub fn from_options(_options: &Options) -> Result<Arc<dyn Changer>, ConfigError> {
        Ok(Arc::new(Self))
    }
}

#[async_trait::async_trait]
impl Changer for NullChanger {
    async fn status(&self) -> Result<SlotStatus, ChangerError> {
        Ok(SlotStatus::new())
    }

    async fn load(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        trace!(%src, %dst, "null changer: load");
        Ok(())
    }

    async fn unload(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        trace!(%src, %dst, "null changer: unload");
        Ok(())
    }

    async fn transfer(&self, src: Location, dst: Location) -> Result<(), ChangerError> {
        trace!(%src, %dst, "null changer: transfer");
        Ok(())
    }
}
