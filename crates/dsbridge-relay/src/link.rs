use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use dsbridge_types::events::BackendEvent;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("backend channel is not connected")]
    Disconnected,
    #[error("backend link lock poisoned")]
    Poisoned,
}

/// Emitter half of the backend channel, shared by both relay directions.
///
/// The supervisor attaches the outgoing queue of each live session and
/// detaches it when the session ends. Emits are fire-and-forget: they are
/// queued for the session's writer and never wait for an acknowledgement.
#[derive(Clone, Default)]
pub struct BackendLink {
    inner: Arc<RwLock<Option<mpsc::UnboundedSender<BackendEvent>>>>,
}

impl BackendLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, outgoing: mpsc::UnboundedSender<BackendEvent>) -> Result<(), LinkError> {
        let mut slot = self.inner.write().map_err(|_| LinkError::Poisoned)?;
        *slot = Some(outgoing);
        debug!("Backend link attached");
        Ok(())
    }

    pub fn detach(&self) -> Result<(), LinkError> {
        let mut slot = self.inner.write().map_err(|_| LinkError::Poisoned)?;
        if slot.take().is_some() {
            debug!("Backend link detached");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .read()
            .map(|slot| slot.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    /// Queue `event` for the backend. Fails with [`LinkError::Disconnected`]
    /// when no session is attached or its writer has gone away.
    pub fn emit(&self, event: BackendEvent) -> Result<(), LinkError> {
        let slot = self.inner.read().map_err(|_| LinkError::Poisoned)?;
        let tx = slot.as_ref().ok_or(LinkError::Disconnected)?;
        tx.send(event).map_err(|_| LinkError::Disconnected)?;
        trace!("Queued {} for backend", event.kind());
        Ok(())
    }
}
