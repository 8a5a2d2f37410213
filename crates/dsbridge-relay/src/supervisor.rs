// ============================================================================
// Backend Connection Supervisor
// ============================================================================
//
// Owns the backend socket for the lifetime of the process:
//
//   Disconnected -> Connecting -> Connected -> (session ends) -> Disconnected
//        ^                |
//        +-- sleep(interval) on failure or after a session ends
//
// Every attempt derives fresh credentials. While Connected the session's
// outgoing queue is attached to the shared BackendLink and incoming events
// are handed to the backend handler one at a time, in arrival order.
//
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use dsbridge_types::events::Inbound;

use crate::auth::Credentials;
use crate::connector::Connector;
use crate::link::BackendLink;
use crate::middleware::Handler;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

pub struct Supervisor {
    connector: Arc<dyn Connector>,
    secret: String,
    reconnect_interval: Duration,
    link: BackendLink,
    handler: Handler<Inbound>,
    state: watch::Sender<ConnectionState>,
}

impl Supervisor {
    pub fn new(
        connector: Arc<dyn Connector>,
        secret: impl Into<String>,
        link: BackendLink,
        handler: Handler<Inbound>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connector,
            secret: secret.into(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            link,
            handler,
            state,
        }
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Follow state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Connect, serve, and reconnect forever.
    pub async fn run(self) {
        info!(
            "Backend supervisor started (reconnect every {:?})",
            self.reconnect_interval
        );
        loop {
            match self.run_once().await {
                Ok(()) => info!("Backend session ended"),
                Err(e) => error!("Backend connection failed: {:#}", e),
            }
            self.set_state(ConnectionState::Disconnected);
            tokio::time::sleep(self.reconnect_interval).await;
        }
    }

    /// One connection attempt. Returns once the session ends; the caller
    /// decides whether to try again.
    pub async fn run_once(&self) -> Result<()> {
        self.set_state(ConnectionState::Connecting);

        let credentials = Credentials::derive(&self.secret, Utc::now())?;
        let session = self.connector.connect(&credentials).await?;

        self.link.attach(session.outgoing)?;
        self.set_state(ConnectionState::Connected);
        info!("Connected to backend");

        let mut incoming = session.incoming;
        while let Some(inbound) = incoming.recv().await {
            if let Err(e) = (self.handler)(inbound).await {
                error!("Backend event handling failed: {:#}", e);
            }
        }

        if let Err(e) = self.link.detach() {
            warn!("Could not detach backend link: {}", e);
        }
        Ok(())
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            info!("Backend connection: {:?} -> {:?}", current, next);
            *current = next;
            true
        });
    }
}
