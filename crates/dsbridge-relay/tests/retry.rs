mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use dsbridge_db::{Database, RetryPolicy};
use dsbridge_relay::{BackendLink, BackendRelay, ChatGateway};
use dsbridge_types::events::{BackendEvent, Inbound};
use dsbridge_types::models::{GatewayChannel, OutboundContent};

use support::{CHANNEL, Call, FIRST_GATEWAY_ID, FakeGateway, insert_backend_message};

/// Sends through a [`FakeGateway`], but the first send also starts a write
/// transaction on another session and keeps it open for `hold`, so the
/// store is busy right after the message went out.
struct LockingGateway {
    inner: FakeGateway,
    other: Mutex<Option<Database>>,
    hold: Duration,
}

#[async_trait]
impl ChatGateway for LockingGateway {
    fn self_id(&self) -> Option<i64> {
        self.inner.self_id()
    }

    async fn get_channel(&self, channel_id: i64) -> Result<Option<GatewayChannel>> {
        self.inner.get_channel(channel_id).await
    }

    async fn send_message(&self, channel: &GatewayChannel, content: &OutboundContent) -> Result<i64> {
        let other = self.other.lock().unwrap().take();
        if let Some(other) = other {
            let (locked_tx, locked_rx) = oneshot::channel();
            let hold = self.hold;
            tokio::task::spawn_blocking(move || {
                other
                    .transact(|_| {
                        let _ = locked_tx.send(());
                        std::thread::sleep(hold);
                        Ok(())
                    })
                    .unwrap();
            });
            locked_rx.await?;
        }
        self.inner.send_message(channel, content).await
    }

    async fn edit_message(
        &self,
        channel: &GatewayChannel,
        message_id: i64,
        content: &OutboundContent,
    ) -> Result<i64> {
        self.inner.edit_message(channel, message_id, content).await
    }

    async fn delete_message(&self, channel: &GatewayChannel, message_id: i64) -> Result<()> {
        self.inner.delete_message(channel, message_id).await
    }
}

#[tokio::test]
async fn busy_store_after_send_does_not_send_twice() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");
    let db = Database::open(&path).unwrap();
    db.set_busy_timeout(Duration::from_millis(20)).unwrap();
    let id = insert_backend_message(&db, Some(CHANNEL), "Grace", "from the site");

    let gateway = Arc::new(LockingGateway {
        inner: FakeGateway::new([CHANNEL]),
        other: Mutex::new(Some(Database::open(&path).unwrap())),
        hold: Duration::from_millis(150),
    });
    let link = BackendLink::new();
    let (tx, mut emitted) = mpsc::unbounded_channel();
    link.attach(tx).unwrap();

    let relay = BackendRelay::new(db.clone(), gateway.clone(), link).with_retry_policy(RetryPolicy {
        max_attempts: 3,
        pause: Duration::from_millis(300),
    });
    relay.handler()(Inbound::Event(BackendEvent::NewMessage { message_id: id }))
        .await
        .unwrap();

    assert_eq!(
        gateway.inner.calls(),
        vec![Call::Send {
            channel: CHANNEL,
            content: OutboundContent::new("Grace", "from the site"),
        }]
    );
    let row = db.transact(move |uow| uow.require_message(id)).unwrap();
    assert_eq!(row.origin_message_id, Some(FIRST_GATEWAY_ID));
    assert_eq!(emitted.try_recv().unwrap(), BackendEvent::NewMessage { message_id: id });
}
