//! Handler composition for relay events.
//!
//! A [`Handler`] is an async callback over one event type. Cross-cutting
//! behaviour such as dropping the bridge's own messages or logging failures
//! is layered on at registration time by wrapping handlers. Storage retry
//! lives with each storage step in the relays, not here, since a handler
//! may already have called the gateway when its storage fails.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures_util::future::BoxFuture;
use tracing::{error, trace};

use dsbridge_types::events::GatewayMessage;

use crate::gateway::ChatGateway;

pub type Handler<E> = Arc<dyn Fn(E) -> BoxFuture<'static, Result<()>> + Send + Sync>;

pub fn handler<E, F, Fut>(f: F) -> Handler<E>
where
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |event: E| -> BoxFuture<'static, Result<()>> { Box::pin(f(event)) })
}

/// Drop messages authored by the bridge's own gateway account.
pub fn skip_own_messages(
    gateway: Arc<dyn ChatGateway>,
    inner: Handler<GatewayMessage>,
) -> Handler<GatewayMessage> {
    Arc::new(move |message: GatewayMessage| -> BoxFuture<'static, Result<()>> {
        if gateway.self_id() == Some(message.author_id) {
            trace!("Ignoring own gateway message {}", message.id);
            return Box::pin(async { Ok(()) });
        }
        inner(message)
    })
}

/// Log and swallow whatever error `inner` ends with, so one bad event never
/// stops the pump feeding it.
pub fn log_failures<E>(name: &'static str, inner: Handler<E>) -> Handler<E>
where
    E: Debug + Send + 'static,
{
    Arc::new(move |event: E| -> BoxFuture<'static, Result<()>> {
        let summary = format!("{:?}", event);
        let fut = inner(event);
        Box::pin(async move {
            if let Err(e) = fut.await {
                error!(handler = name, event = %summary, "Relay failed: {:#}", e);
            }
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use dsbridge_types::models::{GatewayChannel, OutboundContent};

    struct SelfOnly(i64);

    #[async_trait]
    impl ChatGateway for SelfOnly {
        fn self_id(&self) -> Option<i64> {
            Some(self.0)
        }
        async fn get_channel(&self, _: i64) -> Result<Option<GatewayChannel>> {
            Ok(None)
        }
        async fn send_message(&self, _: &GatewayChannel, _: &OutboundContent) -> Result<i64> {
            anyhow::bail!("not used")
        }
        async fn edit_message(&self, _: &GatewayChannel, _: i64, _: &OutboundContent) -> Result<i64> {
            anyhow::bail!("not used")
        }
        async fn delete_message(&self, _: &GatewayChannel, _: i64) -> Result<()> {
            anyhow::bail!("not used")
        }
    }

    fn message(author_id: i64) -> GatewayMessage {
        GatewayMessage {
            id: 1,
            channel_id: 2,
            author_id,
            content: "hi".into(),
        }
    }

    fn counting(calls: Arc<AtomicU32>) -> Handler<GatewayMessage> {
        handler(move |_message: GatewayMessage| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            }
        })
    }

    #[tokio::test]
    async fn own_messages_never_reach_the_handler() {
        let calls = Arc::new(AtomicU32::new(0));
        let h = skip_own_messages(Arc::new(SelfOnly(99)), counting(calls.clone()));

        h(message(99)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        h(message(7)).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn log_failures_swallows_errors() {
        let failing: Handler<u32> = handler(|_: u32| async { Err::<(), _>(anyhow::anyhow!("boom")) });
        assert!(log_failures("failing", failing)(1).await.is_ok());
    }
}
