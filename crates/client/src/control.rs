//! Control channel between application instances and the gateway.
//!
//! Messages are `{"type": "SKIP_WAITING" | "GET_VERSION" | "CLEAR_CACHE"}`.
//! Each carries its own reply port; replies are never broadcast. A
//! malformed message is logged and dropped without a reply, so callers
//! must bound their wait.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use waypost_core::Error;

use crate::lifecycle::Lifecycle;

/// Recognized control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    SkipWaiting,
    GetVersion,
    ClearCache,
}

/// Replies sent back on the message's reply port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    Activated { version: Option<String> },
    Version { version: Option<String>, cache: Option<String> },
    CacheCleared { deleted: u64 },
}

/// A message and the port its reply goes to.
#[derive(Debug)]
pub struct Envelope {
    pub message: serde_json::Value,
    pub reply: oneshot::Sender<ControlReply>,
}

/// Executes control messages against the lifecycle.
#[derive(Clone)]
pub struct ControlChannel {
    lifecycle: Arc<Lifecycle>,
}

impl ControlChannel {
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    pub fn parse(message: &serde_json::Value) -> Result<ControlMessage, Error> {
        ControlMessage::deserialize(message).map_err(|e| Error::InvalidMessage(e.to_string()))
    }

    /// Run a message to completion.
    pub async fn execute(&self, message: ControlMessage) -> Result<ControlReply, Error> {
        match message {
            ControlMessage::SkipWaiting => {
                let version = self.lifecycle.skip_waiting().await?;
                Ok(ControlReply::Activated { version })
            }
            ControlMessage::GetVersion => {
                let names = self.lifecycle.active_names().await;
                Ok(ControlReply::Version {
                    version: names.as_ref().map(|n| n.version.clone()),
                    cache: names.map(|n| n.static_name),
                })
            }
            ControlMessage::ClearCache => {
                let deleted = self.lifecycle.db().purge_all().await?;
                tracing::info!(deleted, "all cache generations purged");
                Ok(ControlReply::CacheCleared { deleted })
            }
        }
    }

    /// Handle one envelope; the reply is sent only once the action completed.
    pub async fn handle(&self, envelope: Envelope) {
        let message = match Self::parse(&envelope.message) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, payload = %envelope.message, "ignoring malformed control message");
                return;
            }
        };

        match self.execute(message).await {
            Ok(reply) => {
                if envelope.reply.send(reply).is_err() {
                    tracing::debug!(?message, "control reply port closed");
                }
            }
            Err(e) => tracing::error!(?message, error = %e, "control message failed"),
        }
    }

    /// Process envelopes one at a time on a background task.
    pub fn spawn(self) -> ControlHandle {
        let (tx, mut rx) = mpsc::channel::<Envelope>(32);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                self.handle(envelope).await;
            }
            tracing::debug!("control channel closed");
        });
        ControlHandle { tx }
    }
}

/// Sending side of a spawned control channel.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<Envelope>,
}

impl ControlHandle {
    /// Post a message and get its reply port.
    pub async fn post(&self, message: serde_json::Value) -> Result<oneshot::Receiver<ControlReply>, Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { message, reply })
            .await
            .map_err(|_| Error::NoReply("control channel closed".into()))?;
        Ok(rx)
    }

    /// Post a message and wait up to `timeout` for its reply.
    pub async fn request(&self, message: serde_json::Value, timeout: Duration) -> Result<ControlReply, Error> {
        let rx = self.post(message).await?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Error::NoReply("message was not answered".into())),
            Err(_) => Err(Error::NoReply(format!("no reply within {}ms", timeout.as_millis()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::tests::{config, manifest_network};
    use serde_json::json;
    use waypost_core::CacheDb;

    async fn channel() -> (ControlChannel, Arc<Lifecycle>) {
        let lifecycle = Arc::new(Lifecycle::new(CacheDb::open_in_memory().await.unwrap(), manifest_network()));
        lifecycle.install(&config("v1")).await.unwrap();
        (ControlChannel::new(lifecycle.clone()), lifecycle)
    }

    #[test]
    fn test_parse_messages() {
        assert_eq!(ControlChannel::parse(&json!({"type": "SKIP_WAITING"})).unwrap(), ControlMessage::SkipWaiting);
        assert_eq!(ControlChannel::parse(&json!({"type": "GET_VERSION"})).unwrap(), ControlMessage::GetVersion);
        assert_eq!(ControlChannel::parse(&json!({"type": "CLEAR_CACHE"})).unwrap(), ControlMessage::ClearCache);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for message in [json!({"type": "REBOOT"}), json!({"kind": "GET_VERSION"}), json!("GET_VERSION"), json!(null)] {
            assert!(matches!(ControlChannel::parse(&message), Err(Error::InvalidMessage(_))), "{message}");
        }
    }

    #[test]
    fn test_reply_wire_format() {
        let reply = ControlReply::Version { version: Some("v1".into()), cache: Some("waypost-static-v1".into()) };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"type": "VERSION", "version": "v1", "cache": "waypost-static-v1"})
        );
    }

    #[tokio::test]
    async fn test_get_version() {
        let (channel, _) = channel().await;
        let reply = channel.execute(ControlMessage::GetVersion).await.unwrap();
        assert_eq!(
            reply,
            ControlReply::Version { version: Some("v1".into()), cache: Some("waypost-static-v1".into()) }
        );
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_waiting_version() {
        let (channel, lifecycle) = channel().await;
        lifecycle.open_client("http://localhost:3000/").await;
        lifecycle.install(&config("v2")).await.unwrap();
        assert_eq!(lifecycle.active_version().await.as_deref(), Some("v1"));

        let handle = channel.spawn();
        let reply = handle.request(json!({"type": "SKIP_WAITING"}), Duration::from_secs(5)).await.unwrap();
        assert_eq!(reply, ControlReply::Activated { version: Some("v2".into()) });
        assert_eq!(lifecycle.active_version().await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_clear_cache_replies_after_purge() {
        let (channel, lifecycle) = channel().await;
        let handle = channel.spawn();

        let rx = handle.post(json!({"type": "CLEAR_CACHE"})).await.unwrap();
        let reply = rx.await.unwrap();
        assert_eq!(reply, ControlReply::CacheCleared { deleted: 1 });
        assert!(lifecycle.db().list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_gets_no_reply() {
        let (channel, _) = channel().await;
        let handle = channel.spawn();

        let result = handle.request(json!({"type": "NOPE"}), Duration::from_millis(200)).await;
        assert!(matches!(result, Err(Error::NoReply(_))));

        let reply = handle.request(json!({"type": "GET_VERSION"}), Duration::from_secs(5)).await;
        assert!(reply.is_ok());
    }
}
