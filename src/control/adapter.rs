//! `CallControlAdapter`: the boundary to the external PBX/call-control
//! system. Operation shapes only — a real adapter (Asterisk ARI, FreeSWITCH
//! ESL, whatever the deployment uses) is out of scope; this crate ships a
//! logging no-op so the rest of the system has something to call.

use async_trait::async_trait;

/// Errors a call-control adapter implementation may return.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("call-control request failed: {0}")]
    Request(String),
}

/// The operations the bridge's core relies on from a call-control system,
/// independent of which PBX/signalling stack backs it.
#[async_trait]
pub trait CallControlAdapter: Send + Sync {
    /// Creates a mixing bridge for a call.
    async fn create_bridge(&self, bridge_id: &str) -> Result<(), AdapterError>;

    /// Creates an external-media channel carrying `session_uuid` through
    /// the media `data` field, so the PBX's RTP leg can be correlated back
    /// to this bridge's session once it arrives.
    async fn create_external_media_channel(
        &self,
        channel_id: &str,
        session_uuid: &str,
    ) -> Result<(), AdapterError>;

    /// Answers an inbound channel.
    async fn answer_channel(&self, channel_id: &str) -> Result<(), AdapterError>;

    /// Adds a channel to a bridge.
    async fn add_channel_to_bridge(&self, bridge_id: &str, channel_id: &str) -> Result<(), AdapterError>;

    /// Hangs up a channel.
    async fn hangup_channel(&self, channel_id: &str) -> Result<(), AdapterError>;

    /// Deletes a bridge.
    async fn delete_bridge(&self, bridge_id: &str) -> Result<(), AdapterError>;
}

/// Default adapter: logs every call and succeeds unconditionally. Used when
/// no real call-control integration has been wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallControlAdapter;

#[async_trait]
impl CallControlAdapter for NoopCallControlAdapter {
    async fn create_bridge(&self, bridge_id: &str) -> Result<(), AdapterError> {
        tracing::info!(bridge_id, "noop adapter: create_bridge");
        Ok(())
    }

    async fn create_external_media_channel(
        &self,
        channel_id: &str,
        session_uuid: &str,
    ) -> Result<(), AdapterError> {
        tracing::info!(channel_id, session_uuid, "noop adapter: create_external_media_channel");
        Ok(())
    }

    async fn answer_channel(&self, channel_id: &str) -> Result<(), AdapterError> {
        tracing::info!(channel_id, "noop adapter: answer_channel");
        Ok(())
    }

    async fn add_channel_to_bridge(&self, bridge_id: &str, channel_id: &str) -> Result<(), AdapterError> {
        tracing::info!(bridge_id, channel_id, "noop adapter: add_channel_to_bridge");
        Ok(())
    }

    async fn hangup_channel(&self, channel_id: &str) -> Result<(), AdapterError> {
        tracing::info!(channel_id, "noop adapter: hangup_channel");
        Ok(())
    }

    async fn delete_bridge(&self, bridge_id: &str) -> Result<(), AdapterError> {
        tracing::info!(bridge_id, "noop adapter: delete_bridge");
        Ok(())
    }
}
