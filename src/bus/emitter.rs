//! Event emitter: publish under a routing key, fire-and-forget.

use super::{declare_logs_exchange, BusConnection, BusError};
use crate::LOGS_EXCHANGE;
use lapin::options::BasicPublishOptions;
use lapin::BasicProperties;
use std::sync::Arc;
use tracing::{debug, warn};

/// Publishes events to the topic exchange.
///
/// Each publish opens and closes its own channel, so a failed publish
/// never corrupts state shared with other callers.
pub struct Emitter {
    connection: Arc<BusConnection>,
}

impl Emitter {
    /// Build an emitter, declaring the exchange on a throwaway channel.
    pub async fn new(connection: Arc<BusConnection>) -> Result<Self, BusError> {
        let channel = connection.open_channel().await.map_err(BusError::Setup)?;
        declare_logs_exchange(&channel).await.map_err(BusError::Setup)?;
        close_channel(&channel, "setup complete").await;

        Ok(Self { connection })
    }

    /// Publish one event body under a routing key.
    ///
    /// Fire-and-forget: a successful return means the event was handed to
    /// the local channel, not that the broker or any consumer persisted
    /// it. Only channel/connection-level failures surface here.
    pub async fn emit(&self, body: &str, routing_key: &str) -> Result<(), BusError> {
        let channel = self
            .connection
            .open_channel()
            .await
            .map_err(BusError::Setup)?;

        debug!(routing_key, bytes = body.len(), "publishing event");

        let published = channel
            .basic_publish(
                LOGS_EXCHANGE,
                routing_key,
                BasicPublishOptions::default(),
                body.as_bytes(),
                BasicProperties::default().with_content_type("text/plain".into()),
            )
            .await
            .map(|_confirm| ())
            .map_err(BusError::Publish);

        close_channel(&channel, "publish complete").await;

        published
    }
}

async fn close_channel(channel: &lapin::Channel, reason: &str) {
    // Reply code 200 is a clean close.
    if let Err(err) = channel.close(200, reason).await {
        warn!(error = %err, "failed to close channel");
    }
}
