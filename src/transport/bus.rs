//! Bus-publish adapter: hand the log entry to the topic exchange.

use super::{Transport, TransportError};
use crate::action::{Envelope, LogPayload};
use crate::bus::{BusConnection, Emitter};
use crate::SEVERITY_INFO;
use async_trait::async_trait;
use std::sync::Arc;

/// Publishes log entries to the topic exchange under `log.INFO`.
///
/// Fire-and-forget: a success envelope means the event reached the local
/// channel, not that a consumer persisted it. Callers choosing this
/// transport accept that weaker guarantee.
pub struct BusPublish {
    connection: Arc<BusConnection>,
}

impl BusPublish {
    pub fn new(connection: Arc<BusConnection>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl Transport for BusPublish {
    type Payload = LogPayload;

    fn name(&self) -> &'static str {
        "bus-publish"
    }

    async fn invoke(&self, payload: &LogPayload) -> Result<Envelope, TransportError> {
        // Exchange declaration happens once per call context, and is
        // idempotent on the broker side.
        let emitter = Emitter::new(Arc::clone(&self.connection)).await?;

        let body = serde_json::to_string(payload)?;
        emitter.emit(&body, SEVERITY_INFO).await?;

        Ok(Envelope::ok("logged via AMQP"))
    }
}
