//! Event consumer: a private queue bound to routing patterns, feeding a
//! pluggable handler.
//!
//! The receive loop never exits on a single bad message: handler
//! failures are logged and the loop keeps draining. It only returns when
//! the underlying channel or connection dies, at which point the caller
//! decides whether to re-run the connect sequence.

use super::{declare_logs_exchange, BusConnection, BusError};
use crate::action::LogPayload;
use crate::transport::{LogForward, Transport, TransportError};
use crate::LOGS_EXCHANGE;
use async_trait::async_trait;
use lapin::options::{BasicConsumeOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use std::sync::Arc;
use thiserror::Error;
use tokio_stream::StreamExt;
use tracing::{info, warn};

/// One delivered event, opaque at the bus layer.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub routing_key: String,
    pub body: Vec<u8>,
}

/// Errors from event handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed event body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What the consumer does with each delivered event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Short handler name for logging.
    fn name(&self) -> &'static str;

    /// Handle one delivery. Errors are logged by the receive loop and do
    /// not stop it.
    async fn handle(&self, event: &BusEvent) -> Result<(), HandlerError>;
}

/// Structured-logs each event. The baseline handler.
pub struct LogHandler;

#[async_trait]
impl EventHandler for LogHandler {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn handle(&self, event: &BusEvent) -> Result<(), HandlerError> {
        info!(
            routing_key = %event.routing_key,
            body = %String::from_utf8_lossy(&event.body),
            "received event"
        );
        Ok(())
    }
}

/// Decodes each event as a log payload and forwards it to the log service
/// over HTTP.
pub struct ForwardHandler {
    forward: LogForward,
}

impl ForwardHandler {
    pub fn new(logger_url: impl Into<String>) -> Self {
        Self {
            forward: LogForward::new(logger_url),
        }
    }
}

#[async_trait]
impl EventHandler for ForwardHandler {
    fn name(&self) -> &'static str {
        "forward"
    }

    async fn handle(&self, event: &BusEvent) -> Result<(), HandlerError> {
        let payload: LogPayload = serde_json::from_slice(&event.body)?;
        self.forward.invoke(&payload).await?;
        Ok(())
    }
}

/// Consumes events from the topic exchange.
pub struct Consumer {
    connection: Arc<BusConnection>,
}

impl Consumer {
    /// Build a consumer, declaring the exchange on a throwaway channel.
    pub async fn new(connection: Arc<BusConnection>) -> Result<Self, BusError> {
        let channel = connection.open_channel().await.map_err(BusError::Setup)?;
        declare_logs_exchange(&channel).await.map_err(BusError::Setup)?;
        if let Err(err) = channel.close(200, "setup complete").await {
            warn!(error = %err, "failed to close setup channel");
        }

        Ok(Self { connection })
    }

    /// Bind a private queue to the given patterns and drain it forever.
    ///
    /// Returns only when the channel or connection dies.
    pub async fn listen(
        &self,
        patterns: &[&str],
        handler: &dyn EventHandler,
    ) -> Result<(), BusError> {
        let channel = self
            .connection
            .open_channel()
            .await
            .map_err(BusError::Setup)?;

        // Server-named, exclusive, auto-delete: the queue lives exactly as
        // long as this consumer.
        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(BusError::Setup)?;

        for pattern in patterns {
            channel
                .queue_bind(
                    queue.name().as_str(),
                    LOGS_EXCHANGE,
                    pattern,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(BusError::Setup)?;
            info!(queue = %queue.name(), pattern, "bound routing pattern");
        }

        let mut deliveries = channel
            .basic_consume(
                queue.name().as_str(),
                &consumer_tag(),
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(BusError::Consume)?;

        info!(queue = %queue.name(), handler = handler.name(), "waiting for events");

        while let Some(delivery) = deliveries.next().await {
            let delivery = delivery.map_err(BusError::Delivery)?;
            let event = BusEvent {
                routing_key: delivery.routing_key.as_str().to_string(),
                body: delivery.data,
            };

            if let Err(err) = handler.handle(&event).await {
                warn!(
                    handler = handler.name(),
                    routing_key = %event.routing_key,
                    error = %err,
                    "event handler failed"
                );
            }
        }

        Err(BusError::ChannelClosed)
    }
}

/// Consumer tag from the hostname, unique-ish fallback otherwise.
fn consumer_tag() -> String {
    if let Ok(hostname) = hostname::get() {
        if let Some(name) = hostname.to_str() {
            return format!("listener-{}", name);
        }
    }

    format!("listener-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Envelope;
    use assert_matches::assert_matches;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    fn event(routing_key: &str, body: &str) -> BusEvent {
        BusEvent {
            routing_key: routing_key.to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_log_handler_accepts_any_body() {
        let handler = LogHandler;
        let result = handler.handle(&event("log.INFO", "not even json")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_forward_handler_rejects_malformed_body() {
        let handler = ForwardHandler::new("http://localhost:1/log");
        let err = handler
            .handle(&event("log.INFO", "{\"nope\":true}"))
            .await
            .unwrap_err();
        assert_matches!(err, HandlerError::Malformed(_));
    }

    #[tokio::test]
    async fn test_forward_handler_posts_payload() {
        let app = Router::new().route(
            "/log",
            post(|Json(payload): Json<LogPayload>| async move {
                assert_eq!(payload.name, "event");
                (StatusCode::ACCEPTED, Json(Envelope::ok("logged")))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let handler = ForwardHandler::new(format!("http://{addr}/log"));
        let body = serde_json::to_string(&LogPayload {
            name: "event".into(),
            data: "payload".into(),
        })
        .unwrap();

        handler.handle(&event("log.INFO", &body)).await.unwrap();
    }

    #[test]
    fn test_consumer_tag_prefix() {
        assert!(consumer_tag().starts_with("listener-"));
    }
}
