//! Message-bus fabric.
//!
//! Three collaborators around one AMQP connection:
//!
//! - [`BusConnection`]: establishes the connection under transient failure
//!   with capped, non-monotonic backoff, then hands out channels
//! - [`Emitter`]: publishes events under a routing key, fire-and-forget
//! - [`Consumer`]: binds a private queue to routing patterns and feeds an
//!   [`EventHandler`]
//!
//! The connection is established once at startup, shared via `Arc`, and
//! never mutated afterwards; a component that detects a dead channel must
//! re-run the connect sequence from scratch.

pub mod connection;
pub mod consumer;
pub mod emitter;

pub use connection::{BusConnection, ConnectError};
pub use consumer::{BusEvent, Consumer, EventHandler, ForwardHandler, HandlerError, LogHandler};
pub use emitter::Emitter;

use crate::LOGS_EXCHANGE;
use lapin::options::ExchangeDeclareOptions;
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};
use thiserror::Error;

/// Failures from emitter and consumer operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Channel open or topology declaration failed
    #[error("channel setup failed: {0}")]
    Setup(#[source] lapin::Error),

    /// The event could not be handed to the channel
    #[error("publish failed: {0}")]
    Publish(#[source] lapin::Error),

    /// The consuming subscription could not be established
    #[error("consume failed: {0}")]
    Consume(#[source] lapin::Error),

    /// The delivery stream produced an error
    #[error("delivery failed: {0}")]
    Delivery(#[source] lapin::Error),

    /// The delivery stream ended: the channel or connection is gone
    #[error("channel closed while listening")]
    ChannelClosed,
}

/// Declare the topic exchange. Safe to repeat: redeclaration with the same
/// properties is a no-op on the broker.
pub(crate) async fn declare_logs_exchange(channel: &Channel) -> Result<(), lapin::Error> {
    channel
        .exchange_declare(
            LOGS_EXCHANGE,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
}
