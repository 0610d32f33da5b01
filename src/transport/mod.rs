//! Transport adapters behind the dispatcher.
//!
//! Each adapter is one strategy for reaching a backend service and
//! satisfies the same [`Transport`] contract: take the typed payload,
//! return the uniform [`Envelope`] or a classified [`TransportError`].
//!
//! ## Built-in adapters
//!
//! - [`AuthForward`], [`MailForward`], [`LogForward`]: HTTP POST forwards
//! - [`RpcForward`]: framed procedure call over TCP
//! - [`GrpcForward`]: typed unary gRPC call with a bounded deadline
//! - [`BusPublish`]: fire-and-forget publish to the topic exchange

pub mod bus;
pub mod grpc;
pub mod http;
pub mod rpc;

use crate::action::Envelope;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

// Re-export the adapters.
pub use bus::BusPublish;
pub use grpc::GrpcForward;
pub use http::{AuthForward, LogForward, MailForward};
pub use rpc::RpcForward;

/// Human-readable downstream names used in client-facing messages.
pub(crate) const AUTH_SERVICE: &str = "authentication service";
pub(crate) const MAIL_SERVICE: &str = "mail service";
pub(crate) const LOG_SERVICE: &str = "log service";

/// Classified failures shared by every adapter.
///
/// The raw underlying error stays attached as a source for server-side
/// logging; the dispatcher decides what the caller gets to see.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The downstream rejected the credentials (401-equivalent)
    #[error("unauthorized")]
    Unauthorized,

    /// The downstream answered with an unexpected HTTP status
    #[error("{service} answered status {status}")]
    UnexpectedStatus { service: &'static str, status: u16 },

    /// The downstream processed the call and reported a failure
    #[error("{service} reported failure: {detail}")]
    Downstream {
        service: &'static str,
        detail: String,
    },

    /// Dial, I/O, or deadline failure before a usable answer arrived
    #[error("{service} is unreachable: {source}")]
    Unavailable {
        service: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The event could not be handed to the bus channel
    #[error("publish failed: {0}")]
    Publish(#[from] crate::bus::BusError),

    /// Payload (de)serialization failed
    #[error("serialization error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl TransportError {
    pub(crate) fn unavailable(
        service: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Unavailable {
            service,
            source: Box::new(source),
        }
    }
}

/// The adapter contract.
///
/// Implementations must be `Send + Sync`; the dispatcher calls them from
/// per-request tasks. One invocation performs one complete downstream
/// exchange; any connection or channel it opens is closed on every exit
/// path before returning.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The typed payload this adapter carries.
    type Payload: Serialize + Send + Sync;

    /// Short adapter name for logging (e.g. "auth-http", "logger-rpc").
    fn name(&self) -> &'static str;

    /// Perform one downstream exchange.
    async fn invoke(&self, payload: &Self::Payload) -> Result<Envelope, TransportError>;
}
