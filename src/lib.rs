//! # Switchboard
//!
//! A protocol-multiplexing dispatch service: one client-facing HTTP API
//! accepts a small fixed set of actions ("auth", "log", "mail") and
//! forwards each to the right backend over one of four transports:
//! synchronous HTTP, a framed procedure call over TCP, a typed gRPC call,
//! or fire-and-forget publish to an AMQP topic exchange.
//!
//! ## Architecture
//!
//! ```text
//! Client -> HTTP API -> Dispatcher -> auth service   (HTTP)
//!                                  -> mail service   (HTTP)
//!                                  -> log service    (HTTP | TCP RPC | gRPC)
//!                                  -> logs_topic     (AMQP publish)
//!                                        |
//!                                        v
//!                                     listener -> handler
//! ```
//!
//! ## Modules
//!
//! - [`action`]: wire types shared by the API and the adapters
//! - [`dispatch`]: routing and response normalization
//! - [`transport`]: the transport adapters behind the dispatcher
//! - [`bus`]: connection resilience, emitter, and consumer for the bus
//! - [`sink`]: the persistence seam behind the log sink servers
//! - [`config`]: file/environment configuration

pub mod action;
pub mod bus;
pub mod config;
pub mod dispatch;
pub mod sink;
pub mod transport;

// Re-export the types most callers touch.
pub use action::{ActionRequest, Envelope};
pub use dispatch::Dispatcher;

/// Topic exchange carrying log events.
pub const LOGS_EXCHANGE: &str = "logs_topic";

/// Routing key for informational log events.
pub const SEVERITY_INFO: &str = "log.INFO";

/// Routing key for error log events.
pub const SEVERITY_ERROR: &str = "log.ERROR";

/// Routing key for warning log events.
pub const SEVERITY_WARNING: &str = "log.WARNING";
