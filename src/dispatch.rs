//! Request dispatch - the brain of Switchboard.
//!
//! The [`Dispatcher`] routes a decoded [`ActionRequest`] to exactly one
//! transport adapter and normalizes whatever comes back into the uniform
//! envelope plus an HTTP status. One shot per request, no state carried
//! between requests.
//!
//! # Routing
//!
//! ```text
//! ActionRequest (action: "log")
//!     │ route()            -> 400 on unknown action / missing payload
//!     ▼
//! Action::Log(payload)
//!     │ exhaustive match
//!     ▼
//! LogForwarder::{Http | Rpc | Grpc | Bus}   (picked by configuration)
//!     │ invoke()
//!     ▼
//! (202, Envelope) | (401/500, generic failure envelope)
//! ```
//!
//! The dispatcher is the single point mapping classified errors to
//! statuses. It logs the underlying failure in full and never echoes a
//! raw downstream error to the caller.

use crate::action::{Action, ActionRequest, Envelope, LogPayload};
use crate::bus::BusConnection;
use crate::config::{LogTransport, SwitchboardConfig};
use crate::transport::{
    AuthForward, BusPublish, GrpcForward, LogForward, MailForward, RpcForward, Transport,
    TransportError,
};
use axum::http::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Errors that can occur during dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request named an action outside the closed set
    #[error("invalid action '{0}'")]
    InvalidAction(String),

    /// The request named an action but omitted its payload
    #[error("missing {0} payload")]
    MissingPayload(&'static str),

    /// A transport adapter failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Client-facing status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::InvalidAction(_) | DispatchError::MissingPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            DispatchError::Transport(TransportError::Unauthorized) => StatusCode::UNAUTHORIZED,
            DispatchError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Downstream detail stays in the server log.
    fn client_message(&self) -> String {
        match self {
            DispatchError::InvalidAction(_) | DispatchError::MissingPayload(_) => self.to_string(),
            DispatchError::Transport(TransportError::Unauthorized) => "unauthorized".to_string(),
            DispatchError::Transport(TransportError::UnexpectedStatus { service, .. })
            | DispatchError::Transport(TransportError::Downstream { service, .. })
            | DispatchError::Transport(TransportError::Unavailable { service, .. }) => {
                format!("{} error", service)
            }
            DispatchError::Transport(TransportError::Publish(_)) => "message bus error".to_string(),
            DispatchError::Transport(TransportError::Codec(_)) => {
                "request could not be processed".to_string()
            }
        }
    }
}

/// Which adapter carries the "log" action.
///
/// Closed set: the configuration picks a variant at startup, the
/// dispatcher matches it exhaustively.
pub enum LogForwarder {
    Http(LogForward),
    Rpc(RpcForward),
    Grpc(GrpcForward),
    Bus(BusPublish),
}

impl LogForwarder {
    fn name(&self) -> &'static str {
        match self {
            LogForwarder::Http(adapter) => adapter.name(),
            LogForwarder::Rpc(adapter) => adapter.name(),
            LogForwarder::Grpc(adapter) => adapter.name(),
            LogForwarder::Bus(adapter) => adapter.name(),
        }
    }

    async fn invoke(&self, payload: &LogPayload) -> Result<Envelope, TransportError> {
        match self {
            LogForwarder::Http(adapter) => adapter.invoke(payload).await,
            LogForwarder::Rpc(adapter) => adapter.invoke(payload).await,
            LogForwarder::Grpc(adapter) => adapter.invoke(payload).await,
            LogForwarder::Bus(adapter) => adapter.invoke(payload).await,
        }
    }
}

/// Routes validated actions to transport adapters.
pub struct Dispatcher {
    auth: AuthForward,
    mail: MailForward,
    log: LogForwarder,
}

impl Dispatcher {
    /// Build a dispatcher from already-constructed adapters.
    pub fn new(auth: AuthForward, mail: MailForward, log: LogForwarder) -> Self {
        Self { auth, mail, log }
    }

    /// Build a dispatcher from configuration and the process-wide bus
    /// connection.
    pub fn from_config(config: &SwitchboardConfig, connection: Arc<BusConnection>) -> Self {
        let log = match config.dispatch.log_transport {
            LogTransport::Http => LogForwarder::Http(LogForward::new(&config.services.logger_url)),
            LogTransport::Rpc => {
                LogForwarder::Rpc(RpcForward::new(&config.services.logger_rpc_addr))
            }
            LogTransport::Grpc => {
                LogForwarder::Grpc(GrpcForward::new(&config.services.logger_grpc_url))
            }
            LogTransport::Bus => LogForwarder::Bus(BusPublish::new(connection)),
        };

        Self::new(
            AuthForward::new(&config.services.auth_url),
            MailForward::new(&config.services.mail_url),
            log,
        )
    }

    /// Dispatch one request, producing the client-facing status and
    /// envelope.
    pub async fn dispatch(&self, request: ActionRequest) -> (StatusCode, Envelope) {
        match self.run(request).await {
            Ok(envelope) => (StatusCode::ACCEPTED, envelope),
            Err(err) => {
                error!(error = %err, source = ?std::error::Error::source(&err), "dispatch failed");
                (err.status(), Envelope::fail(err.client_message()))
            }
        }
    }

    async fn run(&self, request: ActionRequest) -> Result<Envelope, DispatchError> {
        let action = route(request)?;

        debug!(action = action.name(), "dispatching request");

        let envelope = match &action {
            Action::Auth(payload) => self.auth.invoke(payload).await?,
            Action::Mail(payload) => self.mail.invoke(payload).await?,
            Action::Log(payload) => {
                debug!(transport = self.log.name(), "forwarding log entry");
                self.log.invoke(payload).await?
            }
        };

        info!(action = action.name(), "request dispatched");

        Ok(envelope)
    }
}

/// Validate a wire request into the closed action set.
///
/// Everything after this point is an exhaustive `match`; an unrecognized
/// action never reaches an adapter.
pub fn route(request: ActionRequest) -> Result<Action, DispatchError> {
    match request.action.as_str() {
        "auth" => request
            .auth
            .map(Action::Auth)
            .ok_or(DispatchError::MissingPayload("auth")),
        "log" => request
            .log
            .map(Action::Log)
            .ok_or(DispatchError::MissingPayload("log")),
        "mail" => request
            .mail
            .map(Action::Mail)
            .ok_or(DispatchError::MissingPayload("mail")),
        other => Err(DispatchError::InvalidAction(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AuthPayload;
    use assert_matches::assert_matches;
    use std::io;

    fn request(action: &str) -> ActionRequest {
        ActionRequest {
            action: action.to_string(),
            auth: None,
            log: None,
            mail: None,
        }
    }

    #[test]
    fn test_route_unknown_action() {
        let err = route(request("transmogrify")).unwrap_err();
        assert_matches!(err, DispatchError::InvalidAction(ref name) if name == "transmogrify");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_route_missing_payload() {
        let err = route(request("auth")).unwrap_err();
        assert_matches!(err, DispatchError::MissingPayload("auth"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_route_valid_action() {
        let mut req = request("auth");
        req.auth = Some(AuthPayload {
            email: "admin@example.com".into(),
            password: "verysecret".into(),
        });
        let action = route(req).unwrap();
        assert_matches!(action, Action::Auth(_));
    }

    #[test]
    fn test_status_mapping() {
        let unauthorized = DispatchError::Transport(TransportError::Unauthorized);
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

        let unavailable = DispatchError::Transport(TransportError::unavailable(
            "log service",
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        ));
        assert_eq!(unavailable.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_client_message_hides_downstream_detail() {
        let err = DispatchError::Transport(TransportError::unavailable(
            "authentication service",
            io::Error::new(io::ErrorKind::ConnectionRefused, "secret-internal-hostname"),
        ));

        let message = err.client_message();
        assert_eq!(message, "authentication service error");
        assert!(!message.contains("secret-internal-hostname"));
    }

    #[test]
    fn test_client_message_for_client_errors_is_specific() {
        let err = DispatchError::InvalidAction("transmogrify".into());
        assert_eq!(err.client_message(), "invalid action 'transmogrify'");
    }
}
