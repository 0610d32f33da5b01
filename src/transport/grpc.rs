//! Typed gRPC transport for the log sink.
//!
//! Uses tonic for the client and server and prost for message
//! serialization (standard protobuf wire format; the service glue is
//! generated by `build.rs`, no `.proto` file needed).
//!
//! ## RPCs
//!
//! - `WriteLog`: store one log entry. Input = [`LogRequest`], output =
//!   [`LogResponse`].
//!
//! The forwarding side dials per call and bounds the whole exchange with a
//! one-second deadline; the remote side may still complete a call that the
//! client has already abandoned, which callers must tolerate.

use super::{Transport, TransportError, LOG_SERVICE};
use crate::action::{Envelope, LogPayload};
use crate::sink::{LogEntry, LogStore};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info};

// ---------------------------------------------------------------------------
// Message types (prost, standard protobuf wire format)
// ---------------------------------------------------------------------------

#[derive(Clone, prost::Message)]
pub struct Log {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub data: String,
}

#[derive(Clone, prost::Message)]
pub struct LogRequest {
    #[prost(message, optional, tag = "1")]
    pub log_entry: Option<Log>,
}

#[derive(Clone, prost::Message)]
pub struct LogResponse {
    #[prost(string, tag = "1")]
    pub result: String,
}

// ---------------------------------------------------------------------------
// Generated service trait + server/client
// ---------------------------------------------------------------------------

include!(concat!(env!("OUT_DIR"), "/logs.LogService.rs"));

pub use log_service_client::LogServiceClient;
pub use log_service_server::{LogService, LogServiceServer};

// ---------------------------------------------------------------------------
// Forwarding adapter
// ---------------------------------------------------------------------------

/// Deadline covering the dial and the call together.
const CALL_DEADLINE: Duration = Duration::from_secs(1);

/// Forwards a log entry to the log sink with one typed call.
///
/// The connection is opened and dropped per call; call volume is low and
/// simplicity wins over connection reuse.
#[derive(Debug, Clone)]
pub struct GrpcForward {
    endpoint: String,
}

impl GrpcForward {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Transport for GrpcForward {
    type Payload = LogPayload;

    fn name(&self) -> &'static str {
        "logger-grpc"
    }

    async fn invoke(&self, payload: &LogPayload) -> Result<Envelope, TransportError> {
        debug!(endpoint = %self.endpoint, name = %payload.name, "dialing log sink");

        let endpoint = self.endpoint.clone();
        let request = LogRequest {
            log_entry: Some(Log {
                name: payload.name.clone(),
                data: payload.data.clone(),
            }),
        };

        let call = async move {
            let mut client = LogServiceClient::connect(endpoint)
                .await
                .map_err(|err| TransportError::unavailable(LOG_SERVICE, err))?;
            let response = client
                .write_log(request)
                .await
                .map_err(|err| TransportError::unavailable(LOG_SERVICE, err))?;
            Ok::<LogResponse, TransportError>(response.into_inner())
        };

        let response = tokio::time::timeout(CALL_DEADLINE, call)
            .await
            .map_err(|err| TransportError::unavailable(LOG_SERVICE, err))??;

        debug!(result = %response.result, "write-log call completed");

        Ok(Envelope::ok("logged via gRPC"))
    }
}

// ---------------------------------------------------------------------------
// Sink-side service
// ---------------------------------------------------------------------------

/// gRPC handler that writes entries through a [`LogStore`].
pub struct LogServiceHandler<S> {
    store: Arc<S>,
}

impl<S> LogServiceHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl<S: LogStore + 'static> LogService for LogServiceHandler<S> {
    async fn write_log(
        &self,
        request: Request<LogRequest>,
    ) -> Result<Response<LogResponse>, Status> {
        let entry = request
            .into_inner()
            .log_entry
            .ok_or_else(|| Status::invalid_argument("missing log entry"))?;

        match self.store.insert(LogEntry::new(&entry.name, &entry.data)).await {
            Ok(()) => {
                info!(name = %entry.name, "stored log entry via gRPC");
                Ok(Response::new(LogResponse {
                    result: "logged".to_string(),
                }))
            }
            Err(err) => {
                error!(error = %err, name = %entry.name, "failed to store log entry");
                Err(Status::internal("failed to store log entry"))
            }
        }
    }
}

/// Create a `LogServiceServer` over a shared store.
pub fn grpc_server<S: LogStore + 'static>(store: Arc<S>) -> LogServiceServer<LogServiceHandler<S>> {
    LogServiceServer::new(LogServiceHandler::new(store))
}

/// Bind and serve the gRPC contract at the given address.
pub async fn serve_grpc<S: LogStore + 'static>(
    store: Arc<S>,
    addr: SocketAddr,
) -> Result<(), tonic::transport::Error> {
    tonic::transport::Server::builder()
        .add_service(grpc_server(store))
        .serve(addr)
        .await
}
