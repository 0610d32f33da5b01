//! Framed procedure calls over TCP.
//!
//! One request, one reply, one connection: the client dials, writes a
//! single newline-delimited JSON request, reads a single newline-delimited
//! JSON reply, and hangs up. The server side accepts connections for the
//! log sink and dispatches on the request's method name.
//!
//! Wire format:
//!
//! ```text
//! -> {"method":"RPCServer.LogInfo","params":{"name":"event","data":"..."}}\n
//! <- {"result":"Processed payload via RPC: event"}\n
//! <- {"error":"unknown method: RPCServer.Bogus"}\n
//! ```

use super::{Transport, TransportError, LOG_SERVICE};
use crate::action::{Envelope, LogPayload};
use crate::sink::{LogEntry, LogStore};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Method name for writing a log entry.
pub const LOG_INFO_METHOD: &str = "RPCServer.LogInfo";

/// Upper bound on a single request line.
const MAX_REQUEST_BYTES: u64 = 64 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct RpcRequest {
    method: String,
    params: Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RpcReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl RpcReply {
    fn result(message: impl Into<String>) -> Self {
        Self {
            result: Some(message.into()),
            ..Self::default()
        }
    }

    fn error(detail: impl Into<String>) -> Self {
        Self {
            error: Some(detail.into()),
            ..Self::default()
        }
    }
}

/// Forwards a log entry to the log service with one framed call.
///
/// Dials per invocation; a failed dial is surfaced immediately with no
/// retry; retrying is the caller's decision.
#[derive(Debug, Clone)]
pub struct RpcForward {
    addr: String,
}

impl RpcForward {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl Transport for RpcForward {
    type Payload = LogPayload;

    fn name(&self) -> &'static str {
        "logger-rpc"
    }

    async fn invoke(&self, payload: &LogPayload) -> Result<Envelope, TransportError> {
        debug!(addr = %self.addr, name = %payload.name, "dialing log service");

        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|err| TransportError::unavailable(LOG_SERVICE, err))?;
        let (reader, mut writer) = stream.into_split();

        let request = RpcRequest {
            method: LOG_INFO_METHOD.to_string(),
            params: serde_json::to_value(payload)?,
        };
        let mut frame = serde_json::to_vec(&request)?;
        frame.push(b'\n');
        writer
            .write_all(&frame)
            .await
            .map_err(|err| TransportError::unavailable(LOG_SERVICE, err))?;

        let mut line = String::new();
        let mut reader = BufReader::new(reader);
        let read = reader
            .read_line(&mut line)
            .await
            .map_err(|err| TransportError::unavailable(LOG_SERVICE, err))?;
        if read == 0 {
            return Err(TransportError::unavailable(
                LOG_SERVICE,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed before reply",
                ),
            ));
        }

        let reply: RpcReply = serde_json::from_str(line.trim())?;
        if let Some(detail) = reply.error {
            return Err(TransportError::Downstream {
                service: LOG_SERVICE,
                detail,
            });
        }

        let message = reply.result.unwrap_or_else(|| "logged".to_string());
        Ok(Envelope::ok(message))
    }
}

/// Accept framed calls for the log sink until the listener fails.
///
/// Each connection is served on its own task; a bad request poisons only
/// its own connection.
pub async fn serve<S: LogStore + 'static>(listener: TcpListener, store: Arc<S>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(peer = %peer, "accepted RPC connection");
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            handle_connection(stream, store).await;
        });
    }
}

async fn handle_connection<S: LogStore>(stream: TcpStream, store: Arc<S>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_BYTES));

    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) => return,
        Ok(_) => {}
        Err(err) => {
            warn!(error = %err, "failed to read RPC request");
            return;
        }
    }

    let reply = match serde_json::from_str::<RpcRequest>(line.trim()) {
        Ok(request) => dispatch_request(request, store.as_ref()).await,
        Err(err) => RpcReply::error(format!("malformed request: {err}")),
    };

    let mut frame = match serde_json::to_vec(&reply) {
        Ok(frame) => frame,
        Err(err) => {
            error!(error = %err, "failed to encode RPC reply");
            return;
        }
    };
    frame.push(b'\n');

    if let Err(err) = writer.write_all(&frame).await {
        warn!(error = %err, "failed to write RPC reply");
    }
}

async fn dispatch_request<S: LogStore>(request: RpcRequest, store: &S) -> RpcReply {
    match request.method.as_str() {
        LOG_INFO_METHOD => {
            let payload: LogPayload = match serde_json::from_value(request.params) {
                Ok(payload) => payload,
                Err(err) => return RpcReply::error(format!("bad params: {err}")),
            };

            match store
                .insert(LogEntry::new(&payload.name, &payload.data))
                .await
            {
                Ok(()) => {
                    info!(name = %payload.name, "stored log entry via RPC");
                    RpcReply::result(format!("Processed payload via RPC: {}", payload.name))
                }
                Err(err) => {
                    error!(error = %err, name = %payload.name, "failed to store log entry");
                    RpcReply::error("failed to store log entry")
                }
            }
        }
        other => RpcReply::error(format!("unknown method: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemoryStore;
    use assert_matches::assert_matches;

    async fn start_server(store: Arc<MemoryStore>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            serve(listener, store).await.ok();
        });
        addr
    }

    #[tokio::test]
    async fn round_trip_stores_entry() {
        let store = Arc::new(MemoryStore::new());
        let addr = start_server(Arc::clone(&store)).await;

        let adapter = RpcForward::new(&addr);
        let payload = LogPayload {
            name: "event".into(),
            data: "user 42 signed in".into(),
        };

        let envelope = adapter.invoke(&payload).await.unwrap();
        assert!(!envelope.error);
        assert_eq!(envelope.message, "Processed payload via RPC: event");

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "event");
        assert_eq!(entries[0].data, "user 42 signed in");
    }

    #[tokio::test]
    async fn unknown_method_surfaces_error_reply() {
        let store = Arc::new(MemoryStore::new());
        let addr = start_server(store).await;

        // Hand-roll a request with a bogus method name.
        let stream = TcpStream::connect(&addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer
            .write_all(b"{\"method\":\"RPCServer.Bogus\",\"params\":{}}\n")
            .await
            .unwrap();
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();

        let reply: RpcReply = serde_json::from_str(line.trim()).unwrap();
        assert_eq!(reply.error.unwrap(), "unknown method: RPCServer.Bogus");
    }

    #[tokio::test]
    async fn dial_failure_is_unavailable() {
        // Bind a listener to grab a free port, then drop it so the dial is
        // refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let adapter = RpcForward::new(&addr);
        let payload = LogPayload {
            name: "event".into(),
            data: "x".into(),
        };

        let err = adapter.invoke(&payload).await.unwrap_err();
        assert_matches!(err, TransportError::Unavailable { .. });
    }
}
