//! Broker API - the client-facing entry point.
//!
//! Accepts action requests over HTTP and hands them to the dispatcher.
//! The bus connection is established once at startup; if the bus is
//! unreachable after the capped retries, the process exits rather than
//! serving requests it cannot dispatch.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use switchboard::action::{ActionRequest, Envelope};
use switchboard::bus::BusConnection;
use switchboard::config::SwitchboardConfig;
use switchboard::dispatch::Dispatcher;

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let config = match SwitchboardConfig::load() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let connection = match BusConnection::connect(&config.bus.dsn).await {
        Ok(connection) => connection,
        Err(err) => {
            error!(error = %err, "failed to connect to message bus");
            std::process::exit(1);
        }
    };

    let dispatcher = Arc::new(Dispatcher::from_config(&config, Arc::clone(&connection)));

    let app = Router::new()
        .route("/", get(ping))
        .route("/handle", post(handle_submission))
        .with_state(AppState { dispatcher });

    let addr: SocketAddr = format!("0.0.0.0:{}", config.server.port)
        .parse()
        .expect("invalid listen address");

    info!(%addr, "broker API listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listen address");
    axum::serve(listener, app).await.expect("server error");
}

async fn ping() -> Json<Envelope> {
    Json(Envelope::ok("Hit the broker"))
}

async fn handle_submission(
    State(state): State<AppState>,
    request: Result<Json<ActionRequest>, JsonRejection>,
) -> (StatusCode, Json<Envelope>) {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            warn!(error = %rejection, "rejected malformed request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(Envelope::fail("invalid request body")),
            );
        }
    };

    let request_id = Uuid::new_v4();
    debug!(request_id = %request_id, action = %request.action, "received submission");

    let (status, envelope) = state.dispatcher.dispatch(request).await;

    debug!(
        request_id = %request_id,
        status = status.as_u16(),
        error = envelope.error,
        "submission answered"
    );

    (status, Json(envelope))
}
