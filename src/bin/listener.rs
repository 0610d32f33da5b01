//! Bus listener - consumes log events from the topic exchange.
//!
//! Binds a private queue to the `log.*` severity keys and hands every
//! delivery to a handler: structured logging by default, or an HTTP
//! forward to the log service when `[listener] forward = true`.
//!
//! ## Configuration
//!
//! Environment variables:
//! - `SWITCHBOARD_CONFIG`: config file path (default: "config/switchboard.toml")
//! - `RUST_LOG`: logging level (default: "info")

use std::sync::Arc;
use tracing::{error, info, warn};

use switchboard::bus::{BusConnection, Consumer, EventHandler, ForwardHandler, LogHandler};
use switchboard::config::SwitchboardConfig;
use switchboard::{SEVERITY_ERROR, SEVERITY_INFO, SEVERITY_WARNING};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let config = match SwitchboardConfig::load() {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "failed to load config, using defaults");
            SwitchboardConfig::default()
        }
    };

    let connection = match BusConnection::connect(&config.bus.dsn).await {
        Ok(connection) => connection,
        Err(err) => {
            error!(error = %err, "failed to connect to message bus");
            std::process::exit(1);
        }
    };

    let consumer = match Consumer::new(Arc::clone(&connection)).await {
        Ok(consumer) => consumer,
        Err(err) => {
            error!(error = %err, "failed to set up consumer");
            std::process::exit(1);
        }
    };

    let handler: Box<dyn EventHandler> = if config.listener.forward {
        info!(logger_url = %config.services.logger_url, "forwarding events to log service");
        Box::new(ForwardHandler::new(&config.services.logger_url))
    } else {
        Box::new(LogHandler)
    };

    let patterns = [SEVERITY_INFO, SEVERITY_ERROR, SEVERITY_WARNING];
    info!(?patterns, "listener starting");

    tokio::select! {
        result = consumer.listen(&patterns, handler.as_ref()) => {
            if let Err(err) = result {
                error!(error = %err, "listener stopped");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping listener");
        }
    }

    if let Err(err) = connection.close().await {
        warn!(error = %err, "failed to close bus connection");
    }
}
