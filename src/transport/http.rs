//! HTTP forwards to the authentication, mail, and log services.
//!
//! Each forward POSTs the payload as JSON and expects 202 Accepted. The
//! auth forward additionally understands 401 and the downstream's own
//! envelope, translating both into a semantic authentication failure
//! rather than a generic server error.

use super::{Transport, TransportError, AUTH_SERVICE, LOG_SERVICE, MAIL_SERVICE};
use crate::action::{AuthPayload, Envelope, LogPayload, MailPayload};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for downstream HTTP requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Forwards credentials to the authentication service.
#[derive(Debug, Clone)]
pub struct AuthForward {
    url: String,
    client: Client,
}

impl AuthForward {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Transport for AuthForward {
    type Payload = AuthPayload;

    fn name(&self) -> &'static str {
        "auth-http"
    }

    async fn invoke(&self, payload: &AuthPayload) -> Result<Envelope, TransportError> {
        debug!(url = %self.url, email = %payload.email, "forwarding credentials");

        let response = self
            .client
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|err| TransportError::unavailable(AUTH_SERVICE, err))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TransportError::Unauthorized);
        }
        if status != StatusCode::ACCEPTED {
            return Err(TransportError::UnexpectedStatus {
                service: AUTH_SERVICE,
                status: status.as_u16(),
            });
        }

        let downstream: Envelope = response
            .json()
            .await
            .map_err(|err| TransportError::unavailable(AUTH_SERVICE, err))?;

        // A 202 whose body still flags an error is a failed login, not a
        // broken service.
        if downstream.error {
            return Err(TransportError::Unauthorized);
        }

        info!(email = %payload.email, "authenticated");

        let mut envelope = Envelope::ok("Authenticated");
        envelope.data = downstream.data;
        Ok(envelope)
    }
}

/// Forwards an outbound mail request to the mail service.
#[derive(Debug, Clone)]
pub struct MailForward {
    url: String,
    client: Client,
}

impl MailForward {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Transport for MailForward {
    type Payload = MailPayload;

    fn name(&self) -> &'static str {
        "mail-http"
    }

    async fn invoke(&self, payload: &MailPayload) -> Result<Envelope, TransportError> {
        debug!(url = %self.url, to = %payload.to, "forwarding mail request");

        let response = self
            .client
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|err| TransportError::unavailable(MAIL_SERVICE, err))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            return Err(TransportError::UnexpectedStatus {
                service: MAIL_SERVICE,
                status: status.as_u16(),
            });
        }

        info!(to = %payload.to, "mail accepted");

        Ok(Envelope::ok(format!("Message sent to {}", payload.to)))
    }
}

/// Forwards a log entry to the log service over HTTP.
#[derive(Debug, Clone)]
pub struct LogForward {
    url: String,
    client: Client,
}

impl LogForward {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Transport for LogForward {
    type Payload = LogPayload;

    fn name(&self) -> &'static str {
        "logger-http"
    }

    async fn invoke(&self, payload: &LogPayload) -> Result<Envelope, TransportError> {
        debug!(url = %self.url, name = %payload.name, "forwarding log entry");

        let response = self
            .client
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(payload)
            .send()
            .await
            .map_err(|err| TransportError::unavailable(LOG_SERVICE, err))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            return Err(TransportError::UnexpectedStatus {
                service: LOG_SERVICE,
                status: status.as_u16(),
            });
        }

        Ok(Envelope::ok("logged"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_names() {
        assert_eq!(AuthForward::new("http://a/authenticate").name(), "auth-http");
        assert_eq!(MailForward::new("http://m/send").name(), "mail-http");
        assert_eq!(LogForward::new("http://l/log").name(), "logger-http");
    }
}
