//! Server-Sent Events transport.

use crate::error::{connect_failure, Error};
use crate::transport::{Transport, TransportConnection, TransportEvent};
use async_trait::async_trait;
use eventsource_client::{self as es, Client};
use futures_util::stream::{BoxStream, StreamExt};
use log::*;
use serde::Deserialize;
use serde_json::Value;

/// Event name a server may send first to hand out the session identifier.
pub const HANDSHAKE_EVENT: &str = "connected";

type SseStream = BoxStream<'static, Result<es::SSE, es::Error>>;

#[derive(Deserialize)]
struct Handshake {
    session_id: Option<String>,
}

/// [`Transport`] over a long-lived SSE stream.
///
/// The client's own reconnection is disabled; retries belong to the
/// Connection Manager.
pub struct SseTransport {
    url: String,
    auth_token: Option<String>,
}

impl SseTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every connect.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_client(&self) -> Result<impl Client, Error> {
        let mut builder = es::ClientBuilder::for_url(&self.url)?;
        if let Some(token) = &self.auth_token {
            builder = builder.header("Authorization", &format!("Bearer {}", token))?;
        }

        Ok(builder
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build())
    }
}

#[async_trait]
impl Transport for SseTransport {
    type Connection = SseConnection;

    async fn connect(&self) -> Result<SseConnection, Error> {
        debug!("Opening SSE stream to {}", self.url);
        let mut stream: SseStream = self.build_client()?.stream();

        // The stream is open once the server sends its first frame
        match stream.next().await {
            Some(Ok(es::SSE::Event(event))) if event.event_type == HANDSHAKE_EVENT => {
                Ok(SseConnection {
                    stream,
                    session_id: parse_session_id(&event.data),
                    pending: None,
                })
            }
            Some(Ok(es::SSE::Event(event))) => Ok(SseConnection {
                stream,
                session_id: None,
                pending: Some(to_message(event.event_type, event.data)),
            }),
            Some(Ok(es::SSE::Comment(_))) => Ok(SseConnection {
                stream,
                session_id: None,
                pending: None,
            }),
            Some(Err(e)) => Err(e.into()),
            None => Err(connect_failure("SSE stream ended before the first frame")),
        }
    }
}

/// An open SSE stream.
pub struct SseConnection {
    stream: SseStream,
    session_id: Option<String>,
    /// First event, read during the handshake and not yet delivered
    pending: Option<TransportEvent>,
}

#[async_trait]
impl TransportConnection for SseConnection {
    fn session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    async fn next_event(&mut self) -> TransportEvent {
        if let Some(event) = self.pending.take() {
            return event;
        }

        loop {
            match self.stream.next().await {
                Some(Ok(es::SSE::Event(event))) => {
                    return to_message(event.event_type, event.data);
                }
                Some(Ok(es::SSE::Comment(_))) => {
                    // Ignore comments (keep-alive)
                }
                Some(Err(e)) => {
                    warn!("SSE stream error: {}", e);
                    return TransportEvent::Dropped {
                        reason: e.to_string(),
                    };
                }
                None => {
                    debug!("SSE stream ended");
                    return TransportEvent::Dropped {
                        reason: "stream ended".to_string(),
                    };
                }
            }
        }
    }
}

/// Event data is JSON when it parses as JSON, otherwise a JSON string.
fn to_message(event_type: String, data: String) -> TransportEvent {
    let payload = serde_json::from_str(&data).unwrap_or(Value::String(data));
    TransportEvent::Message {
        topic: event_type,
        payload,
    }
}

fn parse_session_id(data: &str) -> Option<String> {
    serde_json::from_str::<Handshake>(data)
        .ok()
        .and_then(|handshake| handshake.session_id)
}
