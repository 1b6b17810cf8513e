use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Opaque, URL-safe endpoint identifier. Doubles as the path component of
/// the public callback URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EndpointId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationHeader {
    pub name: String,
    pub value: String,
}

/// One webhook delivery as received. The body is never parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub received_at: DateTime<Utc>,
    pub method: String,
    pub headers: Vec<NotificationHeader>,
    pub remote: Option<String>,
    pub body: Vec<u8>,
}

impl Notification {
    pub fn new(received_at: DateTime<Utc>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            received_at,
            method: "POST".to_string(),
            headers: Vec::new(),
            remote: None,
            body: body.into(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(NotificationHeader {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = Some(remote.into());
        self
    }
}

// ─── Wire schema ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateEndpointRequest {
    #[serde(default)]
    pub test_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEndpointResponse {
    pub endpoint_id: String,
    pub fully_qualified_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigureEndpointRequest {
    pub enabled: bool,
}

/// A notification as handed back to the collecting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedNotification {
    pub method: String,
    pub headers: Vec<NotificationHeader>,
    pub body: String, // lossy UTF-8 of the raw body
    pub received_at: DateTime<Utc>,
    pub remote: Option<String>,
}

impl From<Notification> for CollectedNotification {
    fn from(n: Notification) -> Self {
        Self {
            method: n.method,
            headers: n.headers,
            body: String::from_utf8_lossy(&n.body).into_owned(),
            received_at: n.received_at,
            remote: n.remote,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectEndpointResponse {
    pub notifications: Vec<CollectedNotification>,
}
