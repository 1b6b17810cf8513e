//! Boundary operations between the transport layer and the registry.
//!
//! [`ManagementGateway`] is the only caller of create / collect / configure /
//! delete and surfaces every failure. [`IngestGateway`] records exactly one
//! ingest per delivery and never reports a failure back to the sender.

use crate::error::RegistryError;
use crate::store::{EndpointInfo, EndpointRegistry, IngestOutcome, RegistryLimits, RegistryStatus};
use crate::types::{EndpointId, Notification};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

pub const WEBHOOK_PATH_PREFIX: &str = "/webhook";

/// Joins URL fragments with exactly one `/` between non-empty parts.
/// Whitespace around each part is ignored.
pub fn path_join(parts: &[&str]) -> String {
    let mut joined = String::new();
    let mut last: Option<&str> = None;

    for part in parts {
        let next = part.trim();
        if next.is_empty() {
            continue;
        }

        if let Some(prev) = last {
            match (prev.ends_with('/'), next.strip_prefix('/')) {
                (true, Some("")) => continue,
                (true, Some(rest)) => joined.push_str(rest),
                (true, None) => joined.push_str(next),
                (false, Some(_)) => joined.push_str(next),
                (false, None) => {
                    joined.push('/');
                    joined.push_str(next);
                }
            }
        } else {
            joined.push_str(next);
        }
        last = Some(next);
    }

    joined
}

/// Where endpoints are reachable from the outside world.
#[derive(Debug, Clone)]
pub struct PublicUrl {
    pub server_url: String,
    pub mount_point: String,
}

impl PublicUrl {
    pub fn callback_url(&self, endpoint_id: &EndpointId) -> String {
        let webhook_path = format!("{WEBHOOK_PATH_PREFIX}/{endpoint_id}");
        path_join(&[&self.server_url, &self.mount_point, &webhook_path])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEndpoint {
    pub endpoint_id: EndpointId,
    pub callback_url: String,
}

#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub started_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub limits: RegistryLimits,
    pub registry: RegistryStatus,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Clone)]
pub struct ManagementGateway {
    registry: Arc<EndpointRegistry>,
    public_url: PublicUrl,
    started_at: DateTime<Utc>,
}

impl ManagementGateway {
    pub fn new(registry: Arc<EndpointRegistry>, public_url: PublicUrl) -> Self {
        let started_at = registry.now();
        Self {
            registry,
            public_url,
            started_at,
        }
    }

    pub async fn create(&self) -> Result<CreatedEndpoint, RegistryError> {
        let info = self.registry.create().await?;
        let callback_url = self.public_url.callback_url(&info.endpoint_id);
        Ok(CreatedEndpoint {
            endpoint_id: info.endpoint_id,
            callback_url,
        })
    }

    pub async fn collect(&self, endpoint_id: &str) -> Result<Vec<Notification>, RegistryError> {
        self.registry.collect(endpoint_id).await
    }

    pub async fn configure(&self, endpoint_id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.registry.configure(endpoint_id, enabled).await
    }

    pub async fn delete(&self, endpoint_id: &str) -> Result<(), RegistryError> {
        self.registry.delete(endpoint_id).await
    }

    /// Aggregate counts plus a per-endpoint listing. The two are separate
    /// views and may differ by whatever happened in between.
    pub async fn status(&self) -> ServerStatus {
        let registry = self.registry.snapshot().await;
        let endpoints = self.registry.list().await;
        ServerStatus {
            started_at: self.started_at,
            now: self.registry.now(),
            limits: *self.registry.limits(),
            registry,
            endpoints,
        }
    }
}

#[derive(Clone)]
pub struct IngestGateway {
    registry: Arc<EndpointRegistry>,
}

impl IngestGateway {
    pub fn new(registry: Arc<EndpointRegistry>) -> Self {
        Self { registry }
    }

    /// Receipt timestamp for a delivery arriving now.
    pub fn now(&self) -> DateTime<Utc> {
        self.registry.now()
    }

    /// Hands one delivery to the registry. Returns `None` when the endpoint
    /// does not exist; the sender is acknowledged either way.
    pub async fn deliver(
        &self,
        endpoint_id: &str,
        notification: Notification,
    ) -> Option<IngestOutcome> {
        match self.registry.ingest(endpoint_id, notification).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                debug!(endpoint_id, error = %e, "discarded notification for unknown endpoint");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::OverflowPolicy;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    fn registry(max_active: usize) -> Arc<EndpointRegistry> {
        Arc::new(EndpointRegistry::new(RegistryLimits {
            max_active_endpoints: NonZeroUsize::new(max_active).unwrap(),
            max_endpoint_notifications: NonZeroUsize::new(10).unwrap(),
            overflow_policy: OverflowPolicy::DropOldest,
            max_idle_duration: Duration::from_secs(60),
            max_duration: Duration::from_secs(600),
        }))
    }

    fn public_url(server_url: &str, mount_point: &str) -> PublicUrl {
        PublicUrl {
            server_url: server_url.to_string(),
            mount_point: mount_point.to_string(),
        }
    }

    #[test]
    fn joins_paths() {
        let cases: &[(&[&str], &str)] = &[
            (&[], ""),
            (&["abc"], "abc"),
            (&["abc", "/", "/", "", "/", "def"], "abc/def"),
            (&["abc", "/", "/", "", "/", "def", "/", "/"], "abc/def/"),
            (&["abc", "def"], "abc/def"),
            (&["abc/", "def"], "abc/def"),
            (&["abc", "/def"], "abc/def"),
            (&["abc/", "/def"], "abc/def"),
            (&["/abc/", "/def/"], "/abc/def/"),
            (&[" /abc/ ", " /def/ ", "   ", " / "], "/abc/def/"),
            (
                &["https://foo.com:123/", "/", "/def/", "", "efg", "hij/"],
                "https://foo.com:123/def/efg/hij/",
            ),
        ];
        for (parts, expected) in cases {
            assert_eq!(path_join(parts), *expected, "joining {parts:?}");
        }
    }

    #[test]
    fn builds_callback_urls() {
        let id = EndpointId::new("abc123");
        assert_eq!(
            public_url("https://foo.bar:123/", "/").callback_url(&id),
            "https://foo.bar:123/webhook/abc123"
        );
        assert_eq!(
            public_url("http://foo.bar.baz:456", "api").callback_url(&EndpointId::new("DEF456")),
            "http://foo.bar.baz:456/api/webhook/DEF456"
        );
    }

    #[tokio::test]
    async fn create_returns_callback_url_containing_id() {
        let gateway = ManagementGateway::new(registry(2), public_url("https://my.site:1234/", "/my/api/"));
        let created = gateway.create().await.unwrap();
        assert_eq!(
            created.callback_url,
            format!("https://my.site:1234/my/api/webhook/{}", created.endpoint_id)
        );
    }

    #[tokio::test]
    async fn deliveries_to_unknown_endpoints_are_swallowed() {
        let reg = registry(2);
        let ingest = IngestGateway::new(reg.clone());
        let management = ManagementGateway::new(reg, public_url("http://localhost", "/"));

        assert_eq!(ingest.deliver("nope", Notification::new(ingest.now(), "x")).await, None);

        let created = management.create().await.unwrap();
        let id = created.endpoint_id.as_str();
        assert_eq!(
            ingest.deliver(id, Notification::new(ingest.now(), "x")).await,
            Some(IngestOutcome::Stored)
        );
        management.configure(id, false).await.unwrap();
        assert_eq!(
            ingest.deliver(id, Notification::new(ingest.now(), "y")).await,
            Some(IngestOutcome::DroppedDisabled)
        );

        let status = management.status().await;
        assert_eq!(status.registry.active_endpoints, 1);
        assert_eq!(status.registry.uncollected_notifications, 1);
        assert_eq!(status.endpoints.len(), 1);
        assert!(!status.endpoints[0].enabled);

        assert_eq!(management.collect(id).await.unwrap().len(), 1);
        management.delete(id).await.unwrap();
        assert!(management.delete(id).await.is_err());
    }
}
