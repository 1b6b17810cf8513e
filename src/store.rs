use crate::buffer::{AppendOutcome, NotificationBuffer, OverflowPolicy};
use crate::clock::{Clock, SystemClock};
use crate::error::RegistryError;
use crate::id::{IdGenerator, RandomIdGenerator};
use crate::types::{EndpointId, Notification};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Capacity and expiry limits, fixed for the lifetime of a registry.
#[derive(Debug, Clone, Copy)]
pub struct RegistryLimits {
    pub max_active_endpoints: NonZeroUsize,
    pub max_endpoint_notifications: NonZeroUsize,
    pub overflow_policy: OverflowPolicy,
    pub max_idle_duration: Duration,
    pub max_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    MaxDuration,
    Idle,
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxDuration => f.write_str("max duration"),
            Self::Idle => f.write_str("idle"),
        }
    }
}

/// Result of a delivery to an existing endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored,
    StoredDroppingOldest,
    DroppedOverflow,
    DroppedDisabled,
}

/// Point-in-time copy of an endpoint's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub endpoint_id: EndpointId,
    pub pending_notifications: usize,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStatus {
    pub active_endpoints: usize,
    pub uncollected_notifications: usize,
}

#[derive(Debug)]
pub struct Endpoint {
    id: EndpointId,
    created_at: DateTime<Utc>,
    last_interaction_at: DateTime<Utc>,
    enabled: bool,
    notifications: NotificationBuffer,
}

impl Endpoint {
    fn new(id: EndpointId, now: DateTime<Utc>, limits: &RegistryLimits) -> Self {
        Self {
            id,
            created_at: now,
            last_interaction_at: now,
            enabled: true,
            notifications: NotificationBuffer::new(
                limits.max_endpoint_notifications,
                limits.overflow_policy,
            ),
        }
    }

    // Never moves backwards, so created_at <= last_interaction_at survives clock steps.
    fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_interaction_at {
            self.last_interaction_at = now;
        }
    }

    fn info(&self) -> EndpointInfo {
        EndpointInfo {
            endpoint_id: self.id.clone(),
            pending_notifications: self.notifications.len(),
            enabled: self.enabled,
            created_at: self.created_at,
            last_interaction_at: self.last_interaction_at,
        }
    }

    fn expiry(&self, now: DateTime<Utc>, limits: &RegistryLimits) -> Option<ExpiryReason> {
        if elapsed(now, self.created_at) >= limits.max_duration {
            Some(ExpiryReason::MaxDuration)
        } else if elapsed(now, self.last_interaction_at) >= limits.max_idle_duration {
            Some(ExpiryReason::Idle)
        } else {
            None
        }
    }
}

/// Time since `since`; zero if `since` lies in the future.
fn elapsed(now: DateTime<Utc>, since: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

/// The single owner of every live endpoint.
///
/// Locking: the map sits behind an `RwLock`, each endpoint behind its own
/// `Mutex`. Per-endpoint operations hold the map's read guard for their whole
/// duration and lock only their entry, so different endpoints never contend
/// and calls against the same endpoint are serialized. Insert, remove and
/// eviction take the write guard, which cannot be granted while any
/// per-endpoint operation is still in flight. Snapshots hold the read guard
/// and every entry lock at once. Nothing awaits anything but a lock while a
/// guard is held.
pub struct EndpointRegistry {
    endpoints: RwLock<HashMap<EndpointId, Mutex<Endpoint>>>,
    limits: RegistryLimits,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl EndpointRegistry {
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            endpoints: RwLock::new(HashMap::new()),
            limits,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIdGenerator),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_id_generator(mut self, ids: impl IdGenerator) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn limits(&self) -> &RegistryLimits {
        &self.limits
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn len(&self) -> usize {
        self.endpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.endpoints.read().await.is_empty()
    }

    /// Creates an enabled, empty endpoint. The capacity check and the insert
    /// happen under one write guard.
    pub async fn create(&self) -> Result<EndpointInfo, RegistryError> {
        let mut endpoints = self.endpoints.write().await;

        let active = endpoints.len();
        let max = self.limits.max_active_endpoints.get();
        if active >= max {
            warn!(active, max, "refusing to create endpoint: registry at capacity");
            return Err(RegistryError::ResourceExhausted { active, max });
        }

        let id = loop {
            let candidate = self.ids.generate();
            if !endpoints.contains_key(candidate.as_str()) {
                break candidate;
            }
            warn!(endpoint_id = %candidate, "endpoint ID collision, regenerating");
        };

        let endpoint = Endpoint::new(id.clone(), self.clock.now(), &self.limits);
        let info = endpoint.info();
        endpoints.insert(id.clone(), Mutex::new(endpoint));

        info!(endpoint_id = %id, active = active + 1, "created endpoint");
        Ok(info)
    }

    /// Read-only lookup. Does not count as an interaction.
    pub async fn get(&self, id: &str) -> Result<EndpointInfo, RegistryError> {
        self.with_endpoint(id, |endpoint| endpoint.info()).await
    }

    pub async fn configure(&self, id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.with_endpoint(id, |endpoint| {
            endpoint.enabled = enabled;
            endpoint.touch(self.clock.now());
        })
        .await?;
        info!(endpoint_id = id, enabled, "configured endpoint");
        Ok(())
    }

    /// Drains the endpoint's buffer, oldest first.
    pub async fn collect(&self, id: &str) -> Result<Vec<Notification>, RegistryError> {
        let collected = self
            .with_endpoint(id, |endpoint| {
                let drained = endpoint.notifications.drain_all();
                endpoint.touch(self.clock.now());
                drained
            })
            .await?;
        info!(endpoint_id = id, count = collected.len(), "collected notifications");
        Ok(collected)
    }

    pub async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        let mut endpoints = self.endpoints.write().await;
        match endpoints.remove(id) {
            Some(_) => {
                info!(endpoint_id = id, "deleted endpoint");
                Ok(())
            }
            None => Err(RegistryError::not_found(id)),
        }
    }

    /// Records a delivery. Disabled endpoints discard the payload but still
    /// count the delivery as an interaction.
    pub async fn ingest(
        &self,
        id: &str,
        notification: Notification,
    ) -> Result<IngestOutcome, RegistryError> {
        let body_len = notification.body.len();
        let outcome = self
            .with_endpoint(id, |endpoint| {
                endpoint.touch(self.clock.now());
                if !endpoint.enabled {
                    return IngestOutcome::DroppedDisabled;
                }
                match endpoint.notifications.append(notification) {
                    AppendOutcome::Stored => IngestOutcome::Stored,
                    AppendOutcome::StoredDroppingOldest => IngestOutcome::StoredDroppingOldest,
                    AppendOutcome::Discarded => IngestOutcome::DroppedOverflow,
                }
            })
            .await?;

        match outcome {
            IngestOutcome::Stored => debug!(endpoint_id = id, bytes = body_len, "stored notification"),
            IngestOutcome::StoredDroppingOldest => {
                warn!(endpoint_id = id, "notification buffer full, dropped oldest notification")
            }
            IngestOutcome::DroppedOverflow => {
                warn!(endpoint_id = id, "notification buffer full, discarded incoming notification")
            }
            IngestOutcome::DroppedDisabled => {
                info!(endpoint_id = id, "endpoint disabled, discarded incoming notification")
            }
        }
        Ok(outcome)
    }

    /// Removes every endpoint past its idle or absolute age limit as of `now`
    /// and returns their ids.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> Vec<EndpointId> {
        let mut endpoints = self.endpoints.write().await;
        let limits = &self.limits;
        let mut evicted = Vec::new();

        // The write guard excludes every in-flight per-endpoint operation, so
        // `get_mut` is the entry guard here.
        endpoints.retain(|id, entry| match entry.get_mut().expiry(now, limits) {
            Some(reason) => {
                info!(endpoint_id = %id, %reason, "evicting expired endpoint");
                evicted.push(id.clone());
                false
            }
            None => true,
        });
        evicted
    }

    /// Aggregate counts taken as one consistent view across all endpoints.
    pub async fn snapshot(&self) -> RegistryStatus {
        let endpoints = self.endpoints.read().await;
        let locked = lock_all(&endpoints).await;
        RegistryStatus {
            active_endpoints: locked.len(),
            uncollected_notifications: locked.iter().map(|e| e.notifications.len()).sum(),
        }
    }

    /// Metadata for every endpoint, oldest first, taken as one consistent view.
    pub async fn list(&self) -> Vec<EndpointInfo> {
        let endpoints = self.endpoints.read().await;
        let mut items: Vec<EndpointInfo> = lock_all(&endpoints)
            .await
            .iter()
            .map(|endpoint| endpoint.info())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        items
    }

    async fn with_endpoint<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Endpoint) -> T,
    ) -> Result<T, RegistryError> {
        let endpoints = self.endpoints.read().await;
        let entry = endpoints
            .get(id)
            .ok_or_else(|| RegistryError::not_found(id))?;
        let mut endpoint = entry.lock().await;
        Ok(f(&mut endpoint))
    }
}

// Holds every entry lock at once. The read guard keeps the map unchanged, so
// every caller locks in the same iteration order.
async fn lock_all(
    endpoints: &HashMap<EndpointId, Mutex<Endpoint>>,
) -> Vec<MutexGuard<'_, Endpoint>> {
    let mut locked = Vec::with_capacity(endpoints.len());
    for entry in endpoints.values() {
        locked.push(entry.lock().await);
    }
    locked
}
