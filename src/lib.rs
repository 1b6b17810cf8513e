//! Ephemeral, capacity-bounded webhook endpoints for test harnesses.
//!
//! A client provisions a short-lived endpoint, hands its callback URL to the
//! system under test, and later collects whatever was posted there.
//! Endpoints and their buffered notifications live only in memory and are
//! reclaimed by the [`Reaper`] once idle or too old.
//!
//! ## Guarantees
//! - At most `max_active_endpoints` endpoints exist at any time
//! - Each endpoint buffers at most `max_endpoint_notifications` deliveries
//! - Operations on one endpoint are totally ordered; different endpoints never contend
//! - Webhook senders are always acknowledged, whether or not the endpoint exists
//!
//! ## Non-Guarantees
//! - Persistence across restarts
//! - Coordination between processes
//! - Any interpretation of payloads

pub mod buffer;
pub mod clock;
pub mod error;
pub mod gateway;
pub mod http_server;
pub mod id;
pub mod reaper;
pub mod settings;
pub mod store;
pub mod types;

pub use buffer::{AppendOutcome, NotificationBuffer, OverflowPolicy};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ApiError, ConfigError, RegistryError};
pub use gateway::{CreatedEndpoint, IngestGateway, ManagementGateway, PublicUrl, ServerStatus};
pub use id::{IdGenerator, RandomIdGenerator};
pub use reaper::Reaper;
pub use settings::{LogFormat, Settings};
pub use store::{
    EndpointInfo, EndpointRegistry, ExpiryReason, IngestOutcome, RegistryLimits, RegistryStatus,
};
pub use types::{EndpointId, Notification, NotificationHeader};
