use crate::types::EndpointId;
use base64::Engine as _;
use uuid::Uuid;

/// Produces identifiers for new endpoints. Uniqueness against live endpoints
/// is enforced by the registry, which retries on collision.
pub trait IdGenerator: Send + Sync + 'static {
    fn generate(&self) -> EndpointId;
}

/// A v4 UUID (122 random bits), URL-safe base64 without padding (22 chars).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> EndpointId {
        let id = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());
        EndpointId::new(id)
    }
}
