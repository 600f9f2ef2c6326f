use async_trait::async_trait;

use super::types::{GeneratedIllustration, GenerationRequest};
use crate::error::EngineError;

/// The external image-generation capability, injected into the coordinator.
///
/// Implementations own transport, credentials, and per-call timeout policy.
/// The coordinator only requires that a call eventually resolves with an
/// output handle or errors; it never cancels an in-flight call.
#[async_trait]
pub trait IllustrationGenerator: Send + Sync + 'static {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GeneratedIllustration, EngineError>;
}
