//! Conduit trait.

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{InvocationRequest, InvocationResult};

/// Performs one exchange with the agent.
///
/// Implementations must honor `request.timeout` and must not retry.
#[async_trait]
pub trait Conduit: Send + Sync {
    /// Send the prompt (resuming `request.resume_token` if set) and wait for
    /// the agent's result.
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResult>;
}
