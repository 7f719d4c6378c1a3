use async_trait::async_trait;

use crate::error::Result;
use crate::models::Owner;

/// Resolves a bearer credential to the owner it identifies
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Verify `token`, failing with `AppError::Unauthorized` when it is not acceptable
    async fn verify(&self, token: &str) -> Result<Owner>;

    /// Get the identity provider name
    fn provider_name(&self) -> &'static str;
}
