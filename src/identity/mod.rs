pub mod firebase;
pub mod jwt;
pub mod provider;

pub use firebase::*;
pub use jwt::*;
pub use provider::*;

use std::sync::Arc;

use crate::config::{AuthConfig, AuthProvider};

/// Build the configured identity verifier
pub fn verifier_from_config(config: &AuthConfig) -> Arc<dyn IdentityVerifier> {
    let verifier: Arc<dyn IdentityVerifier> = match config.provider {
        AuthProvider::Firebase => Arc::new(FirebaseVerifier::new(config)),
        AuthProvider::Jwt => Arc::new(JwtVerifier::new(&config.jwt_secret)),
    };
    tracing::info!("Identity provider: {}", verifier.provider_name());
    verifier
}
