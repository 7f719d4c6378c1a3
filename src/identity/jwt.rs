use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::error::{AppError, Result};
use crate::identity::IdentityVerifier;
use crate::models::{Claims, Owner};

/// HS256 tokens signed with a shared secret
pub struct JwtVerifier {
    key: DecodingKey,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Owner> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.key, &validation).map_err(|e| {
            tracing::debug!("JWT rejected: {:?}", e);
            AppError::Unauthorized("Invalid token".to_string())
        })?;

        if data.claims.sub.is_empty() {
            return Err(AppError::Unauthorized("Invalid token".to_string()));
        }

        Ok(Owner::new(data.claims.sub))
    }

    fn provider_name(&self) -> &'static str {
        "jwt"
    }
}
