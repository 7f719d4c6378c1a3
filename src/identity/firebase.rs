use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::identity::IdentityVerifier;
use crate::models::{Claims, Owner};

/// Unknown key ids never trigger a refetch more often than this
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(60);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Firebase ID token verifier.
///
/// Tokens are RS256 JWTs signed by one of Google's rotating secure-token keys.
/// A token is accepted when its `kid` names a published key, the audience is
/// the project id, the issuer is `https://securetoken.google.com/<project_id>`
/// and `sub` (the Firebase uid) is non-empty.
pub struct FirebaseVerifier {
    http: reqwest::Client,
    project_id: String,
    issuer: String,
    jwks_url: String,
    cache_ttl: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            project_id: config.project_id.clone(),
            issuer: format!("https://securetoken.google.com/{}", config.project_id),
            jwks_url: config.jwks_url.clone(),
            cache_ttl: Duration::from_secs(config.jwks_cache_seconds),
            cache: RwLock::new(None),
        }
    }

    /// Decoding key for `kid`, refetching the key set once if it is stale or lacks the key.
    /// A set fetched within `MIN_REFETCH_INTERVAL` is trusted to be complete.
    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            let age = cached.fetched_at.elapsed();
            if age < self.cache_ttl {
                if let Some(jwk) = cached.keys.find(kid) {
                    return key_from_jwk(jwk);
                }
            }
            if age < MIN_REFETCH_INTERVAL {
                return Err(unknown_kid(kid));
            }
        }

        let keys = self.fetch_keys().await?;
        let key = keys.find(kid).map(key_from_jwk);

        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        key.unwrap_or_else(|| Err(unknown_kid(kid)))
    }

    async fn fetch_keys(&self) -> Result<JwkSet> {
        let keys: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::info!("Fetched {} Firebase signing keys", keys.keys.len());
        Ok(keys)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[&self.issuer]);
        validation
    }
}

fn key_from_jwk(jwk: &Jwk) -> Result<DecodingKey> {
    DecodingKey::from_jwk(jwk).map_err(|e| AppError::Internal(format!("Unusable signing key: {}", e)))
}

fn unknown_kid(kid: &str) -> AppError {
    tracing::debug!("Unknown signing key id: {}", kid);
    AppError::Unauthorized("Invalid token".to_string())
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<Owner> {
        let header = decode_header(token)
            .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(AppError::Unauthorized("Invalid token algorithm".to_string()));
        }
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized("Token has no key id".to_string()))?;

        let key = self.decoding_key(&kid).await?;
        let data = decode::<Claims>(token, &key, &self.validation()).map_err(|e| {
            tracing::debug!("Firebase token rejected: {:?}", e);
            AppError::Unauthorized("Invalid token".to_string())
        })?;

        if data.claims.sub.is_empty() {
            return Err(AppError::Unauthorized("Invalid token".to_string()));
        }

        Ok(Owner::new(data.claims.sub))
    }

    fn provider_name(&self) -> &'static str {
        "firebase"
    }
}
