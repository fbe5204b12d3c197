//! Google ID token verification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::errors::AuthError;

const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v1/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];
const DEFAULT_KEY_MAX_AGE: u64 = 3600;

/// The verified identity carried by a Google ID token.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleProfile {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleProfile, AuthError>;
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

#[derive(Clone)]
struct CachedKeys {
    keys: HashMap<String, String>,
    expires_at: Instant,
}

/// Fetches and caches Google's signing certificates, honouring the
/// `Cache-Control: max-age` of the response.
pub struct GoogleKeyManager {
    client: Client,
    cache: Arc<RwLock<Option<CachedKeys>>>,
}

impl GoogleKeyManager {
    pub fn new(client: Client) -> Self {
        GoogleKeyManager {
            client,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn get_key(&self, kid: &str) -> Result<String, AuthError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref().filter(|c| Instant::now() < c.expires_at) {
                if let Some(key) = cached.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        self.refresh_keys().await?;

        let cache = self.cache.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| AuthError::InvalidIdToken(format!("unknown signing key '{kid}'")))
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        let response = self
            .client
            .get(GOOGLE_CERTS_URL)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        let max_age = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_KEY_MAX_AGE);

        let keys: HashMap<String, String> = response
            .json()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        tracing::debug!(count = keys.len(), max_age, "Refreshed Google signing keys");

        let mut cache = self.cache.write().await;
        *cache = Some(CachedKeys {
            keys,
            expires_at: Instant::now() + Duration::from_secs(max_age),
        });
        Ok(())
    }
}

fn parse_max_age(cache_control: &str) -> Option<u64> {
    cache_control
        .split(',')
        .find_map(|part| part.trim().strip_prefix("max-age="))
        .and_then(|value| value.parse().ok())
}

pub struct GoogleTokenVerifier {
    client_id: String,
    keys: GoogleKeyManager,
}

impl GoogleTokenVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        GoogleTokenVerifier {
            client_id: client_id.into(),
            keys: GoogleKeyManager::new(Client::new()),
        }
    }
}

#[async_trait]
impl OAuthTokenVerifier for GoogleTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleProfile, AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::OAuthNotConfigured);
        }

        let header = decode_header(id_token)
            .map_err(|e| AuthError::InvalidIdToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidIdToken("missing kid in header".to_string()))?;

        let pem = self.keys.get_key(&kid).await?;
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| AuthError::InvalidIdToken(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let claims = decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|e| AuthError::InvalidIdToken(e.to_string()))?
            .claims;

        profile_from_claims(claims)
    }
}

fn profile_from_claims(claims: GoogleClaims) -> Result<GoogleProfile, AuthError> {
    if claims.sub.is_empty() {
        return Err(AuthError::InvalidIdToken("subject must not be empty".to_string()));
    }
    let email = claims
        .email
        .filter(|_| claims.email_verified.unwrap_or(false))
        .ok_or_else(|| AuthError::InvalidIdToken("token carries no verified email".to_string()))?;

    Ok(GoogleProfile {
        subject: claims.sub,
        email,
        name: claims.name,
        picture: claims.picture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_age_is_read_from_cache_control() {
        assert_eq!(parse_max_age("public, max-age=19870, must-revalidate"), Some(19870));
        assert_eq!(parse_max_age("no-cache"), None);
    }

    #[test]
    fn unverified_email_is_rejected() {
        let claims = GoogleClaims {
            sub: "1234".into(),
            email: Some("ada@example.com".into()),
            email_verified: Some(false),
            name: None,
            picture: None,
        };
        assert!(matches!(profile_from_claims(claims), Err(AuthError::InvalidIdToken(_))));
    }

    #[test]
    fn verified_claims_become_profile() {
        let claims = GoogleClaims {
            sub: "1234".into(),
            email: Some("ada@example.com".into()),
            email_verified: Some(true),
            name: Some("Ada".into()),
            picture: None,
        };
        let profile = profile_from_claims(claims).unwrap();
        assert_eq!(profile.subject, "1234");
        assert_eq!(profile.name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn unconfigured_client_id_refuses() {
        let verifier = GoogleTokenVerifier::new("");
        assert!(matches!(
            verifier.verify("anything").await,
            Err(AuthError::OAuthNotConfigured)
        ));
    }
}
