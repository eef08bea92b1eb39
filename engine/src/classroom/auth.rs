//! Access-token cache for the course provider
//!
//! The provider's identity layer hands out short-lived access tokens minted
//! from a long-lived refresh token. This cache refreshes transparently when
//! the cached token is about to expire; callers only ever see a valid token
//! or an auth error.

use super::{ClassroomError, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Refresh tokens a little before the provider's deadline
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// OAuth credential material for the refresh-token grant
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_uri: String,
}

enum TokenSource {
    /// Fixed token, never refreshed. Used by tests and by deployments that
    /// inject a token through the environment.
    Static(String),
    /// Refresh-token grant against the configured token endpoint
    Refresh(Credentials),
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// In-memory cache in front of the token endpoint
pub struct TokenCache {
    source: TokenSource,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// Cache that always yields the given token
    pub fn with_static(token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            client: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    /// Cache that refreshes via the credentials' token endpoint
    pub fn new(credentials: Credentials) -> Self {
        Self {
            source: TokenSource::Refresh(credentials),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            cached: Mutex::new(None),
        }
    }

    /// Get a currently valid access token, refreshing if needed
    pub async fn access_token(&self) -> Result<String> {
        let credentials = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Refresh(credentials) => credentials,
        };

        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() + EXPIRY_SKEW < token.expires_at {
                return Ok(token.access_token.clone());
            }
        }

        let refreshed = self.refresh(credentials).await?;
        let access_token = refreshed.access_token.clone();
        *cached = Some(refreshed);

        Ok(access_token)
    }

    async fn refresh(&self, credentials: &Credentials) -> Result<CachedToken> {
        tracing::debug!("Refreshing provider access token");

        let response = self
            .client
            .post(&credentials.token_uri)
            .form(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("refresh_token", credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| ClassroomError::Auth(format!("Token refresh failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClassroomError::Auth(format!(
                "Token endpoint error ({}): {}",
                status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ClassroomError::Auth(format!("Malformed token response: {}", e)))?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

/// Wire format of the token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}
