//! Session state: key material and access token
//!
//! [`SessionState`] exclusively owns the cached [`KeyMaterial`] and
//! [`SessionToken`]. Readers take cheap snapshots; re-acquisition goes through
//! [`SessionState::ensure_keys`] / [`SessionState::ensure_token`], which are
//! single-flight: concurrent callers that all observe a missing value wait on
//! one refresh instead of each starting their own.
//!
//! Lifecycles:
//! - keys: `absent -> present` on key exchange, back to `absent` on 600001
//! - token: `absent|expired -> valid` on login, `valid -> expired` when
//!   `now >= expiration` or on 600002

use crate::error::MazdaError;
use serde::Deserialize;
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Session encryption and sign keys from the key-exchange call
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct KeyMaterial {
    #[serde(rename = "encKey")]
    pub enc_key: String,
    #[serde(rename = "signKey")]
    pub sign_key: String,
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("enc_key", &format_args!("<{} bytes>", self.enc_key.len()))
            .field("sign_key", &format_args!("<{} bytes>", self.sign_key.len()))
            .finish()
    }
}

/// Access token from login
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct SessionToken {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Seconds since the epoch
    #[serde(rename = "accessTokenExpirationTs")]
    pub expiration_ts: i64,
}

impl SessionToken {
    pub fn is_valid_at(&self, now_secs: i64) -> bool {
        now_secs < self.expiration_ts
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp())
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("access_token", &"<redacted>")
            .field("expiration_ts", &self.expiration_ts)
            .finish()
    }
}

#[derive(Default)]
pub struct SessionState {
    keys: RwLock<Option<KeyMaterial>>,
    token: RwLock<Option<SessionToken>>,
    key_refresh: Mutex<()>,
    token_refresh: Mutex<()>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current key material
    pub fn keys(&self) -> Option<KeyMaterial> {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Snapshot of the current token, whether or not it is still valid
    pub fn token(&self) -> Option<SessionToken> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Current token if it has not expired
    pub fn valid_token(&self) -> Option<SessionToken> {
        self.token().filter(SessionToken::is_valid)
    }

    /// Return the cached keys, or run `fetch` exactly once across all
    /// concurrent callers and cache its result.
    pub async fn ensure_keys<F, Fut>(&self, fetch: F) -> Result<KeyMaterial, MazdaError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<KeyMaterial, MazdaError>>,
    {
        if let Some(keys) = self.keys() {
            return Ok(keys);
        }

        let _guard = self.key_refresh.lock().await;
        // Another caller may have finished the exchange while we waited
        if let Some(keys) = self.keys() {
            debug!("Keys retrieved by a concurrent caller");
            return Ok(keys);
        }

        info!("Retrieving session keys");
        let keys = fetch().await?;
        *self.keys.write().unwrap_or_else(PoisonError::into_inner) = Some(keys.clone());
        Ok(keys)
    }

    /// Return the cached token if still valid, or run `login` exactly once
    /// across all concurrent callers and cache its result.
    pub async fn ensure_token<F, Fut>(&self, login: F) -> Result<SessionToken, MazdaError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SessionToken, MazdaError>>,
    {
        if let Some(token) = self.valid_token() {
            return Ok(token);
        }

        let _guard = self.token_refresh.lock().await;
        if let Some(token) = self.valid_token() {
            debug!("Token refreshed by a concurrent caller");
            return Ok(token);
        }

        info!("Access token missing or expired, logging in");
        let token = login().await?;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached keys if they are still the ones the failed request
    /// used. Returns whether anything was cleared.
    pub fn invalidate_keys(&self, stale: &KeyMaterial) -> bool {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        if keys.as_ref() == Some(stale) {
            *keys = None;
            true
        } else {
            false
        }
    }

    /// Drop the cached token if it is still the one the failed request used.
    /// Returns whether anything was cleared.
    pub fn invalidate_token(&self, stale: &SessionToken) -> bool {
        let mut token = self.token.write().unwrap_or_else(PoisonError::into_inner);
        if token.as_ref() == Some(stale) {
            *token = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&self) {
        *self.keys.write().unwrap_or_else(PoisonError::into_inner) = None;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
