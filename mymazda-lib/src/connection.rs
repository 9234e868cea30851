//! Encrypted request/response engine
//!
//! [`Connection`] turns a logical [`ApiRequest`] into an encrypted, signed HTTP
//! request, dispatches it through a [`Transport`], and decrypts the reply.
//! Session keys and the access token are acquired lazily and refreshed at most
//! once per call when the server reports them stale.

use crate::cipher::{BLOCK_SIZE, decrypt_json, encrypt_credential, encrypt_payload};
use crate::config::{ClientConfig, Credentials};
use crate::constants::{
    APP_OS, APP_PACKAGE_ID, CHECK_VERSION_ENDPOINT, STATE_SUCCESS, USER_AGENT_USHER_API, USHER_APP_ID,
    USHER_DEVICE_ID, USHER_SDK_VERSION,
};
use crate::error::MazdaError;
use crate::keys::{decryption_key_from_app_code, sign_from_payload_and_timestamp, sign_from_timestamp};
use crate::sensordata::SensorDataBuilder;
use crate::sensordata::encryptor::HybridSensorEncryptor;
use crate::session::{KeyMaterial, SessionState, SessionToken};
use crate::transport::{HttpRequest, HttpTransport, Method, RequestBody, Transport};
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Error codes the API reports in a failed response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u32)]
pub enum ServerErrorCode {
    /// Request could not be decrypted with the session keys
    EncryptionRejected = 600001,
    /// Access token is no longer accepted
    TokenExpired = 600002,
    #[num_enum(catch_all)]
    Other(u32),
}

impl ServerErrorCode {
    fn into_error(self, http_status: u16) -> MazdaError {
        let code = u32::from(self);
        match self {
            ServerErrorCode::EncryptionRejected => MazdaError::EncryptionRejected { code },
            ServerErrorCode::TokenExpired => MazdaError::TokenExpired { code },
            ServerErrorCode::Other(_) => MazdaError::RequestFailed {
                http_status,
                code: Some(code),
            },
        }
    }
}

/// One logical API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Option<Vec<(String, String)>>,
    pub body: Option<Map<String, Value>>,
    pub needs_keys: bool,
    pub needs_auth: bool,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: None,
            body: None,
            needs_keys: true,
            needs_auth: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Post, endpoint)
    }

    pub fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query
            .get_or_insert_with(Vec::new)
            .push((name.to_string(), value.into()));
        self
    }

    /// Set the JSON body, which must be an object
    pub fn body(mut self, body: Value) -> Result<Self, MazdaError> {
        match body {
            Value::Object(map) => {
                self.body = Some(map);
                Ok(self)
            }
            other => Err(MazdaError::Configuration(format!(
                "request body for {} must be a JSON object, got {other}",
                self.endpoint
            ))),
        }
    }

    pub fn authenticated(mut self) -> Self {
        self.needs_auth = true;
        self
    }

    pub fn without_keys(mut self) -> Self {
        self.needs_keys = false;
        self
    }

    fn is_key_exchange(&self) -> bool {
        self.endpoint.contains(CHECK_VERSION_ENDPOINT)
    }
}

/// At most one automatic retry per recoverable error kind
#[derive(Debug, Default)]
struct RetryBudget {
    keys_refreshed: bool,
    token_refreshed: bool,
}

impl RetryBudget {
    fn try_spend(&mut self, error: &MazdaError) -> bool {
        let spent = match error {
            MazdaError::EncryptionRejected { .. } => &mut self.keys_refreshed,
            MazdaError::TokenExpired { .. } => &mut self.token_refreshed,
            _ => return false,
        };
        !std::mem::replace(spent, true)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseEnvelope {
    state: Option<String>,
    payload: Option<String>,
    error_code: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptionKeyData {
    public_key: String,
    version_prefix: String,
}

#[derive(Debug, Deserialize)]
struct EncryptionKeyResponse {
    data: EncryptionKeyData,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    status: String,
    data: Option<SessionToken>,
}

/// Client for the encrypted MyMazda API.
///
/// Safe to share between tasks (`Arc<Connection>`); key exchange and login
/// are single-flight across all concurrent callers.
pub struct Connection {
    config: ClientConfig,
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    session: SessionState,
    sensor_data: SensorDataBuilder,
}

impl Connection {
    /// Connect over HTTPS with a fresh `reqwest` client
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self, MazdaError> {
        let transport = HttpTransport::new(config.timeout())?;
        Self::with_transport(credentials, config, Arc::new(transport))
    }

    pub fn with_transport(
        credentials: Credentials,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, MazdaError> {
        if credentials.email().is_empty() {
            return Err(MazdaError::missing("email"));
        }
        if credentials.password().is_empty() {
            return Err(MazdaError::missing("password"));
        }

        let mut sensor_data = SensorDataBuilder::new();
        if let Some(public_key) = &config.sensor_data_public_key {
            sensor_data = sensor_data.with_encryptor(Box::new(HybridSensorEncryptor::new(public_key)?));
        }

        Ok(Self {
            config,
            credentials,
            transport,
            session: SessionState::new(),
            sensor_data,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Send a request, transparently acquiring keys and token.
    ///
    /// Error code 600001 drops the session keys and retries once; 600002 drops
    /// the token and retries once. Anything else is returned as is.
    pub async fn api_request(&self, request: &ApiRequest) -> Result<Value, MazdaError> {
        let mut budget = RetryBudget::default();
        let mut attempt = 1u32;

        loop {
            let keys = if request.needs_keys {
                Some(self.ensure_keys().await?)
            } else {
                None
            };
            let token = if request.needs_auth {
                Some(self.ensure_token().await?)
            } else {
                None
            };

            let error = match self.send_once(request, keys.as_ref(), token.as_ref()).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let recoverable = match &error {
                MazdaError::EncryptionRejected { .. } => keys.is_some(),
                MazdaError::TokenExpired { .. } => token.is_some(),
                _ => false,
            };
            if !recoverable || !budget.try_spend(&error) {
                return Err(error);
            }

            warn!(
                endpoint = %request.endpoint,
                error_code = error.error_code(),
                attempt,
                "Retrying request: {}",
                error
            );
            if let (MazdaError::EncryptionRejected { .. }, Some(stale)) = (&error, &keys) {
                self.session.invalidate_keys(stale);
            }
            if let (MazdaError::TokenExpired { .. }, Some(stale)) = (&error, &token) {
                self.session.invalidate_token(stale);
            }
            attempt += 1;
        }
    }

    /// Log in with the stored credentials, replacing any cached token
    pub async fn login(&self) -> Result<SessionToken, MazdaError> {
        if let Some(stale) = self.session.token() {
            self.session.invalidate_token(&stale);
        }
        self.ensure_token().await
    }

    /// Release the connection. The underlying HTTP pool is dropped once no
    /// other owner of the transport remains.
    pub fn close(self) {
        debug!("Closing connection");
        self.session.clear();
    }

    async fn ensure_keys(&self) -> Result<KeyMaterial, MazdaError> {
        self.session.ensure_keys(|| self.retrieve_keys()).await
    }

    async fn ensure_token(&self) -> Result<SessionToken, MazdaError> {
        self.session.ensure_token(|| self.perform_login()).await
    }

    /// Key exchange: an unkeyed, unauthenticated call whose reply is
    /// encrypted with the static app-code key
    async fn retrieve_keys(&self) -> Result<KeyMaterial, MazdaError> {
        let request = ApiRequest::post(CHECK_VERSION_ENDPOINT).without_keys();
        let response = self.send_once(&request, None, None).await?;
        let keys: KeyMaterial = serde_json::from_value(response)?;
        if keys.enc_key.is_empty() || keys.sign_key.is_empty() {
            return Err(MazdaError::MalformedResponse("key exchange returned empty keys".into()));
        }
        if keys.enc_key.len() != BLOCK_SIZE {
            return Err(MazdaError::MalformedResponse(format!(
                "key exchange returned a {}-byte encryption key, expected {BLOCK_SIZE}",
                keys.enc_key.len()
            )));
        }
        info!("Session keys retrieved");
        Ok(keys)
    }

    async fn perform_login(&self) -> Result<SessionToken, MazdaError> {
        let key_request = HttpRequest::new(Method::Get, self.config.usher_endpoint("system/encryptionKey"))
            .query("appId", USHER_APP_ID)
            .query("locale", self.config.locale.as_str())
            .query("deviceId", USHER_DEVICE_ID)
            .query("sdkVersion", USHER_SDK_VERSION)
            .header("User-Agent", USER_AGENT_USHER_API);
        let key_response = self.transport.request(key_request).await?;
        let EncryptionKeyResponse { data } = serde_json::from_value(key_response.body)?;

        let encrypted_password = encrypt_credential(self.credentials.password(), &data.public_key)?;
        let body = json!({
            "appId": USHER_APP_ID,
            "deviceId": USHER_DEVICE_ID,
            "locale": self.config.locale,
            "password": format!("{}{}", data.version_prefix, encrypted_password),
            "sdkVersion": USHER_SDK_VERSION,
            "userId": self.credentials.email(),
            "userIdType": "email",
        });
        let login_request = HttpRequest::new(Method::Post, self.config.usher_endpoint("user/login"))
            .header("User-Agent", USER_AGENT_USHER_API)
            .body(RequestBody::Json(body));
        let login_response = self.transport.request(login_request).await?;
        let LoginResponse { status, data } = serde_json::from_value(login_response.body)?;

        match status.as_str() {
            "OK" => {
                let token =
                    data.ok_or_else(|| MazdaError::MalformedResponse("login response has no token".into()))?;
                info!(expires = token.expiration_ts, "Logged in");
                Ok(token)
            }
            "INVALID_CREDENTIAL" => Err(MazdaError::Authentication { status }),
            "USER_LOCKED" => Err(MazdaError::AccountLocked { status }),
            _ => Err(MazdaError::LoginFailed { status }),
        }
    }

    /// Encrypt, sign and send one attempt of `request`
    async fn send_once(
        &self,
        request: &ApiRequest,
        keys: Option<&KeyMaterial>,
        token: Option<&SessionToken>,
    ) -> Result<Value, MazdaError> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let enc_key = keys.map(|k| k.enc_key.as_str());
        let sign_key = keys.map(|k| k.sign_key.as_str());

        let encrypted_query = match request.query.as_ref().filter(|q| !q.is_empty()) {
            Some(query) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(query)
                    .finish();
                Some(encrypt_payload(&encoded, enc_key)?)
            }
            None => None,
        };
        let encrypted_body = match request.body.as_ref().filter(|b| !b.is_empty()) {
            Some(body) => Some(encrypt_payload(&serde_json::to_string(body)?, enc_key)?),
            None => None,
        };

        let sign = if request.is_key_exchange() {
            sign_from_timestamp(&self.config.app_code, &timestamp)
        } else {
            let signed_payload = match request.method {
                Method::Get => encrypted_query.as_deref(),
                Method::Post => encrypted_body.as_deref(),
            };
            sign_from_payload_and_timestamp(signed_payload.unwrap_or(""), &timestamp, sign_key)?
        };

        let mut http = HttpRequest::new(request.method, self.config.api_url(&request.endpoint))
            .header("device-id", self.config.device_id.as_str())
            .header("app-code", self.config.app_code.as_str())
            .header("app-os", APP_OS)
            .header("user-agent", self.config.user_agent.as_str())
            .header("app-version", self.config.app_version.as_str())
            .header("app-unique-id", APP_PACKAGE_ID)
            .header("region", self.config.region.to_string())
            .header("access-token", token.map_or("", |t| t.access_token.as_str()))
            .header("language", self.config.language.as_str())
            .header("locale", self.config.locale.as_str())
            .header("X-acf-sensor-data", self.sensor_data.generate()?)
            .header("req-id", format!("req_{timestamp}"))
            .header("timestamp", timestamp.as_str())
            .header("sign", sign);
        if let Some(params) = encrypted_query {
            http = http.query("params", params);
        }
        if let Some(body) = encrypted_body {
            http = http.body(RequestBody::Raw(body));
        }

        debug!(method = %request.method, endpoint = %request.endpoint, "Sending API request");
        let response = self.transport.request(http).await?;
        let envelope: ResponseEnvelope = serde_json::from_value(response.body)?;

        if envelope.state.as_deref() == Some(STATE_SUCCESS) {
            let payload = envelope
                .payload
                .ok_or_else(|| MazdaError::MalformedResponse("successful response has no payload".into()))?;
            return if request.is_key_exchange() {
                decrypt_json(&payload, Some(&decryption_key_from_app_code(&self.config.app_code)))
            } else {
                decrypt_json(&payload, enc_key)
            };
        }

        let code = envelope.error_code.as_ref().and_then(error_code_value);
        debug!(endpoint = %request.endpoint, error_code = code, "API request failed");
        Err(match code {
            Some(code) => ServerErrorCode::from_primitive(code).into_error(response.status),
            None => MazdaError::RequestFailed {
                http_status: response.status,
                code: None,
            },
        })
    }
}

/// `errorCode` may arrive as a number or a numeric string
fn error_code_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
