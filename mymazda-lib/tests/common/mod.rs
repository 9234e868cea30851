//! Common test utilities: an in-memory MyMazda server

// Shared across several test files; not every item is used in each
#![allow(dead_code, unused_imports)]

pub use mymazda_lib::cipher::{decrypt_json, encrypt_payload, public_key_to_base64};
pub use mymazda_lib::connection::{ApiRequest, Connection};
pub use mymazda_lib::error::{ErrorKind, MazdaError};
pub use mymazda_lib::keys::{decryption_key_from_app_code, sign_from_payload_and_timestamp, sign_from_timestamp};
pub use mymazda_lib::session::SessionToken;
pub use mymazda_lib::transport::{HttpRequest, HttpResponse, Method, RequestBody, Transport};
pub use mymazda_lib::{ClientConfig, Credentials, Region};
pub use serde_json::{Value, json};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

pub const EMAIL: &str = "driver@example.com";
pub const PASSWORD: &str = "hunter2";
pub const VERSION_PREFIX: &str = "v1:";

/// One RSA key for the whole test binary; generation is slow
pub fn login_private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("Failed to generate RSA key"))
}

/// Scripted reply for the next main-API call
#[derive(Debug, Clone)]
pub enum Reply {
    /// `{state: "F", errorCode: code}`
    Error(u32),
    /// Successful response with this decrypted payload
    Payload(Value),
    /// Envelope returned verbatim
    Raw(Value),
}

pub struct MockServer {
    config: ClientConfig,
    keys: Mutex<(String, String)>,
    key_generation: AtomicUsize,
    issued_tokens: Mutex<HashSet<String>>,
    login_status: Mutex<String>,
    login_delay: Mutex<Option<Duration>>,
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
    pub check_version_calls: AtomicUsize,
    pub encryption_key_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub api_calls: AtomicUsize,
}

impl MockServer {
    pub fn new(config: &ClientConfig) -> Arc<Self> {
        Arc::new(Self {
            config: config.clone(),
            keys: Mutex::new(Self::keys_for_generation(0)),
            key_generation: AtomicUsize::new(0),
            issued_tokens: Mutex::new(HashSet::new()),
            login_status: Mutex::new("OK".to_string()),
            login_delay: Mutex::new(None),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            check_version_calls: AtomicUsize::new(0),
            encryption_key_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            api_calls: AtomicUsize::new(0),
        })
    }

    fn keys_for_generation(generation: usize) -> (String, String) {
        (format!("enckey{generation:010}"), format!("signkey-{generation}"))
    }

    pub fn enc_key(&self) -> String {
        self.keys.lock().unwrap().0.clone()
    }

    pub fn sign_key(&self) -> String {
        self.keys.lock().unwrap().1.clone()
    }

    /// Issue new session keys; requests encrypted with the old ones are rejected
    pub fn rotate_keys(&self) {
        let generation = self.key_generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.keys.lock().unwrap() = Self::keys_for_generation(generation);
    }

    /// Hand out these keys on the next key exchange
    pub fn set_keys(&self, enc_key: &str, sign_key: &str) {
        *self.keys.lock().unwrap() = (enc_key.to_string(), sign_key.to_string());
    }

    /// Forget every issued token; the next authenticated call gets 600002
    pub fn expire_tokens(&self) {
        self.issued_tokens.lock().unwrap().clear();
    }

    pub fn set_login_status(&self, status: &str) {
        *self.login_status.lock().unwrap() = status.to_string();
    }

    pub fn set_login_delay(&self, delay: Duration) {
        *self.login_delay.lock().unwrap() = Some(delay);
    }

    pub fn push_reply(&self, reply: Reply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests sent to the encrypted API (login traffic excluded)
    pub fn api_requests(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with(&self.config.base_url))
            .collect()
    }

    fn ok(payload: Value) -> HttpResponse {
        HttpResponse { status: 200, body: payload }
    }

    fn failure(code: u32) -> HttpResponse {
        Self::ok(json!({"state": "F", "errorCode": code}))
    }

    fn encrypted(payload: &Value, key: &str) -> HttpResponse {
        let payload = encrypt_payload(&payload.to_string(), Some(key)).unwrap();
        Self::ok(json!({"state": "S", "payload": payload}))
    }

    fn handle_encryption_key(&self) -> HttpResponse {
        self.encryption_key_calls.fetch_add(1, Ordering::SeqCst);
        let public_key = public_key_to_base64(&login_private_key().to_public_key()).unwrap();
        Self::ok(json!({"data": {"publicKey": public_key, "versionPrefix": VERSION_PREFIX}}))
    }

    async fn handle_login(&self, request: &HttpRequest) -> HttpResponse {
        let n = self.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = *self.login_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let RequestBody::Json(body) = &request.body else {
            panic!("login body must be JSON");
        };
        assert_eq!(body["userId"], EMAIL);
        assert_eq!(body["userIdType"], "email");
        let password = body["password"].as_str().unwrap();
        let encrypted = password.strip_prefix(VERSION_PREFIX).expect("missing version prefix");
        let decrypted = login_private_key()
            .decrypt(Pkcs1v15Encrypt, &BASE64.decode(encrypted).unwrap())
            .unwrap();
        let decrypted = String::from_utf8(decrypted).unwrap();
        let (secret, timestamp) = decrypted.rsplit_once(':').unwrap();
        let correct = secret == PASSWORD && timestamp.parse::<i64>().is_ok();

        let status = self.login_status.lock().unwrap().clone();
        if status != "OK" {
            return Self::ok(json!({"status": status}));
        }
        if !correct {
            return Self::ok(json!({"status": "INVALID_CREDENTIAL"}));
        }

        let token = format!("token-{n}");
        self.issued_tokens.lock().unwrap().insert(token.clone());
        let expires = chrono::Utc::now().timestamp() + 3600;
        Self::ok(json!({
            "status": "OK",
            "data": {"accessToken": token, "accessTokenExpirationTs": expires}
        }))
    }

    fn handle_check_version(&self, request: &HttpRequest) -> HttpResponse {
        self.check_version_calls.fetch_add(1, Ordering::SeqCst);
        let timestamp = request.header_value("timestamp").unwrap();
        let expected = sign_from_timestamp(&self.config.app_code, timestamp);
        if request.header_value("sign") != Some(expected.as_str()) {
            return Self::failure(600001);
        }

        let (enc_key, sign_key) = self.keys.lock().unwrap().clone();
        let payload = json!({"encKey": enc_key, "signKey": sign_key});
        Self::encrypted(&payload, &decryption_key_from_app_code(&self.config.app_code))
    }

    fn handle_api(&self, request: &HttpRequest) -> HttpResponse {
        self.api_calls.fetch_add(1, Ordering::SeqCst);
        let (enc_key, sign_key) = self.keys.lock().unwrap().clone();

        let timestamp = request.header_value("timestamp").unwrap();
        assert_eq!(request.header_value("req-id"), Some(format!("req_{timestamp}").as_str()));
        let signed = match (&request.method, &request.body) {
            (Method::Post, RequestBody::Raw(body)) => body.as_str(),
            (Method::Get, _) => request.query_value("params").unwrap_or(""),
            _ => "",
        };
        let expected = sign_from_payload_and_timestamp(signed, timestamp, Some(&sign_key)).unwrap();
        if request.header_value("sign") != Some(expected.as_str()) {
            return Self::failure(600001);
        }

        let body = match &request.body {
            RequestBody::Raw(body) => match decrypt_json(body, Some(&enc_key)) {
                Ok(body) => body,
                Err(_) => return Self::failure(600001),
            },
            _ => Value::Null,
        };
        let query = match request.query_value("params") {
            Some(params) => match mymazda_lib::cipher::decrypt_payload(params, Some(&enc_key)) {
                Ok(query) => Value::String(String::from_utf8(query).unwrap()),
                Err(_) => return Self::failure(600001),
            },
            None => Value::Null,
        };

        let access_token = request.header_value("access-token").unwrap_or("");
        let authenticated = self.issued_tokens.lock().unwrap().contains(access_token);

        let reply = self.script.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Error(code)) => Self::failure(code),
            Some(Reply::Raw(envelope)) => Self::ok(envelope),
            Some(Reply::Payload(payload)) => Self::encrypted(&payload, &enc_key),
            None if request.url.contains("remoteServices") && !authenticated => Self::failure(600002),
            None => {
                let payload = json!({
                    "resultCode": "200S00",
                    "echo": {"body": body, "query": query, "accessToken": access_token}
                });
                Self::encrypted(&payload, &enc_key)
            }
        }
    }
}

#[async_trait]
impl Transport for MockServer {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, MazdaError> {
        self.requests.lock().unwrap().push(request.clone());

        let response = if request.url.ends_with("system/encryptionKey") {
            self.handle_encryption_key()
        } else if request.url.ends_with("user/login") {
            self.handle_login(&request).await
        } else if request.url.contains("checkVersion") {
            self.handle_check_version(&request)
        } else {
            self.handle_api(&request)
        };
        Ok(response)
    }
}

/// Route library logs to the test harness; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config pointing at fake hosts, so any real network use fails loudly
pub fn test_config() -> ClientConfig {
    ClientConfig::for_region(Region::Mnao).with_base_urls("https://api.test/prod/", "https://login.test/appapi/v1/")
}

pub fn connect() -> (Arc<MockServer>, Connection) {
    init_tracing();
    let config = test_config();
    let server = MockServer::new(&config);
    let connection =
        Connection::with_transport(Credentials::new(EMAIL, PASSWORD), config, server.clone()).unwrap();
    (server, connection)
}
