//! Client configuration
//!
//! Everything the protocol treats as an app-wide constant but that varies per
//! deployment (app code, hosts, locale) lives in an immutable [`ClientConfig`]
//! that is handed to the client at construction.

use crate::constants::{APP_VERSION, DEFAULT_LOCALE, DEVICE_ID, USER_AGENT_BASE_API};
use crate::error::MazdaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use strum_macros::{AsRefStr, Display};

/// Regional deployment of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
pub enum Region {
    /// North America
    #[strum(serialize = "MNAO")]
    #[serde(rename = "MNAO")]
    Mnao,
    /// Europe
    #[strum(serialize = "MME")]
    #[serde(rename = "MME")]
    Mme,
    /// Japan
    #[strum(serialize = "MJO")]
    #[serde(rename = "MJO")]
    Mjo,
}

impl Region {
    /// App code registered for this region's app build
    pub fn app_code(self) -> &'static str {
        match self {
            Region::Mnao => "202007270941270111799",
            Region::Mme => "202008100250281064816",
            Region::Mjo => "202009170613074283422",
        }
    }

    /// Base URL of the encrypted API
    pub fn base_url(self) -> &'static str {
        match self {
            Region::Mnao => "https://0cxo7m58.mazda.com/prod/",
            Region::Mme => "https://e9stj7g7.mazda.com/prod/",
            Region::Mjo => "https://wcs9p6wj.mazda.com/prod/",
        }
    }

    /// Base URL of the login API
    pub fn usher_url(self) -> &'static str {
        match self {
            Region::Mnao => "https://ptznwbh8.mazda.com/appapi/v1/",
            Region::Mme => "https://rz97suam.mazda.com/appapi/v1/",
            Region::Mjo => "https://c5ulfwxr.mazda.com/appapi/v1/",
        }
    }
}

impl FromStr for Region {
    type Err = MazdaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MNAO" => Ok(Region::Mnao),
            "MME" => Ok(Region::Mme),
            "MJO" => Ok(Region::Mjo),
            other => Err(MazdaError::Configuration(format!("Unknown region: {other}"))),
        }
    }
}

/// Account credentials, fixed for the lifetime of a client
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Immutable per-client configuration
///
/// When deserialized, fields left out are taken from
/// [`ClientConfig::for_region`] of the given region, so the app code and both
/// hosts always belong to the same deployment unless overridden explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PartialClientConfig")]
pub struct ClientConfig {
    pub region: Region,
    pub app_code: String,
    pub base_url: String,
    pub usher_url: String,
    pub locale: String,
    pub language: String,
    pub device_id: String,
    pub app_version: String,
    pub user_agent: String,
    /// Base64 DER RSA public key used to wrap sensor-data keys. Without it the
    /// sensor-data header is sent empty.
    pub sensor_data_public_key: Option<String>,
    /// Whole-request timeout in seconds for the built-in HTTP transport
    pub timeout_secs: Option<u64>,
}

/// On-disk shape of [`ClientConfig`]; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PartialClientConfig {
    region: Option<Region>,
    app_code: Option<String>,
    base_url: Option<String>,
    usher_url: Option<String>,
    locale: Option<String>,
    language: Option<String>,
    device_id: Option<String>,
    app_version: Option<String>,
    user_agent: Option<String>,
    sensor_data_public_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl From<PartialClientConfig> for ClientConfig {
    fn from(partial: PartialClientConfig) -> Self {
        let mut config = ClientConfig::for_region(partial.region.unwrap_or(Region::Mnao));
        if let Some(locale) = partial.locale {
            config = config.with_locale(locale);
        }
        if let Some(language) = partial.language {
            config.language = language;
        }
        if let Some(app_code) = partial.app_code {
            config.app_code = app_code;
        }
        if let Some(base_url) = partial.base_url {
            config.base_url = base_url;
        }
        if let Some(usher_url) = partial.usher_url {
            config.usher_url = usher_url;
        }
        if let Some(device_id) = partial.device_id {
            config.device_id = device_id;
        }
        if let Some(app_version) = partial.app_version {
            config.app_version = app_version;
        }
        if let Some(user_agent) = partial.user_agent {
            config.user_agent = user_agent;
        }
        config.sensor_data_public_key = partial.sensor_data_public_key;
        if partial.timeout_secs.is_some() {
            config.timeout_secs = partial.timeout_secs;
        }
        config
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_region(Region::Mnao)
    }
}

impl ClientConfig {
    pub fn for_region(region: Region) -> Self {
        Self {
            region,
            app_code: region.app_code().to_string(),
            base_url: region.base_url().to_string(),
            usher_url: region.usher_url().to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            language: DEFAULT_LOCALE.to_string(),
            device_id: DEVICE_ID.to_string(),
            app_version: APP_VERSION.to_string(),
            user_agent: USER_AGENT_BASE_API.to_string(),
            sensor_data_public_key: None,
            timeout_secs: Some(30),
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        let locale = locale.into();
        self.language = locale.clone();
        self.locale = locale;
        self
    }

    pub fn with_base_urls(mut self, base_url: impl Into<String>, usher_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.usher_url = usher_url.into();
        self
    }

    pub fn with_sensor_data_public_key(mut self, key: impl Into<String>) -> Self {
        self.sensor_data_public_key = Some(key.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub(crate) fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    pub(crate) fn usher_endpoint(&self, endpoint: &str) -> String {
        format!("{}{}", self.usher_url, endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parsing() {
        assert_eq!("mnao".parse::<Region>().unwrap(), Region::Mnao);
        assert_eq!("MME".parse::<Region>().unwrap(), Region::Mme);
        assert_eq!("Mjo".parse::<Region>().unwrap(), Region::Mjo);
        assert!(matches!("EU".parse::<Region>(), Err(MazdaError::Configuration(_))));
    }

    #[test]
    fn test_region_display_is_wire_code() {
        assert_eq!(Region::Mnao.to_string(), "MNAO");
        assert_eq!(Region::Mme.as_ref(), "MME");
    }

    #[test]
    fn test_config_for_region() {
        let config = ClientConfig::for_region(Region::Mme);
        assert_eq!(config.app_code, "202008100250281064816");
        assert_eq!(config.api_url("service/checkVersion"), "https://e9stj7g7.mazda.com/prod/service/checkVersion");
        assert_eq!(
            config.usher_endpoint("user/login"),
            "https://rz97suam.mazda.com/appapi/v1/user/login"
        );
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"region":"MJO","locale":"ja-JP"}"#).unwrap();
        assert_eq!(config.region, Region::Mjo);
        assert_eq!(config.locale, "ja-JP");
        assert_eq!(config.language, "ja-JP");
        assert_eq!(config.app_code, Region::Mjo.app_code());
        assert_eq!(config.base_url, Region::Mjo.base_url());
        assert_eq!(config.usher_url, Region::Mjo.usher_url());
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.sensor_data_public_key, None);
    }

    #[test]
    fn test_config_deserialize_keeps_overrides() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"region":"MME","base_url":"https://api.test/prod/","timeout_secs":5}"#).unwrap();
        assert_eq!(config.app_code, Region::Mme.app_code());
        assert_eq!(config.base_url, "https://api.test/prod/");
        assert_eq!(config.usher_url, Region::Mme.usher_url());
        assert_eq!(config.timeout_secs, Some(5));
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = ClientConfig::for_region(Region::Mjo).with_locale("ja-JP");
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<ClientConfig>(&json).unwrap(), config);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("user@example.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("user@example.com"));
        assert!(!debug.contains("hunter2"));
    }
}
