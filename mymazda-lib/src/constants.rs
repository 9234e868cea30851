// Protocol constants for the MyMazda API

/// Fixed CBC initialisation vector shared by every encrypted payload
pub const IV: &[u8; 16] = b"0102030405060708";

/// Seed mixed into the second stage of app-code key derivation
pub const SIGNATURE_MD5: &str = "C383D8C4D279B78130AD52DC71D95CAA";

/// Android package id of the official app
pub const APP_PACKAGE_ID: &str = "com.interrait.mymazda";

/// Device id sent in the `device-id` header
pub const DEVICE_ID: &str = "D9E89AFC-BD3C-309F-A48C-A2A9466DFE9C";

pub const APP_OS: &str = "Android";

pub const APP_VERSION: &str = "7.1.0";

/// User agent for the main API
pub const USER_AGENT_BASE_API: &str = "MyMazda-Android/7.1.0";

/// User agent for the login ("usher") API
pub const USER_AGENT_USHER_API: &str = "MyMazda/7.1.0 (Google Pixel 3a; Android 11)";

/// Application id sent to the login API
pub const USHER_APP_ID: &str = "MazdaApp";

/// Device id sent to the login API
pub const USHER_DEVICE_ID: &str = "ACCT1195961580";

/// SDK version sent to the login API
pub const USHER_SDK_VERSION: &str = "11.2.0000.002";

pub const DEFAULT_LOCALE: &str = "en-US";

/// Endpoint of the key-exchange call
pub const CHECK_VERSION_ENDPOINT: &str = "service/checkVersion";

/// Business result code of a successful domain action
pub const SUCCESS_RESULT_CODE: &str = "200S00";

/// Response `state` value of a successful call
pub const STATE_SUCCESS: &str = "S";

/// Placeholder that the server substitutes with the caller's internal user id
pub const INTERNAL_USER_ID_PLACEHOLDER: &str = "__INTERNAL_ID__";
