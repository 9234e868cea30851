//! Synthetic device fingerprint ("sensor data")
//!
//! Every API request carries an `X-acf-sensor-data` header holding an encrypted
//! blob of device metadata, synthetic user-interaction events and a checksum
//! section. The blob is rebuilt for each request attempt.
//!
//! # Layout
//!
//! The plaintext is the SDK version followed by sections, each introduced by a
//! `-1,2,-94,<id>,` marker:
//!
//! | id     | content                                   |
//! |--------|-------------------------------------------|
//! | `-100` | system info, its char-code sum, nonce, start/2 |
//! | `-101` | listener flags                            |
//! | `-102` | edited text (empty)                       |
//! | `-108` | key events                                |
//! | `-117` | touch events                              |
//! | `-111` `-109` `-144` `-142` `-145` `-143` | orientation/motion (empty) |
//! | `-115` | misc stats with the Feistel checksum      |
//! | `-106` | stored values                             |
//! | `-120` | stack traces (empty)                      |
//! | `-112` | performance results                       |
//! | `-103` | background events                         |

pub mod background_events;
pub mod encryptor;
pub mod key_events;
pub mod performance;
pub mod system_info;
pub mod touch_events;
pub mod util;

use crate::error::MazdaError;
use background_events::BackgroundEventList;
use chrono::{DateTime, Utc};
use encryptor::SensorDataEncryptor;
use key_events::KeyEventList;
use performance::PerformanceTestResults;
use rand::Rng;
use system_info::SystemInfo;
use touch_events::TouchEventList;
use util::{elapsed_ms, feistel_cipher};

pub const SDK_VERSION: &str = "2.2.3";

const SECTION_PREFIX: &str = "-1,2,-94,";

/// Probabilities of the optional event sections, as `1 / odds`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDataOptions {
    pub key_event_odds: u32,
    pub background_event_odds: u32,
}

impl Default for SensorDataOptions {
    fn default() -> Self {
        Self {
            key_event_odds: 20,
            background_event_odds: 10,
        }
    }
}

/// Per-client fingerprint generator.
///
/// Device identity, performance results and the collection start time are
/// fixed at construction; event sections are regenerated on every build.
pub struct SensorDataBuilder {
    started_at: DateTime<Utc>,
    device_info_time: u32,
    system_info: SystemInfo,
    performance: PerformanceTestResults,
    options: SensorDataOptions,
    encryptor: Option<Box<dyn SensorDataEncryptor>>,
}

impl SensorDataBuilder {
    pub fn new() -> Self {
        Self::started_at(Utc::now(), SensorDataOptions::default())
    }

    /// Builder whose collection window opened at `start`
    pub fn started_at(start: DateTime<Utc>, options: SensorDataOptions) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            started_at: start,
            device_info_time: rng.gen_range(3..8) * 1000,
            system_info: SystemInfo::random(&mut rng),
            performance: PerformanceTestResults::random(&mut rng),
            options,
            encryptor: None,
        }
    }

    pub fn with_encryptor(mut self, encryptor: Box<dyn SensorDataEncryptor>) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    pub fn started(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn has_encryptor(&self) -> bool {
        self.encryptor.is_some()
    }

    /// Produce the header value for one request attempt.
    ///
    /// Without an encryptor the header is sent empty.
    pub fn generate(&self) -> Result<String, MazdaError> {
        match &self.encryptor {
            Some(encryptor) => encryptor.encrypt(&self.build()),
            None => Ok(String::new()),
        }
    }

    /// Plaintext blob as of now
    pub fn build(&self) -> String {
        self.build_at(Utc::now())
    }

    pub fn build_at(&self, now: DateTime<Utc>) -> String {
        self.build_with_rng(&mut rand::thread_rng(), now)
    }

    pub fn build_with_rng<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> String {
        let start_ms = self.started_at.timestamp_millis();
        let elapsed = elapsed_ms(self.started_at, now);

        let mut touch_events = TouchEventList::default();
        touch_events.randomize(rng, elapsed);
        let mut key_events = KeyEventList::default();
        key_events.randomize(rng, elapsed, self.options.key_event_odds);
        let mut background_events = BackgroundEventList::default();
        background_events.randomize(rng, start_ms, elapsed, self.options.background_event_odds);

        let nonce: i32 = rng.r#gen();
        let orientation_events = "";
        let motion_events = "";

        let stats = MiscStats {
            key_sum: key_events.sum(),
            touch_sum: touch_events.sum(),
            key_count: key_events.len() as i64,
            touch_count: touch_events.len() as i64,
            orientation_count: orientation_events.matches(';').count() as i64,
            motion_count: motion_events.matches(';').count() as i64,
            elapsed_ms: elapsed,
            device_info_time: self.device_info_time,
            sensor_delay: rng.gen_range(5..15) * 1000,
            start_ms,
        };

        let mut out = String::from(SDK_VERSION);
        let mut section = |id: &str, body: &str| {
            out.push_str(SECTION_PREFIX);
            out.push_str(id);
            out.push(',');
            out.push_str(body);
        };

        section(
            "-100",
            &format!(
                "{},{},{},{}",
                self.system_info,
                self.system_info.char_code_sum(),
                nonce,
                start_ms / 2
            ),
        );
        section("-101", "do_en,dm_en,t_en");
        section("-102", "");
        section("-108", &key_events.to_string());
        section("-117", &touch_events.to_string());
        section("-111", orientation_events);
        section("-109", motion_events);
        section("-144", "");
        section("-142", "");
        section("-145", "");
        section("-143", "");
        section("-115", &stats.to_string());
        section("-106", "-1,0");
        section("-120", "");
        section("-112", &self.performance.to_string());
        section("-103", &background_events.to_string());

        out
    }
}

impl Default for SensorDataBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SensorDataBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorDataBuilder")
            .field("started_at", &self.started_at)
            .field("options", &self.options)
            .field("has_encryptor", &self.encryptor.is_some())
            .finish_non_exhaustive()
    }
}

/// The `-115` section
struct MiscStats {
    key_sum: i64,
    touch_sum: i64,
    key_count: i64,
    touch_count: i64,
    orientation_count: i64,
    motion_count: i64,
    elapsed_ms: i64,
    device_info_time: u32,
    sensor_delay: u32,
    start_ms: i64,
}

impl std::fmt::Display for MiscStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let orientation_sum = 0i64;
        let motion_sum = 0i64;
        let overall_sum = self.key_sum + self.touch_sum + orientation_sum + motion_sum;
        let event_count = self.key_count + self.touch_count + self.orientation_count + self.motion_count;
        let checksum = feistel_cipher(overall_sum, event_count, self.elapsed_ms);

        write!(
            f,
            "{},{},{},{},{},{},{},{},{},{},{},{},0,{},{},0",
            self.key_sum,
            self.touch_sum,
            orientation_sum,
            motion_sum,
            overall_sum,
            self.elapsed_ms,
            self.key_count,
            self.touch_count,
            self.orientation_count,
            self.motion_count,
            self.device_info_time,
            self.sensor_delay,
            checksum,
            self.start_ms
        )
    }
}
