use crate::constants::APP_PACKAGE_ID;
use crate::sensordata::util::{char_code_sum, percent_encode};
use rand::Rng;
use rand::seq::SliceRandom;

/// Static build properties of one device model
#[derive(Debug, Clone, Copy)]
struct DeviceProfile {
    model: &'static str,
    manufacturer: &'static str,
    brand: &'static str,
    device: &'static str,
    product: &'static str,
    board: &'static str,
    hardware: &'static str,
    bootloader: &'static str,
    build_id: &'static str,
    incremental: &'static str,
    host: &'static str,
    screen: (u32, u32),
}

const DEVICES: &[DeviceProfile] = &[
    DeviceProfile {
        model: "Pixel 3a",
        manufacturer: "Google",
        brand: "google",
        device: "sargo",
        product: "sargo",
        board: "sargo",
        hardware: "sargo",
        bootloader: "b4s4-0.3-6937264",
        build_id: "RQ2A.210305.006",
        incremental: "7119741",
        host: "abfarm-01041",
        screen: (2220, 1080),
    },
    DeviceProfile {
        model: "Pixel 4",
        manufacturer: "Google",
        brand: "google",
        device: "flame",
        product: "flame",
        board: "flame",
        hardware: "flame",
        bootloader: "c2f2-0.3-7064813",
        build_id: "RQ2A.210305.006",
        incremental: "7119741",
        host: "abfarm-01131",
        screen: (2280, 1080),
    },
    DeviceProfile {
        model: "SM-G973U",
        manufacturer: "samsung",
        brand: "samsung",
        device: "beyond1q",
        product: "beyond1qsqw",
        board: "msmnile",
        hardware: "qcom",
        bootloader: "G973USQU4GUA2",
        build_id: "RP1A.200720.012",
        incremental: "G973USQU4GUA2",
        host: "SWDJ7019",
        screen: (2280, 1080),
    },
];

const ANDROID_VERSION: &str = "11";
const ANDROID_SDK_INT: u32 = 30;

/// Randomised device and OS metadata reported in the first section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub screen_height: u32,
    pub screen_width: u32,
    pub battery_charging: bool,
    pub battery_level: u32,
    pub orientation: u32,
    pub language: String,
    pub android_version: String,
    pub accelerometer_rotation: bool,
    pub model: String,
    pub bootloader: String,
    pub hardware: String,
    pub package_name: String,
    pub android_id: String,
    pub keyboard: u32,
    pub adb_enabled: bool,
    pub version_codename: String,
    pub version_incremental: String,
    pub version_sdk: u32,
    pub manufacturer: String,
    pub product: String,
    pub tags: String,
    pub build_type: String,
    pub user: String,
    pub display: String,
    pub board: String,
    pub brand: String,
    pub device: String,
    pub fingerprint: String,
    pub host: String,
    pub build_id: String,
}

impl SystemInfo {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let profile = *DEVICES.choose(rng).unwrap_or(&DEVICES[0]);
        let android_id: u64 = rng.r#gen();
        let fingerprint = format!(
            "{}/{}/{}:{}/{}/{}:user/release-keys",
            profile.brand, profile.product, profile.device, ANDROID_VERSION, profile.build_id, profile.incremental
        );

        Self {
            screen_height: profile.screen.0,
            screen_width: profile.screen.1,
            battery_charging: rng.gen_bool(0.2),
            battery_level: rng.gen_range(10..=90),
            orientation: 1,
            language: "en".to_string(),
            android_version: ANDROID_VERSION.to_string(),
            accelerometer_rotation: rng.gen_bool(0.5),
            model: profile.model.to_string(),
            bootloader: profile.bootloader.to_string(),
            hardware: profile.hardware.to_string(),
            package_name: APP_PACKAGE_ID.to_string(),
            android_id: format!("{android_id:016x}"),
            keyboard: 1,
            adb_enabled: false,
            version_codename: "REL".to_string(),
            version_incremental: profile.incremental.to_string(),
            version_sdk: ANDROID_SDK_INT,
            manufacturer: profile.manufacturer.to_string(),
            product: profile.product.to_string(),
            tags: "release-keys".to_string(),
            build_type: "user".to_string(),
            user: "android-build".to_string(),
            display: profile.build_id.to_string(),
            board: profile.board.to_string(),
            brand: profile.brand.to_string(),
            device: profile.device.to_string(),
            fingerprint,
            host: profile.host.to_string(),
            build_id: profile.build_id.to_string(),
        }
    }

    /// Checksum reported alongside this section
    pub fn char_code_sum(&self) -> u64 {
        char_code_sum(&self.to_string())
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields = [
            "-1".to_string(),
            "uaend".to_string(),
            "-1".to_string(),
            self.screen_height.to_string(),
            self.screen_width.to_string(),
            flag(self.battery_charging).to_string(),
            self.battery_level.to_string(),
            self.orientation.to_string(),
            percent_encode(&self.language),
            percent_encode(&self.android_version),
            flag(self.accelerometer_rotation).to_string(),
            percent_encode(&self.model),
            percent_encode(&self.bootloader),
            percent_encode(&self.hardware),
            "-1".to_string(),
            self.package_name.clone(),
            "-1".to_string(),
            "-1".to_string(),
            self.android_id.clone(),
            "-1".to_string(),
            self.keyboard.to_string(),
            flag(self.adb_enabled).to_string(),
            percent_encode(&self.version_codename),
            percent_encode(&self.version_incremental),
            self.version_sdk.to_string(),
            percent_encode(&self.manufacturer),
            percent_encode(&self.product),
            percent_encode(&self.tags),
            percent_encode(&self.build_type),
            percent_encode(&self.user),
            percent_encode(&self.display),
            percent_encode(&self.board),
            percent_encode(&self.brand),
            percent_encode(&self.device),
            percent_encode(&self.fingerprint),
            percent_encode(&self.host),
            percent_encode(&self.build_id),
        ];
        f.write_str(&fields.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_count_is_stable() {
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let info = SystemInfo::random(&mut rng);
            assert_eq!(info.to_string().split(',').count(), 37);
        }
    }

    #[test]
    fn test_values_with_spaces_are_encoded() {
        let mut info = SystemInfo::random(&mut rand::thread_rng());
        info.model = "Pixel 3a".to_string();
        let rendered = info.to_string();
        assert!(rendered.contains("Pixel%203a"));
        assert!(!rendered.contains(' '));
    }

    #[test]
    fn test_char_code_sum_matches_rendering() {
        let info = SystemInfo::random(&mut rand::thread_rng());
        let expected: u64 = info.to_string().chars().map(|c| c as u64).sum();
        assert_eq!(info.char_code_sum(), expected);
    }
}
