use chrono::{DateTime, Utc};

fn to_signed_32(n: i64) -> i64 {
    n as u32 as i32 as i64
}

fn feistel_round(half: i64, key: i64, round: u32) -> i64 {
    half ^ ((key >> (32 - round)) | to_signed_32(key << round))
}

/// 16-round Feistel mix of two 32-bit halves under `key`.
///
/// Used as the integrity tag of the misc-stats section: the server recomputes
/// it from the event sum, event count and elapsed time, so the round function
/// and round count must not change.
pub fn feistel_cipher(upper_32_bits: i64, lower_32_bits: i64, key: i64) -> i64 {
    let mut upper = to_signed_32(upper_32_bits);
    let mut lower = to_signed_32(lower_32_bits);

    for round in 0..16 {
        let mixed = upper ^ feistel_round(lower, key, round);
        upper = lower;
        lower = mixed;
    }

    (upper << 32) | (lower & 0xFFFF_FFFF)
}

/// Sum of the character codes of `s`
pub fn char_code_sum(s: &str) -> u64 {
    s.chars().map(|c| c as u64).sum()
}

/// Escape every byte outside printable ASCII, plus the separators the
/// sensor-data format uses (`"`, `%`, `'`, `,`, `\`), as `%XX`.
pub fn percent_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        if (33..=0x7E).contains(&byte) && !matches!(byte, b'"' | b'%' | b'\'' | b',' | b'\\') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{byte:X}"));
        }
    }
    encoded
}

/// Milliseconds from `start` to `now`, clamped at zero
pub fn elapsed_ms(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - start).num_milliseconds().max(0)
}
