//! Display helpers for graph attributes, labels and CLI output.

use chrono::{DateTime, Utc};
use tokengraph_core::TokenAmount;

/// `2022-09-22 00:12:43.145`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// `00:12:43`
pub fn format_timestamp_short(ts: &DateTime<Utc>) -> String {
    ts.format("%H:%M:%S").to_string()
}

/// `0xdA6c517C4ed4134E5Ae1f825d028559f267767df` becomes `0xdA6c...df`.
pub fn short_address(addr: &str) -> String {
    if addr.len() <= 8 || !addr.is_ascii() {
        return addr.to_string();
    }
    format!("{}...{}", &addr[..6], &addr[addr.len() - 2..])
}

/// `16345454` becomes `16_345_454`.
pub fn block_number_with_underscores(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('_');
        }
        out.push(c);
    }
    out
}

/// Scale a raw token amount by `decimals` and round to two places.
///
/// `123456789` with 6 decimals is `123.46`. Zero stays zero.
pub fn scale_token_value(value: &TokenAmount, decimals: u8) -> f64 {
    if value.is_zero() {
        return 0.0;
    }
    let raw: f64 = value.to_string().parse().unwrap_or(0.0);
    let scaled = raw / 10f64.powi(i32::from(decimals));
    if !scaled.is_finite() {
        return 0.0;
    }
    (scaled * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps() {
        let ts = Utc.with_ymd_and_hms(2022, 9, 22, 0, 12, 43).unwrap()
            + chrono::Duration::milliseconds(145);
        assert_eq!(format_timestamp(&ts), "2022-09-22 00:12:43.145");
        assert_eq!(format_timestamp_short(&ts), "00:12:43");
    }

    #[test]
    fn shortened_addresses() {
        assert_eq!(short_address("0xdA6c517C4ed4134E5Ae1f825d028559f267767df"), "0xdA6c...df");
        assert_eq!(short_address("0x1234"), "0x1234");
    }

    #[test]
    fn underscores() {
        assert_eq!(block_number_with_underscores(16_345_454), "16_345_454");
        assert_eq!(block_number_with_underscores(345_454), "345_454");
        assert_eq!(block_number_with_underscores(45_454), "45_454");
        assert_eq!(block_number_with_underscores(7), "7");
        assert_eq!(block_number_with_underscores(0), "0");
    }

    #[test]
    fn scaling() {
        assert_eq!(scale_token_value(&TokenAmount::from(123_456_789u64), 6), 123.46);
        assert_eq!(scale_token_value(&TokenAmount::from(5u64), 0), 5.0);
        assert_eq!(scale_token_value(&TokenAmount::zero(), 18), 0.0);
        assert_eq!(scale_token_value(&TokenAmount::from(10u64.pow(18)), 18), 1.0);
        assert_eq!(scale_token_value(&TokenAmount::from(4u64), 3), 0.0);
    }

    #[test]
    fn scaling_amounts_wider_than_256_bits() {
        let mut wide = vec![0u8; 33];
        wide[0] = 1;
        // 2^256 / 10^18
        let scaled = scale_token_value(&TokenAmount::from_be_slice(&wide), 18);
        assert!((scaled / 1.157_920_892_373_162e59 - 1.0).abs() < 1e-9);
    }
}
