use chrono::{DateTime, Utc};
use regex::Regex;

use crate::DarajaApiError;

/// Normalises a Kenyan phone number to the canonical MSISDN form Daraja expects (2547XXXXXXXX / 2541XXXXXXXX).
///
/// Accepts local ("07..", "01.."), international ("+254..") and already-canonical ("254..") forms. Anything that does
/// not normalise to a valid Safaricom MSISDN is rejected.
pub fn normalize_msisdn(phone: &str) -> Result<String, DarajaApiError> {
    let trimmed: String = phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    let msisdn = if let Some(rest) = trimmed.strip_prefix("+254") {
        format!("254{rest}")
    } else if let Some(rest) = trimmed.strip_prefix('0') {
        format!("254{rest}")
    } else {
        trimmed
    };
    let pattern = Regex::new(r"^254[17]\d{8}$").expect("hardcoded regex is valid");
    if pattern.is_match(&msisdn) {
        Ok(msisdn)
    } else {
        Err(DarajaApiError::InvalidMsisdn(phone.to_string()))
    }
}

/// The Daraja STK password: base64(shortcode + passkey + timestamp), with the timestamp in yyyyMMddHHmmss form.
pub fn stk_password(shortcode: &str, passkey: &str, at: DateTime<Utc>) -> (String, String) {
    let timestamp = at.format("%Y%m%d%H%M%S").to_string();
    let password = base64::encode(format!("{shortcode}{passkey}{timestamp}"));
    (password, timestamp)
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn local_and_international_forms_normalise() {
        assert_eq!(normalize_msisdn("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("+254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("0110 123 456").unwrap(), "254110123456");
    }

    #[test]
    fn junk_numbers_are_rejected()  {
        for bad in ["", "12345", "25571234567", "07123456789", "not-a-number"] {
            assert!(normalize_msisdn(bad).is_err(), "{bad} should not normalise");
        }
    }

    #[test]
    fn password_is_deterministic() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        let (password, timestamp) = stk_password("174379", "secret", at);
        assert_eq!(timestamp, "20240601123000");
        assert_eq!(password, base64::encode("174379secret20240601123000"));
    }
}
