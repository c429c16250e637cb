//! Bounded integer and boolean parsing for configuration values
//!
//! Integers accept `0x`/`0` radix prefixes and an optional `k`, `m` or `g`
//! unit suffix (case-insensitive, powers of 1024). Booleans accept the usual
//! spellings as well as any integer.

/// Why a value failed to parse
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid value '{0}'")]
    Invalid(String),

    #[error("value '{0}' out of range")]
    OutOfRange(String),

    #[error("bad boolean environment value '{value}' for '{key}'")]
    BadEnvBool { key: String, value: String },

    #[error("failed to parse {key}: {source}")]
    BadEnvNumber {
        key: String,
        #[source]
        source: Box<ParseError>,
    },
}

fn unit_factor(suffix: &str) -> Option<u128> {
    if suffix.is_empty() {
        Some(1)
    } else if suffix.eq_ignore_ascii_case("k") {
        Some(1024)
    } else if suffix.eq_ignore_ascii_case("m") {
        Some(1024 * 1024)
    } else if suffix.eq_ignore_ascii_case("g") {
        Some(1024 * 1024 * 1024)
    } else {
        None
    }
}

/// Scan an optionally signed integer with C-style radix detection.
/// Returns (negative, magnitude, rest).
fn scan_integer(value: &str) -> Result<(bool, u128, &str), ParseError> {
    let invalid = || ParseError::Invalid(value.to_string());
    let mut s = value.trim_start();

    let negative = match s.as_bytes().first() {
        Some(b'-') => {
            s = &s[1..];
            true
        }
        Some(b'+') => {
            s = &s[1..];
            false
        }
        _ => false,
    };

    let has_hex_prefix = (s.starts_with("0x") || s.starts_with("0X"))
        && s[2..].chars().next().is_some_and(|c| c.is_ascii_hexdigit());
    let (radix, digits) = if has_hex_prefix {
        (16, &s[2..])
    } else if s.starts_with('0') {
        (8, s)
    } else {
        (10, s)
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        return Err(invalid());
    }

    let mut magnitude: u128 = 0;
    for c in digits[..end].chars() {
        let digit = c.to_digit(radix).ok_or_else(invalid)? as u128;
        magnitude = magnitude
            .checked_mul(radix as u128)
            .and_then(|m| m.checked_add(digit))
            .ok_or_else(|| ParseError::OutOfRange(value.to_string()))?;
    }
    Ok((negative, magnitude, &digits[end..]))
}

/// Parse a signed integer no larger in magnitude than `max` (and no smaller
/// than `-max - 1`), applying any unit suffix.
pub fn parse_signed(value: &str, max: i64) -> Result<i64, ParseError> {
    debug_assert!(max >= 0, "max must be a positive integer");
    if value.is_empty() {
        return Err(ParseError::Invalid(value.to_string()));
    }
    let (negative, magnitude, rest) = scan_integer(value)?;
    let factor = unit_factor(rest).ok_or_else(|| ParseError::Invalid(value.to_string()))?;

    let limit = if negative { max as u128 + 1 } else { max as u128 };
    if magnitude > limit / factor {
        return Err(ParseError::OutOfRange(value.to_string()));
    }
    let scaled = magnitude * factor;
    Ok(if negative {
        (scaled as i128).wrapping_neg() as i64
    } else {
        scaled as i64
    })
}

/// Parse an unsigned integer no larger than `max`, applying any unit suffix.
/// Negative input is rejected outright.
pub fn parse_unsigned(value: &str, max: u64) -> Result<u64, ParseError> {
    if value.is_empty() || value.contains('-') {
        return Err(ParseError::Invalid(value.to_string()));
    }
    let (_, magnitude, rest) = scan_integer(value)?;
    let factor = unit_factor(rest).ok_or_else(|| ParseError::Invalid(value.to_string()))?;
    match magnitude.checked_mul(factor) {
        Some(v) if v <= max as u128 => Ok(v as u64),
        _ => Err(ParseError::OutOfRange(value.to_string())),
    }
}

pub fn parse_int(value: &str) -> Result<i32, ParseError> {
    parse_signed(value, i32::MAX as i64).map(|v| v as i32)
}

pub fn parse_i64(value: &str) -> Result<i64, ParseError> {
    parse_signed(value, i64::MAX)
}

pub fn parse_ulong(value: &str) -> Result<u64, ParseError> {
    parse_unsigned(value, u64::MAX)
}

/// Recognize the textual boolean spellings. A key present without any
/// value (`None`) counts as true; an empty value counts as false.
pub fn parse_maybe_bool_text(value: Option<&str>) -> Option<bool> {
    let Some(value) = value else {
        return Some(true);
    };
    if value.is_empty() {
        return Some(false);
    }
    if ["true", "yes", "on"].iter().any(|t| value.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if ["false", "no", "off"].iter().any(|f| value.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

/// Like [`parse_maybe_bool_text`], but any integer is also accepted
/// (non-zero is true).
pub fn parse_maybe_bool(value: Option<&str>) -> Option<bool> {
    parse_maybe_bool_text(value).or_else(|| value.and_then(|v| parse_int(v).ok()).map(|v| v != 0))
}

/// Read environment variable `key` as a boolean, using `default` if unset.
pub fn env_bool(key: &str, default: bool) -> Result<bool, ParseError> {
    match std::env::var(key) {
        Ok(value) => parse_maybe_bool(Some(&value)).ok_or(ParseError::BadEnvBool {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

/// Read environment variable `key` as an unsigned number with optional
/// unit suffix, using `default` if unset.
pub fn env_ulong(key: &str, default: u64) -> Result<u64, ParseError> {
    match std::env::var(key) {
        Ok(value) => parse_ulong(&value).map_err(|e| ParseError::BadEnvNumber {
            key: key.to_string(),
            source: Box::new(e),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a base-10 integer at the start of `buf`, skipping leading
/// whitespace. Returns the value and the unparsed remainder. No radix
/// prefixes and no unit suffixes.
fn parse_from_buf(buf: &str, negate_allowed: bool, max: u64) -> Result<(bool, u64, &str), ParseError> {
    let invalid = || ParseError::Invalid(buf.to_string());
    let mut s = buf.trim_start();
    let mut negative = false;
    let mut max = max as u128;

    match s.as_bytes().first() {
        Some(b'-') => {
            if !negate_allowed {
                return Err(invalid());
            }
            s = &s[1..];
            negative = true;
            max += 1;
        }
        Some(b'+') => s = &s[1..],
        _ => {}
    }

    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return Err(invalid());
    }

    let mut val: u128 = 0;
    for b in s[..end].bytes() {
        val = val * 10 + (b - b'0') as u128;
        if val > max {
            return Err(ParseError::OutOfRange(buf.to_string()));
        }
    }
    Ok((negative, val as u64, &s[end..]))
}

pub fn parse_unsigned_from_buf(buf: &str, max: u64) -> Result<(u64, &str), ParseError> {
    let (_, val, rest) = parse_from_buf(buf, false, max)?;
    Ok((val, rest))
}

pub fn parse_signed_from_buf(buf: &str, max: i64) -> Result<(i64, &str), ParseError> {
    let (negative, val, rest) = parse_from_buf(buf, true, max as u64)?;
    let val = if negative {
        (val as i128).wrapping_neg() as i64
    } else {
        val as i64
    };
    Ok((val, rest))
}

pub fn parse_int_from_buf(buf: &str) -> Result<(i32, &str), ParseError> {
    parse_signed_from_buf(buf, i32::MAX as i64).map(|(v, rest)| (v as i32, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_from_buf_basic() {
        assert_eq!(parse_int_from_buf("0").unwrap(), (0, ""));
        assert_eq!(parse_int_from_buf("11").unwrap(), (11, ""));
        assert_eq!(parse_int_from_buf("-23").unwrap(), (-23, ""));
        assert_eq!(parse_int_from_buf("+23").unwrap(), (23, ""));
        assert_eq!(parse_int_from_buf("  31337  ").unwrap(), (31337, "  "));
        assert_eq!(parse_int_from_buf(&"123"[..2]).unwrap(), (12, ""));

        assert!(matches!(parse_int_from_buf("  garbage"), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_int_from_buf(""), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_int_from_buf("-"), Err(ParseError::Invalid(_))));
    }

    #[test]
    fn test_int_from_buf_range() {
        assert_eq!(parse_int_from_buf("2147483647").unwrap().0, i32::MAX);
        assert!(matches!(parse_int_from_buf("2147483648"), Err(ParseError::OutOfRange(_))));
        assert_eq!(parse_int_from_buf("-2147483647").unwrap().0, -2147483647);
        assert_eq!(parse_int_from_buf("-2147483648").unwrap().0, i32::MIN);
        assert!(matches!(parse_int_from_buf("-2147483649"), Err(ParseError::OutOfRange(_))));
    }

    #[test]
    fn test_unsigned_from_buf() {
        assert_eq!(parse_unsigned_from_buf("4294967295", u32::MAX as u64).unwrap(), (4294967295, ""));
        assert!(matches!(parse_unsigned_from_buf("1053", 1000), Err(ParseError::OutOfRange(_))));
        assert!(matches!(parse_unsigned_from_buf("-17", u32::MAX as u64), Err(ParseError::Invalid(_))));
    }

    #[test]
    fn test_unit_suffixes() {
        assert_eq!(parse_ulong("1k").unwrap(), 1024);
        assert_eq!(parse_ulong("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_ulong("1g").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_int("-1k").unwrap(), -1024);
        assert!(matches!(parse_ulong("1t"), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_int("2097152k"), Err(ParseError::OutOfRange(_))));
    }

    #[test]
    fn test_radix_prefixes() {
        assert_eq!(parse_ulong("0x10").unwrap(), 16);
        assert_eq!(parse_ulong("010").unwrap(), 8);
        assert_eq!(parse_ulong("0").unwrap(), 0);
        assert_eq!(parse_i64("-0x10").unwrap(), -16);
    }

    #[test]
    fn test_signed_and_unsigned_bounds() {
        assert!(matches!(parse_unsigned("-1", u64::MAX), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_unsigned("", u64::MAX), Err(ParseError::Invalid(_))));
        assert!(matches!(parse_ulong("99999999999999999999999"), Err(ParseError::OutOfRange(_))));
        assert_eq!(parse_signed("-128", 127).unwrap(), -128);
        assert!(matches!(parse_signed("-129", 127), Err(ParseError::OutOfRange(_))));
        assert!(matches!(parse_signed("128", 127), Err(ParseError::OutOfRange(_))));
    }

    #[test]
    fn test_maybe_bool() {
        assert_eq!(parse_maybe_bool_text(None), Some(true));
        assert_eq!(parse_maybe_bool_text(Some("")), Some(false));
        assert_eq!(parse_maybe_bool_text(Some("On")), Some(true));
        assert_eq!(parse_maybe_bool_text(Some("NO")), Some(false));
        assert_eq!(parse_maybe_bool_text(Some("2")), None);
        assert_eq!(parse_maybe_bool(Some("2")), Some(true));
        assert_eq!(parse_maybe_bool(Some("0")), Some(false));
        assert_eq!(parse_maybe_bool(Some("maybe")), None);
    }

    #[test]
    fn test_env_helpers() {
        // SAFETY: only this test touches these variable names.
        unsafe {
            std::env::set_var("RESTACK_TEST_ENV_BOOL", "yes");
            std::env::set_var("RESTACK_TEST_ENV_BAD", "perhaps");
            std::env::set_var("RESTACK_TEST_ENV_ULONG", "4k");
        }
        assert!(env_bool("RESTACK_TEST_ENV_BOOL", false).unwrap());
        assert!(env_bool("RESTACK_TEST_ENV_UNSET", true).unwrap());
        assert!(matches!(
            env_bool("RESTACK_TEST_ENV_BAD", false),
            Err(ParseError::BadEnvBool { .. })
        ));
        assert_eq!(env_ulong("RESTACK_TEST_ENV_ULONG", 1).unwrap(), 4096);
        assert_eq!(env_ulong("RESTACK_TEST_ENV_UNSET", 7).unwrap(), 7);
    }
}
