//! Validation for numeric arguments, input paths and manifest identifiers
//!
//! Numbers follow the usual prefix convention (`0x`, `0o`, `0b`, otherwise
//! decimal). Paths are normalized to POSIX form so that pattern matching,
//! sorting and manifest output never depend on the host separator.

use crate::error::{PackError, Result};

/// Parse an unsigned integer with an optional radix prefix
///
/// # Examples
///
/// ```
/// use ffs_pack::core::validation::parse_int;
///
/// assert_eq!(parse_int("4096").unwrap(), 4096);
/// assert_eq!(parse_int("0x1000").unwrap(), 4096);
/// assert_eq!(parse_int("0b1_0000").unwrap(), 16);
/// assert!(parse_int("twelve").is_err());
/// ```
pub fn parse_int(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    let lower = trimmed.to_ascii_lowercase();

    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.as_str(), 10)
    };

    let digits = digits.replace('_', "");
    // from_str_radix would take a leading '+'
    if digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(PackError::InvalidNumber(text.to_string()));
    }

    u64::from_str_radix(&digits, radix).map_err(|_| PackError::InvalidNumber(text.to_string()))
}

/// Parse a size with an optional `K` or `M` suffix (binary multiples)
pub fn parse_size(text: &str) -> Result<u64> {
    let trimmed = text.trim();

    let (number, multiplier) = match trimmed.chars().last() {
        Some('K') | Some('k') => (&trimmed[..trimmed.len() - 1], 1024u64),
        Some('M') | Some('m') => (&trimmed[..trimmed.len() - 1], 1024 * 1024),
        _ => (trimmed, 1),
    };

    parse_int(number)?
        .checked_mul(multiplier)
        .ok_or_else(|| PackError::InvalidNumber(text.to_string()))
}

/// Normalize a relative input path
///
/// Backslashes become `/`, empty and `.` segments are dropped, and `..`
/// pops the previous segment. The result has no leading slash.
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut resolved: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                resolved.pop();
            }
            _ => resolved.push(part),
        }
    }

    resolved.join("/")
}

/// Manifest form of a normalized path (leading `/`)
pub fn display_path(path: &str) -> String {
    format!("/{}", normalize_path(path))
}

/// Derive the C identifier for a relative path
///
/// Every character outside `[A-Za-z0-9]` becomes `_`. A leading digit gets
/// a `_` prefix so the result is a valid identifier.
///
/// # Examples
///
/// ```
/// use ffs_pack::core::validation::identifier_for;
///
/// assert_eq!(identifier_for("config/device.cfg"), "config_device_cfg");
/// assert_eq!(identifier_for("2nd.txt"), "_2nd_txt");
/// ```
pub fn identifier_for(path: &str) -> String {
    let normalized = normalize_path(path);
    let ident: String = normalized
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    match ident.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{}", ident),
        None => "_".to_string(),
        _ => ident,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_prefixes() {
        assert_eq!(parse_int("0").unwrap(), 0);
        assert_eq!(parse_int("  42 ").unwrap(), 42);
        assert_eq!(parse_int("0x110000").unwrap(), 0x110000);
        assert_eq!(parse_int("0X1F").unwrap(), 0x1f);
        assert_eq!(parse_int("0o17").unwrap(), 0o17);
        assert_eq!(parse_int("0b101").unwrap(), 5);
        assert_eq!(parse_int("1_048_576").unwrap(), 1_048_576);
    }

    #[test]
    fn test_parse_int_rejects_garbage() {
        assert!(parse_int("").is_err());
        assert!(parse_int("0x").is_err());
        assert!(parse_int("-1").is_err());
        assert!(parse_int("max").is_err());
        assert!(parse_int("0xZZ").is_err());
    }

    #[test]
    fn test_parse_int_rejects_signs() {
        assert!(matches!(
            parse_int("0x+10"),
            Err(PackError::InvalidNumber(text)) if text == "0x+10"
        ));
        assert!(parse_int("+10").is_err());
        assert!(parse_int("0b-1").is_err());
        assert!(parse_size("+4K").is_err());
    }

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("24K").unwrap(), 24 * 1024);
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("0x6000").unwrap(), 0x6000);
        assert!(parse_size("K").is_err());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("config/device.cfg"), "config/device.cfg");
        assert_eq!(normalize_path("/config//device.cfg"), "config/device.cfg");
        assert_eq!(normalize_path("config\\device.cfg"), "config/device.cfg");
        assert_eq!(normalize_path("./a/../b.txt"), "b.txt");
        assert_eq!(display_path("secure/node.key"), "/secure/node.key");
    }

    #[test]
    fn test_identifier_for() {
        assert_eq!(identifier_for("ota0.bin"), "ota0_bin");
        assert_eq!(identifier_for("defaults.json"), "defaults_json");
        assert_eq!(identifier_for("secure/node-1.crt"), "secure_node_1_crt");
        assert_eq!(identifier_for("/a-b.txt"), "a_b_txt");
        assert_eq!(identifier_for("0.dat"), "_0_dat");
    }
}
