//! Shared helpers for chain clients
//!
//! Hex, address and quantity handling used by every crate that talks to a chain.
//! Kept dependency-free so both the transfer agent and the relayer can use it.

use std::fmt;

// ============================================================================
// ERRORS
// ============================================================================

/// Error returned when a hex value does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    /// What was being parsed (e.g. "address", "transaction hash")
    pub kind: &'static str,
    /// The rejected input
    pub value: String,
    /// Why it was rejected
    pub reason: String,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} '{}': {}", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for FormatError {}

impl FormatError {
    pub fn new(kind: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

fn format_error(kind: &'static str, value: &str, reason: impl Into<String>) -> FormatError {
    FormatError::new(kind, value, reason)
}

// ============================================================================
// HEX HELPERS
// ============================================================================

/// Strips an optional `0x`/`0X` prefix.
pub fn strip_0x(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Returns the value with exactly one `0x` prefix.
pub fn ensure_0x(value: &str) -> String {
    format!("0x{}", strip_0x(value))
}

/// Returns true if the string (after an optional `0x`) is non-empty and only hex digits.
pub fn is_hex(value: &str) -> bool {
    let body = strip_0x(value);
    !body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validates a `0x`-prefixed hex string encoding exactly `expected_len` bytes.
pub fn validate_hex_bytes(
    value: &str,
    expected_len: usize,
    kind: &'static str,
) -> Result<(), FormatError> {
    let body = value
        .strip_prefix("0x")
        .ok_or_else(|| format_error(kind, value, "must be 0x-prefixed"))?;
    if !is_hex(body) {
        return Err(format_error(kind, value, "contains non-hex characters"));
    }
    if body.len() != expected_len * 2 {
        return Err(format_error(
            kind,
            value,
            format!("expected {} bytes, got {} hex chars", expected_len, body.len()),
        ));
    }
    Ok(())
}

/// Parses a JSON-RPC quantity (`0x`-prefixed hex) into a u64.
pub fn parse_hex_u64(value: &str) -> Result<u64, FormatError> {
    let body = strip_0x(value);
    if body.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(body, 16).map_err(|e| format_error("quantity", value, e.to_string()))
}

/// Formats a u64 as a JSON-RPC quantity.
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

// ============================================================================
// ADDRESSES AND HASHES
// ============================================================================

/// Normalizes an EVM address to lowercase `0x` + 40 hex chars.
///
/// Accepts a bare 20-byte address or a 32-byte left-padded word (as found in event topics).
pub fn normalize_evm_address(value: &str) -> Result<String, FormatError> {
    let body = strip_0x(value).to_ascii_lowercase();
    if !is_hex(&body) {
        return Err(format_error("address", value, "contains non-hex characters"));
    }
    match body.len() {
        40 => Ok(format!("0x{}", body)),
        64 => Ok(format!("0x{}", &body[24..])),
        n => Err(format_error(
            "address",
            value,
            format!("expected 40 or 64 hex chars, got {}", n),
        )),
    }
}

/// Validates a 20-byte EVM address.
pub fn validate_evm_address(value: &str) -> Result<(), FormatError> {
    validate_hex_bytes(value, 20, "address")
}

/// Validates a 32-byte transaction hash.
pub fn validate_tx_hash(value: &str) -> Result<(), FormatError> {
    validate_hex_bytes(value, 32, "transaction hash")
}

/// Case-insensitive comparison of two hex values, ignoring the `0x` prefix.
pub fn hex_eq(a: &str, b: &str) -> bool {
    strip_0x(a).eq_ignore_ascii_case(strip_0x(b))
}
