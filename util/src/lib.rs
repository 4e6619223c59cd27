//! Shared helpers for QuorumChain.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilError {
    #[error("hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Converts a hex string to bytes.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, UtilError> {
    Ok(hex::decode(hex)?)
}

/// Converts bytes to a hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Counts the leading hex-zero characters of a lowercase hex digest string.
pub fn leading_hex_zeros(hex_digest: &str) -> usize {
    hex_digest.chars().take_while(|c| *c == '0').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_hex() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        let hex_str = bytes_to_hex(&bytes);
        assert_eq!(hex_to_bytes(&hex_str).unwrap(), bytes);
    }

    #[test]
    fn counts_leading_zeros() {
        assert_eq!(leading_hex_zeros("000abc"), 3);
        assert_eq!(leading_hex_zeros("abc000"), 0);
        assert_eq!(leading_hex_zeros("000000"), 6);
    }
}
