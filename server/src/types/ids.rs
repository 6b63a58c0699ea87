//! Identifier helpers.
//!
//! Identifiers are opaque strings. Primary-store ids are 12 random bytes
//! rendered as 24 lowercase hex characters; external-store ids are the hex
//! rendering of the `candidates` row's binary key. Uniqueness is scoped per
//! origin, never assumed from the format.

/// Number of random bytes in a primary-store record id.
const RECORD_ID_BYTES: usize = 12;

/// Generate a new primary-store record id.
///
/// # Post-conditions
/// - Returns a 24-character lowercase hex string.
#[must_use]
pub fn new_record_id() -> String {
    let bytes: [u8; RECORD_ID_BYTES] = rand::random();
    hex_encode(&bytes)
}

/// Render bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_id_is_24_hex_chars() {
        let id = new_record_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(id.chars().all(|c| !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_new_record_ids_differ() {
        assert_ne!(new_record_id(), new_record_id());
    }

    #[test]
    fn test_hex_encode_binary_uuid() {
        let bytes = [0x00, 0x1f, 0xa0, 0xff];
        assert_eq!(hex_encode(&bytes), "001fa0ff");
        assert_eq!(hex_encode(&[]), "");
    }
}
