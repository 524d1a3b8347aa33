//! Request ID generation
//!
//! Generated IDs use the format: `{8-char-hex}-{kind}-{8-char-hex}`
//! Example: `0193a1f2-image-9c04e5b7`
//!
//! The leading hex is the millisecond timestamp prefix of a UUIDv7, so IDs
//! sort roughly by creation time; the trailing hex comes from the random
//! tail of the same UUID.

use super::MediaKind;

/// Generate a request ID for the given media kind
pub fn generate_request_id(kind: MediaKind) -> String {
    let hex = uuid::Uuid::now_v7().simple().to_string();
    format!("{}-{}-{}", &hex[..8], kind, &hex[hex.len() - 8..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_request_id_format() {
        let id = generate_request_id(MediaKind::Model);
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1], "model");
        assert_eq!(parts[2].len(), 8);
    }

    #[test]
    fn test_generate_request_id_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| generate_request_id(MediaKind::Image)).collect();
        assert_eq!(ids.len(), 1000);
    }
}
