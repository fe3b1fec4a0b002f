/// Key layout for the cache keyspace
///
/// Partition structure:
/// - one partition per cache namespace: {request key} -> EntryRecord (JSON)
/// - `__namespaces` registry: ns:{name} -> "" (tracks every namespace opened)
///
/// Entries are keyed by canonical request identity. The system is GET-only,
/// so the identity is the method literal plus the absolute URL.

/// Registry partition name. The leading underscores keep it out of the
/// space of user-visible namespace names.
pub const REGISTRY_PARTITION: &str = "__namespaces";

/// Encode the canonical request identity for a GET request.
pub fn request_key(url: &str) -> String {
    format!("GET {}", url)
}

/// Recover the URL from a request identity key.
pub fn request_url(key: &str) -> Option<&str> {
    key.strip_prefix("GET ")
}

/// Encode a registry key: ns:{name}
pub fn encode_ns_key(name: &str) -> Vec<u8> {
    format!("ns:{}", name).into_bytes()
}

/// Decode a registry key: ns:{name} -> name
pub fn decode_ns_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("ns:").map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_key_roundtrip() {
        let key = request_key("https://example.com/bbb.mp4");
        assert_eq!(key, "GET https://example.com/bbb.mp4");
        assert_eq!(request_url(&key), Some("https://example.com/bbb.mp4"));
    }

    #[test]
    fn ns_key_roundtrip() {
        let key = encode_ns_key("static-v2");
        assert_eq!(key, b"ns:static-v2");
        assert_eq!(decode_ns_key(&key).unwrap(), "static-v2");
    }

    #[test]
    fn foreign_keys_do_not_decode() {
        assert!(decode_ns_key(b"job:foo").is_none());
        assert!(request_url("POST https://example.com/").is_none());
    }
}
