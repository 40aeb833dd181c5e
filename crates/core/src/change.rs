//! Per-object change detection
//!
//! Entity-tag equality is taken as proof that the destination already holds
//! the source content. That holds for single-part uploads; multipart tags
//! (`<hash>-<parts>`) are not content digests, so two identical objects
//! uploaded with different part sizes look changed, and in rare cases a
//! changed object can look unchanged. `force` and checksum verification are
//! the escape hatches.

/// Decide whether an object must be transferred
pub fn needs_transfer(
    dest_exists: bool,
    src_etag: &str,
    dest_etag: Option<&str>,
    force: bool,
) -> bool {
    if !dest_exists || force {
        return true;
    }

    match dest_etag {
        Some(dest) => dest.as_bytes() != src_etag.as_bytes(),
        None => true,
    }
}

/// Whether an entity tag comes from a multipart upload
pub fn is_multipart_etag(etag: &str) -> bool {
    etag.rsplit_once('-')
        .is_some_and(|(_, parts)| !parts.is_empty() && parts.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_destination_needs_transfer() {
        assert!(needs_transfer(false, "abc", None, false));
    }

    #[test]
    fn test_force_overrides_equal_tags() {
        assert!(needs_transfer(true, "abc", Some("abc"), true));
    }

    #[test]
    fn test_equal_tags_skip() {
        assert!(!needs_transfer(true, "abc", Some("abc"), false));
    }

    #[test]
    fn test_different_tags_transfer() {
        assert!(needs_transfer(true, "abc", Some("abd"), false));
        assert!(needs_transfer(true, "abc", Some("ABC"), false));
    }

    #[test]
    fn test_multipart_etag_detection() {
        assert!(is_multipart_etag("9b2cf535f27731c974343645a3985328-5"));
        assert!(!is_multipart_etag("9b2cf535f27731c974343645a3985328"));
        assert!(!is_multipart_etag("abc-"));
    }
}
