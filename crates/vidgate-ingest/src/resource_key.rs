//! Resource key derivation
//!
//! A resource key scopes mutual exclusion and scratch-file naming to one
//! logical remote file. Keys are derived by pattern-matching the URL against
//! known share-link shapes; when no shape matches, a hash slug of the full
//! URL is used instead.
//!
//! Derivation is best-effort: two differently shaped links to the same
//! underlying file can yield different keys, permitting duplicate concurrent
//! downloads of the same content. That limitation is accepted rather than
//! papered over with a canonicalization guarantee the matchers cannot honor.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Share-link matchers, tried in order; first match wins.
static FILE_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Path-segment form: .../file/d/{id}/view
        r"/file/d/([A-Za-z0-9_-]{10,})",
        // Export form: .../uc?export=download&id={id} and the plain
        // query-parameter form .../open?id={id}
        r"[?&]id=([A-Za-z0-9_-]{10,})",
        // Docs-style short path: .../d/{id}
        r"/d/([A-Za-z0-9_-]{25,})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid file id pattern"))
    .collect()
});

/// Normalized identifier for a remote resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    key: String,
    file_id: Option<String>,
}

impl ResourceKey {
    /// Derive a key from a user-supplied URL
    ///
    /// Returns a `drive-{id}` key when a share-link shape matched, otherwise
    /// a `url-{hash}` slug of the whole URL.
    pub fn derive(url: &str) -> Self {
        if let Some(id) = extract_file_id(url) {
            return Self {
                key: format!("drive-{}", id),
                file_id: Some(id),
            };
        }

        let mut hasher = Sha256::new();
        hasher.update(url.trim().as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self {
            key: format!("url-{}", &digest[..16]),
            file_id: None,
        }
    }

    /// The normalized key string
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The extracted share-link file identifier, when a pattern matched.
    /// Probing requires this; the hash fallback cannot be probed.
    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Extract a stable file identifier from a share-link URL
pub fn extract_file_id(url: &str) -> Option<String> {
    for pattern in FILE_ID_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(url) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE_ID: &str = "1aBcDeFgHiJkLmNoPqRsTuVwXyZ01234";

    #[test]
    fn test_path_segment_form() {
        let url = format!("https://drive.google.com/file/d/{}/view?usp=sharing", FILE_ID);
        let key = ResourceKey::derive(&url);
        assert_eq!(key.file_id(), Some(FILE_ID));
        assert_eq!(key.as_str(), format!("drive-{}", FILE_ID));
    }

    #[test]
    fn test_query_parameter_form() {
        let url = format!("https://drive.google.com/open?id={}", FILE_ID);
        let key = ResourceKey::derive(&url);
        assert_eq!(key.file_id(), Some(FILE_ID));
    }

    #[test]
    fn test_export_form() {
        let url = format!("https://drive.google.com/uc?export=download&id={}", FILE_ID);
        let key = ResourceKey::derive(&url);
        assert_eq!(key.file_id(), Some(FILE_ID));
    }

    #[test]
    fn test_same_id_collapses_across_shapes() {
        let a = ResourceKey::derive(&format!("https://drive.google.com/file/d/{}/view", FILE_ID));
        let b = ResourceKey::derive(&format!("https://drive.google.com/open?id={}", FILE_ID));
        assert_eq!(a, b);
    }

    #[test]
    fn test_unrecognized_url_falls_back_to_hash() {
        let key = ResourceKey::derive("https://example.com/videos/clip.mp4");
        assert!(key.file_id().is_none());
        assert!(key.as_str().starts_with("url-"));
        // hash prefix + 16 hex chars
        assert_eq!(key.as_str().len(), "url-".len() + 16);
    }

    #[test]
    fn test_hash_fallback_is_stable() {
        let a = ResourceKey::derive("https://example.com/videos/clip.mp4");
        let b = ResourceKey::derive("https://example.com/videos/clip.mp4");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_urls_get_distinct_keys() {
        let a = ResourceKey::derive("https://example.com/a.mp4");
        let b = ResourceKey::derive("https://example.com/b.mp4");
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_ids_ignored() {
        // Too short to be a share-link identifier
        let key = ResourceKey::derive("https://example.com/watch?id=abc123");
        assert!(key.file_id().is_none());
    }
}
