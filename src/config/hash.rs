//! Template hashing for version tags.
//!
//! When no explicit version is supplied, each unit is tagged with a short
//! digest of its template body, so the tag changes exactly when the template
//! does.

use sha2::{Digest, Sha256};

/// Number of hex characters kept in a version tag.
pub const VERSION_TAG_LEN: usize = 12;

/// Hasher for template bodies.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateHasher;

impl TemplateHasher {
    /// Creates a new template hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the full SHA-256 of a template body, hex encoded.
    #[must_use]
    pub fn hash_template(&self, body: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(body);
        hex::encode(hasher.finalize())
    }

    /// Computes the short version tag of a template body.
    #[must_use]
    pub fn version_tag(&self, body: &[u8]) -> String {
        let mut digest = self.hash_template(body);
        digest.truncate(VERSION_TAG_LEN);
        digest
    }
}
