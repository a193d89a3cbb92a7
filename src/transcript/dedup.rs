//! Fingerprint set for repeated transcript fragments

use std::collections::HashSet;

use sha2::{Digest, Sha256};

use super::Role;

/// Maximum fingerprints kept before the set is cleared
const MAX_FINGERPRINTS: usize = 2000;

/// Remembers `(role, content)` pairs already processed in the current turn
#[derive(Debug, Default)]
pub struct FragmentDedup {
    seen: HashSet<[u8; 32]>,
}

impl FragmentDedup {
    /// Returns `true` if this fragment was already seen, recording it otherwise
    pub fn is_duplicate(&mut self, role: Role, content: &str) -> bool {
        if self.seen.len() >= MAX_FINGERPRINTS {
            self.seen.clear();
        }
        !self.seen.insert(fingerprint(role, content))
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

fn fingerprint(role: Role, content: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(role.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(content.as_bytes());
    hasher.finalize().into()
}
