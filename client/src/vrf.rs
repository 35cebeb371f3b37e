//! Randomness expansion.
//!
//! A fulfillment stores a single 32-byte base output. Multi-word requests
//! derive each word from it so any holder of the base can recompute them:
//!
//! ```text
//! word[i] = SHA256(base || i.to_le_bytes() as u32)
//! ```

use sha2::{Digest, Sha256};

/// Derive word `index` from `base`.
pub fn random_word(base: &[u8; 32], index: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(base);
    hasher.update(index.to_le_bytes());
    let mut word = [0u8; 32];
    word.copy_from_slice(&hasher.finalize());
    word
}

/// Expand `base` into `num_words` words, in index order.
pub fn expand_randomness(base: &[u8; 32], num_words: u32) -> Vec<[u8; 32]> {
    (0..num_words).map(|i| random_word(base, i)).collect()
}
