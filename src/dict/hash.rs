//! # Key Hashing and Structural Fingerprints
//!
//! Byte-key hashing for the dictionary, plus the integer mixer behind
//! iterator fingerprints.
//!
//! The hash is seeded: a process-wide seed set once at startup makes bucket
//! placement unpredictable to an adversary crafting colliding keys, while a
//! fixed seed keeps tests deterministic. Dictionary hook objects capture the
//! seed when they are created, so changing the global mid-flight never
//! invalidates an existing table.

use std::sync::atomic::{AtomicU32, Ordering};

use smallvec::SmallVec;
use xxhash_rust::xxh32::xxh32;

/// Process-wide default seed; see [`set_hash_seed`].
static HASH_SEED: AtomicU32 = AtomicU32::new(0);

/// Sets the process-wide hash seed. Call once at startup, before any
/// dictionary is created; hook objects constructed afterwards pick it up.
pub fn set_hash_seed(seed: u32) {
    HASH_SEED.store(seed, Ordering::Relaxed);
}

/// Current process-wide hash seed.
pub fn hash_seed() -> u32 {
    HASH_SEED.load(Ordering::Relaxed)
}

/// Seeded hash over raw bytes.
#[inline]
pub fn bytes_hash(seed: u32, data: &[u8]) -> u32 {
    xxh32(data, seed)
}

/// Case-insensitive variant: hashes the ASCII-lowercased bytes, so it pairs
/// with an `eq_ignore_ascii_case` comparator.
pub fn bytes_hash_nocase(seed: u32, data: &[u8]) -> u32 {
    let mut lowered: SmallVec<[u8; 64]> = SmallVec::with_capacity(data.len());
    lowered.extend(data.iter().map(|b| b.to_ascii_lowercase()));
    xxh32(&lowered, seed)
}

/// Mixes the six structural words of a dictionary (bucket array addresses,
/// sizes, and populations of both tables) into one fingerprint word. Order
/// matters: the running value is folded through an avalanche mix after each
/// input, so swapped fields produce different fingerprints.
pub(crate) fn mix_fingerprint(parts: [u64; 6]) -> u64 {
    let mut hash = 0u64;
    for part in parts {
        hash = hash.wrapping_add(part);
        // 64-bit finalizer: every input bit affects every output bit.
        hash = (!hash).wrapping_add(hash << 21);
        hash ^= hash >> 24;
        hash = hash.wrapping_add(hash << 3).wrapping_add(hash << 8);
        hash ^= hash >> 14;
        hash = hash.wrapping_add(hash << 2).wrapping_add(hash << 4);
        hash ^= hash >> 28;
        hash = hash.wrapping_add(hash << 31);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic_per_seed() {
        let a = bytes_hash(7, b"some key");
        let b = bytes_hash(7, b"some key");
        assert_eq!(a, b);
        assert_ne!(bytes_hash(7, b"some key"), bytes_hash(8, b"some key"));
        assert_ne!(bytes_hash(7, b"some key"), bytes_hash(7, b"other key"));
    }

    #[test]
    fn nocase_hash_ignores_ascii_case() {
        assert_eq!(
            bytes_hash_nocase(3, b"MiXeD-Key"),
            bytes_hash_nocase(3, b"mixed-key")
        );
        assert_eq!(
            bytes_hash_nocase(3, b"lower"),
            bytes_hash(3, b"lower")
        );
    }

    #[test]
    fn fingerprint_mix_is_order_sensitive() {
        let a = mix_fingerprint([1, 2, 3, 4, 5, 6]);
        let b = mix_fingerprint([6, 5, 4, 3, 2, 1]);
        assert_ne!(a, b);
        assert_eq!(a, mix_fingerprint([1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn seed_global_roundtrips() {
        let original = hash_seed();
        set_hash_seed(0xDEAD_BEEF);
        assert_eq!(hash_seed(), 0xDEAD_BEEF);
        set_hash_seed(original);
    }
}
