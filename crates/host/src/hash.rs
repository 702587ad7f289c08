//! FNV-1a hashes for class lookup caching
//!
//! Class lookups are keyed by `(namespace, name)`; the session folds both into
//! one 64-bit key so the cache never allocates on a hit. Keys can collide, so
//! entries still carry their names.

/// FNV-1a 32-bit hash (compile-time capable)
pub const fn fnv1a_32(data: &[u8]) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
    const FNV_PRIME: u32 = 0x01000193;

    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < data.len() {
        hash ^= data[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Combined namespace+class hash for cache key
///
/// Namespace hash in the high half, class name hash in the low half.
pub const fn combined_hash(namespace: &[u8], name: &[u8]) -> u64 {
    let namespace_hash = fnv1a_32(namespace);
    let name_hash = fnv1a_32(name);
    ((namespace_hash as u64) << 32) | (name_hash as u64)
}
