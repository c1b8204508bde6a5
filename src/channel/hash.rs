use sha2::{Digest, Sha256};

use crate::outbox::PartitionKey;

/// Map a partition key to one of `buckets` connection slots.
///
/// The key is digested with SHA-256 and placed with jump consistent hashing,
/// so the result depends only on `(key, buckets)` and growing the pool from
/// `n` to `n + 1` slots moves roughly `1 / (n + 1)` of the keys, all of them
/// onto the new slot.
pub fn consistent_hash(key: PartitionKey, buckets: usize) -> usize {
    if buckets <= 1 {
        return 0;
    }
    jump(digest(key), buckets)
}

fn digest(key: PartitionKey) -> u64 {
    let digest = Sha256::digest(key.value().to_be_bytes());
    digest[..8]
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte))
}

// Lamping & Veach, "A Fast, Minimal Memory, Consistent Hash Algorithm".
fn jump(mut key: u64, buckets: usize) -> usize {
    let buckets = buckets as i64;
    let mut b: i64 = -1;
    let mut j: i64 = 0;
    while j < buckets {
        b = j;
        key = key.wrapping_mul(2_862_933_555_777_941_757).wrapping_add(1);
        j = ((b + 1) as f64 * ((1u64 << 31) as f64 / ((key >> 33) + 1) as f64)) as i64;
    }
    b as usize
}
