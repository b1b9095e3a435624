//! Per-row random number generators
//!
//! Random filler is drawn from a generator seeded by `(run seed, table, id)`,
//! so a row comes out identical whichever batch happens to produce it.

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::{Builder, Uuid};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(text: &str) -> u64 {
    text.bytes()
        .fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

fn splitmix(mut value: u64) -> u64 {
    value = value.wrapping_add(0x9e37_79b9_7f4a_7c15);
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    value ^ (value >> 31)
}

/// Seed for one `(stream, id)` pair of a run
pub fn derive_seed(seed: u64, stream: &str, id: u64) -> u64 {
    splitmix(splitmix(seed ^ fnv1a(stream)) ^ id)
}

/// Generator for the row `id` of `stream` (usually the table name)
pub fn row_rng(seed: u64, stream: &str, id: u64) -> StdRng {
    StdRng::seed_from_u64(derive_seed(seed, stream, id))
}

/// Version 4 UUID drawn from `rng`
pub fn random_uuid(rng: &mut impl Rng) -> Uuid {
    Builder::from_random_bytes(rng.gen()).into_uuid()
}

/// Lowercase alphanumeric string
pub fn random_ascii(rng: &mut impl Rng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_rng_is_reproducible() {
        let first: u64 = row_rng(7, "reward", 3).gen();
        let again: u64 = row_rng(7, "reward", 3).gen();
        assert_eq!(first, again);
    }

    #[test]
    fn test_streams_are_independent() {
        assert_ne!(derive_seed(7, "reward", 3), derive_seed(7, "reward", 4));
        assert_ne!(derive_seed(7, "reward", 3), derive_seed(7, "campaign", 3));
        assert_ne!(derive_seed(7, "reward", 3), derive_seed(8, "reward", 3));
    }

    #[test]
    fn test_random_uuid_is_v4() {
        let uuid = random_uuid(&mut row_rng(1, "uuid", 1));
        assert_eq!(uuid.get_version_num(), 4);
    }

    #[test]
    fn test_random_ascii() {
        let text = random_ascii(&mut row_rng(1, "ascii", 1), 10);
        assert_eq!(text.len(), 10);
        assert!(text.chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
    }
}
