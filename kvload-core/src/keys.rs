//! Generation of record keys and values.
//!
//! The [`KeyGenerator`] holds only immutable parameters. Randomness is passed in by the caller,
//! which lets every operation draw from its own source instead of contending on a shared one.

use std::sync::Arc;

use bytes::Bytes;
use rand::{Rng, RngCore};

/// The symbols that make up generated values.
const LETTERS: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Bits needed to index into [`LETTERS`].
const LETTER_IDX_BITS: u32 = 6;
/// Number of letter indices packed into one `u64` draw.
const LETTER_IDX_MAX: u32 = u64::BITS / LETTER_IDX_BITS;

/// Produces record keys and write payloads.
///
/// Keys have the form `<prefix>-<n>` with `n` uniform in `[1, keyspace]`. The same generator is
/// used for reads and writes, so reads hit keys that were written earlier with a probability
/// that grows as the run progresses.
#[derive(Clone, Debug)]
pub struct KeyGenerator {
    prefix: Arc<str>,
    keyspace: u32,
}

impl KeyGenerator {
    /// Creates a generator for keys in `[1, keyspace]` under the given prefix.
    ///
    /// A `keyspace` of zero is raised to one, so every generator has at least one key. Workload
    /// validation rejects zero before a generator is built.
    pub fn new(prefix: impl Into<Arc<str>>, keyspace: u32) -> Self {
        Self {
            prefix: prefix.into(),
            keyspace: keyspace.max(1),
        }
    }

    /// The namespace prefix of generated keys.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The inclusive upper bound of key integers.
    pub fn keyspace(&self) -> u32 {
        self.keyspace
    }

    /// Draws the integer part of the next key.
    pub fn next_id<R: Rng>(&self, rng: &mut R) -> u32 {
        rng.random_range(1..=self.keyspace)
    }

    /// Draws the next record key.
    pub fn next_key<R: Rng>(&self, rng: &mut R) -> String {
        format!("{}-{}", self.prefix, self.next_id(rng))
    }

    /// Draws `len` bytes uniformly from the 52 ASCII letters.
    ///
    /// Each `u64` from `rng` is cut into 6-bit chunks, most significant first. Chunks that index
    /// past the alphabet are skipped, so every letter stays equally likely.
    pub fn next_value<R: RngCore + ?Sized>(&self, rng: &mut R, len: usize) -> Bytes {
        let mut value = Vec::with_capacity(len);
        let mut cache = rng.next_u64();
        let mut remain = LETTER_IDX_MAX;

        while value.len() < len {
            if remain == 0 {
                cache = rng.next_u64();
                remain = LETTER_IDX_MAX;
            }

            let idx = (cache >> (u64::BITS - LETTER_IDX_BITS)) as usize;
            if let Some(&letter) = LETTERS.get(idx) {
                value.push(letter);
            }

            cache <<= LETTER_IDX_BITS;
            remain -= 1;
        }

        Bytes::from(value)
    }
}
