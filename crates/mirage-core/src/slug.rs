//! Client-side identifier minting.
//!
//! New entities (tabs, blocks) and mutations need identifiers *before*
//! the server has seen them: the UI renders the optimistic result
//! synchronously and the server echoes the same slug back in its
//! confirmation delta. The factory mints `prefix` + random base-36
//! suffix and tracks everything it has issued or been told about, so
//! two back-to-back calls in the same tick can never collide and a
//! freshly minted slug can never shadow one already in the state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

const SUFFIX_LEN: usize = 8;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Mints prefixed, session-unique identifiers without a server round
/// trip.
///
/// Uniqueness is per-factory (one factory per store/session). Slugs
/// loaded from the server must be [`reserve`](Self::reserve)d so the
/// factory never re-issues them.
#[derive(Debug)]
pub struct SlugFactory {
    rng: StdRng,
    issued: HashSet<String>,
}

impl SlugFactory {
    /// A factory seeded from OS entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            issued: HashSet::new(),
        }
    }

    /// A deterministic factory for tests and simulation replays.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            issued: HashSet::new(),
        }
    }

    /// Mark identifiers as in use so they are never minted again this
    /// session.
    pub fn reserve<I>(&mut self, slugs: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for slug in slugs {
            self.issued.insert(slug.into());
        }
    }

    /// Mint a fresh identifier with the given namespace prefix
    /// (`"tab-"`, `"block-"`, `"mutation-"`, ...).
    ///
    /// Distinct from every identifier this factory has minted or
    /// reserved, including calls made earlier in the same tick.
    pub fn generate(&mut self, prefix: &str) -> String {
        loop {
            let mut candidate = String::with_capacity(prefix.len() + SUFFIX_LEN);
            candidate.push_str(prefix);
            for _ in 0..SUFFIX_LEN {
                let i = self.rng.gen_range(0..ALPHABET.len());
                candidate.push(char::from(ALPHABET[i]));
            }
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

impl Default for SlugFactory {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
