//! Random display handle generation.
//!
//! Handles are `Adjective + Noun + 4-digit suffix`, e.g. `KeenOtter4821`,
//! drawn uniformly from fixed word lists with the suffix uniform in
//! `[1000, 9999]`. Handles are intentionally non-unique across users; the
//! only uniqueness invariant in the system is one profile per identity.

use rand::Rng;

/// Every entry is one capital letter followed by lowercase, so generated
/// handles always match `^[A-Z][a-z]+[A-Z][a-z]+\d{4}$`.
const ADJECTIVES: &[&str] = &[
    "Agile", "Bold", "Brisk", "Calm", "Clever", "Daring", "Eager", "Fuzzy",
    "Gentle", "Jolly", "Keen", "Lively", "Mellow", "Nimble", "Quiet", "Rapid",
    "Snappy", "Sunny", "Vivid", "Witty",
];

const NOUNS: &[&str] = &[
    "Badger", "Comet", "Falcon", "Heron", "Lynx", "Maple", "Otter", "Pebble",
    "Quill", "Raven", "Sparrow", "Tiger", "Walrus", "Willow", "Zephyr",
];

/// Generate a fresh random handle.
pub fn generate(rng: &mut impl Rng) -> String {
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let suffix: u16 = rng.gen_range(1000..=9999);
    format!("{adjective}{noun}{suffix}")
}
