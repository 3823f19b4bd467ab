//! Random selection helpers for the render pipeline
//!
//! Every pick goes through a caller-supplied [`rand::Rng`] so renders can be
//! made deterministic under test with a seeded generator.

use rand::Rng;

/// A fresh 16 hex digit salt, substituted for the literal `*` in SNI, host
/// and address entries.
pub fn salt(rng: &mut impl Rng) -> String {
    let value: u64 = rng.gen();
    format!("{:016x}", value)
}

/// Pick one element of a slice uniformly at random. Empty slices yield `None`.
pub fn choose<'a, T>(rng: &mut impl Rng, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        items.get(rng.gen_range(0..items.len()))
    }
}

/// Pick one string from a list, substituting the `*` wildcard with a salt.
/// An empty list yields an empty string.
pub fn choose_salted(rng: &mut impl Rng, items: &[String]) -> String {
    match choose(rng, items) {
        Some(item) if item == "*" => salt(rng),
        Some(item) => item.replace('*', &salt(rng)),
        None => String::new(),
    }
}
