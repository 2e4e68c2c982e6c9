//! Pattern matching for TRON addresses.
//!
//! A pattern constrains the characters right after the fixed leading `T`
//! (prefix) and the trailing characters (suffix). Both comparisons are
//! exact-case.

mod pattern;

pub use pattern::{matches, Pattern, BASE58_ALPHABET_SIZE};
