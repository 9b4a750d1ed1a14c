//! Shared utilities: bit sets, edit distance, numeric trie terms and time
//! counters.

pub mod bits;
pub mod counter;
pub mod levenshtein;
pub mod numeric;
