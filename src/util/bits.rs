//! Random-access bit sets.
//!
//! [`Bits`] is the read-only view used for live documents and accept-docs
//! filtering. [`FixedBitSet`] is the mutable, fixed-length implementation
//! backed by `bit-vec`, used for live docs, cached filter results and term
//! ordinal sets.

use std::fmt::Debug;

use bit_vec::BitVec;

/// Read-only random access to a sequence of bits.
pub trait Bits: Send + Sync + Debug {
    /// Whether the bit at `index` is set.
    fn get(&self, index: usize) -> bool;

    /// Number of addressable bits.
    fn len(&self) -> usize;

    /// Whether there are no addressable bits.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A fixed-length bit set.
#[derive(Clone, PartialEq, Eq)]
pub struct FixedBitSet {
    bits: BitVec,
}

impl FixedBitSet {
    /// Create a bit set with `num_bits` bits, all clear.
    pub fn new(num_bits: usize) -> Self {
        FixedBitSet {
            bits: BitVec::from_elem(num_bits, false),
        }
    }

    /// Create a bit set with `num_bits` bits, all set.
    pub fn with_all_set(num_bits: usize) -> Self {
        FixedBitSet {
            bits: BitVec::from_elem(num_bits, true),
        }
    }

    /// Set the bit at `index`.
    pub fn set(&mut self, index: usize) {
        self.bits.set(index, true);
    }

    /// Clear the bit at `index`.
    pub fn clear(&mut self, index: usize) {
        self.bits.set(index, false);
    }

    /// Whether the bit at `index` is set. Out-of-range indices read as clear.
    pub fn get(&self, index: usize) -> bool {
        self.bits.get(index).unwrap_or(false)
    }

    /// Number of bits in the set.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the set has zero length.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of set bits.
    pub fn cardinality(&self) -> usize {
        self.bits
            .storage()
            .iter()
            .map(|block| block.count_ones() as usize)
            .sum()
    }

    /// Index of the first set bit at or after `from`.
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        if from >= self.bits.len() {
            return None;
        }
        let storage = self.bits.storage();
        let mut block_index = from / 32;
        let mut word = storage[block_index] & (u32::MAX << (from % 32));
        loop {
            if word != 0 {
                let index = block_index * 32 + word.trailing_zeros() as usize;
                return (index < self.bits.len()).then_some(index);
            }
            block_index += 1;
            if block_index >= storage.len() {
                return None;
            }
            word = storage[block_index];
        }
    }

    /// In-place union with `other`, which must have the same length.
    pub fn or(&mut self, other: &FixedBitSet) {
        debug_assert_eq!(self.len(), other.len());
        self.bits.or(&other.bits);
    }

    /// Whether the two sets share a set bit.
    pub fn intersects(&self, other: &FixedBitSet) -> bool {
        self.bits
            .storage()
            .iter()
            .zip(other.bits.storage())
            .any(|(a, b)| a & b != 0)
    }

    /// Iterate over the indices of set bits in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        let mut next = self.next_set_bit(0);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.next_set_bit(current + 1);
            Some(current)
        })
    }
}

impl Debug for FixedBitSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedBitSet")
            .field("len", &self.len())
            .field("cardinality", &self.cardinality())
            .finish()
    }
}

impl Bits for FixedBitSet {
    fn get(&self, index: usize) -> bool {
        FixedBitSet::get(self, index)
    }

    fn len(&self) -> usize {
        FixedBitSet::len(self)
    }
}

/// Bits that are all set.
#[derive(Debug, Clone, Copy)]
pub struct MatchAllBits {
    len: usize,
}

impl MatchAllBits {
    /// Create a view of `len` set bits.
    pub fn new(len: usize) -> Self {
        MatchAllBits { len }
    }
}

impl Bits for MatchAllBits {
    fn get(&self, _index: usize) -> bool {
        true
    }

    fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let mut bits = FixedBitSet::new(100);
        assert_eq!(bits.len(), 100);
        assert!(!bits.get(5));

        bits.set(5);
        bits.set(64);
        assert!(bits.get(5));
        assert!(bits.get(64));
        assert_eq!(bits.cardinality(), 2);

        bits.clear(5);
        assert!(!bits.get(5));
        assert_eq!(bits.cardinality(), 1);
        assert!(!bits.get(1000));
    }

    #[test]
    fn test_next_set_bit() {
        let mut bits = FixedBitSet::new(200);
        for i in [0, 31, 32, 33, 150, 199] {
            bits.set(i);
        }

        assert_eq!(bits.next_set_bit(0), Some(0));
        assert_eq!(bits.next_set_bit(1), Some(31));
        assert_eq!(bits.next_set_bit(32), Some(32));
        assert_eq!(bits.next_set_bit(34), Some(150));
        assert_eq!(bits.next_set_bit(151), Some(199));
        assert_eq!(bits.next_set_bit(200), None);

        let ones: Vec<usize> = bits.iter_ones().collect();
        assert_eq!(ones, vec![0, 31, 32, 33, 150, 199]);
    }

    #[test]
    fn test_with_all_set_respects_length() {
        let bits = FixedBitSet::with_all_set(40);
        assert_eq!(bits.cardinality(), 40);
        assert_eq!(bits.next_set_bit(39), Some(39));
        assert_eq!(bits.next_set_bit(40), None);
    }

    #[test]
    fn test_or_and_intersects() {
        let mut a = FixedBitSet::new(70);
        let mut b = FixedBitSet::new(70);
        a.set(3);
        b.set(66);
        assert!(!a.intersects(&b));

        a.or(&b);
        assert!(a.get(3) && a.get(66));
        assert!(a.intersects(&b));
    }
}
