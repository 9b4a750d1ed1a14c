//! Trie encoding of numbers into sortable terms.
//!
//! A numeric field is indexed as several terms per value: the full value
//! and copies with the lowest `shift` bits stripped, for every multiple of
//! the precision step. Each term starts with a char that encodes the value
//! width and the shift, followed by the remaining bits in 7-bit chunks, so
//! every term is plain ASCII and term order equals numeric order within a
//! shift. A range is then matched by a handful of sub-ranges at coarse
//! shifts plus short edges at fine ones.
//!
//! Floating point values are mapped to signed integers of the same width
//! whose order matches the float order (NaN sorts above infinity).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HastaError, Result};

/// Precision step used when none is given.
pub const PRECISION_STEP_DEFAULT: u32 = 4;

/// Marker char offset of 64-bit terms.
pub const SHIFT_START_LONG: u8 = 0x20;

/// Marker char offset of 32-bit terms.
pub const SHIFT_START_INT: u8 = 0x60;

/// Width and interpretation of a numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumericType {
    Int,
    Long,
    Float,
    Double,
}

impl NumericType {
    /// Number of bits of an encoded value.
    pub fn value_size(self) -> u32 {
        match self {
            NumericType::Int | NumericType::Float => 32,
            NumericType::Long | NumericType::Double => 64,
        }
    }

    /// Inverse of [`NumericValue::to_sortable`].
    pub fn decode(self, sortable: i64) -> NumericValue {
        match self {
            NumericType::Int => NumericValue::Int(sortable as i32),
            NumericType::Long => NumericValue::Long(sortable),
            NumericType::Float => NumericValue::Float(sortable_int_to_float(sortable as i32)),
            NumericType::Double => NumericValue::Double(sortable_long_to_double(sortable)),
        }
    }

    /// The trie term of `sortable` with the lowest `shift` bits stripped.
    pub fn prefix_coded(self, sortable: i64, shift: u32) -> String {
        match self.value_size() {
            32 => int_to_prefix_coded(sortable as i32, shift),
            _ => long_to_prefix_coded(sortable, shift),
        }
    }
}

/// A typed numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NumericValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl NumericValue {
    pub fn numeric_type(self) -> NumericType {
        match self {
            NumericValue::Int(_) => NumericType::Int,
            NumericValue::Long(_) => NumericType::Long,
            NumericValue::Float(_) => NumericType::Float,
            NumericValue::Double(_) => NumericType::Double,
        }
    }

    /// A signed integer whose order matches the order of the values of this type.
    pub fn to_sortable(self) -> i64 {
        match self {
            NumericValue::Int(value) => i64::from(value),
            NumericValue::Long(value) => value,
            NumericValue::Float(value) => i64::from(float_to_sortable_int(value)),
            NumericValue::Double(value) => double_to_sortable_long(value),
        }
    }
}

impl fmt::Display for NumericValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericValue::Int(value) => write!(f, "{value}"),
            NumericValue::Long(value) => write!(f, "{value}"),
            NumericValue::Float(value) => write!(f, "{value:?}"),
            NumericValue::Double(value) => write!(f, "{value:?}"),
        }
    }
}

fn check_shift(shift: u32, value_size: u32) -> u32 {
    debug_assert!(shift < value_size, "shift {shift} out of range for {value_size} bits");
    shift.min(value_size - 1)
}

fn prefix_coded(sortable: u64, shift: u32, value_size: u32, start: u8) -> String {
    let chars = ((value_size - 1 - shift) / 7 + 1) as usize;
    let mut bytes = vec![0u8; chars + 1];
    bytes[0] = start + shift as u8;
    let mut bits = sortable >> shift;
    for byte in bytes[1..].iter_mut().rev() {
        *byte = (bits & 0x7f) as u8;
        bits >>= 7;
    }
    bytes.into_iter().map(char::from).collect()
}

/// Encode `value` with the lowest `shift` bits (0..64) stripped.
pub fn long_to_prefix_coded(value: i64, shift: u32) -> String {
    let shift = check_shift(shift, 64);
    prefix_coded((value ^ i64::MIN) as u64, shift, 64, SHIFT_START_LONG)
}

/// Encode `value` with the lowest `shift` bits (0..32) stripped.
pub fn int_to_prefix_coded(value: i32, shift: u32) -> String {
    let shift = check_shift(shift, 32);
    prefix_coded(u64::from((value ^ i32::MIN) as u32), shift, 32, SHIFT_START_INT)
}

fn decode_prefix(term: &str, start: u8, value_size: u32) -> Result<(u32, u64)> {
    let bytes = term.as_bytes();
    let shift = bytes
        .first()
        .and_then(|marker| marker.checked_sub(start))
        .map(u32::from)
        .filter(|&shift| shift < value_size)
        .ok_or_else(|| {
            HastaError::invalid_argument(format!("{term:?} is not a {value_size}-bit numeric term"))
        })?;
    let mut bits = 0u64;
    for &byte in &bytes[1..] {
        if byte > 0x7f {
            return Err(HastaError::invalid_argument(format!(
                "{term:?} is not a {value_size}-bit numeric term"
            )));
        }
        bits = (bits << 7) | u64::from(byte);
    }
    Ok((shift, bits << shift))
}

/// Shift of a 64-bit trie term.
pub fn prefix_coded_long_shift(term: &str) -> Result<u32> {
    decode_prefix(term, SHIFT_START_LONG, 64).map(|(shift, _)| shift)
}

/// Shift of a 32-bit trie term.
pub fn prefix_coded_int_shift(term: &str) -> Result<u32> {
    decode_prefix(term, SHIFT_START_INT, 32).map(|(shift, _)| shift)
}

/// Value of a 64-bit trie term; stripped bits read as zero.
pub fn prefix_coded_to_long(term: &str) -> Result<i64> {
    decode_prefix(term, SHIFT_START_LONG, 64).map(|(_, bits)| (bits as i64) ^ i64::MIN)
}

/// Value of a 32-bit trie term; stripped bits read as zero.
pub fn prefix_coded_to_int(term: &str) -> Result<i32> {
    decode_prefix(term, SHIFT_START_INT, 32).map(|(_, bits)| (bits as u32 as i32) ^ i32::MIN)
}

pub fn double_to_sortable_long(value: f64) -> i64 {
    let bits = value.to_bits() as i64;
    if bits < 0 { bits ^ i64::MAX } else { bits }
}

pub fn sortable_long_to_double(sortable: i64) -> f64 {
    let bits = if sortable < 0 { sortable ^ i64::MAX } else { sortable };
    f64::from_bits(bits as u64)
}

pub fn float_to_sortable_int(value: f32) -> i32 {
    let bits = value.to_bits() as i32;
    if bits < 0 { bits ^ i32::MAX } else { bits }
}

pub fn sortable_int_to_float(sortable: i32) -> f32 {
    let bits = if sortable < 0 { sortable ^ i32::MAX } else { sortable };
    f32::from_bits(bits as u32)
}

/// Inclusive sortable bounds of a range over values of `numeric_type`, or
/// `None` if an exclusive bound at the end of the value space leaves
/// nothing. Open float bounds stop at the infinities.
pub fn sortable_range(
    numeric_type: NumericType,
    min: Option<NumericValue>,
    max: Option<NumericValue>,
    min_inclusive: bool,
    max_inclusive: bool,
) -> Option<(i64, i64)> {
    let (lowest, highest) = match numeric_type {
        NumericType::Int => (i64::from(i32::MIN), i64::from(i32::MAX)),
        NumericType::Long => (i64::MIN, i64::MAX),
        NumericType::Float => (
            i64::from(float_to_sortable_int(f32::NEG_INFINITY)),
            i64::from(float_to_sortable_int(f32::INFINITY)),
        ),
        NumericType::Double => (
            double_to_sortable_long(f64::NEG_INFINITY),
            double_to_sortable_long(f64::INFINITY),
        ),
    };
    let (width_min, width_max) = match numeric_type.value_size() {
        32 => (i64::from(i32::MIN), i64::from(i32::MAX)),
        _ => (i64::MIN, i64::MAX),
    };

    let min = match min {
        None => lowest,
        Some(value) if min_inclusive => value.to_sortable(),
        Some(value) => {
            let min = value.to_sortable();
            if min == width_max {
                return None;
            }
            min + 1
        }
    };
    let max = match max {
        None => highest,
        Some(value) if max_inclusive => value.to_sortable(),
        Some(value) => {
            let max = value.to_sortable();
            if max == width_min {
                return None;
            }
            max - 1
        }
    };
    Some((min, max))
}

/// Every trie term indexed for `value`, finest shift first.
pub fn numeric_terms(value: NumericValue, precision_step: u32) -> Vec<String> {
    let kind = value.numeric_type();
    let sortable = value.to_sortable();
    let step = precision_step.clamp(1, kind.value_size()) as usize;
    (0..kind.value_size())
        .step_by(step)
        .map(|shift| kind.prefix_coded(sortable, shift))
        .collect()
}

/// Split the inclusive range `[min, max]` into trie sub-ranges, calling
/// `add(lower_term, upper_term)` for each. Nothing is added for an empty range.
pub fn split_long_range<F>(precision_step: u32, min: i64, max: i64, mut add: F)
where
    F: FnMut(String, String),
{
    split_range(64, precision_step, min, max, &mut |lower, upper, shift| {
        add(long_to_prefix_coded(lower, shift), long_to_prefix_coded(upper, shift));
    });
}

/// 32-bit counterpart of [`split_long_range`].
pub fn split_int_range<F>(precision_step: u32, min: i32, max: i32, mut add: F)
where
    F: FnMut(String, String),
{
    split_range(
        32,
        precision_step,
        i64::from(min),
        i64::from(max),
        &mut |lower, upper, shift| {
            add(
                int_to_prefix_coded(lower as i32, shift),
                int_to_prefix_coded(upper as i32, shift),
            );
        },
    );
}

fn split_range(
    value_size: u32,
    precision_step: u32,
    mut min: i64,
    mut max: i64,
    add: &mut dyn FnMut(i64, i64, u32),
) {
    if min > max {
        return;
    }
    let step = precision_step.clamp(1, value_size);
    let mut shift = 0u32;
    loop {
        let diff = 1i64.wrapping_shl(shift + step);
        let mask = 1i64.wrapping_shl(step).wrapping_sub(1).wrapping_shl(shift);
        let has_lower = min & mask != 0;
        let has_upper = max & mask != mask;
        let next_min = (if has_lower { min.wrapping_add(diff) } else { min }) & !mask;
        let next_max = (if has_upper { max.wrapping_sub(diff) } else { max }) & !mask;
        let lower_wrapped = next_min < min;
        let upper_wrapped = next_max > max;

        if shift + step >= value_size || next_min > next_max || lower_wrapped || upper_wrapped {
            add(min, max, shift);
            return;
        }
        if has_lower {
            add(min, min | mask, shift);
        }
        if has_upper {
            add(max & !mask, max, shift);
        }
        min = next_min;
        max = next_max;
        shift += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_prefix_coded_terms_sort_like_values() {
        let values = [i64::MIN, -1_000_000, -1, 0, 1, 7, 1 << 40, i64::MAX];
        for shift in [0, 4, 16] {
            let terms: Vec<String> = values.iter().map(|&v| long_to_prefix_coded(v, shift)).collect();
            let mut sorted = terms.clone();
            sorted.sort();
            assert_eq!(terms, sorted, "shift {shift}");
        }

        let values = [i32::MIN, -5, 0, 3, i32::MAX];
        let terms: Vec<String> = values.iter().map(|&v| int_to_prefix_coded(v, 0)).collect();
        let mut sorted = terms.clone();
        sorted.sort();
        assert_eq!(terms, sorted);
        assert!(terms.iter().all(|term| term.is_ascii()));
    }

    #[test]
    fn test_prefix_coded_decoding() {
        let term = long_to_prefix_coded(-12_345, 8);
        assert_eq!(prefix_coded_long_shift(&term).unwrap(), 8);
        assert_eq!(prefix_coded_to_long(&term).unwrap(), -12_345 & !0xff);
        assert!(prefix_coded_int_shift(&term).is_err());

        let term = int_to_prefix_coded(42, 0);
        assert_eq!(term.len(), 6);
        assert_eq!(prefix_coded_to_int(&term).unwrap(), 42);
        assert_eq!(long_to_prefix_coded(42, 0).len(), 11);
    }

    #[test]
    fn test_sortable_floats() {
        let doubles = [f64::NEG_INFINITY, -2.5, -0.0, 0.0, 1e-300, 3.0, f64::INFINITY, f64::NAN];
        let sortable: Vec<i64> = doubles.iter().map(|&v| double_to_sortable_long(v)).collect();
        assert!(sortable.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(sortable_long_to_double(double_to_sortable_long(-2.5)), -2.5);

        let floats = [f32::NEG_INFINITY, -1.0, 0.0, 0.5, f32::INFINITY];
        let sortable: Vec<i32> = floats.iter().map(|&v| float_to_sortable_int(v)).collect();
        assert!(sortable.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(NumericType::Float.decode(i64::from(sortable[1])), NumericValue::Float(-1.0));
    }

    #[test]
    fn test_numeric_terms_per_shift() {
        let terms = numeric_terms(NumericValue::Int(1000), 8);
        assert_eq!(terms.len(), 4);
        let shifts: Vec<u32> = terms.iter().map(|t| prefix_coded_int_shift(t).unwrap()).collect();
        assert_eq!(shifts, vec![0, 8, 16, 24]);
        assert_eq!(numeric_terms(NumericValue::Long(1), 4).len(), 16);
        assert_eq!(numeric_terms(NumericValue::Double(1.0), 64).len(), 1);
    }

    #[test]
    fn test_sortable_range_bounds() {
        let int = |v| Some(NumericValue::Int(v));
        assert_eq!(sortable_range(NumericType::Int, int(3), int(9), false, false), Some((4, 8)));
        assert_eq!(sortable_range(NumericType::Int, int(i32::MAX), None, false, true), None);
        assert_eq!(sortable_range(NumericType::Int, None, int(i32::MIN), true, false), None);
        assert_eq!(
            sortable_range(NumericType::Long, None, None, true, true),
            Some((i64::MIN, i64::MAX))
        );
        let (lo, hi) = sortable_range(NumericType::Double, None, None, true, true).unwrap();
        assert!(double_to_sortable_long(f64::NAN) > hi);
        assert_eq!(lo, double_to_sortable_long(f64::NEG_INFINITY));
    }

    #[test]
    fn test_empty_and_full_ranges() {
        let mut ranges = Vec::new();
        split_int_range(4, 5, 4, |lower, upper| ranges.push((lower, upper)));
        assert!(ranges.is_empty());

        split_long_range(4, i64::MIN, i64::MAX, |lower, upper| ranges.push((lower, upper)));
        assert_eq!(ranges.len(), 1);
        assert_eq!(prefix_coded_long_shift(&ranges[0].0).unwrap(), 60);
    }

    proptest! {
        #[test]
        fn prop_sub_ranges_cover_exactly_the_range(
            min in -3000i32..3000,
            len in 0i32..3000,
            step in 1u32..9,
        ) {
            let max = min + len;
            let mut ranges = Vec::new();
            split_int_range(step, min, max, |lower, upper| ranges.push((lower, upper)));

            for value in (min - 40)..=(max + 40) {
                let hits = ranges
                    .iter()
                    .filter(|(lower, upper)| {
                        let shift = prefix_coded_int_shift(lower).unwrap();
                        let term = int_to_prefix_coded(value, shift);
                        lower <= &term && &term <= upper
                    })
                    .count();
                let expected = usize::from(value >= min && value <= max);
                prop_assert_eq!(hits, expected, "value {}", value);
            }
        }
    }
}
