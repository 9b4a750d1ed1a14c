//! Bounded edit distance over code points.
//!
//! Fuzzy term enumeration compares every candidate term against the query
//! text, so these functions work on pre-split `char` slices and give up as
//! soon as a row of the dynamic-programming matrix exceeds the budget.

use std::cmp::min;

/// Levenshtein distance between two strings.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    edit_distance_within(&a, &b, usize::MAX, false).unwrap_or(usize::MAX)
}

/// Edit distance between `a` and `b` if it is at most `max_edits`.
///
/// With `transpositions` set, swapping two adjacent characters counts as one
/// edit (optimal string alignment distance).
pub fn edit_distance_within(
    a: &[char],
    b: &[char],
    max_edits: usize,
    transpositions: bool,
) -> Option<usize> {
    let (len1, len2) = (a.len(), b.len());
    if len1.abs_diff(len2) > max_edits {
        return None;
    }
    if len1 == 0 || len2 == 0 {
        return Some(len1.max(len2));
    }

    // Three rolling rows: two back (for transpositions), previous, current.
    let mut prev_prev: Vec<usize> = vec![0; len2 + 1];
    let mut prev: Vec<usize> = (0..=len2).collect();
    let mut curr: Vec<usize> = vec![0; len2 + 1];

    for i in 1..=len1 {
        curr[0] = i;
        let mut row_min = curr[0];

        for j in 1..=len2 {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut value = min(
                min(prev[j] + 1, curr[j - 1] + 1),
                prev[j - 1] + cost,
            );
            if transpositions
                && i > 1
                && j > 1
                && a[i - 1] == b[j - 2]
                && a[i - 2] == b[j - 1]
            {
                value = min(value, prev_prev[j - 2] + 1);
            }
            curr[j] = value;
            row_min = min(row_min, value);
        }

        if row_min > max_edits {
            return None;
        }

        std::mem::swap(&mut prev_prev, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }

    let distance = prev[len2];
    (distance <= max_edits).then_some(distance)
}
