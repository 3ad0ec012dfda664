//! The `similarity` module holds the string-distance primitives shared by the [`crate::validator`]
//! and the fuzzy matching layers (L2, L3a, L3b): trigram similarity (the PostgreSQL `pg_trgm`
//! notion of similarity, reimplemented here since the store is abstract) and Levenshtein edit
//! distance.

use std::collections::HashSet;

/// Returns the set of character trigrams for `s`, after uppercasing and padding with a leading
/// and trailing space so that short words still produce at least one trigram. Matches the
/// `pg_trgm` convention the original store relies on.
fn trigrams(s: &str) -> HashSet<String> {
    let padded = format!("  {}  ", s.to_uppercase());
    let chars: Vec<char> = padded.chars().collect();
    let mut set = HashSet::new();
    if chars.len() < 3 {
        set.insert(padded);
        return set;
    }
    for window in chars.windows(3) {
        set.insert(window.iter().collect());
    }
    set
}

/// Jaccard similarity over the trigram sets of `a` and `b`, in `[0.0, 1.0]`. Two empty strings
/// are defined as dissimilar (0.0) rather than identical, since an empty address should never
/// "match" anything.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let ta = trigrams(a);
    let tb = trigrams(b);
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Levenshtein edit distance between `a` and `b`, case-insensitive.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_uppercase().chars().collect();
    let b: Vec<char> = b.to_uppercase().chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];
    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_maximally_similar() {
        assert_eq!(trigram_similarity("14 HIGH STREET", "14 HIGH STREET"), 1.0);
    }

    #[test]
    fn similar_streets_score_high() {
        let sim = trigram_similarity("168 LONDON ROAD ALTON", "147 LONDON ROAD ALTON");
        assert!(sim >= 0.70, "expected high similarity, got {sim}");
    }

    #[test]
    fn empty_inputs_never_match() {
        assert_eq!(trigram_similarity("", "ANYTHING"), 0.0);
        assert_eq!(trigram_similarity("ANYTHING", ""), 0.0);
    }

    #[test]
    fn edit_distance_counts_single_substitution() {
        assert_eq!(edit_distance("CAT", "COT"), 1);
    }

    #[test]
    fn edit_distance_zero_for_equal_strings() {
        assert_eq!(edit_distance("SAME", "same"), 0);
    }
}
