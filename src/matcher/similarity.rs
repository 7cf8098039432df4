//! Title similarity scoring.
//!
//! The exact weighting is a replaceable strategy: the matcher only depends on
//! the `SimilarityScorer` trait, so a different metric can be swapped in
//! without touching the pairing logic.

use std::collections::HashSet;

/// Scores two normalized titles on a 0–100 scale (100 = identical text).
pub trait SimilarityScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Default metric: Jaccard token overlap blended with normalized edit
/// distance over the full strings.
pub struct TokenOverlapScorer {
    token_weight: f64,
    edit_weight: f64,
}

impl TokenOverlapScorer {
    pub fn new() -> Self {
        Self {
            token_weight: 0.6,
            edit_weight: 0.4,
        }
    }
}

impl Default for TokenOverlapScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityScorer for TokenOverlapScorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 100.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let tokens_a: HashSet<&str> = a.split_whitespace().collect();
        let tokens_b: HashSet<&str> = b.split_whitespace().collect();
        let jaccard = jaccard_similarity(&tokens_a, &tokens_b);

        let max_len = a.chars().count().max(b.chars().count());
        let edit = if max_len == 0 {
            1.0
        } else {
            1.0 - levenshtein(a, b) as f64 / max_len as f64
        };

        (self.token_weight * jaccard + self.edit_weight * edit) * 100.0
    }
}

fn jaccard_similarity(left: &HashSet<&str>, right: &HashSet<&str>) -> f64 {
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let intersection = left.intersection(right).count();
    let union = left.union(right).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Classic two-row Levenshtein over chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_exactly_100() {
        let scorer = TokenOverlapScorer::new();
        assert_eq!(scorer.score("trump win 2024", "trump win 2024"), 100.0);
        // Identical empty strings are identical text too.
        assert_eq!(scorer.score("", ""), 100.0);
    }

    #[test]
    fn disjoint_strings_score_near_zero() {
        let scorer = TokenOverlapScorer::new();
        let s = scorer.score("bitcoin above 100k", "jets beat dolphins");
        assert!(s < 30.0, "score={s}");
    }

    #[test]
    fn partial_overlap_lands_in_the_middle() {
        let scorer = TokenOverlapScorer::new();
        let s = scorer.score("trump win 2024 election", "trump 2024 election winner");
        assert!(s > 40.0 && s < 100.0, "score={s}");
    }

    #[test]
    fn score_is_symmetric() {
        let scorer = TokenOverlapScorer::new();
        let a = "fed cut rates march";
        let b = "fed rates cut in june";
        assert!((scorer.score(a, b) - scorer.score(b, a)).abs() < 1e-9);
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }
}
