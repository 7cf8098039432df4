//! Cross-platform candidate matching: buckets listings by category, scores
//! title similarity within each bucket, and applies entity-based
//! disqualification with best-match tie-breaking.

pub mod normalize;
pub mod similarity;

pub use similarity::{SimilarityScorer, TokenOverlapScorer};

use std::collections::{HashMap, HashSet};

use crate::config::TOP_MATCHES_SAMPLE;
use crate::types::{Category, Market, MatchCandidate, MatchSummary};

/// One cycle's matching output.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// Passed candidates, one-to-one across platforms.
    pub candidates: Vec<MatchCandidate>,
    /// Pairs actually scored (bucketed comparisons only).
    pub comparison_attempts: u64,
    /// Diagnostic sample of the highest-scoring pairings, passed or not.
    pub top_matches: Vec<MatchSummary>,
}

/// Pair every Polymarket market against every Kalshi market in the same
/// category bucket, keeping the best passing Kalshi match per Polymarket
/// market and at most one pairing per Kalshi market.
///
/// Deterministic: input order drives iteration, and ties are broken by
/// score (strictly greater replaces) then by external id.
pub fn match_markets(
    polymarket: &[Market],
    kalshi: &[Market],
    min_similarity: f64,
    scorer: &dyn SimilarityScorer,
) -> MatchOutcome {
    let mut buckets: HashMap<Category, Vec<&Market>> = HashMap::new();
    for market in kalshi {
        buckets.entry(market.category).or_default().push(market);
    }

    let mut outcome = MatchOutcome::default();
    let mut best_per_poly: Vec<MatchCandidate> = Vec::new();

    for poly in polymarket {
        let Some(bucket) = buckets.get(&poly.category) else {
            continue;
        };

        let mut best: Option<MatchCandidate> = None;
        for other in bucket {
            outcome.comparison_attempts += 1;
            let candidate = score_pair(poly, other, min_similarity, scorer);

            push_sample(&mut outcome.top_matches, &candidate);

            if candidate.passed {
                let replace = match &best {
                    Some(b) => candidate.score > b.score,
                    None => true,
                };
                if replace {
                    best = Some(candidate);
                }
            }
        }

        if let Some(candidate) = best {
            best_per_poly.push(candidate);
        }
    }

    // One pairing per Kalshi market: strongest scores claim theirs first.
    best_per_poly.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.polymarket.external_id.cmp(&b.polymarket.external_id))
    });
    let mut used_kalshi: HashSet<String> = HashSet::new();
    for candidate in best_per_poly {
        if used_kalshi.insert(candidate.kalshi.external_id.clone()) {
            outcome.candidates.push(candidate);
        }
    }

    outcome.top_matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    outcome.top_matches.truncate(TOP_MATCHES_SAMPLE);

    outcome
}

/// Score a single cross-platform pair and decide pass/fail.
fn score_pair(
    poly: &Market,
    kalshi: &Market,
    min_similarity: f64,
    scorer: &dyn SimilarityScorer,
) -> MatchCandidate {
    let score = scorer.score(&poly.normalized_title, &kalshi.normalized_title);

    let (entity_mismatch, disqualified) = compare_entities(&poly.entities, &kalshi.entities);

    let passed = score >= min_similarity && !disqualified;
    let rationale = if disqualified {
        format!(
            "disqualified: disjoint entities {:?} vs {:?} despite score {score:.1}",
            poly.entities, kalshi.entities,
        )
    } else if passed {
        format!("score {score:.1} >= {min_similarity:.0}, entities compatible")
    } else {
        format!("score {score:.1} below {min_similarity:.0} threshold")
    };

    MatchCandidate {
        polymarket: poly.clone(),
        kalshi: kalshi.clone(),
        score,
        entity_mismatch,
        passed,
        rationale,
    }
}

/// Returns the symmetric entity difference and whether the pair is
/// disqualified. Disqualification compares only the market-specific tokens
/// (proper nouns and numerics): generic category keywords sit on both sides
/// of unrelated markets ("election" on every race, "bitcoin" on every BTC
/// threshold) and must not rescue a pair whose names or numbers contradict.
fn compare_entities(a: &[String], b: &[String]) -> (Vec<String>, bool) {
    if a.is_empty() || b.is_empty() {
        return (Vec::new(), false);
    }

    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let mut mismatch: Vec<String> = Vec::new();
    for e in a {
        if !set_b.contains(e.as_str()) && !mismatch.contains(e) {
            mismatch.push(e.clone());
        }
    }
    for e in b {
        if !set_a.contains(e.as_str()) && !mismatch.contains(e) {
            mismatch.push(e.clone());
        }
    }

    fn specific<'s>(set: &HashSet<&'s str>) -> HashSet<&'s str> {
        set.iter()
            .copied()
            .filter(|e| !normalize::is_category_keyword(e))
            .collect()
    }
    let specific_a = specific(&set_a);
    let specific_b = specific(&set_b);

    let disjoint = !specific_a.is_empty()
        && !specific_b.is_empty()
        && specific_a.is_disjoint(&specific_b);
    (mismatch, disjoint)
}

fn push_sample(samples: &mut Vec<MatchSummary>, candidate: &MatchCandidate) {
    samples.push(MatchSummary {
        polymarket_title: candidate.polymarket.raw_title.clone(),
        kalshi_title: candidate.kalshi.raw_title.clone(),
        score: candidate.score,
        passed: candidate.passed,
        rationale: candidate.rationale.clone(),
    });
    // Keep the working set bounded while scanning large buckets.
    if samples.len() > TOP_MATCHES_SAMPLE * 8 {
        samples.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        samples.truncate(TOP_MATCHES_SAMPLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlatformId;

    fn market(platform: PlatformId, id: &str, title: &str, category: Category) -> Market {
        Market {
            platform,
            external_id: id.to_string(),
            raw_title: title.to_string(),
            normalized_title: normalize::normalize(title),
            entities: normalize::extract_entities(title),
            category,
            yes_price: 0.5,
            no_price: 0.5,
            volume: 1000.0,
            liquidity: 500.0,
            url: String::new(),
            book_id: id.to_string(),
        }
    }

    /// Scorer stub with a fixed score, for exercising entity rules alone.
    struct FixedScorer(f64);
    impl SimilarityScorer for FixedScorer {
        fn score(&self, _: &str, _: &str) -> f64 {
            self.0
        }
    }

    #[test]
    fn identical_titles_no_entities_score_100_and_pass() {
        let poly = vec![market(
            PlatformId::Polymarket,
            "p1",
            "will it rain soon",
            Category::Weather,
        )];
        let kalshi = vec![market(
            PlatformId::Kalshi,
            "k1",
            "Will it rain soon?",
            Category::Weather,
        )];
        assert!(poly[0].entities.is_empty());

        let outcome = match_markets(&poly, &kalshi, 100.0, &TokenOverlapScorer::new());
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].score, 100.0);
        assert!(outcome.candidates[0].passed);
    }

    #[test]
    fn disjoint_entities_disqualify_despite_high_score() {
        let poly = vec![market(
            PlatformId::Polymarket,
            "p1",
            "Will Trump win the election?",
            Category::Politics,
        )];
        let kalshi = vec![market(
            PlatformId::Kalshi,
            "k1",
            "Will Biden win the election?",
            Category::Politics,
        )];

        let outcome = match_markets(&poly, &kalshi, 60.0, &FixedScorer(95.0));
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.comparison_attempts, 1);
        assert!(!outcome.top_matches[0].passed);
        assert!(outcome.top_matches[0].rationale.contains("disqualified"));
    }

    #[test]
    fn shared_keywords_do_not_rescue_contradictory_names() {
        // Both titles carry the "election" keyword; the names still
        // contradict, so the pair must fail despite the shared token.
        let poly = vec![market(
            PlatformId::Polymarket,
            "p1",
            "Will Trump win the election?",
            Category::Politics,
        )];
        let kalshi = vec![market(
            PlatformId::Kalshi,
            "k1",
            "Will Biden win the election?",
            Category::Politics,
        )];
        assert!(poly[0].entities.contains(&"election".to_string()));
        assert!(kalshi[0].entities.contains(&"election".to_string()));

        let outcome = match_markets(&poly, &kalshi, 60.0, &FixedScorer(95.0));
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn contradictory_numeric_thresholds_disqualify() {
        let poly = vec![market(
            PlatformId::Polymarket,
            "p1",
            "Bitcoin above $100k?",
            Category::Crypto,
        )];
        let kalshi = vec![market(
            PlatformId::Kalshi,
            "k1",
            "Bitcoin above $200k?",
            Category::Crypto,
        )];

        let outcome = match_markets(&poly, &kalshi, 60.0, &FixedScorer(95.0));
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn keyword_only_entity_sets_do_not_disqualify() {
        // Neither side has a specific name or number, so there is nothing
        // to contradict; the score alone decides.
        let poly = vec![market(
            PlatformId::Polymarket,
            "p1",
            "will the election be contested",
            Category::Politics,
        )];
        let kalshi = vec![market(
            PlatformId::Kalshi,
            "k1",
            "will the election get contested",
            Category::Politics,
        )];
        assert_eq!(poly[0].entities, vec!["election".to_string()]);

        let outcome = match_markets(&poly, &kalshi, 60.0, &FixedScorer(80.0));
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[test]
    fn overlapping_entities_record_mismatch_but_pass() {
        let poly = vec![market(
            PlatformId::Polymarket,
            "p1",
            "Trump wins Pennsylvania 2024",
            Category::Politics,
        )];
        let kalshi = vec![market(
            PlatformId::Kalshi,
            "k1",
            "Trump carries Georgia 2024",
            Category::Politics,
        )];

        let outcome = match_markets(&poly, &kalshi, 10.0, &FixedScorer(80.0));
        assert_eq!(outcome.candidates.len(), 1);
        let c = &outcome.candidates[0];
        assert!(c.passed);
        assert!(c.entity_mismatch.contains(&"pennsylvania".to_string()));
        assert!(c.entity_mismatch.contains(&"georgia".to_string()));
    }

    #[test]
    fn cross_category_pairs_are_never_compared() {
        let poly = vec![market(
            PlatformId::Polymarket,
            "p1",
            "bitcoin above 100k",
            Category::Crypto,
        )];
        let kalshi = vec![market(
            PlatformId::Kalshi,
            "k1",
            "bitcoin above 100k",
            Category::Sports,
        )];

        let outcome = match_markets(&poly, &kalshi, 50.0, &TokenOverlapScorer::new());
        assert_eq!(outcome.comparison_attempts, 0);
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn best_match_per_polymarket_market_wins() {
        let poly = vec![market(
            PlatformId::Polymarket,
            "p1",
            "bitcoin above 100k by march",
            Category::Crypto,
        )];
        let kalshi = vec![
            market(
                PlatformId::Kalshi,
                "k1",
                "bitcoin above 100k by june",
                Category::Crypto,
            ),
            market(
                PlatformId::Kalshi,
                "k2",
                "bitcoin above 100k by march",
                Category::Crypto,
            ),
        ];

        let outcome = match_markets(&poly, &kalshi, 50.0, &TokenOverlapScorer::new());
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].kalshi.external_id, "k2");
    }

    #[test]
    fn one_kalshi_market_pairs_at_most_once() {
        let poly = vec![
            market(
                PlatformId::Polymarket,
                "p1",
                "jets beat dolphins sunday",
                Category::Sports,
            ),
            market(
                PlatformId::Polymarket,
                "p2",
                "jets beat dolphins sunday night",
                Category::Sports,
            ),
        ];
        let kalshi = vec![market(
            PlatformId::Kalshi,
            "k1",
            "jets beat dolphins sunday",
            Category::Sports,
        )];

        let outcome = match_markets(&poly, &kalshi, 50.0, &TokenOverlapScorer::new());
        assert_eq!(outcome.candidates.len(), 1);
        // The exact-title pairing scores 100 and claims the Kalshi market.
        assert_eq!(outcome.candidates[0].polymarket.external_id, "p1");
    }

    #[test]
    fn matching_is_deterministic() {
        let poly: Vec<Market> = (0..5)
            .map(|i| {
                market(
                    PlatformId::Polymarket,
                    &format!("p{i}"),
                    &format!("bitcoin above {i}0k by march"),
                    Category::Crypto,
                )
            })
            .collect();
        let kalshi: Vec<Market> = (0..5)
            .map(|i| {
                market(
                    PlatformId::Kalshi,
                    &format!("k{i}"),
                    &format!("bitcoin above {i}0k by march"),
                    Category::Crypto,
                )
            })
            .collect();

        let scorer = TokenOverlapScorer::new();
        let first = match_markets(&poly, &kalshi, 50.0, &scorer);
        let second = match_markets(&poly, &kalshi, 50.0, &scorer);

        assert_eq!(first.comparison_attempts, second.comparison_attempts);
        let ids = |o: &MatchOutcome| {
            o.candidates
                .iter()
                .map(|c| {
                    (
                        c.polymarket.external_id.clone(),
                        c.kalshi.external_id.clone(),
                        c.score.to_bits(),
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
    }
}
