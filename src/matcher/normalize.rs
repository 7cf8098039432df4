//! Title canonicalization and entity extraction. Pure string work, no I/O.

/// Filler words stripped during normalization and ignored as entities.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "by", "for", "from", "in", "is",
    "of", "on", "or", "the", "this", "to", "will", "with",
];

/// Domain keywords extracted as entities even when not capitalized in source.
const CATEGORY_KEYWORDS: &[&str] = &[
    "bitcoin", "btc", "ethereum", "eth", "solana", "sol", "fed", "cpi",
    "gdp", "inflation", "recession", "election", "senate", "president",
    "superbowl", "nba", "nfl", "mlb", "ufc",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Whether an extracted entity is a generic domain keyword rather than a
/// market-specific token. Keywords appear on both sides of unrelated markets
/// ("election", "fed", "bitcoin"), so disqualification must not count them
/// as shared evidence.
pub fn is_category_keyword(token: &str) -> bool {
    CATEGORY_KEYWORDS.contains(&token)
}

/// Lowercase, strip punctuation, drop filler words, collapse whitespace.
/// Idempotent: the output contains only lowercase alphanumerics and single
/// spaces, and no stopwords, so a second pass changes nothing.
pub fn normalize(raw_title: &str) -> String {
    let lower = raw_title.to_lowercase();
    let mut scrubbed = String::with_capacity(lower.len());
    for ch in lower.chars() {
        if ch.is_alphanumeric() {
            scrubbed.push(ch);
        } else {
            scrubbed.push(' ');
        }
    }
    scrubbed
        .split_whitespace()
        .filter(|t| !is_stopword(t))
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Heuristic entity extraction from the raw (cased) title: proper nouns that
/// are capitalized in source, numeric quantities (prices, years, percents),
/// and known domain keywords. Output tokens are lowercased, deduplicated,
/// and keep source order. May be empty.
pub fn extract_entities(raw_title: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();

    for word in raw_title.split_whitespace() {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '.')
            .collect();
        if cleaned.is_empty() {
            continue;
        }

        let lowered = cleaned.to_lowercase();
        let first = cleaned.chars().next().unwrap_or(' ');

        // Trailing punctuation other than the percent sign is stripped
        // before the suffix check, so "5%?" still reads as a percentage.
        let numeric = first.is_ascii_digit()
            || word.starts_with('$')
            || word
                .trim_end_matches(|c: char| !c.is_alphanumeric() && c != '%')
                .ends_with('%');
        let proper_noun = first.is_uppercase() && !is_stopword(lowered.as_str());
        let keyword = CATEGORY_KEYWORDS.contains(&lowered.as_str());

        if (numeric || proper_noun || keyword) && !entities.contains(&lowered) {
            // Trim trailing periods left from abbreviations / sentence ends.
            let token = lowered.trim_matches('.').to_string();
            if !token.is_empty() && !entities.contains(&token) {
                entities.push(token);
            }
        }
    }

    entities
}
