const MAX_SUGGESTIONS: usize = 5;
const MIN_QUERY_LEN: usize = 2;

const COMMON_PHRASES: &[&str] = &[
    "cement prices",
    "steel suppliers",
    "logistics routes",
    "agricultural supplies",
    "construction materials",
    "fertilizer prices",
    "seed suppliers",
    "equipment rental",
];

/// Cheap, synchronous completions against a static phrase set. Deliberately
/// not debounced: this never runs a full evaluation.
#[must_use]
pub fn suggestions(query: &str) -> Vec<String> {
    let query = query.trim().to_lowercase();
    if query.len() < MIN_QUERY_LEN {
        return Vec::new();
    }

    COMMON_PHRASES
        .iter()
        .filter(|phrase| phrase.contains(&query))
        .take(MAX_SUGGESTIONS)
        .map(|phrase| (*phrase).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_queries_yield_nothing() {
        assert!(suggestions("").is_empty());
        assert!(suggestions("c").is_empty());
        assert!(suggestions(" s ").is_empty());
    }

    #[test]
    fn matches_are_case_insensitive_substrings() {
        assert_eq!(suggestions("CEM"), vec!["cement prices".to_string()]);
        assert_eq!(
            suggestions("suppliers"),
            vec!["steel suppliers".to_string(), "seed suppliers".to_string()]
        );
    }

    #[test]
    fn suggestions_are_capped() {
        assert!(suggestions("s").is_empty());
        assert!(suggestions("es").len() <= MAX_SUGGESTIONS);
    }
}
