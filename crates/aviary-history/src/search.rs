//! Typo-tolerant species search.
//!
//! Scores are normalized edit distances in `0.0..=1.0`, lower is better. The
//! pattern may match anywhere inside the species name, so "heron" scores 0.0
//! against "Grey Heron" and "herron" scores about 0.17.

use aviary_core::types::BirdSighting;

/// Normalized approximate-substring edit distance of `pattern` within `text`.
///
/// Case-insensitive. An empty pattern scores 0.0.
pub fn fuzzy_score(pattern: &str, text: &str) -> f64 {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    if pattern.is_empty() {
        return 0.0;
    }
    let text: Vec<char> = text.to_lowercase().chars().collect();

    // Row over pattern prefixes; the text may begin anywhere, so the row for
    // an empty text prefix is reset to zero cost at every column.
    let mut prev: Vec<usize> = (0..=pattern.len()).collect();
    let mut best = prev[pattern.len()];
    let mut curr = vec![0; pattern.len() + 1];

    for tc in &text {
        curr[0] = 0;
        for (i, pc) in pattern.iter().enumerate() {
            let substitution = prev[i] + usize::from(pc != tc);
            let insertion = prev[i + 1] + 1;
            let deletion = curr[i] + 1;
            curr[i + 1] = substitution.min(insertion).min(deletion);
        }
        best = best.min(curr[pattern.len()]);
        std::mem::swap(&mut prev, &mut curr);
    }

    (best as f64 / pattern.len() as f64).min(1.0)
}

/// Filter already-loaded sightings by species.
///
/// An empty or whitespace query keeps everything. When any species equals
/// the query ignoring case, only those exact matches are kept; otherwise
/// every sighting scoring at or under `threshold` is kept. Input order is
/// preserved.
pub fn search_species(items: &[BirdSighting], query: &str, threshold: f64) -> Vec<BirdSighting> {
    let query = query.trim();
    if query.is_empty() {
        return items.to_vec();
    }

    let lowered = query.to_lowercase();
    let exact: Vec<BirdSighting> = items
        .iter()
        .filter(|s| s.species.to_lowercase() == lowered)
        .cloned()
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    items
        .iter()
        .filter(|s| fuzzy_score(query, &s.species) <= threshold)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn sightings(names: &[&str]) -> Vec<BirdSighting> {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        names
            .iter()
            .enumerate()
            .map(|(i, name)| BirdSighting {
                id: format!("s{i}"),
                species: name.to_string(),
                latitude: 0.0,
                longitude: 0.0,
                timestamp: base - Duration::minutes(i as i64),
            })
            .collect()
    }

    fn species(items: &[BirdSighting]) -> Vec<&str> {
        items.iter().map(|s| s.species.as_str()).collect()
    }

    // =========================================================================
    // fuzzy_score
    // =========================================================================

    #[test]
    fn test_score_exact_and_substring() {
        assert_eq!(fuzzy_score("robin", "robin"), 0.0);
        assert_eq!(fuzzy_score("ROBIN", "American Robin"), 0.0);
        assert_eq!(fuzzy_score("heron", "Grey Heron"), 0.0);
    }

    #[test]
    fn test_score_single_typo() {
        assert!((fuzzy_score("robn", "Robin") - 0.25).abs() < 1e-9);
        assert!((fuzzy_score("herron", "Grey Heron") - 1.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_unrelated_is_high() {
        assert!(fuzzy_score("sparrow", "Mallard") > 0.5);
        assert_eq!(fuzzy_score("wren", ""), 1.0);
    }

    #[test]
    fn test_score_empty_pattern() {
        assert_eq!(fuzzy_score("", "anything"), 0.0);
    }

    #[test]
    fn test_score_capped_at_one() {
        assert!(fuzzy_score("abcdefgh", "xy") <= 1.0);
    }

    // =========================================================================
    // search_species
    // =========================================================================

    #[test]
    fn test_empty_query_returns_all() {
        let items = sightings(&["Robin", "Mallard"]);
        assert_eq!(search_species(&items, "", 0.4), items);
        assert_eq!(search_species(&items, "   ", 0.4), items);
    }

    #[test]
    fn test_exact_match_takes_precedence() {
        let items = sightings(&["Robin", "American Robin", "Robin", "Rbin"]);
        let found = search_species(&items, "robin", 0.4);
        assert_eq!(species(&found), vec!["Robin", "Robin"]);
        assert_eq!(found[0].id, "s0");
        assert_eq!(found[1].id, "s2");
    }

    #[test]
    fn test_exact_match_excludes_longer_names() {
        let items = sightings(&["Blue Jay", "Blue Jaybird"]);
        assert_eq!(species(&search_species(&items, "Blue Jay", 0.4)), vec!["Blue Jay"]);
    }

    #[test]
    fn test_typo_tolerant_match() {
        let items = sightings(&["Robin", "Mallard", "Blue Jay", "American Robin"]);
        let found = search_species(&items, "robn", 0.4);
        assert_eq!(species(&found), vec!["Robin", "American Robin"]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let items = sightings(&["Robin", "Mallard"]);
        assert!(search_species(&items, "cassowary", 0.4).is_empty());
    }

    #[test]
    fn test_threshold_zero_requires_substring() {
        let items = sightings(&["Great Blue Heron", "Robin"]);
        assert_eq!(species(&search_species(&items, "blue", 0.0)), vec!["Great Blue Heron"]);
        assert!(search_species(&items, "bleu", 0.0).is_empty());
    }
}
