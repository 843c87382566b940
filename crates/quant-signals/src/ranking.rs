//! Cross-sectional ranking.

use std::collections::BTreeMap;

/// Rank values cross-sectionally into [0, 1], ties averaged.
///
/// The lowest value ranks 0 and the highest 1; tied values all receive the
/// mean of the positions they span. A single entry ranks 0.5. Input order
/// does not matter; output is keyed by asset id so the result is
/// deterministic.
pub fn average_rank(values: &[(String, f64)]) -> BTreeMap<String, f64> {
    let mut ranks = BTreeMap::new();
    if values.is_empty() {
        return ranks;
    }
    if values.len() == 1 {
        ranks.insert(values[0].0.clone(), 0.5);
        return ranks;
    }

    // Sort by value, breaking exact ties by asset id for reproducibility.
    let mut sorted: Vec<(&str, f64)> = values.iter().map(|(id, v)| (id.as_str(), *v)).collect();
    sorted.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let denom = (sorted.len() - 1) as f64;
    let mut i = 0;
    while i < sorted.len() {
        // Find the extent of this tie group.
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1].1 == sorted[i].1 {
            j += 1;
        }
        let mean_position = (i + j) as f64 / 2.0;
        let rank = mean_position / denom;
        for entry in &sorted[i..=j] {
            ranks.insert(entry.0.to_string(), rank);
        }
        i = j + 1;
    }
    ranks
}
