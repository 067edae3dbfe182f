//! Edit-distance similarity scoring for identifier suggestions.

use std::collections::HashMap;
use std::sync::RwLock;

/// Score assigned when one identifier contains the other.
const SUBSTRING_SCORE: f64 = 0.8;
/// Minimum score for an identifier to be suggested.
const SUGGESTION_THRESHOLD: f64 = 0.5;
/// Maximum number of suggestions returned.
const MAX_SUGGESTIONS: usize = 3;

/// Memoizing similarity scorer.
///
/// Pairwise scores are cached keyed by the lexicographically sorted pair,
/// so repeated comparisons across a batch run are O(1) after the first.
/// The cache is instance-scoped and unbounded for the engine's lifetime.
#[derive(Debug, Default)]
pub struct SimilarityScorer {
    cache: RwLock<HashMap<(String, String), f64>>,
}

impl SimilarityScorer {
    /// Creates a new scorer with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores the similarity of two identifiers in `[0, 1]`.
    ///
    /// Identifiers containing each other as a substring score a flat 0.8;
    /// otherwise a normalized Levenshtein similarity is returned.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };

        if let Ok(cache) = self.cache.read() {
            if let Some(&score) = cache.get(&key) {
                return score;
            }
        }

        let score = compute_score(a, b);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, score);
        }
        score
    }

    /// Suggests up to 3 known identifiers similar to `unknown`, scored above
    /// 0.5 and sorted by descending similarity.
    pub fn suggest<I, S>(&self, unknown: &str, known: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut scored: Vec<(String, f64)> = known
            .into_iter()
            .map(|k| {
                let k = k.as_ref();
                (k.to_string(), self.score(unknown, k))
            })
            .filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(MAX_SUGGESTIONS);
        scored.into_iter().map(|(name, _)| name).collect()
    }

    /// Number of memoized pairs.
    #[must_use]
    pub fn cached_pairs(&self) -> usize {
        self.cache.read().map_or(0, |c| c.len())
    }

    /// Clears the memo cache.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }
}

fn compute_score(a: &str, b: &str) -> f64 {
    if a.contains(b) || b.contains(a) {
        return SUBSTRING_SCORE;
    }
    // Normalized over the combined length, so moderately related identifiers
    // of different lengths still clear the suggestion threshold.
    let combined = a.chars().count() + b.chars().count();
    if combined == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let similarity = 1.0 - (levenshtein(a, b) as f64 / combined as f64);
    similarity
}

/// Simple Levenshtein distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate().take(m + 1) {
        row[0] = i;
    }
    for (j, val) in dp[0].iter_mut().enumerate().take(n + 1) {
        *val = j;
    }
    for i in 1..=m {
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }
    dp[m][n]
}
