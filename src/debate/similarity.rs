use std::collections::{BTreeMap, BTreeSet};

const MAX_FEATURES: usize = 500;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of",
    "with", "by", "from", "as", "is", "was", "are", "were", "be", "been",
];

/// Similarity of two position statements in [0, 1]. TF-IDF cosine over
/// unigrams and bigrams; falls back to Jaccard word overlap when the
/// vocabulary is too degenerate for TF-IDF to say anything. Empty input
/// on either side scores 0.0. Deterministic for identical inputs.
pub fn consensus_score(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let terms_a = ngram_counts(&tokens_a);
    let terms_b = ngram_counts(&tokens_b);
    let vocab = build_vocab(&terms_a, &terms_b);

    if let Some(score) = tfidf_cosine(&terms_a, &terms_b, &vocab) {
        return score.clamp(0.0, 1.0);
    }
    jaccard(&tokens_a, &tokens_b).clamp(0.0, 1.0)
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Case-folded alphanumeric words with stopwords removed.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            if !is_stopword(&current) {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if !current.is_empty() && !is_stopword(&current) {
        tokens.push(current);
    }
    tokens
}

/// Term frequencies over unigrams plus adjacent-word bigrams.
fn ngram_counts(tokens: &[String]) -> BTreeMap<String, f64> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0.0) += 1.0;
    }
    for pair in tokens.windows(2) {
        *counts.entry(format!("{} {}", pair[0], pair[1])).or_insert(0.0) += 1.0;
    }
    counts
}

/// Shared vocabulary capped at MAX_FEATURES, kept by total frequency with
/// lexicographic tie-breaking so the score is stable across runs.
fn build_vocab(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> Vec<String> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for (term, count) in a.iter().chain(b.iter()) {
        *totals.entry(term.as_str()).or_insert(0.0) += count;
    }
    let mut ranked: Vec<(&str, f64)> = totals.into_iter().collect();
    ranked.sort_by(|x, y| {
        y.1.partial_cmp(&x.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.0.cmp(y.0))
    });
    ranked
        .into_iter()
        .take(MAX_FEATURES)
        .map(|(term, _)| term.to_string())
        .collect()
}

fn tfidf_cosine(
    a: &BTreeMap<String, f64>,
    b: &BTreeMap<String, f64>,
    vocab: &[String],
) -> Option<f64> {
    if vocab.is_empty() {
        return None;
    }
    // Smooth idf over the two-document corpus: ln((1+n)/(1+df)) + 1.
    let n = 2.0;
    let mut vec_a = Vec::with_capacity(vocab.len());
    let mut vec_b = Vec::with_capacity(vocab.len());
    for term in vocab {
        let tf_a = a.get(term).copied().unwrap_or(0.0);
        let tf_b = b.get(term).copied().unwrap_or(0.0);
        let df = (tf_a > 0.0) as u32 as f64 + (tf_b > 0.0) as u32 as f64;
        let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
        vec_a.push(tf_a * idf);
        vec_b.push(tf_b * idf);
    }
    cosine(&vec_a, &vec_b)
}

fn cosine(a: &[f64], b: &[f64]) -> Option<f64> {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

fn jaccard(a: &[String], b: &[String]) -> f64 {
    let set_a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    if union == 0.0 { 0.0 } else { intersection / union }
}

#[cfg(test)]
mod tests {
    use super::consensus_score;

    #[test]
    fn identical_texts_score_one() {
        let text = "We should adopt a write-ahead log for crash recovery.";
        let score = consensus_score(text, text);
        assert!((score - 1.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn disjoint_vocabulary_scores_zero() {
        let score = consensus_score(
            "kubernetes cluster autoscaling policies",
            "sourdough fermentation hydration ratios",
        );
        assert!(score.abs() < 1e-9, "got {score}");
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(consensus_score("", "anything at all"), 0.0);
        assert_eq!(consensus_score("anything at all", ""), 0.0);
        assert_eq!(consensus_score("", ""), 0.0);
        assert_eq!(consensus_score("the and of", "some real words"), 0.0);
    }

    #[test]
    fn score_is_deterministic_and_bounded() {
        let a = "Caching reduces latency but complicates invalidation.";
        let b = "Caching reduces cost; invalidation is the hard part.";
        let first = consensus_score(a, b);
        for _ in 0..10 {
            assert_eq!(consensus_score(a, b), first);
        }
        assert!((0.0..=1.0).contains(&first));
    }

    #[test]
    fn partial_overlap_lands_between_extremes() {
        let a = "Use postgres for transactional storage and redis for caching.";
        let b = "Use postgres for transactional storage and kafka for events.";
        let score = consensus_score(a, b);
        assert!(score > 0.1 && score < 0.95, "got {score}");
    }

    #[test]
    fn symmetry() {
        let a = "Rate limiting belongs at the gateway.";
        let b = "The gateway should own rate limiting.";
        assert!((consensus_score(a, b) - consensus_score(b, a)).abs() < 1e-12);
    }
}
