use std::collections::HashMap;

use crate::tokenizer::tokenize;

/// Static term-weighted vector index over the whole corpus: a vocabulary of
/// unigrams and bigrams mapped to dimensions, and one l2-normalized sparse
/// row per document. Built once at startup and never mutated; queries are
/// projected onto the same vocabulary, so terms unseen at build time simply
/// contribute nothing.
pub struct TfidfIndex {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
    /// One row per document, entries sorted by dimension.
    rows: Vec<Vec<(usize, f32)>>,
}

impl TfidfIndex {
    /// Build the index from the normalized document texts. The vocabulary is
    /// capped at `max_vocab` terms, keeping the most frequent across the
    /// corpus (ties broken by term, ascending, so builds are reproducible).
    /// Returns `None` for an empty corpus.
    pub fn build<'a, I>(texts: I, max_vocab: usize) -> Option<TfidfIndex>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let doc_features: Vec<Vec<String>> = texts.into_iter().map(features).collect();
        if doc_features.is_empty() {
            tracing::warn!("no documents to index");
            return None;
        }

        // Corpus-wide counts drive vocabulary selection.
        let mut totals: HashMap<&str, u64> = HashMap::new();
        for feats in &doc_features {
            for f in feats {
                *totals.entry(f.as_str()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(&str, u64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(max_vocab);
        let mut terms: Vec<&str> = ranked.into_iter().map(|(t, _)| t).collect();
        terms.sort_unstable();
        let vocabulary: HashMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(dim, term)| (term.to_string(), dim))
            .collect();

        // Document frequencies over the retained vocabulary.
        let n_docs = doc_features.len();
        let mut df = vec![0u32; vocabulary.len()];
        let mut counted: Vec<HashMap<usize, u32>> = Vec::with_capacity(n_docs);
        for feats in &doc_features {
            let mut counts: HashMap<usize, u32> = HashMap::new();
            for f in feats {
                if let Some(&dim) = vocabulary.get(f.as_str()) {
                    *counts.entry(dim).or_insert(0) += 1;
                }
            }
            for &dim in counts.keys() {
                df[dim] += 1;
            }
            counted.push(counts);
        }

        // Smoothed idf, then l2-normalized rows.
        let idf: Vec<f32> = df
            .iter()
            .map(|&d| ((1.0 + n_docs as f32) / (1.0 + d as f32)).ln() + 1.0)
            .collect();
        let rows = counted
            .into_iter()
            .map(|counts| weigh(counts, &idf))
            .collect();

        Some(TfidfIndex { vocabulary, idf, rows })
    }

    pub fn num_docs(&self) -> usize {
        self.rows.len()
    }

    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Project a query onto the index vocabulary; the result is l2-normalized
    /// and empty when no query term is known to the index.
    pub fn vectorize(&self, query: &str) -> Vec<(usize, f32)> {
        let mut counts: HashMap<usize, u32> = HashMap::new();
        for f in features(query) {
            if let Some(&dim) = self.vocabulary.get(f.as_str()) {
                *counts.entry(dim).or_insert(0) += 1;
            }
        }
        weigh(counts, &self.idf)
    }

    /// Cosine similarity of the query vector against every document row.
    /// Both sides are normalized, so this is a sparse dot product.
    pub fn similarities(&self, query: &[(usize, f32)]) -> Vec<f32> {
        self.rows.iter().map(|row| dot(query, row)).collect()
    }
}

/// Index features for one text: unigrams plus adjacent bigrams over the
/// normalized term stream.
fn features(text: &str) -> Vec<String> {
    let terms = tokenize(text);
    let mut feats = Vec::with_capacity(terms.len().saturating_mul(2));
    for pair in terms.windows(2) {
        feats.push(format!("{} {}", pair[0], pair[1]));
    }
    feats.extend(terms);
    feats
}

fn weigh(counts: HashMap<usize, u32>, idf: &[f32]) -> Vec<(usize, f32)> {
    let mut entries: Vec<(usize, f32)> = counts
        .into_iter()
        .map(|(dim, tf)| (dim, tf as f32 * idf[dim]))
        .collect();
    entries.sort_unstable_by_key(|&(dim, _)| dim);
    let norm = entries.iter().map(|&(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in entries.iter_mut() {
            *w /= norm;
        }
    }
    entries
}

fn dot(a: &[(usize, f32)], b: &[(usize, f32)]) -> f32 {
    let mut sum = 0.0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_corpus_builds_nothing() {
        assert!(TfidfIndex::build(std::iter::empty(), 10_000).is_none());
    }

    #[test]
    fn matching_document_scores_highest() {
        let texts = [
            "Cockroaches hide in warm dark places near water.",
            "Aphids damage garden roses in the spring.",
        ];
        let index = TfidfIndex::build(texts.iter().copied(), 10_000).unwrap();
        let q = index.vectorize("how to deal with cockroaches");
        let sims = index.similarities(&q);
        assert_eq!(sims.len(), 2);
        assert!(sims[0] > sims[1]);
        assert!(sims[0] > 0.0);
    }

    #[test]
    fn unknown_terms_vectorize_to_empty() {
        let index = TfidfIndex::build(["ants eat sugar"].into_iter(), 10_000).unwrap();
        assert!(index.vectorize("quantum chromodynamics").is_empty());
    }

    #[test]
    fn vocabulary_cap_is_respected() {
        let texts = ["one two three four five six seven eight nine ten"];
        let index = TfidfIndex::build(texts.into_iter(), 5).unwrap();
        assert_eq!(index.vocab_size(), 5);
    }

    #[test]
    fn self_similarity_is_one() {
        let texts = ["termites eat wooden beams", "rats gnaw on wires"];
        let index = TfidfIndex::build(texts.iter().copied(), 10_000).unwrap();
        let q = index.vectorize("termites eat wooden beams");
        let sims = index.similarities(&q);
        assert!((sims[0] - 1.0).abs() < 1e-5);
    }
}
