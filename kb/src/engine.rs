use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::KbConfig;
use crate::index::TfidfIndex;
use crate::pipeline::{EntityLabel, Pipeline, PosTag};
use crate::store::{DocMeta, DocumentStore};

/// Substring cues for the rule-based entity buckets. Checked in a fixed
/// priority order: pests, then products, then geopolitical label; an entity
/// lands in exactly one bucket.
const PEST_TERMS: &[&str] = &[
    "bug", "cockroach", "roach", "ant", "termite", "rodent", "rat", "mouse", "mosquito", "flea",
    "bedbug", "wasp", "spider", "pest",
];
const PRODUCT_TERMS: &[&str] = &[
    "product", "solution", "treatment", "spray", "trap", "bait", "poison", "insecticide",
    "pesticide", "repellent",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityBuckets {
    pub pests: Vec<String>,
    pub products: Vec<String>,
    pub locations: Vec<String>,
    pub other: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevantDoc {
    pub filename: String,
    pub title: String,
    pub path: String,
    pub similarity_score: f32,
    pub content_preview: String,
}

/// Everything the retrieval layer knows about one query. Built fresh per
/// request and never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryContext {
    pub entities: EntityBuckets,
    pub keywords: Vec<String>,
    pub original_query: String,
    pub relevant_docs: Vec<RelevantDoc>,
}

/// The query-understanding and retrieval engine. Constructed once at startup;
/// afterwards everything is read-only, so one instance can be shared freely
/// across concurrent request tasks.
pub struct KnowledgeEngine {
    store: DocumentStore,
    index: Option<TfidfIndex>,
    pipeline: Pipeline,
    config: KbConfig,
}

impl KnowledgeEngine {
    /// Load the pipeline and the corpus, then build the index. A pipeline
    /// failure is fatal; a missing or partly unreadable corpus is not — the
    /// engine then serves empty retrieval results.
    pub fn new(config: KbConfig) -> Result<KnowledgeEngine> {
        let pipeline = Pipeline::load().context("loading linguistic pipeline")?;
        let store = DocumentStore::load(&config.kb_dir);
        let index = TfidfIndex::build(store.texts(), config.max_vocab);
        match &index {
            Some(index) => tracing::info!(
                docs = index.num_docs(),
                terms = index.vocab_size(),
                "knowledge base indexed"
            ),
            None => tracing::warn!("retrieval disabled: empty knowledge base"),
        }
        Ok(KnowledgeEngine { store, index, pipeline, config })
    }

    pub fn num_docs(&self) -> usize {
        self.store.len()
    }

    /// Metadata for every loaded document, in corpus order. No content.
    pub fn documents(&self) -> Vec<DocMeta> {
        (0..self.store.len()).filter_map(|i| self.store.metadata(i)).collect()
    }

    /// Keywords from lower-cased text: named-entity surfaces first, then the
    /// lemma of every content word (noun, proper noun, adjective, verb) that
    /// is not a stop word and is longer than two characters. Deduplicated,
    /// first occurrence wins.
    pub fn extract_keywords(&self, text: &str) -> Vec<String> {
        let analysis = self.pipeline.analyze(&text.to_lowercase());
        let mut keywords = Vec::new();
        for entity in &analysis.entities {
            if entity.label != EntityLabel::Misc {
                keywords.push(entity.text.clone());
            }
        }
        for token in &analysis.tokens {
            let content_word = matches!(
                token.tag,
                PosTag::Noun | PosTag::ProperNoun | PosTag::Adjective | PosTag::Verb
            );
            if content_word && !token.is_stop && token.text.chars().count() > 2 {
                keywords.push(token.lemma.clone());
            }
        }
        dedup_preserving_order(keywords)
    }

    /// Sort each recognized entity into exactly one bucket. Pest cues win
    /// over product cues, product cues over the geopolitical label, and
    /// everything else falls through to `other`.
    pub fn classify_entities(&self, query: &str) -> EntityBuckets {
        let analysis = self.pipeline.analyze(query);
        let mut buckets = EntityBuckets::default();
        for entity in analysis.entities {
            let lower = entity.text.to_lowercase();
            if PEST_TERMS.iter().any(|t| lower.contains(t)) {
                buckets.pests.push(entity.text);
            } else if PRODUCT_TERMS.iter().any(|t| lower.contains(t)) {
                buckets.products.push(entity.text);
            } else if entity.label == EntityLabel::Gpe {
                buckets.locations.push(entity.text);
            } else {
                buckets.other.push(entity.text);
            }
        }
        buckets
    }

    /// Rank the corpus against the query and keep the `top_k` best documents
    /// scoring above the relevance floor. Ties break toward the lower
    /// document index, so output is reproducible. Previews are bounded;
    /// full content is never returned.
    pub fn find_relevant_documents(&self, query: &str, top_k: usize) -> Vec<RelevantDoc> {
        let index = match &self.index {
            Some(index) => index,
            None => return Vec::new(),
        };
        let qvec = index.vectorize(query);
        if qvec.is_empty() {
            return Vec::new();
        }
        let sims = index.similarities(&qvec);
        let mut ranked: Vec<(usize, f32)> = sims.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked
            .into_iter()
            .take(top_k)
            .filter(|&(_, score)| score > self.config.similarity_floor)
            .filter_map(|(idx, score)| {
                let doc = self.store.get(idx)?;
                Some(RelevantDoc {
                    filename: doc.filename.clone(),
                    title: doc.title.clone(),
                    path: doc.path.clone(),
                    similarity_score: score,
                    content_preview: preview(&doc.text, self.config.preview_chars),
                })
            })
            .collect()
    }

    /// One composite answer per query: entity buckets, keywords, and the
    /// default-sized relevant-document list. Pure composition.
    pub fn build_query_context(&self, query: &str) -> QueryContext {
        QueryContext {
            entities: self.classify_entities(query),
            keywords: self.extract_keywords(query),
            original_query: query.to_string(),
            relevant_docs: self.find_relevant_documents(query, self.config.top_k),
        }
    }

    pub fn default_top_k(&self) -> usize {
        self.config.top_k
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut chars = text.chars();
    for _ in 0..max_chars {
        match chars.next() {
            Some(c) => out.push(c),
            None => return out,
        }
    }
    if chars.next().is_some() {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_only_past_the_limit() {
        assert_eq!(preview("abc", 5), "abc");
        assert_eq!(preview("abcde", 5), "abcde");
        assert_eq!(preview("abcdef", 5), "abcde...");
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let deduped = dedup_preserving_order(vec![
            "ant".into(),
            "bait".into(),
            "ant".into(),
            "gel".into(),
            "bait".into(),
        ]);
        assert_eq!(deduped, vec!["ant".to_string(), "bait".into(), "gel".into()]);
    }
}
