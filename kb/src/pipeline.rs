//! Lexicon-driven linguistic pipeline: tokenization, part-of-speech tagging,
//! lemmatization, and named-entity recognition.
//!
//! The lexicons (entity gazetteer, lemma exception table) are embedded at
//! compile time and parsed once by [`Pipeline::load`]; a malformed lexicon is
//! a hard error. `analyze` is pure and takes `&self`, so one pipeline can
//! serve any number of concurrent queries.

use anyhow::{anyhow, bail, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;

use crate::tokenizer::is_stopword;

const GAZETTEER: &str = include_str!("../lexicon/gazetteer.tsv");
const LEMMA_EXCEPTIONS: &str = include_str!("../lexicon/lemma_exceptions.tsv");

lazy_static! {
    static ref TOKEN_RE: Regex =
        Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*|\p{N}+|[^\p{L}\p{N}\s]").expect("valid regex");
    static ref HONORIFICS: HashSet<&'static str> =
        ["mr", "mrs", "ms", "dr", "prof", "eng"].into_iter().collect();
    static ref ORG_SUFFIXES: HashSet<&'static str> = [
        "inc", "ltd", "llc", "corp", "co", "company", "group", "agency", "laboratories", "labs",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosTag {
    Noun,
    ProperNoun,
    Verb,
    Adjective,
    Adverb,
    Number,
    Punct,
    /// Closed-class words: determiners, pronouns, prepositions, auxiliaries.
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityLabel {
    Person,
    Org,
    Product,
    Gpe,
    Norp,
    Misc,
}

impl EntityLabel {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "PERSON" => Some(Self::Person),
            "ORG" => Some(Self::Org),
            "PRODUCT" => Some(Self::Product),
            "GPE" => Some(Self::Gpe),
            "NORP" => Some(Self::Norp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    pub lemma: String,
    pub tag: PosTag,
    pub is_stop: bool,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    pub tokens: Vec<Token>,
    pub entities: Vec<Entity>,
}

/// Raw token as scanned from the input, before tagging.
struct RawToken<'a> {
    text: &'a str,
    lower: String,
    is_word: bool,
    is_number: bool,
    capitalized: bool,
    sentence_start: bool,
}

pub struct Pipeline {
    gazetteer: HashMap<String, EntityLabel>,
    /// Longest gazetteer key, in words.
    gazetteer_span: usize,
    lemma_exceptions: HashMap<String, String>,
}

impl Pipeline {
    pub fn load() -> Result<Self> {
        let gazetteer = parse_gazetteer(GAZETTEER).context("parsing entity gazetteer")?;
        let lemma_exceptions =
            parse_lemma_table(LEMMA_EXCEPTIONS).context("parsing lemma exception table")?;
        let gazetteer_span = gazetteer
            .keys()
            .map(|k| k.split(' ').count())
            .max()
            .unwrap_or(1);
        Ok(Self { gazetteer, gazetteer_span, lemma_exceptions })
    }

    pub fn analyze(&self, text: &str) -> Analysis {
        let normalized = text.nfkc().collect::<String>();
        let raw = scan(&normalized);
        let entities = self.detect_entities(&raw);
        let tokens = raw.iter().map(|t| self.tag_token(t)).collect();
        Analysis { tokens, entities }
    }

    fn tag_token(&self, raw: &RawToken) -> Token {
        if !raw.is_word {
            let tag = if raw.is_number { PosTag::Number } else { PosTag::Punct };
            return Token {
                text: raw.text.to_string(),
                lemma: raw.lower.clone(),
                tag,
                is_stop: false,
            };
        }
        let is_stop = is_stopword(&raw.lower);
        let tag = self.tag_word(raw, is_stop);
        let lemma = self.lemmatize(&raw.lower, tag);
        Token { text: raw.text.to_string(), lemma, tag, is_stop }
    }

    fn tag_word(&self, raw: &RawToken, is_stop: bool) -> PosTag {
        let w = raw.lower.as_str();
        if self.gazetteer.contains_key(w) {
            return PosTag::ProperNoun;
        }
        if is_stop {
            return PosTag::Function;
        }
        if raw.capitalized && !raw.sentence_start {
            return PosTag::ProperNoun;
        }
        let n = w.len();
        // "-ly" is adverbial except for the likes of butterfly and apply.
        if n > 4 && w.ends_with("ly") && !w.ends_with("fly") && !w.ends_with("ply") {
            return PosTag::Adverb;
        }
        if n > 5 && w.ends_with("ing") || n > 4 && w.ends_with("ed") {
            return PosTag::Verb;
        }
        if ["ize", "ise", "ify"].iter().any(|s| n > 4 && w.ends_with(s)) {
            return PosTag::Verb;
        }
        if ["ous", "ful", "ive", "less", "able", "ible", "ish", "ical"]
            .iter()
            .any(|s| n > s.len() + 1 && w.ends_with(s))
        {
            return PosTag::Adjective;
        }
        PosTag::Noun
    }

    fn lemmatize(&self, word: &str, tag: PosTag) -> String {
        if let Some(lemma) = self.lemma_exceptions.get(word) {
            return lemma.clone();
        }
        match tag {
            PosTag::Noun => noun_lemma(word),
            PosTag::Verb => verb_lemma(word),
            // Comparatives and superlatives only lemmatize via the exception
            // table; blind -er/-est stripping mangles too many base words.
            _ => word.to_string(),
        }
    }

    /// Scan left to right, preferring the longest gazetteer match at each
    /// position, then falling back to capitalized spans. Punctuation breaks
    /// spans, and a sentence-initial capital never starts one: outside the
    /// gazetteer it is not evidence of a name.
    fn detect_entities(&self, raw: &[RawToken]) -> Vec<Entity> {
        let mut entities = Vec::new();
        let mut i = 0;
        while i < raw.len() {
            if !raw[i].is_word {
                i += 1;
                continue;
            }
            if let Some((len, label)) = self.gazetteer_match(raw, i) {
                entities.push(Entity { text: join_surface(&raw[i..i + len]), label });
                i += len;
                continue;
            }
            if is_span_candidate(&raw[i]) && !raw[i].sentence_start {
                let start = i;
                while i < raw.len() && is_span_candidate(&raw[i]) {
                    i += 1;
                }
                if let Some(entity) = self.resolve_span(raw, start, i) {
                    entities.push(entity);
                }
                continue;
            }
            i += 1;
        }
        entities
    }

    fn gazetteer_match(&self, raw: &[RawToken], start: usize) -> Option<(usize, EntityLabel)> {
        let mut end = start;
        while end < raw.len() && raw[end].is_word && end - start < self.gazetteer_span {
            end += 1;
        }
        for len in (1..=end - start).rev() {
            let key = raw[start..start + len]
                .iter()
                .map(|t| t.lower.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if let Some(&label) = self.gazetteer.get(&key) {
                return Some((len, label));
            }
        }
        None
    }

    fn resolve_span(&self, raw: &[RawToken], start: usize, end: usize) -> Option<Entity> {
        let span = &raw[start..end];
        if HONORIFICS.contains(span[0].lower.as_str()) {
            if span.len() == 1 {
                return None;
            }
            return Some(Entity { text: join_surface(&span[1..]), label: EntityLabel::Person });
        }
        let prev_word = raw[..start].iter().rev().find(|t| t.is_word);
        if prev_word.is_some_and(|t| HONORIFICS.contains(t.lower.as_str())) {
            return Some(Entity { text: join_surface(span), label: EntityLabel::Person });
        }
        let label = if ORG_SUFFIXES.contains(span[span.len() - 1].lower.as_str()) {
            EntityLabel::Org
        } else {
            EntityLabel::Misc
        };
        Some(Entity { text: join_surface(span), label })
    }
}

fn is_span_candidate(raw: &RawToken) -> bool {
    raw.is_word && raw.capitalized && !is_stopword(&raw.lower)
}

fn join_surface(span: &[RawToken]) -> String {
    span.iter().map(|t| t.text).collect::<Vec<_>>().join(" ")
}

fn scan(normalized: &str) -> Vec<RawToken<'_>> {
    let mut out = Vec::new();
    let mut at_sentence_start = true;
    for mat in TOKEN_RE.find_iter(normalized) {
        let text = mat.as_str();
        let first = match text.chars().next() {
            Some(c) => c,
            None => continue,
        };
        if first.is_alphabetic() {
            out.push(RawToken {
                text,
                lower: text.to_lowercase(),
                is_word: true,
                is_number: false,
                capitalized: first.is_uppercase(),
                sentence_start: at_sentence_start,
            });
            at_sentence_start = false;
        } else {
            let is_number = first.is_numeric();
            if !is_number && matches!(first, '.' | '!' | '?' | ';' | ':') {
                at_sentence_start = true;
            }
            out.push(RawToken {
                text,
                lower: text.to_lowercase(),
                is_word: false,
                is_number,
                capitalized: false,
                sentence_start: false,
            });
        }
    }
    out
}

// --- Lemma rules ---
//
// Exception-table misses fall through to suffix stripping. The rules only see
// lowercased words, and proper nouns never reach them.

fn noun_lemma(w: &str) -> String {
    let n = w.len();
    if n < 4 || !w.ends_with('s') || w.ends_with("ss") || w.ends_with("us") || w.ends_with("is") {
        return w.to_string();
    }
    if let Some(stem) = w.strip_suffix("ies") {
        if stem.len() >= 2 {
            return format!("{stem}y");
        }
    }
    for suffix in ["xes", "zes", "ches", "shes", "sses", "oes"] {
        if w.ends_with(suffix) {
            return w[..n - 2].to_string();
        }
    }
    w[..n - 1].to_string()
}

fn verb_lemma(w: &str) -> String {
    let n = w.len();
    // "-eed" keeps its double e: agreed -> agree, but breed stays breed.
    if let Some(stem) = w.strip_suffix("eed") {
        return if n > 5 { format!("{stem}ee") } else { w.to_string() };
    }
    if n > 5 {
        if let Some(stem) = w.strip_suffix("ing") {
            return fix_stripped_stem(stem);
        }
    }
    if n > 4 {
        if let Some(stem) = w.strip_suffix("ied") {
            return format!("{stem}y");
        }
        if let Some(stem) = w.strip_suffix("ed") {
            return fix_stripped_stem(stem);
        }
    }
    // Third-person singular falls back to the plural-style strip.
    noun_lemma(w)
}

/// Repair a stem after -ing/-ed stripping: undouble a doubled final
/// consonant ("trapp" -> "trap"), restore the silent e on "-at"/"-bl"/"-iz"
/// endings ("locat" -> "locate") and on one-syllable consonant-vowel-consonant
/// stems ("hid" -> "hide").
fn fix_stripped_stem(stem: &str) -> String {
    let b = stem.as_bytes();
    let n = b.len();
    if n >= 3 && b[n - 1] == b[n - 2] && is_consonant(b[n - 1]) && !matches!(b[n - 1], b'l' | b's' | b'z')
    {
        return stem[..n - 1].to_string();
    }
    if n >= 4 && (stem.ends_with("at") || stem.ends_with("bl") || stem.ends_with("iz")) {
        return format!("{stem}e");
    }
    if n >= 3
        && syllable_count(stem) == 1
        && is_consonant(b[n - 1])
        && !matches!(b[n - 1], b'w' | b'x' | b'y')
        && !is_consonant(b[n - 2])
        && is_consonant(b[n - 3])
    {
        return format!("{stem}e");
    }
    stem.to_string()
}

fn is_consonant(c: u8) -> bool {
    c.is_ascii_alphabetic() && !matches!(c, b'a' | b'e' | b'i' | b'o' | b'u')
}

fn syllable_count(w: &str) -> usize {
    let mut count = 0;
    let mut in_group = false;
    for c in w.bytes() {
        let vowel = matches!(c, b'a' | b'e' | b'i' | b'o' | b'u' | b'y');
        if vowel && !in_group {
            count += 1;
        }
        in_group = vowel;
    }
    count
}

// --- Lexicon parsing ---

fn parse_gazetteer(src: &str) -> Result<HashMap<String, EntityLabel>> {
    let mut map = HashMap::new();
    for (idx, line) in src.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, label) = line
            .split_once('\t')
            .ok_or_else(|| anyhow!("gazetteer line {}: expected <name>\\t<label>", idx + 1))?;
        let label = EntityLabel::parse(label.trim())
            .ok_or_else(|| anyhow!("gazetteer line {}: unknown label {:?}", idx + 1, label))?;
        map.insert(name.trim().to_lowercase(), label);
    }
    if map.is_empty() {
        bail!("gazetteer has no entries");
    }
    Ok(map)
}

fn parse_lemma_table(src: &str) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    for (idx, line) in src.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (form, lemma) = line
            .split_once('\t')
            .ok_or_else(|| anyhow!("lemma table line {}: expected <form>\\t<lemma>", idx + 1))?;
        map.insert(form.trim().to_lowercase(), lemma.trim().to_lowercase());
    }
    if map.is_empty() {
        bail!("lemma table has no entries");
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Pipeline {
        Pipeline::load().unwrap()
    }

    #[test]
    fn regular_plurals_strip() {
        assert_eq!(noun_lemma("cockroaches"), "cockroach");
        assert_eq!(noun_lemma("places"), "place");
        assert_eq!(noun_lemma("sources"), "source");
        assert_eq!(noun_lemma("flies"), "fly");
        assert_eq!(noun_lemma("boxes"), "box");
        assert_eq!(noun_lemma("glass"), "glass");
    }

    #[test]
    fn verb_inflections_strip() {
        assert_eq!(verb_lemma("running"), "run");
        assert_eq!(verb_lemma("trapped"), "trap");
        assert_eq!(verb_lemma("hiding"), "hide");
        assert_eq!(verb_lemma("sprayed"), "spray");
        assert_eq!(verb_lemma("cleaned"), "clean");
        assert_eq!(verb_lemma("tried"), "try");
    }

    #[test]
    fn irregular_forms_use_exceptions() {
        let p = pipeline();
        assert_eq!(p.lemmatize("mice", PosTag::Noun), "mouse");
        assert_eq!(p.lemmatize("hidden", PosTag::Verb), "hide");
        assert_eq!(p.lemmatize("used", PosTag::Verb), "use");
    }

    #[test]
    fn gazetteer_city_is_gpe() {
        let p = pipeline();
        let a = p.analyze("Where is the nearest store in London?");
        assert!(a
            .entities
            .iter()
            .any(|e| e.text == "London" && e.label == EntityLabel::Gpe));
    }

    #[test]
    fn gazetteer_is_case_insensitive() {
        let p = pipeline();
        let a = p.analyze("how do i get to london?");
        assert!(a
            .entities
            .iter()
            .any(|e| e.text == "london" && e.label == EntityLabel::Gpe));
    }

    #[test]
    fn multiword_gazetteer_matches_longest() {
        let p = pipeline();
        let a = p.analyze("I moved to New York last year");
        assert!(a
            .entities
            .iter()
            .any(|e| e.text == "New York" && e.label == EntityLabel::Gpe));
    }

    #[test]
    fn honorific_marks_person() {
        let p = pipeline();
        let a = p.analyze("Ask Dr Hassan about the treatment");
        assert!(a
            .entities
            .iter()
            .any(|e| e.text == "Hassan" && e.label == EntityLabel::Person));
    }

    #[test]
    fn sentence_initial_capital_alone_is_not_an_entity() {
        let p = pipeline();
        let a = p.analyze("Cockroaches hide near water.");
        assert!(a.entities.is_empty());
    }

    #[test]
    fn analyze_is_deterministic() {
        let p = pipeline();
        let a = p.analyze("Termites damaged the wooden fence in Cairo");
        let b = p.analyze("Termites damaged the wooden fence in Cairo");
        assert_eq!(a.tokens.len(), b.tokens.len());
        for (x, y) in a.tokens.iter().zip(&b.tokens) {
            assert_eq!(x.lemma, y.lemma);
            assert_eq!(x.tag, y.tag);
        }
        let ea: Vec<_> = a.entities.iter().map(|e| (e.text.clone(), e.label)).collect();
        let eb: Vec<_> = b.entities.iter().map(|e| (e.text.clone(), e.label)).collect();
        assert_eq!(ea, eb);
    }
}
