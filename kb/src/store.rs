use lazy_static::lazy_static;
use pulldown_cmark::{html, Parser};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"<[^<]+?>").expect("valid regex");
}

/// One knowledge-base entry, keyed by filename and immutable after load.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub title: String,
    pub path: String,
    /// Raw markdown as read from disk.
    pub source: String,
    /// Plain text with markup stripped; this is what gets indexed.
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMeta {
    pub filename: String,
    pub title: String,
    pub path: String,
}

/// The loaded corpus. `documents` and the metadata it derives are
/// order-aligned: position i refers to the same document everywhere.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
}

impl DocumentStore {
    /// Load every `.md` file directly under `dir` (non-recursive). Files that
    /// fail to read are logged and skipped; a missing or empty directory
    /// yields an empty store. Document order is filesystem-enumeration order
    /// and carries no ranking meaning.
    pub fn load(dir: &Path) -> DocumentStore {
        let mut documents = Vec::new();
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "knowledge-base directory not found");
            return DocumentStore { documents };
        }
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
                continue;
            }
            let source = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(err) => {
                    tracing::error!(path = %path.display(), %err, "failed to read document");
                    continue;
                }
            };
            let filename = entry.file_name().to_string_lossy().into_owned();
            let title = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| filename.clone());
            let text = markdown_to_text(&source);
            documents.push(Document {
                filename,
                title,
                path: path.display().to_string(),
                source,
                text,
            });
        }
        if documents.is_empty() {
            tracing::warn!(dir = %dir.display(), "no documents loaded from knowledge base");
        }
        documents.shrink_to_fit();
        DocumentStore { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Document> {
        self.documents.get(idx)
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|d| d.text.as_str())
    }

    pub fn metadata(&self, idx: usize) -> Option<DocMeta> {
        self.documents.get(idx).map(|d| DocMeta {
            filename: d.filename.clone(),
            title: d.title.clone(),
            path: d.path.clone(),
        })
    }
}

/// Render markdown to HTML, then strip the tags to get plain text for
/// indexing. Basic entities are decoded so the index sees literal characters.
pub fn markdown_to_text(source: &str) -> String {
    let mut rendered = String::with_capacity(source.len());
    html::push_html(&mut rendered, Parser::new(source));
    let stripped = TAG_RE.replace_all(&rendered, "");
    stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup() {
        let text = markdown_to_text("# Ants\n\nBait stations work **slowly** but reach the colony.");
        assert!(text.contains("Ants"));
        assert!(text.contains("slowly"));
        assert!(!text.contains('#'));
        assert!(!text.contains("**"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn decodes_basic_entities() {
        let text = markdown_to_text("food & water");
        assert_eq!(text, "food & water");
    }
}
