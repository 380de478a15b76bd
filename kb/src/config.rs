use std::path::PathBuf;

/// How many documents a query returns when the caller does not ask for a
/// specific count.
pub const DEFAULT_TOP_K: usize = 3;

/// Relevance floor: documents scoring at or below this are treated as noise
/// and dropped from results.
pub const DEFAULT_SIMILARITY_FLOOR: f32 = 0.1;

/// Vocabulary ceiling for the index, bounding memory on large corpora.
pub const DEFAULT_MAX_VOCAB: usize = 10_000;

/// Maximum characters of document content returned in a result preview.
pub const DEFAULT_PREVIEW_CHARS: usize = 1000;

/// Engine configuration. All policy constants live here rather than at call
/// sites; the defaults match the values documented on each constant.
#[derive(Debug, Clone)]
pub struct KbConfig {
    /// Directory of markdown documents to index at startup.
    pub kb_dir: PathBuf,
    pub top_k: usize,
    pub similarity_floor: f32,
    pub max_vocab: usize,
    pub preview_chars: usize,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            kb_dir: PathBuf::from("./kb"),
            top_k: DEFAULT_TOP_K,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
            max_vocab: DEFAULT_MAX_VOCAB,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl KbConfig {
    pub fn with_kb_dir<P: Into<PathBuf>>(kb_dir: P) -> Self {
        Self { kb_dir: kb_dir.into(), ..Self::default() }
    }
}
