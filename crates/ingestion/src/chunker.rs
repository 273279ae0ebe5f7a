//! Title-based chunking
//!
//! Groups partitioned elements into sections that start at titles, bounded
//! by a soft and a hard character limit. Small sections are merged forward.

use crate::pdf::RawElement;
use artalk_common::config::IngestionConfig;
use artalk_common::models::RawChunk;
use serde_json::Value;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

const SECTION_SEPARATOR: &str = "\n\n";

/// Configuration for title-based chunking
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkingConfig {
    /// Hard upper bound on chunk size in characters
    pub max_characters: usize,
    /// Soft bound: a section is closed once it grows past this
    pub new_after_n_chars: usize,
    /// Sections smaller than this are merged with the next one
    pub combine_text_under_n_chars: usize,
    /// Allow a section to continue across a page break
    pub multipage_sections: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_characters: 4000,
            new_after_n_chars: 2500,
            combine_text_under_n_chars: 500,
            multipage_sections: true,
        }
    }
}

impl From<&IngestionConfig> for ChunkingConfig {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            max_characters: config.max_characters.max(1),
            new_after_n_chars: config.new_after_n_chars.min(config.max_characters).max(1),
            combine_text_under_n_chars: config.combine_text_under_n_chars,
            multipage_sections: config.multipage_sections,
        }
    }
}

impl ChunkingConfig {
    /// Stable fingerprint used in cache keys
    pub fn fingerprint(&self) -> String {
        format!(
            "max={};soft={};combine={};multipage={}",
            self.max_characters,
            self.new_after_n_chars,
            self.combine_text_under_n_chars,
            self.multipage_sections
        )
    }
}

struct Section {
    parts: Vec<String>,
    len: usize,
    page: Option<u64>,
    metadata: serde_json::Map<String, Value>,
}

impl Section {
    fn start(text: String, element: &RawElement) -> Self {
        Self {
            len: char_len(&text),
            parts: vec![text],
            page: element.page_number(),
            metadata: element.metadata.clone(),
        }
    }

    /// Length after appending `extra` characters with a separator
    fn len_with(&self, extra: usize) -> usize {
        self.len + SECTION_SEPARATOR.len() + extra
    }

    fn push(&mut self, text: String) {
        self.len = self.len_with(char_len(&text));
        self.parts.push(text);
    }

    fn absorb(&mut self, other: Section) {
        for part in other.parts {
            self.push(part);
        }
    }

    fn into_chunk(mut self) -> RawChunk {
        self.metadata
            .insert("category".into(), Value::String("CompositeElement".into()));
        RawChunk::new(self.parts.join(SECTION_SEPARATOR), self.metadata)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Group elements into chunks, preserving element order.
pub fn chunk_by_title(elements: &[RawElement], config: &ChunkingConfig) -> Vec<RawChunk> {
    let splitter = TextSplitter::new(ChunkConfig::new(config.max_characters));
    let mut sections: Vec<Section> = Vec::new();
    let mut current: Option<Section> = None;

    for element in elements {
        // Oversized elements are pre-split so no piece exceeds the hard bound
        let pieces: Vec<String> = if char_len(&element.text) > config.max_characters {
            splitter.chunks(&element.text).map(str::to_string).collect()
        } else {
            vec![element.text.clone()]
        };

        for (i, piece) in pieces.into_iter().enumerate() {
            let piece_len = char_len(&piece);
            let open_new = match current {
                None => true,
                Some(ref section) => {
                    (i == 0 && element.is_title())
                        || (!config.multipage_sections && section.page != element.page_number())
                        || section.len >= config.new_after_n_chars
                        || section.len_with(piece_len) > config.max_characters
                }
            };

            if open_new {
                if let Some(done) = current.take() {
                    sections.push(done);
                }
                current = Some(Section::start(piece, element));
            } else if let Some(ref mut section) = current {
                section.push(piece);
            }
        }
    }
    if let Some(done) = current {
        sections.push(done);
    }

    let combined = combine_small_sections(sections, config);
    debug!(
        elements = elements.len(),
        chunks = combined.len(),
        "Elements chunked by title"
    );
    combined.into_iter().map(Section::into_chunk).collect()
}

fn combine_small_sections(sections: Vec<Section>, config: &ChunkingConfig) -> Vec<Section> {
    let mut out: Vec<Section> = Vec::with_capacity(sections.len());

    for section in sections {
        let merge = out.last().is_some_and(|prev| {
            prev.len < config.combine_text_under_n_chars
                && prev.len_with(section.len) <= config.max_characters
                && (config.multipage_sections || prev.page == section.page)
        });

        match out.last_mut() {
            Some(prev) if merge => prev.absorb(section),
            _ => out.push(section),
        }
    }

    out
}
