//! PDF partitioning
//!
//! Extracts text per page with lopdf and splits it into typed elements
//! (titles, narrative paragraphs, list items) for the title-based chunker.

use crate::errors::IngestionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Element kind, as used by the chunker to open new sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementCategory {
    Title,
    NarrativeText,
    ListItem,
}

impl ElementCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::Title => "Title",
            ElementCategory::NarrativeText => "NarrativeText",
            ElementCategory::ListItem => "ListItem",
        }
    }
}

/// One partitioned element with its positional metadata
#[derive(Debug, Clone, PartialEq)]
pub struct RawElement {
    pub text: String,
    pub category: ElementCategory,
    pub metadata: Map<String, Value>,
}

impl RawElement {
    pub fn page_number(&self) -> Option<u64> {
        self.metadata.get("page_number").and_then(Value::as_u64)
    }

    pub fn is_title(&self) -> bool {
        self.category == ElementCategory::Title
    }
}

/// Splits a source document into ordered elements
pub trait Partitioner: Send + Sync {
    fn partition(&self, path: &Path) -> Result<Vec<RawElement>, IngestionError>;
}

/// Partitioner for PDF files
#[derive(Debug, Clone)]
pub struct PdfPartitioner {
    languages: Vec<String>,
}

impl PdfPartitioner {
    pub fn new(languages: Vec<String>) -> Self {
        Self { languages }
    }

    fn base_metadata(&self, path: &Path) -> Map<String, Value> {
        let mut metadata = location_metadata(path);
        metadata.insert("filetype".into(), Value::String("application/pdf".into()));
        metadata.insert(
            "languages".into(),
            Value::Array(self.languages.iter().cloned().map(Value::String).collect()),
        );
        metadata
    }
}

/// `filename` and `file_directory` entries describing where `path` lives
pub fn location_metadata(path: &Path) -> Map<String, Value> {
    let mut metadata = Map::new();
    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    metadata.insert("filename".into(), Value::String(filename));
    if let Some(dir) = path.parent() {
        metadata.insert(
            "file_directory".into(),
            Value::String(dir.display().to_string()),
        );
    }
    metadata
}

impl Default for PdfPartitioner {
    fn default() -> Self {
        Self::new(vec!["fra".to_string()])
    }
}

impl Partitioner for PdfPartitioner {
    fn partition(&self, path: &Path) -> Result<Vec<RawElement>, IngestionError> {
        let doc = lopdf::Document::load(path).map_err(|e| IngestionError::PdfParseError {
            path: path.display().to_string(),
            message: format!("Failed to load PDF: {}", e),
        })?;

        let pages = doc.get_pages();
        debug!(page_count = pages.len(), "Partitioning PDF");

        let base = self.base_metadata(path);
        let mut elements = Vec::new();

        for page_num in pages.keys() {
            match doc.extract_text(&[*page_num]) {
                Ok(text) => elements.extend(elements_from_page_text(&text, *page_num, &base)),
                Err(e) => {
                    warn!(page = page_num, error = %e, "Failed to extract page text, skipping");
                }
            }
        }

        if elements.is_empty() {
            return Err(IngestionError::PdfParseError {
                path: path.display().to_string(),
                message: "No text content extracted from PDF".to_string(),
            });
        }

        debug!(element_count = elements.len(), "PDF partitioned");
        Ok(elements)
    }
}

/// Split one page of extracted text into elements.
///
/// Blank lines separate blocks; each block becomes one element.
pub fn elements_from_page_text(
    text: &str,
    page_number: u32,
    base: &Map<String, Value>,
) -> Vec<RawElement> {
    let mut elements = Vec::new();
    let mut block: Vec<&str> = Vec::new();

    let mut flush = |block: &mut Vec<&str>| {
        if block.is_empty() {
            return;
        }
        let category = classify(block);
        let text = clean_text(&block.join(" "));
        block.clear();
        if text.is_empty() {
            return;
        }
        let mut metadata = base.clone();
        metadata.insert("page_number".into(), Value::from(page_number));
        metadata.insert("category".into(), Value::String(category.as_str().into()));
        elements.push(RawElement {
            text,
            category,
            metadata,
        });
    };

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut block);
        } else if is_list_marker(trimmed) && !block.is_empty() {
            // a bullet always starts its own element
            flush(&mut block);
            block.push(trimmed);
        } else {
            block.push(trimmed);
        }
    }
    flush(&mut block);

    elements
}

fn is_list_marker(line: &str) -> bool {
    if line.starts_with(['•', '◦', '▪', '–', '-', '*']) {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && digits <= 3 && matches!(line[digits..].chars().next(), Some('.') | Some(')'))
        && line[digits + 1..].starts_with(' ')
}

fn classify(block: &[&str]) -> ElementCategory {
    let first = block[0];
    if is_list_marker(first) {
        return ElementCategory::ListItem;
    }
    if block.len() == 1 && looks_like_title(first) {
        return ElementCategory::Title;
    }
    ElementCategory::NarrativeText
}

fn looks_like_title(line: &str) -> bool {
    let words = line.split_whitespace().count();
    let starts_well = line
        .chars()
        .next()
        .map(|c| c.is_uppercase() || c.is_ascii_digit())
        .unwrap_or(false);
    let ends_like_sentence = line.ends_with(['.', ',', ';', ':', '!', '?']);

    starts_well && !ends_like_sentence && words <= 12 && line.chars().count() <= 80
}

/// Collapse whitespace and strip BOMs
fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
