//! Chunk records and their vector-store payload layout

use super::metadata::{normalize_metadata, parse_chunk_number, Metadata, MetadataValue};
use crate::errors::{AppError, Result};
use crate::CHUNK_NUMBER_KEY;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload key holding the chunk text
pub const PAGE_CONTENT_KEY: &str = "page_content";

/// Payload key holding the metadata object
pub const PAYLOAD_METADATA_KEY: &str = "metadata";

/// Chunker output, ordered as produced from the source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RawChunk {
    pub fn new(text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// A numbered chunk belonging to exactly one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Storage identifier
    pub id: String,

    pub text: String,

    pub collection_name: String,

    /// Zero-based position in the collection
    pub chunk_number: u64,

    pub metadata: Metadata,

    /// Present on write; reads do not request vectors back
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn belongs_to(&self, collection: &str) -> bool {
        self.collection_name == collection
    }

    /// Source file name recorded at ingestion, if any
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(MetadataValue::as_str)
    }

    /// Payload stored next to the vector: `{page_content, metadata}`
    pub fn to_payload(&self) -> Value {
        let mut metadata: Map<String, Value> = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        metadata.insert(CHUNK_NUMBER_KEY.to_string(), Value::from(self.chunk_number));

        let mut payload = Map::new();
        payload.insert(PAGE_CONTENT_KEY.to_string(), Value::String(self.text.clone()));
        payload.insert(PAYLOAD_METADATA_KEY.to_string(), Value::Object(metadata));
        Value::Object(payload)
    }

    /// Rebuild a chunk from a stored point.
    ///
    /// Fails with `MissingField` when the payload has no usable text or chunk number.
    pub fn from_payload(collection: &str, id: String, payload: &Value) -> Result<Self> {
        let text = payload
            .get(PAGE_CONTENT_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::MissingField {
                field: PAGE_CONTENT_KEY.to_string(),
            })?
            .to_string();

        let raw_metadata = payload
            .get(PAYLOAD_METADATA_KEY)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let chunk_number = raw_metadata
            .get(CHUNK_NUMBER_KEY)
            .and_then(parse_chunk_number)
            .ok_or_else(|| AppError::MissingField {
                field: CHUNK_NUMBER_KEY.to_string(),
            })?;

        let mut metadata = normalize_metadata(&raw_metadata);
        metadata.remove(CHUNK_NUMBER_KEY);

        Ok(Self {
            id,
            text,
            collection_name: collection.to_string(),
            chunk_number,
            metadata,
            embedding: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_layout() {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), "guide.pdf".into());
        let chunk = Chunk {
            id: "a".into(),
            text: "Le Radeau de la Méduse".into(),
            collection_name: "DocA".into(),
            chunk_number: 4,
            metadata,
            embedding: Some(vec![0.1, 0.2]),
        };

        let payload = chunk.to_payload();
        assert_eq!(payload["page_content"], "Le Radeau de la Méduse");
        assert_eq!(payload["metadata"]["chunk_number"], 4);
        assert_eq!(payload["metadata"]["source"], "guide.pdf");

        let back = Chunk::from_payload("DocA", "a".into(), &payload).unwrap();
        assert_eq!(back.chunk_number, 4);
        assert_eq!(back.source(), Some("guide.pdf"));
        assert_eq!(back.embedding, None);
        assert!(!back.metadata.contains_key(CHUNK_NUMBER_KEY));
    }

    #[test]
    fn test_string_chunk_number_accepted() {
        let payload = json!({
            "page_content": "text",
            "metadata": { "chunk_number": "9", "source": "x.pdf" }
        });
        let chunk = Chunk::from_payload("DocA", "p".into(), &payload).unwrap();
        assert_eq!(chunk.chunk_number, 9);
        assert!(chunk.belongs_to("DocA"));
    }

    #[test]
    fn test_missing_chunk_number_rejected() {
        let payload = json!({ "page_content": "text", "metadata": {} });
        let err = Chunk::from_payload("DocA", "p".into(), &payload).unwrap_err();
        assert!(matches!(err, AppError::MissingField { ref field } if field == "chunk_number"));
    }
}
