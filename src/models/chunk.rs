use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A bounded slice of a document's text plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Originating file name; the unit of deletion.
    pub source: String,

    /// 0-based position within `source`.
    #[serde(default)]
    pub chunk_index: u32,

    #[serde(default)]
    pub total_chunks: u32,

    #[serde(default)]
    pub extension: String,

    #[serde(default)]
    pub file_size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Caller-supplied fields, carried through unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ChunkMetadata {
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_flattens_extra_fields() {
        let mut metadata = ChunkMetadata::for_source("policy.txt").with_extra("department", "hr");
        metadata.chunk_index = 2;
        metadata.total_chunks = 4;

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["source"], "policy.txt");
        assert_eq!(json["chunk_index"], 2);
        assert_eq!(json["department"], "hr");
        assert!(json.get("file_path").is_none());

        let back: ChunkMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn test_minimal_metadata_deserializes() {
        let metadata: ChunkMetadata = serde_json::from_str(r#"{"source":"a.txt"}"#).unwrap();
        assert_eq!(metadata.source, "a.txt");
        assert_eq!(metadata.total_chunks, 0);
        assert!(metadata.extra.is_empty());
    }
}
