//! Conference program records
//!
//! Documents are scraped paper entries (title, abstract, authors, sessions).
//! They are loaded once from a JSON snapshot and never mutated while serving.
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A paper author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub affiliation: Option<String>,
}

/// A program session a paper is presented in
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub session_name: Option<String>,
    #[serde(default)]
    pub session_date: Option<String>,
    #[serde(default)]
    pub session_venue: Option<String>,
}

/// A scraped paper record
///
/// `id` is the join key between ranking results, embeddings and projected
/// coordinates. Fields the scraper emitted that are not modeled here are kept
/// in `extra` so re-written snapshots keep the scraped schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(rename = "abstract", default, deserialize_with = "null_as_default")]
    pub abstract_text: String,

    /// Precomputed embedding, absent until the embedding job has run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<Author>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub details: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub sessions: Vec<Session>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn new(id: i64, title: impl Into<String>, abstract_text: impl Into<String>) -> Self {
        Self {
            id,
            url: String::new(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            embedding: None,
            authors: Vec::new(),
            details: BTreeMap::new(),
            sessions: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Title and abstract joined by a single space
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.abstract_text)
    }

    /// An empty embedding list counts as missing
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}

/// A document view plus its relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: i64,
    pub url: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub score: f32,
    pub authors: Vec<Author>,
    pub details: BTreeMap<String, String>,
    pub sessions: Vec<Session>,
}

impl RankedResult {
    pub fn from_document(document: &Document, score: f32) -> Self {
        Self {
            id: document.id,
            url: document.url.clone(),
            title: document.title.clone(),
            abstract_text: document.abstract_text.clone(),
            score,
            authors: document.authors.clone(),
            details: document.details.clone(),
            sessions: document.sessions.clone(),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let doc: Document = serde_json::from_str(r#"{"id": 7, "title": "Haptics"}"#).unwrap();
        assert_eq!(doc.id, 7);
        assert_eq!(doc.abstract_text, "");
        assert_eq!(doc.url, "");
        assert!(doc.authors.is_empty());
        assert!(doc.details.is_empty());
        assert!(doc.sessions.is_empty());
        assert!(!doc.has_embedding());
    }

    #[test]
    fn test_null_abstract_and_embedding() {
        let doc: Document = serde_json::from_str(
            r#"{"id": 1, "title": "T", "abstract": null, "embedding": null, "authors": null}"#,
        )
        .unwrap();
        assert_eq!(doc.abstract_text, "");
        assert!(doc.embedding.is_none());
        assert!(doc.authors.is_empty());
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let raw = r#"{"id": 3, "title": "T", "award": "Best Paper", "doi": "10.1145/1"}"#;
        let doc: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.extra.len(), 2);

        let written = serde_json::to_value(&doc).unwrap();
        assert_eq!(written["award"], "Best Paper");
        assert_eq!(written["abstract"], "");
        assert!(written.get("embedding").is_none());
    }

    #[test]
    fn test_full_record() {
        let raw = r#"{
            "id": 42,
            "url": "https://programs.example.org/paper/42",
            "title": "Sketching Interfaces",
            "abstract": "We study sketching.",
            "embedding": [0.5, -0.25],
            "authors": [{"name": "A. Author", "affiliation": "Lab"}, {"name": "B. Author"}],
            "details": {"Type": "Paper"},
            "sessions": [{"session_name": "Design", "session_date": "Mon", "session_venue": "Hall 1"}]
        }"#;
        let doc: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.embedding, Some(vec![0.5, -0.25]));
        assert_eq!(doc.authors[1].affiliation, None);
        assert_eq!(doc.sessions[0].session_venue.as_deref(), Some("Hall 1"));

        let result = RankedResult::from_document(&doc, 0.75);
        assert_eq!(result.id, 42);
        assert_eq!(result.score, 0.75);
        assert_eq!(result.details.get("Type").map(String::as_str), Some("Paper"));
    }

    #[test]
    fn test_search_text() {
        let doc = Document::new(1, "Title", "Abstract");
        assert_eq!(doc.search_text(), "Title Abstract");
    }
}
