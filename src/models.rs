//! Core data models for the paper RAG pipeline.
//!
//! These types represent the documents, chunks, and answers that flow
//! through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A parsed paper: title, abstract, and ordered body sections.
///
/// Built once per ingestion run by [`crate::tei`]; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier derived from the source filename stem.
    pub paper_id: String,
    /// Paper title; falls back to `paper_id` when the header has none.
    pub title: String,
    /// Abstract text, paragraphs joined by newline. Empty when absent.
    pub abstract_text: String,
    /// Body sections in document order. Empty sections are never retained.
    pub sections: Vec<Section>,
}

/// A named, ordered group of paragraphs within a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Normalized canonical label or cleaned raw heading text.
    pub name: String,
    /// Non-empty paragraph texts in document order.
    pub paragraphs: Vec<String>,
}

/// A bounded, overlapping word window extracted from one section.
///
/// The unit of retrieval. Ids are deterministic composites
/// (`{paper_id}::sec_{section_index}::chunk_{chunk_index}`), so
/// re-ingesting an unchanged document replaces rather than accumulates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub meta: ChunkMeta,
}

/// Fixed-field chunk metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub paper_id: String,
    pub title: String,
    /// Section label; absent for chunks whose origin carries no section.
    pub section: Option<String>,
    pub section_index: usize,
    pub chunk_index: usize,
}

impl Chunk {
    /// Compose the canonical chunk id for a (paper, section, chunk) triple.
    pub fn compose_id(paper_id: &str, section_index: usize, chunk_index: usize) -> String {
        format!("{paper_id}::sec_{section_index}::chunk_{chunk_index}")
    }
}

/// Message role on the generation wire and in chat history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message sent to the generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// An answer paired with the exact ordered chunks it was grounded on.
///
/// Position `i` (1-based) in `contexts` is the referent of citation label
/// `S{i}` in `answer`. The pairing is fixed at prompt-composition time and
/// never recomputed or reordered afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub answer: String,
    pub contexts: Vec<Chunk>,
}

/// One turn in a conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    /// Chunks the assistant grounded this turn on; `None` for user turns.
    pub contexts: Option<Vec<Chunk>>,
    pub at: DateTime<Utc>,
}
