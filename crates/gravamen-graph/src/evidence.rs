//! Evidence metadata.
//!
//! Binary content and its storage are entirely the evidence collaborator's
//! responsibility; the engine reasons only about the metadata below and links
//! it into the dependency graph by id.

use crate::Confidence;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Document,
    Email,
    Photo,
    Testimony,
    PayRecord,
    Other,
}

/// An evidence item as supplied by the evidence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub id: String,
    pub title: String,
    pub kind: EvidenceKind,
    pub confidence: Confidence,
    /// Keys of the claims this item supports.
    pub supports_claim_ids: Vec<String>,
    /// Opaque handle into the collaborator's content store.
    pub content_ref: String,
}

impl EvidenceRecord {
    pub fn new(id: &str, title: &str, kind: EvidenceKind, confidence: f32) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            kind,
            confidence: Confidence::new(confidence),
            supports_claim_ids: Vec::new(),
            content_ref: String::new(),
        }
    }

    pub fn supporting(mut self, claim_id: &str) -> Self {
        self.supports_claim_ids.push(claim_id.to_string());
        self
    }

    pub fn with_content_ref(mut self, content_ref: &str) -> Self {
        self.content_ref = content_ref.to_string();
        self
    }
}
