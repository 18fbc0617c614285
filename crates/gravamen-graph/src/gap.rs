//! Structural deficiencies paired with the question that would repair them.

use serde::{Deserialize, Serialize};

/// The kinds of structural deficiency a graph can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GapKind {
    /// Entity extracted with confidence below the threshold.
    LowConfidence,
    /// Entity with zero incident relationships.
    IsolatedEntity,
    /// Claim entity with no incoming `Supports` relationship from a fact.
    UnsupportedClaim,
    /// Requirement node not yet satisfied by evidence.
    UnsatisfiedRequirement,
    /// Claim with no linked evidence at all.
    MissingEvidence,
    /// Legal requirement the matcher could not resolve.
    UnmatchedLegalElement,
}

/// A specific deficiency in a graph, with a suggested follow-up question.
///
/// Gaps are emitted in graph insertion order so that downstream question
/// ranking is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub kind: GapKind,
    /// Stable key of the entity or node the gap is about.
    pub subject: String,
    /// Human-readable description of what is missing.
    pub detail: String,
    /// The question most likely to close the gap.
    pub suggested_question: String,
    /// How many claims are blocked on this gap (0 when not applicable).
    pub blocked_claims: usize,
}

impl Gap {
    pub fn new(kind: GapKind, subject: &str, detail: String, suggested_question: String) -> Self {
        Self {
            kind,
            subject: subject.to_string(),
            detail,
            suggested_question,
            blocked_claims: 0,
        }
    }

    pub fn blocking(mut self, claims: usize) -> Self {
        self.blocked_claims = claims;
        self
    }
}
