//! Arena-allocated graphs for grievance intake.
//!
//! Two mutable graphs live here, both built from narrative text and refined
//! iteration by iteration as the caller asks questions:
//!
//! 1. **KnowledgeGraph**: entities (people, organizations, dates, facts,
//!    claims) and the relationships between them, each with a bounded
//!    confidence weight.
//! 2. **DependencyGraph**: claims, the requirements they must satisfy, and
//!    the evidence that satisfies them.
//!
//! ## Arena + index pattern
//!
//! Entities and nodes are stored in append-only arenas addressed by opaque
//! `u32` newtype ids (`EntityId`, `NodeId`). Every cross-reference is
//! validated against the arena at insertion time, so a dangling edge is
//! rejected with [`GraphError::DanglingReference`] instead of surfacing later
//! as a lookup miss. Stable string keys index into the arenas for merge and
//! for the snapshot wire format.

pub mod confidence;
pub mod dependency;
pub mod evidence;
pub mod gap;
pub mod knowledge;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use confidence::Confidence;
pub use dependency::{
    ClaimReadiness, Dependency, DependencyGraph, DependencyKind, DependencyNode, NodeId, NodeKind,
};
pub use evidence::{EvidenceKind, EvidenceRecord};
pub use gap::{Gap, GapKind};
pub use knowledge::{Entity, EntityId, EntityKind, KnowledgeGraph, RelationKind, Relationship};

/// Entities below this confidence are surfaced as gaps.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Evidence below this confidence does not satisfy a requirement.
pub const EVIDENCE_CONFIDENCE_FLOOR: f32 = 0.5;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by graph mutations.
///
/// Malformed *input text* is never an error (an empty extraction is a valid
/// state); these cover referential violations only.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphError {
    /// An edge referenced an id or key not present in the owning graph.
    #[error("dangling reference: {endpoint} `{reference}` is not in the graph")]
    DanglingReference {
        /// Which endpoint was missing (`source` or `target`).
        endpoint: &'static str,
        /// The offending id or key, rendered for diagnostics.
        reference: String,
    },

    /// An edge was attempted between a node and itself.
    #[error("self-referential edge on `{reference}`")]
    SelfReference { reference: String },
}

// ============================================================================
// Shared metadata
// ============================================================================

/// Creation/update timestamps plus a monotonically increasing version,
/// bumped on every observable mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl GraphMetadata {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Record a mutation.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }
}

impl Default for GraphMetadata {
    fn default() -> Self {
        Self::new()
    }
}
