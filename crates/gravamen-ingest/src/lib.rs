//! Pattern/heuristic extraction from grievance narratives.
//!
//! Uses regex patterns with per-pattern base confidences to pull entities
//! (people, organizations, dates, facts, claims) and relationships
//! (employment, causation) out of free text. Exact structural matches carry
//! higher confidence than co-occurrence inference; context factors (hedging
//! language, numeric specificity) adjust the base.
//!
//! Empty or unintelligible input is not an error: "no entities found" is a
//! valid graph state, so the builders always return a graph.

pub mod builder;
pub mod patterns;

pub use builder::{ClaimSpec, DependencyGraphBuilder, KnowledgeGraphBuilder};
pub use patterns::{
    adjust_confidence, entity_patterns, relation_patterns, EntityPattern, RelationPattern,
};

/// Normalize surface text into a stable key segment: lowercase alphanumerics
/// joined by underscores.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
