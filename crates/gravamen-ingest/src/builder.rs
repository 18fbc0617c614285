//! Graph builders: narrative text → KnowledgeGraph, claim specs →
//! DependencyGraph.

use std::collections::HashMap;

use gravamen_graph::{
    Confidence, DependencyGraph, DependencyKind, DependencyNode, Entity, EntityKind,
    KnowledgeGraph, NodeKind, RelationKind,
};
use tracing::debug;

use crate::patterns::{
    adjust_confidence, entity_patterns, relation_patterns, EntityPattern, RelationPattern,
};
use crate::slugify;

/// Confidence for relationships inferred purely from co-occurrence in the
/// same sentence.
const CO_OCCURRENCE_CONFIDENCE: f32 = 0.35;

fn key_prefix(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Person => "person",
        EntityKind::Organization => "org",
        EntityKind::Date => "date",
        EntityKind::Fact => "fact",
        EntityKind::Claim => "claim",
        EntityKind::EvidenceRef => "evidence",
    }
}

/// Stable key for an extracted surface form.
pub fn entity_key(kind: EntityKind, text: &str) -> String {
    format!("{}:{}", key_prefix(kind), slugify(text))
}

// ============================================================================
// KnowledgeGraphBuilder
// ============================================================================

/// Builds a [`KnowledgeGraph`] from free narrative text using the default
/// pattern tables.
pub struct KnowledgeGraphBuilder {
    entity_patterns: Vec<EntityPattern>,
    relation_patterns: Vec<RelationPattern>,
}

impl KnowledgeGraphBuilder {
    pub fn new() -> Self {
        Self {
            entity_patterns: entity_patterns(),
            relation_patterns: relation_patterns(),
        }
    }

    /// Extract a graph from a grievance narrative. Empty or unintelligible
    /// input yields an empty graph, never an error.
    pub fn build_from_text(&self, text: &str) -> KnowledgeGraph {
        self.extract_into(text, "narrative")
    }

    /// Extract a graph tagged with an explicit source label (used when
    /// re-extracting from an answer scoped to a question's target).
    pub fn extract_into(&self, text: &str, source: &str) -> KnowledgeGraph {
        let mut kg = KnowledgeGraph::new();
        if text.trim().is_empty() {
            return kg;
        }

        // Structural relationship patterns run first: they mint their own
        // endpoints at higher confidence than loose entity matches would.
        for pattern in &self.relation_patterns {
            for caps in pattern.regex.captures_iter(text) {
                let (src_group, src_kind, src_conf) = pattern.source;
                let (tgt_group, tgt_kind, tgt_conf) = pattern.target;
                let (Some(src), Some(tgt)) = (caps.get(src_group), caps.get(tgt_group)) else {
                    continue;
                };
                let src_text = src.as_str().trim();
                let tgt_text = tgt.as_str().trim();
                if src_text.is_empty() || tgt_text.is_empty() {
                    continue;
                }

                let src_key = entity_key(src_kind, src_text);
                let tgt_key = entity_key(tgt_kind, tgt_text);
                if src_key == tgt_key {
                    continue;
                }
                kg.upsert_entity(
                    Entity::new(
                        &src_key,
                        src_kind,
                        src_text,
                        adjust_confidence(src_conf, src_text),
                    )
                    .with_source(source),
                );
                kg.upsert_entity(
                    Entity::new(
                        &tgt_key,
                        tgt_kind,
                        tgt_text,
                        adjust_confidence(tgt_conf, tgt_text),
                    )
                    .with_source(source),
                );
                // Both endpoints were just upserted; this cannot dangle.
                let _ = kg.add_relationship_by_key(
                    &src_key,
                    &tgt_key,
                    pattern.kind,
                    Confidence::new(pattern.base_confidence),
                );
            }
        }

        for pattern in &self.entity_patterns {
            for caps in pattern.regex.captures_iter(text) {
                let Some(m) = caps.get(pattern.text_group) else {
                    continue;
                };
                let surface = m.as_str().trim();
                if surface.is_empty() {
                    continue;
                }
                let base = match pattern.qualifier {
                    Some((group, conf)) if caps.get(group).is_some() => conf,
                    _ => pattern.base_confidence,
                };
                kg.upsert_entity(
                    Entity::new(
                        &entity_key(pattern.kind, surface),
                        pattern.kind,
                        surface,
                        adjust_confidence(base, surface),
                    )
                    .with_source(source),
                );
            }
        }

        self.link_co_occurrences(&mut kg, text);
        debug!(
            entities = kg.entity_count(),
            relationships = kg.relationship_count(),
            source,
            "extracted knowledge graph"
        );
        kg
    }

    /// Connect entities that appear in the same sentence but are otherwise
    /// unrelated, at low confidence. This keeps obviously related mentions
    /// (a firing and its date) from showing up as isolated entities while
    /// still ranking below structural matches.
    fn link_co_occurrences(&self, kg: &mut KnowledgeGraph, text: &str) {
        for sentence in text.split(['.', ';', '!', '?', '\n']) {
            let lower = sentence.to_lowercase();
            let present: Vec<String> = kg
                .entities()
                .filter(|(_, e)| !e.text.is_empty() && lower.contains(&e.text.to_lowercase()))
                .map(|(_, e)| e.key.clone())
                .collect();

            for pair in present.windows(2) {
                if !self.connected(kg, &pair[0], &pair[1]) {
                    let _ = kg.add_relationship_by_key(
                        &pair[0],
                        &pair[1],
                        RelationKind::CoOccurrence,
                        Confidence::new(CO_OCCURRENCE_CONFIDENCE),
                    );
                }
            }
        }
    }

    fn connected(&self, kg: &KnowledgeGraph, a: &str, b: &str) -> bool {
        let (Some((a_id, _)), Some((b_id, _))) = (kg.entity_by_key(a), kg.entity_by_key(b)) else {
            return false;
        };
        kg.relationships().iter().any(|r| {
            (r.source == a_id && r.target == b_id) || (r.source == b_id && r.target == a_id)
        })
    }
}

impl Default for KnowledgeGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// DependencyGraphBuilder
// ============================================================================

/// A claim to be tracked, as named by intake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSpec {
    pub name: String,
    pub claim_type: String,
}

impl ClaimSpec {
    pub fn new(name: &str, claim_type: &str) -> Self {
        Self {
            name: name.to_string(),
            claim_type: claim_type.to_string(),
        }
    }
}

/// Builds a [`DependencyGraph`] from claim specs.
///
/// The claim-type → requirement mapping is supplied externally (typically
/// from the legal crate's requirement vocabulary); without one, claims get
/// zero requirements and report readiness 0.0 until formalization links the
/// legal graph.
pub struct DependencyGraphBuilder {
    requirements: HashMap<String, Vec<String>>,
}

impl DependencyGraphBuilder {
    pub fn new() -> Self {
        Self {
            requirements: HashMap::new(),
        }
    }

    pub fn with_requirement_map(mut self, map: HashMap<String, Vec<String>>) -> Self {
        self.requirements = map;
        self
    }

    pub fn add_requirements(&mut self, claim_type: &str, names: &[&str]) {
        self.requirements.insert(
            claim_type.to_string(),
            names.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// One claim node per spec, plus a requirement node per element the
    /// claim type is known to need. Requirement nodes are shared across
    /// claims that need the same element.
    pub fn build_from_claims(&self, claims: &[ClaimSpec]) -> DependencyGraph {
        let mut dg = DependencyGraph::new();

        for spec in claims {
            let claim_key = format!("claim:{}", slugify(&spec.name));
            let claim = dg.upsert_node(
                DependencyNode::new(&claim_key, NodeKind::Claim, &spec.name)
                    .with_claim_type(&spec.claim_type),
            );

            for requirement in self.requirements.get(&spec.claim_type).into_iter().flatten() {
                let req_key = format!("req:{}", slugify(requirement));
                let req =
                    dg.upsert_node(DependencyNode::new(&req_key, NodeKind::Requirement, requirement));
                // Both nodes were just upserted; this cannot dangle.
                let _ = dg.add_dependency(claim, req, DependencyKind::Requires);
            }
        }

        dg
    }
}

impl Default for DependencyGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gravamen_graph::GapKind;

    #[test]
    fn narrative_extracts_employment_structure() {
        // Scenario: person, organization, employment edge, and a follow-up
        // question about the bare date.
        let kg = KnowledgeGraphBuilder::new()
            .build_from_text("John worked at Acme; he was fired on Jan 5");

        assert!(kg.entity_count() >= 2);
        let (_, john) = kg.entity_by_key("person:john").expect("person extracted");
        assert_eq!(john.kind, EntityKind::Person);
        let (_, acme) = kg.entity_by_key("org:acme").expect("org extracted");
        assert_eq!(acme.kind, EntityKind::Organization);

        let triples = kg.relationship_triples();
        assert!(triples
            .iter()
            .any(|(s, t, k, _)| s == "person:john" && t == "org:acme" && *k == RelationKind::EmployedBy));

        // The year-less date is low confidence, so find_gaps asks about it.
        let gaps = kg.find_gaps();
        assert!(gaps
            .iter()
            .any(|g| g.kind == GapKind::LowConfidence && g.subject.starts_with("date:")));
    }

    #[test]
    fn empty_text_yields_empty_graph() {
        let kg = KnowledgeGraphBuilder::new().build_from_text("   \n  ");
        assert!(kg.is_empty());
        assert_eq!(kg.relationship_count(), 0);
    }

    #[test]
    fn extraction_is_deterministic() {
        let builder = KnowledgeGraphBuilder::new();
        let text = "Maria was employed by Initech Inc. She was terminated after \
                    she reported safety concerns. This is wage theft.";
        let a = builder.build_from_text(text);
        let b = builder.build_from_text(text);
        assert!(a.same_content(&b));
    }

    #[test]
    fn repeated_extraction_merges_cleanly() {
        let builder = KnowledgeGraphBuilder::new();
        let text = "John worked at Acme; he was fired on Jan 5";
        let mut kg = builder.build_from_text(text);
        let again = builder.build_from_text(text);
        let stats = kg.merge(&again);
        assert!(!stats.changed());
    }

    #[test]
    fn claim_keywords_become_claim_entities() {
        let kg = KnowledgeGraphBuilder::new()
            .build_from_text("I believe this was wrongful termination and retaliation.");
        let claims: Vec<_> = kg
            .entities()
            .filter(|(_, e)| e.kind == EntityKind::Claim)
            .collect();
        assert!(claims.len() >= 2);
    }

    #[test]
    fn build_from_claims_without_requirements() {
        let dg = DependencyGraphBuilder::new().build_from_claims(&[ClaimSpec::new(
            "Wrongful Termination",
            "employment_discrimination",
        )]);
        let readiness = dg.get_claim_readiness();
        assert_eq!(readiness.total_claims, 1);
        assert_eq!(readiness.ready_claims, 0);
    }

    #[test]
    fn build_from_claims_with_requirement_map() {
        let mut builder = DependencyGraphBuilder::new();
        builder.add_requirements(
            "employment_discrimination",
            &["membership in a protected class", "an adverse employment action"],
        );
        let dg = builder.build_from_claims(&[
            ClaimSpec::new("Wrongful Termination", "employment_discrimination"),
            ClaimSpec::new("Demotion", "employment_discrimination"),
        ]);

        // Shared requirements are single nodes blocking both claims.
        let gaps = dg.find_gaps();
        assert_eq!(gaps.len(), 2);
        assert!(gaps.iter().all(|g| g.blocked_claims == 2));
        assert_eq!(dg.get_claim_readiness().total_claims, 2);
    }
}
