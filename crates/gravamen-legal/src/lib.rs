//! The legal requirement graph.
//!
//! Statutory and regulatory elements, procedural rules, and an O(1) lookup
//! from claim-type strings to the ordered requirement checklist for that
//! claim type. Built once per jurisdiction/claim-type combination and
//! read-mostly afterwards; it stays independent of the intake graphs until
//! the matcher reconciles them.

pub mod builder;
pub mod vocabulary;

use std::collections::HashMap;

use gravamen_graph::{GraphError, GraphMetadata};
use serde::{Deserialize, Serialize};

pub use builder::LegalGraphBuilder;
pub use vocabulary::{requirement_vocabulary, requirement_map_for_builder};

// ============================================================================
// Ids and records
// ============================================================================

/// Opaque arena index for a legal element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ElementId(u32);

impl ElementId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Statute,
    Regulation,
    Requirement,
    ProceduralRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalElement {
    /// Stable key, unique within the graph (e.g. `req:adverse_action`).
    pub key: String,
    pub kind: ElementKind,
    /// Citation, when the element was derived from authority text.
    pub citation: String,
    pub text: String,
    pub jurisdiction: String,
}

impl LegalElement {
    pub fn new(key: &str, kind: ElementKind, text: &str, jurisdiction: &str) -> Self {
        Self {
            key: key.to_string(),
            kind,
            citation: String::new(),
            text: text.to_string(),
            jurisdiction: jurisdiction.to_string(),
        }
    }

    pub fn with_citation(mut self, citation: &str) -> Self {
        self.citation = citation.to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalRelationKind {
    /// A requirement distilled from a statute/regulation.
    DerivedFrom,
    /// One authority cites another.
    References,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegalRelation {
    pub source: ElementId,
    pub target: ElementId,
    pub kind: LegalRelationKind,
}

// ============================================================================
// LegalGraph
// ============================================================================

#[derive(Debug, Clone)]
pub struct LegalGraph {
    elements: Vec<LegalElement>,
    by_key: HashMap<String, ElementId>,
    relations: Vec<LegalRelation>,
    /// Claim type → ordered requirement checklist.
    checklists: HashMap<String, Vec<ElementId>>,
    jurisdiction: String,
    metadata: GraphMetadata,
}

impl LegalGraph {
    pub fn new(jurisdiction: &str) -> Self {
        Self {
            elements: Vec::new(),
            by_key: HashMap::new(),
            relations: Vec::new(),
            checklists: HashMap::new(),
            jurisdiction: jurisdiction.to_string(),
            metadata: GraphMetadata::new(),
        }
    }

    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    pub fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    /// Overwrite metadata wholesale. Only snapshot restore should call this.
    pub fn restore_metadata(&mut self, metadata: GraphMetadata) {
        self.metadata = metadata;
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, id: ElementId) -> Option<&LegalElement> {
        self.elements.get(id.index())
    }

    pub fn element_by_key(&self, key: &str) -> Option<(ElementId, &LegalElement)> {
        let id = *self.by_key.get(key)?;
        Some((id, &self.elements[id.index()]))
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &LegalElement)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, e)| (ElementId(i as u32), e))
    }

    pub fn relations(&self) -> &[LegalRelation] {
        &self.relations
    }

    pub fn procedural_rules(&self) -> impl Iterator<Item = &LegalElement> {
        self.elements
            .iter()
            .filter(|e| e.kind == ElementKind::ProceduralRule)
    }

    /// The ordered requirement checklist for a claim type; empty when the
    /// claim type is unknown.
    pub fn requirements_for(&self, claim_type: &str) -> &[ElementId] {
        self.checklists
            .get(claim_type)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn claim_types(&self) -> impl Iterator<Item = &str> {
        self.checklists.keys().map(|s| s.as_str())
    }

    /// Checklists as key lists, for the snapshot wire format.
    pub fn checklist_keys(&self) -> HashMap<String, Vec<String>> {
        self.checklists
            .iter()
            .map(|(claim_type, ids)| {
                let keys = ids
                    .iter()
                    .filter_map(|id| self.element(*id).map(|e| e.key.clone()))
                    .collect();
                (claim_type.clone(), keys)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert an element, or return the existing id on key collision (the
    /// first record wins; legal authority text is not confidence-ranked).
    pub fn upsert_element(&mut self, element: LegalElement) -> ElementId {
        if let Some(&id) = self.by_key.get(&element.key) {
            return id;
        }
        let id = ElementId(self.elements.len() as u32);
        self.by_key.insert(element.key.clone(), id);
        self.elements.push(element);
        self.metadata.touch();
        id
    }

    /// Dangling endpoints are rejected at this call.
    pub fn add_relation(
        &mut self,
        source: ElementId,
        target: ElementId,
        kind: LegalRelationKind,
    ) -> Result<(), GraphError> {
        if source.index() >= self.elements.len() {
            return Err(GraphError::DanglingReference {
                endpoint: "source",
                reference: format!("element#{}", source.raw()),
            });
        }
        if target.index() >= self.elements.len() {
            return Err(GraphError::DanglingReference {
                endpoint: "target",
                reference: format!("element#{}", target.raw()),
            });
        }
        let exists = self
            .relations
            .iter()
            .any(|r| r.source == source && r.target == target && r.kind == kind);
        if !exists {
            self.relations.push(LegalRelation {
                source,
                target,
                kind,
            });
            self.metadata.touch();
        }
        Ok(())
    }

    /// Register (or extend) the ordered checklist for a claim type.
    pub fn register_checklist(&mut self, claim_type: &str, elements: Vec<ElementId>) {
        let list = self.checklists.entry(claim_type.to_string()).or_default();
        for id in elements {
            if !list.contains(&id) {
                list.push(id);
            }
        }
        self.metadata.touch();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checklist_lookup_is_keyed_by_claim_type() {
        let mut lg = LegalGraph::new("federal");
        let a = lg.upsert_element(LegalElement::new(
            "req:protected_class",
            ElementKind::Requirement,
            "membership in a protected class",
            "federal",
        ));
        let b = lg.upsert_element(LegalElement::new(
            "req:adverse_action",
            ElementKind::Requirement,
            "an adverse employment action",
            "federal",
        ));
        lg.register_checklist("employment_discrimination", vec![a, b]);

        assert_eq!(lg.requirements_for("employment_discrimination"), &[a, b]);
        assert!(lg.requirements_for("unknown_claim").is_empty());
    }

    #[test]
    fn upsert_is_idempotent_on_key() {
        let mut lg = LegalGraph::new("federal");
        let first = lg.upsert_element(LegalElement::new(
            "req:notice",
            ElementKind::Requirement,
            "notice",
            "federal",
        ));
        let second = lg.upsert_element(LegalElement::new(
            "req:notice",
            ElementKind::Requirement,
            "different text",
            "federal",
        ));
        assert_eq!(first, second);
        assert_eq!(lg.element_count(), 1);
        assert_eq!(lg.element(first).unwrap().text, "notice");
    }

    #[test]
    fn dangling_relation_rejected() {
        let mut lg = LegalGraph::new("federal");
        let a = lg.upsert_element(LegalElement::new(
            "statute:x",
            ElementKind::Statute,
            "x",
            "federal",
        ));
        let err = lg
            .add_relation(a, ElementId(9), LegalRelationKind::DerivedFrom)
            .unwrap_err();
        assert!(matches!(err, GraphError::DanglingReference { .. }));
    }
}
