//! The dependency graph: claims, the requirements they must satisfy, and the
//! facts and evidence that satisfy them.
//!
//! A claim's readiness is a pure function of its requirement nodes'
//! `satisfied` flags; nothing here caches readiness, so it can never diverge
//! from the recomputation.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gap::{Gap, GapKind};
use crate::{Confidence, GraphError, GraphMetadata, EVIDENCE_CONFIDENCE_FLOOR};

// ============================================================================
// Ids and records
// ============================================================================

/// Opaque arena index for a dependency node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Claim,
    Requirement,
    Fact,
    Evidence,
    LegalElement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyNode {
    /// Stable key, unique within the owning graph.
    pub key: String,
    pub kind: NodeKind,
    pub name: String,
    pub satisfied: bool,
    pub confidence: Confidence,
    /// For requirement nodes: the legal element this requirement was linked
    /// to during formalization. The matcher's symbolic pass keys on this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_ref: Option<String>,
    /// For claim nodes: the claim-type string the legal graph keys its
    /// requirement checklists by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_type: Option<String>,
}

impl DependencyNode {
    pub fn new(key: &str, kind: NodeKind, name: &str) -> Self {
        Self {
            key: key.to_string(),
            kind,
            name: name.to_string(),
            satisfied: false,
            confidence: Confidence::default(),
            legal_ref: None,
            claim_type: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Confidence::new(confidence);
        self
    }

    pub fn with_claim_type(mut self, claim_type: &str) -> Self {
        self.claim_type = Some(claim_type.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Source claim requires the target requirement.
    Requires,
    /// Source fact/evidence supports the target claim or requirement.
    Supports,
    /// Source fact/evidence contradicts the target.
    Contradicts,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: DependencyKind,
}

/// Aggregate readiness report, keyed by claim key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimReadiness {
    pub ready_claims: usize,
    pub total_claims: usize,
    pub per_claim: BTreeMap<String, f32>,
}

// ============================================================================
// DependencyGraph
// ============================================================================

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    by_key: HashMap<String, NodeId>,
    dependencies: Vec<Dependency>,
    metadata: GraphMetadata,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            by_key: HashMap::new(),
            dependencies: Vec::new(),
            metadata: GraphMetadata::new(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn metadata(&self) -> &GraphMetadata {
        &self.metadata
    }

    /// Overwrite metadata wholesale. Only snapshot restore should call this;
    /// normal mutation goes through `touch`.
    pub fn restore_metadata(&mut self, metadata: GraphMetadata) {
        self.metadata = metadata;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&DependencyNode> {
        self.nodes.get(id.index())
    }

    pub fn node_by_key(&self, key: &str) -> Option<(NodeId, &DependencyNode)> {
        let id = *self.by_key.get(key)?;
        Some((id, &self.nodes[id.index()]))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &DependencyNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn claims(&self) -> impl Iterator<Item = (NodeId, &DependencyNode)> {
        self.nodes().filter(|(_, n)| n.kind == NodeKind::Claim)
    }

    /// Requirement nodes the given claim depends on, in insertion order.
    pub fn requirements_of(&self, claim: NodeId) -> Vec<NodeId> {
        self.dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::Requires && d.source == claim)
            .map(|d| d.target)
            .collect()
    }

    /// Claims depending on the given requirement.
    pub fn claims_requiring(&self, requirement: NodeId) -> Vec<NodeId> {
        self.dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::Requires && d.target == requirement)
            .map(|d| d.source)
            .collect()
    }

    fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert a node, or reconcile with an existing one of the same key.
    /// Higher confidence wins a collision; `satisfied` is sticky (a node once
    /// satisfied is not un-satisfied by a weaker duplicate).
    pub fn upsert_node(&mut self, node: DependencyNode) -> NodeId {
        if let Some(&id) = self.by_key.get(&node.key) {
            let existing = &mut self.nodes[id.index()];
            let was_satisfied = existing.satisfied;
            if node.confidence > existing.confidence {
                *existing = node;
                existing.satisfied |= was_satisfied;
                self.metadata.touch();
            } else if node.satisfied && !was_satisfied {
                existing.satisfied = true;
                self.metadata.touch();
            }
            return id;
        }

        let id = NodeId(self.nodes.len() as u32);
        self.by_key.insert(node.key.clone(), id);
        self.nodes.push(node);
        self.metadata.touch();
        id
    }

    /// Add an edge between two nodes already in the graph; dangling endpoints
    /// are rejected at this call. Duplicate edges are ignored.
    pub fn add_dependency(
        &mut self,
        source: NodeId,
        target: NodeId,
        kind: DependencyKind,
    ) -> Result<(), GraphError> {
        if !self.contains(source) {
            return Err(GraphError::DanglingReference {
                endpoint: "source",
                reference: format!("node#{}", source.raw()),
            });
        }
        if !self.contains(target) {
            return Err(GraphError::DanglingReference {
                endpoint: "target",
                reference: format!("node#{}", target.raw()),
            });
        }
        if source == target {
            return Err(GraphError::SelfReference {
                reference: self.nodes[source.index()].key.clone(),
            });
        }

        let exists = self
            .dependencies
            .iter()
            .any(|d| d.source == source && d.target == target && d.kind == kind);
        if !exists {
            self.dependencies.push(Dependency {
                source,
                target,
                kind,
            });
            self.metadata.touch();
        }
        Ok(())
    }

    /// Mark a requirement satisfied out of band (e.g. by the matcher's
    /// semantic pass or by an operator decision).
    pub fn mark_requirement_satisfied(
        &mut self,
        key: &str,
        confidence: Confidence,
    ) -> Result<(), GraphError> {
        let id = *self
            .by_key
            .get(key)
            .ok_or_else(|| GraphError::DanglingReference {
                endpoint: "target",
                reference: key.to_string(),
            })?;
        let node = &mut self.nodes[id.index()];
        node.satisfied = true;
        node.confidence = node.confidence.stronger(confidence);
        self.metadata.touch();
        Ok(())
    }

    /// Tag a requirement with the legal element it formalizes.
    pub fn set_legal_ref(&mut self, key: &str, element_id: &str) -> Result<(), GraphError> {
        let id = *self
            .by_key
            .get(key)
            .ok_or_else(|| GraphError::DanglingReference {
                endpoint: "target",
                reference: key.to_string(),
            })?;
        self.nodes[id.index()].legal_ref = Some(element_id.to_string());
        self.metadata.touch();
        Ok(())
    }

    /// Link an evidence item to the claims it supports.
    ///
    /// Adds an evidence node (if absent) and `Supports` edges to each claim,
    /// then recomputes requirement satisfaction. Unknown claim keys are a
    /// referential violation.
    pub fn link_evidence(
        &mut self,
        evidence_id: &str,
        title: &str,
        claim_keys: &[&str],
        confidence: Confidence,
    ) -> Result<NodeId, GraphError> {
        // Validate up front so a bad key cannot leave a half-linked node.
        let mut claim_ids = Vec::with_capacity(claim_keys.len());
        for key in claim_keys {
            let id = *self
                .by_key
                .get(*key)
                .ok_or_else(|| GraphError::DanglingReference {
                    endpoint: "target",
                    reference: (*key).to_string(),
                })?;
            claim_ids.push(id);
        }

        let evidence = self.upsert_node(
            DependencyNode::new(&format!("evidence:{evidence_id}"), NodeKind::Evidence, title)
                .with_confidence(confidence.value()),
        );
        for claim in claim_ids {
            self.add_dependency(evidence, claim, DependencyKind::Supports)?;
        }

        self.recompute_satisfaction(EVIDENCE_CONFIDENCE_FLOOR);
        debug!(evidence_id, claims = claim_keys.len(), "linked evidence");
        Ok(evidence)
    }

    /// Recompute requirement satisfaction from evidence.
    ///
    /// A requirement counts as satisfied once its supporting evidence set is
    /// non-empty above the confidence floor; the set is evidence supporting
    /// the requirement directly, or supporting any claim that requires it.
    /// Satisfaction only ever upgrades here: flags set out of band (semantic
    /// pass, operator decision) are not cleared.
    pub fn recompute_satisfaction(&mut self, floor: f32) {
        let requirement_ids: Vec<NodeId> = self
            .nodes()
            .filter(|(_, n)| n.kind == NodeKind::Requirement)
            .map(|(id, _)| id)
            .collect();

        for req in requirement_ids {
            let mut best: Option<Confidence> = None;
            for dep in &self.dependencies {
                if dep.kind != DependencyKind::Supports {
                    continue;
                }
                let Some(source) = self.node(dep.source) else {
                    continue;
                };
                if source.kind != NodeKind::Evidence || !source.confidence.at_least(floor) {
                    continue;
                }
                let reaches = dep.target == req
                    || self
                        .claims_requiring(req)
                        .iter()
                        .any(|claim| dep.target == *claim);
                if reaches {
                    let c = source.confidence;
                    best = Some(best.map_or(c, |b| b.stronger(c)));
                }
            }

            if let Some(confidence) = best {
                let node = &mut self.nodes[req.index()];
                if !node.satisfied || confidence > node.confidence {
                    node.satisfied = true;
                    node.confidence = node.confidence.stronger(confidence);
                    self.metadata.touch();
                }
            }
        }
    }

    /// Union another dependency graph into this one, keyed by node key.
    /// Idempotent, like [`crate::KnowledgeGraph::merge`].
    pub fn merge(&mut self, other: &DependencyGraph) {
        for (_, node) in other.nodes() {
            self.upsert_node(node.clone());
        }
        for dep in other.dependencies() {
            let (Some(src), Some(tgt)) = (other.node(dep.source), other.node(dep.target)) else {
                continue;
            };
            let (Some(&source), Some(&target)) =
                (self.by_key.get(&src.key), self.by_key.get(&tgt.key))
            else {
                continue;
            };
            // Endpoints were just upserted, so this cannot dangle.
            let _ = self.add_dependency(source, target, dep.kind);
        }
    }

    // ------------------------------------------------------------------
    // Readiness and gaps
    // ------------------------------------------------------------------

    /// Per-claim readiness, recomputed from requirement flags on every call.
    ///
    /// A claim with zero requirements reports readiness 0.0 and is counted
    /// unready, so it surfaces for review rather than silently passing.
    pub fn get_claim_readiness(&self) -> ClaimReadiness {
        let mut per_claim = BTreeMap::new();
        let mut ready_claims = 0;
        let mut total_claims = 0;

        for (claim_id, claim) in self.claims() {
            total_claims += 1;
            let requirements = self.requirements_of(claim_id);
            let readiness = if requirements.is_empty() {
                0.0
            } else {
                let satisfied = requirements
                    .iter()
                    .filter(|&&r| self.nodes[r.index()].satisfied)
                    .count();
                satisfied as f32 / requirements.len() as f32
            };
            if !requirements.is_empty() && readiness >= 1.0 {
                ready_claims += 1;
            }
            per_claim.insert(claim.key.clone(), readiness);
        }

        ClaimReadiness {
            ready_claims,
            total_claims,
            per_claim,
        }
    }

    /// Fraction of requirements currently satisfied; `None` when the graph
    /// has no requirement nodes.
    pub fn satisfaction_ratio(&self) -> Option<f32> {
        let mut total = 0usize;
        let mut satisfied = 0usize;
        for (_, node) in self.nodes() {
            if node.kind == NodeKind::Requirement {
                total += 1;
                if node.satisfied {
                    satisfied += 1;
                }
            }
        }
        if total == 0 {
            None
        } else {
            Some(satisfied as f32 / total as f32)
        }
    }

    /// Unsatisfied requirements, most-depended-upon first (ties keep
    /// insertion order).
    pub fn find_gaps(&self) -> Vec<Gap> {
        let mut gaps: Vec<Gap> = self
            .nodes()
            .filter(|(_, n)| n.kind == NodeKind::Requirement && !n.satisfied)
            .map(|(id, node)| {
                let blocked = self.claims_requiring(id).len();
                Gap::new(
                    GapKind::UnsatisfiedRequirement,
                    &node.key,
                    format!("the requirement \"{}\" is not yet satisfied", node.name),
                    format!("What evidence shows that {}?", node.name),
                )
                .blocking(blocked)
            })
            .collect();
        gaps.sort_by(|a, b| b.blocked_claims.cmp(&a.blocked_claims));
        gaps
    }

    /// Claims that no evidence node supports at all.
    pub fn claims_without_evidence(&self) -> Vec<&DependencyNode> {
        self.claims()
            .filter(|(claim_id, _)| {
                !self.dependencies.iter().any(|d| {
                    d.kind == DependencyKind::Supports
                        && d.target == *claim_id
                        && self
                            .node(d.source)
                            .map(|n| n.kind == NodeKind::Evidence)
                            .unwrap_or(false)
                })
            })
            .map(|(_, n)| n)
            .collect()
    }

    /// True when the two graphs carry the same nodes and edges, ignoring
    /// arena ordering and metadata.
    pub fn same_content(&self, other: &DependencyGraph) -> bool {
        if self.node_count() != other.node_count()
            || self.dependencies.len() != other.dependencies.len()
        {
            return false;
        }
        let same_nodes = self.nodes().all(|(_, n)| {
            other
                .node_by_key(&n.key)
                .map(|(_, o)| o == n)
                .unwrap_or(false)
        });
        same_nodes && self.edge_triples() == other.edge_triples()
    }

    fn edge_triples(&self) -> Vec<(String, String, DependencyKind)> {
        let mut triples: Vec<_> = self
            .dependencies
            .iter()
            .filter_map(|d| {
                let src = self.node(d.source)?;
                let tgt = self.node(d.target)?;
                Some((src.key.clone(), tgt.key.clone(), d.kind))
            })
            .collect();
        triples.sort();
        triples
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
