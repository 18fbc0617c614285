//! The knowledge graph: entities and relationships extracted from narrative
//! text.
//!
//! The graph is created once per complaint and then mutated only through
//! [`KnowledgeGraph::merge`], which is an idempotent union keyed by entity
//! key: feeding the same extraction twice leaves the graph unchanged, so the
//! noise metric downstream is stable under repeated answers.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gap::{Gap, GapKind};
use crate::{Confidence, GraphError, GraphMetadata, LOW_CONFIDENCE_THRESHOLD};

// ============================================================================
// Ids and records
// ============================================================================

/// Opaque arena index for an entity (4 bytes, valid only within the graph
/// that minted it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Organization,
    Date,
    Fact,
    Claim,
    EvidenceRef,
}

/// An entity extracted from narrative text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable key, unique within the owning graph and immutable once
    /// assigned (e.g. `person:john`).
    pub key: String,
    pub kind: EntityKind,
    /// The surface text the entity was extracted from.
    pub text: String,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    /// Where the entity came from (narrative, an answer, evidence, ...).
    pub source: String,
}

impl Entity {
    pub fn new(key: &str, kind: EntityKind, text: &str, confidence: f32) -> Self {
        Self {
            key: key.to_string(),
            kind,
            text: text.to_string(),
            confidence: Confidence::new(confidence),
            properties: BTreeMap::new(),
            source: String::new(),
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    EmployedBy,
    CausedBy,
    Supports,
    Contradicts,
    CoOccurrence,
}

/// A directed edge between two entities in the same graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: EntityId,
    pub target: EntityId,
    pub kind: RelationKind,
    pub confidence: Confidence,
}

// ============================================================================
// KnowledgeGraph
// ============================================================================

/// Entity arena + key index + relationship list.
#[derive(Debug, Clone)]
pub struct KnowledgeGraph {
    entities: Vec<Entity>,
    by_key: HashMap<String, EntityId>,
    relationships: Vec<Relationship>,
    metadata: GraphMetadata,
}

/// What [`KnowledgeGraph::merge`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub entities_added: usize,
    pub entities_updated: usize,
    pub relationships_added: usize,
}

impl MergeStats {
    pub fn changed(&self) -> bool {
        self.entities_added + self.entities_updated + self.relationships_added > 0
    }
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            by_key: HashMap::new(),
            relationships: Vec::new(),
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

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index())
    }

    pub fn entity_by_key(&self, key: &str) -> Option<(EntityId, &Entity)> {
        let id = *self.by_key.get(key)?;
        Some((id, &self.entities[id.index()]))
    }

    /// Entities in insertion order, paired with their arena ids.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, e)| (EntityId(i as u32), e))
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Mean entity confidence, `None` when the graph is empty.
    pub fn mean_confidence(&self) -> Option<f32> {
        if self.entities.is_empty() {
            return None;
        }
        let sum: f32 = self.entities.iter().map(|e| e.confidence.value()).sum();
        Some(sum / self.entities.len() as f32)
    }

    fn contains(&self, id: EntityId) -> bool {
        id.index() < self.entities.len()
    }

    fn degree(&self, id: EntityId) -> usize {
        self.relationships
            .iter()
            .filter(|r| r.source == id || r.target == id)
            .count()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert an entity, or reconcile with an existing one of the same key.
    ///
    /// On key collision the higher-confidence record wins; the key itself is
    /// immutable. Returns the arena id either way.
    pub fn upsert_entity(&mut self, entity: Entity) -> EntityId {
        if let Some(&id) = self.by_key.get(&entity.key) {
            let existing = &mut self.entities[id.index()];
            if entity.confidence > existing.confidence {
                debug!(key = %entity.key, "replacing entity with higher-confidence record");
                *existing = entity;
                self.metadata.touch();
            }
            return id;
        }

        let id = EntityId(self.entities.len() as u32);
        self.by_key.insert(entity.key.clone(), id);
        self.entities.push(entity);
        self.metadata.touch();
        id
    }

    /// Add a relationship between two entities already in the graph.
    ///
    /// Dangling endpoints are rejected here, never discovered later. A
    /// duplicate (source, target, kind) edge keeps the stronger confidence
    /// instead of inserting twice.
    pub fn add_relationship(
        &mut self,
        source: EntityId,
        target: EntityId,
        kind: RelationKind,
        confidence: Confidence,
    ) -> Result<(), GraphError> {
        if !self.contains(source) {
            return Err(GraphError::DanglingReference {
                endpoint: "source",
                reference: format!("entity#{}", source.raw()),
            });
        }
        if !self.contains(target) {
            return Err(GraphError::DanglingReference {
                endpoint: "target",
                reference: format!("entity#{}", target.raw()),
            });
        }
        if source == target {
            return Err(GraphError::SelfReference {
                reference: self.entities[source.index()].key.clone(),
            });
        }

        if let Some(existing) = self
            .relationships
            .iter_mut()
            .find(|r| r.source == source && r.target == target && r.kind == kind)
        {
            let stronger = existing.confidence.stronger(confidence);
            if stronger != existing.confidence {
                existing.confidence = stronger;
                self.metadata.touch();
            }
            return Ok(());
        }

        self.relationships.push(Relationship {
            source,
            target,
            kind,
            confidence,
        });
        self.metadata.touch();
        Ok(())
    }

    /// Key-addressed convenience for callers that do not hold arena ids.
    pub fn add_relationship_by_key(
        &mut self,
        source_key: &str,
        target_key: &str,
        kind: RelationKind,
        confidence: Confidence,
    ) -> Result<(), GraphError> {
        let source = *self
            .by_key
            .get(source_key)
            .ok_or_else(|| GraphError::DanglingReference {
                endpoint: "source",
                reference: source_key.to_string(),
            })?;
        let target = *self
            .by_key
            .get(target_key)
            .ok_or_else(|| GraphError::DanglingReference {
                endpoint: "target",
                reference: target_key.to_string(),
            })?;
        self.add_relationship(source, target, kind, confidence)
    }

    /// Union another graph into this one, keyed by entity key.
    ///
    /// Idempotent (`merge(g, g)` leaves `g`'s content unchanged) and
    /// commutative on disjoint inputs. On key collision the
    /// higher-confidence entity wins and relationship sets are unioned.
    pub fn merge(&mut self, other: &KnowledgeGraph) -> MergeStats {
        let mut stats = MergeStats::default();

        for (_, entity) in other.entities() {
            match self.by_key.get(&entity.key).copied() {
                None => {
                    let id = EntityId(self.entities.len() as u32);
                    self.by_key.insert(entity.key.clone(), id);
                    self.entities.push(entity.clone());
                    stats.entities_added += 1;
                }
                Some(id) => {
                    let existing = &mut self.entities[id.index()];
                    if entity.confidence > existing.confidence {
                        *existing = entity.clone();
                        stats.entities_updated += 1;
                    }
                }
            }
        }

        for rel in other.relationships() {
            // Endpoints resolve through the other graph's arena, then remap
            // into ours by key; both lookups are infallible by construction.
            let (Some(src), Some(tgt)) = (other.entity(rel.source), other.entity(rel.target))
            else {
                continue;
            };
            let (Some(&source), Some(&target)) =
                (self.by_key.get(&src.key), self.by_key.get(&tgt.key))
            else {
                continue;
            };

            let existing = self
                .relationships
                .iter_mut()
                .find(|r| r.source == source && r.target == target && r.kind == rel.kind);
            match existing {
                Some(r) => {
                    r.confidence = r.confidence.stronger(rel.confidence);
                }
                None => {
                    self.relationships.push(Relationship {
                        source,
                        target,
                        kind: rel.kind,
                        confidence: rel.confidence,
                    });
                    stats.relationships_added += 1;
                }
            }
        }

        if stats.changed() {
            self.metadata.touch();
            debug!(
                added = stats.entities_added,
                updated = stats.entities_updated,
                relationships = stats.relationships_added,
                "merged knowledge graph delta"
            );
        }
        stats
    }

    // ------------------------------------------------------------------
    // Gap detection
    // ------------------------------------------------------------------

    /// Structural deficiencies, in entity insertion order.
    ///
    /// Three kinds are reported: low-confidence entities, isolated entities,
    /// and claims with no supporting fact.
    pub fn find_gaps(&self) -> Vec<Gap> {
        let mut gaps = Vec::new();

        for (id, entity) in self.entities() {
            if entity.confidence.value() < LOW_CONFIDENCE_THRESHOLD {
                gaps.push(Gap::new(
                    GapKind::LowConfidence,
                    &entity.key,
                    format!(
                        "\"{}\" was extracted with low confidence ({:.2})",
                        entity.text,
                        entity.confidence.value()
                    ),
                    format!("Can you confirm or clarify: {}?", entity.text),
                ));
            }

            if self.degree(id) == 0 && self.entity_count() > 1 {
                gaps.push(Gap::new(
                    GapKind::IsolatedEntity,
                    &entity.key,
                    format!("\"{}\" is not connected to anything else", entity.text),
                    format!(
                        "How does {} relate to the events you described?",
                        entity.text
                    ),
                ));
            }

            if entity.kind == EntityKind::Claim && !self.claim_is_supported(id) {
                gaps.push(Gap::new(
                    GapKind::UnsupportedClaim,
                    &entity.key,
                    format!("the claim \"{}\" has no supporting facts", entity.text),
                    format!(
                        "What specific facts support your claim of {}?",
                        entity.text
                    ),
                ));
            }
        }

        gaps
    }

    fn claim_is_supported(&self, claim: EntityId) -> bool {
        self.relationships.iter().any(|r| {
            r.target == claim
                && r.kind == RelationKind::Supports
                && self
                    .entity(r.source)
                    .map(|e| e.kind == EntityKind::Fact)
                    .unwrap_or(false)
        })
    }

    // ------------------------------------------------------------------
    // Content comparison (for tests and merge laws)
    // ------------------------------------------------------------------

    /// Relationships as key triples, sorted, with confidences.
    pub fn relationship_triples(&self) -> Vec<(String, String, RelationKind, f32)> {
        let mut triples: Vec<_> = self
            .relationships
            .iter()
            .filter_map(|r| {
                let src = self.entity(r.source)?;
                let tgt = self.entity(r.target)?;
                Some((
                    src.key.clone(),
                    tgt.key.clone(),
                    r.kind,
                    r.confidence.value(),
                ))
            })
            .collect();
        triples.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        triples
    }

    /// True when the two graphs carry the same entities and relationships,
    /// ignoring arena ordering and metadata.
    pub fn same_content(&self, other: &KnowledgeGraph) -> bool {
        if self.entity_count() != other.entity_count()
            || self.relationship_count() != other.relationship_count()
        {
            return false;
        }
        let same_entities = self.entities().all(|(_, e)| {
            other
                .entity_by_key(&e.key)
                .map(|(_, o)| o == e)
                .unwrap_or(false)
        });
        same_entities && self.relationship_triples() == other.relationship_triples()
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
