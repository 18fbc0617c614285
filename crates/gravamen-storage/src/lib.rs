//! Versioned JSON snapshot persistence.
//!
//! One directory per session, one pretty-printed JSON file per stateful
//! shape (`knowledge.json`, `dependencies.json`, `legal.json`,
//! `phase.json`). Every file carries a `schema_version`; loading a foreign
//! version is a hard [`SnapshotError::VersionMismatch`] — silent
//! misinterpretation of an unknown schema is worse than stopping.
//!
//! Writes are serialized through a store-wide mutex: callers must not mutate
//! a graph while its snapshot write is in flight, and the lock keeps two
//! writers from interleaving in one file.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use gravamen_engine::PhaseState;
use gravamen_graph::{
    Confidence, DependencyGraph, DependencyKind, DependencyNode, Entity, EntityKind, GraphError,
    GraphMetadata, KnowledgeGraph, NodeKind, RelationKind,
};
use gravamen_legal::{ElementKind, LegalElement, LegalGraph, LegalRelationKind};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Bumped on any incompatible change to the snapshot shapes.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot (de)serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("snapshot schema version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    /// The file parsed but its references do not hold together.
    #[error("snapshot content is corrupt: {0}")]
    Corrupt(#[from] GraphError),
}

fn check_version(found: u32) -> Result<(), SnapshotError> {
    if found != SCHEMA_VERSION {
        return Err(SnapshotError::VersionMismatch {
            found,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct EntityWire {
    id: String,
    kind: EntityKind,
    text: String,
    confidence: Confidence,
    #[serde(default)]
    properties: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    source: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RelationshipWire {
    id: String,
    source_entity_id: String,
    target_entity_id: String,
    kind: RelationKind,
    confidence: Confidence,
}

#[derive(Debug, Serialize, Deserialize)]
struct KnowledgeGraphWire {
    schema_version: u32,
    metadata: GraphMetadata,
    entities: Vec<EntityWire>,
    relationships: Vec<RelationshipWire>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeWire {
    id: String,
    kind: NodeKind,
    name: String,
    satisfied: bool,
    confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    legal_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    claim_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DependencyWire {
    source_id: String,
    target_id: String,
    kind: DependencyKind,
}

#[derive(Debug, Serialize, Deserialize)]
struct DependencyGraphWire {
    schema_version: u32,
    metadata: GraphMetadata,
    nodes: Vec<NodeWire>,
    dependencies: Vec<DependencyWire>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ElementWire {
    id: String,
    kind: ElementKind,
    #[serde(default)]
    citation: String,
    text: String,
    jurisdiction: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LegalRelationWire {
    source_id: String,
    target_id: String,
    kind: LegalRelationKind,
}

#[derive(Debug, Serialize, Deserialize)]
struct LegalGraphWire {
    schema_version: u32,
    metadata: GraphMetadata,
    jurisdiction: String,
    elements: Vec<ElementWire>,
    relations: Vec<LegalRelationWire>,
    /// Claim type → ordered element ids.
    checklists: HashMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PhaseStateWire {
    schema_version: u32,
    #[serde(flatten)]
    state: PhaseState,
}

// ============================================================================
// SnapshotStore
// ============================================================================

pub struct SnapshotStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn session_dir(&self, session: &str) -> PathBuf {
        self.root.join(session)
    }

    fn write_json<T: Serialize>(
        &self,
        session: &str,
        file: &str,
        value: &T,
    ) -> Result<(), SnapshotError> {
        let _guard = self.write_lock.lock();
        let dir = self.session_dir(session);
        fs::create_dir_all(&dir)?;
        let path = dir.join(file);
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        info!(session, file, "wrote snapshot");
        Ok(())
    }

    fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        session: &str,
        file: &str,
    ) -> Result<T, SnapshotError> {
        let path = self.session_dir(session).join(file);
        debug!(session, file, "reading snapshot");
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    // ------------------------------------------------------------------
    // KnowledgeGraph
    // ------------------------------------------------------------------

    pub fn save_knowledge(
        &self,
        session: &str,
        kg: &KnowledgeGraph,
    ) -> Result<(), SnapshotError> {
        let wire = KnowledgeGraphWire {
            schema_version: SCHEMA_VERSION,
            metadata: kg.metadata().clone(),
            entities: kg
                .entities()
                .map(|(_, e)| EntityWire {
                    id: e.key.clone(),
                    kind: e.kind,
                    text: e.text.clone(),
                    confidence: e.confidence,
                    properties: e.properties.clone(),
                    source: e.source.clone(),
                })
                .collect(),
            relationships: kg
                .relationship_triples()
                .into_iter()
                .enumerate()
                .map(|(i, (source, target, kind, confidence))| RelationshipWire {
                    id: format!("rel-{i}"),
                    source_entity_id: source,
                    target_entity_id: target,
                    kind,
                    confidence: Confidence::new(confidence),
                })
                .collect(),
        };
        self.write_json(session, "knowledge.json", &wire)
    }

    pub fn load_knowledge(&self, session: &str) -> Result<KnowledgeGraph, SnapshotError> {
        let wire: KnowledgeGraphWire = self.read_json(session, "knowledge.json")?;
        check_version(wire.schema_version)?;

        let mut kg = KnowledgeGraph::new();
        for e in wire.entities {
            kg.upsert_entity(Entity {
                key: e.id,
                kind: e.kind,
                text: e.text,
                confidence: e.confidence,
                properties: e.properties,
                source: e.source,
            });
        }
        for r in wire.relationships {
            kg.add_relationship_by_key(
                &r.source_entity_id,
                &r.target_entity_id,
                r.kind,
                r.confidence,
            )?;
        }
        kg.restore_metadata(wire.metadata);
        Ok(kg)
    }

    // ------------------------------------------------------------------
    // DependencyGraph
    // ------------------------------------------------------------------

    pub fn save_dependencies(
        &self,
        session: &str,
        dg: &DependencyGraph,
    ) -> Result<(), SnapshotError> {
        let dependencies = dg
            .dependencies()
            .iter()
            .filter_map(|d| {
                let source = dg.node(d.source)?;
                let target = dg.node(d.target)?;
                Some(DependencyWire {
                    source_id: source.key.clone(),
                    target_id: target.key.clone(),
                    kind: d.kind,
                })
            })
            .collect();
        let wire = DependencyGraphWire {
            schema_version: SCHEMA_VERSION,
            metadata: dg.metadata().clone(),
            nodes: dg
                .nodes()
                .map(|(_, n)| NodeWire {
                    id: n.key.clone(),
                    kind: n.kind,
                    name: n.name.clone(),
                    satisfied: n.satisfied,
                    confidence: n.confidence,
                    legal_ref: n.legal_ref.clone(),
                    claim_type: n.claim_type.clone(),
                })
                .collect(),
            dependencies,
        };
        self.write_json(session, "dependencies.json", &wire)
    }

    pub fn load_dependencies(&self, session: &str) -> Result<DependencyGraph, SnapshotError> {
        let wire: DependencyGraphWire = self.read_json(session, "dependencies.json")?;
        check_version(wire.schema_version)?;

        let mut dg = DependencyGraph::new();
        for n in wire.nodes {
            dg.upsert_node(DependencyNode {
                key: n.id,
                kind: n.kind,
                name: n.name,
                satisfied: n.satisfied,
                confidence: n.confidence,
                legal_ref: n.legal_ref,
                claim_type: n.claim_type,
            });
        }
        for d in wire.dependencies {
            let source = resolve_node(&dg, &d.source_id, "source")?;
            let target = resolve_node(&dg, &d.target_id, "target")?;
            dg.add_dependency(source, target, d.kind)?;
        }
        dg.restore_metadata(wire.metadata);
        Ok(dg)
    }

    // ------------------------------------------------------------------
    // LegalGraph
    // ------------------------------------------------------------------

    pub fn save_legal(&self, session: &str, lg: &LegalGraph) -> Result<(), SnapshotError> {
        let relations = lg
            .relations()
            .iter()
            .filter_map(|r| {
                let source = lg.element(r.source)?;
                let target = lg.element(r.target)?;
                Some(LegalRelationWire {
                    source_id: source.key.clone(),
                    target_id: target.key.clone(),
                    kind: r.kind,
                })
            })
            .collect();
        let wire = LegalGraphWire {
            schema_version: SCHEMA_VERSION,
            metadata: lg.metadata().clone(),
            jurisdiction: lg.jurisdiction().to_string(),
            elements: lg
                .elements()
                .map(|(_, e)| ElementWire {
                    id: e.key.clone(),
                    kind: e.kind,
                    citation: e.citation.clone(),
                    text: e.text.clone(),
                    jurisdiction: e.jurisdiction.clone(),
                })
                .collect(),
            relations,
            checklists: lg.checklist_keys(),
        };
        self.write_json(session, "legal.json", &wire)
    }

    pub fn load_legal(&self, session: &str) -> Result<LegalGraph, SnapshotError> {
        let wire: LegalGraphWire = self.read_json(session, "legal.json")?;
        check_version(wire.schema_version)?;

        let mut lg = LegalGraph::new(&wire.jurisdiction);
        for e in wire.elements {
            lg.upsert_element(LegalElement {
                key: e.id,
                kind: e.kind,
                citation: e.citation,
                text: e.text,
                jurisdiction: e.jurisdiction,
            });
        }
        for r in wire.relations {
            let source = resolve_element(&lg, &r.source_id, "source")?;
            let target = resolve_element(&lg, &r.target_id, "target")?;
            lg.add_relation(source, target, r.kind)?;
        }
        for (claim_type, keys) in wire.checklists {
            let mut ids = Vec::with_capacity(keys.len());
            for key in &keys {
                ids.push(resolve_element(&lg, key, "target")?);
            }
            lg.register_checklist(&claim_type, ids);
        }
        lg.restore_metadata(wire.metadata);
        Ok(lg)
    }

    // ------------------------------------------------------------------
    // PhaseState
    // ------------------------------------------------------------------

    pub fn save_phase(&self, session: &str, state: &PhaseState) -> Result<(), SnapshotError> {
        let wire = PhaseStateWire {
            schema_version: SCHEMA_VERSION,
            state: state.clone(),
        };
        self.write_json(session, "phase.json", &wire)
    }

    pub fn load_phase(&self, session: &str) -> Result<PhaseState, SnapshotError> {
        let wire: PhaseStateWire = self.read_json(session, "phase.json")?;
        check_version(wire.schema_version)?;
        Ok(wire.state)
    }
}

fn resolve_node(
    dg: &DependencyGraph,
    key: &str,
    endpoint: &'static str,
) -> Result<gravamen_graph::NodeId, SnapshotError> {
    dg.node_by_key(key)
        .map(|(id, _)| id)
        .ok_or_else(|| {
            SnapshotError::Corrupt(GraphError::DanglingReference {
                endpoint,
                reference: key.to_string(),
            })
        })
}

fn resolve_element(
    lg: &LegalGraph,
    key: &str,
    endpoint: &'static str,
) -> Result<gravamen_legal::ElementId, SnapshotError> {
    lg.element_by_key(key)
        .map(|(id, _)| id)
        .ok_or_else(|| {
            SnapshotError::Corrupt(GraphError::DanglingReference {
                endpoint,
                reference: key.to_string(),
            })
        })
}
