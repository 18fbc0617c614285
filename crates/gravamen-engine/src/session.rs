//! Per-complaint session state.
//!
//! Exactly one logical session mutates a given graph triple at a time; the
//! caller owns the context and passes it by reference into engine calls.
//! Independent sessions share nothing.

use chrono::{DateTime, Utc};
use gravamen_graph::{DependencyGraph, EvidenceRecord, KnowledgeGraph};
use gravamen_legal::LegalGraph;
use gravamen_match::MatchResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One question asked and the answer received, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaTurn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl QaTurn {
    pub fn new(question: &str, answer: &str) -> Self {
        Self {
            question: question.to_string(),
            answer: answer.to_string(),
            asked_at: Utc::now(),
        }
    }
}

/// Everything one complaint accumulates across the three phases.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub knowledge: KnowledgeGraph,
    pub dependencies: DependencyGraph,
    /// Built once formalization begins.
    pub legal: Option<LegalGraph>,
    pub evidence: Vec<EvidenceRecord>,
    pub match_result: Option<MatchResult>,
    /// The formal complaint artifact, once synthesized.
    pub complaint: Option<String>,
    pub conversation: Vec<QaTurn>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            knowledge: KnowledgeGraph::new(),
            dependencies: DependencyGraph::new(),
            legal: None,
            evidence: Vec::new(),
            match_result: None,
            complaint: None,
            conversation: Vec::new(),
        }
    }

    pub fn with_graphs(knowledge: KnowledgeGraph, dependencies: DependencyGraph) -> Self {
        Self {
            knowledge,
            dependencies,
            ..Self::new()
        }
    }

    pub fn record_turn(&mut self, question: &str, answer: &str) {
        self.conversation.push(QaTurn::new(question, answer));
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}
