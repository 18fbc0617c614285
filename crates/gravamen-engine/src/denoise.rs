//! The noise metric and the question loop built on it.
//!
//! Noise is a scalar in `[0,1]` aggregating three uncertainty sources:
//!
//! ```text
//! noise = 0.4*(1 - mean_entity_confidence)
//!       + 0.4*(1 - dependency_satisfaction_ratio)
//!       + 0.2*(gap_count / max(1, entity_count))
//! ```
//!
//! Empty graphs contribute zero noise on their terms (no data means no
//! measured uncertainty), so an empty session starts at 0.0 rather than at
//! a division artifact. Each iteration the caller asks the highest-priority
//! question, feeds the answer back through [`Denoiser::process_answer`], and
//! records the new noise; convergence is noise stabilizing within epsilon
//! over a sliding window.

use gravamen_graph::{
    Confidence, DependencyGraph, EvidenceRecord, Gap, GapKind, GraphError, KnowledgeGraph,
};
use gravamen_ingest::{adjust_confidence, KnowledgeGraphBuilder};
use gravamen_match::MatchResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::session::QaTurn;

/// Default cap on questions returned per iteration.
pub const DEFAULT_MAX_QUESTIONS: usize = 5;

/// Noise-term weights.
const CONFIDENCE_WEIGHT: f64 = 0.4;
const SATISFACTION_WEIGHT: f64 = 0.4;
const GAP_WEIGHT: f64 = 0.2;

// ============================================================================
// Convergence
// ============================================================================

/// Sliding-window convergence parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    pub window: usize,
    pub epsilon: f64,
}

impl ConvergenceConfig {
    /// True only once the window is full and the spread of the last `window`
    /// samples is below epsilon. Fewer samples than the window is never
    /// convergence.
    pub fn converged(&self, loss_history: &[f64]) -> bool {
        if loss_history.len() < self.window {
            return false;
        }
        let tail = &loss_history[loss_history.len() - self.window..];
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in tail {
            min = min.min(v);
            max = max.max(v);
        }
        max - min < self.epsilon
    }
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            window: 5,
            epsilon: 0.01,
        }
    }
}

// ============================================================================
// Questions and deltas
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A question the caller should put to the complainant, ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub priority: Priority,
    pub kind: GapKind,
    /// Stable key of the entity/node the question targets.
    pub subject: String,
}

/// What one answer (or evidence item) changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphDelta {
    pub entities_added: usize,
    pub relationships_added: usize,
    pub noise_before: f64,
    pub noise_after: f64,
}

// ============================================================================
// Denoiser
// ============================================================================

pub struct Denoiser {
    builder: KnowledgeGraphBuilder,
    max_questions: usize,
    convergence: ConvergenceConfig,
}

impl Denoiser {
    pub fn new() -> Self {
        Self {
            builder: KnowledgeGraphBuilder::new(),
            max_questions: DEFAULT_MAX_QUESTIONS,
            convergence: ConvergenceConfig::default(),
        }
    }

    pub fn with_max_questions(mut self, max_questions: usize) -> Self {
        self.max_questions = max_questions;
        self
    }

    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn convergence(&self) -> ConvergenceConfig {
        self.convergence
    }

    // ------------------------------------------------------------------
    // Noise
    // ------------------------------------------------------------------

    /// Aggregate uncertainty of the two intake graphs, in `[0,1]`.
    pub fn noise(&self, kg: &KnowledgeGraph, dg: &DependencyGraph) -> f64 {
        let mean_confidence = kg.mean_confidence().unwrap_or(1.0) as f64;
        let satisfaction = dg.satisfaction_ratio().unwrap_or(1.0) as f64;

        let gap_count = kg.find_gaps().len() + dg.find_gaps().len();
        let entity_count = kg.entity_count().max(1);
        let gap_ratio = (gap_count as f64 / entity_count as f64).min(1.0);

        let noise = CONFIDENCE_WEIGHT * (1.0 - mean_confidence)
            + SATISFACTION_WEIGHT * (1.0 - satisfaction)
            + GAP_WEIGHT * gap_ratio;
        noise.clamp(0.0, 1.0)
    }

    /// True once the loss history has stabilized.
    pub fn has_converged(&self, loss_history: &[f64]) -> bool {
        self.convergence.converged(loss_history)
    }

    // ------------------------------------------------------------------
    // Phase 1: intake questions
    // ------------------------------------------------------------------

    /// Ranked questions from both graphs' gaps.
    ///
    /// Priority: high for isolated entities, unsupported claims, and
    /// requirements blocking two or more claims; medium for low-confidence
    /// entities and singly-blocking requirements. The sort is stable, so
    /// equal priorities keep graph insertion order and the output is
    /// deterministic for a given graph state.
    pub fn generate_questions(&self, kg: &KnowledgeGraph, dg: &DependencyGraph) -> Vec<Question> {
        let mut questions: Vec<Question> = kg
            .find_gaps()
            .into_iter()
            .chain(dg.find_gaps())
            .map(|gap| Question {
                priority: priority_for(&gap),
                text: gap.suggested_question,
                kind: gap.kind,
                subject: gap.subject,
            })
            .collect();

        questions.sort_by_key(|q| q.priority);
        questions.truncate(self.max_questions);
        questions
    }

    /// Re-extract from the answer, scoped to the question's target, and merge
    /// the delta into the knowledge graph. Feeding the same answer twice
    /// changes nothing (the merge is idempotent), so noise is stable under
    /// repeats.
    pub fn process_answer(
        &self,
        question: &Question,
        answer_text: &str,
        kg: &mut KnowledgeGraph,
        dg: &DependencyGraph,
    ) -> GraphDelta {
        let noise_before = self.noise(kg, dg);

        let source = format!("answer:{}", question.subject);
        let delta = self.builder.extract_into(answer_text, &source);
        let stats = kg.merge(&delta);

        let noise_after = self.noise(kg, dg);
        debug!(
            subject = %question.subject,
            entities_added = stats.entities_added,
            noise_before,
            noise_after,
            "processed answer"
        );
        GraphDelta {
            entities_added: stats.entities_added,
            relationships_added: stats.relationships_added,
            noise_before,
            noise_after,
        }
    }

    // ------------------------------------------------------------------
    // Phase 2: evidence
    // ------------------------------------------------------------------

    /// Questions about missing or insufficient evidence: claims with no
    /// evidence at all rank high, unsatisfied requirements rank by how many
    /// claims they block.
    pub fn generate_evidence_questions(&self, dg: &DependencyGraph) -> Vec<Question> {
        let mut questions: Vec<Question> = dg
            .claims_without_evidence()
            .into_iter()
            .map(|claim| Question {
                text: format!(
                    "What documents or records do you have relating to {}?",
                    claim.name
                ),
                priority: Priority::High,
                kind: GapKind::MissingEvidence,
                subject: claim.key.clone(),
            })
            .collect();

        questions.extend(dg.find_gaps().into_iter().map(|gap| Question {
            priority: priority_for(&gap),
            text: gap.suggested_question,
            kind: gap.kind,
            subject: gap.subject,
        }));

        questions.sort_by_key(|q| q.priority);
        questions.truncate(self.max_questions);
        questions
    }

    /// Link an evidence item into the dependency graph and report the noise
    /// movement. Unknown claim keys are rejected whole, nothing half-links.
    pub fn process_evidence(
        &self,
        record: &EvidenceRecord,
        kg: &KnowledgeGraph,
        dg: &mut DependencyGraph,
    ) -> Result<GraphDelta, GraphError> {
        let noise_before = self.noise(kg, dg);
        let nodes_before = dg.node_count();
        let deps_before = dg.dependencies().len();

        let claim_keys: Vec<&str> = record.supports_claim_ids.iter().map(|s| s.as_str()).collect();
        dg.link_evidence(&record.id, &record.title, &claim_keys, record.confidence)?;

        let noise_after = self.noise(kg, dg);
        info!(
            evidence = %record.id,
            claims = claim_keys.len(),
            noise_before,
            noise_after,
            "processed evidence"
        );
        Ok(GraphDelta {
            entities_added: dg.node_count() - nodes_before,
            relationships_added: dg.dependencies().len() - deps_before,
            noise_before,
            noise_after,
        })
    }

    // ------------------------------------------------------------------
    // Phase 3: legal matching
    // ------------------------------------------------------------------

    /// Questions sourced from the matcher's unsatisfied-requirement list.
    /// Everything here blocks a claim's viability, so it all ranks high.
    pub fn generate_legal_matching_questions(&self, result: &MatchResult) -> Vec<Question> {
        // One question per element, even when it blocks several claims.
        let mut seen = std::collections::HashSet::new();
        let mut questions: Vec<Question> = result
            .unsatisfied()
            .filter(|(_, req)| seen.insert(req.element_key.clone()))
            .map(|(_, req)| Question {
                text: format!(
                    "What facts or evidence establish that {}?",
                    req.element_text.trim_end_matches('.')
                ),
                priority: Priority::High,
                kind: GapKind::UnmatchedLegalElement,
                subject: req.element_key.clone(),
            })
            .collect();

        questions.truncate(self.max_questions);
        questions
    }

    /// Fold an answer to a matching question back into the graphs: merge the
    /// re-extraction into the knowledge graph and mark the requirement node
    /// tagged with the element satisfied, at an answer-derived confidence.
    /// A blank answer changes nothing.
    pub fn process_matching_answer(
        &self,
        element_key: &str,
        answer_text: &str,
        kg: &mut KnowledgeGraph,
        dg: &mut DependencyGraph,
    ) -> GraphDelta {
        let noise_before = self.noise(kg, dg);
        if answer_text.trim().is_empty() {
            return GraphDelta {
                entities_added: 0,
                relationships_added: 0,
                noise_before,
                noise_after: noise_before,
            };
        }

        let source = format!("answer:{element_key}");
        let stats = kg.merge(&self.builder.extract_into(answer_text, &source));

        let confidence = Confidence::new(adjust_confidence(0.7, answer_text));
        let tagged: Vec<String> = dg
            .nodes()
            .filter(|(_, n)| n.legal_ref.as_deref() == Some(element_key))
            .map(|(_, n)| n.key.clone())
            .collect();
        for key in tagged {
            // Key was read out of the graph a moment ago; it cannot dangle.
            let _ = dg.mark_requirement_satisfied(&key, confidence);
        }

        let noise_after = self.noise(kg, dg);
        GraphDelta {
            entities_added: stats.entities_added,
            relationships_added: stats.relationships_added,
            noise_before,
            noise_after,
        }
    }

    // ------------------------------------------------------------------
    // Complaint synthesis
    // ------------------------------------------------------------------

    /// Deterministic template rendering of the session into prose: parties,
    /// claims with readiness, facts, evidence titles, and a completeness
    /// assessment derived from the current noise. No new inference happens
    /// here, and no internal key or id reaches the output.
    pub fn synthesize_complaint_summary(
        &self,
        kg: &KnowledgeGraph,
        dg: &DependencyGraph,
        conversation: &[QaTurn],
        evidence: &[EvidenceRecord],
    ) -> String {
        use gravamen_graph::EntityKind;
        let mut out = String::from("COMPLAINT SUMMARY\n");

        let mut section = |title: &str, lines: Vec<String>, empty_note: &str| {
            out.push_str("\n");
            out.push_str(title);
            out.push('\n');
            if lines.is_empty() {
                out.push_str("  ");
                out.push_str(empty_note);
                out.push('\n');
            }
            for line in lines {
                out.push_str("  - ");
                out.push_str(&line);
                out.push('\n');
            }
        };

        let parties: Vec<String> = kg
            .entities()
            .filter(|(_, e)| {
                matches!(e.kind, EntityKind::Person | EntityKind::Organization)
            })
            .map(|(_, e)| e.text.clone())
            .collect();
        section("Parties", parties, "No parties identified.");

        let readiness = dg.get_claim_readiness();
        let claims: Vec<String> = dg
            .claims()
            .map(|(_, c)| {
                let pct = readiness.per_claim.get(&c.key).copied().unwrap_or(0.0) * 100.0;
                format!("{} (requirements {pct:.0}% satisfied)", c.name)
            })
            .collect();
        section("Claims", claims, "No claims identified.");

        let facts: Vec<String> = kg
            .entities()
            .filter(|(_, e)| e.kind == EntityKind::Fact)
            .map(|(_, e)| e.text.clone())
            .collect();
        section("Alleged facts", facts, "No facts recorded.");

        let exhibits: Vec<String> = evidence.iter().map(|e| e.title.clone()).collect();
        section("Evidence", exhibits, "No evidence attached.");

        let noise = self.noise(kg, dg);
        out.push_str(&format!(
            "\nRecord: {} clarifying answer(s) provided during intake.\n",
            conversation.len()
        ));
        out.push_str("Completeness: ");
        out.push_str(completeness_assessment(noise));
        out.push('\n');
        out
    }
}

impl Default for Denoiser {
    fn default() -> Self {
        Self::new()
    }
}

fn priority_for(gap: &Gap) -> Priority {
    match gap.kind {
        GapKind::IsolatedEntity | GapKind::UnsupportedClaim => Priority::High,
        GapKind::UnsatisfiedRequirement if gap.blocked_claims >= 2 => Priority::High,
        GapKind::UnsatisfiedRequirement | GapKind::LowConfidence => Priority::Medium,
        GapKind::MissingEvidence | GapKind::UnmatchedLegalElement => Priority::High,
    }
}

fn completeness_assessment(noise: f64) -> &'static str {
    if noise < 0.1 {
        "the record is substantially complete."
    } else if noise < 0.3 {
        "the record is largely complete; minor clarifications may strengthen it."
    } else {
        "the record is materially incomplete; further intake is recommended."
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gravamen_graph::{Entity, EntityKind};

    #[test]
    fn empty_graphs_yield_zero_noise() {
        let d = Denoiser::new();
        assert_relative_eq!(
            d.noise(&KnowledgeGraph::new(), &DependencyGraph::new()),
            0.0
        );
    }

    #[test]
    fn noise_stays_in_unit_interval_under_heavy_gaps() {
        let d = Denoiser::new();
        let mut kg = KnowledgeGraph::new();
        // Many low-confidence isolated entities: every one contributes two
        // gaps, pushing the raw gap ratio past 1 before clamping.
        for i in 0..10 {
            kg.upsert_entity(Entity::new(
                &format!("fact:f{i}"),
                EntityKind::Fact,
                "something vague",
                0.1,
            ));
        }
        let noise = d.noise(&kg, &DependencyGraph::new());
        assert!(noise > 0.0 && noise <= 1.0, "noise {noise} out of range");
    }

    #[test]
    fn convergence_requires_full_window() {
        let cfg = ConvergenceConfig::default();
        assert!(!cfg.converged(&[0.5, 0.5, 0.5, 0.5]));
        assert!(cfg.converged(&[0.5, 0.5, 0.5, 0.5, 0.5]));
        assert!(!cfg.converged(&[0.9, 0.5, 0.5, 0.5, 0.5]));
        // Only the trailing window counts.
        assert!(cfg.converged(&[0.9, 0.5, 0.5, 0.5, 0.5, 0.5]));
    }

    #[test]
    fn questions_rank_high_before_medium() {
        let d = Denoiser::new();
        let mut kg = KnowledgeGraph::new();
        // Low-confidence but connected pair, plus an isolated claim.
        let a = kg.upsert_entity(Entity::new("person:a", EntityKind::Person, "A", 0.4));
        let b = kg.upsert_entity(Entity::new(
            "org:b",
            EntityKind::Organization,
            "B Corp",
            0.9,
        ));
        kg.add_relationship(
            a,
            b,
            gravamen_graph::RelationKind::EmployedBy,
            Confidence::new(0.9),
        )
        .unwrap();
        kg.upsert_entity(Entity::new(
            "claim:retaliation",
            EntityKind::Claim,
            "retaliation",
            0.8,
        ));

        let questions = d.generate_questions(&kg, &DependencyGraph::new());
        assert!(!questions.is_empty());
        assert_eq!(questions[0].priority, Priority::High);
        for pair in questions.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
        }
    }

    #[test]
    fn question_list_truncates() {
        let d = Denoiser::new().with_max_questions(2);
        let mut kg = KnowledgeGraph::new();
        for i in 0..6 {
            kg.upsert_entity(Entity::new(
                &format!("fact:f{i}"),
                EntityKind::Fact,
                "vague",
                0.2,
            ));
        }
        assert_eq!(d.generate_questions(&kg, &DependencyGraph::new()).len(), 2);
    }

    #[test]
    fn summary_never_leaks_keys() {
        let d = Denoiser::new();
        let mut kg = KnowledgeGraph::new();
        kg.upsert_entity(Entity::new("person:john", EntityKind::Person, "John", 0.9));
        kg.upsert_entity(Entity::new(
            "org:acme",
            EntityKind::Organization,
            "Acme Corp",
            0.9,
        ));

        let summary = d.synthesize_complaint_summary(&kg, &DependencyGraph::new(), &[], &[]);
        assert!(summary.contains("John"));
        assert!(summary.contains("Acme Corp"));
        assert!(!summary.contains("person:john"));
        assert!(!summary.contains("org:acme"));
    }

    #[test]
    fn summary_is_deterministic() {
        let d = Denoiser::new();
        let mut kg = KnowledgeGraph::new();
        kg.upsert_entity(Entity::new("person:john", EntityKind::Person, "John", 0.9));
        let a = d.synthesize_complaint_summary(&kg, &DependencyGraph::new(), &[], &[]);
        let b = d.synthesize_complaint_summary(&kg, &DependencyGraph::new(), &[], &[]);
        assert_eq!(a, b);
    }
}
