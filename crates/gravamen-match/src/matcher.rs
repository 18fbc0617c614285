//! The matcher itself.

use std::collections::BTreeMap;
use std::time::Duration;

use gravamen_graph::{Confidence, DependencyGraph, DependencyKind, NodeId, NodeKind};
use gravamen_legal::LegalGraph;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::oracle::{OracleOutcome, SemanticOracle};
use crate::{SEMANTIC_CONFIDENCE, SYMBOLIC_CONFIDENCE, VIABILITY_FLOOR};

/// How a requirement match was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Symbolic,
    Semantic,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementMatch {
    pub element_key: String,
    pub element_text: String,
    pub satisfied: bool,
    pub confidence: Confidence,
    pub method: MatchMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimMatch {
    pub claim_key: String,
    pub claim_type: Option<String>,
    pub satisfied_requirements: Vec<RequirementMatch>,
    pub unsatisfied_requirements: Vec<RequirementMatch>,
    /// Weakest-link confidence over all requirement matches; 0.0 when the
    /// claim has no requirement checklist at all.
    pub confidence: Confidence,
    /// True when at least one requirement needed the semantic pass and the
    /// oracle was absent or unavailable.
    pub semantic_pass_skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub per_claim: BTreeMap<String, ClaimMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimViability {
    pub viable: bool,
    pub missing_requirements: Vec<String>,
    pub confidence: Confidence,
}

impl MatchResult {
    /// Viability is weakest-link: a single unmet requirement is never masked
    /// by many met ones. `None` when the claim key is unknown.
    pub fn assess_claim_viability(&self, claim_key: &str) -> Option<ClaimViability> {
        let claim = self.per_claim.get(claim_key)?;
        let has_checklist =
            !claim.satisfied_requirements.is_empty() || !claim.unsatisfied_requirements.is_empty();
        let viable = has_checklist
            && claim.unsatisfied_requirements.is_empty()
            && claim.confidence.value() > VIABILITY_FLOOR;
        Some(ClaimViability {
            viable,
            missing_requirements: claim
                .unsatisfied_requirements
                .iter()
                .map(|r| r.element_text.clone())
                .collect(),
            confidence: claim.confidence,
        })
    }

    /// All still-unsatisfied requirement matches, for question generation.
    pub fn unsatisfied(&self) -> impl Iterator<Item = (&str, &RequirementMatch)> {
        self.per_claim.values().flat_map(|claim| {
            claim
                .unsatisfied_requirements
                .iter()
                .map(move |r| (claim.claim_key.as_str(), r))
        })
    }
}

// ============================================================================
// Matcher
// ============================================================================

pub struct NeurosymbolicMatcher {
    oracle: Option<Box<dyn SemanticOracle>>,
    oracle_timeout: Duration,
}

impl NeurosymbolicMatcher {
    /// Symbolic-only matcher; every unresolved requirement flags the skipped
    /// semantic pass.
    pub fn new() -> Self {
        Self {
            oracle: None,
            oracle_timeout: Duration::from_millis(0),
        }
    }

    pub fn with_oracle(oracle: Box<dyn SemanticOracle>, timeout: Duration) -> Self {
        Self {
            oracle: Some(oracle),
            oracle_timeout: timeout,
        }
    }

    /// Reconcile each claim's requirement checklist against the dependency
    /// graph. Never fails: oracle trouble degrades to symbolic-only results.
    pub fn match_claims_to_law(&self, dg: &DependencyGraph, lg: &LegalGraph) -> MatchResult {
        let mut per_claim = BTreeMap::new();

        for (claim_id, claim) in dg.claims() {
            let checklist = claim
                .claim_type
                .as_deref()
                .map(|t| lg.requirements_for(t))
                .unwrap_or(&[]);

            let mut satisfied = Vec::new();
            let mut unsatisfied = Vec::new();
            let mut skipped = false;
            let mut support_text: Option<String> = None;

            for &element_id in checklist {
                let Some(element) = lg.element(element_id) else {
                    continue;
                };

                // Symbolic pass: an already-satisfied requirement node tagged
                // with this element's id settles the question.
                if self.symbolically_satisfied(dg, claim_id, &element.key) {
                    satisfied.push(RequirementMatch {
                        element_key: element.key.clone(),
                        element_text: element.text.clone(),
                        satisfied: true,
                        confidence: Confidence::new(SYMBOLIC_CONFIDENCE),
                        method: MatchMethod::Symbolic,
                    });
                    continue;
                }

                // Semantic pass, only for still-open requirements and only
                // when an oracle is wired up.
                let outcome = match &self.oracle {
                    Some(oracle) => {
                        let text = support_text
                            .get_or_insert_with(|| claim_support_text(dg, claim_id))
                            .clone();
                        oracle.similarity(&text, &element.text, self.oracle_timeout)
                    }
                    None => OracleOutcome::Unavailable,
                };

                match outcome {
                    OracleOutcome::Judged {
                        satisfied: true, ..
                    } => {
                        satisfied.push(RequirementMatch {
                            element_key: element.key.clone(),
                            element_text: element.text.clone(),
                            satisfied: true,
                            confidence: Confidence::new(SEMANTIC_CONFIDENCE),
                            method: MatchMethod::Semantic,
                        });
                    }
                    OracleOutcome::Judged {
                        satisfied: false, ..
                    } => {
                        unsatisfied.push(unresolved(element));
                    }
                    OracleOutcome::Unavailable => {
                        if self.oracle.is_some() {
                            warn!(
                                claim = %claim.key,
                                element = %element.key,
                                "semantic oracle unavailable, degrading to symbolic-only"
                            );
                        }
                        skipped = true;
                        unsatisfied.push(unresolved(element));
                    }
                }
            }

            let confidence = satisfied
                .iter()
                .chain(unsatisfied.iter())
                .map(|r| r.confidence)
                .fold(None::<Confidence>, |acc, c| {
                    Some(match acc {
                        Some(a) if a <= c => a,
                        Some(_) | None => c,
                    })
                })
                .unwrap_or(Confidence::ZERO);

            debug!(
                claim = %claim.key,
                satisfied = satisfied.len(),
                unsatisfied = unsatisfied.len(),
                skipped,
                "matched claim against legal checklist"
            );

            per_claim.insert(
                claim.key.clone(),
                ClaimMatch {
                    claim_key: claim.key.clone(),
                    claim_type: claim.claim_type.clone(),
                    satisfied_requirements: satisfied,
                    unsatisfied_requirements: unsatisfied,
                    confidence,
                    semantic_pass_skipped: skipped,
                },
            );
        }

        MatchResult { per_claim }
    }

    fn symbolically_satisfied(
        &self,
        dg: &DependencyGraph,
        claim_id: NodeId,
        element_key: &str,
    ) -> bool {
        dg.requirements_of(claim_id).iter().any(|&req_id| {
            dg.node(req_id)
                .map(|n| n.satisfied && n.legal_ref.as_deref() == Some(element_key))
                .unwrap_or(false)
        })
    }
}

impl Default for NeurosymbolicMatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn unresolved(element: &gravamen_legal::LegalElement) -> RequirementMatch {
    RequirementMatch {
        element_key: element.key.clone(),
        element_text: element.text.clone(),
        satisfied: false,
        confidence: Confidence::ZERO,
        method: MatchMethod::Unresolved,
    }
}

/// Concatenated text of the claim plus every fact/evidence node supporting
/// it, fed to the semantic oracle.
fn claim_support_text(dg: &DependencyGraph, claim_id: NodeId) -> String {
    let mut parts = Vec::new();
    if let Some(claim) = dg.node(claim_id) {
        parts.push(claim.name.clone());
    }
    for dep in dg.dependencies() {
        if dep.kind == DependencyKind::Supports && dep.target == claim_id {
            if let Some(node) = dg.node(dep.source) {
                if matches!(node.kind, NodeKind::Fact | NodeKind::Evidence) {
                    parts.push(node.name.clone());
                }
            }
        }
    }
    parts.join(". ")
}
