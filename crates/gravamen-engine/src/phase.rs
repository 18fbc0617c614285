//! The three-phase state machine.
//!
//! Intake → Evidence → Formalization, forward-only. Each phase has an
//! explicit, re-checkable completion predicate; `advance_phase` returns a
//! `NotReady` result listing the unmet criteria instead of ever panicking,
//! so the caller can display remaining work.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::denoise::ConvergenceConfig;
use crate::session::SessionContext;

/// Intake completes only once the combined gap count is at or below this.
const INTAKE_MAX_GAPS: usize = 3;

/// Evidence completes only once the unsatisfied-requirement ratio is below
/// this.
const EVIDENCE_MAX_GAP_RATIO: f32 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    Evidence,
    Formalization,
}

impl Phase {
    fn next(self) -> Option<Phase> {
        match self {
            Phase::Intake => Some(Phase::Evidence),
            Phase::Evidence => Some(Phase::Formalization),
            Phase::Formalization => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Intake => "intake",
            Phase::Evidence => "evidence",
            Phase::Formalization => "formalization",
        }
    }
}

/// What the caller should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    AskQuestion,
    GatherEvidence,
    RunMatching,
    GenerateComplaint,
    PhaseComplete,
}

/// Result of an advance attempt. Premature advance is a value, not a panic.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    Advanced(Phase),
    NotReady { missing: Vec<String> },
}

/// The manager's whole mutable state, shaped for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseState {
    pub phase: Phase,
    pub iteration_count: u64,
    pub loss_history: Vec<f64>,
    /// Per-phase scratch recorded at each transition.
    pub phase_data: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

impl PhaseState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Intake,
            iteration_count: 0,
            loss_history: Vec::new(),
            phase_data: BTreeMap::new(),
        }
    }
}

impl Default for PhaseState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PhaseManager
// ============================================================================

/// Owns the [`PhaseState`] exclusively; the state mutates only through
/// [`PhaseManager::record_iteration`] and [`PhaseManager::advance_phase`].
pub struct PhaseManager {
    state: PhaseState,
    convergence: ConvergenceConfig,
}

impl PhaseManager {
    pub fn new() -> Self {
        Self {
            state: PhaseState::new(),
            convergence: ConvergenceConfig::default(),
        }
    }

    /// Resume from a restored snapshot.
    pub fn from_state(state: PhaseState) -> Self {
        Self {
            state,
            convergence: ConvergenceConfig::default(),
        }
    }

    pub fn with_convergence(mut self, convergence: ConvergenceConfig) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn state(&self) -> &PhaseState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Append a noise sample unconditionally (no dedup; a repeated value is
    /// exactly what convergence detection needs to see).
    pub fn record_iteration(&mut self, noise: f64) {
        self.state.loss_history.push(noise);
        self.state.iteration_count += 1;
        debug!(
            phase = self.state.phase.name(),
            iteration = self.state.iteration_count,
            noise,
            "recorded iteration"
        );
    }

    pub fn is_phase_complete(&self, ctx: &SessionContext) -> bool {
        self.missing_for_phase(ctx).is_empty()
    }

    /// The current phase's unmet completion criteria, in a fixed order.
    pub fn missing_for_phase(&self, ctx: &SessionContext) -> Vec<String> {
        let mut missing = Vec::new();
        match self.state.phase {
            Phase::Intake => {
                if ctx.knowledge.is_empty() {
                    missing.push("no entities have been extracted yet".to_string());
                }
                if ctx.dependencies.is_empty() {
                    missing.push("no claims have been identified yet".to_string());
                }
                let gaps = ctx.knowledge.find_gaps().len() + ctx.dependencies.find_gaps().len();
                if gaps > INTAKE_MAX_GAPS {
                    missing.push(format!(
                        "{gaps} open gaps remain (at most {INTAKE_MAX_GAPS} allowed)"
                    ));
                }
                if !self.convergence.converged(&self.state.loss_history) {
                    missing.push("the noise metric has not converged".to_string());
                }
            }
            Phase::Evidence => {
                if ctx.evidence.is_empty() {
                    missing.push("no evidence has been linked".to_string());
                }
                let gap_ratio = ctx
                    .dependencies
                    .satisfaction_ratio()
                    .map(|r| 1.0 - r)
                    .unwrap_or(0.0);
                if gap_ratio >= EVIDENCE_MAX_GAP_RATIO {
                    missing.push(format!(
                        "{:.0}% of requirements lack evidence (must be below {:.0}%)",
                        gap_ratio * 100.0,
                        EVIDENCE_MAX_GAP_RATIO * 100.0
                    ));
                }
            }
            Phase::Formalization => {
                if ctx.legal.is_none() {
                    missing.push("the legal requirement graph has not been built".to_string());
                }
                if ctx.match_result.is_none() {
                    missing.push("claims have not been matched against the law".to_string());
                }
                if ctx.complaint.is_none() {
                    missing.push("the complaint artifact has not been generated".to_string());
                }
            }
        }
        missing
    }

    /// Move to the next phase if the current predicate holds. Transitions are
    /// one-directional; formalization is terminal.
    pub fn advance_phase(&mut self, ctx: &SessionContext) -> AdvanceOutcome {
        let missing = self.missing_for_phase(ctx);
        if !missing.is_empty() {
            debug!(
                phase = self.state.phase.name(),
                unmet = missing.len(),
                "advance refused"
            );
            return AdvanceOutcome::NotReady { missing };
        }

        let Some(next) = self.state.phase.next() else {
            return AdvanceOutcome::NotReady {
                missing: vec!["formalization is the final phase".to_string()],
            };
        };

        // Stash the finished phase's trajectory before starting fresh.
        let mut data = BTreeMap::new();
        data.insert(
            "iterations".to_string(),
            json!(self.state.loss_history.len()),
        );
        data.insert("loss_history".to_string(), json!(self.state.loss_history));
        if let Some(&last) = self.state.loss_history.last() {
            data.insert("final_noise".to_string(), json!(last));
        }
        self.state
            .phase_data
            .insert(self.state.phase.name().to_string(), data);

        info!(
            from = self.state.phase.name(),
            to = next.name(),
            "phase transition"
        );
        self.state.phase = next;
        self.state.loss_history.clear();
        AdvanceOutcome::Advanced(next)
    }

    /// What the caller should do next, from phase plus completion state.
    pub fn get_next_action(&self, ctx: &SessionContext) -> NextAction {
        if self.is_phase_complete(ctx) {
            return NextAction::PhaseComplete;
        }
        match self.state.phase {
            Phase::Intake => NextAction::AskQuestion,
            Phase::Evidence => NextAction::GatherEvidence,
            Phase::Formalization => {
                if ctx.legal.is_none() || ctx.match_result.is_none() {
                    NextAction::RunMatching
                } else {
                    NextAction::GenerateComplaint
                }
            }
        }
    }

    /// Convenience predicate over the manager's own history.
    pub fn has_converged(&self) -> bool {
        self.convergence.converged(&self.state.loss_history)
    }
}

impl Default for PhaseManager {
    fn default() -> Self {
        Self::new()
    }
}
