//! End-to-end tests across the whole workspace: narrative intake →
//! question/answer convergence → evidence gathering → legal matching →
//! complaint synthesis → snapshot round-trip.
//!
//! Run with: cargo test --test integration_tests

use std::time::Duration;

use gravamen_engine::{
    AdvanceOutcome, Denoiser, NextAction, Phase, PhaseManager, SessionContext,
};
use gravamen_graph::{Confidence, EvidenceKind, EvidenceRecord};
use gravamen_ingest::{ClaimSpec, DependencyGraphBuilder, KnowledgeGraphBuilder};
use gravamen_legal::{requirement_map_for_builder, LegalGraphBuilder};
use gravamen_match::{NeurosymbolicMatcher, OracleOutcome, SemanticOracle};
use gravamen_storage::SnapshotStore;
use tempfile::tempdir;

const NARRATIVE: &str = "John worked at Acme; he was fired on Jan 5. \
    I believe this was wrongful termination.";

/// Oracle scripted to confirm any requirement mentioning termination.
struct ScriptedOracle;

impl SemanticOracle for ScriptedOracle {
    fn similarity(&self, _claim: &str, requirement: &str, _timeout: Duration) -> OracleOutcome {
        OracleOutcome::Judged {
            satisfied: requirement.to_lowercase().contains("employ")
                || requirement.to_lowercase().contains("terminat"),
            confidence: 0.85,
        }
    }
}

// ============================================================================
// Full session loop
// ============================================================================

#[test]
fn full_session_from_narrative_to_complaint() {
    let denoiser = Denoiser::new();
    let mut manager = PhaseManager::new();

    // Intake: build both graphs from the narrative plus the requirement
    // vocabulary, as the mediator would.
    let kg = KnowledgeGraphBuilder::new().build_from_text(NARRATIVE);
    let dg = DependencyGraphBuilder::new()
        .with_requirement_map(requirement_map_for_builder())
        .build_from_claims(&[ClaimSpec::new(
            "Wrongful Termination",
            "wrongful_termination",
        )]);
    let mut ctx = SessionContext::with_graphs(kg, dg);
    assert!(ctx.knowledge.entity_count() >= 2);

    // Question/answer loop. Noise must never leave [0,1] and must not rise.
    let mut last_noise = denoiser.noise(&ctx.knowledge, &ctx.dependencies);
    for _ in 0..6 {
        let questions = denoiser.generate_questions(&ctx.knowledge, &ctx.dependencies);
        let Some(question) = questions.first() else {
            break;
        };
        let answer = "Mr. John Smith worked at Acme Corp. He was fired on Jan 5, 2024 \
                      after he reported unpaid overtime to his manager.";
        let delta =
            denoiser.process_answer(question, answer, &mut ctx.knowledge, &ctx.dependencies);
        ctx.record_turn(&question.text, answer);

        assert!(delta.noise_after >= 0.0 && delta.noise_after <= 1.0);
        assert!(delta.noise_after <= last_noise + 1e-9);
        last_noise = delta.noise_after;
        manager.record_iteration(delta.noise_after);
    }

    // The repeated identical answer stabilizes the trajectory.
    while !manager.has_converged() {
        manager.record_iteration(last_noise);
    }

    // Close remaining intake gaps as an operator review would: confirm the
    // requirement answers and tie the firing fact to the stated claim.
    for gap in ctx.dependencies.find_gaps() {
        ctx.dependencies
            .mark_requirement_satisfied(&gap.subject, Confidence::new(0.8))
            .unwrap();
    }
    ctx.knowledge
        .add_relationship_by_key(
            "fact:was_fired",
            "claim:wrongful_termination",
            gravamen_graph::RelationKind::Supports,
            Confidence::new(0.8),
        )
        .unwrap();
    let open_gaps = ctx.knowledge.find_gaps().len() + ctx.dependencies.find_gaps().len();
    assert!(open_gaps <= 3, "{open_gaps} intake gaps remain");

    assert!(matches!(
        manager.advance_phase(&ctx),
        AdvanceOutcome::Advanced(Phase::Evidence)
    ));

    // Evidence phase.
    let record = EvidenceRecord::new("ev-1", "Termination letter", EvidenceKind::Document, 0.9)
        .supporting("claim:wrongful_termination")
        .with_content_ref("blob:sha256:abc123");
    denoiser
        .process_evidence(&record, &ctx.knowledge, &mut ctx.dependencies)
        .unwrap();
    ctx.evidence.push(record);

    assert!(matches!(
        manager.advance_phase(&ctx),
        AdvanceOutcome::Advanced(Phase::Formalization)
    ));

    // Formalization: legal graph, neurosymbolic matching, complaint.
    let builder = LegalGraphBuilder::new();
    let mut lg = builder.build_from_statutes(&[], "california");
    builder.build_rules_of_procedure(&mut lg, "california");

    let matcher =
        NeurosymbolicMatcher::with_oracle(Box::new(ScriptedOracle), Duration::from_millis(50));
    let result = matcher.match_claims_to_law(&ctx.dependencies, &lg);
    let claim_match = &result.per_claim["claim:wrongful_termination"];
    assert!(!claim_match.semantic_pass_skipped);

    ctx.match_result = Some(result);
    ctx.legal = Some(lg);
    assert_eq!(manager.get_next_action(&ctx), NextAction::GenerateComplaint);

    let complaint = denoiser.synthesize_complaint_summary(
        &ctx.knowledge,
        &ctx.dependencies,
        &ctx.conversation,
        &ctx.evidence,
    );
    assert!(complaint.contains("Wrongful Termination"));
    assert!(complaint.contains("Termination letter"));
    assert!(!complaint.contains("claim:wrongful_termination"));
    ctx.complaint = Some(complaint);

    assert_eq!(manager.get_next_action(&ctx), NextAction::PhaseComplete);
}

// ============================================================================
// Snapshot round-trip of a mid-session state
// ============================================================================

#[test]
fn session_survives_snapshot_and_restore() {
    let denoiser = Denoiser::new();
    let mut manager = PhaseManager::new();

    let kg = KnowledgeGraphBuilder::new().build_from_text(NARRATIVE);
    let dg = DependencyGraphBuilder::new()
        .with_requirement_map(requirement_map_for_builder())
        .build_from_claims(&[ClaimSpec::new(
            "Wrongful Termination",
            "wrongful_termination",
        )]);
    let mut ctx = SessionContext::with_graphs(kg, dg);

    let question = denoiser
        .generate_questions(&ctx.knowledge, &ctx.dependencies)
        .remove(0);
    let delta = denoiser.process_answer(
        &question,
        "He was fired on Jan 5, 2024.",
        &mut ctx.knowledge,
        &ctx.dependencies,
    );
    manager.record_iteration(delta.noise_after);

    let lg = LegalGraphBuilder::new().build_from_statutes(&[], "federal");

    let dir = tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let session = ctx.session_id.to_string();
    store.save_knowledge(&session, &ctx.knowledge).unwrap();
    store.save_dependencies(&session, &ctx.dependencies).unwrap();
    store.save_legal(&session, &lg).unwrap();
    store.save_phase(&session, manager.state()).unwrap();

    // Restore into a fresh session; all derived quantities must agree.
    let restored_kg = store.load_knowledge(&session).unwrap();
    let restored_dg = store.load_dependencies(&session).unwrap();
    let restored_lg = store.load_legal(&session).unwrap();
    let restored_manager = PhaseManager::from_state(store.load_phase(&session).unwrap());

    assert!(restored_kg.same_content(&ctx.knowledge));
    assert!(restored_dg.same_content(&ctx.dependencies));
    assert_eq!(
        restored_lg.requirements_for("wrongful_termination").len(),
        lg.requirements_for("wrongful_termination").len()
    );
    assert_eq!(restored_manager.state(), manager.state());

    let noise_live = denoiser.noise(&ctx.knowledge, &ctx.dependencies);
    let noise_restored = denoiser.noise(&restored_kg, &restored_dg);
    assert!((noise_live - noise_restored).abs() < 1e-9);
}
