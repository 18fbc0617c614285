//! Denoiser behavior over graphs built from real narrative text.

use approx::assert_relative_eq;
use gravamen_engine::{ConvergenceConfig, Denoiser, Priority};
use gravamen_graph::{DependencyGraph, EvidenceKind, EvidenceRecord, KnowledgeGraph};
use gravamen_ingest::{ClaimSpec, DependencyGraphBuilder, KnowledgeGraphBuilder};

const NARRATIVE: &str = "John worked at Acme; he was fired on Jan 5. \
    I believe this was wrongful termination.";

fn intake_graphs() -> (KnowledgeGraph, DependencyGraph) {
    let kg = KnowledgeGraphBuilder::new().build_from_text(NARRATIVE);
    let mut builder = DependencyGraphBuilder::new();
    builder.add_requirements(
        "wrongful_termination",
        &["an employment relationship existed", "an adverse action occurred"],
    );
    let dg = builder.build_from_claims(&[ClaimSpec::new(
        "Wrongful Termination",
        "wrongful_termination",
    )]);
    (kg, dg)
}

#[test]
fn noise_is_bounded_and_nonzero_for_raw_intake() {
    let denoiser = Denoiser::new();
    let (kg, dg) = intake_graphs();
    let noise = denoiser.noise(&kg, &dg);
    assert!(noise > 0.0, "raw intake should carry uncertainty");
    assert!(noise <= 1.0);
}

#[test]
fn answers_reduce_or_hold_noise() {
    let denoiser = Denoiser::new();
    let (mut kg, dg) = intake_graphs();

    let questions = denoiser.generate_questions(&kg, &dg);
    let question = questions.first().expect("raw intake yields questions");

    let delta = denoiser.process_answer(
        question,
        "John Smith was fired by Acme Corporation on 2024-01-05 after he reported unpaid overtime.",
        &mut kg,
        &dg,
    );
    assert!(delta.noise_after <= delta.noise_before + 1e-9);
}

#[test]
fn repeated_answer_leaves_noise_unchanged() {
    // Same answer twice: the merge is idempotent, so the second pass is a
    // no-op on the noise.
    let denoiser = Denoiser::new();
    let (mut kg, dg) = intake_graphs();
    let question = denoiser.generate_questions(&kg, &dg).remove(0);
    let answer = "John Smith was fired by Acme Corporation on 2024-01-05.";

    let first = denoiser.process_answer(&question, answer, &mut kg, &dg);
    let second = denoiser.process_answer(&question, answer, &mut kg, &dg);

    assert_eq!(second.entities_added, 0);
    assert_eq!(second.relationships_added, 0);
    assert_relative_eq!(second.noise_after, first.noise_after);
    assert_relative_eq!(second.noise_before, second.noise_after);
}

#[test]
fn evidence_processing_moves_satisfaction() {
    let denoiser = Denoiser::new();
    let (kg, mut dg) = intake_graphs();
    let before = denoiser.noise(&kg, &dg);

    let record = EvidenceRecord::new(
        "ev-1",
        "Termination letter",
        EvidenceKind::Document,
        0.9,
    )
    .supporting("claim:wrongful_termination");
    let delta = denoiser.process_evidence(&record, &kg, &mut dg).unwrap();

    assert!(delta.entities_added >= 1);
    assert!(delta.noise_after < before);
    assert_eq!(dg.satisfaction_ratio(), Some(1.0));
}

#[test]
fn evidence_against_unknown_claim_is_rejected() {
    let denoiser = Denoiser::new();
    let (kg, mut dg) = intake_graphs();
    let record = EvidenceRecord::new("ev-9", "Stray file", EvidenceKind::Other, 0.9)
        .supporting("claim:not_a_claim");
    assert!(denoiser.process_evidence(&record, &kg, &mut dg).is_err());
}

#[test]
fn evidence_questions_cover_unevidenced_claims() {
    let denoiser = Denoiser::new();
    let (_, dg) = intake_graphs();
    let questions = denoiser.generate_evidence_questions(&dg);
    assert!(questions
        .iter()
        .any(|q| q.subject == "claim:wrongful_termination" && q.priority == Priority::High));
}

#[test]
fn matching_answer_satisfies_tagged_requirement() {
    let denoiser = Denoiser::new();
    let (mut kg, mut dg) = intake_graphs();
    dg.set_legal_ref("req:an_adverse_action_occurred", "req:adverse_action")
        .unwrap();

    let delta = denoiser.process_matching_answer(
        "req:adverse_action",
        "The termination letter dated 2024-01-05 documents the firing.",
        &mut kg,
        &mut dg,
    );
    assert!(delta.noise_after <= delta.noise_before);
    assert!(
        dg.node_by_key("req:an_adverse_action_occurred")
            .unwrap()
            .1
            .satisfied
    );
}

#[test]
fn blank_matching_answer_is_a_no_op() {
    let denoiser = Denoiser::new();
    let (mut kg, mut dg) = intake_graphs();
    let delta = denoiser.process_matching_answer("req:anything", "   ", &mut kg, &mut dg);
    assert_eq!(delta.entities_added, 0);
    assert_relative_eq!(delta.noise_before, delta.noise_after);
}

#[test]
fn custom_convergence_window_is_respected() {
    let denoiser = Denoiser::new().with_convergence(ConvergenceConfig {
        window: 3,
        epsilon: 0.05,
    });
    assert!(!denoiser.has_converged(&[0.2, 0.2]));
    assert!(denoiser.has_converged(&[0.2, 0.21, 0.2]));
    assert!(!denoiser.has_converged(&[0.2, 0.3, 0.2]));
}

#[test]
fn summary_folds_in_conversation_and_evidence() {
    use gravamen_engine::QaTurn;

    let denoiser = Denoiser::new();
    let (kg, dg) = intake_graphs();
    let turns = vec![QaTurn::new("When were you fired?", "On January 5th, 2024.")];
    let evidence = vec![EvidenceRecord::new(
        "ev-1",
        "Termination letter",
        EvidenceKind::Document,
        0.9,
    )];

    let summary = denoiser.synthesize_complaint_summary(&kg, &dg, &turns, &evidence);
    assert!(summary.contains("Wrongful Termination"));
    assert!(summary.contains("Termination letter"));
    assert!(summary.contains("1 clarifying answer"));
    assert!(summary.contains("Completeness:"));
}
