//! Builds the legal graph from statute text and the requirement vocabulary.

use gravamen_ingest::slugify;
use regex::Regex;
use tracing::debug;

use crate::vocabulary::requirement_vocabulary;
use crate::{ElementKind, LegalElement, LegalGraph, LegalRelationKind};

/// Triggers that associate a statute with a claim type when its text
/// mentions the claim's subject matter.
fn claim_type_triggers() -> Vec<(&'static str, Regex)> {
    vec![
        (
            "employment_discrimination",
            Regex::new(r"(?i)discriminat").unwrap(),
        ),
        (
            "wrongful_termination",
            Regex::new(r"(?i)discharge|terminat").unwrap(),
        ),
        ("retaliation", Regex::new(r"(?i)retaliat").unwrap()),
        (
            "wage_theft",
            Regex::new(r"(?i)wages?|compensation|overtime").unwrap(),
        ),
        ("harassment", Regex::new(r"(?i)harass").unwrap()),
        ("breach_of_contract", Regex::new(r"(?i)contract").unwrap()),
    ]
}

pub struct LegalGraphBuilder {
    citation: Regex,
    mandate: Regex,
    triggers: Vec<(&'static str, Regex)>,
}

impl LegalGraphBuilder {
    pub fn new() -> Self {
        Self {
            // "42 U.S.C. § 2000e-2", "29 C.F.R. § 1604.11", bare "§ 12940(a)"
            citation: Regex::new(
                r"\d+\s+(?:U\.S\.C\.|C\.F\.R\.)\s*§+\s*[\w().-]+|§+\s*[\w().-]+",
            )
            .unwrap(),
            mandate: Regex::new(r"(?i)\b(?:must|shall|may\s+not|is\s+required\s+to)\b").unwrap(),
            triggers: claim_type_triggers(),
        }
    }

    /// Extract legal elements from statute texts and key the requirement
    /// checklists by claim type.
    ///
    /// The built-in requirement vocabulary seeds a checklist per known claim
    /// type; each statute contributes a `Statute` element plus a
    /// `Requirement` element per mandate sentence, appended to the checklist
    /// of every claim type whose subject matter the statute mentions. Empty
    /// input yields a graph with only the vocabulary checklists.
    pub fn build_from_statutes(&self, statute_texts: &[&str], jurisdiction: &str) -> LegalGraph {
        let mut lg = LegalGraph::new(jurisdiction);

        for (claim_type, requirements) in requirement_vocabulary() {
            let ids: Vec<_> = requirements
                .iter()
                .map(|text| {
                    lg.upsert_element(LegalElement::new(
                        &format!("req:{}", slugify(text)),
                        ElementKind::Requirement,
                        text,
                        jurisdiction,
                    ))
                })
                .collect();
            lg.register_checklist(claim_type, ids);
        }

        for text in statute_texts {
            if text.trim().is_empty() {
                continue;
            }
            let citation = self
                .citation
                .find(text)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let statute_key = if citation.is_empty() {
                format!("statute:{}", slugify(&head_words(text, 6)))
            } else {
                format!("statute:{}", slugify(&citation))
            };
            let statute = lg.upsert_element(
                LegalElement::new(&statute_key, ElementKind::Statute, text.trim(), jurisdiction)
                    .with_citation(&citation),
            );

            let mut derived = Vec::new();
            for sentence in text.split(['.', ';', '\n']) {
                let sentence = sentence.trim();
                if sentence.is_empty() || !self.mandate.is_match(sentence) {
                    continue;
                }
                let req = lg.upsert_element(
                    LegalElement::new(
                        &format!("req:{}", slugify(&head_words(sentence, 8))),
                        ElementKind::Requirement,
                        sentence,
                        jurisdiction,
                    )
                    .with_citation(&citation),
                );
                // Cannot dangle; both ids were just minted here.
                let _ = lg.add_relation(req, statute, LegalRelationKind::DerivedFrom);
                derived.push(req);
            }

            for (claim_type, trigger) in &self.triggers {
                if trigger.is_match(text) && !derived.is_empty() {
                    lg.register_checklist(claim_type, derived.clone());
                }
            }
        }

        debug!(
            elements = lg.element_count(),
            jurisdiction, "built legal graph from statutes"
        );
        lg
    }

    /// Add procedural rules (filing deadlines, exhaustion, exhibits)
    /// independent of claim type.
    pub fn build_rules_of_procedure(&self, lg: &mut LegalGraph, jurisdiction: &str) {
        let deadline_days = filing_deadline_days(jurisdiction);
        let rules = [
            (
                "rule:filing_deadline",
                format!(
                    "A charge must be filed within {deadline_days} days of the last adverse action"
                ),
            ),
            (
                "rule:administrative_exhaustion",
                "Administrative remedies must be exhausted before filing suit".to_string(),
            ),
            (
                "rule:required_exhibits",
                "Documentary evidence relied on must be attached as exhibits".to_string(),
            ),
            (
                "rule:verification",
                "The complaint must be signed and verified by the complainant".to_string(),
            ),
        ];

        for (key, text) in rules {
            lg.upsert_element(LegalElement::new(
                key,
                ElementKind::ProceduralRule,
                &text,
                jurisdiction,
            ));
        }
    }
}

impl Default for LegalGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Charge-filing window. Deferral jurisdictions (those with their own fair
/// employment agency) get the longer federal window.
fn filing_deadline_days(jurisdiction: &str) -> u32 {
    let deferral = ["california", "new_york", "illinois", "washington"];
    if deferral.iter().any(|j| jurisdiction.contains(j)) {
        300
    } else {
        180
    }
}

fn head_words(text: &str, n: usize) -> String {
    text.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE_VII: &str = "42 U.S.C. § 2000e-2. It shall be an unlawful employment practice \
        for an employer to discriminate against any individual with respect to compensation, \
        terms, conditions, or privileges of employment. The employer must not limit, segregate, \
        or classify employees in any way which would deprive any individual of employment \
        opportunities.";

    #[test]
    fn statutes_yield_elements_and_checklists() {
        let lg = LegalGraphBuilder::new().build_from_statutes(&[TITLE_VII], "federal");

        let statute = lg
            .elements()
            .find(|(_, e)| e.kind == ElementKind::Statute)
            .expect("statute element");
        assert!(statute.1.citation.contains("2000e-2"));

        // Vocabulary checklist plus statute-derived requirements.
        let checklist = lg.requirements_for("employment_discrimination");
        assert!(checklist.len() >= 4);
        assert!(lg
            .relations()
            .iter()
            .any(|r| r.kind == LegalRelationKind::DerivedFrom));
    }

    #[test]
    fn empty_statutes_still_seed_vocabulary() {
        let lg = LegalGraphBuilder::new().build_from_statutes(&[], "federal");
        assert!(!lg.requirements_for("retaliation").is_empty());
        assert!(lg
            .elements()
            .all(|(_, e)| e.kind == ElementKind::Requirement));
    }

    #[test]
    fn procedural_rules_are_jurisdiction_aware() {
        let builder = LegalGraphBuilder::new();
        let mut federal = builder.build_from_statutes(&[], "federal");
        builder.build_rules_of_procedure(&mut federal, "federal");
        let deadline = federal
            .element_by_key("rule:filing_deadline")
            .expect("deadline rule");
        assert!(deadline.1.text.contains("180"));

        let mut california = builder.build_from_statutes(&[], "california");
        builder.build_rules_of_procedure(&mut california, "california");
        let deadline = california
            .element_by_key("rule:filing_deadline")
            .expect("deadline rule");
        assert!(deadline.1.text.contains("300"));
        assert_eq!(california.procedural_rules().count(), 4);
    }
}
