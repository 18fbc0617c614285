//! Built-in requirement vocabulary.
//!
//! Maps claim-type strings to the ordered list of elements that claim type is
//! known to need. The same table seeds both the legal graph's checklists and
//! the dependency-graph builder's requirement map, so requirement names line
//! up across the two graphs.

use std::collections::HashMap;

/// (claim type, ordered requirement element texts).
pub fn requirement_vocabulary() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        (
            "employment_discrimination",
            vec![
                "membership in a protected class",
                "an adverse employment action",
                "a causal connection between the protected class and the action",
                "damages resulting from the action",
            ],
        ),
        (
            "wrongful_termination",
            vec![
                "an employment relationship",
                "termination of that employment",
                "the termination violated law or public policy",
                "damages resulting from the termination",
            ],
        ),
        (
            "retaliation",
            vec![
                "engagement in a protected activity",
                "an adverse employment action",
                "a causal connection between the activity and the action",
            ],
        ),
        (
            "wage_theft",
            vec![
                "an employment relationship",
                "compensable work performed",
                "wages due were not paid",
            ],
        ),
        (
            "harassment",
            vec![
                "unwelcome conduct based on a protected characteristic",
                "conduct severe or pervasive enough to alter working conditions",
                "employer knowledge or constructive knowledge of the conduct",
            ],
        ),
        (
            "breach_of_contract",
            vec![
                "a valid contract",
                "performance by the complainant",
                "breach by the respondent",
                "damages resulting from the breach",
            ],
        ),
    ]
}

/// The vocabulary reshaped for
/// [`gravamen_ingest::DependencyGraphBuilder::with_requirement_map`].
pub fn requirement_map_for_builder() -> HashMap<String, Vec<String>> {
    requirement_vocabulary()
        .into_iter()
        .map(|(claim_type, reqs)| {
            (
                claim_type.to_string(),
                reqs.into_iter().map(|r| r.to_string()).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_covers_common_claim_types() {
        let vocab = requirement_vocabulary();
        let types: Vec<_> = vocab.iter().map(|(t, _)| *t).collect();
        assert!(types.contains(&"employment_discrimination"));
        assert!(types.contains(&"wrongful_termination"));
        assert!(vocab.iter().all(|(_, reqs)| !reqs.is_empty()));
    }
}
