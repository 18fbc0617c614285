//! Extraction patterns for grievance narratives.
//!
//! Each pattern carries a base confidence reflecting its extraction method:
//! exact structural matches (an employment phrase, a fully qualified date)
//! score high, loose keyword matches score lower, and co-occurrence inference
//! (handled in the builder) lowest of all. Context factors then adjust the
//! base per match.

use gravamen_graph::{EntityKind, RelationKind};
use regex::Regex;

/// A pattern that extracts a single entity.
#[derive(Debug, Clone)]
pub struct EntityPattern {
    pub name: &'static str,
    pub kind: EntityKind,
    pub regex: Regex,
    pub base_confidence: f32,
    /// Capture group holding the entity's surface text (0 = whole match).
    pub text_group: usize,
    /// Optional (group, confidence) pair: when the group participates in the
    /// match, its confidence replaces the base. Used for dates, where a year
    /// upgrades a partial date to a confident one.
    pub qualifier: Option<(usize, f32)>,
}

/// A pattern that extracts a relationship along with its two endpoints.
#[derive(Debug, Clone)]
pub struct RelationPattern {
    pub name: &'static str,
    pub kind: RelationKind,
    pub regex: Regex,
    pub base_confidence: f32,
    /// (capture group, entity kind, entity confidence) for the source.
    pub source: (usize, EntityKind, f32),
    /// Same for the target.
    pub target: (usize, EntityKind, f32),
}

/// Default entity patterns for grievance narratives.
pub fn entity_patterns() -> Vec<EntityPattern> {
    vec![
        EntityPattern {
            name: "titled_person",
            kind: EntityKind::Person,
            regex: Regex::new(r"\b(?:Mr|Ms|Mrs|Dr)\.?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)")
                .unwrap(),
            base_confidence: 0.85,
            text_group: 1,
            qualifier: None,
        },
        EntityPattern {
            name: "organization_suffix",
            kind: EntityKind::Organization,
            regex: Regex::new(
                r"\b([A-Z][A-Za-z&]*(?:\s+[A-Z][A-Za-z&]*)*\s+(?:Inc|LLC|Corp|Corporation|Company|Co)\b\.?)",
            )
            .unwrap(),
            base_confidence: 0.85,
            text_group: 1,
            qualifier: None,
        },
        // Month-name dates. Without a year the date is deliberately low
        // confidence so the denoiser asks for the full date.
        EntityPattern {
            name: "month_date",
            kind: EntityKind::Date,
            regex: Regex::new(
                r"(?i)\b((?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+\d{1,2}(?:st|nd|rd|th)?(,?\s+(\d{4}))?)\b",
            )
            .unwrap(),
            base_confidence: 0.45,
            text_group: 1,
            qualifier: Some((3, 0.85)),
        },
        EntityPattern {
            name: "iso_date",
            kind: EntityKind::Date,
            regex: Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap(),
            base_confidence: 0.9,
            text_group: 1,
            qualifier: None,
        },
        EntityPattern {
            name: "slash_date",
            kind: EntityKind::Date,
            regex: Regex::new(r"\b(\d{1,2}/\d{1,2}/\d{2,4})\b").unwrap(),
            base_confidence: 0.7,
            text_group: 1,
            qualifier: None,
        },
        // Adverse employment actions read as facts.
        EntityPattern {
            name: "adverse_action",
            kind: EntityKind::Fact,
            regex: Regex::new(
                r"(?i)\b((?:was|were|got|been)\s+(?:unfairly\s+|suddenly\s+|wrongfully\s+)?(?:fired|terminated|dismissed|laid\s+off|let\s+go|demoted|suspended))\b",
            )
            .unwrap(),
            base_confidence: 0.75,
            text_group: 1,
            qualifier: None,
        },
        EntityPattern {
            name: "unpaid_wages",
            kind: EntityKind::Fact,
            regex: Regex::new(
                r"(?i)\b((?:did\s+not|didn't|never|was\s+not|wasn't)\s+(?:get\s+)?(?:paid|received?|compensated)(?:\s+(?:my\s+|for\s+)?(?:wages|overtime|pay|salary|commissions?|hours))?)\b",
            )
            .unwrap(),
            base_confidence: 0.7,
            text_group: 1,
            qualifier: None,
        },
        EntityPattern {
            name: "protected_activity",
            kind: EntityKind::Fact,
            regex: Regex::new(
                r"(?i)\b((?:complained|reported|raised\s+concerns?|filed\s+a\s+(?:complaint|grievance|report))(?:\s+(?:about|to|regarding)\s+[\w ]{3,40})?)",
            )
            .unwrap(),
            base_confidence: 0.7,
            text_group: 1,
            qualifier: None,
        },
        // Legal-claim vocabulary surfaces as Claim entities.
        EntityPattern {
            name: "claim_keyword",
            kind: EntityKind::Claim,
            regex: Regex::new(
                r"(?i)\b(wrongful(?:ly)?\s+terminat(?:ed|ion)|employment\s+discrimination|discriminat(?:ed|ion|ory)|harass(?:ed|ment)|retaliat(?:ed|ion|ory)|unpaid\s+(?:wages|overtime)|wage\s+theft|breach\s+of\s+contract|hostile\s+work\s+environment|whistleblow(?:er|ing))\b",
            )
            .unwrap(),
            base_confidence: 0.7,
            text_group: 1,
            qualifier: None,
        },
    ]
}

/// Default relationship patterns. Each also mints its endpoint entities.
pub fn relation_patterns() -> Vec<RelationPattern> {
    vec![
        // "John worked at Acme", "Maria was employed by Initech Inc."
        RelationPattern {
            name: "employment",
            kind: RelationKind::EmployedBy,
            regex: Regex::new(
                r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)\s+(?:work(?:ed|s)?\s+(?:at|for)|was\s+employed\s+(?:by|at)|is\s+employed\s+(?:by|at))\s+([A-Z][A-Za-z&]*(?:\s+(?:Inc|LLC|Corp|Corporation|Company|Co)\b\.?)?)",
            )
            .unwrap(),
            base_confidence: 0.9,
            source: (1, EntityKind::Person, 0.8),
            target: (2, EntityKind::Organization, 0.8),
        },
        // "fired for reporting safety violations" -- the action is the
        // effect, what follows is its asserted cause.
        RelationPattern {
            name: "action_for_cause",
            kind: RelationKind::CausedBy,
            regex: Regex::new(
                r"(?i)\b(fired|terminated|dismissed|demoted|suspended)\s+(?:for|after)\s+([\w' ]{3,60}?)(?:[.,;!?]|$)",
            )
            .unwrap(),
            base_confidence: 0.65,
            source: (1, EntityKind::Fact, 0.65),
            target: (2, EntityKind::Fact, 0.6),
        },
        // "X because of Y", "X due to Y"
        RelationPattern {
            name: "because_of",
            kind: RelationKind::CausedBy,
            regex: Regex::new(
                r"(?i)\b([\w' ]{3,60}?)\s+(?:because\s+of|due\s+to|as\s+a\s+result\s+of)\s+([\w' ]{3,60}?)(?:[.,;!?]|$)",
            )
            .unwrap(),
            base_confidence: 0.6,
            source: (1, EntityKind::Fact, 0.55),
            target: (2, EntityKind::Fact, 0.55),
        },
    ]
}

/// Adjust a base confidence for context factors in the matched evidence.
pub fn adjust_confidence(base: f32, evidence: &str) -> f32 {
    let mut conf = base;

    // Penalty for hedging language
    let hedging = [
        "maybe",
        "possibly",
        "might",
        "could be",
        "i think",
        "not sure",
        "guess",
    ];
    let lower = evidence.to_lowercase();
    if hedging.iter().any(|h| lower.contains(h)) {
        conf *= 0.85;
    }

    // Boost for numerical specificity
    let digits = evidence.chars().filter(|c| c.is_ascii_digit()).count();
    if digits >= 2 {
        conf *= 1.1;
    }

    // Penalty for very short evidence
    if evidence.len() < 8 {
        conf *= 0.9;
    }

    conf.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pattern(name: &str) -> EntityPattern {
        entity_patterns()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap()
    }

    #[test]
    fn month_date_year_is_qualifier() {
        let p = pattern("month_date");
        let caps = p.regex.captures("fired on Jan 5, 2024 at noon").unwrap();
        assert!(caps.get(3).is_some());
        assert_eq!(caps.get(1).unwrap().as_str(), "Jan 5, 2024");

        let caps = p.regex.captures("fired on Jan 5 at noon").unwrap();
        assert!(caps.get(3).is_none());
        assert_eq!(caps.get(1).unwrap().as_str(), "Jan 5");
    }

    #[test]
    fn employment_pattern_captures_both_ends() {
        let p = relation_patterns()
            .into_iter()
            .find(|p| p.name == "employment")
            .unwrap();
        let caps = p.regex.captures("John worked at Acme Corp.").unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "John");
        assert!(caps.get(2).unwrap().as_str().starts_with("Acme"));
    }

    #[test]
    fn hedging_reduces_confidence() {
        let plain = adjust_confidence(0.8, "he was fired on the spot");
        let hedged = adjust_confidence(0.8, "I think maybe he was fired");
        assert!(hedged < plain);
    }

    #[test]
    fn numbers_boost_confidence() {
        let boosted = adjust_confidence(0.6, "worked 52 hours in week 12");
        assert_relative_eq!(boosted, 0.66, epsilon = 1e-4);
    }

    #[test]
    fn confidence_stays_bounded() {
        assert!(adjust_confidence(0.99, "worked 52 hours in week 12") <= 1.0);
        assert!(adjust_confidence(0.0, "maybe") >= 0.0);
    }
}
