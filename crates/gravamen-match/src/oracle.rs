//! The semantic similarity oracle seam.

use std::time::Duration;

/// Outcome of a similarity judgment.
///
/// `Unavailable` covers every failure mode on the collaborator's side:
/// not configured, network error, timeout. Retry policy belongs to the
/// collaborator; the matcher only ever degrades.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OracleOutcome {
    Judged { satisfied: bool, confidence: f32 },
    Unavailable,
}

/// Judges whether a claim's factual text satisfies a legal requirement's
/// text.
///
/// Implementations typically wrap an LLM or embedding service; the call is
/// blocking, bounded by the supplied timeout, and must map any internal
/// failure to [`OracleOutcome::Unavailable`].
pub trait SemanticOracle: Send + Sync {
    fn similarity(
        &self,
        claim_text: &str,
        requirement_text: &str,
        timeout: Duration,
    ) -> OracleOutcome;
}

/// A trivial lexical oracle: satisfied when enough of the requirement's
/// significant words appear in the claim text. Useful as a deterministic
/// stand-in where no external model is wired up.
pub struct LexicalOverlapOracle {
    threshold: f32,
}

impl LexicalOverlapOracle {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl SemanticOracle for LexicalOverlapOracle {
    fn similarity(
        &self,
        claim_text: &str,
        requirement_text: &str,
        _timeout: Duration,
    ) -> OracleOutcome {
        let claim = claim_text.to_lowercase();
        let words: Vec<&str> = requirement_text
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .collect();
        if words.is_empty() {
            return OracleOutcome::Unavailable;
        }
        let hits = words
            .iter()
            .filter(|w| claim.contains(&w.to_lowercase()))
            .count();
        let overlap = hits as f32 / words.len() as f32;
        OracleOutcome::Judged {
            satisfied: overlap >= self.threshold,
            confidence: overlap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_overlap_judges_by_word_hits() {
        let oracle = LexicalOverlapOracle::new(0.5);
        let outcome = oracle.similarity(
            "the termination of my employment came without any notice",
            "termination of the employment",
            Duration::from_millis(10),
        );
        match outcome {
            OracleOutcome::Judged { satisfied, .. } => assert!(satisfied),
            OracleOutcome::Unavailable => panic!("oracle should judge"),
        }
    }

    #[test]
    fn empty_requirement_is_unavailable() {
        let oracle = LexicalOverlapOracle::new(0.5);
        let outcome = oracle.similarity("anything", "a an it", Duration::from_millis(10));
        assert_eq!(outcome, OracleOutcome::Unavailable);
    }
}
