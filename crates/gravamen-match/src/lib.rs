//! Neurosymbolic matching of claims against legal requirements.
//!
//! Per claim, the matcher runs two passes over the legal checklist for the
//! claim's type:
//!
//! 1. **Symbolic**: deterministic graph checks. A requirement node already
//!    satisfied in the dependency graph and tagged with the legal element's
//!    id counts with confidence 1.0.
//! 2. **Semantic**: for requirements the symbolic pass left open, an
//!    optionally injected oracle judges whether the claim's supporting facts
//!    textually satisfy the element (confidence 0.8 on yes).
//!
//! The oracle is a narrow trait with an explicit `Unavailable` outcome; when
//! it is absent, errors, or times out, the matcher degrades to symbolic-only
//! results and flags `semantic_pass_skipped` rather than failing the match.

pub mod matcher;
pub mod oracle;

pub use matcher::{
    ClaimMatch, ClaimViability, MatchMethod, MatchResult, NeurosymbolicMatcher, RequirementMatch,
};
pub use oracle::{OracleOutcome, SemanticOracle};

/// Confidence assigned to symbolically verified requirements.
pub const SYMBOLIC_CONFIDENCE: f32 = 1.0;

/// Confidence assigned to requirements satisfied only by the semantic pass.
pub const SEMANTIC_CONFIDENCE: f32 = 0.8;

/// A claim is viable only when its weakest requirement match clears this.
pub const VIABILITY_FLOOR: f32 = 0.5;
