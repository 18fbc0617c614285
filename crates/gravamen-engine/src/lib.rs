//! The denoising convergence loop.
//!
//! The engine is synchronous and single-threaded per complaint session. The
//! caller drives the loop: build the graphs once, then repeatedly ask the
//! denoiser for questions, feed answers back, record the resulting noise with
//! the phase manager, and advance phases as their completion predicates come
//! true. The engine itself never calls a network service and never generates
//! free text beyond the deterministic complaint-summary template.

pub mod denoise;
pub mod phase;
pub mod session;

pub use denoise::{
    ConvergenceConfig, Denoiser, GraphDelta, Priority, Question, DEFAULT_MAX_QUESTIONS,
};
pub use phase::{AdvanceOutcome, NextAction, Phase, PhaseManager, PhaseState};
pub use session::{QaTurn, SessionContext};
