//! Deterministic risk scoring.

pub mod engine;
pub mod rules;

pub use engine::{RiskEngine, RiskError, TransactionAnalyzer};
pub use rules::{CHECKS, Evaluation, ScreeningFacts, evaluate};
