pub mod analysis;
pub mod status;
pub mod transaction;

pub use analysis::{Recommendation, RiskAnalysis, RiskFlag, RiskLevel};
pub use status::{
    BlacklistAccountRequest, ClearResponse, ListTransactionsQuery, ListTransactionsResponse,
    ReplayPendingQuery, ReplayPendingResponse, RiskStatsResponse, TransactionStatusResponse,
    clamp_limit,
};
pub use transaction::{
    PayloadError, ProcessingResponse, SubmissionStatus, Transaction, TransactionPayload,
};
