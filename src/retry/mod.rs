//! Retry orchestration: policy, cancellation, attempt classification and the
//! reauthentication loop.

mod cancel;
mod orchestrator;
mod outcome;
mod policy;

pub use cancel::Cancellation;
pub use orchestrator::RetryOrchestrator;
pub use outcome::{AttemptOutcome, Outcome, StatusResponse};
pub use policy::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS, RetryPolicy};
