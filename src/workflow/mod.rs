pub mod grading_flow;
pub mod retry;
pub mod step_record;

pub use grading_flow::{GradingFlow, GradingOutcome};
pub use retry::{call_with_retry, RetryPolicy, StageAttempt};
pub use step_record::{StepRecord, StepStatus};
