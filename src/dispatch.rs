use crate::{error::FailureReason, job::AnalysisResult, job::Job};
use serde::Serialize;

/// Terminal result of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Success(AnalysisResult),
    Failure(FailureReason),
}

/// Caller-supplied reactions to controller events.
pub trait Handlers {
    fn on_accepted(&mut self, _job: &Job) {}
    fn on_result(&mut self, job_id: Option<&str>, result: &AnalysisResult);
    fn on_failure(&mut self, job_id: Option<&str>, reason: &FailureReason);
    fn on_auth_required(&mut self, login_url: &str);
}

/// Hands a terminal outcome to the handlers. Takes the outcome by value so a
/// given outcome can only be delivered once.
pub fn dispatch<H: Handlers + ?Sized>(handlers: &mut H, job_id: Option<&str>, outcome: Outcome) {
    match outcome {
        Outcome::Success(result) => handlers.on_result(job_id, &result),
        Outcome::Failure(FailureReason::AuthRequired { login_url }) => {
            handlers.on_auth_required(&login_url)
        }
        Outcome::Failure(reason) => handlers.on_failure(job_id, &reason),
    }
}
