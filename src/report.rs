use crate::{
    dispatch::{Handlers, Outcome},
    error::FailureReason,
    job::{AnalysisResult, Job},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Summary of one `submit` run, printed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub image: String,
    pub image_sha256: String,
    pub query_text: Option<String>,
    pub job_id: Option<String>,
    pub status: RunStatus,
    pub outcome: Option<Outcome>,
    pub message: Option<String>,
    pub retryable: bool,
    pub login_url: Option<String>,
    pub ticks: u32,
    pub started: String,
    pub finished: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
    AuthRequired,
    Unfinished,
}

/// `Handlers` that keep what the CLI needs to build a `RunReport`.
#[derive(Debug, Default)]
pub struct ReportHandlers {
    pub accepted: Option<Job>,
    pub outcome: Option<Outcome>,
    pub login_url: Option<String>,
}

impl ReportHandlers {
    pub fn status(&self) -> RunStatus {
        if self.login_url.is_some() {
            return RunStatus::AuthRequired;
        }
        match &self.outcome {
            Some(Outcome::Success(_)) => RunStatus::Completed,
            Some(Outcome::Failure(_)) => RunStatus::Failed,
            None => RunStatus::Unfinished,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            Some(Outcome::Failure(reason)) => Some(reason),
            _ => None,
        }
    }
}

impl Handlers for ReportHandlers {
    fn on_accepted(&mut self, job: &Job) {
        info!(job_id = %job.id, "Processing your image... This may take up to 2 minutes.");
        self.accepted = Some(job.clone());
    }

    fn on_result(&mut self, job_id: Option<&str>, result: &AnalysisResult) {
        info!(
            job_id = job_id.unwrap_or("-"),
            caption = result.short_caption.as_deref().unwrap_or(""),
            "analysis ready"
        );
        self.outcome = Some(Outcome::Success(result.clone()));
    }

    fn on_failure(&mut self, job_id: Option<&str>, reason: &FailureReason) {
        warn!(job_id = job_id.unwrap_or("-"), kind = reason.kind(), "{reason}");
        self.outcome = Some(Outcome::Failure(reason.clone()));
    }

    fn on_auth_required(&mut self, login_url: &str) {
        warn!("login required: {login_url}");
        self.login_url = Some(login_url.to_string());
        self.outcome = Some(Outcome::Failure(FailureReason::AuthRequired {
            login_url: login_url.to_string(),
        }));
    }
}
