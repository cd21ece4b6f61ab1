//! Poll loop for one accepted job.
//!
//! `PollLoop` holds no timer and performs no I/O. The controller feeds it
//! the reply of each status query and it decides whether the job has
//! reached a terminal state.

use crate::{
    api::{Reply, StatusBody},
    dispatch::Outcome,
    error::FailureReason,
    job::{AnalysisResult, Job, JobStatus},
};
use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Polling,
    Completed,
    Failed,
    TimedOut,
    Errored,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollState::Polling)
    }
}

/// Classified body of a 2xx status reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusVerdict {
    Pending(JobStatus),
    Completed(AnalysisResult),
    Failed(String),
}

pub fn classify_status(reply: &Reply, login_url: &str) -> Result<StatusVerdict, FailureReason> {
    match reply.status {
        401 | 403 => {
            return Err(FailureReason::AuthRequired {
                login_url: login_url.to_string(),
            });
        }
        404 => return Err(FailureReason::NotFound),
        s if s >= 500 => return Err(FailureReason::ServerError { status: s }),
        _ if !reply.is_success() => return Err(FailureReason::http_status(reply.status)),
        _ => {}
    }

    let body: StatusBody = reply
        .json()
        .map_err(|e| FailureReason::Malformed(e.to_string()))?;

    let verdict = match body.status.as_deref() {
        Some("completed") => StatusVerdict::Completed(body.result),
        Some("failed") => StatusVerdict::Failed(
            body.error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "Processing failed".into()),
        ),
        Some("queued") => StatusVerdict::Pending(JobStatus::Queued),
        _ => StatusVerdict::Pending(JobStatus::Processing),
    };
    Ok(verdict)
}

#[derive(Debug)]
pub struct PollLoop {
    job: Job,
    ticks: u32,
    max_ticks: u32,
    state: PollState,
}

impl PollLoop {
    pub fn new(job: Job, max_ticks: u32) -> Self {
        Self {
            job,
            ticks: 0,
            max_ticks,
            state: PollState::Polling,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Feeds the reply to one status query.
    ///
    /// Returns the outcome exactly once, on the transition into a terminal
    /// state. Replies arriving after that are ignored.
    pub fn on_reply(&mut self, reply: Result<Reply>, login_url: &str) -> Option<Outcome> {
        if self.state.is_terminal() {
            debug!(job_id = %self.job.id, state = ?self.state, "reply after terminal state ignored");
            return None;
        }
        self.ticks += 1;

        let verdict = match reply {
            Err(err) => Err(FailureReason::Transport(format!("{err:#}"))),
            Ok(reply) => classify_status(&reply, login_url),
        };

        match verdict {
            Err(reason) => {
                warn!(job_id = %self.job.id, tick = self.ticks, "status check failed: {reason}");
                self.state = PollState::Errored;
                self.job.error = Some(reason.to_string());
                Some(Outcome::Failure(reason))
            }
            Ok(StatusVerdict::Completed(result)) => {
                info!(job_id = %self.job.id, tick = self.ticks, "job completed");
                self.state = PollState::Completed;
                self.job.status = JobStatus::Completed;
                self.job.result = Some(result.clone());
                Some(Outcome::Success(result))
            }
            Ok(StatusVerdict::Failed(message)) => {
                info!(job_id = %self.job.id, tick = self.ticks, "job failed: {message}");
                self.state = PollState::Failed;
                self.job.status = JobStatus::Failed;
                self.job.error = Some(message.clone());
                Some(Outcome::Failure(FailureReason::DomainFailure(message)))
            }
            Ok(StatusVerdict::Pending(status)) => {
                self.job.status = status;
                if self.ticks >= self.max_ticks {
                    warn!(job_id = %self.job.id, ticks = self.ticks, "poll budget exhausted");
                    self.state = PollState::TimedOut;
                    return Some(Outcome::Failure(FailureReason::Timeout { ticks: self.ticks }));
                }
                debug!(job_id = %self.job.id, tick = self.ticks, ?status, "still pending");
                None
            }
        }
    }
}
