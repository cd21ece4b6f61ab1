//! Job submission and polling controller.
//!
//! The controller owns the single active-poll slot. A submission first
//! empties the slot (cancelling its timer), then either dispatches an
//! immediate outcome or installs a new poll loop with a fresh timer. Each
//! tick names the timer it belongs to, so a tick from a replaced timer is
//! dropped instead of touching the new job.

use crate::{
    api::AnalysisApi,
    config::{Config, Polling},
    dispatch::{Handlers, Outcome, dispatch},
    error::FailureReason,
    job::Job,
    poll::PollLoop,
    scheduler::{BlockingScheduler, Scheduler, TimerId},
    submit::{Submission, Upload, classify_submit},
};
use tracing::{debug, info, warn};

struct ActivePoll {
    poll: PollLoop,
    timer: TimerId,
}

pub struct Controller<A, S, H> {
    api: A,
    scheduler: S,
    handlers: H,
    polling: Polling,
    login_url: String,
    active: Option<ActivePoll>,
}

impl<A: AnalysisApi, S: Scheduler, H: Handlers> Controller<A, S, H> {
    pub fn new(cfg: &Config, api: A, scheduler: S, handlers: H) -> Self {
        Self {
            api,
            scheduler,
            handlers,
            polling: cfg.polling.clone(),
            login_url: cfg.login_url(),
            active: None,
        }
    }

    /// Submits one unit of work.
    ///
    /// Returns the job id when the server accepted the work for async
    /// processing and a poll loop is now running; `None` when the outcome
    /// was already dispatched.
    pub fn submit(&mut self, upload: &Upload) -> Option<String> {
        if let Some(stale) = self.cancel() {
            info!(job_id = %stale, "new submission replaces active poll");
        }

        info!(
            file = %upload.file_name,
            bytes = upload.bytes.len(),
            has_query = upload.query_text.is_some(),
            "submitting"
        );
        let submission = match self.api.submit(upload) {
            Ok(reply) => classify_submit(&reply, &self.login_url),
            Err(err) => Submission::Failed(FailureReason::Transport(format!("{err:#}"))),
        };

        match submission {
            Submission::Immediate(result) => {
                info!("result returned synchronously");
                dispatch(&mut self.handlers, None, Outcome::Success(result));
                None
            }
            Submission::AuthRequired { login_url } => {
                warn!("submission requires login");
                dispatch(
                    &mut self.handlers,
                    None,
                    Outcome::Failure(FailureReason::AuthRequired { login_url }),
                );
                None
            }
            Submission::Failed(reason) => {
                warn!("submission failed: {reason}");
                dispatch(&mut self.handlers, None, Outcome::Failure(reason));
                None
            }
            Submission::Accepted(job) => {
                let job_id = job.id.clone();
                self.handlers.on_accepted(&job);
                let timer = self.scheduler.start_interval(self.polling.interval());
                info!(
                    job_id = %job_id,
                    interval_ms = self.polling.interval_ms,
                    max_ticks = self.polling.max_ticks,
                    "job accepted; polling"
                );
                self.active = Some(ActivePoll {
                    poll: PollLoop::new(job, self.polling.max_ticks),
                    timer,
                });
                Some(job_id)
            }
        }
    }

    /// Handles one timer tick: one status query, then possibly one dispatch.
    pub fn on_tick(&mut self, timer: TimerId) {
        let Some(active) = self.active.as_mut() else {
            debug!(?timer, "tick with no active poll ignored");
            return;
        };
        if active.timer != timer {
            warn!(?timer, current = ?active.timer, "tick from stale timer ignored");
            return;
        }

        let job_id = active.poll.job().id.clone();
        let reply = self.api.job_status(&job_id);
        let Some(outcome) = active.poll.on_reply(reply, &self.login_url) else {
            return;
        };

        if let Some(done) = self.active.take() {
            self.scheduler.cancel(done.timer);
            debug!(job_id = %job_id, state = ?done.poll.state(), ticks = done.poll.ticks(), "poll stopped");
        }
        dispatch(&mut self.handlers, Some(&job_id), outcome);
    }

    /// Stops the active poll without dispatching anything for it.
    pub fn cancel(&mut self) -> Option<String> {
        let stale = self.active.take()?;
        self.scheduler.cancel(stale.timer);
        Some(stale.poll.job().id.clone())
    }

    pub fn is_polling(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_job(&self) -> Option<&Job> {
        self.active.as_ref().map(|a| a.poll.job())
    }

    pub fn handlers(&self) -> &H {
        &self.handlers
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn into_handlers(self) -> H {
        self.handlers
    }
}

impl<A: AnalysisApi, S: BlockingScheduler, H: Handlers> Controller<A, S, H> {
    /// Drives ticks until no timer is active.
    pub fn run_until_idle(&mut self) {
        while let Some(timer) = self.scheduler.wait_for_tick() {
            self.on_tick(timer);
        }
    }
}
