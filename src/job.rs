use crate::{
    api::{Backend, ClassificationResult, ItemSummary, JobSnapshot, JobStatus},
    error::{ClientError, Result, TransportError, ValidationError},
    observer::JobObserver,
    poll_policy::PollPolicy,
    request::ClassificationRequest,
};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Submitted,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Submitted => "submitted",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    fn can_move_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Idle, Submitted)
                | (Submitted, Running)
                | (Submitted, Failed)
                | (Submitted, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

type ActiveSlot = Arc<Mutex<Option<String>>>;

fn set_slot(slot: &ActiveSlot, value: Option<String>) {
    let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
    *guard = value;
}

#[derive(Debug)]
pub struct JobSession {
    job_id: String,
    state: JobState,
    processed: u64,
    total: u64,
    time_remaining: Option<f64>,
    last_item: Option<ItemSummary>,
    current_keyword: Option<String>,
    slot: Option<ActiveSlot>,
}

impl JobSession {
    fn idle(slot: ActiveSlot) -> Self {
        Self {
            job_id: String::new(),
            state: JobState::Idle,
            processed: 0,
            total: 0,
            time_remaining: None,
            last_item: None,
            current_keyword: None,
            slot: Some(slot),
        }
    }

    pub fn attach(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Running,
            processed: 0,
            total: 0,
            time_remaining: None,
            last_item: None,
            current_keyword: None,
            slot: None,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f64 * 100.0 / self.total as f64
        }
    }

    pub fn time_remaining(&self) -> Option<f64> {
        self.time_remaining
    }

    pub fn last_item(&self) -> Option<&ItemSummary> {
        self.last_item.as_ref()
    }

    pub fn current_keyword(&self) -> Option<&str> {
        self.current_keyword.as_deref()
    }

    fn transition(&mut self, next: JobState) -> Result<(), ValidationError> {
        if !self.state.can_move_to(next) {
            return Err(ValidationError::InvalidTransition {
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }
        debug!(job_id = %self.job_id, "job {} -> {}", self.state.as_str(), next.as_str());
        self.state = next;
        if next.is_terminal() {
            self.release();
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Some(slot) = self.slot.take() {
            set_slot(&slot, None);
        }
    }

    /// Fold a snapshot into the session. Counters never move backwards
    /// while the job is live.
    pub fn apply(&mut self, snapshot: &JobSnapshot) {
        if snapshot.progress < self.processed || snapshot.total < self.total {
            warn!(
                job_id = %self.job_id,
                "progress went backwards ({}/{} -> {}/{}); keeping previous counters",
                self.processed,
                self.total,
                snapshot.progress,
                snapshot.total
            );
        }
        self.processed = self.processed.max(snapshot.progress);
        self.total = self.total.max(snapshot.total);
        self.time_remaining = snapshot.time_remaining.filter(|t| *t >= 0.0);
        if let Some(item) = &snapshot.current_result {
            self.last_item = Some(item.clone());
        }
        if let Some(kw) = &snapshot.current_keyword {
            self.current_keyword = Some(kw.clone());
        }
    }
}

impl Drop for JobSession {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct JobClient<B: Backend> {
    backend: B,
    policy: PollPolicy,
    active: ActiveSlot,
}

const RESERVED: &str = "<submitting>";

impl<B: Backend> JobClient<B> {
    pub fn new(backend: B, policy: PollPolicy) -> Self {
        Self {
            backend,
            policy,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub fn active_job(&self) -> Option<String> {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn reserve(&self) -> Result<(), ValidationError> {
        let mut guard = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = guard.as_ref() {
            return Err(ValidationError::JobAlreadyActive(id.clone()));
        }
        *guard = Some(RESERVED.to_string());
        Ok(())
    }

    pub async fn submit(&self, request: &ClassificationRequest) -> Result<JobSession> {
        request.validate()?;
        self.reserve()?;

        let mut session = JobSession::idle(self.active.clone());
        session.transition(JobState::Submitted)?;

        let out = match self.backend.submit(&request.body()).await {
            Ok(out) => out,
            Err(err) => {
                session.release();
                return Err(err.into());
            }
        };

        let job_id = match (out.success, out.job_id) {
            (true, Some(id)) if !id.is_empty() => id,
            (true, _) => {
                session.release();
                return Err(TransportError::Rejected("response has no job_id".into()).into());
            }
            (false, _) => {
                session.release();
                let msg = out.error.unwrap_or_else(|| "unknown error".to_string());
                return Err(TransportError::Rejected(msg).into());
            }
        };

        set_slot(&self.active, Some(job_id.clone()));
        session.job_id = job_id;
        if let Some(total) = out.total_keywords {
            session.total = total;
        }
        session.transition(JobState::Running)?;
        info!(job_id = %session.job_id, topic = %request.topic.trim(), "job submitted");
        Ok(session)
    }

    pub async fn poll(&self, session: &JobSession) -> Result<JobSnapshot> {
        Ok(self.backend.progress(&session.job_id).await?)
    }

    pub async fn fetch_results(&self, session: &JobSession) -> Result<ClassificationResult> {
        Ok(self.backend.results(&session.job_id).await?)
    }

    pub async fn await_completion(
        &self,
        session: &mut JobSession,
        cancel: &CancellationToken,
        observer: &mut dyn JobObserver,
    ) -> Result<ClassificationResult> {
        match session.state {
            JobState::Completed => return self.fetch_results(session).await,
            JobState::Failed => {
                return Err(ClientError::JobFailed {
                    job_id: session.job_id.clone(),
                    message: "job already failed".into(),
                });
            }
            JobState::Cancelled => {
                return Err(ClientError::Cancelled {
                    job_id: session.job_id.clone(),
                });
            }
            JobState::Idle => {
                return Err(ValidationError::InvalidTransition {
                    from: "idle",
                    to: "running",
                }
                .into());
            }
            JobState::Submitted | JobState::Running => {}
        }

        observer.on_submitted(session);
        let mut failures: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(self.cancelled(session, observer));
            }

            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                res = self.backend.progress(&session.job_id) => Some(res),
            };
            let Some(polled) = polled else {
                return Err(self.cancelled(session, observer));
            };

            let delay = match polled {
                Ok(snapshot) => {
                    failures = 0;
                    session.apply(&snapshot);
                    observer.on_snapshot(session, &snapshot);

                    match snapshot.status {
                        JobStatus::Completed => {
                            session.transition(JobState::Completed)?;
                            info!(job_id = %session.job_id, processed = session.processed, "job completed");
                            observer.on_finished(session);
                            return self.fetch_results(session).await;
                        }
                        JobStatus::Failed => {
                            session.transition(JobState::Failed)?;
                            let message = snapshot
                                .error
                                .unwrap_or_else(|| "backend reported failure".to_string());
                            warn!(job_id = %session.job_id, "job failed: {message}");
                            observer.on_finished(session);
                            return Err(ClientError::JobFailed {
                                job_id: session.job_id.clone(),
                                message,
                            });
                        }
                        JobStatus::Unknown => {
                            debug!(job_id = %session.job_id, "unrecognised job status; still polling");
                        }
                        JobStatus::Submitted | JobStatus::Running => {}
                    }
                    if session.state == JobState::Submitted {
                        session.transition(JobState::Running)?;
                    }
                    self.policy.interval
                }
                Err(err) => {
                    failures += 1;
                    if self.policy.exhausted(failures) {
                        warn!(job_id = %session.job_id, failures, "giving up polling: {err}");
                        return Err(TransportError::RetriesExhausted {
                            job_id: session.job_id.clone(),
                            attempts: failures,
                            last: err.to_string(),
                        }
                        .into());
                    }
                    let delay = self.policy.error_delay(failures);
                    warn!(
                        job_id = %session.job_id,
                        failures,
                        retry_ms = delay.as_millis() as u64,
                        "poll failed: {err}"
                    );
                    observer.on_transient_error(session, failures, &err, delay);
                    delay
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(session, observer)),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn cancelled(&self, session: &mut JobSession, observer: &mut dyn JobObserver) -> ClientError {
        if let Err(e) = session.transition(JobState::Cancelled) {
            debug!("cancel transition ignored: {e}");
        }
        info!(job_id = %session.job_id, "polling cancelled");
        observer.on_finished(session);
        ClientError::Cancelled {
            job_id: session.job_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_transitions() {
        for s in [JobState::Completed, JobState::Failed, JobState::Cancelled] {
            for next in [
                JobState::Idle,
                JobState::Submitted,
                JobState::Running,
                JobState::Completed,
            ] {
                assert!(!s.can_move_to(next));
            }
        }
    }

    #[test]
    fn attached_session_starts_running() {
        let s = JobSession::attach("abc");
        assert_eq!(s.state(), JobState::Running);
        assert_eq!(s.job_id(), "abc");
    }
}
