use crate::{
    api::{ItemSummary, JobSnapshot},
    error::TransportError,
    job::{JobSession, JobState},
    report::format_time_remaining,
};
use std::collections::VecDeque;
use std::time::Duration;

pub trait JobObserver: Send {
    fn on_submitted(&mut self, _session: &JobSession) {}
    fn on_snapshot(&mut self, _session: &JobSession, _snapshot: &JobSnapshot) {}
    fn on_transient_error(
        &mut self,
        _session: &JobSession,
        _failures: u32,
        _err: &TransportError,
        _retry_in: Duration,
    ) {
    }
    fn on_finished(&mut self, _session: &JobSession) {}
}

pub struct NoopObserver;

impl JobObserver for NoopObserver {}

pub struct PlainObserver;

impl JobObserver for PlainObserver {
    fn on_submitted(&mut self, session: &JobSession) {
        println!("job {} started", session.job_id());
    }

    fn on_finished(&mut self, session: &JobSession) {
        println!(
            "job {} {} ({} / {})",
            session.job_id(),
            session.state().as_str(),
            session.processed(),
            session.total()
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub kind: LineKind,
    pub text: String,
}

pub struct ConsoleObserver {
    lines: VecDeque<ConsoleLine>,
    max_lines: usize,
    echo: bool,
    last_seen: Option<(u64, ItemSummary)>,
}

impl ConsoleObserver {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            max_lines: max_lines.max(1),
            echo: true,
            last_seen: None,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn lines(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.lines.iter()
    }

    fn push(&mut self, kind: LineKind, text: String) {
        if self.echo {
            println!("{text}");
        }
        self.lines.push_back(ConsoleLine { kind, text });
        while self.lines.len() > self.max_lines {
            self.lines.pop_front();
        }
    }
}

pub fn item_line(item: &ItemSummary) -> (LineKind, String) {
    let (icon, label, kind) = if item.accepted {
        ("✅", "ACCEPTED", LineKind::Success)
    } else {
        ("❌", "REJECTED", LineKind::Error)
    };
    let score = item
        .score
        .map(|s| format!("{s}"))
        .unwrap_or_else(|| "?".to_string());
    let category = item.category.as_deref().unwrap_or("none");
    (
        kind,
        format!(
            "{icon} [{label}] \"{}\" (Score: {score}%, Category: {category})",
            item.keyword
        ),
    )
}

impl JobObserver for ConsoleObserver {
    fn on_submitted(&mut self, session: &JobSession) {
        self.lines.clear();
        self.last_seen = None;
        self.push(
            LineKind::Info,
            format!("🚀 Starting classification (job {})...", session.job_id()),
        );
    }

    fn on_snapshot(&mut self, session: &JobSession, snapshot: &JobSnapshot) {
        if let Some(item) = &snapshot.current_result {
            let seen = (session.processed(), item.clone());
            if self.last_seen.as_ref() != Some(&seen) {
                let (kind, text) = item_line(item);
                self.push(kind, text);
                self.last_seen = Some(seen);
            }
        }
        if self.echo {
            println!(
                "{:.1}% | {} / {} | {}",
                session.percent(),
                session.processed(),
                session.total(),
                format_time_remaining(session.time_remaining())
            );
        }
    }

    fn on_transient_error(
        &mut self,
        _session: &JobSession,
        failures: u32,
        err: &TransportError,
        retry_in: Duration,
    ) {
        self.push(
            LineKind::Error,
            format!(
                "⚠️ poll failed ({failures}x): {err}; retrying in {}ms",
                retry_in.as_millis()
            ),
        );
    }

    fn on_finished(&mut self, session: &JobSession) {
        match session.state() {
            JobState::Completed => {
                self.push(LineKind::Success, "🎉 Classification complete!".to_string())
            }
            JobState::Failed => self.push(LineKind::Error, "❌ Processing failed!".to_string()),
            JobState::Cancelled => self.push(LineKind::Info, "⏹ Cancelled.".to_string()),
            other => self.push(LineKind::Info, format!("stopped in state {}", other.as_str())),
        }
    }
}
