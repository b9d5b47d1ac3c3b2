/// Outcome class for one candidate, reported to the caller's UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStatus {
    Processing,
    Processed,
    Skipped,
    Private,
    BelowMinFollowers,
    AboveMaxFollowers,
    Error,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Processing => "processing",
            CandidateStatus::Processed => "processed",
            CandidateStatus::Skipped => "skipped",
            CandidateStatus::Private => "private",
            CandidateStatus::BelowMinFollowers => "min_followers",
            CandidateStatus::AboveMaxFollowers => "max_followers",
            CandidateStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events emitted while a job runs, for the caller's UI.
#[derive(Debug, Clone)]
pub enum ProgressEvent<'a> {
    TargetStarted {
        target: &'a str,
    },
    /// A listing page landed; `collected` is the running total.
    PageFetched {
        target: &'a str,
        page: u32,
        collected: usize,
    },
    /// One candidate settled. `processed` is monotonically increasing
    /// across concurrent tasks regardless of completion order.
    Candidate {
        processed: usize,
        total: usize,
        label: Option<&'a str>,
        status: CandidateStatus,
    },
    TargetFinished {
        target: &'a str,
        records: usize,
        /// False when pagination stopped early on a page failure and
        /// the result may be incomplete.
        complete: bool,
    },
}

/// Receives progress events (decoupled from any particular UI).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl ProgressReporter for NullReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, event: ProgressEvent<'_>) {
        match event {
            ProgressEvent::TargetStarted { target } => {
                tracing::info!(%target, "Target started");
            }
            ProgressEvent::PageFetched {
                target,
                page,
                collected,
            } => {
                tracing::info!(%target, page, collected, "Page fetched");
            }
            ProgressEvent::Candidate {
                processed,
                total,
                label,
                status,
            } => {
                tracing::info!(
                    processed,
                    total,
                    label = label.unwrap_or("..."),
                    %status,
                    "Candidate settled"
                );
            }
            ProgressEvent::TargetFinished {
                target,
                records,
                complete,
            } => {
                if complete {
                    tracing::info!(%target, records, "Target finished");
                } else {
                    tracing::warn!(%target, records, "Target finished with partial results");
                }
            }
        }
    }
}
