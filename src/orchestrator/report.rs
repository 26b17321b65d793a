//! Run outcome aggregation.

use crate::types::{Cursor, WindowId};
use serde::Serialize;
use std::fmt;

/// How a single window ended in this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WindowOutcome {
    /// Terminal cursor reached and checkpointed
    Complete {
        /// Pages fetched during this run (0 if already complete)
        pages: u32,
        /// New records inserted during this run
        inserted: u64,
    },
    /// Permanent error or exhausted retry budget
    Failed {
        /// Why the window failed
        reason: String,
    },
    /// Cancelled between pages, or before the window was picked up
    Interrupted {
        /// Cursor the next run resumes from; `None` if the window never started
        resume_from: Option<Cursor>,
    },
}

/// Outcome of one window, in planning order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowReport {
    /// Window identifier
    pub window_id: WindowId,
    /// What happened to it
    #[serde(flatten)]
    pub outcome: WindowOutcome,
}

/// Per-window results of an ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// One entry per requested window
    pub windows: Vec<WindowReport>,
}

impl RunReport {
    pub(crate) fn new(windows: Vec<WindowReport>) -> Self {
        Self { windows }
    }

    /// Windows that completed
    pub fn complete(&self) -> usize {
        self.count(|o| matches!(o, WindowOutcome::Complete { .. }))
    }

    /// Windows that failed
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, WindowOutcome::Failed { .. }))
    }

    /// Windows that were interrupted or never started
    pub fn interrupted(&self) -> usize {
        self.count(|o| matches!(o, WindowOutcome::Interrupted { .. }))
    }

    /// New records inserted across all windows
    pub fn total_inserted(&self) -> u64 {
        self.windows
            .iter()
            .map(|w| match w.outcome {
                WindowOutcome::Complete { inserted, .. } => inserted,
                _ => 0,
            })
            .sum()
    }

    /// Whether every window is COMPLETE
    pub fn is_success(&self) -> bool {
        self.complete() == self.windows.len()
    }

    /// Process exit code: 0 only if every window is COMPLETE
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Look up the outcome of a window
    pub fn outcome(&self, window_id: &WindowId) -> Option<&WindowOutcome> {
        self.windows
            .iter()
            .find(|w| &w.window_id == window_id)
            .map(|w| &w.outcome)
    }

    fn count(&self, pred: impl Fn(&WindowOutcome) -> bool) -> usize {
        self.windows.iter().filter(|w| pred(&w.outcome)).count()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for window in &self.windows {
            match &window.outcome {
                WindowOutcome::Complete { pages, inserted } => writeln!(
                    f,
                    "COMPLETE     {}  pages={} inserted={}",
                    window.window_id, pages, inserted
                )?,
                WindowOutcome::Failed { reason } => {
                    writeln!(f, "FAILED       {}  {}", window.window_id, reason)?
                }
                WindowOutcome::Interrupted {
                    resume_from: Some(cursor),
                } => writeln!(
                    f,
                    "INTERRUPTED  {}  resume_from={}",
                    window.window_id, cursor
                )?,
                WindowOutcome::Interrupted { resume_from: None } => {
                    writeln!(f, "INTERRUPTED  {}  not started", window.window_id)?
                }
            }
        }
        write!(
            f,
            "{} complete, {} failed, {} interrupted, {} new articles",
            self.complete(),
            self.failed(),
            self.interrupted(),
            self.total_inserted()
        )
    }
}
