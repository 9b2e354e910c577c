//! Run modes, phases and progress counters

use serde::Serialize;
use std::fmt;

/// What a run does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Page backwards from the newest post until caught up with the store
    Update,
    /// Fetch an explicit list of ids, one request each
    TargetedFetch { ids: Vec<i64> },
    /// Fetch up to `limit` ids missing inside the stored id range
    Repair { limit: usize },
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Update => "update",
            Mode::TargetedFetch { .. } => "fetch_ids",
            Mode::Repair { .. } => "repair_missing",
        }
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Enough consecutive already-stored posts were seen
    KnownStreak,
    PageLimit,
    PostLimit,
    /// A feed page held no posts
    FeedExhausted,
    /// The cursor did not move between two pages
    PaginationStuck,
    /// Cancelled by the user
    Cancelled,
    /// Every requested id was handled
    Completed,
    /// The store has no id range or no gaps inside it
    NothingToRepair,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::KnownStreak => "known streak reached",
            StopReason::PageLimit => "page limit reached",
            StopReason::PostLimit => "post limit reached",
            StopReason::FeedExhausted => "feed exhausted",
            StopReason::PaginationStuck => "pagination stuck",
            StopReason::Cancelled => "cancelled",
            StopReason::Completed => "completed",
            StopReason::NothingToRepair => "nothing to repair",
        };
        write!(f, "{}", s)
    }
}

/// Orchestrator state, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Paging,
    Draining,
    Checkpointing,
    Stopped(StopReason),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Paging => write!(f, "paging"),
            Phase::Draining => write!(f, "draining"),
            Phase::Checkpointing => write!(f, "checkpointing"),
            Phase::Stopped(reason) => write!(f, "stopped ({})", reason),
        }
    }
}

/// In-memory counters of one run
///
/// Serialized as the checkpoint artifact. Never read back.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunProgress {
    pub channel: String,
    pub mode: String,
    /// Cursor of the next feed page (update mode only)
    pub before: Option<i64>,
    pub pages: u32,
    pub processed_posts: u32,
    pub inserted_posts: u32,
    pub inserted_events: u32,
    pub known_streak: u32,
    pub missing_recorded: u32,
    pub outcome: Option<StopReason>,
    pub error: Option<String>,
}

impl RunProgress {
    pub fn new(channel: &str, mode: &Mode) -> Self {
        Self {
            channel: channel.to_string(),
            mode: mode.name().to_string(),
            ..Self::default()
        }
    }

    /// Posts plus events inserted so far
    pub fn insertions(&self) -> u64 {
        u64::from(self.inserted_posts) + u64::from(self.inserted_events)
    }
}

/// Result of a run that did not fail
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: i64,
    pub reason: StopReason,
    pub progress: RunProgress,
}
