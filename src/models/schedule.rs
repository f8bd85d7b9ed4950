//! Scheduling and cycle state types

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::utils::time::resolve_local;

/// Milliseconds in one day, used to push a stale plan forward
pub const ONE_DAY_MS: i64 = 86_400_000;

/// Hour range, in the configured time zone, within which the next run is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl ScheduleWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// Half-open `[start, end)` bounds of the window on `date`
    ///
    /// When `end_hour < start_hour` the window wraps past midnight and ends
    /// on the following day. Equal hours give an empty window (`start == end`).
    pub fn bounds_on(&self, date: NaiveDate, tz: Tz) -> (DateTime<Tz>, DateTime<Tz>) {
        let start = resolve_local(tz, date, self.start_hour);
        let end_date = if self.end_hour < self.start_hour {
            date.succ_opt().unwrap_or(date)
        } else {
            date
        };
        let end = resolve_local(tz, end_date, self.end_hour);
        (start, end.max(start))
    }
}

/// When the next cycle fires and how long until then
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    pub next_run_at: DateTime<Utc>,
    pub remaining_ms: i64,
}

impl RunPlan {
    /// Build a plan relative to `now`
    ///
    /// A negative delay (past instant, clock skew) is corrected by exactly
    /// one day so the plan always moves forward.
    pub fn new(next_run_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let remaining_ms = (next_run_at - now).num_milliseconds();
        if remaining_ms < 0 {
            Self {
                next_run_at: next_run_at + Duration::milliseconds(ONE_DAY_MS),
                remaining_ms: remaining_ms + ONE_DAY_MS,
            }
        } else {
            Self {
                next_run_at,
                remaining_ms,
            }
        }
    }

    /// Delay until the plan fires, clamped at zero
    pub fn remaining(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.remaining_ms.max(0) as u64)
    }
}

/// Calendar dates requested from the upstream, both inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Ceiling on the requested window to keep the upstream load bounded
    pub const MAX_DAYS: u32 = 7;

    /// Range of `days` days starting at `today`; `days` is clamped to `1..=7`
    pub fn from_today(today: NaiveDate, days: u32) -> Self {
        let days = clamp_days(days);
        Self {
            start: today,
            end: today + Duration::days(i64::from(days) - 1),
        }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Clamp a lookahead to the supported `1..=7` days
pub fn clamp_days(days: u32) -> u32 {
    days.clamp(1, DateRange::MAX_DAYS)
}

/// Terminal result of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleOutcome {
    Ok,
    Failed,
}

/// Per-cycle state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleState {
    Idle,
    Fetching,
    Converting,
    Settled(CycleOutcome),
}

impl CycleState {
    /// Whether a cycle is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, CycleState::Fetching | CycleState::Converting)
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleState::Idle => write!(f, "idle"),
            CycleState::Fetching => write!(f, "fetching"),
            CycleState::Converting => write!(f, "converting"),
            CycleState::Settled(CycleOutcome::Ok) => write!(f, "settled(ok)"),
            CycleState::Settled(CycleOutcome::Failed) => write!(f, "settled(failed)"),
        }
    }
}

/// Operator-visible conversion counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub channel_count: usize,
    pub programme_count: usize,
}
