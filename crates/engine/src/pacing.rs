//! Delivery pacing and line-item lifecycle status.
//!
//! Everything here is a pure function of a line item's counters and the
//! clock. The line item applies the results to itself.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a line item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LineItemStatus {
    InActive,
    Delivering,
    PartialCompleted,
    Completed,
}

impl LineItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InActive => "in_active",
            Self::Delivering => "delivering",
            Self::PartialCompleted => "partial_completed",
            Self::Completed => "completed",
        }
    }
}

/// Counters and dates the pacing math reads.
#[derive(Debug, Clone, Copy)]
pub struct PacingInputs {
    /// Today's allocation, fixed at creation and at each day rollover.
    pub daily_goal: i64,
    pub end_date: DateTime<Utc>,
    pub current_date: DateTime<Utc>,
    pub today_delivered: u64,
    pub slot_delivered: u64,
}

/// Result of one pacing recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PacingOutcome {
    pub days_remaining: i64,
    pub today_slots: i64,
    pub daily_goal: i64,
    pub slot_goal: i64,
    pub pacing: u64,
}

/// Days left in the campaign counting the current one. Never below 1.
///
/// Partial days are truncated, not rounded up, so the final-day branch of
/// [`today_slots`] fires during the last 24 hours of the campaign.
pub fn days_remaining(end_date: DateTime<Utc>, current_date: DateTime<Utc>) -> i64 {
    let whole_days = (end_date - current_date).num_seconds() / 86_400;
    (whole_days + 1).max(1)
}

/// Remaining lifetime goal spread over the remaining days. May be zero or
/// negative once the goal has been met.
pub fn daily_goal(goal: u64, total_delivered: u64, days_remaining: i64) -> i64 {
    let remaining = signed(goal).saturating_sub(signed(total_delivered));
    remaining / days_remaining.max(1)
}

/// Slot divisor for today's goal.
///
/// On the final day this counts slots until the end date; on any other day it
/// counts slots elapsed since midnight. Never below 1.
pub fn today_slots(
    end_date: DateTime<Utc>,
    current_date: DateTime<Utc>,
    days_remaining: i64,
    slot_minutes: u32,
) -> i64 {
    let slot_secs = i64::from(slot_minutes.max(1)) * 60;
    let slots = if days_remaining == 1 {
        (end_date - current_date).num_seconds() / slot_secs + 1
    } else {
        let midnight = current_date
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|m| m.and_utc())
            .unwrap_or(current_date);
        (current_date - midnight).num_seconds() / slot_secs + 1
    };
    slots.max(1)
}

/// Throttle multiplier: how many times over its slot goal the line item is.
pub fn pacing_ratio(slot_delivered: u64, slot_goal: i64) -> u64 {
    if slot_goal <= 0 || slot_delivered == 0 {
        return 1;
    }
    (slot_delivered / slot_goal as u64).max(1)
}

/// Pacing recomputation against the stored daily goal.
pub fn compute(inputs: &PacingInputs, slot_minutes: u32) -> PacingOutcome {
    let days = days_remaining(inputs.end_date, inputs.current_date);
    let slots = today_slots(inputs.end_date, inputs.current_date, days, slot_minutes);
    let slot_goal = inputs
        .daily_goal
        .saturating_sub(signed(inputs.today_delivered))
        / slots;

    PacingOutcome {
        days_remaining: days,
        today_slots: slots,
        daily_goal: inputs.daily_goal,
        slot_goal,
        pacing: pacing_ratio(inputs.slot_delivered, slot_goal),
    }
}

/// Status evaluation. Each check overwrites the previous one, so a line item
/// that met both its lifetime and its daily goal reports `PartialCompleted`.
pub fn evaluate_status(
    now: DateTime<Utc>,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    goal: u64,
    daily_goal: i64,
    total_won: u64,
    today_won: u64,
) -> LineItemStatus {
    let mut status = LineItemStatus::Delivering;

    if now < start_date || now > end_date {
        status = LineItemStatus::InActive;
    }

    if total_won >= goal {
        status = LineItemStatus::Completed;
    }

    if signed(today_won) >= daily_goal {
        status = LineItemStatus::PartialCompleted;
    }

    status
}

/// Counters are unbounded `u64`; goal arithmetic is signed.
fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// 1-based index of the slot `instant` falls in within its UTC day.
pub fn slot_number(instant: DateTime<Utc>, slot_minutes: u32) -> u32 {
    (instant.hour() * 60 + instant.minute()) / slot_minutes.max(1) + 1
}

/// Whether two instants fall on the same UTC calendar day.
pub fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}
