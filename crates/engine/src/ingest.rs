//! Impression ingestion: applies externally reported impression and win
//! counts to line-item counters.

use crate::line_item::{DeliveryCounters, LineItem};
use crate::pacing::{self, LineItemStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of an impression report batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpressionReport {
    #[serde(rename = "auc_lineitem_id")]
    pub line_item_id: u64,
    #[serde(rename = "imp_count", default)]
    pub impression_count: u64,
    /// When absent, wins are taken to equal impressions.
    #[serde(rename = "winning_imp_count", default, skip_serializing_if = "Option::is_none")]
    pub winning_count: Option<u64>,
}

impl ImpressionReport {
    pub fn new(line_item_id: u64, impression_count: u64, winning_count: u64) -> Self {
        Self {
            line_item_id,
            impression_count,
            winning_count: Some(winning_count),
        }
    }

    /// A report that does not distinguish wins from impressions.
    pub fn impressions_only(line_item_id: u64, impression_count: u64) -> Self {
        Self {
            line_item_id,
            impression_count,
            winning_count: None,
        }
    }

    pub fn wins(&self) -> u64 {
        self.winning_count.unwrap_or(self.impression_count)
    }
}

/// Outcome of a batch report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub applied: usize,
    pub skipped: usize,
    /// Ids that did not resolve to a line item.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_ids: Vec<u64>,
}

fn roll(counters: &mut DeliveryCounters, count: u64, same_day: bool, same_slot: bool) {
    counters.today = if same_day {
        counters.today.saturating_add(count)
    } else {
        count
    };
    counters.total = counters.total.saturating_add(count);
    counters.slot = if same_slot {
        counters.slot.saturating_add(count)
    } else {
        count
    };
}

impl LineItem {
    /// Apply one report at `now`, then recompute pacing and status.
    ///
    /// The slot counter accumulates whenever the slot number matches the
    /// previous report's, even across a day boundary.
    pub fn record_impressions(
        &mut self,
        impression_count: u64,
        winning_count: u64,
        now: DateTime<Utc>,
        slot_minutes: u32,
    ) -> LineItemStatus {
        let same_day = pacing::same_day(self.current_date, now);
        let same_slot = pacing::slot_number(self.current_date, slot_minutes)
            == pacing::slot_number(now, slot_minutes);

        if !same_day {
            // The new day's allocation comes from the total before this report.
            self.recalculate_daily_goal();
        }

        roll(&mut self.impressions, impression_count, same_day, same_slot);
        roll(&mut self.winning, winning_count, same_day, same_slot);

        self.current_date = now;
        self.recalculate_pacing(slot_minutes);
        self.update_status(now)
    }
}
