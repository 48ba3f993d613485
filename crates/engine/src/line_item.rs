//! Line items: the campaign-level delivery unit with a goal, a date window,
//! targeting rules and delivery counters.

use crate::pacing::{self, LineItemStatus, PacingInputs, PacingOutcome};
use crate::targeting::{QueryKey, TargetingMatcher};
use chrono::{DateTime, Utc};
use lineitem_core::datetime::{self, layout};
use lineitem_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Lifetime, day-scoped and slot-scoped counters for one kind of event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryCounters {
    pub total: u64,
    pub today: u64,
    pub slot: u64,
}

/// Unvalidated input for `AddLineItem`.
///
/// Targeting is given either as an explicit ordered `targeting` list, or as
/// the three named dimensions `device`, `os` and `ig` (in that order).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LineItemSpec {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub line_item_type: i64,
    pub price: f64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub fcap: String,
    pub startdate: String,
    pub enddate: String,
    pub goal: i64,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub ig: String,
    #[serde(default)]
    pub targeting: Vec<String>,
}

impl LineItemSpec {
    /// Raw per-dimension specs in matching order.
    pub fn targeting_dimensions(&self) -> Vec<String> {
        if self.targeting.is_empty() {
            vec![self.device.clone(), self.os.clone(), self.ig.clone()]
        } else {
            self.targeting.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItem {
    pub id: u64,
    #[serde(rename = "type")]
    pub line_item_type: i64,
    pub price: f64,
    pub source: String,
    pub fcap: String,
    #[serde(rename = "startdate", with = "layout")]
    pub start_date: DateTime<Utc>,
    #[serde(rename = "enddate", with = "layout")]
    pub end_date: DateTime<Utc>,
    pub goal: u64,
    pub targeting: Vec<String>,
    #[serde(rename = "targetings")]
    pub targeting_key: String,
    pub pacing: u64,
    pub status: LineItemStatus,
    pub daily_goal: i64,
    #[serde(rename = "currentdate", with = "layout")]
    pub current_date: DateTime<Utc>,
    pub impressions: DeliveryCounters,
    pub winning: DeliveryCounters,
    /// Filled from the association table when the registry hands out a copy.
    #[serde(rename = "creatives", skip_serializing_if = "Vec::is_empty")]
    pub creative_ids: Vec<u64>,
    #[serde(skip)]
    matcher: TargetingMatcher,
}

impl LineItem {
    /// Validate a spec, compile its targeting and compute the initial daily
    /// goal, pacing and status as of `now`.
    pub fn new(spec: LineItemSpec, now: DateTime<Utc>, slot_minutes: u32) -> EngineResult<Self> {
        if spec.id <= 0 {
            return Err(EngineError::validation("invalid lineitem id"));
        }
        if !spec.price.is_finite() || spec.price <= 0.0 {
            return Err(EngineError::validation("invalid lineitem price value"));
        }
        if spec.goal <= 0 {
            return Err(EngineError::validation("invalid lineitem goal"));
        }

        let start_date = datetime::parse_utc("startdate", &spec.startdate)?;
        let end_date = datetime::parse_utc("enddate", &spec.enddate)?;
        if start_date >= end_date {
            return Err(EngineError::validation(
                "invalid lineitem startdate > enddate",
            ));
        }

        let targeting = spec.targeting_dimensions();
        let matcher = TargetingMatcher::compile(&targeting)?;

        let mut line_item = Self {
            id: spec.id as u64,
            line_item_type: spec.line_item_type,
            price: spec.price,
            source: spec.source,
            fcap: spec.fcap,
            start_date,
            end_date,
            goal: spec.goal as u64,
            targeting_key: matcher.key(),
            targeting,
            pacing: 1,
            status: LineItemStatus::InActive,
            daily_goal: 0,
            current_date: now,
            impressions: DeliveryCounters::default(),
            winning: DeliveryCounters::default(),
            creative_ids: Vec::new(),
            matcher,
        };
        line_item.recalculate_daily_goal();
        line_item.recalculate_pacing(slot_minutes);
        line_item.update_status(now);
        Ok(line_item)
    }

    pub fn matches(&self, key: &QueryKey<'_>) -> bool {
        self.matcher.matches(key)
    }

    pub fn dimensions(&self) -> usize {
        self.matcher.dimensions()
    }

    fn pacing_inputs(&self) -> PacingInputs {
        PacingInputs {
            daily_goal: self.daily_goal,
            end_date: self.end_date,
            current_date: self.current_date,
            today_delivered: self.impressions.today,
            slot_delivered: self.impressions.slot,
        }
    }

    /// Spread the remaining lifetime goal over the days left as of `current_date`.
    /// Only creation and day rollover call this; the goal is fixed within a day.
    pub fn recalculate_daily_goal(&mut self) {
        let days = pacing::days_remaining(self.end_date, self.current_date);
        self.daily_goal = pacing::daily_goal(self.goal, self.impressions.total, days);
    }

    /// Recompute pacing from the counters and the stored daily goal.
    pub fn recalculate_pacing(&mut self, slot_minutes: u32) -> PacingOutcome {
        let outcome = pacing::compute(&self.pacing_inputs(), slot_minutes);
        self.pacing = outcome.pacing;
        outcome
    }

    /// Pacing a given slot impression count would produce, leaving the line
    /// item untouched.
    pub fn pacing_for_slot(&self, slot_impressions: u64, slot_minutes: u32) -> u64 {
        let inputs = PacingInputs {
            slot_delivered: slot_impressions,
            ..self.pacing_inputs()
        };
        pacing::compute(&inputs, slot_minutes).pacing
    }

    pub fn update_status(&mut self, now: DateTime<Utc>) -> LineItemStatus {
        self.status = pacing::evaluate_status(
            now,
            self.start_date,
            self.end_date,
            self.goal,
            self.daily_goal,
            self.winning.total,
            self.winning.today,
        );
        self.status
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn spec(id: i64, start: &str, end: &str, goal: i64) -> LineItemSpec {
        LineItemSpec {
            id,
            line_item_type: 1,
            price: 2.5,
            source: "pmp".to_string(),
            fcap: "3/day".to_string(),
            startdate: start.to_string(),
            enddate: end.to_string(),
            goal,
            ..LineItemSpec::default()
        }
    }

    fn jan(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_new_line_item_initial_state() {
        let li = LineItem::new(
            spec(1, "2024-01-01 00:00:00", "2024-01-03 00:00:00", 100),
            jan(1, 0),
            15,
        )
        .unwrap();
        assert_eq!(li.id, 1);
        assert_eq!(li.daily_goal, 33);
        assert_eq!(li.pacing, 1);
        assert_eq!(li.status, LineItemStatus::Delivering);
        assert_eq!(li.dimensions(), 3);
        assert_eq!(li.targeting_key, "(.*):(.*):(.*)");
    }

    #[test]
    fn test_new_line_item_before_start_is_inactive() {
        let li = LineItem::new(
            spec(1, "2024-01-05 00:00:00", "2024-01-10 00:00:00", 100),
            jan(1, 0),
            15,
        )
        .unwrap();
        assert_eq!(li.status, LineItemStatus::InActive);
    }

    #[test]
    fn test_validation_failures() {
        let now = jan(1, 0);
        let bad_id = spec(0, "2024-01-01 00:00:00", "2024-01-03 00:00:00", 100);
        let mut bad_price = spec(1, "2024-01-01 00:00:00", "2024-01-03 00:00:00", 100);
        bad_price.price = 0.0;
        let mut nan_price = bad_price.clone();
        nan_price.price = f64::NAN;
        let bad_goal = spec(1, "2024-01-01 00:00:00", "2024-01-03 00:00:00", -5);
        let inverted = spec(1, "2024-01-03 00:00:00", "2024-01-01 00:00:00", 100);
        let equal = spec(1, "2024-01-01 00:00:00", "2024-01-01 00:00:00", 100);
        let malformed = spec(1, "2024/01/01", "2024-01-03 00:00:00", 100);

        for s in [bad_id, bad_price, nan_price, bad_goal, inverted, equal, malformed] {
            assert!(matches!(
                LineItem::new(s, now, 15),
                Err(EngineError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_explicit_targeting_overrides_named_dimensions() {
        let mut s = spec(1, "2024-01-01 00:00:00", "2024-01-03 00:00:00", 100);
        s.device = "samsung".to_string();
        s.targeting = vec!["us,ca".to_string(), "".to_string()];
        let li = LineItem::new(s, jan(1, 0), 15).unwrap();
        assert_eq!(li.dimensions(), 2);
        assert!(li.matches(&QueryKey::parse("ca:whatever")));
        assert!(!li.matches(&QueryKey::parse("samsung:whatever")));
    }

    #[test]
    fn test_named_dimensions_order() {
        let mut s = spec(1, "2024-01-01 00:00:00", "2024-01-03 00:00:00", 100);
        s.device = "samsung,mi".to_string();
        s.ig = "sports".to_string();
        let li = LineItem::new(s, jan(1, 0), 15).unwrap();
        assert_eq!(li.targeting_key, "(samsung|mi):(.*):(sports)");
        assert!(li.matches(&QueryKey::parse("mi:android:sports")));
        assert!(!li.matches(&QueryKey::parse("sports:android:mi")));
    }

    #[test]
    fn test_pacing_for_slot_is_side_effect_free() {
        let li = LineItem::new(
            spec(1, "2024-01-01 00:00:00", "2024-01-11 00:00:00", 10_000),
            jan(1, 2),
            15,
        )
        .unwrap();
        // daily goal 1000 over 9 slots elapsed -> slot goal 111
        assert_eq!(li.pacing_for_slot(400, 15), 3);
        assert_eq!(li.pacing_for_slot(0, 15), 1);
        assert_eq!(li.pacing, 1);
        assert_eq!(li.impressions.slot, 0);
    }

    #[test]
    fn test_serialized_shape() {
        let li = LineItem::new(
            spec(9, "2024-01-01 00:00:00", "2024-01-03 00:00:00", 100),
            jan(1, 0),
            15,
        )
        .unwrap();
        let json = serde_json::to_value(&li).unwrap();
        assert_eq!(json["id"], 9);
        assert_eq!(json["type"], 1);
        assert_eq!(json["startdate"], "2024-01-01 00:00:00");
        assert_eq!(json["enddate"], "2024-01-03 00:00:00");
        assert_eq!(json["status"], "delivering");
        assert_eq!(json["fcap"], "3/day");
        assert!(json.get("creatives").is_none());
    }
}
