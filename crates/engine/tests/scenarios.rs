use chrono::{DateTime, Duration, TimeZone, Utc};
use lineitem_core::EngineError;
use lineitem_engine::{
    CreativeSpec, ImpressionReport, LineItemSpec, LineItemStatus, ManualClock, Registry,
};
use std::sync::Arc;

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn setup(now: DateTime<Utc>) -> (Arc<Registry>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    (Arc::new(Registry::with_clock(clock.clone())), clock)
}

fn line_item(id: i64, start: &str, end: &str, goal: i64) -> LineItemSpec {
    LineItemSpec {
        id,
        line_item_type: 2,
        price: 1.75,
        source: "openrtb".to_string(),
        fcap: "5/day".to_string(),
        startdate: start.to_string(),
        enddate: end.to_string(),
        goal,
        ..LineItemSpec::default()
    }
}

fn creative(id: i64) -> CreativeSpec {
    CreativeSpec {
        id,
        adm: "<VAST version=\"3.0\"></VAST>".to_string(),
        creative_type: "video".to_string(),
    }
}

#[test]
fn creative_round_trip() {
    let (reg, _) = setup(at(2024, 1, 1, 0, 0));
    reg.add_creative(creative(42)).unwrap();
    let fetched = reg.get_creative(42).unwrap();
    assert_eq!(fetched.id, 42);
    assert_eq!(fetched.adm, "<VAST version=\"3.0\"></VAST>");
    assert_eq!(fetched.creative_type.as_str(), "video");
}

#[test]
fn wildcard_query_is_idempotent() {
    let (reg, _) = setup(at(2024, 1, 1, 9, 30));
    for id in 1..=3 {
        reg.add_line_item(line_item(id, "2024-01-01 00:00:00", "2024-01-10 00:00:00", 900))
            .unwrap();
        reg.add_creative(creative(id * 10)).unwrap();
        reg.link_creative(id as u64, (id * 10) as u64).unwrap();
    }
    reg.report_impressions(&[ImpressionReport::new(2, 40, 30)]);

    let first = serde_json::to_value(reg.query("")).unwrap();
    let second = serde_json::to_value(reg.query("")).unwrap();
    assert_eq!(first, second);
    assert_eq!(first["lineitems"].as_array().unwrap().len(), 3);
}

#[test]
fn day_rollover_resets_today_and_recomputes_daily_goal() {
    let (reg, clock) = setup(at(2024, 1, 1, 10, 0));
    reg.add_line_item(line_item(1, "2024-01-01 00:00:00", "2024-01-11 00:00:00", 1_000))
        .unwrap();

    reg.report_impressions(&[ImpressionReport::new(1, 5, 5)]);
    let day_one = reg.get_line_item(1).unwrap();
    assert_eq!(day_one.impressions.today, 5);

    clock.advance(Duration::days(1));
    reg.report_impressions(&[ImpressionReport::new(1, 3, 3)]);
    let day_two = reg.get_line_item(1).unwrap();
    assert_eq!(day_two.impressions.today, 3);
    assert_eq!(day_two.impressions.total, 8);
    // 995 remaining as of the last day-one report, over 10 days.
    assert_eq!(day_one.daily_goal, 100);
    assert_eq!(day_two.daily_goal, 99);
}

#[test]
fn daily_goal_holds_until_rollover() {
    let (reg, clock) = setup(at(2024, 1, 1, 1, 0));
    reg.add_line_item(line_item(1, "2024-01-01 00:00:00", "2024-01-11 00:00:00", 1_000))
        .unwrap();
    assert_eq!(reg.get_line_item(1).unwrap().daily_goal, 100);

    clock.set(at(2024, 1, 1, 2, 0));
    reg.report_impressions(&[ImpressionReport::new(1, 95, 95)]);
    let li = reg.get_line_item(1).unwrap();
    assert_eq!(li.daily_goal, 100);
    assert_eq!(li.status, LineItemStatus::Delivering);

    let _ = reg.query("");
    assert_eq!(reg.get_line_item(1).unwrap().daily_goal, 100);

    clock.set(at(2024, 1, 2, 2, 0));
    reg.report_impressions(&[ImpressionReport::new(1, 300, 300)]);
    // 905 remaining as of Jan 1 02:00, over 10 days.
    assert_eq!(reg.get_line_item(1).unwrap().daily_goal, 90);
}

#[test]
fn oversized_counts_do_not_poison_the_registry() {
    let (reg, clock) = setup(at(2024, 1, 1, 10, 0));
    reg.add_line_item(line_item(1, "2024-01-01 00:00:00", "2024-01-11 00:00:00", 1_000))
        .unwrap();
    reg.report_impressions(&[ImpressionReport::new(1, u64::MAX, 1)]);
    clock.advance(Duration::minutes(1));
    let summary = reg.report_impressions(&[ImpressionReport::new(1, 1, 1)]);
    assert_eq!(summary.applied, 1);

    let li = reg.get_line_item(1).unwrap();
    assert_eq!(li.impressions.total, u64::MAX);
    assert_eq!(li.winning.total, 2);
    assert!(li.pacing >= 1);
}

#[test]
fn slot_rollover_resets_slot_count() {
    let (reg, clock) = setup(at(2024, 1, 1, 10, 2));
    reg.add_line_item(line_item(1, "2024-01-01 00:00:00", "2024-01-11 00:00:00", 1_000))
        .unwrap();

    reg.report_impressions(&[ImpressionReport::new(1, 7, 7)]);
    clock.advance(Duration::minutes(5));
    reg.report_impressions(&[ImpressionReport::new(1, 2, 2)]);
    assert_eq!(reg.get_line_item(1).unwrap().impressions.slot, 9);

    clock.advance(Duration::minutes(15));
    reg.report_impressions(&[ImpressionReport::new(1, 4, 4)]);
    let li = reg.get_line_item(1).unwrap();
    assert_eq!(li.impressions.slot, 4);
    assert_eq!(li.impressions.today, 13);
}

#[test]
fn dimensionality_mismatch_never_matches() {
    let (reg, _) = setup(at(2024, 1, 1, 0, 0));
    reg.add_line_item(line_item(1, "2024-01-01 00:00:00", "2024-01-10 00:00:00", 100))
        .unwrap();
    reg.add_creative(creative(5)).unwrap();
    reg.link_creative(1, 5).unwrap();

    assert!(reg.query("samsung:android").line_items.is_empty());
    assert!(reg.query("samsung").line_items.is_empty());
    assert_eq!(reg.query("samsung:android:sports").line_items.len(), 1);
}

#[test]
fn lifetime_goal_met_without_daily_goal_is_completed() {
    let (reg, clock) = setup(at(2024, 1, 1, 0, 0));
    reg.add_line_item(line_item(1, "2024-01-01 00:00:00", "2024-01-03 00:00:00", 100))
        .unwrap();

    clock.set(at(2024, 1, 1, 1, 0));
    reg.report_impressions(&[ImpressionReport::new(1, 0, 60)]);

    clock.set(at(2024, 1, 2, 1, 0));
    reg.report_impressions(&[ImpressionReport::new(1, 0, 40)]);

    let li = reg.get_line_item(1).unwrap();
    assert_eq!(li.winning.total, 100);
    assert_eq!(li.winning.today, 40);
    // Rolled over from zero delivered impressions with two days left.
    assert_eq!(li.daily_goal, 50);
    assert_eq!(li.status, LineItemStatus::Completed);
}

#[test]
fn meeting_both_goals_at_once_reports_partial_completed() {
    let (reg, clock) = setup(at(2024, 1, 1, 0, 0));
    reg.add_line_item(line_item(1, "2024-01-01 00:00:00", "2024-01-02 00:00:00", 100))
        .unwrap();

    clock.set(at(2024, 1, 1, 12, 0));
    reg.report_impressions(&[ImpressionReport::new(1, 100, 100)]);

    let li = reg.get_line_item(1).unwrap();
    assert_eq!(li.winning.total, 100);
    assert_eq!(li.daily_goal, 50);
    assert_eq!(li.status, LineItemStatus::PartialCompleted);
}

#[test]
fn inverted_dates_store_nothing() {
    let (reg, _) = setup(at(2024, 1, 1, 0, 0));
    let err = reg
        .add_line_item(line_item(7, "2024-02-01 00:00:00", "2024-01-01 00:00:00", 100))
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(matches!(
        reg.get_line_item(7),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn link_to_missing_creative_leaves_table_unchanged() {
    let (reg, _) = setup(at(2024, 1, 1, 0, 0));
    reg.add_line_item(line_item(1, "2024-01-01 00:00:00", "2024-01-10 00:00:00", 100))
        .unwrap();
    let before = reg.stats();

    let err = reg.link_creative(1, 99).unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "creative", id: 99 }));
    assert_eq!(reg.stats(), before);
    assert!(reg.get_line_item(1).unwrap().creative_ids.is_empty());
}

#[test]
fn outside_window_is_inactive() {
    let (reg, clock) = setup(at(2023, 12, 25, 0, 0));
    reg.add_line_item(line_item(1, "2024-01-01 00:00:00", "2024-01-10 00:00:00", 1_000))
        .unwrap();
    reg.add_creative(creative(5)).unwrap();
    reg.link_creative(1, 5).unwrap();
    assert_eq!(reg.get_line_item(1).unwrap().status, LineItemStatus::InActive);

    clock.set(at(2024, 1, 5, 0, 0));
    reg.report_impressions(&[ImpressionReport::new(1, 10, 10)]);
    assert_eq!(reg.get_line_item(1).unwrap().status, LineItemStatus::Delivering);

    clock.set(at(2024, 1, 20, 0, 0));
    let result = reg.query("");
    assert_eq!(result.line_items[0].status, LineItemStatus::InActive);
}

#[test]
fn concurrent_reports_and_queries() {
    let (reg, _) = setup(at(2024, 1, 1, 8, 0));
    for id in 1..=4 {
        reg.add_line_item(line_item(id, "2024-01-01 00:00:00", "2024-01-31 00:00:00", 1_000_000))
            .unwrap();
        reg.add_creative(creative(id)).unwrap();
        reg.link_creative(id as u64, id as u64).unwrap();
    }

    std::thread::scope(|s| {
        for worker in 0..4u64 {
            let reg = reg.clone();
            s.spawn(move || {
                for _ in 0..250 {
                    reg.report_impressions(&[ImpressionReport::new(worker % 4 + 1, 1, 1)]);
                    let _ = reg.query("");
                }
            });
        }
    });

    let total: u64 = reg
        .list_line_items()
        .iter()
        .map(|li| li.impressions.total)
        .sum();
    assert_eq!(total, 1_000);
    assert!(reg.list_line_items().iter().all(|li| li.pacing >= 1));
}
