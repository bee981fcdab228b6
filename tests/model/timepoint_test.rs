use tally::model::{TimeModifier, TimePoint};

fn tp(s: &str) -> TimePoint {
    TimePoint::new(s).unwrap()
}

#[test]
fn test_month_to_date_expansion() {
    let points = tp("20251205").month_to_date();
    let raw: Vec<&str> = points.iter().map(|p| p.as_str()).collect();
    assert_eq!(
        raw,
        vec!["20251201", "20251202", "20251203", "20251204", "20251205"]
    );
}

#[test]
fn test_month_to_date_is_idempotent() {
    let base = tp("20251205");
    let first = base.month_to_date();
    let second = base.month_to_date();
    assert_eq!(first, second);
    // Filtering the range back down reproduces it exactly.
    let refiltered: Vec<_> = first
        .iter()
        .filter(|p| p.as_str() >= "20251201" && p.as_str() <= "20251205")
        .cloned()
        .collect();
    assert_eq!(refiltered, second);
}

#[test]
fn test_month_to_date_first_of_month() {
    assert_eq!(tp("20251101").month_to_date(), vec![tp("20251101")]);
}

#[test]
fn test_last_cycle_granularity_switch() {
    // Daily points step back one day, monthly points one month.
    assert_eq!(tp("20251205").shift(TimeModifier::LastCycle).unwrap(), tp("20251204"));
    assert_eq!(tp("202512").shift(TimeModifier::LastCycle).unwrap(), tp("202511"));
}

#[test]
fn test_shift_across_year_boundary() {
    assert_eq!(tp("20250101").shift(TimeModifier::LastCycle).unwrap(), tp("20241231"));
    assert_eq!(tp("20250115").shift(TimeModifier::LastMonth).unwrap(), tp("20241215"));
    assert_eq!(tp("202501").shift(TimeModifier::LastMonth).unwrap(), tp("202412"));
}

#[test]
fn test_shift_clamps_to_month_end() {
    assert_eq!(tp("20250331").shift(TimeModifier::LastMonth).unwrap(), tp("20250228"));
    assert_eq!(tp("20240331").shift(TimeModifier::LastMonth).unwrap(), tp("20240229"));
}

#[test]
fn test_invalid_time_points_rejected() {
    assert!(TimePoint::new("20251332").is_err());
    assert!(TimePoint::new("20250230").is_err());
    assert!(TimePoint::new("abc").is_err());
    assert!(TimePoint::new("2025").is_err());
}

#[test]
fn test_serde_round_trip() {
    let point: TimePoint = serde_json::from_str("\"20251024\"").unwrap();
    assert_eq!(point, tp("20251024"));
    assert_eq!(serde_json::to_string(&point).unwrap(), "\"20251024\"");
    assert!(serde_json::from_str::<TimePoint>("\"2025-10-24\"").is_err());
}
