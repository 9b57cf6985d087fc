use proptest::prelude::*;
use rust_decimal::Decimal;

use cellarstock_api::models::{MovementDetails, StockSnapshot};

fn arb_decimal() -> impl Strategy<Value = Decimal> {
    // Up to three fractional digits, the resolution used for barrel counts.
    (-1_000_000i64..1_000_000i64, 0u32..=3u32).prop_map(|(mantissa, scale)| {
        Decimal::new(mantissa, scale)
    })
}

fn arb_snapshot() -> impl Strategy<Value = StockSnapshot> {
    (-10_000i32..10_000i32, -10_000i32..10_000i32, arb_decimal())
        .prop_map(|(unpackaged, packaged, water)| StockSnapshot::new(unpackaged, packaged, water))
}

fn arb_non_negative_snapshot() -> impl Strategy<Value = StockSnapshot> {
    (0i32..10_000i32, 0i32..10_000i32, (0i64..1_000_000i64, 0u32..=3u32))
        .prop_map(|(unpackaged, packaged, (mantissa, scale))| {
            StockSnapshot::new(unpackaged, packaged, Decimal::new(mantissa, scale))
        })
}

proptest! {
    #[test]
    fn apply_then_diff_recovers_the_change(before in arb_snapshot(), change in arb_snapshot()) {
        let after = before.apply(&change);
        prop_assert_eq!(after.diff(&before), change);
    }

    #[test]
    fn movement_built_from_change_is_always_consistent(
        before in arb_non_negative_snapshot(),
        change in arb_snapshot(),
    ) {
        let details = MovementDetails::from_change(before, change);
        prop_assert!(details.is_consistent());
        prop_assert_eq!(details.before, before);
        prop_assert_eq!(details.change, change);
    }

    #[test]
    fn movement_built_from_endpoints_is_always_consistent(
        before in arb_snapshot(),
        after in arb_snapshot(),
    ) {
        let details = MovementDetails::between(before, after);
        prop_assert!(details.is_consistent());
        prop_assert_eq!(details.after, after);
    }

    #[test]
    fn covering_deduction_never_goes_negative(
        current in arb_non_negative_snapshot(),
        requested in arb_non_negative_snapshot(),
    ) {
        if current.covers(&requested) {
            let after = current.apply(&requested.negate());
            prop_assert!(after.is_non_negative());
        }
    }

    #[test]
    fn uncovered_deduction_would_go_negative(
        current in arb_non_negative_snapshot(),
        requested in arb_non_negative_snapshot(),
    ) {
        if !current.covers(&requested) {
            let after = current.apply(&requested.negate());
            prop_assert!(!after.is_non_negative());
        }
    }

    #[test]
    fn total_boxes_tracks_both_pools(snapshot in arb_snapshot()) {
        prop_assert_eq!(
            snapshot.total_boxes(),
            snapshot.unpackaged_boxes + snapshot.packaged_boxes
        );
    }
}
