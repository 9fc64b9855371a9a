// Property-based tests for the elasticity engine.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use proptest::prelude::*;
use pricelens_core::{CellValue, Record};
use pricelens_engine::*;

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

/// Price-sorted observations with strictly increasing, positive prices and
/// positive quantities.
fn arb_sorted_observations() -> impl Strategy<Value = Vec<Observation>> {
    prop::collection::vec((0.01..50.0f64, 0.5..10_000.0f64), 2..40).prop_map(|steps| {
        let mut price = 1.0;
        steps
            .into_iter()
            .enumerate()
            .map(|(row, (step, qty))| {
                price += step;
                Observation::new(row, price, qty)
            })
            .collect()
    })
}

/// Prices and quantities that may hit zero midpoints or flat prices.
fn arb_degenerate_observations() -> impl Strategy<Value = Vec<Observation>> {
    prop::collection::vec((prop_oneof![Just(0.0), 1.0..5.0f64], prop_oneof![Just(0.0), 1.0..100.0f64]), 2..20)
        .prop_map(|points| {
            let mut obs: Vec<Observation> = points
                .into_iter()
                .enumerate()
                .map(|(row, (p, q))| Observation::new(row, p.round(), q))
                .collect();
            sort_by_price(&mut obs);
            obs
        })
}

fn cross_record(price_a: f64, qty_a: f64, price_b: f64, qty_b: f64) -> Record {
    let mut r = Record::new();
    r.insert("price_a".into(), CellValue::Number(price_a));
    r.insert("quantity_a".into(), CellValue::Number(qty_a));
    r.insert("price_b".into(), CellValue::Number(price_b));
    r.insert("quantity_b".into(), CellValue::Number(qty_b));
    r
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn n_observations_give_n_minus_one_non_negative_segments(obs in arb_sorted_observations()) {
        let result = compute_arc_elasticity(&obs).unwrap();
        prop_assert_eq!(result.segments.len(), obs.len() - 1);
        prop_assert!(result.skipped.is_empty());
        for seg in &result.segments {
            prop_assert!(seg.value >= 0.0);
            prop_assert!(seg.value.is_finite());
            prop_assert_eq!(seg.value, seg.signed_value.abs());
        }
    }

    #[test]
    fn arc_elasticity_is_idempotent(obs in arb_sorted_observations()) {
        let first = compute_arc_elasticity(&obs).unwrap();
        let second = compute_arc_elasticity(&obs).unwrap();
        prop_assert_eq!(first.segments.len(), second.segments.len());
        for (a, b) in first.segments.iter().zip(&second.segments) {
            prop_assert_eq!(a.value.to_bits(), b.value.to_bits());
            prop_assert_eq!(a.midpoint.to_bits(), b.midpoint.to_bits());
            prop_assert_eq!(a.class, b.class);
        }
    }

    #[test]
    fn degenerate_pairs_never_produce_nan(obs in arb_degenerate_observations()) {
        let result = compute_arc_elasticity(&obs).unwrap();
        prop_assert_eq!(result.segments.len() + result.skipped.len(), obs.len() - 1);
        for seg in &result.segments {
            prop_assert!(seg.value.is_finite());
        }
    }

    #[test]
    fn rising_b_price_with_rising_a_demand_is_substitute(
        steps in prop::collection::vec((0.01..5.0f64, 0.01..50.0f64), 1..30),
    ) {
        let (mut price_b, mut qty_a) = (10.0, 100.0);
        let mut records = vec![cross_record(3.0, qty_a, price_b, 40.0)];
        for (dp, dq) in steps {
            price_b += dp;
            qty_a += dq;
            records.push(cross_record(3.0, qty_a, price_b, 40.0));
        }
        let result = compute_cross_elasticity(
            &records,
            &GoodColumns::new("price_a", "quantity_a"),
            &GoodColumns::new("price_b", "quantity_b"),
        )
        .unwrap();
        prop_assert_eq!(result.class, CrossClass::Substitute);
        prop_assert!(result.average_elasticity > 0.0);
    }
}
