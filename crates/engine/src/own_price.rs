//! Own-price arc elasticity.
//!
//! For each adjacent pair `(p1, q1), (p2, q2)`:
//!
//! ```text
//! avgP = (p1 + p2) / 2        %ΔP = (p2 - p1) / avgP
//! avgQ = (q1 + q2) / 2        %ΔQ = (q2 - q1) / avgQ
//! E    = |%ΔQ / %ΔP|
//! ```
//!
//! Pairs with a zero midpoint or a zero price change are reported in
//! [`PriceElasticity::skipped`] rather than producing NaN or infinity.

use pricelens_core::ApiError;
use serde::Serialize;

use crate::observation::Observation;
use crate::segment::{pair_change, DemandClass, PriceSegment, SkippedPair};

/// Absolute tolerance around 1.0 for [`DemandClass::Unit`].
pub const UNIT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceElasticity {
    pub segments: Vec<PriceSegment>,
    pub skipped: Vec<SkippedPair>,
}

/// Arc elasticity across each adjacent pair of `observations`.
///
/// Input must already be sorted ascending by price (see
/// [`crate::sort_by_price`]); output follows input adjacency.
pub fn compute_arc_elasticity(observations: &[Observation]) -> Result<PriceElasticity, ApiError> {
    if observations.len() < 2 {
        return Err(ApiError::validation(format!(
            "at least 2 observations are required to compute elasticity, got {}",
            observations.len()
        )));
    }
    if let Some(bad) = observations
        .iter()
        .find(|o| !o.price.is_finite() || !o.quantity.is_finite())
    {
        return Err(ApiError::validation(format!(
            "row {}: price and quantity must be finite numbers",
            bad.row + 1
        )));
    }
    debug_assert!(
        observations.windows(2).all(|w| w[0].price <= w[1].price),
        "observations must be sorted by price"
    );

    let mut segments = Vec::with_capacity(observations.len() - 1);
    let mut skipped = Vec::new();

    for pair in observations.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        match pair_change(a.price, b.price, a.quantity, b.quantity) {
            Ok(change) => {
                let value = change.ratio.abs();
                segments.push(PriceSegment {
                    row: b.row,
                    price_range: (a.price, b.price),
                    quantity_range: (a.quantity, b.quantity),
                    midpoint: change.midpoint,
                    midpoint_quantity: change.midpoint_quantity,
                    value,
                    signed_value: change.ratio,
                    class: DemandClass::from_magnitude(value),
                });
            }
            Err(reason) => {
                log::debug!("skipping pair ending at row {}: {}", b.row, reason.as_str());
                skipped.push(SkippedPair { row: b.row, reason });
            }
        }
    }

    Ok(PriceElasticity { segments, skipped })
}
