//! Cross-price elasticity of good A's demand with respect to good B's price.
//!
//! Rows are taken in their original order (not price-sorted). Each successive
//! pair contributes `%ΔQtyA / %ΔPriceB` with its sign kept; the sign of the
//! mean decides substitute vs complement.

use pricelens_core::{ApiError, Record};
use serde::Serialize;

use crate::columns::GoodColumns;
use crate::observation::read_number;
use crate::segment::{pair_change, CrossClass, CrossSegment, SkippedPair};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossElasticity {
    /// Mean of all non-skipped per-pair elasticities; 0.0 when none remain.
    pub average_elasticity: f64,
    pub class: CrossClass,
    pub segments: Vec<CrossSegment>,
    pub skipped: Vec<SkippedPair>,
}

pub fn compute_cross_elasticity(
    records: &[Record],
    good_a: &GoodColumns,
    good_b: &GoodColumns,
) -> Result<CrossElasticity, ApiError> {
    if records.len() < 2 {
        return Err(ApiError::validation(format!(
            "at least 2 rows are required to compute cross elasticity, got {}",
            records.len()
        )));
    }
    let columns = [&good_a.price, &good_a.quantity, &good_b.price, &good_b.quantity];
    if columns.iter().enumerate().any(|(i, c)| columns[i + 1..].contains(c)) {
        return Err(ApiError::validation(
            "select two different goods: price and quantity columns must all be distinct",
        ));
    }

    let series = records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            Ok((
                read_number(record, row, &good_b.price)?,
                read_number(record, row, &good_a.quantity)?,
            ))
        })
        .collect::<Result<Vec<(f64, f64)>, ApiError>>()?;

    let mut segments = Vec::with_capacity(series.len() - 1);
    let mut skipped = Vec::new();

    for (i, pair) in series.windows(2).enumerate() {
        let row = i + 1;
        let ((price_b1, qty_a1), (price_b2, qty_a2)) = (pair[0], pair[1]);
        match pair_change(price_b1, price_b2, qty_a1, qty_a2) {
            Ok(change) => segments.push(CrossSegment {
                row,
                price_range: (price_b1, price_b2),
                quantity_range: (qty_a1, qty_a2),
                midpoint: change.midpoint,
                midpoint_quantity: change.midpoint_quantity,
                value: change.ratio,
                signed_value: change.ratio,
                class: CrossClass::from_sign(change.ratio),
            }),
            Err(reason) => {
                log::debug!("skipping rows {}..{}: {}", row - 1, row, reason.as_str());
                skipped.push(SkippedPair { row, reason });
            }
        }
    }

    let average_elasticity = if segments.is_empty() {
        0.0
    } else {
        let n = segments.len() as f64;
        segments.iter().map(|s| s.value / n).sum::<f64>()
    };

    Ok(CrossElasticity {
        average_elasticity,
        class: CrossClass::from_sign(average_elasticity),
        segments,
        skipped,
    })
}
