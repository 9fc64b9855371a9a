// Result types shared by the own-price and cross-price computations.

use serde::{Deserialize, Serialize};

/// Own-price interpretation of an elasticity magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DemandClass {
    /// |E| > 1: quantity moves proportionally more than price.
    Elastic,
    /// |E| < 1: quantity moves proportionally less than price.
    Inelastic,
    /// |E| == 1 within [`crate::UNIT_TOLERANCE`].
    Unit,
}

impl DemandClass {
    pub fn from_magnitude(value: f64) -> Self {
        if (value - 1.0).abs() <= crate::UNIT_TOLERANCE {
            DemandClass::Unit
        } else if value > 1.0 {
            DemandClass::Elastic
        } else {
            DemandClass::Inelastic
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DemandClass::Elastic => "ELASTIC",
            DemandClass::Inelastic => "INELASTIC",
            DemandClass::Unit => "UNIT",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DemandClass::Elastic => "elastic (quantity changes proportionally more than price)",
            DemandClass::Inelastic => "inelastic (quantity changes proportionally less than price)",
            DemandClass::Unit => "unit elastic (quantity changes in proportion to price)",
        }
    }
}

/// Cross-price interpretation, driven by the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossClass {
    Substitute,
    Complement,
    Unrelated,
}

impl CrossClass {
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            CrossClass::Substitute
        } else if value < 0.0 {
            CrossClass::Complement
        } else {
            CrossClass::Unrelated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrossClass::Substitute => "SUBSTITUTE",
            CrossClass::Complement => "COMPLEMENT",
            CrossClass::Unrelated => "UNRELATED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CrossClass::Substitute => {
                "substitutes (a price rise in one raises demand for the other)"
            }
            CrossClass::Complement => {
                "complements (a price rise in one lowers demand for the other)"
            }
            CrossClass::Unrelated => "unrelated (price changes in one do not move the other)",
        }
    }
}

/// One adjacent pair of rows and the elasticity computed across it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElasticitySegment<C> {
    /// Source row index of the second row of the pair.
    pub row: usize,
    /// Prices at either end of the pair, in input order.
    pub price_range: (f64, f64),
    /// Quantities at either end of the pair, in input order.
    pub quantity_range: (f64, f64),
    /// Midpoint price.
    pub midpoint: f64,
    /// Midpoint quantity.
    pub midpoint_quantity: f64,
    /// Own-price: absolute magnitude. Cross-price: signed ratio.
    pub value: f64,
    /// Raw ratio %ΔQ / %ΔP with its sign.
    pub signed_value: f64,
    pub class: C,
}

pub type PriceSegment = ElasticitySegment<DemandClass>;
pub type CrossSegment = ElasticitySegment<CrossClass>;

/// Why a pair produced no segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Both prices equal: percentage price change is zero.
    ZeroPriceChange,
    /// q1 + q2 == 0: percentage quantity change is undefined.
    ZeroMidpointQuantity,
    /// p1 + p2 == 0: percentage price change is undefined.
    ZeroMidpointPrice,
    /// The pair's changes or their ratio exceed the range of `f64`.
    Overflow,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ZeroPriceChange => "zero price change",
            SkipReason::ZeroMidpointQuantity => "zero midpoint quantity",
            SkipReason::ZeroMidpointPrice => "zero midpoint price",
            SkipReason::Overflow => "change out of numeric range",
        }
    }
}

/// A pair excluded from the result, reported instead of emitting NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedPair {
    pub row: usize,
    pub reason: SkipReason,
}

/// Midpoint-based change between two values: `(midpoint, (b - a) / midpoint)`.
/// `None` when the midpoint is zero.
///
/// Halves are taken before adding so finite inputs near `f64::MAX` keep a
/// finite midpoint. Non-finite inputs give a non-finite change, which
/// callers check.
pub(crate) fn arc_change(a: f64, b: f64) -> Option<(f64, f64)> {
    let mid = a / 2.0 + b / 2.0;
    if mid == 0.0 {
        return None;
    }
    Some((mid, (b / 2.0 - a / 2.0) / mid * 2.0))
}

/// Shared pair arithmetic for both variants.
pub(crate) struct PairChange {
    pub midpoint: f64,
    pub midpoint_quantity: f64,
    pub ratio: f64,
}

pub(crate) fn pair_change(p1: f64, p2: f64, q1: f64, q2: f64) -> Result<PairChange, SkipReason> {
    let (midpoint, price_pct) = arc_change(p1, p2).ok_or(SkipReason::ZeroMidpointPrice)?;
    if price_pct == 0.0 {
        return Err(SkipReason::ZeroPriceChange);
    }
    let (midpoint_quantity, qty_pct) =
        arc_change(q1, q2).ok_or(SkipReason::ZeroMidpointQuantity)?;
    let ratio = qty_pct / price_pct;
    if !price_pct.is_finite() || !qty_pct.is_finite() || !ratio.is_finite() {
        return Err(SkipReason::Overflow);
    }
    Ok(PairChange { midpoint, midpoint_quantity, ratio })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demand_class_boundaries() {
        assert_eq!(DemandClass::from_magnitude(1.22), DemandClass::Elastic);
        assert_eq!(DemandClass::from_magnitude(0.5), DemandClass::Inelastic);
        assert_eq!(DemandClass::from_magnitude(1.0), DemandClass::Unit);
        assert_eq!(DemandClass::from_magnitude(1.0 + 1e-12), DemandClass::Unit);
        assert_eq!(DemandClass::from_magnitude(1.0 + 1e-6), DemandClass::Elastic);
        assert_eq!(DemandClass::from_magnitude(0.0), DemandClass::Inelastic);
    }

    #[test]
    fn test_cross_class_sign() {
        assert_eq!(CrossClass::from_sign(0.3), CrossClass::Substitute);
        assert_eq!(CrossClass::from_sign(-0.3), CrossClass::Complement);
        assert_eq!(CrossClass::from_sign(0.0), CrossClass::Unrelated);
    }

    #[test]
    fn test_arc_change_zero_midpoint() {
        assert!(arc_change(5.0, -5.0).is_none());
        let (mid, pct) = arc_change(10.0, 12.0).unwrap();
        assert_eq!(mid, 11.0);
        assert!((pct - 2.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_pair_change_skip_reasons() {
        assert_eq!(pair_change(10.0, 10.0, 1.0, 2.0).err(), Some(SkipReason::ZeroPriceChange));
        assert_eq!(pair_change(10.0, 12.0, 0.0, 0.0).err(), Some(SkipReason::ZeroMidpointQuantity));
        assert_eq!(pair_change(-1.0, 1.0, 3.0, 4.0).err(), Some(SkipReason::ZeroMidpointPrice));
    }

    #[test]
    fn test_pair_change_near_f64_max_stays_finite() {
        let change = pair_change(1.0, 2.0, -1e308, 1.5e308).unwrap();
        assert!(change.midpoint_quantity.is_finite());
        assert!((change.midpoint_quantity - 2.5e307).abs() < 1e293);
        assert!((change.ratio - 15.0).abs() < 1e-9);

        let change = pair_change(1.0, 2.0, 1e308, 1.5e308).unwrap();
        assert!((change.midpoint_quantity - 1.25e308).abs() < 1e294);
        assert!((change.ratio - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_pair_change_non_finite_change_is_skipped() {
        assert_eq!(pair_change(1.0, 2.0, 1.0, f64::INFINITY).err(), Some(SkipReason::Overflow));
        assert_eq!(pair_change(1.0, f64::MAX * 2.0, 1.0, 2.0).err(), Some(SkipReason::Overflow));
    }

    #[test]
    fn test_class_serializes_screaming() {
        assert_eq!(serde_json::to_string(&DemandClass::Elastic).unwrap(), "\"ELASTIC\"");
        assert_eq!(serde_json::to_string(&CrossClass::Complement).unwrap(), "\"COMPLEMENT\"");
    }
}
