//! Column-role detection.
//!
//! Matching is substring and case-insensitive. Both the Chinese and English
//! keywords are recognised since source workbooks use either.

use pricelens_core::ApiError;
use serde::Serialize;

const PRICE_KEYWORDS: &[&str] = &["价格", "price"];
const QUANTITY_KEYWORDS: &[&str] = &["需求量", "quantity"];

/// Candidate price and quantity columns, in source column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnRoles {
    pub price: Vec<String>,
    pub quantity: Vec<String>,
}

/// The price and quantity columns describing one good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoodColumns {
    pub price: String,
    pub quantity: String,
}

impl GoodColumns {
    pub fn new(price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self { price: price.into(), quantity: quantity.into() }
    }
}

fn matches_any(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

pub fn is_price_column(name: &str) -> bool {
    matches_any(name, PRICE_KEYWORDS)
}

pub fn is_quantity_column(name: &str) -> bool {
    matches_any(name, QUANTITY_KEYWORDS)
}

/// Classify column names. A name can land in both lists if it carries both
/// keywords.
pub fn detect_columns<S: AsRef<str>>(names: &[S]) -> ColumnRoles {
    let mut roles = ColumnRoles::default();
    for name in names {
        let name = name.as_ref();
        if is_price_column(name) {
            roles.price.push(name.to_string());
        }
        if is_quantity_column(name) {
            roles.quantity.push(name.to_string());
        }
    }
    roles
}

impl ColumnRoles {
    /// First price column and first quantity column.
    pub fn own_price_pair(&self) -> Result<GoodColumns, ApiError> {
        match (self.price.first(), self.quantity.first()) {
            (Some(p), Some(q)) => Ok(GoodColumns::new(p.clone(), q.clone())),
            _ => Err(ApiError::validation(
                "dataset must contain a price column and a quantity column \
                 (names containing 价格/price and 需求量/quantity)",
            )),
        }
    }

    /// Default goods for cross-price analysis: the first two price columns
    /// paired with the first two quantity columns.
    pub fn cross_pairs(&self) -> Result<(GoodColumns, GoodColumns), ApiError> {
        if self.price.len() < 2 || self.quantity.len() < 2 {
            return Err(ApiError::validation(format!(
                "dataset must contain price and quantity columns for at least two goods \
                 (found {} price, {} quantity)",
                self.price.len(),
                self.quantity.len()
            )));
        }
        Ok((
            GoodColumns::new(self.price[0].clone(), self.quantity[0].clone()),
            GoodColumns::new(self.price[1].clone(), self.quantity[1].clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_mixed_language() {
        let roles = detect_columns(&["日期", "商品A价格", "商品A需求量", "Unit Price B", "QUANTITY_B"]);
        assert_eq!(roles.price, vec!["商品A价格", "Unit Price B"]);
        assert_eq!(roles.quantity, vec!["商品A需求量", "QUANTITY_B"]);
    }

    #[test]
    fn test_own_price_pair_takes_first() {
        let roles = detect_columns(&["price", "quantity", "price_2"]);
        let good = roles.own_price_pair().unwrap();
        assert_eq!(good, GoodColumns::new("price", "quantity"));
    }

    #[test]
    fn test_own_price_pair_missing() {
        let roles = detect_columns(&["cost", "quantity"]);
        assert!(roles.own_price_pair().is_err());
    }

    #[test]
    fn test_cross_pairs_require_two_goods() {
        let roles = detect_columns(&["price_a", "quantity_a", "price_b"]);
        let err = roles.cross_pairs().unwrap_err();
        assert!(err.message.contains("at least two goods"));

        let roles = detect_columns(&["price_a", "quantity_a", "price_b", "quantity_b"]);
        let (a, b) = roles.cross_pairs().unwrap();
        assert_eq!(a, GoodColumns::new("price_a", "quantity_a"));
        assert_eq!(b, GoodColumns::new("price_b", "quantity_b"));
    }
}
