use pricelens_core::{ApiError, Record};
use serde::Serialize;

/// One (price, quantity) data point read from a source record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    /// Index of the source record; passthrough fields stay on the record.
    pub row: usize,
    pub price: f64,
    pub quantity: f64,
}

impl Observation {
    pub fn new(row: usize, price: f64, quantity: f64) -> Self {
        Self { row, price, quantity }
    }
}

/// Extract observations from records using the given price and quantity
/// columns. Fails on the first missing or non-numeric cell.
pub fn observations(
    records: &[Record],
    price_col: &str,
    quantity_col: &str,
) -> Result<Vec<Observation>, ApiError> {
    records
        .iter()
        .enumerate()
        .map(|(row, record)| {
            Ok(Observation {
                row,
                price: read_number(record, row, price_col)?,
                quantity: read_number(record, row, quantity_col)?,
            })
        })
        .collect()
}

/// Stable ascending sort by price. Own-price elasticity expects its input
/// in this order; the engine does not re-sort.
pub fn sort_by_price(observations: &mut [Observation]) {
    observations.sort_by(|a, b| a.price.total_cmp(&b.price));
}

/// Numeric value of `column` in `record`. Row numbers in messages are
/// 1-based data rows.
pub(crate) fn read_number(record: &Record, row: usize, column: &str) -> Result<f64, ApiError> {
    let cell = record.get(column).ok_or_else(|| {
        ApiError::validation(format!("row {}: missing column {:?}", row + 1, column))
    })?;
    let value = cell.as_number().ok_or_else(|| {
        ApiError::validation(format!(
            "row {}: column {:?} is not numeric ({:?})",
            row + 1,
            column,
            cell.to_string()
        ))
    })?;
    if !value.is_finite() {
        return Err(ApiError::validation(format!(
            "row {}: column {:?} is not a finite number",
            row + 1,
            column
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricelens_core::{CellValue, ErrorKind};

    fn record(price: CellValue, qty: CellValue) -> Record {
        let mut r = Record::new();
        r.insert("Price".into(), price);
        r.insert("Quantity".into(), qty);
        r.insert("Note".into(), CellValue::from("x"));
        r
    }

    #[test]
    fn test_observations_coerce_text() {
        let records = vec![
            record(CellValue::Number(10.0), CellValue::from("100")),
            record(CellValue::from(" 12.5 "), CellValue::Number(80.0)),
        ];
        let obs = observations(&records, "Price", "Quantity").unwrap();
        assert_eq!(obs, vec![Observation::new(0, 10.0, 100.0), Observation::new(1, 12.5, 80.0)]);
    }

    #[test]
    fn test_observations_reject_non_numeric() {
        let records = vec![
            record(CellValue::Number(10.0), CellValue::Number(1.0)),
            record(CellValue::from("n/a"), CellValue::Number(2.0)),
        ];
        let err = observations(&records, "Price", "Quantity").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("row 2"));
        assert!(err.message.contains("Price"));
    }

    #[test]
    fn test_observations_missing_column() {
        let records = vec![record(CellValue::Number(1.0), CellValue::Number(1.0))];
        let err = observations(&records, "Cost", "Quantity").unwrap_err();
        assert!(err.message.contains("missing column"));
    }

    #[test]
    fn test_sort_by_price_is_stable() {
        let mut obs = vec![
            Observation::new(0, 12.0, 1.0),
            Observation::new(1, 10.0, 2.0),
            Observation::new(2, 12.0, 3.0),
        ];
        sort_by_price(&mut obs);
        let rows: Vec<usize> = obs.iter().map(|o| o.row).collect();
        assert_eq!(rows, vec![1, 0, 2]);
    }
}
