// XLSX export: one sheet with the raw records, one with computed segments

use std::path::Path;

use pricelens_core::{column_names, CellValue, Record};
use pricelens_engine::{CrossElasticity, GoodColumns, PriceElasticity};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet, XlsxError};

use crate::IoError;

pub const RAW_SHEET_NAME: &str = "Raw data";
pub const PRICE_SHEET_NAME: &str = "Elasticity results";
pub const CROSS_SHEET_NAME: &str = "Cross elasticity results";

const MIN_COLUMN_WIDTH: f64 = 10.0;
const MAX_COLUMN_WIDTH: f64 = 60.0;

/// A rectangular result sheet: header row plus typed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    pub sheet_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    /// Columns holding whole numbers (row numbers), written without `0.00`.
    pub integer_columns: Vec<usize>,
}

/// Statistics from an export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSummary {
    pub sheets_exported: usize,
    pub raw_rows: usize,
    pub result_rows: usize,
}

/// Own-price segments as rows: price range, midpoint price, elasticity, interpretation.
pub fn price_results_table(result: &PriceElasticity) -> ResultTable {
    let rows = result
        .segments
        .iter()
        .map(|seg| {
            vec![
                CellValue::Text(format!("{} - {}", seg.price_range.0, seg.price_range.1)),
                CellValue::Number(seg.midpoint),
                CellValue::Number(seg.value),
                CellValue::Text(seg.class.description().to_string()),
            ]
        })
        .collect();

    ResultTable {
        sheet_name: PRICE_SHEET_NAME.to_string(),
        headers: vec![
            "Price range".to_string(),
            "Midpoint price".to_string(),
            "Elasticity".to_string(),
            "Interpretation".to_string(),
        ],
        rows,
        integer_columns: Vec::new(),
    }
}

/// Cross segments as rows, followed by a summary row with the average.
pub fn cross_results_table(
    result: &CrossElasticity,
    good_a: &GoodColumns,
    good_b: &GoodColumns,
) -> ResultTable {
    let mut rows: Vec<Vec<CellValue>> = result
        .segments
        .iter()
        .map(|seg| {
            vec![
                CellValue::Number((seg.row + 1) as f64),
                CellValue::Number(seg.price_range.1),
                CellValue::Number(seg.quantity_range.1),
                CellValue::Number(seg.value),
                CellValue::Text(seg.class.as_str().to_string()),
            ]
        })
        .collect();

    rows.push(vec![
        CellValue::Text("Average".to_string()),
        CellValue::Empty,
        CellValue::Empty,
        CellValue::Number(result.average_elasticity),
        CellValue::Text(result.class.description().to_string()),
    ]);

    ResultTable {
        sheet_name: CROSS_SHEET_NAME.to_string(),
        headers: vec![
            "Row".to_string(),
            good_b.price.clone(),
            good_a.quantity.clone(),
            "Cross elasticity".to_string(),
            "Class".to_string(),
        ],
        rows,
        integer_columns: vec![0],
    }
}

/// Build the in-memory workbook without touching the filesystem.
pub fn build_workbook(
    records: &[Record],
    results: &ResultTable,
) -> Result<(XlsxWorkbook, ExportSummary), IoError> {
    let mut workbook = XlsxWorkbook::new();
    let header_format = Format::new().set_bold();
    let number_format = Format::new().set_num_format("0.00");

    let headers = column_names(records);
    let raw_rows: Vec<Vec<CellValue>> = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).cloned().unwrap_or(CellValue::Empty))
                .collect()
        })
        .collect();

    let raw = workbook.add_worksheet().set_name(RAW_SHEET_NAME)?;
    write_table(raw, &headers, &raw_rows, &header_format, None, &[])?;

    let sheet = workbook.add_worksheet().set_name(&results.sheet_name)?;
    write_table(
        sheet,
        &results.headers,
        &results.rows,
        &header_format,
        Some(&number_format),
        &results.integer_columns,
    )?;

    let summary = ExportSummary {
        sheets_exported: 2,
        raw_rows: raw_rows.len(),
        result_rows: results.rows.len(),
    };
    Ok((workbook, summary))
}

/// Write the raw records and `results` to an `.xlsx` file at `path`.
pub fn export_workbook(
    path: &Path,
    records: &[Record],
    results: &ResultTable,
) -> Result<ExportSummary, IoError> {
    let (mut workbook, summary) = build_workbook(records, results)?;
    workbook.save(path)?;
    log::info!(
        "exported {} raw rows and {} result rows to {}",
        summary.raw_rows,
        summary.result_rows,
        path.display()
    );
    Ok(summary)
}

fn write_table(
    worksheet: &mut Worksheet,
    headers: &[String],
    rows: &[Vec<CellValue>],
    header_format: &Format,
    number_format: Option<&Format>,
    integer_columns: &[usize],
) -> Result<(), XlsxError> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();

    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, header_format)?;
    }

    for (r, row) in rows.iter().enumerate() {
        let row32 = (r + 1) as u32;
        for (c, value) in row.iter().enumerate() {
            let col16 = c as u16;
            let format = number_format.filter(|_| !integer_columns.contains(&c));
            match value {
                CellValue::Number(n) => match format {
                    Some(format) => {
                        worksheet.write_number_with_format(row32, col16, *n, format)?;
                    }
                    None => {
                        worksheet.write_number(row32, col16, *n)?;
                    }
                },
                CellValue::Bool(b) => {
                    worksheet.write_boolean(row32, col16, *b)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(row32, col16, s)?;
                }
                CellValue::Empty => {}
            }
            if let Some(w) = widths.get_mut(c) {
                *w = (*w).max(value.to_string().chars().count());
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        let excel_width = (*width as f64 + 2.0).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH);
        worksheet.set_column_width(col as u16, excel_width)?;
    }
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricelens_engine::{compute_arc_elasticity, compute_cross_elasticity, Observation};
    use tempfile::tempdir;

    fn record(pairs: &[(&str, f64)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::Number(*v)))
            .collect()
    }

    #[test]
    fn test_price_results_table_rows() {
        let obs = vec![
            Observation::new(0, 10.0, 100.0),
            Observation::new(1, 12.0, 80.0),
            Observation::new(2, 14.0, 70.0),
        ];
        let result = compute_arc_elasticity(&obs).unwrap();
        let table = price_results_table(&result);

        assert_eq!(table.sheet_name, PRICE_SHEET_NAME);
        assert_eq!(table.headers.len(), 4);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], CellValue::Text("10 - 12".into()));
        assert_eq!(table.rows[0][1], CellValue::Number(11.0));
    }

    #[test]
    fn test_cross_results_table_has_average_row() {
        let records = vec![
            record(&[("price_a", 5.0), ("quantity_a", 100.0), ("price_b", 10.0), ("quantity_b", 50.0)]),
            record(&[("price_a", 5.0), ("quantity_a", 110.0), ("price_b", 11.0), ("quantity_b", 48.0)]),
        ];
        let a = GoodColumns::new("price_a", "quantity_a");
        let b = GoodColumns::new("price_b", "quantity_b");
        let result = compute_cross_elasticity(&records, &a, &b).unwrap();
        let table = cross_results_table(&result, &a, &b);

        assert_eq!(table.headers[1], "price_b");
        assert_eq!(table.headers[2], "quantity_a");
        assert_eq!(table.rows.len(), 2);
        // Row numbers are 1-based like the text report and written unformatted.
        assert_eq!(table.rows[0][0], CellValue::Number(2.0));
        assert_eq!(table.integer_columns, vec![0]);
        assert_eq!(table.rows[0][1], CellValue::Number(11.0));
        assert_eq!(table.rows[0][2], CellValue::Number(110.0));
        let last = table.rows.last().unwrap();
        assert_eq!(last[0], CellValue::Text("Average".into()));
        assert_eq!(last[3], CellValue::Number(result.average_elasticity));
    }

    #[test]
    fn test_export_writes_xlsx_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let records = vec![
            record(&[("价格", 10.0), ("需求量", 100.0)]),
            record(&[("价格", 12.0), ("需求量", 80.0)]),
        ];
        let obs = vec![Observation::new(0, 10.0, 100.0), Observation::new(1, 12.0, 80.0)];
        let table = price_results_table(&compute_arc_elasticity(&obs).unwrap());

        let summary = export_workbook(&path, &records, &table).unwrap();
        assert_eq!(summary.sheets_exported, 2);
        assert_eq!(summary.raw_rows, 2);
        assert_eq!(summary.result_rows, 1);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_build_workbook_in_memory() {
        let records = vec![record(&[("price", 1.0)])];
        let table = ResultTable {
            sheet_name: "Results".into(),
            headers: vec!["x".into()],
            rows: vec![vec![CellValue::Bool(true)], vec![CellValue::Empty]],
            integer_columns: Vec::new(),
        };
        let (mut workbook, summary) = build_workbook(&records, &table).unwrap();
        assert_eq!(summary.result_rows, 2);
        let buf = workbook.save_to_buffer().unwrap();
        assert!(buf.starts_with(b"PK"));
    }

    #[test]
    fn test_invalid_sheet_name_is_error() {
        let table = ResultTable {
            sheet_name: "bad[name]".into(),
            headers: vec![],
            rows: vec![],
            integer_columns: Vec::new(),
        };
        assert!(matches!(build_workbook(&[], &table), Err(IoError::Xlsx(_))));
    }
}
