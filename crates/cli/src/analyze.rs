// Dataset commands: columns, price, cross

use std::path::{Path, PathBuf};

use pricelens_config::settings::Settings;
use pricelens_core::{column_names, Record};
use pricelens_engine::{
    compute_arc_elasticity, compute_cross_elasticity, detect_columns, observations,
    sort_by_price, ColumnRoles, CrossElasticity, GoodColumns, PriceElasticity, SkippedPair,
};
use pricelens_io::xlsx::{self, ExportSummary, ResultTable};
use pricelens_io::{load_records, InputFormat};
use serde_json::json;

use crate::CliError;

pub struct PriceArgs {
    pub file: PathBuf,
    pub price: Option<String>,
    pub quantity: Option<String>,
    pub format: Option<InputFormat>,
    pub json: bool,
    pub export: Option<PathBuf>,
    pub decimals: Option<usize>,
}

pub struct CrossArgs {
    pub file: PathBuf,
    pub price_a: Option<String>,
    pub quantity_a: Option<String>,
    pub price_b: Option<String>,
    pub quantity_b: Option<String>,
    pub format: Option<InputFormat>,
    pub json: bool,
    pub export: Option<PathBuf>,
    pub decimals: Option<usize>,
}

fn load(file: &Path, format: Option<InputFormat>) -> Result<Vec<Record>, CliError> {
    load_records(file, format).map_err(CliError::data)
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn export(path: &Path, records: &[Record], table: &ResultTable) -> Result<ExportSummary, CliError> {
    xlsx::export_workbook(path, records, table).map_err(CliError::data)
}

fn export_json(path: &Path, summary: &ExportSummary) -> serde_json::Value {
    json!({
        "path": path.display().to_string(),
        "sheets": summary.sheets_exported,
        "raw_rows": summary.raw_rows,
        "result_rows": summary.result_rows,
    })
}

// ============================================================================
// columns
// ============================================================================

pub fn cmd_columns(file: PathBuf, format: Option<InputFormat>, json: bool) -> Result<(), CliError> {
    let records = load(&file, format)?;
    let names = column_names(&records);
    let roles = detect_columns(&names);

    if json {
        return print_json(&json!({
            "rows": records.len(),
            "columns": names,
            "price": roles.price,
            "quantity": roles.quantity,
        }));
    }

    print!("{}", render_columns(&names, &roles, records.len()));
    Ok(())
}

fn render_columns(names: &[String], roles: &ColumnRoles, rows: usize) -> String {
    let width = names.iter().map(|n| n.chars().count()).max().unwrap_or(0);
    let mut out = format!("{} rows, {} columns\n", rows, names.len());
    for name in names {
        let mut tags = Vec::new();
        if roles.price.contains(name) {
            tags.push("price");
        }
        if roles.quantity.contains(name) {
            tags.push("quantity");
        }
        let pad = width - name.chars().count();
        out.push_str(&format!("  {}{}  {}\n", name, " ".repeat(pad), tags.join(", ")).trim_end());
        out.push('\n');
    }
    out
}

// ============================================================================
// price
// ============================================================================

pub fn cmd_price(args: PriceArgs) -> Result<(), CliError> {
    let settings = Settings::load();
    let decimals = args.decimals.unwrap_or(settings.decimals);
    let json = args.json || settings.json_output;

    let records = load(&args.file, args.format)?;
    let good = match (args.price, args.quantity) {
        (Some(price), Some(quantity)) => GoodColumns::new(price, quantity),
        (price, quantity) => {
            let detected = detect_columns(&column_names(&records))
                .own_price_pair()
                .map_err(|e| {
                    CliError::engine(e).with_hint("name the columns with --price and --quantity")
                })?;
            GoodColumns::new(
                price.unwrap_or(detected.price),
                quantity.unwrap_or(detected.quantity),
            )
        }
    };

    let mut points = observations(&records, &good.price, &good.quantity).map_err(CliError::engine)?;
    sort_by_price(&mut points);
    let result = compute_arc_elasticity(&points).map_err(CliError::engine)?;
    log::info!(
        "{} segments, {} skipped pairs from {} rows",
        result.segments.len(),
        result.skipped.len(),
        records.len()
    );

    let exported = match &args.export {
        Some(path) => Some((path, export(path, &records, &xlsx::price_results_table(&result))?)),
        None => None,
    };

    if json {
        let mut out = json!({
            "price_column": good.price,
            "quantity_column": good.quantity,
            "rows": records.len(),
            "segments": result.segments,
            "skipped": result.skipped,
        });
        if let Some((path, summary)) = &exported {
            out["export"] = export_json(path, summary);
        }
        return print_json(&out);
    }

    print!("{}", render_price(&good, &result, decimals));
    if let Some((path, summary)) = &exported {
        eprintln!("exported {} result rows to {}", summary.result_rows, path.display());
    }
    Ok(())
}

fn render_price(good: &GoodColumns, result: &PriceElasticity, decimals: usize) -> String {
    let d = decimals;
    let mut out = String::new();
    out.push_str(&format!("price:    {}\nquantity: {}\n\n", good.price, good.quantity));

    let ranges: Vec<String> = result
        .segments
        .iter()
        .map(|s| format!("{:.d$} - {:.d$}", s.price_range.0, s.price_range.1))
        .collect();
    let range_width = ranges.iter().map(|r| r.len()).max().unwrap_or(0).max("Price range".len());

    out.push_str(&format!(
        "{:<rw$}  {:>12}  {:>12}  {}\n",
        "Price range",
        "Midpoint",
        "Elasticity",
        "Class",
        rw = range_width
    ));
    for (seg, range) in result.segments.iter().zip(&ranges) {
        out.push_str(&format!(
            "{:<rw$}  {:>12.d$}  {:>12.d$}  {}\n",
            range,
            seg.midpoint,
            seg.value,
            seg.class.as_str(),
            rw = range_width
        ));
    }
    if result.segments.is_empty() {
        out.push_str("(no usable price changes)\n");
    }
    out.push_str(&render_skipped(&result.skipped));
    out
}

// ============================================================================
// cross
// ============================================================================

pub fn cmd_cross(args: CrossArgs) -> Result<(), CliError> {
    let settings = Settings::load();
    let decimals = args.decimals.unwrap_or(settings.decimals);
    let json = args.json || settings.json_output;

    let records = load(&args.file, args.format)?;
    let (good_a, good_b) = resolve_goods(&records, &args)?;

    let result = compute_cross_elasticity(&records, &good_a, &good_b).map_err(CliError::engine)?;
    log::info!(
        "average cross elasticity {} over {} segments ({} skipped)",
        result.average_elasticity,
        result.segments.len(),
        result.skipped.len()
    );

    let exported = match &args.export {
        Some(path) => {
            let table = xlsx::cross_results_table(&result, &good_a, &good_b);
            Some((path, export(path, &records, &table)?))
        }
        None => None,
    };

    if json {
        let mut out = json!({
            "good_a": good_a,
            "good_b": good_b,
            "rows": records.len(),
            "average_elasticity": result.average_elasticity,
            "class": result.class,
            "segments": result.segments,
            "skipped": result.skipped,
        });
        if let Some((path, summary)) = &exported {
            out["export"] = export_json(path, summary);
        }
        return print_json(&out);
    }

    print!("{}", render_cross(&good_a, &good_b, &result, decimals));
    if let Some((path, summary)) = &exported {
        eprintln!("exported {} result rows to {}", summary.result_rows, path.display());
    }
    Ok(())
}

/// Explicit flags win; anything left unset comes from column detection.
fn resolve_goods(records: &[Record], args: &CrossArgs) -> Result<(GoodColumns, GoodColumns), CliError> {
    if let (Some(pa), Some(qa), Some(pb), Some(qb)) =
        (&args.price_a, &args.quantity_a, &args.price_b, &args.quantity_b)
    {
        return Ok((GoodColumns::new(pa.clone(), qa.clone()), GoodColumns::new(pb.clone(), qb.clone())));
    }

    let (a, b) = detect_columns(&column_names(records))
        .cross_pairs()
        .map_err(|e| {
            CliError::engine(e)
                .with_hint("name the columns with --price-a, --quantity-a, --price-b and --quantity-b")
        })?;
    Ok((
        GoodColumns::new(
            args.price_a.clone().unwrap_or(a.price),
            args.quantity_a.clone().unwrap_or(a.quantity),
        ),
        GoodColumns::new(
            args.price_b.clone().unwrap_or(b.price),
            args.quantity_b.clone().unwrap_or(b.quantity),
        ),
    ))
}

fn render_cross(
    good_a: &GoodColumns,
    good_b: &GoodColumns,
    result: &CrossElasticity,
    decimals: usize,
) -> String {
    let d = decimals;
    let mut out = String::new();
    out.push_str(&format!("good A:   {} / {}\n", good_a.price, good_a.quantity));
    out.push_str(&format!("good B:   {} / {}\n\n", good_b.price, good_b.quantity));

    out.push_str(&format!(
        "{:>5}  {:>12}  {:>12}  {:>12}  {}\n",
        "Row", "Price B", "Quantity A", "Elasticity", "Class"
    ));
    for seg in &result.segments {
        out.push_str(&format!(
            "{:>5}  {:>12.d$}  {:>12.d$}  {:>12.d$}  {}\n",
            seg.row + 1,
            seg.price_range.1,
            seg.quantity_range.1,
            seg.value,
            seg.class.as_str()
        ));
    }
    out.push_str(&render_skipped(&result.skipped));
    out.push_str(&format!(
        "\naverage:  {:.d$}\nresult:   {}\n",
        result.average_elasticity,
        result.class.description()
    ));
    out
}

fn render_skipped(skipped: &[SkippedPair]) -> String {
    if skipped.is_empty() {
        return String::new();
    }
    let mut out = format!("\nskipped {} pair(s):\n", skipped.len());
    for pair in skipped {
        out.push_str(&format!("  pair ending at row {}: {}\n", pair.row + 1, pair.reason.as_str()));
    }
    out
}
