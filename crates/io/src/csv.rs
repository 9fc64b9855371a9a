// CSV/TSV import: header row + data rows -> records

use std::path::Path;

use pricelens_core::{CellValue, Record};

use crate::IoError;

pub fn import(path: &Path) -> Result<Vec<Record>, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, delimiter)
}

pub fn import_with_delimiter(path: &Path, delimiter: u8) -> Result<Vec<Record>, IoError> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content, delimiter)
}

const DELIMITERS: &[u8] = &[b',', b';', b'\t', b'|'];

/// Guess the delimiter from the header line: the candidate splitting it into
/// the most fields wins, provided the first data rows split the same way.
/// Falls back to comma.
fn sniff_delimiter(content: &str) -> u8 {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return b',';
    };
    let rows: Vec<&str> = lines.take(5).collect();

    DELIMITERS
        .iter()
        .copied()
        .map(|delim| (delim, field_count(header, delim)))
        .filter(|&(delim, fields)| {
            fields > 1 && rows.iter().all(|row| field_count(row, delim) == fields)
        })
        .max_by_key(|&(_, fields)| fields)
        .map(|(delim, _)| delim)
        .unwrap_or(b',')
}

/// Fields in one line, honouring quotes.
fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |record| record.len())
}

/// File contents as UTF-8. A leading BOM is dropped; bytes that are not
/// valid UTF-8 are decoded as Windows-1252, which is what spreadsheet
/// tools usually write.
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let bytes = std::fs::read(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => encoding_rs::WINDOWS_1252.decode(err.as_bytes()).0.into_owned(),
    };
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Numbers become `Number`, blanks `Empty`, anything else stays text.
fn parse_field(field: &str) -> CellValue {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(field.to_string()),
    }
}

pub fn import_from_string(content: &str, delimiter: u8) -> Result<Vec<Record>, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let mut record = Record::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            let value = row.get(idx).map(parse_field).unwrap_or(CellValue::Empty);
            record.insert(header.clone(), value);
        }
        records.push(record);
    }

    Ok(records)
}
