// JSON import: an array of flat objects, one per record

use std::path::Path;

use pricelens_core::Record;

use crate::IoError;

pub fn import(path: &Path) -> Result<Vec<Record>, IoError> {
    let content = std::fs::read_to_string(path)
        .map_err(|source| IoError::Read { path: path.to_path_buf(), source })?;
    import_from_str(&content)
}

pub fn import_from_str(content: &str) -> Result<Vec<Record>, IoError> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    let items = value
        .as_array()
        .ok_or_else(|| IoError::Shape("JSON input must be an array of objects".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            if !item.is_object() {
                return Err(IoError::Shape(format!(
                    "JSON record {} is not an object",
                    idx + 1
                )));
            }
            serde_json::from_value::<Record>(item.clone()).map_err(|e| {
                IoError::Shape(format!("JSON record {}: {}", idx + 1, e))
            })
        })
        .collect()
}
