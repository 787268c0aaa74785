use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

use dupescope_core::Record;

/// Read a JSON array of `{"id": ..., "fields": {...}}` records. `-` reads stdin.
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read records from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?
    };

    let records: Vec<Record> = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON array of records", path.display()))?;
    Ok(records)
}
