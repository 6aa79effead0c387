use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PipelineError;

/// One data row keyed by header name.
pub type RawRecord = HashMap<String, String>;

/// How forgiving the reader is about ragged rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CsvMode {
    /// Every row must have exactly as many fields as the header.
    #[default]
    Strict,
    /// Accept ragged rows, stray quotes and bad UTF-8.
    Lenient,
}

/// Read `data` into one [`RawRecord`] per data row, in file order.
pub fn read_records(data: &[u8], mode: CsvMode) -> Result<Vec<RawRecord>, PipelineError> {
    match mode {
        CsvMode::Strict => read_strict(data),
        CsvMode::Lenient => Ok(read_lenient(data)),
    }
}

fn read_strict(data: &[u8]) -> Result<Vec<RawRecord>, PipelineError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(data);

    let headers = rdr.headers()?.clone();
    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        records.push(zip_row(&headers, &row));
    }
    Ok(records)
}

fn read_lenient(data: &[u8]) -> Vec<RawRecord> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .double_quote(true)
        .from_reader(data);

    // Byte records so invalid UTF-8 degrades to replacement chars instead of an error.
    let mut rows = rdr.byte_records().filter_map(|r| match r {
        Ok(rec) => Some(
            rec.iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect::<StringRecord>(),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "skipping unreadable CSV row");
            None
        }
    });

    let Some(headers) = rows.next() else {
        return Vec::new();
    };
    rows.map(|row| zip_row(&headers, &row)).collect()
}

/// Align a row to the header by position. Extra fields are dropped, missing ones are empty.
fn zip_row(headers: &StringRecord, row: &StringRecord) -> RawRecord {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_string(), row.get(i).unwrap_or("").to_string()))
        .collect()
}
