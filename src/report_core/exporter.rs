//! Exporter - AggregateTable as UTF-8 CSV (`category,date,value`)

use super::table::AggregateTable;
use crate::store::types::DATE_FORMAT;
use chrono::NaiveDate;

pub const CSV_HEADER: [&str; 3] = ["category", "date", "value"];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV flush failed: {0}")]
    Flush(String),

    #[error("malformed export at line {line}: {reason}")]
    Parse { line: u64, reason: String },
}

/// One row per (category, date, value); values use shortest round-trip formatting
pub fn export(table: &AggregateTable) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for row in table.rows() {
        let date = row.date.format(DATE_FORMAT).to_string();
        let value = row.value.to_string();
        writer.write_record([row.category.as_str(), date.as_str(), value.as_str()])?;
    }

    writer
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))
}

/// Inverse of [`export`]
pub fn parse(bytes: &[u8]) -> Result<AggregateTable, ExportError> {
    let mut reader = csv::Reader::from_reader(bytes);

    let headers = reader.headers()?.clone();
    if headers.iter().ne(CSV_HEADER.iter().copied()) {
        return Err(ExportError::Parse {
            line: 1,
            reason: format!("unexpected header {:?}", headers),
        });
    }

    let mut table = AggregateTable::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize| {
            record.get(idx).ok_or_else(|| ExportError::Parse {
                line,
                reason: format!("missing column {}", CSV_HEADER[idx]),
            })
        };

        let category = field(0)?;
        let date = NaiveDate::parse_from_str(field(1)?, DATE_FORMAT).map_err(|e| {
            ExportError::Parse {
                line,
                reason: format!("bad date: {}", e),
            }
        })?;
        let value: f64 = field(2)?.parse().map_err(|e| ExportError::Parse {
            line,
            reason: format!("bad value: {}", e),
        })?;

        table.add(category, date, value);
    }

    Ok(table)
}
