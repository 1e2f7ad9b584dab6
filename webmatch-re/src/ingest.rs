//! Batch input parsing
//!
//! Company records arrive as CSV exports from whatever CRM the caller uses.
//! Header names vary across systems, so column matching is alias-driven:
//! each canonical field accepts the spellings seen in the wild.

use csv::ReaderBuilder;
use thiserror::Error;

use crate::types::CompanyRecord;

/// Header spellings accepted for each canonical field
const NAME_ALIASES: &[&str] = &[
    "name",
    "company",
    "company_name",
    "business_name",
    "organization",
];
const CITY_ALIASES: &[&str] = &["city", "town", "locality"];
const PHONE_ALIASES: &[&str] = &["phone", "phone_number", "telephone", "tel"];
const CONTEXT_ALIASES: &[&str] = &["context", "description", "industry", "notes", "category"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("CSV read failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("No column matching '{0}' in header")]
    MissingColumn(&'static str),

    #[error("CSV contains a header but no records")]
    Empty,
}

/// Column positions resolved from the header row
struct ColumnMap {
    name: usize,
    city: Option<usize>,
    phone: Option<usize>,
    context: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, IngestError> {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let name =
            find_column(&normalized, NAME_ALIASES).ok_or(IngestError::MissingColumn("name"))?;
        Ok(Self {
            name,
            city: find_column(&normalized, CITY_ALIASES),
            phone: find_column(&normalized, PHONE_ALIASES),
            context: find_column(&normalized, CONTEXT_ALIASES),
        })
    }
}

/// Lowercase, strip a UTF-8 BOM, and join words with underscores so
/// "Company Name" and "company_name" hit the same alias
fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| aliases.contains(&h.as_str()))
}

/// Parse CSV bytes into company records.
///
/// Rows shorter than the header are tolerated; missing trailing fields read
/// as absent. Per-field validation happens later inside the engine, so a row
/// with an empty name still parses here and fails resolution on its own
/// instead of sinking the whole batch.
pub fn parse_records(data: &[u8]) -> Result<Vec<CompanyRecord>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let columns = ColumnMap::from_headers(reader.headers()?)?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(record_from_row(&row, &columns));
    }

    if records.is_empty() {
        return Err(IngestError::Empty);
    }
    Ok(records)
}

fn field(row: &csv::StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn record_from_row(row: &csv::StringRecord, columns: &ColumnMap) -> CompanyRecord {
    CompanyRecord {
        name: field(row, Some(columns.name)).unwrap_or_default(),
        city: field(row, columns.city),
        phone: field(row, columns.phone),
        context: field(row, columns.context),
    }
}
