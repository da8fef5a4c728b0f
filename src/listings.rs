//! Raw listing ingestion.
//!
//! Listing exports are loosely typed: prices arrive as `"$1,250.00"`,
//! occupancy may be missing in favour of `availability_365`, and any numeric
//! column can hold junk. Everything is coerced here so the analysis core
//! only ever sees a well-formed [`Record`]. Bad numbers become 0; only
//! unreadable files are errors.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::models::{Anomaly, Record};

const OBSERVATION_DAYS: f64 = 365.0;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV parse error at line {line}: {source}")]
    Csv {
        line: usize,
        #[source]
        source: csv::Error,
    },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A cell that may hold a number, text or a stray boolean.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Lenient {
    Number(f64),
    Flag(bool),
    Text(String),
}

/// An identifier kept exactly as written.
///
/// JSON integers are accepted and printed back without going through a
/// float, so 19-digit listing ids survive intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident(pub String);

impl<'de> Deserialize<'de> for Ident {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct IdentVisitor;

        impl serde::de::Visitor<'_> for IdentVisitor {
            type Value = Ident;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an identifier string or integer")
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Ident, E> {
                Ok(Ident(value.trim().to_string()))
            }

            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Ident, E> {
                Ok(Ident(value.to_string()))
            }

            fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Ident, E> {
                Ok(Ident(value.to_string()))
            }

            fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<Ident, E> {
                Ok(Ident(value.to_string()))
            }

            fn visit_bool<E: serde::de::Error>(self, value: bool) -> Result<Ident, E> {
                Ok(Ident(value.to_string()))
            }
        }

        deserializer.deserialize_any(IdentVisitor)
    }
}

/// Anomaly labels as a JSON array or a `;`-separated CSV cell.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AnomalyCell {
    List(Vec<String>),
    Joined(String),
}

impl AnomalyCell {
    /// Known labels in input order; unknown labels are dropped.
    fn into_anomalies(self) -> Vec<Anomaly> {
        let labels = match self {
            AnomalyCell::List(labels) => labels,
            AnomalyCell::Joined(text) => text.split(';').map(str::to_string).collect(),
        };
        labels
            .iter()
            .filter_map(|label| Anomaly::from_label(label))
            .collect()
    }
}

/// One listing row as exported, before coercion.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListing {
    #[serde(default)]
    pub id: Option<Ident>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub host_id: Option<Ident>,
    #[serde(default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub neighbourhood: Option<String>,
    #[serde(default)]
    pub neighbourhood_cleansed: Option<String>,
    #[serde(default)]
    pub price: Option<Lenient>,
    #[serde(default)]
    pub estimated_occupancy_l365d: Option<Lenient>,
    #[serde(default)]
    pub occupancy: Option<Lenient>,
    #[serde(default)]
    pub availability_365: Option<Lenient>,
    #[serde(default)]
    pub review_scores_rating: Option<Lenient>,
    #[serde(default)]
    pub anomalies: Option<AnomalyCell>,
}

impl RawListing {
    pub fn into_record(self) -> Record {
        let occupancy = self.resolve_occupancy();
        let id = non_empty(self.id.map(|Ident(text)| text)).unwrap_or_default();
        let price = parse_price(self.price.as_ref());
        let rating = parse_number(self.review_scores_rating.as_ref());
        let neighbourhood = non_empty(self.neighbourhood)
            .or_else(|| non_empty(self.neighbourhood_cleansed))
            .unwrap_or_default();

        if unreadable_price(self.price.as_ref()) {
            warn!(listing = %id, "unreadable price coerced to 0");
        }

        let mut record = Record::new(id, neighbourhood, price, occupancy, rating);
        record.name = non_empty(self.name);
        record.host_id = non_empty(self.host_id.map(|Ident(text)| text));
        record.room_type = non_empty(self.room_type);
        record.anomalies = self
            .anomalies
            .map(AnomalyCell::into_anomalies)
            .unwrap_or_default();
        record
    }

    /// Estimated occupancy wins, then a plain occupancy column, then the
    /// complement of availability.
    fn resolve_occupancy(&self) -> u32 {
        let days = if let Some(value) = &self.estimated_occupancy_l365d {
            parse_number(Some(value)).trunc()
        } else if let Some(value) = &self.occupancy {
            parse_number(Some(value)).trunc()
        } else if let Some(value) = &self.availability_365 {
            OBSERVATION_DAYS - parse_number(Some(value)).trunc()
        } else {
            0.0
        };
        days.max(0.0) as u32
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn parse_number(value: Option<&Lenient>) -> f64 {
    match value {
        Some(Lenient::Number(number)) => finite_or_zero(*number),
        Some(Lenient::Text(text)) => finite_or_zero(leading_number(text.trim())),
        Some(Lenient::Flag(_)) | None => 0.0,
    }
}

/// Longest numeric prefix of `text`, so `"4.5 stars"` reads as 4.5.
fn leading_number(text: &str) -> f64 {
    let mut end = 0;
    let mut seen_dot = false;
    for (index, ch) in text.char_indices() {
        match ch {
            '0'..='9' => end = index + 1,
            '-' | '+' if index == 0 => {}
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
    }
    text[..end].parse().unwrap_or(0.0)
}

/// Currency text keeps only digits and the decimal point.
fn parse_price(value: Option<&Lenient>) -> f64 {
    match value {
        Some(Lenient::Text(text)) => {
            let digits: String = text
                .chars()
                .filter(|ch| ch.is_ascii_digit() || *ch == '.')
                .collect();
            finite_or_zero(leading_number(&digits))
        }
        other => parse_number(other).max(0.0),
    }
}

/// True for a non-empty text price with no digits in it, e.g. `"n/a"`.
fn unreadable_price(value: Option<&Lenient>) -> bool {
    match value {
        Some(Lenient::Text(text)) => {
            !text.trim().is_empty() && !text.chars().any(|ch| ch.is_ascii_digit())
        }
        _ => false,
    }
}

/// Identifier cell read from the raw row, bypassing numeric inference.
fn raw_ident(row: &csv::StringRecord, column: Option<usize>) -> Option<Ident> {
    column
        .and_then(|index| row.get(index))
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| Ident(text.to_string()))
}

/// Load listings from a CSV reader with a header row.
pub fn load_listings<R: Read>(reader: R) -> Result<Vec<Record>, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|source| IngestError::Csv { line: 1, source })?
        .clone();
    let id_column = headers.iter().position(|name| name == "id");
    let host_column = headers.iter().position(|name| name == "host_id");

    let mut records = Vec::new();
    for (line_num, result) in csv_reader.records().enumerate() {
        let line = line_num + 2;
        let row = result.map_err(|source| IngestError::Csv { line, source })?;
        let mut raw: RawListing = row
            .deserialize(Some(&headers))
            .map_err(|source| IngestError::Csv { line, source })?;
        raw.id = raw_ident(&row, id_column);
        raw.host_id = raw_ident(&row, host_column);
        records.push(raw.into_record());
    }

    Ok(records)
}

/// Load listings from a JSON array of listing objects.
pub fn load_listings_json<R: Read>(reader: R) -> Result<Vec<Record>, IngestError> {
    let raw: Vec<RawListing> = serde_json::from_reader(reader)?;
    Ok(raw.into_iter().map(RawListing::into_record).collect())
}

/// Load listings from a `.json` or CSV file.
pub fn load_listings_file(path: &Path) -> Result<Vec<Record>, IngestError> {
    let file = std::fs::File::open(path).map_err(|source| IngestError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        load_listings_json(file)
    } else {
        load_listings(file)
    }
}
