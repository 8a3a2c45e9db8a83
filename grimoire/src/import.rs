//! CSV import and export of collection cards.
//!
//! The import format is a comma-delimited file with a header row naming the `Name`, `Set`
//! and `Quantity` columns, in any order and any letter case. Other columns are ignored.
//! Invalid rows are reported by line number and skipped; the rest are merged into the
//! target collection by [`Collections::merge_cards`](crate::db::handlers::Collections::merge_cards).

use crate::config::ImportConfig;
use crate::db::models::cards::{CardCreateDBRequest, CollectionCard};
use crate::errors::Error;
use csv::{Position, ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::Serialize;
use thiserror::Error as ThisError;
use utoipa::ToSchema;

/// Largest quantity a single row may carry
pub const MAX_QUANTITY: u32 = 10_000;

const REQUIRED_COLUMNS: [&str; 3] = ["name", "set", "quantity"];

/// A row that was skipped, with its 1-based line in the file (the header is line 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ParsedImport {
    pub cards: Vec<CardCreateDBRequest>,
    pub errors: Vec<RowError>,
}

#[derive(Debug, ThisError)]
pub enum ImportError {
    #[error("File is larger than the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("CSV header is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<&'static str>),

    #[error("File has more than {limit} rows")]
    TooManyRows { limit: usize },

    #[error("No valid rows found ({rejected} rejected)")]
    NoValidRows { rejected: usize },

    #[error("Could not read CSV: {0}")]
    Malformed(#[from] csv::Error),
}

impl From<ImportError> for Error {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::TooLarge { .. } => Error::PayloadTooLarge { message: err.to_string() },
            _ => Error::BadRequest { message: err.to_string() },
        }
    }
}

/// Column positions resolved from the header row
struct Columns {
    name: usize,
    set: usize,
    quantity: usize,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Result<Self, ImportError> {
        let find = |wanted: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(wanted))
        };

        match (find("name"), find("set"), find("quantity")) {
            (Some(name), Some(set), Some(quantity)) => Ok(Self { name, set, quantity }),
            found => {
                let present = [found.0.is_some(), found.1.is_some(), found.2.is_some()];
                let missing = REQUIRED_COLUMNS
                    .iter()
                    .zip(present)
                    .filter(|(_, present)| !present)
                    .map(|(column, _)| *column)
                    .collect();
                Err(ImportError::MissingColumns(missing))
            }
        }
    }
}

fn parse_quantity(raw: &str) -> Result<u32, String> {
    if raw.is_empty() {
        return Ok(1);
    }
    match raw.parse::<u32>() {
        Ok(q) if (1..=MAX_QUANTITY).contains(&q) => Ok(q),
        Ok(_) => Err(format!("Quantity must be between 1 and {MAX_QUANTITY}")),
        Err(_) => Err(format!("Invalid quantity '{raw}'")),
    }
}

/// 1-based physical line a record starts on.
///
/// The reader reports where it started looking for the record, which is before any blank lines
/// it skipped, and its own line counter leaves those lines out.
fn physical_line(bytes: &[u8], position: &Position) -> u64 {
    let from = usize::try_from(position.byte()).map_or(bytes.len(), |o| o.min(bytes.len()));
    let start = bytes[from..]
        .iter()
        .position(|b| !matches!(b, b'\r' | b'\n'))
        .map_or(bytes.len(), |skipped| from + skipped);
    bytes[..start].iter().filter(|b| **b == b'\n').count() as u64 + 1
}

/// Parse an uploaded file.
///
/// Whole-file problems (size, header, row count, nothing usable) are errors; individual bad
/// rows are collected in [`ParsedImport::errors`].
pub fn parse(bytes: &[u8], limits: &ImportConfig) -> Result<ParsedImport, ImportError> {
    if bytes.len() > limits.max_file_size {
        return Err(ImportError::TooLarge {
            limit: limits.max_file_size,
        });
    }

    let mut reader = ReaderBuilder::new().trim(Trim::All).flexible(true).from_reader(bytes);
    let columns = Columns::resolve(reader.headers()?)?;

    let mut cards = Vec::new();
    let mut errors = Vec::new();
    let mut rows = 0;

    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let Some(line) = e.position().map(|p| physical_line(bytes, p)) else {
                    return Err(e.into());
                };
                errors.push(RowError {
                    line,
                    message: "Row is not valid UTF-8 text".to_string(),
                });
                continue;
            }
        };

        if record.iter().all(str::is_empty) {
            continue;
        }
        rows += 1;
        if rows > limits.max_rows {
            return Err(ImportError::TooManyRows { limit: limits.max_rows });
        }

        let line = record.position().map(|p| physical_line(bytes, p)).unwrap_or_default();
        let name = record.get(columns.name).unwrap_or_default();
        let set_code = record.get(columns.set).unwrap_or_default();

        if name.is_empty() {
            errors.push(RowError {
                line,
                message: "Name is required".to_string(),
            });
            continue;
        }

        match parse_quantity(record.get(columns.quantity).unwrap_or_default()) {
            Ok(quantity) => cards.push(CardCreateDBRequest::new(name, set_code, quantity)),
            Err(message) => errors.push(RowError { line, message }),
        }
    }

    if cards.is_empty() {
        return Err(ImportError::NoValidRows { rejected: errors.len() });
    }

    metrics::counter!("grimoire_import_rows_total", "outcome" => "accepted").increment(cards.len() as u64);
    metrics::counter!("grimoire_import_rows_total", "outcome" => "rejected").increment(errors.len() as u64);

    Ok(ParsedImport { cards, errors })
}

/// Write a collection's cards in the import format
pub fn export(cards: &[CollectionCard]) -> anyhow::Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(["Name", "Set", "Quantity"])?;
    for card in cards {
        writer.write_record([card.name.as_str(), card.set_code.as_str(), &card.quantity.to_string()])?;
    }
    writer.into_inner().map_err(|e| anyhow::anyhow!("flushing CSV: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn limits() -> ImportConfig {
        ImportConfig::default()
    }

    #[test]
    fn test_parses_columns_in_any_order_and_case() {
        let csv = "quantity,Condition,SET,name\n4,NM,lea,Lightning Bolt\n ,LP,,Island\n";
        let parsed = parse(csv.as_bytes(), &limits()).unwrap();

        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.cards.len(), 2);
        assert_eq!(parsed.cards[0].name, "Lightning Bolt");
        assert_eq!(parsed.cards[0].set_code, "lea");
        assert_eq!(parsed.cards[0].quantity, 4);
        // Empty quantity means one copy, empty set is allowed
        assert_eq!(parsed.cards[1].name, "Island");
        assert_eq!(parsed.cards[1].set_code, "");
        assert_eq!(parsed.cards[1].quantity, 1);
    }

    #[test]
    fn test_bad_rows_are_reported_with_line_numbers() {
        let csv = "Name,Set,Quantity\nCounterspell,7ED,2\n,7ED,1\nShock,M19,zero\n\nOpt,XLN,0\nGiant Growth,LEA,10001\nDark Ritual,LEA,3\n";
        let parsed = parse(csv.as_bytes(), &limits()).unwrap();

        let names: Vec<_> = parsed.cards.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Counterspell", "Dark Ritual"]);

        let lines: Vec<_> = parsed.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 6, 7]);
        assert_eq!(parsed.errors[0].message, "Name is required");
        assert_eq!(parsed.errors[1].message, "Invalid quantity 'zero'");
        assert!(parsed.errors[2].message.contains("between 1 and 10000"));
    }

    #[test]
    fn test_line_numbers_count_blank_lines() {
        let csv = "Name,Set,Quantity\r\n\r\n\r\nSol Ring,C21,1\r\n\r\nMox Pearl,LEA,x\r\n";
        let parsed = parse(csv.as_bytes(), &limits()).unwrap();

        assert_eq!(parsed.cards.len(), 1);
        assert_eq!(parsed.errors, vec![RowError {
            line: 6,
            message: "Invalid quantity 'x'".to_string(),
        }]);
    }

    #[test]
    fn test_header_with_byte_order_mark() {
        let csv = "\u{feff}Name,Set,Quantity\nSol Ring,C21,1\n";
        let parsed = parse(csv.as_bytes(), &limits()).unwrap();
        assert_eq!(parsed.cards.len(), 1);
    }

    #[test]
    fn test_whole_file_failures() {
        let missing = parse(b"Name,Count\nSol Ring,1\n", &limits()).unwrap_err();
        assert!(matches!(&missing, ImportError::MissingColumns(cols) if cols == &vec!["set", "quantity"]));

        let nothing_valid = parse(b"Name,Set,Quantity\n,LEA,1\n", &limits()).unwrap_err();
        assert!(matches!(nothing_valid, ImportError::NoValidRows { rejected: 1 }));

        let header_only = parse(b"Name,Set,Quantity\n", &limits()).unwrap_err();
        assert!(matches!(header_only, ImportError::NoValidRows { rejected: 0 }));

        let small = ImportConfig {
            max_file_size: 16,
            max_rows: 10,
        };
        let too_large = parse(b"Name,Set,Quantity\nSol Ring,C21,1\n", &small).unwrap_err();
        assert!(matches!(too_large, ImportError::TooLarge { limit: 16 }));

        let few_rows = ImportConfig {
            max_file_size: 1024,
            max_rows: 1,
        };
        let too_many = parse(b"Name,Set,Quantity\nA,X,1\nB,X,1\n", &few_rows).unwrap_err();
        assert!(matches!(too_many, ImportError::TooManyRows { limit: 1 }));
    }

    #[test]
    fn test_errors_map_to_status_codes() {
        use axum::http::StatusCode;

        let too_large: Error = ImportError::TooLarge { limit: 1 }.into();
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);

        let missing: Error = ImportError::MissingColumns(vec!["name"]).into();
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_export_can_be_imported_again() {
        let cards = vec![CollectionCard {
            id: Uuid::new_v4(),
            name: "Ajani, Caller of the Pride".to_string(),
            set_code: "M13".to_string(),
            quantity: 2,
            foil: false,
            notes: None,
            added_at: Utc::now(),
        }];

        let bytes = export(&cards).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert_eq!(text.lines().next(), Some("Name,Set,Quantity"));
        assert!(text.contains("\"Ajani, Caller of the Pride\",M13,2"));

        let parsed = parse(&bytes, &limits()).unwrap();
        assert_eq!(parsed.cards[0].name, "Ajani, Caller of the Pride");
        assert_eq!(parsed.cards[0].quantity, 2);
    }
}
