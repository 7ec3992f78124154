//! Registration record extraction
//!
//! One row of the widget's result table becomes one [`Record`]. Cells are
//! located by their `headers` attribute, which names the report column.

use chrono::{NaiveDate, NaiveDateTime};
use scraper::{ElementRef, Html, Selector};
use serde::{Serialize, Serializer};
use url::Url;

use crate::markup::{absolute_url, direct_text, normalize_text, select_first, MarkupPath};
use crate::{FaraError, Result};

/// Format of the registration date column
pub const DATE_FORMAT: &str = "%m/%d/%Y";

const ROWS: &str = "table.apexir_WORKSHEET_DATA tr.odd, table.apexir_WORKSHEET_DATA tr.even";
const TABLE: &str = "table.apexir_WORKSHEET_DATA";

/// One foreign principal registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Detail page URL; unique per record
    pub url: String,
    pub reg_num: Option<String>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub foreign_principal: Option<String>,
    pub registrant: Option<String>,
    #[serde(serialize_with = "serialize_date")]
    pub date: NaiveDateTime,
    /// Exhibit document links; final only after exhibit resolution
    pub exhibit_urls: Vec<String>,
}

fn serialize_date<S: Serializer>(date: &NaiveDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format("%Y-%m-%d %H:%M:%S"))
}

/// Parses a `mm/dd/yyyy` registration date into midnight of that day
///
/// There is no fallback format: anything else is an error.
pub fn parse_date(value: &str) -> Result<NaiveDateTime> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map(|date| date.and_time(chrono::NaiveTime::MIN))
        .map_err(|source| FaraError::DateParse {
            value: value.to_string(),
            source,
        })
}

fn cell_selector(column_id: &str) -> Result<Selector> {
    Ok(MarkupPath::text(&format!(r#"td[headers="{}"]"#, column_id))?
        .selector()
        .clone())
}

/// Reads a single-line column value from a table row
///
/// The cell's own text nodes are joined with a space, non-breaking spaces
/// become spaces and the result is trimmed. Empty cells are `None`.
pub fn parse_column(row: ElementRef<'_>, column_id: &str) -> Result<Option<String>> {
    let selector = cell_selector(column_id)?;
    let text = row
        .select(&selector)
        .flat_map(direct_text)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(normalize_text(&text))
}

/// Reads the address column
///
/// The cell is first read like any other single-line column. Only when that
/// is blank are the text nodes next to `<br>` elements used, joined with
/// `", "`.
pub fn parse_address(row: ElementRef<'_>) -> Result<Option<String>> {
    if let Some(address) = parse_column(row, "ADDRESS_1")? {
        return Ok(Some(address));
    }

    let selector = cell_selector("ADDRESS_1")?;
    let lines: Vec<String> = row
        .select(&selector)
        .flat_map(|cell| cell.children())
        .filter(|node| {
            [node.prev_sibling(), node.next_sibling()]
                .into_iter()
                .flatten()
                .any(|sibling| {
                    sibling
                        .value()
                        .as_element()
                        .map_or(false, |element| element.name() == "br")
                })
        })
        .filter_map(|node| node.value().as_text().and_then(|text| normalize_text(text)))
        .collect();

    Ok(normalize_text(&lines.join(", ")))
}

/// Extracts one record from a result row
///
/// # Arguments
///
/// * `row` - The `<tr>` element
/// * `page_url` - URL the row's links are relative to
///
/// # Returns
///
/// * `Ok(Record)` - The record with an empty exhibit list
/// * `Err(FaraError)` - Missing detail link or malformed date
pub fn extract_record(row: ElementRef<'_>, page_url: &Url) -> Result<Record> {
    let link = MarkupPath::attr(r#"td[headers="LINK"] a"#, "href")?;
    let url = select_first(&row, &link)
        .and_then(|href| absolute_url(page_url, &href))
        .ok_or_else(|| FaraError::MissingColumn {
            column: "LINK",
            url: page_url.to_string(),
        })?;

    let raw_date = parse_column(row, "FP_REG_DATE")?.unwrap_or_default();
    let date = parse_date(&raw_date)?;

    Ok(Record {
        url,
        reg_num: parse_column(row, "REG_NUMBER")?,
        country: parse_column(row, "COUNTRY_NAME")?,
        state: parse_column(row, "STATE")?,
        address: parse_address(row)?,
        foreign_principal: parse_column(row, "FP_NAME")?,
        registrant: parse_column(row, "REGISTRANT_NAME")?,
        date,
        exhibit_urls: Vec::new(),
    })
}

/// Extracts every record on a listing page
///
/// Each row succeeds or fails on its own. A page without the result table is
/// protocol drift.
pub fn extract_records(document: &Html, page_url: &Url) -> Result<Vec<Result<Record>>> {
    let table = MarkupPath::text(TABLE)?;
    if !crate::markup::exists(document, &table) {
        return Err(FaraError::ProtocolDrift {
            expectation: "listing table",
            url: page_url.to_string(),
        });
    }

    let rows = MarkupPath::text(ROWS)?;
    let records: Vec<Result<Record>> = document
        .select(rows.selector())
        .map(|row| extract_record(row, page_url))
        .collect();

    tracing::debug!("Found {} rows on {}", records.len(), page_url);
    Ok(records)
}
