//! Outbound submission feed.
//!
//! Each child in care is expanded into every name variant the receiving
//! agency might have registered them under: compound surnames are split on
//! hyphens and spaces, compound given names on hyphens, apostrophes and
//! spaces, and the original spelling rides along with its delimiters
//! removed. Each variant becomes its own submission row, which is what
//! makes the exact-match inbound join workable without a shared key.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use chrono::NaiveDate;
use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fiscal::FiscalPeriod;
use crate::normalize::{
    fold_ascii, split_parts, strip_non_alphanumeric, MIN_GIVEN_NAME_LEN, SURNAME_PARTICLES,
};
use crate::reports::Report;

/// Width of the name field in the fixed-width submission file.
pub const NAME_FIELD_WIDTH: usize = 30;

/// One person-episode row from the quarterly care extract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CareRow {
    pub person_id: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: String,
    pub entered_care: Option<NaiveDate>,
    pub exited_care: Option<NaiveDate>,
    /// Reporting fiscal year the extract assigned this row to.
    pub fiscal_year: i32,
    /// Reporting quarter within `fiscal_year`.
    pub quarter: u32,
}

/// One expanded submission row; a person appears once per name variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboundRecord {
    pub person_id: String,
    /// `LAST,FIRST`, truncated to the submission width.
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    /// Single-character sex code: M, F or U.
    pub sex: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub entered_care: Option<NaiveDate>,
    pub exited_care: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy)]
enum NameField {
    First,
    Last,
}

impl NameField {
    fn get<'a>(&self, row: &'a CareRow) -> &'a str {
        match self {
            Self::First => &row.first_name,
            Self::Last => &row.last_name,
        }
    }

    fn set(&self, row: &mut CareRow, value: String) {
        match self {
            Self::First => row.first_name = value,
            Self::Last => row.last_name = value,
        }
    }
}

/// Fans rows containing `delimiter` in the given name field out into one
/// extra row per split part, keeping the original row. Parts in
/// `exclude` and blank parts are not emitted. When `remove_delimiter` is
/// set, the original row's field loses the delimiter characters
/// ("SMITH-JONES" stays present as "SMITHJONES").
fn split_rows_by_delimiter(
    rows: Vec<CareRow>,
    field: NameField,
    delimiter: char,
    max_parts: usize,
    exclude: Option<&[&str]>,
    remove_delimiter: bool,
) -> Vec<CareRow> {
    let mut variants = Vec::new();
    for row in &rows {
        let value = field.get(row);
        if !value.contains(delimiter) {
            continue;
        }
        for part in split_parts(value, delimiter, max_parts) {
            if exclude.is_some_and(|list| list.contains(&part.as_str())) {
                continue;
            }
            let mut variant = row.clone();
            field.set(&mut variant, part);
            variants.push(variant);
        }
    }

    let mut result = rows;
    if remove_delimiter {
        for row in &mut result {
            let value = field.get(row);
            if value.contains(delimiter) {
                let cleaned: String = value.chars().filter(|c| *c != delimiter).collect();
                field.set(row, cleaned);
            }
        }
    }
    result.extend(variants);
    result
}

/// Restricts the care extract to the reporting period: the quarter, or the
/// whole fiscal year for a catch-up run.
pub fn filter_period(rows: Vec<CareRow>, period: &FiscalPeriod) -> Vec<CareRow> {
    let before = rows.len();
    let kept: Vec<CareRow> = rows
        .into_iter()
        .filter(|row| {
            row.fiscal_year == period.fiscal_year
                && period.quarter.map(|q| row.quarter == q).unwrap_or(true)
        })
        .collect();
    info!(
        "Period filter {} kept {} of {} care rows",
        period.label(),
        kept.len(),
        before
    );
    kept
}

/// Picks one episode per (person, entry date) group: the earliest exit
/// date wins, with open episodes sorting last.
fn pick_episodes(rows: Vec<CareRow>) -> Vec<CareRow> {
    let mut by_episode: BTreeMap<(String, Option<NaiveDate>), CareRow> = BTreeMap::new();
    for row in rows {
        let key = (row.person_id.clone(), row.entered_care);
        match by_episode.get(&key) {
            Some(current)
                if current.exited_care.unwrap_or(NaiveDate::MAX)
                    <= row.exited_care.unwrap_or(NaiveDate::MAX) => {}
            _ => {
                by_episode.insert(key, row);
            }
        }
    }
    by_episode.into_values().collect()
}

fn sex_code(gender: &str) -> &'static str {
    match gender {
        "Male" => "M",
        "Female" => "F",
        _ => "U",
    }
}

fn truncate_chars(value: &str, width: usize) -> String {
    value.chars().take(width).collect()
}

/// Runs the full outbound expansion for one reporting period.
pub fn build_outbound_feed(rows: Vec<CareRow>, period: &FiscalPeriod) -> Vec<OutboundRecord> {
    let rows = filter_period(rows, period);

    // Rows without an entry date or a birth date cannot be validated by
    // the receiving agency and are dropped up front.
    let before = rows.len();
    let mut rows: Vec<CareRow> = rows
        .into_iter()
        .filter(|r| r.entered_care.is_some() && r.date_of_birth.is_some())
        .filter(|r| !r.first_name.trim().is_empty() && !r.last_name.trim().is_empty())
        .collect();
    if rows.len() < before {
        info!(
            "Dropped {} care rows missing entry date, birth date or name",
            before - rows.len()
        );
    }

    for row in &mut rows {
        row.person_id = row.person_id.trim().replace(',', "");
        row.first_name = fold_ascii(&row.first_name).trim().to_uppercase();
        row.middle_name = fold_ascii(&row.middle_name).trim().to_uppercase();
        row.last_name = fold_ascii(&row.last_name).trim().to_uppercase();
    }

    let rows = pick_episodes(rows);

    // Surname variants: hyphenated parts, then space-delimited parts with
    // the particle stopwords excluded.
    let rows = split_rows_by_delimiter(rows, NameField::Last, '-', 2, None, true);
    let mut rows =
        split_rows_by_delimiter(rows, NameField::Last, ' ', 5, Some(SURNAME_PARTICLES), false);
    for row in &mut rows {
        row.last_name = strip_non_alphanumeric(&row.last_name).replace(' ', "");
    }
    rows.retain(|r| !r.last_name.is_empty());

    // Given-name variants: hyphen, apostrophe, then space splits.
    let rows = split_rows_by_delimiter(rows, NameField::First, '-', 2, None, true);
    let mut rows = split_rows_by_delimiter(rows, NameField::First, '\'', 2, None, true);
    for row in &mut rows {
        row.middle_name = strip_non_alphanumeric(&row.middle_name).replace(' ', "");
    }
    let mut rows = split_rows_by_delimiter(rows, NameField::First, ' ', 3, None, true);
    rows.retain(|r| {
        let first = r.first_name.trim();
        !first.is_empty() && first.chars().count() >= MIN_GIVEN_NAME_LEN
    });

    // Expansion can fabricate exact duplicates (a hyphen variant and a
    // space variant collapsing to the same spelling); those are noise.
    let mut seen: HashSet<CareRow> = HashSet::new();
    let rows: Vec<CareRow> = rows.into_iter().filter(|r| seen.insert(r.clone())).collect();

    let mut records = Vec::new();
    let mut emitted: HashSet<OutboundRecord> = HashSet::new();
    for row in rows {
        let name = format!("{},{}", row.last_name, row.first_name);
        if name == "," || name.trim().is_empty() {
            continue;
        }
        let record = OutboundRecord {
            person_id: row.person_id,
            name: truncate_chars(&name, NAME_FIELD_WIDTH),
            date_of_birth: row.date_of_birth,
            sex: sex_code(&row.gender).to_string(),
            last_name: row.last_name,
            first_name: row.first_name,
            middle_name: row.middle_name,
            entered_care: row.entered_care,
            exited_care: row.exited_care,
        };
        if emitted.insert(record.clone()) {
            records.push(record);
        }
    }

    info!("Outbound feed holds {} name-variant rows", records.len());
    records
}

/// The full reference table, one row per expanded name variant.
pub fn reference_report(records: &[OutboundRecord]) -> Report {
    let fmt = |d: Option<NaiveDate>| d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
    Report {
        columns: [
            "Person_ID",
            "Name",
            "Date_of_Birth",
            "Sex",
            "Last_Name",
            "First_Name",
            "Middle_Name",
            "Entered_Care",
            "Exited_Care",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
        rows: records
            .iter()
            .map(|r| {
                vec![
                    r.person_id.clone(),
                    r.name.clone(),
                    fmt(r.date_of_birth),
                    r.sex.clone(),
                    r.last_name.clone(),
                    r.first_name.clone(),
                    r.middle_name.clone(),
                    fmt(r.entered_care),
                    fmt(r.exited_care),
                ]
            })
            .collect(),
    }
}

/// Renders one fixed-width submission line: name left-justified in 30
/// characters, ISO date of birth in 10, sex code in 1. Returns `None`
/// for rows the agency would reject outright.
pub fn render_fixed_width_line(record: &OutboundRecord) -> Option<String> {
    let name = record.name.trim();
    let sex = record.sex.trim();
    let dob = record.date_of_birth?;
    if name.is_empty() || sex.is_empty() {
        return None;
    }
    Some(format!(
        "{:<width$}{}{}",
        truncate_chars(name, NAME_FIELD_WIDTH),
        dob.format("%Y-%m-%d"),
        truncate_chars(sex, 1),
        width = NAME_FIELD_WIDTH
    ))
}

/// Writes the fixed-width submission file: no header, no delimiters,
/// newline-terminated records, duplicates collapsed. Returns the number
/// of lines written.
pub fn write_fixed_width<W: Write>(records: &[OutboundRecord], writer: &mut W) -> Result<usize> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut written = 0usize;
    let mut skipped = 0usize;

    for record in records {
        match render_fixed_width_line(record) {
            Some(line) => {
                if seen.insert(line.clone()) {
                    writeln!(writer, "{}", line)?;
                    written += 1;
                }
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        warn!("Skipped {} submission rows missing name, birth date or sex", skipped);
    }
    info!("Fixed-width submission file written ({} rows)", written);
    Ok(written)
}
