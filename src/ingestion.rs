use std::fs;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use log::{debug, info};

use crate::error::{ReconcileError, Result};
use crate::normalize::match_key;
use crate::schema::{CountyRegion, DirectoryEntry, EventRecord, EventStatus, PersonRecord, RosterEntry};

/// Headers of the agency result file, as the import format defines them.
const COL_MATCH_NAME: &str = "CPS NAME";
const COL_FULL_NAME: &str = "FULL NAME";
const COL_DOB: &str = "CPS DOB";
const COL_LAST_CONTACT: &str = "LAST CONT";
const COL_STATUS: &str = "STS";
const COL_AGENCY: &str = "ORI DESC";
const COL_COUNTY: &str = "COUNTY NAME";
const COL_PHONE: &str = "ORI PHONE";
const COL_NIC: &str = "NIC #";
const COL_LOCATED: &str = "LOCATE DTE";
const COL_CLEARED: &str = "CLR/CAN DTE";

const REQUIRED_EVENT_COLUMNS: &[&str] = &[
    COL_MATCH_NAME,
    COL_FULL_NAME,
    COL_DOB,
    COL_LAST_CONTACT,
    COL_STATUS,
    COL_AGENCY,
    COL_COUNTY,
    COL_PHONE,
    COL_NIC,
    COL_LOCATED,
    COL_CLEARED,
];

/// Internal agency codes present in the import but never carried into any
/// report; recognized so they are not mistaken for forward-compat extras.
const DISCARDED_EVENT_COLUMNS: &[&str] = &["DOE", "ORI"];

/// Lenient date coercion for import cells: blank or unparseable values
/// become `None`, never an error. A missing date degrades the row's
/// eligibility downstream instead of aborting the run.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    const FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Parses the colon-delimited agency result text.
///
/// The feed is almost a uniform delimited format, with two quirks the
/// parser must normalize before anything else: the header row carries no
/// trailing record terminator while every data row does, and that trailing
/// terminator produces one spurious empty column. The header is patched to
/// match the data rows, the empty column is dropped, and every header and
/// cell is whitespace-trimmed.
pub fn parse_event_text(text: &str) -> Result<Vec<EventRecord>> {
    let mut lines = text.lines();
    let header = match lines.next() {
        Some(h) if !h.trim().is_empty() => h.trim_end(),
        _ => return Err(ReconcileError::EmptyImport("event import".to_string())),
    };

    // Align the header with the data rows before parsing.
    let mut patched = format!("{}:\n", header);
    for line in lines {
        patched.push_str(line);
        patched.push('\n');
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(b':')
        .flexible(true)
        .from_reader(patched.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let index_of = |column: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| ReconcileError::MissingColumn {
                table: "event import".to_string(),
                column: column.to_string(),
            })
    };

    let match_name_idx = index_of(COL_MATCH_NAME)?;
    let full_name_idx = index_of(COL_FULL_NAME)?;
    let dob_idx = index_of(COL_DOB)?;
    let last_contact_idx = index_of(COL_LAST_CONTACT)?;
    let status_idx = index_of(COL_STATUS)?;
    let agency_idx = index_of(COL_AGENCY)?;
    let county_idx = index_of(COL_COUNTY)?;
    let phone_idx = index_of(COL_PHONE)?;
    let nic_idx = index_of(COL_NIC)?;
    let located_idx = index_of(COL_LOCATED)?;
    let cleared_idx = index_of(COL_CLEARED)?;

    // Columns past the last named header are the spurious trailing field;
    // anything else unnamed-and-unknown rides along as an extra.
    let extra_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            !h.is_empty()
                && !REQUIRED_EVENT_COLUMNS.contains(&h.as_str())
                && !DISCARDED_EVENT_COLUMNS.contains(&h.as_str())
        })
        .map(|(i, h)| (i, h.clone()))
        .collect();

    let mut events = Vec::new();
    let mut dropped_blank = 0usize;

    for record in reader.records() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();

        let full_name = cell(full_name_idx);
        let date_of_birth = parse_date(&cell(dob_idx));
        if full_name.is_empty() && date_of_birth.is_none() {
            dropped_blank += 1;
            continue;
        }

        let extra = extra_columns
            .iter()
            .map(|(idx, name)| (name.clone(), cell(*idx)))
            .collect();

        events.push(EventRecord {
            match_name: match_key(&cell(match_name_idx)),
            full_name,
            date_of_birth,
            last_contact: parse_date(&cell(last_contact_idx)),
            located_on: parse_date(&cell(located_idx)),
            cleared_on: parse_date(&cell(cleared_idx)),
            status: EventStatus::parse(&cell(status_idx)),
            agency: cell(agency_idx),
            county: cell(county_idx),
            phone: cell(phone_idx),
            nic: cell(nic_idx),
            extra,
        });
    }

    if events.is_empty() {
        return Err(ReconcileError::EmptyImport("event import".to_string()));
    }
    if dropped_blank > 0 {
        debug!(
            "Dropped {} event rows missing both name and date of birth",
            dropped_blank
        );
    }
    info!("Loaded {} rows from event import", events.len());

    Ok(events)
}

pub fn read_event_file<P: AsRef<Path>>(path: P) -> Result<Vec<EventRecord>> {
    let text = fs::read_to_string(path)?;
    parse_event_text(&text)
}

fn column_index(headers: &csv::StringRecord, table: &str, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| ReconcileError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}

/// Reads the care-episode reference table (the spreadsheet extract the
/// submission pipeline produced, materialized as CSV by the caller).
/// A missing `Exited_Care` cell means the episode is still open.
pub fn read_person_table<R: Read>(reader: R) -> Result<Vec<PersonRecord>> {
    let mut csv_reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let name_idx = column_index(&headers, "person table", "Name")?;
    let dob_idx = column_index(&headers, "person table", "Date_of_Birth")?;
    let id_idx = column_index(&headers, "person table", "Person_ID")?;
    let entered_idx = column_index(&headers, "person table", "Entered_Care")?;
    let exited_idx = column_index(&headers, "person table", "Exited_Care")?;

    let mut persons = Vec::new();
    let mut dropped_blank = 0usize;
    for record in csv_reader.records() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();

        let name = cell(name_idx);
        let date_of_birth = parse_date(&cell(dob_idx));
        if name.is_empty() && date_of_birth.is_none() {
            dropped_blank += 1;
            continue;
        }

        persons.push(PersonRecord {
            name,
            date_of_birth,
            person_id: cell(id_idx),
            entered_care: parse_date(&cell(entered_idx)),
            exited_care: parse_date(&cell(exited_idx)),
        });
    }

    if dropped_blank > 0 {
        debug!(
            "Dropped {} person rows missing both name and date of birth",
            dropped_blank
        );
    }
    info!("Loaded {} rows from person table", persons.len());
    Ok(persons)
}

pub fn read_person_file<P: AsRef<Path>>(path: P) -> Result<Vec<PersonRecord>> {
    read_person_table(fs::File::open(path)?)
}

/// Reads the statewide case-index extract. All columns are preserved in
/// order for report projection; the typed fields drive the set tests.
pub fn read_roster_table<R: Read>(reader: R) -> Result<Vec<RosterEntry>> {
    let mut csv_reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let record_headers = csv::StringRecord::from(headers.clone());
    let id_idx = column_index(&record_headers, "roster table", "CHILD_PID")?;
    let recovered_idx = column_index(&record_headers, "roster table", "DT_RECOVERED")?;
    let status_idx = column_index(&record_headers, "roster table", "LEGAL_STATUS")?;

    let mut entries = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();

        let legal_status = cell(status_idx);
        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), cell(i)))
            .collect();

        entries.push(RosterEntry {
            child_person_id: cell(id_idx),
            recovered_on: parse_date(&cell(recovered_idx)),
            legal_status: if legal_status.is_empty() {
                None
            } else {
                Some(legal_status)
            },
            columns,
        });
    }

    info!("Loaded {} rows from roster table", entries.len());
    Ok(entries)
}

pub fn read_roster_file<P: AsRef<Path>>(path: P) -> Result<Vec<RosterEntry>> {
    read_roster_table(fs::File::open(path)?)
}

/// Reads the person/county directory snapshot used for Report 2 enrichment.
pub fn read_directory_table<R: Read>(reader: R) -> Result<Vec<DirectoryEntry>> {
    let mut csv_reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let id_idx = column_index(&headers, "directory table", "Person_ID")?;
    let county_idx = column_index(&headers, "directory table", "Legal_County")?;
    let name_idx = column_index(&headers, "directory table", "Name")?;

    let mut entries = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        entries.push(DirectoryEntry {
            person_id: cell(id_idx),
            legal_county: cell(county_idx),
            person_name: cell(name_idx),
        });
    }

    info!("Loaded {} rows from directory table", entries.len());
    Ok(entries)
}

pub fn read_directory_file<P: AsRef<Path>>(path: P) -> Result<Vec<DirectoryEntry>> {
    read_directory_table(fs::File::open(path)?)
}

/// Reads the county -> legal-region lookup.
pub fn read_county_table<R: Read>(reader: R) -> Result<Vec<CountyRegion>> {
    let mut csv_reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let county_idx = column_index(&headers, "county lookup", "County")?;
    let region_idx = column_index(&headers, "county lookup", "Region")?;

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).unwrap_or("").trim().to_string();
        rows.push(CountyRegion {
            county: cell(county_idx),
            region: cell(region_idx),
        });
    }

    info!("Loaded {} rows from county lookup", rows.len());
    Ok(rows)
}

pub fn read_county_file<P: AsRef<Path>>(path: P) -> Result<Vec<CountyRegion>> {
    read_county_table(fs::File::open(path)?)
}
