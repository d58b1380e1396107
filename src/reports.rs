//! Three-way reconciliation between the resolved cases and the statewide
//! case index, projected into the three report tables the program office
//! reviews each quarter.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use chrono::NaiveDate;
use log::info;

use crate::error::Result;
use crate::schema::{CanonicalCase, CountyRegion, DirectoryEntry, RosterEntry};

/// Legal-custody statuses under which a child with no recovery date counts
/// as actively missing. A blank status counts as well.
pub const ACTIVE_LEGAL_STATUSES: &[&str] = &[
    "TMC",
    "PMC/ Rts Not Term",
    "PMC/ Rts Term (All)",
    "PMC/ Rts Term (Mother)",
    "PMC/Rts Term (Father)",
];

/// Case-management bookkeeping columns stripped from Report 3 before it
/// leaves the building.
pub const INTERNAL_ROSTER_COLUMNS: &[&str] = &[
    "STAGE",
    "STAGE_START",
    "UNIT",
    "REGION_CODE",
    "WORKER_ID",
    "WORKER_NAME",
    "SUPERVISOR_ID",
    "SUPERVISOR_NAME",
    "CASE_MILESTONE",
    "MILESTONE_DATE",
    "AUDIT_FLAG",
    "ROW_LOAD_ID",
];

/// Column appended to Reports 2 and 3 for manual review notes.
pub const OUTCOME_COLUMN: &str = "Outcome";

/// Fixed leading columns of the case-derived reports; input extras are
/// appended after these.
pub const CASE_COLUMNS: &[&str] = &[
    "Person_ID",
    "Date_of_Birth",
    "Last_Contact",
    "Status",
    "Located_On",
    "Cleared_On",
    "Agency",
    "County",
    "Phone",
    "NIC",
    "Entered_Care",
    "Exited_Care",
];

/// A materialized tabular report: ordered columns plus string rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders the report as CSV. The spreadsheet conversion for the
    /// document library happens downstream; this is the canonical form.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// The three quarterly outputs.
#[derive(Debug, Clone)]
pub struct ReportSet {
    /// Report 1: every validated event, the ground truth table.
    pub all_events: Report,
    /// Report 2: agency cases with no counterpart in the case index.
    pub ps_not_in_roster: Report,
    /// Report 3: case-index children actively missing but absent from the
    /// agency's active list.
    pub roster_not_in_ps: Report,
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Union of extra-column names across cases, in first-seen order.
fn extra_headers(cases: &[CanonicalCase]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();
    for case in cases {
        for (name, _) in &case.extra {
            if seen.insert(name.clone()) {
                headers.push(name.clone());
            }
        }
    }
    headers
}

fn case_row(case: &CanonicalCase, extras: &[String]) -> Vec<String> {
    let mut row = vec![
        case.person_id.clone(),
        fmt_date(case.date_of_birth),
        fmt_date(Some(case.last_contact)),
        case.status.recoded().into_owned(),
        fmt_date(case.located_on),
        fmt_date(case.cleared_on),
        case.agency.clone(),
        case.county.clone(),
        case.phone.clone(),
        case.nic.clone(),
        fmt_date(case.entered_care),
        fmt_date(case.exited_care),
    ];
    for name in extras {
        let value = case
            .extra
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        row.push(value);
    }
    row
}

/// Builds the three reconciliation reports.
///
/// Identifier membership is tested on trimmed strings on both sides; the
/// two systems render the same id with different surrounding whitespace
/// often enough to produce false mismatches otherwise.
pub fn build_reports(
    cases: &[CanonicalCase],
    roster: &[RosterEntry],
    directory: &[DirectoryEntry],
    county_lookup: &[CountyRegion],
) -> ReportSet {
    let extras = extra_headers(cases);

    // Report 1: all events, fixed projection.
    let mut all_columns: Vec<String> = CASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    all_columns.extend(extras.iter().cloned());
    let all_events = Report {
        columns: all_columns,
        rows: cases.iter().map(|c| case_row(c, &extras)).collect(),
    };

    // Report 2: cases absent from the roster, enriched with legal county
    // and region.
    let roster_ids: HashSet<&str> = roster
        .iter()
        .map(|r| r.child_person_id.trim())
        .collect();
    let directory_by_id: HashMap<&str, &DirectoryEntry> = directory
        .iter()
        .map(|e| (e.person_id.trim(), e))
        .collect();
    let region_by_county: HashMap<&str, &str> = county_lookup
        .iter()
        .map(|c| (c.county.as_str(), c.region.as_str()))
        .collect();

    let mut not_in_roster_columns: Vec<String> =
        CASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    not_in_roster_columns.extend(extras.iter().cloned());
    not_in_roster_columns.extend([
        "Legal_County".to_string(),
        "Person_Name".to_string(),
        "Legal_Region".to_string(),
        OUTCOME_COLUMN.to_string(),
    ]);

    let mut not_in_roster_rows = Vec::new();
    for case in cases {
        if roster_ids.contains(case.person_id.trim()) {
            continue;
        }
        let mut row = case_row(case, &extras);
        let entry = directory_by_id.get(case.person_id.trim());
        let legal_county = entry.map(|e| e.legal_county.clone()).unwrap_or_default();
        let person_name = entry.map(|e| e.person_name.clone()).unwrap_or_default();
        let region = region_by_county
            .get(legal_county.as_str())
            .map(|r| r.to_string())
            .unwrap_or_default();
        row.extend([legal_county, person_name, region, String::new()]);
        not_in_roster_rows.push(row);
    }
    let ps_not_in_roster = Report {
        columns: not_in_roster_columns,
        rows: not_in_roster_rows,
    };

    // Report 3: actively missing roster children with no active agency
    // case.
    let active_case_ids: HashSet<&str> = cases
        .iter()
        .filter(|c| c.status.is_active())
        .map(|c| c.person_id.trim())
        .collect();

    let roster_columns: Vec<String> = roster
        .first()
        .map(|entry| entry.columns.iter().map(|(name, _)| name.clone()).collect())
        .unwrap_or_else(|| {
            vec![
                "CHILD_PID".to_string(),
                "DT_RECOVERED".to_string(),
                "LEGAL_STATUS".to_string(),
            ]
        });
    let kept_columns: Vec<String> = roster_columns
        .iter()
        .filter(|name| !INTERNAL_ROSTER_COLUMNS.contains(&name.as_str()))
        .cloned()
        .collect();

    let mut not_in_ps_columns = kept_columns.clone();
    not_in_ps_columns.push(OUTCOME_COLUMN.to_string());

    let mut not_in_ps_rows = Vec::new();
    for entry in roster {
        let actively_missing = entry.recovered_on.is_none()
            && entry
                .legal_status
                .as_deref()
                .map(|s| ACTIVE_LEGAL_STATUSES.contains(&s))
                .unwrap_or(true);
        if !actively_missing {
            continue;
        }
        if active_case_ids.contains(entry.child_person_id.trim()) {
            continue;
        }

        let mut row: Vec<String> = kept_columns
            .iter()
            .map(|name| {
                entry
                    .columns
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default()
            })
            .collect();
        row.push(String::new());
        not_in_ps_rows.push(row);
    }
    let roster_not_in_ps = Report {
        columns: not_in_ps_columns,
        rows: not_in_ps_rows,
    };

    info!(
        "Built reports: {} total events, {} not in roster, {} roster not in agency",
        all_events.rows.len(),
        ps_not_in_roster.rows.len(),
        roster_not_in_ps.rows.len()
    );

    ReportSet {
        all_events,
        ps_not_in_roster,
        roster_not_in_ps,
    }
}
