//! # Roster Reconciler
//!
//! A library for reconciling missing-person events reported by a state
//! public-safety agency against the care episodes a child-welfare system
//! maintains, producing three comparison reports per fiscal quarter.
//!
//! ## Core Concepts
//!
//! - **Event**: one reported runaway/missing-person contact, identified
//!   only by a normalized name and date of birth
//! - **Episode**: one continuous interval a person spent in care, bounded
//!   by entry and exit dates (open episodes have no exit yet)
//! - **Linking**: a left-outer join on (normalized name, date of birth)
//!   that deliberately preserves fan-out across name variants and episodes
//! - **Canonical case**: the single resolved record per person for the
//!   period, chosen by status priority and contact recency
//! - **Reconciliation**: three-way set comparison between the resolved
//!   cases and the statewide case index
//!
//! ## Example
//!
//! ```rust,ignore
//! use roster_reconciler::*;
//! use chrono::NaiveDate;
//!
//! let period = FiscalPeriod::from_run_date(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
//! let config = RunConfig::default();
//!
//! let inputs = ReconcileInputs {
//!     events: ingestion::read_event_file("agency_results.txt")?,
//!     persons: ingestion::read_person_file("reference_data.csv")?,
//!     roster: ingestion::read_roster_file("case_index.csv")?,
//!     directory: ingestion::read_directory_file("person_directory.csv")?,
//!     county_lookup: ingestion::read_county_file("county_regions.csv")?,
//! };
//!
//! let outcome = run_reconciliation(inputs, &config, &period)?;
//! println!("{} canonical cases", outcome.reports.all_events.rows.len());
//! ```

pub mod eligibility;
pub mod error;
pub mod fiscal;
pub mod ingestion;
pub mod link;
pub mod normalize;
pub mod outbound;
pub mod reports;
pub mod resolve;
pub mod schema;

pub use eligibility::{filter_eligible, EligibilityCounts, ReportingWindow};
pub use error::{ReconcileError, Result};
pub use fiscal::{fiscal_year_bounds, fiscal_year_of, quarter_bounds, FiscalPeriod};
pub use link::join_events_to_persons;
pub use outbound::{build_outbound_feed, write_fixed_width, CareRow, OutboundRecord};
pub use reports::{build_reports, Report, ReportSet};
pub use resolve::{dedupe_cases, resolve, ResolveOutcome};
pub use schema::*;

use log::info;

/// The fully materialized tables one reconciliation run consumes. How
/// they were fetched (SFTP, database extract, spreadsheet) is the
/// caller's concern.
#[derive(Debug, Clone)]
pub struct ReconcileInputs {
    pub events: Vec<EventRecord>,
    pub persons: Vec<PersonRecord>,
    pub roster: Vec<RosterEntry>,
    pub directory: Vec<DirectoryEntry>,
    pub county_lookup: Vec<CountyRegion>,
}

/// Counters surfaced to the operator notification path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub events_in: usize,
    pub persons_in: usize,
    pub linked_rows: usize,
    pub unmatched_events: usize,
    pub dropped_by_age: usize,
    pub dropped_by_window: usize,
    pub canonical_cases: usize,
    pub unknown_status_codes: Vec<String>,
}

/// Result of one run: the three reports plus the run counters. The
/// reports are complete or absent; there is no partial-success state.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub reports: ReportSet,
    pub stats: RunStats,
}

pub struct ReconcileProcessor {
    config: RunConfig,
    window: ReportingWindow,
}

impl ReconcileProcessor {
    pub fn new(config: RunConfig, period: &FiscalPeriod) -> Result<Self> {
        let window = ReportingWindow::from_period(period)?;
        Ok(Self { config, window })
    }

    /// Runs the fixed pipeline: join, eligibility filter, resolution,
    /// report building. Deterministic for fixed inputs.
    pub fn run(&self, inputs: ReconcileInputs) -> Result<ReconcileOutcome> {
        validate_inputs(&inputs)?;

        info!(
            "Reconciling {} events against {} care episodes ({} env, window {} to {})",
            inputs.events.len(),
            inputs.persons.len(),
            self.config.environment,
            self.window.start,
            self.window.end
        );

        let linked = join_events_to_persons(&inputs.events, &inputs.persons);
        let unmatched_events = link::unmatched_count(&linked);
        let linked_rows = linked.len();

        let (eligible, counts) =
            filter_eligible(linked, &self.window, self.config.open_episode_cutoff);

        let resolved = resolve(eligible);

        let reports = build_reports(
            &resolved.cases,
            &inputs.roster,
            &inputs.directory,
            &inputs.county_lookup,
        );

        let stats = RunStats {
            events_in: inputs.events.len(),
            persons_in: inputs.persons.len(),
            linked_rows,
            unmatched_events,
            dropped_by_age: counts.dropped_by_age,
            dropped_by_window: counts.dropped_by_window,
            canonical_cases: resolved.cases.len(),
            unknown_status_codes: resolved.unknown_status_codes,
        };

        Ok(ReconcileOutcome { reports, stats })
    }
}

/// Convenience wrapper around [`ReconcileProcessor`].
pub fn run_reconciliation(
    inputs: ReconcileInputs,
    config: &RunConfig,
    period: &FiscalPeriod,
) -> Result<ReconcileOutcome> {
    ReconcileProcessor::new(config.clone(), period)?.run(inputs)
}

fn validate_inputs(inputs: &ReconcileInputs) -> Result<()> {
    if inputs.events.is_empty() {
        return Err(ReconcileError::EmptyImport("event import".to_string()));
    }
    if inputs.persons.is_empty() {
        return Err(ReconcileError::EmptyImport("person table".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn event(match_name: &str, dob: NaiveDate, last_contact: NaiveDate, status: &str) -> EventRecord {
        EventRecord {
            match_name: match_name.to_string(),
            full_name: match_name.to_string(),
            date_of_birth: Some(dob),
            last_contact: Some(last_contact),
            located_on: None,
            cleared_on: None,
            status: EventStatus::parse(status),
            agency: "ANYTOWN PD".to_string(),
            county: "TRAVIS".to_string(),
            phone: "512-555-0100".to_string(),
            nic: "M123456789".to_string(),
            extra: Vec::new(),
        }
    }

    fn person(name: &str, dob: NaiveDate, person_id: &str) -> PersonRecord {
        PersonRecord {
            name: name.to_string(),
            date_of_birth: Some(dob),
            person_id: person_id.to_string(),
            entered_care: Some(d(2024, 6, 1)),
            exited_care: None,
        }
    }

    fn inputs() -> ReconcileInputs {
        ReconcileInputs {
            events: vec![event(
                "SMITH,MARYJANE",
                d(2010, 5, 1),
                d(2025, 1, 10),
                "ACTV",
            )],
            persons: vec![person("SMITH,MARYJANE", d(2010, 5, 1), "100234")],
            roster: Vec::new(),
            directory: Vec::new(),
            county_lookup: Vec::new(),
        }
    }

    fn q2_2025() -> FiscalPeriod {
        FiscalPeriod {
            fiscal_year: 2025,
            quarter: Some(2),
        }
    }

    #[test]
    fn test_end_to_end_single_case() {
        let outcome = run_reconciliation(inputs(), &RunConfig::default(), &q2_2025()).unwrap();
        assert_eq!(outcome.stats.canonical_cases, 1);
        assert_eq!(outcome.reports.all_events.rows.len(), 1);
        assert_eq!(outcome.reports.all_events.rows[0][3], "2ACTV");
        // Nothing in the roster, so the case lands in Report 2.
        assert_eq!(outcome.reports.ps_not_in_roster.rows.len(), 1);
    }

    #[test]
    fn test_empty_event_table_is_fatal() {
        let mut empty = inputs();
        empty.events.clear();
        assert!(matches!(
            run_reconciliation(empty, &RunConfig::default(), &q2_2025()),
            Err(ReconcileError::EmptyImport(_))
        ));
    }

    #[test]
    fn test_empty_person_table_is_fatal() {
        let mut empty = inputs();
        empty.persons.clear();
        assert!(matches!(
            run_reconciliation(empty, &RunConfig::default(), &q2_2025()),
            Err(ReconcileError::EmptyImport(_))
        ));
    }

    #[test]
    fn test_over_age_event_is_excluded() {
        let mut late = inputs();
        late.events[0].last_contact = Some(d(2030, 1, 10));
        // Report the period the contact falls in, so the age predicate is
        // the only thing removing it.
        let period = FiscalPeriod {
            fiscal_year: 2030,
            quarter: Some(2),
        };
        let outcome = run_reconciliation(late, &RunConfig::default(), &period).unwrap();
        assert_eq!(outcome.stats.dropped_by_age, 1);
        assert_eq!(outcome.stats.canonical_cases, 0);
    }

    #[test]
    fn test_stats_track_unmatched_events() {
        let mut with_stranger = inputs();
        with_stranger
            .events
            .push(event("UNKNOWN,PERSON", d(2011, 1, 1), d(2025, 1, 5), "ACTV"));
        let outcome =
            run_reconciliation(with_stranger, &RunConfig::default(), &q2_2025()).unwrap();
        assert_eq!(outcome.stats.unmatched_events, 1);
        assert_eq!(outcome.stats.events_in, 2);
        assert_eq!(outcome.stats.canonical_cases, 1);
    }
}
