//! Eligibility predicates applied to linked rows before resolution.
//!
//! A row survives only if the person was under 18 at the time of last
//! contact and the event intersects both the matched care episode and the
//! reporting window.

use chrono::{Datelike, NaiveDate};
use log::info;

use crate::error::Result;
use crate::fiscal::FiscalPeriod;
use crate::schema::{EventRecord, LinkedRecord};

/// The period the run reports on, materialized as concrete dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportingWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn from_period(period: &FiscalPeriod) -> Result<Self> {
        let (start, end) = period.reporting_window()?;
        Ok(Self { start, end })
    }
}

fn add_years(date: NaiveDate, years: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year() + years, date.month(), date.day())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(date.year() + years, date.month(), 28).unwrap())
}

/// The date a person turns 18.
///
/// A Feb 29 birth date is treated as Mar 1 before the years are added.
/// This shifts the birthday by one day for leap-day births in every year,
/// not just non-leap ones; the convention is preserved from the reporting
/// process this pipeline replaces.
pub fn turn_18_date(date_of_birth: NaiveDate) -> NaiveDate {
    let adjusted = if date_of_birth.month() == 2 && date_of_birth.day() == 29 {
        NaiveDate::from_ymd_opt(date_of_birth.year(), 3, 1).unwrap()
    } else {
        date_of_birth
    };
    add_years(adjusted, 18)
}

/// Under 18 at last contact, strictly: a person whose 18th birthday falls
/// on the contact date is excluded. An unknown birth date passes (fail
/// open); an unknown contact date fails (there is no moment to test).
pub fn is_under_18_at_contact(event: &EventRecord) -> bool {
    let last_contact = match event.last_contact {
        Some(date) => date,
        None => return false,
    };
    match event.date_of_birth {
        Some(dob) => turn_18_date(dob) > last_contact,
        None => true,
    }
}

/// Tests whether a linked row's event intersects the reporting window and
/// falls inside the matched care episode.
///
/// The three OR branches are the mutually exclusive ways a case can touch
/// the window: last contact inside it, opened earlier and still
/// unresolved, or opened earlier and resolved during it. All branches
/// additionally require the contact to precede the window end and to fall
/// within the episode interval, with the configured far-future cutoff
/// standing in for an open episode's exit date.
pub fn within_reporting_window(
    record: &LinkedRecord,
    window: &ReportingWindow,
    open_episode_cutoff: NaiveDate,
) -> bool {
    let link = match &record.link {
        Some(link) => link,
        None => return false,
    };
    let (last_contact, entered) = match (record.event.last_contact, link.entered_care) {
        (Some(lc), Some(entered)) => (lc, entered),
        _ => return false,
    };
    let exited = link.exited_care.unwrap_or(open_episode_cutoff);
    let located = record.event.located_on;
    let cleared = record.event.cleared_on;

    (last_contact >= window.start
        || (last_contact <= window.start && located.is_none() && cleared.is_none())
        || (last_contact <= window.start
            && (located.is_some_and(|d| d >= window.start)
                || cleared.is_some_and(|d| d >= window.start))))
        && last_contact <= window.end
        && last_contact >= entered
        && last_contact <= exited
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EligibilityCounts {
    pub dropped_by_age: usize,
    pub dropped_by_window: usize,
}

/// Applies both predicates, keeping rows that satisfy each.
pub fn filter_eligible(
    linked: Vec<LinkedRecord>,
    window: &ReportingWindow,
    open_episode_cutoff: NaiveDate,
) -> (Vec<LinkedRecord>, EligibilityCounts) {
    let mut counts = EligibilityCounts::default();
    let before = linked.len();

    let kept: Vec<LinkedRecord> = linked
        .into_iter()
        .filter(|record| {
            if !is_under_18_at_contact(&record.event) {
                counts.dropped_by_age += 1;
                return false;
            }
            if !within_reporting_window(record, window, open_episode_cutoff) {
                counts.dropped_by_window += 1;
                return false;
            }
            true
        })
        .collect();

    info!(
        "Eligibility filter kept {} of {} linked rows ({} over age, {} outside window)",
        kept.len(),
        before,
        counts.dropped_by_age,
        counts.dropped_by_window
    );

    (kept, counts)
}
