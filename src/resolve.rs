//! Deduplication and status resolution.
//!
//! The join fans one external event out over every matching name variant
//! and care episode; this stage collapses that fan-out to exactly one
//! record per person per contact event, then one record per person. A
//! person may run, be found, and run again inside one quarter; the rule is
//! to report the latest status as of the most recent contact, with the
//! most resolved status winning same-day ties.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use log::{debug, warn};

use crate::schema::{CanonicalCase, LinkedRecord};

#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub cases: Vec<CanonicalCase>,
    /// Rows skipped because they carried no person link or no contact
    /// date; there is nothing to group them by.
    pub skipped_rows: usize,
    /// Distinct status codes passed through unrecognized.
    pub unknown_status_codes: Vec<String>,
}

/// Collapses linked rows to one canonical case per person.
pub fn resolve(linked: Vec<LinkedRecord>) -> ResolveOutcome {
    let mut candidates = Vec::new();
    let mut skipped_rows = 0usize;
    let mut unknown: BTreeSet<String> = BTreeSet::new();

    for record in linked {
        let link = match record.link {
            Some(link) => link,
            None => {
                skipped_rows += 1;
                continue;
            }
        };
        let last_contact = match record.event.last_contact {
            Some(date) => date,
            None => {
                skipped_rows += 1;
                continue;
            }
        };

        if !record.event.status.is_known() {
            unknown.insert(record.event.status.recoded().into_owned());
        }

        candidates.push(CanonicalCase {
            person_id: link.person_id,
            status: record.event.status,
            last_contact,
            date_of_birth: record.event.date_of_birth,
            located_on: record.event.located_on,
            cleared_on: record.event.cleared_on,
            agency: record.event.agency,
            county: record.event.county,
            phone: record.event.phone,
            nic: record.event.nic,
            entered_care: link.entered_care,
            exited_care: link.exited_care,
            extra: record.event.extra,
        });
    }

    for code in &unknown {
        warn!("Unrecognized status code '{}' passed through for manual review", code);
    }
    if skipped_rows > 0 {
        debug!("Skipped {} rows with no link or no contact date", skipped_rows);
    }

    ResolveOutcome {
        cases: dedupe_cases(candidates),
        skipped_rows,
        unknown_status_codes: unknown.into_iter().collect(),
    }
}

fn contact_priority(case: &CanonicalCase) -> (String, NaiveDate) {
    (
        case.status.recoded().into_owned(),
        case.combined_date().unwrap_or(NaiveDate::MAX),
    )
}

/// The two-phase collapse. Idempotent: applying it to its own output
/// returns the same set.
///
/// 1. Per (person, contact date), keep the highest-priority status; ties
///    broken by the earliest locate/clear date.
/// 2. Per person, keep the most recent contact date.
pub fn dedupe_cases(cases: Vec<CanonicalCase>) -> Vec<CanonicalCase> {
    let mut by_contact: BTreeMap<(String, NaiveDate), CanonicalCase> = BTreeMap::new();
    for case in cases {
        let key = (case.person_id.clone(), case.last_contact);
        match by_contact.get(&key) {
            Some(current) if contact_priority(current) <= contact_priority(&case) => {}
            _ => {
                by_contact.insert(key, case);
            }
        }
    }

    let mut by_person: BTreeMap<String, CanonicalCase> = BTreeMap::new();
    for case in by_contact.into_values() {
        match by_person.get(&case.person_id) {
            Some(current) if current.last_contact >= case.last_contact => {}
            _ => {
                by_person.insert(case.person_id.clone(), case);
            }
        }
    }

    by_person.into_values().collect()
}
