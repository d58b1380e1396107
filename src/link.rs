//! Identity join between reported events and care episodes.
//!
//! The two systems share no primary key, so identity is the pair
//! (match-normalized name, date of birth). The join is left-outer from the
//! event side and deliberately preserves fan-out: one event matching k
//! episodes or name variants produces k linked rows, resolved later.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use log::warn;

use crate::normalize::match_key;
use crate::schema::{EpisodeLink, EventRecord, LinkedRecord, PersonRecord};

/// Links every event to the care episodes whose (name, date of birth) key
/// matches. Events without a date of birth cannot match and are retained
/// unlinked, as are events whose key finds no episode.
pub fn join_events_to_persons(
    events: &[EventRecord],
    persons: &[PersonRecord],
) -> Vec<LinkedRecord> {
    let mut by_key: HashMap<(String, NaiveDate), Vec<&PersonRecord>> = HashMap::new();
    let mut seen: HashSet<&PersonRecord> = HashSet::new();

    for person in persons {
        let dob = match person.date_of_birth {
            Some(dob) => dob,
            None => continue,
        };
        // Identical episode rows occur when several name variants collapse
        // to the same key; keeping them would double the fan-out.
        if !seen.insert(person) {
            continue;
        }
        // The person table is normalized on ingestion, but the join applies
        // the same normalization again so the key symmetry holds for any
        // caller-built input.
        by_key
            .entry((match_key(&person.name), dob))
            .or_default()
            .push(person);
    }

    let mut linked = Vec::new();
    let mut unmatched = 0usize;

    for event in events {
        let matches = event
            .date_of_birth
            .and_then(|dob| by_key.get(&(match_key(&event.match_name), dob)));

        match matches {
            Some(candidates) => {
                for person in candidates {
                    linked.push(LinkedRecord {
                        event: event.clone(),
                        link: Some(EpisodeLink {
                            person_id: person.person_id.trim().to_string(),
                            person_name: person.name.clone(),
                            person_dob: person.date_of_birth,
                            entered_care: person.entered_care,
                            exited_care: person.exited_care,
                        }),
                    });
                }
            }
            None => {
                unmatched += 1;
                linked.push(LinkedRecord {
                    event: event.clone(),
                    link: None,
                });
            }
        }
    }

    if unmatched > 0 {
        warn!("{} event records did not match any care episode", unmatched);
    }

    linked
}

/// Number of rows whose event found no episode.
pub fn unmatched_count(linked: &[LinkedRecord]) -> usize {
    linked.iter().filter(|r| r.link.is_none()).count()
}
