use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Status of a reported missing-person event, recoded from the agency's
/// four-letter codes. Codes the agency has not documented are carried
/// through unchanged rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum EventStatus {
    /// Person was found.
    Located,
    /// Person is still missing.
    Active,
    Cleared,
    Cancelled,
    /// Unrecognized code, preserved verbatim for manual review.
    Unknown(String),
}

impl EventStatus {
    pub fn parse(code: &str) -> Self {
        match code {
            "LOC" => Self::Located,
            "ACTV" => Self::Active,
            "CLRD" => Self::Cleared,
            "CANC" => Self::Cancelled,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Report-facing label with the numeric priority prefix: `1LOC` beats
    /// `2ACTV` beats `3CLRD` beats `4CANC`. Unknown codes keep their
    /// original spelling, which also makes them sort after every known
    /// code (digits order before letters).
    pub fn recoded(&self) -> Cow<'_, str> {
        match self {
            Self::Located => Cow::Borrowed("1LOC"),
            Self::Active => Cow::Borrowed("2ACTV"),
            Self::Cleared => Cow::Borrowed("3CLRD"),
            Self::Cancelled => Cow::Borrowed("4CANC"),
            Self::Unknown(code) => Cow::Borrowed(code),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl Ord for EventStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.recoded().cmp(&other.recoded())
    }
}

impl PartialOrd for EventStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One care episode for one person in the child-welfare system. A person
/// with several episodes appears once per episode; which episode matched
/// determines whether an event falls inside care.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PersonRecord {
    /// Submission name in the match-normalized form (`LAST,FIRST`,
    /// uppercase, no internal spaces).
    pub name: String,
    pub date_of_birth: Option<NaiveDate>,
    /// Stable internal identifier; authoritative for set membership.
    pub person_id: String,
    pub entered_care: Option<NaiveDate>,
    /// `None` while the episode is still open; a concrete far-future
    /// cutoff is substituted only where an interval comparison needs one.
    pub exited_care: Option<NaiveDate>,
}

/// One contact/sighting event reported by the public-safety agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EventRecord {
    /// Name as submitted for matching, normalized identically to
    /// [`PersonRecord::name`].
    pub match_name: String,
    /// Name as the reporting agency recorded it; descriptive only.
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub last_contact: Option<NaiveDate>,
    pub located_on: Option<NaiveDate>,
    pub cleared_on: Option<NaiveDate>,
    pub status: EventStatus,
    pub agency: String,
    pub county: String,
    pub phone: String,
    pub nic: String,
    /// Unexpected import columns, carried through to the reports after the
    /// fixed columns.
    pub extra: Vec<(String, String)>,
}

/// Person-side fields of a successful identity match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeLink {
    pub person_id: String,
    pub person_name: String,
    pub person_dob: Option<NaiveDate>,
    pub entered_care: Option<NaiveDate>,
    pub exited_care: Option<NaiveDate>,
}

/// Join output: every event is retained; `link` is `None` when no person
/// matched, which is a recorded state rather than a dropped row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedRecord {
    pub event: EventRecord,
    pub link: Option<EpisodeLink>,
}

/// The single resolved record for one person in one reporting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalCase {
    pub person_id: String,
    pub status: EventStatus,
    pub last_contact: NaiveDate,
    pub date_of_birth: Option<NaiveDate>,
    pub located_on: Option<NaiveDate>,
    pub cleared_on: Option<NaiveDate>,
    pub agency: String,
    pub county: String,
    pub phone: String,
    pub nic: String,
    pub entered_care: Option<NaiveDate>,
    pub exited_care: Option<NaiveDate>,
    pub extra: Vec<(String, String)>,
}

impl CanonicalCase {
    /// Locate date when present, otherwise the clearance date. Used as the
    /// final tie-breaker during resolution.
    pub fn combined_date(&self) -> Option<NaiveDate> {
        self.located_on.or(self.cleared_on)
    }
}

/// A row from the statewide case index used for the not-in comparisons.
/// The typed fields drive the reconciliation tests; `columns` preserves
/// the full extract row, in order, for report projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RosterEntry {
    pub child_person_id: String,
    pub recovered_on: Option<NaiveDate>,
    pub legal_status: Option<String>,
    pub columns: Vec<(String, String)>,
}

/// Person/county snapshot row used to enrich Report 2 with legal county
/// and the person's name as the case-management system spells it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DirectoryEntry {
    pub person_id: String,
    pub legal_county: String,
    pub person_name: String,
}

/// County name to legal-region lookup row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CountyRegion {
    pub county: String,
    pub region: String,
}

fn default_open_episode_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(2200, 1, 1).unwrap()
}

/// Run-scoped settings, constructed once at process start and passed into
/// the pipeline. Components never reach into ambient state.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunConfig {
    #[schemars(
        description = "Deployment environment this run targets (e.g. dev, qa, prod); carried into logs and notifications only"
    )]
    pub environment: String,

    #[serde(default = "default_open_episode_cutoff")]
    #[schemars(
        description = "Far-future date substituted for open care episodes where an interval comparison needs a concrete upper bound"
    )]
    pub open_episode_cutoff: NaiveDate,

    #[serde(default)]
    #[schemars(
        description = "Run date override for reproducing a past period; the caller supplies today's date when absent"
    )]
    pub run_date: Option<NaiveDate>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            environment: "dev".to_string(),
            open_episode_cutoff: default_open_episode_cutoff(),
            run_date: None,
        }
    }
}

impl RunConfig {
    /// Resolves the reporting period for this run: the configured override
    /// date when present, otherwise the supplied date.
    pub fn reporting_period(&self, today: NaiveDate) -> crate::fiscal::FiscalPeriod {
        crate::fiscal::FiscalPeriod::from_run_date(self.run_date.unwrap_or(today))
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RunConfig)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
