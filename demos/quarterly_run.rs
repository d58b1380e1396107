use chrono::NaiveDate;
use roster_reconciler::*;

fn main() {
    env_logger::init();

    println!("📋 Quarterly Reconciliation Demo\n");
    println!("Runs the full pipeline over a small in-memory quarter of data:");
    println!("join, eligibility filter, status resolution, three reports.\n");

    let config = RunConfig::default();
    let run_date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let period = config.reporting_period(run_date);
    println!("Run date {} reports period {}", run_date, period.label());

    let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();

    let events = vec![
        EventRecord {
            match_name: "SMITH,MARYJANE".to_string(),
            full_name: "SMITH, MARY JANE".to_string(),
            date_of_birth: Some(d(2010, 5, 1)),
            last_contact: Some(d(2025, 1, 10)),
            located_on: None,
            cleared_on: None,
            status: EventStatus::Active,
            agency: "ANYTOWN PD".to_string(),
            county: "TRAVIS".to_string(),
            phone: "512-555-0100".to_string(),
            nic: "M123456789".to_string(),
            extra: Vec::new(),
        },
        EventRecord {
            match_name: "GARZA,LUIS".to_string(),
            full_name: "GARZA, LUIS".to_string(),
            date_of_birth: Some(d(2009, 3, 12)),
            last_contact: Some(d(2024, 12, 15)),
            located_on: Some(d(2025, 1, 20)),
            cleared_on: None,
            status: EventStatus::Located,
            agency: "OTHERTOWN SO".to_string(),
            county: "BEXAR".to_string(),
            phone: "210-555-0101".to_string(),
            nic: "M987654321".to_string(),
            extra: Vec::new(),
        },
    ];

    let persons = vec![
        PersonRecord {
            name: "SMITH,MARYJANE".to_string(),
            date_of_birth: Some(d(2010, 5, 1)),
            person_id: "100234".to_string(),
            entered_care: Some(d(2024, 6, 1)),
            exited_care: None,
        },
        PersonRecord {
            name: "GARZA,LUIS".to_string(),
            date_of_birth: Some(d(2009, 3, 12)),
            person_id: "100777".to_string(),
            entered_care: Some(d(2023, 9, 15)),
            exited_care: None,
        },
    ];

    let roster = vec![RosterEntry {
        child_person_id: "100234".to_string(),
        recovered_on: None,
        legal_status: Some("TMC".to_string()),
        columns: vec![
            ("CHILD_PID".to_string(), "100234".to_string()),
            ("DT_RECOVERED".to_string(), String::new()),
            ("LEGAL_STATUS".to_string(), "TMC".to_string()),
        ],
    }];

    let inputs = ReconcileInputs {
        events,
        persons,
        roster,
        directory: vec![DirectoryEntry {
            person_id: "100777".to_string(),
            legal_county: "BEXAR".to_string(),
            person_name: "GARZA, LUIS".to_string(),
        }],
        county_lookup: vec![CountyRegion {
            county: "BEXAR".to_string(),
            region: "Region 8".to_string(),
        }],
    };

    let outcome = run_reconciliation(inputs, &config, &period).unwrap();

    println!("\n📊 Run counters:");
    println!("  events in:        {}", outcome.stats.events_in);
    println!("  unmatched events: {}", outcome.stats.unmatched_events);
    println!("  canonical cases:  {}", outcome.stats.canonical_cases);

    println!("\nReport 1 (all events):");
    print!("{}", outcome.reports.all_events.to_csv_string().unwrap());

    println!("\nReport 2 (agency cases not in the index):");
    print!("{}", outcome.reports.ps_not_in_roster.to_csv_string().unwrap());

    println!("\nReport 3 (index cases not active with the agency):");
    print!("{}", outcome.reports.roster_not_in_ps.to_csv_string().unwrap());
}
