use chrono::NaiveDate;
use roster_reconciler::*;
use std::fs::File;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Renders one data row of the colon-delimited agency result format,
/// trailing record terminator included.
fn event_line(
    match_name: &str,
    full_name: &str,
    dob: &str,
    last_contact: &str,
    status: &str,
    agency: &str,
    county: &str,
    located: &str,
    cleared: &str,
) -> String {
    format!(
        "{match_name:<30}:{full_name:<24}:{dob:<10}:{doe:<10}:{last_contact:<10}:{status:<4}:{ori:<9}:{agency:<20}:{county:<12}:{phone:<13}:{nic:<10}:{located:<10}:{cleared:<10}:\n",
        doe = "2025-01-02",
        ori = "TX0000000",
        phone = "512-555-0100",
        nic = "M123456789",
    )
}

/// Assembles the import text: the header row carries no trailing colon
/// while every data row does, exactly as the agency sends it.
fn event_text(rows: &[String]) -> String {
    let header = format!(
        "{:<30}:{:<24}:{:<10}:{:<10}:{:<10}:{:<4}:{:<9}:{:<20}:{:<12}:{:<13}:{:<10}:{:<10}:{:<10}",
        "CPS NAME",
        "FULL NAME",
        "CPS DOB",
        "DOE",
        "LAST CONT",
        "STS",
        "ORI",
        "ORI DESC",
        "COUNTY NAME",
        "ORI PHONE",
        "NIC #",
        "LOCATE DTE",
        "CLR/CAN DTE"
    );
    let mut text = header;
    text.push('\n');
    for row in rows {
        text.push_str(row);
    }
    text
}

fn person_csv(rows: &[(&str, &str, &str, &str, &str)]) -> String {
    let mut text = String::from("Person_ID,Name,Date_of_Birth,Entered_Care,Exited_Care\n");
    for (id, name, dob, entered, exited) in rows {
        text.push_str(&format!("{id},\"{name}\",{dob},{entered},{exited}\n"));
    }
    text
}

fn roster_entry(child_pid: &str, recovered: &str, legal_status: &str) -> RosterEntry {
    RosterEntry {
        child_person_id: child_pid.to_string(),
        recovered_on: ingestion::parse_date(recovered),
        legal_status: if legal_status.is_empty() {
            None
        } else {
            Some(legal_status.to_string())
        },
        columns: vec![
            ("CHILD_PID".to_string(), child_pid.to_string()),
            ("DT_RECOVERED".to_string(), recovered.to_string()),
            ("LEGAL_STATUS".to_string(), legal_status.to_string()),
            ("COUNTY".to_string(), "TRAVIS".to_string()),
            ("WORKER_ID".to_string(), "W-204".to_string()),
        ],
    }
}

fn q2_2025() -> FiscalPeriod {
    FiscalPeriod {
        fiscal_year: 2025,
        quarter: Some(2),
    }
}

#[test]
fn test_comprehensive_quarterly_reconciliation() {
    // Five reported events:
    // - MARYJANE SMITH, active, in care, in window -> canonical 2ACTV
    // - LUIS GARZA reported under two surname variants with the same
    //   contact date, LOC and ACTV -> one canonical 1LOC row
    // - an event with no matching care episode -> counted, excluded
    // - a person already 18 at contact -> excluded
    let rows = vec![
        event_line(
            "SMITH,MARYJANE",
            "SMITH, MARY JANE",
            "2010-05-01",
            "2025-01-10",
            "ACTV",
            "ANYTOWN PD",
            "TRAVIS",
            "",
            "",
        ),
        event_line(
            "GARZA,LUIS",
            "GARZA, LUIS",
            "2009-03-12",
            "2024-12-15",
            "LOC",
            "OTHERTOWN SO",
            "BEXAR",
            "2025-01-20",
            "",
        ),
        event_line(
            "GARZACANTU,LUIS",
            "GARZA CANTU, LUIS",
            "2009-03-12",
            "2024-12-15",
            "ACTV",
            "OTHERTOWN SO",
            "BEXAR",
            "",
            "",
        ),
        event_line(
            "NOMATCH,NOBODY",
            "NOMATCH, NOBODY",
            "2012-07-07",
            "2025-01-05",
            "ACTV",
            "ANYTOWN PD",
            "TRAVIS",
            "",
            "",
        ),
        event_line(
            "OLDER,PERSON",
            "OLDER, PERSON",
            "2006-11-02",
            "2025-01-15",
            "ACTV",
            "ANYTOWN PD",
            "TRAVIS",
            "",
            "",
        ),
    ];
    let events = ingestion::parse_event_text(&event_text(&rows)).unwrap();
    assert_eq!(events.len(), 5);

    let persons_csv = person_csv(&[
        ("100234", "SMITH,MARYJANE", "2010-05-01", "2024-06-01", ""),
        ("100777", "GARZA,LUIS", "2009-03-12", "2023-09-15", ""),
        ("100777", "GARZACANTU,LUIS", "2009-03-12", "2023-09-15", ""),
        ("100999", "OLDER,PERSON", "2006-11-02", "2023-01-01", ""),
    ]);
    let persons = ingestion::read_person_table(persons_csv.as_bytes()).unwrap();

    let roster = vec![
        roster_entry("100234", "", "TMC"),
        // Actively missing in the index, no agency case at all.
        roster_entry("200111", "", ""),
        // Recovered, so not actively missing.
        roster_entry("200222", "2025-01-30", "TMC"),
    ];
    let directory = vec![DirectoryEntry {
        person_id: "100777".to_string(),
        legal_county: "BEXAR".to_string(),
        person_name: "GARZA, LUIS".to_string(),
    }];
    let counties = vec![CountyRegion {
        county: "BEXAR".to_string(),
        region: "Region 8".to_string(),
    }];

    let inputs = ReconcileInputs {
        events,
        persons,
        roster,
        directory,
        county_lookup: counties,
    };
    let outcome = run_reconciliation(inputs, &RunConfig::default(), &q2_2025()).unwrap();

    assert_eq!(outcome.stats.events_in, 5);
    assert_eq!(outcome.stats.unmatched_events, 1);
    assert_eq!(outcome.stats.dropped_by_age, 1);
    assert_eq!(outcome.stats.canonical_cases, 2);

    // Report 1 carries both canonical cases; the variant fan-out resolved
    // to the located row.
    let all = &outcome.reports.all_events;
    assert_eq!(all.rows.len(), 2);
    let garza = all.rows.iter().find(|r| r[0] == "100777").unwrap();
    assert_eq!(garza[3], "1LOC");

    // Report 2: only GARZA is missing from the roster, enriched with the
    // directory county and its region.
    let not_in_roster = &outcome.reports.ps_not_in_roster;
    assert_eq!(not_in_roster.rows.len(), 1);
    let col = |name: &str| {
        not_in_roster
            .columns
            .iter()
            .position(|c| c == name)
            .unwrap()
    };
    assert_eq!(not_in_roster.rows[0][0], "100777");
    assert_eq!(not_in_roster.rows[0][col("Legal_County")], "BEXAR");
    assert_eq!(not_in_roster.rows[0][col("Legal_Region")], "Region 8");
    assert_eq!(not_in_roster.rows[0][col("Outcome")], "");

    // Report 3: the never-reported child with blank custody status shows
    // up; the recovered one does not, and 100234 has an active agency
    // case so it is excluded as well.
    let not_in_ps = &outcome.reports.roster_not_in_ps;
    assert_eq!(not_in_ps.rows.len(), 1);
    assert_eq!(not_in_ps.rows[0][0], "200111");
    assert!(!not_in_ps.columns.contains(&"WORKER_ID".to_string()));

    // Reports are persisted locally regardless of what happens upstream.
    let file = File::create("test_total_events.csv").unwrap();
    outcome.reports.all_events.write_csv(file).unwrap();
}

#[test]
fn test_status_recode_scenario() {
    // A single active event with a matching open episode lands in the
    // total-events report with the recoded status.
    let rows = vec![event_line(
        "SMITH,MARYJANE",
        "SMITH, MARY JANE",
        "2010-05-01",
        "2025-01-10",
        "ACTV",
        "ANYTOWN PD",
        "TRAVIS",
        "",
        "",
    )];
    let events = ingestion::parse_event_text(&event_text(&rows)).unwrap();
    let persons = ingestion::read_person_table(
        person_csv(&[("100234", "SMITH,MARYJANE", "2010-05-01", "2024-06-01", "")]).as_bytes(),
    )
    .unwrap();

    let inputs = ReconcileInputs {
        events,
        persons,
        roster: Vec::new(),
        directory: Vec::new(),
        county_lookup: Vec::new(),
    };
    let outcome = run_reconciliation(inputs, &RunConfig::default(), &q2_2025()).unwrap();
    assert_eq!(outcome.reports.all_events.rows.len(), 1);
    assert_eq!(outcome.reports.all_events.rows[0][3], "2ACTV");
}

#[test]
fn test_contact_after_18th_birthday_is_excluded() {
    // Same person, but the contact happens after the 18th birthday
    // (2028-05-01); the run covers the right period and still excludes it.
    let rows = vec![event_line(
        "SMITH,MARYJANE",
        "SMITH, MARY JANE",
        "2010-05-01",
        "2030-01-10",
        "ACTV",
        "ANYTOWN PD",
        "TRAVIS",
        "",
        "",
    )];
    let events = ingestion::parse_event_text(&event_text(&rows)).unwrap();
    let persons = ingestion::read_person_table(
        person_csv(&[("100234", "SMITH,MARYJANE", "2010-05-01", "2024-06-01", "")]).as_bytes(),
    )
    .unwrap();

    let inputs = ReconcileInputs {
        events,
        persons,
        roster: Vec::new(),
        directory: Vec::new(),
        county_lookup: Vec::new(),
    };
    let period = FiscalPeriod {
        fiscal_year: 2030,
        quarter: Some(2),
    };
    let outcome = run_reconciliation(inputs, &RunConfig::default(), &period).unwrap();
    assert_eq!(outcome.stats.dropped_by_age, 1);
    assert_eq!(outcome.reports.all_events.rows.len(), 0);
}

#[test]
fn test_run_is_deterministic() {
    let rows = vec![
        event_line(
            "SMITH,MARYJANE",
            "SMITH, MARY JANE",
            "2010-05-01",
            "2025-01-10",
            "ACTV",
            "ANYTOWN PD",
            "TRAVIS",
            "",
            "",
        ),
        event_line(
            "GARZA,LUIS",
            "GARZA, LUIS",
            "2009-03-12",
            "2024-12-15",
            "LOC",
            "OTHERTOWN SO",
            "BEXAR",
            "2025-01-20",
            "",
        ),
    ];
    let persons_csv = person_csv(&[
        ("100234", "SMITH,MARYJANE", "2010-05-01", "2024-06-01", ""),
        ("100777", "GARZA,LUIS", "2009-03-12", "2023-09-15", ""),
    ]);

    let run = || {
        let inputs = ReconcileInputs {
            events: ingestion::parse_event_text(&event_text(&rows)).unwrap(),
            persons: ingestion::read_person_table(persons_csv.as_bytes()).unwrap(),
            roster: vec![roster_entry("200111", "", "")],
            directory: Vec::new(),
            county_lookup: Vec::new(),
        };
        let outcome = run_reconciliation(inputs, &RunConfig::default(), &q2_2025()).unwrap();
        (
            outcome.reports.all_events.to_csv_string().unwrap(),
            outcome.reports.ps_not_in_roster.to_csv_string().unwrap(),
            outcome.reports.roster_not_in_ps.to_csv_string().unwrap(),
        )
    };

    assert_eq!(run(), run());
}

#[test]
fn test_resolution_is_idempotent_over_its_output() {
    let rows = vec![
        event_line(
            "GARZA,LUIS",
            "GARZA, LUIS",
            "2009-03-12",
            "2024-12-15",
            "LOC",
            "OTHERTOWN SO",
            "BEXAR",
            "2025-01-20",
            "",
        ),
        event_line(
            "GARZACANTU,LUIS",
            "GARZA CANTU, LUIS",
            "2009-03-12",
            "2024-12-15",
            "ACTV",
            "OTHERTOWN SO",
            "BEXAR",
            "",
            "",
        ),
    ];
    let events = ingestion::parse_event_text(&event_text(&rows)).unwrap();
    let persons = ingestion::read_person_table(
        person_csv(&[
            ("100777", "GARZA,LUIS", "2009-03-12", "2023-09-15", ""),
            ("100777", "GARZACANTU,LUIS", "2009-03-12", "2023-09-15", ""),
        ])
        .as_bytes(),
    )
    .unwrap();

    let linked = join_events_to_persons(&events, &persons);
    let outcome = resolve(linked);
    assert_eq!(outcome.cases.len(), 1);
    assert_eq!(outcome.cases[0].status.recoded(), "1LOC");

    let again = dedupe_cases(outcome.cases.clone());
    assert_eq!(again, outcome.cases);
}

#[test]
fn test_outbound_feed_end_to_end() -> anyhow::Result<()> {
    let rows = vec![
        CareRow {
            person_id: "100234".to_string(),
            first_name: "Mary Jane".to_string(),
            middle_name: "Elizabeth".to_string(),
            last_name: "Smith-Jones".to_string(),
            date_of_birth: Some(d(2010, 5, 1)),
            gender: "Female".to_string(),
            entered_care: Some(d(2024, 6, 1)),
            exited_care: None,
            fiscal_year: 2025,
            quarter: 2,
        },
        CareRow {
            person_id: "100777".to_string(),
            first_name: "José".to_string(),
            middle_name: String::new(),
            last_name: "De La Cruz".to_string(),
            date_of_birth: Some(d(2009, 3, 12)),
            gender: "Male".to_string(),
            entered_care: Some(d(2023, 9, 15)),
            exited_care: Some(d(2025, 1, 20)),
            fiscal_year: 2025,
            quarter: 2,
        },
        // Different quarter, filtered out.
        CareRow {
            person_id: "100999".to_string(),
            first_name: "Rosa".to_string(),
            middle_name: String::new(),
            last_name: "Pérez".to_string(),
            date_of_birth: Some(d(2011, 8, 2)),
            gender: "Female".to_string(),
            entered_care: Some(d(2024, 2, 1)),
            exited_care: None,
            fiscal_year: 2025,
            quarter: 3,
        },
    ];

    let records = build_outbound_feed(rows, &q2_2025());

    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    // The compound surname and compound first name both fan out.
    assert!(names.contains(&"SMITHJONES,MARYJANE"));
    assert!(names.contains(&"SMITH,MARYJANE"));
    assert!(names.contains(&"JONES,MARYJANE"));
    assert!(names.contains(&"SMITHJONES,MARY"));
    assert!(names.contains(&"SMITHJONES,JANE"));
    // Accents folded, particles excluded.
    assert!(names.contains(&"DELACRUZ,JOSE"));
    assert!(names.contains(&"CRUZ,JOSE"));
    assert!(!names.iter().any(|n| n.starts_with("DE,") || n.starts_with("LA,")));
    // The Q3 row never appears.
    assert!(!names.iter().any(|n| n.contains("PEREZ")));

    let reference = outbound::reference_report(&records);
    assert_eq!(reference.rows.len(), records.len());

    let mut buf = Vec::new();
    let written = write_fixed_width(&records, &mut buf)?;
    assert_eq!(written, records.len());

    let text = String::from_utf8(buf)?;
    for line in text.lines() {
        assert_eq!(line.chars().count(), 41);
    }
    let jose = text
        .lines()
        .find(|l| l.starts_with("DELACRUZ,JOSE"))
        .unwrap();
    assert!(jose.ends_with("2009-03-12M"));

    Ok(())
}
