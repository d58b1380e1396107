use chrono::NaiveDate;
use roster_reconciler::*;

fn main() {
    env_logger::init();

    println!("📤 Outbound Submission Feed Demo\n");
    println!("Expands compound names into the variants the receiving agency");
    println!("might register a child under, then renders the fixed-width file.\n");

    let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();

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
            exited_care: None,
            fiscal_year: 2025,
            quarter: 2,
        },
    ];

    let period = FiscalPeriod {
        fiscal_year: 2025,
        quarter: Some(2),
    };
    let records = build_outbound_feed(rows, &period);

    println!("Reference table ({} name-variant rows):", records.len());
    print!(
        "{}",
        outbound::reference_report(&records).to_csv_string().unwrap()
    );

    let mut buf = Vec::new();
    let written = write_fixed_width(&records, &mut buf).unwrap();

    println!("\nFixed-width submission file ({} lines, 41 chars each):", written);
    print!("{}", String::from_utf8(buf).unwrap());
}
