// End-to-end runs against a real SQLite file

use admission_import::db::{count_rows, set_period_status};
use admission_import::model::{PostalRecord, Program, Queue};
use admission_import::{
    apply_reference_seed, load_csv, stage_records, CallRound, EnrollmentPeriod, ErrorKind,
    ImportError, Importer, PeriodStatus, PipelineOptions, RawCandidateRecord, ReferenceSeed,
    SqliteStore, StageSummary,
};
use std::sync::Arc;
use tempfile::TempDir;

const ROUND: &str = "round-2025-1";

fn record(n: usize) -> RawCandidateRecord {
    RawCandidateRecord {
        national_id: format!("{:03}.{:03}.{:03}-{:02}", n / 1_000_000, n / 1000 % 1000, n % 1000, 10),
        full_name: format!("Candidate {}", n),
        birth_date: "14/03/2005".to_string(),
        email: format!("c{}@example.com", n),
        exam_number: format!("25{:010}", n),
        score_languages: "612,4".to_string(),
        score_humanities: "640".to_string(),
        score_natural_sciences: "590,1".to_string(),
        score_mathematics: "701".to_string(),
        score_essay: "860".to_string(),
        postal_code: format!("{:05}-{:03}", 20000 + n, 0),
        street: format!("Rua {}", n),
        street_number: n.to_string(),
        complement: String::new(),
        district: "Tijuca".to_string(),
        city: "Rio de Janeiro".to_string(),
        state: "RJ".to_string(),
        phone_1: format!("21 9{:08}", n),
        phone_2: if n % 2 == 0 { format!("21 3{:07}", n) } else { String::new() },
        program_code: "101".to_string(),
        queue_code: if n % 3 == 0 { "2" } else { "1" }.to_string(),
        ranking: n.to_string(),
        final_score: "688,9".to_string(),
        family_income: "1-3".to_string(),
        school_type: "public".to_string(),
        household_size: "3".to_string(),
    }
}

fn records(count: usize) -> Vec<RawCandidateRecord> {
    (1..=count).map(record).collect()
}

fn seed() -> ReferenceSeed {
    ReferenceSeed {
        enrollment_periods: vec![
            EnrollmentPeriod {
                id: "period-2025".to_string(),
                competition_id: "comp-2025".to_string(),
                description: "2025 admissions".to_string(),
                status: PeriodStatus::InProgress,
            },
            EnrollmentPeriod {
                id: "period-2024".to_string(),
                competition_id: "comp-2024".to_string(),
                description: "2024 admissions".to_string(),
                status: PeriodStatus::Closed,
            },
        ],
        call_rounds: vec![
            CallRound {
                id: ROUND.to_string(),
                competition_id: "comp-2025".to_string(),
                enrollment_period_id: "period-2025".to_string(),
                number: 1,
                description: "First call".to_string(),
            },
            CallRound {
                id: "round-2024-1".to_string(),
                competition_id: "comp-2024".to_string(),
                enrollment_period_id: "period-2024".to_string(),
                number: 1,
                description: String::new(),
            },
        ],
        programs: vec![Program {
            id: "program-101".to_string(),
            competition_id: "comp-2025".to_string(),
            code: 101,
            name: "Medicina".to_string(),
        }],
        queues: vec![
            Queue {
                id: "queue-1".to_string(),
                code: 1,
                description: "Ampla concorrência".to_string(),
            },
            Queue {
                id: "queue-2".to_string(),
                code: 2,
                description: "Escola pública".to_string(),
            },
        ],
        // Every fifth record's postal code is known
        postal_codes: (1..=250)
            .filter(|n| n % 5 == 0)
            .map(|n| PostalRecord {
                id: format!("postal-{}", n),
                postal_code: format!("{:05}{:03}", 20000 + n, 0),
                street: "Rua Conde de Bonfim".to_string(),
                district: "Tijuca".to_string(),
                city: "Rio de Janeiro".to_string(),
                state: "RJ".to_string(),
            })
            .collect(),
    }
}

fn setup(rows: &[RawCandidateRecord]) -> (TempDir, Arc<SqliteStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::new(dir.path().join("admission.db")));
    store.init().unwrap();

    let mut conn = store.connect().unwrap();
    apply_reference_seed(&mut conn, &seed()).unwrap();
    stage_records(&mut conn, ROUND, rows).unwrap();

    (dir, store)
}

fn options(batch_size: usize) -> PipelineOptions {
    PipelineOptions {
        worker_threads: 4,
        batch_size,
    }
}

fn count(store: &SqliteStore, table: &str) -> i64 {
    count_rows(&store.connect().unwrap(), table).unwrap()
}

#[test]
fn test_import_250_records_in_three_batches() {
    let (_dir, store) = setup(&records(250));

    let report = Importer::with_store(store.clone(), options(100)).run(ROUND).unwrap();

    assert_eq!(report.records, 250);
    assert_eq!(report.batches, 3);
    assert_eq!(report.enrollment_period_id, "period-2025");
    assert_eq!(report.created.personal_data, 250);
    assert_eq!(report.created.phones, 250 + 125);
    assert_eq!(report.created.addresses, 50);
    assert_eq!(report.rows_persisted, report.created.total());

    assert_eq!(count(&store, "personal_data"), 250);
    assert_eq!(count(&store, "candidates"), 250);
    assert_eq!(count(&store, "exam_data"), 250);
    assert_eq!(count(&store, "course_options"), 250);
    assert_eq!(count(&store, "option_history"), 250);
    assert_eq!(count(&store, "socioeconomic_profiles"), 250);
    assert_eq!(count(&store, "phones"), 375);
    assert_eq!(count(&store, "addresses"), 50);
    assert_eq!(count(&store, "exam_course_options"), 250);

    println!("✅ 250 records imported in {} ms", report.timings.total().as_millis());
}

#[test]
fn test_rerun_reuses_existing_entities() {
    let (_dir, store) = setup(&records(120));
    Importer::with_store(store.clone(), options(50)).run(ROUND).unwrap();

    let second = Importer::with_store(store.clone(), options(50)).run(ROUND).unwrap();

    assert_eq!(second.created.personal_data, 0);
    assert_eq!(second.created.candidates, 0);
    assert_eq!(second.created.exam_data, 0);
    // Course options and their side rows are always new
    assert_eq!(second.created.course_options, 120);
    assert_eq!(second.created.exam_course_options, 120);

    assert_eq!(count(&store, "personal_data"), 120);
    assert_eq!(count(&store, "candidates"), 120);
    assert_eq!(count(&store, "course_options"), 240);
}

#[test]
fn test_no_period_in_progress() {
    let (_dir, store) = setup(&records(10));
    set_period_status(&store.connect().unwrap(), "period-2025", PeriodStatus::Closed).unwrap();

    let err = Importer::with_store(store.clone(), options(100)).run(ROUND).unwrap_err();

    assert!(matches!(err, ImportError::NoPeriodInProgress));
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert_eq!(count(&store, "personal_data"), 0);
}

#[test]
fn test_call_round_of_closed_period() {
    let (_dir, store) = setup(&records(10));

    let err = Importer::with_store(store.clone(), options(100))
        .run("round-2024-1")
        .unwrap_err();

    assert!(matches!(err, ImportError::PeriodNotInProgress { .. }));
    assert_eq!(count(&store, "course_options"), 0);
}

#[test]
fn test_duplicates_within_one_batch_are_merged() {
    let mut rows = records(4);
    rows[2].national_id = rows[0].national_id.clone();
    let (_dir, store) = setup(&rows);

    let report = Importer::with_store(store.clone(), options(4)).run(ROUND).unwrap();

    assert_eq!(report.created.personal_data, 3);
    assert_eq!(count(&store, "personal_data"), 3);
}

#[test]
fn test_duplicates_across_batches_are_not_merged() {
    let mut rows = records(4);
    rows[2].national_id = rows[0].national_id.clone();
    let (_dir, store) = setup(&rows);

    // Rows 0 and 2 land in different batches; neither sees the other's new entity
    let report = Importer::with_store(store.clone(), options(2)).run(ROUND).unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.created.personal_data, 4);
    assert_eq!(count(&store, "personal_data"), 4);
}

#[test]
fn test_unknown_program_aborts_before_persistence() {
    let mut rows = records(30);
    rows[17].program_code = "999".to_string();
    let (_dir, store) = setup(&rows);

    let err = Importer::with_store(store.clone(), options(10)).run(ROUND).unwrap_err();

    assert!(matches!(err, ImportError::ReferenceMissing { kind: "program", .. }));
    assert_eq!(err.kind(), ErrorKind::Data);
    assert_eq!(count(&store, "personal_data"), 0);
}

#[test]
fn test_csv_staging_is_idempotent() {
    let (dir, store) = setup(&[]);
    let csv_path = dir.path().join("candidates.csv");

    let mut writer = csv::Writer::from_path(&csv_path).unwrap();
    for row in records(8) {
        writer.serialize(row).unwrap();
    }
    writer.flush().unwrap();

    let loaded = load_csv(&csv_path).unwrap();
    assert_eq!(loaded, records(8));

    let mut conn = store.connect().unwrap();
    let first = stage_records(&mut conn, ROUND, &loaded).unwrap();
    let second = stage_records(&mut conn, ROUND, &loaded).unwrap();

    assert_eq!(first, StageSummary { inserted: 8, duplicates: 0 });
    assert_eq!(second, StageSummary { inserted: 0, duplicates: 8 });

    let report = Importer::with_store(store.clone(), options(3)).run(ROUND).unwrap();
    assert_eq!(report.records, 8);
    assert_eq!(report.batches, 3);
}
