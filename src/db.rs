// 🗄️ SQLite Store - schema, staging, reference seeding and the pipeline's collaborators
//
// One connection per call: the store itself only holds a path, so it can be
// shared by every worker. SQLite serializes writers; the busy timeout makes
// concurrent batches wait for each other instead of failing.

use crate::entities::{EntityBatch, EntityCategory};
use crate::error::{ImportError, Result};
use crate::model::{
    digits_only, AddressType, CallRound, Country, EnrollmentPeriod, PeriodStatus, PhoneType,
    PostalRecord, Program, Queue, RawCandidateRecord, Status, SystemUser, HOME_COUNTRY,
    INITIAL_STATUS_CODE, RESIDENTIAL_DESCRIPTION, SYSTEM_USER_LOGIN,
};
use crate::store::{Batcher, CandidateSource, ExistingStateLookup, ReferenceLookup};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// How long a writer waits for another worker's transaction
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Keys per `IN (...)` query, well under SQLite's bound-parameter limit
const LOOKUP_CHUNK: usize = 500;

// ============================================================================
// CONNECTION + SCHEMA
// ============================================================================

pub fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

    // ==========================================================================
    // Reference data
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS address_types (
            id TEXT PRIMARY KEY,
            description TEXT UNIQUE NOT NULL
        );
        CREATE TABLE IF NOT EXISTS phone_types (
            id TEXT PRIMARY KEY,
            description TEXT UNIQUE NOT NULL
        );
        CREATE TABLE IF NOT EXISTS countries (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        );
        CREATE TABLE IF NOT EXISTS statuses (
            id TEXT PRIMARY KEY,
            code TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            login TEXT UNIQUE NOT NULL
        );
        CREATE TABLE IF NOT EXISTS enrollment_periods (
            id TEXT PRIMARY KEY,
            competition_id TEXT NOT NULL,
            description TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('planned', 'in_progress', 'closed'))
        );
        CREATE TABLE IF NOT EXISTS call_rounds (
            id TEXT PRIMARY KEY,
            competition_id TEXT NOT NULL,
            enrollment_period_id TEXT NOT NULL REFERENCES enrollment_periods(id),
            number INTEGER NOT NULL,
            description TEXT NOT NULL DEFAULT ''
        );
        CREATE TABLE IF NOT EXISTS programs (
            id TEXT PRIMARY KEY,
            competition_id TEXT NOT NULL,
            code INTEGER NOT NULL,
            name TEXT NOT NULL,
            UNIQUE (competition_id, code)
        );
        CREATE TABLE IF NOT EXISTS queues (
            id TEXT PRIMARY KEY,
            code INTEGER UNIQUE NOT NULL,
            description TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS postal_codes (
            id TEXT PRIMARY KEY,
            postal_code TEXT UNIQUE NOT NULL,
            street TEXT NOT NULL DEFAULT '',
            district TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            state TEXT NOT NULL DEFAULT ''
        );",
    )?;

    // ==========================================================================
    // Staging (raw rows per call round, deduplicated by hash)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS candidate_imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            call_round_id TEXT NOT NULL REFERENCES call_rounds(id),
            payload TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Derived entities
    // Natural keys are indexed, never UNIQUE
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS personal_data (
            id TEXT PRIMARY KEY,
            national_id TEXT NOT NULL,
            full_name TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            email TEXT,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS candidates (
            id TEXT PRIMARY KEY,
            personal_data_id TEXT NOT NULL REFERENCES personal_data(id),
            enrollment_period_id TEXT NOT NULL REFERENCES enrollment_periods(id),
            national_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS exam_data (
            id TEXT PRIMARY KEY,
            exam_number TEXT NOT NULL,
            score_languages REAL NOT NULL,
            score_humanities REAL NOT NULL,
            score_natural_sciences REAL NOT NULL,
            score_mathematics REAL NOT NULL,
            score_essay REAL NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS course_options (
            id TEXT PRIMARY KEY,
            candidate_id TEXT NOT NULL REFERENCES candidates(id),
            call_round_id TEXT NOT NULL REFERENCES call_rounds(id),
            program_id TEXT NOT NULL REFERENCES programs(id),
            queue_id TEXT NOT NULL REFERENCES queues(id),
            status_id TEXT NOT NULL REFERENCES statuses(id),
            ranking INTEGER NOT NULL,
            final_score REAL NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS option_history (
            id TEXT PRIMARY KEY,
            course_option_id TEXT NOT NULL REFERENCES course_options(id),
            status_id TEXT NOT NULL REFERENCES statuses(id),
            user_id TEXT NOT NULL REFERENCES users(id),
            recorded_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS socioeconomic_profiles (
            id TEXT PRIMARY KEY,
            course_option_id TEXT NOT NULL REFERENCES course_options(id),
            family_income TEXT,
            school_type TEXT,
            household_size INTEGER
        );
        CREATE TABLE IF NOT EXISTS phones (
            id TEXT PRIMARY KEY,
            personal_data_id TEXT NOT NULL REFERENCES personal_data(id),
            phone_type_id TEXT NOT NULL REFERENCES phone_types(id),
            number TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS addresses (
            id TEXT PRIMARY KEY,
            personal_data_id TEXT NOT NULL REFERENCES personal_data(id),
            address_type_id TEXT NOT NULL REFERENCES address_types(id),
            country_id TEXT NOT NULL REFERENCES countries(id),
            postal_code_id TEXT NOT NULL REFERENCES postal_codes(id),
            street TEXT NOT NULL,
            number TEXT,
            complement TEXT,
            district TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS exam_course_options (
            id TEXT PRIMARY KEY,
            exam_data_id TEXT NOT NULL REFERENCES exam_data(id),
            course_option_id TEXT NOT NULL REFERENCES course_options(id)
        );",
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_imports_call_round ON candidate_imports(call_round_id);
        CREATE INDEX IF NOT EXISTS idx_personal_data_national_id ON personal_data(national_id);
        CREATE INDEX IF NOT EXISTS idx_exam_data_exam_number ON exam_data(exam_number);
        CREATE INDEX IF NOT EXISTS idx_candidates_person_period
            ON candidates(personal_data_id, enrollment_period_id);
        CREATE INDEX IF NOT EXISTS idx_course_options_call_round ON course_options(call_round_id);",
    )?;

    Ok(())
}

/// Insert the fixed taxonomies the importer resolves by name.
/// Returns how many were missing.
pub fn seed_defaults(conn: &Connection) -> Result<usize> {
    let mut inserted = 0;

    inserted += conn.execute(
        "INSERT OR IGNORE INTO address_types (id, description) VALUES (?1, ?2)",
        params![new_id(), RESIDENTIAL_DESCRIPTION],
    )?;
    inserted += conn.execute(
        "INSERT OR IGNORE INTO phone_types (id, description) VALUES (?1, ?2)",
        params![new_id(), RESIDENTIAL_DESCRIPTION],
    )?;
    inserted += conn.execute(
        "INSERT OR IGNORE INTO countries (id, name) VALUES (?1, ?2)",
        params![new_id(), HOME_COUNTRY],
    )?;
    inserted += conn.execute(
        "INSERT OR IGNORE INTO statuses (id, code, description) VALUES (?1, ?2, ?3)",
        params![new_id(), INITIAL_STATUS_CODE, "Convocado"],
    )?;
    inserted += conn.execute(
        "INSERT OR IGNORE INTO users (id, login) VALUES (?1, ?2)",
        params![new_id(), SYSTEM_USER_LOGIN],
    )?;

    Ok(inserted)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// REFERENCE SEED (JSON)
// ============================================================================

/// Competition-specific master data, loaded from a JSON document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceSeed {
    #[serde(default)]
    pub enrollment_periods: Vec<EnrollmentPeriod>,

    #[serde(default)]
    pub call_rounds: Vec<CallRound>,

    #[serde(default)]
    pub programs: Vec<Program>,

    #[serde(default)]
    pub queues: Vec<Queue>,

    #[serde(default)]
    pub postal_codes: Vec<PostalRecord>,
}

impl ReferenceSeed {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn len(&self) -> usize {
        self.enrollment_periods.len()
            + self.call_rounds.len()
            + self.programs.len()
            + self.queues.len()
            + self.postal_codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Upsert every seed row in one transaction. Re-applying a seed updates in place.
pub fn apply_reference_seed(conn: &mut Connection, seed: &ReferenceSeed) -> Result<usize> {
    let tx = conn.transaction()?;

    for period in &seed.enrollment_periods {
        tx.execute(
            "INSERT INTO enrollment_periods (id, competition_id, description, status)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                competition_id = excluded.competition_id,
                description = excluded.description,
                status = excluded.status",
            params![period.id, period.competition_id, period.description, period.status.as_str()],
        )?;
    }

    for round in &seed.call_rounds {
        tx.execute(
            "INSERT INTO call_rounds (id, competition_id, enrollment_period_id, number, description)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                competition_id = excluded.competition_id,
                enrollment_period_id = excluded.enrollment_period_id,
                number = excluded.number,
                description = excluded.description",
            params![
                round.id,
                round.competition_id,
                round.enrollment_period_id,
                round.number,
                round.description
            ],
        )?;
    }

    for program in &seed.programs {
        tx.execute(
            "INSERT INTO programs (id, competition_id, code, name) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                competition_id = excluded.competition_id,
                code = excluded.code,
                name = excluded.name",
            params![program.id, program.competition_id, program.code, program.name],
        )?;
    }

    for queue in &seed.queues {
        tx.execute(
            "INSERT INTO queues (id, code, description) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET code = excluded.code, description = excluded.description",
            params![queue.id, queue.code, queue.description],
        )?;
    }

    for postal in &seed.postal_codes {
        tx.execute(
            "INSERT INTO postal_codes (id, postal_code, street, district, city, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                postal_code = excluded.postal_code,
                street = excluded.street,
                district = excluded.district,
                city = excluded.city,
                state = excluded.state",
            params![
                postal.id,
                digits_only(&postal.postal_code),
                postal.street,
                postal.district,
                postal.city,
                postal.state
            ],
        )?;
    }

    tx.commit()?;
    Ok(seed.len())
}

pub fn set_period_status(conn: &Connection, period_id: &str, status: PeriodStatus) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE enrollment_periods SET status = ?1 WHERE id = ?2",
        params![status.as_str(), period_id],
    )?;
    Ok(updated > 0)
}

// ============================================================================
// STAGING
// ============================================================================

pub fn load_csv(csv_path: &Path) -> Result<Vec<RawCandidateRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: RawCandidateRecord = result?;
        records.push(record);
    }

    Ok(records)
}

/// Result of staging raw rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub inserted: usize,
    pub duplicates: usize,
}

/// Stage raw rows for a call round. Rows already staged are skipped.
pub fn stage_records(
    conn: &mut Connection,
    call_round_id: &str,
    records: &[RawCandidateRecord],
) -> Result<StageSummary> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT id FROM call_rounds WHERE id = ?1",
            params![call_round_id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(ImportError::CallRoundNotFound(call_round_id.to_string()));
    }

    let mut summary = StageSummary::default();
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO candidate_imports (idempotency_hash, call_round_id, payload)
             VALUES (?1, ?2, ?3)",
        )?;

        for record in records {
            let hash = record.compute_idempotency_hash(call_round_id);
            let payload = serde_json::to_string(record)?;

            match stmt.execute(params![hash, call_round_id, payload]) {
                Ok(_) => summary.inserted += 1,
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    summary.duplicates += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    tx.commit()?;

    info!(
        call_round = call_round_id,
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        "Staged candidate rows"
    );
    Ok(summary)
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count)
}

/// Row count of the staging table and every derived-entity table
pub fn table_counts(conn: &Connection) -> Result<Vec<TableCount>> {
    std::iter::once("candidate_imports")
        .chain(EntityCategory::INSERT_ORDER.iter().map(|c| c.table()))
        .map(|table| {
            Ok(TableCount {
                table,
                rows: count_rows(conn, table)?,
            })
        })
        .collect()
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// Every pipeline collaborator, backed by one SQLite file
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connect(&self) -> Result<Connection> {
        open_connection(&self.path)
    }

    /// Create the schema and the fixed taxonomies
    pub fn init(&self) -> Result<usize> {
        let conn = self.connect()?;
        setup_database(&conn)?;
        seed_defaults(&conn)
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// `key → id` pairs for every key found, querying in chunks.
/// `sql` receives the placeholder list; `prefix` binds ahead of the keys.
fn lookup_pairs<'k>(
    conn: &Connection,
    keys: impl IntoIterator<Item = &'k String>,
    prefix: &[&str],
    sql: impl Fn(&str) -> String,
) -> Result<HashMap<String, String>> {
    let keys: Vec<&String> = keys.into_iter().collect();
    let mut found = HashMap::new();

    for chunk in keys.chunks(LOOKUP_CHUNK) {
        let mut stmt = conn.prepare(&sql(&placeholders(chunk.len())))?;
        let bound = prefix
            .iter()
            .copied()
            .chain(chunk.iter().map(|k| k.as_str()));
        let rows = stmt.query_map(params_from_iter(bound), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, id) = row?;
            // Oldest row wins when a natural key was persisted twice
            found.entry(key).or_insert(id);
        }
    }

    Ok(found)
}

impl CandidateSource for SqliteStore {
    fn fetch_call_round(&self, call_round_id: &str) -> Result<CallRound> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id, competition_id, enrollment_period_id, number, description
             FROM call_rounds WHERE id = ?1",
            params![call_round_id],
            |row| {
                Ok(CallRound {
                    id: row.get(0)?,
                    competition_id: row.get(1)?,
                    enrollment_period_id: row.get(2)?,
                    number: row.get(3)?,
                    description: row.get(4)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| ImportError::CallRoundNotFound(call_round_id.to_string()))
    }

    fn fetch_call_round_records(&self, call_round_id: &str) -> Result<Vec<RawCandidateRecord>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT payload FROM candidate_imports WHERE call_round_id = ?1 ORDER BY id")?;

        let payloads = stmt
            .query_map(params![call_round_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let records = payloads
            .iter()
            .map(|payload| serde_json::from_str(payload))
            .collect::<std::result::Result<Vec<RawCandidateRecord>, _>>()?;

        debug!(call_round = call_round_id, records = records.len(), "fetched staged rows");
        Ok(records)
    }
}

impl ReferenceLookup for SqliteStore {
    fn fetch_active_enrollment_period(&self) -> Result<EnrollmentPeriod> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id, competition_id, description FROM enrollment_periods
             WHERE status = ?1 ORDER BY id LIMIT 1",
            params![PeriodStatus::InProgress.as_str()],
            |row| {
                Ok(EnrollmentPeriod {
                    id: row.get(0)?,
                    competition_id: row.get(1)?,
                    description: row.get(2)?,
                    status: PeriodStatus::InProgress,
                })
            },
        )
        .optional()?
        .ok_or(ImportError::NoPeriodInProgress)
    }

    fn find_address_type(&self, description: &str) -> Result<Option<AddressType>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT id, description FROM address_types WHERE description = ?1",
                params![description],
                |row| {
                    Ok(AddressType {
                        id: row.get(0)?,
                        description: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn find_phone_type(&self, description: &str) -> Result<Option<PhoneType>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT id, description FROM phone_types WHERE description = ?1",
                params![description],
                |row| {
                    Ok(PhoneType {
                        id: row.get(0)?,
                        description: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn find_country(&self, name: &str) -> Result<Option<Country>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT id, name FROM countries WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Country {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn find_status(&self, code: &str) -> Result<Option<Status>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT id, code, description FROM statuses WHERE code = ?1",
                params![code],
                |row| {
                    Ok(Status {
                        id: row.get(0)?,
                        code: row.get(1)?,
                        description: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn find_system_user(&self) -> Result<Option<SystemUser>> {
        let conn = self.connect()?;
        Ok(conn
            .query_row(
                "SELECT id, login FROM users WHERE login = ?1",
                params![SYSTEM_USER_LOGIN],
                |row| {
                    Ok(SystemUser {
                        id: row.get(0)?,
                        login: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn lookup_programs_by_competition(&self, competition_id: &str) -> Result<HashMap<i64, Program>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT id, competition_id, code, name FROM programs WHERE competition_id = ?1")?;

        let programs = stmt
            .query_map(params![competition_id], |row| {
                Ok(Program {
                    id: row.get(0)?,
                    competition_id: row.get(1)?,
                    code: row.get(2)?,
                    name: row.get(3)?,
                })
            })?
            .map(|row| row.map(|p| (p.code, p)))
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(programs)
    }

    fn lookup_all_queues(&self) -> Result<HashMap<i64, Queue>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT id, code, description FROM queues")?;

        let queues = stmt
            .query_map([], |row| {
                Ok(Queue {
                    id: row.get(0)?,
                    code: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .map(|row| row.map(|q| (q.code, q)))
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(queues)
    }
}

impl ExistingStateLookup for SqliteStore {
    fn lookup_existing_personal_data(&self, national_ids: &HashSet<String>) -> Result<HashMap<String, String>> {
        let conn = self.connect()?;
        lookup_pairs(&conn, national_ids, &[], |keys| {
            format!(
                "SELECT national_id, id FROM personal_data WHERE national_id IN ({}) ORDER BY rowid",
                keys
            )
        })
    }

    fn lookup_existing_exam_data(&self, exam_numbers: &HashSet<String>) -> Result<HashMap<String, String>> {
        let conn = self.connect()?;
        lookup_pairs(&conn, exam_numbers, &[], |keys| {
            format!(
                "SELECT exam_number, id FROM exam_data WHERE exam_number IN ({}) ORDER BY rowid",
                keys
            )
        })
    }

    fn lookup_existing_candidates(
        &self,
        personal_data_ids: &[String],
        period: &EnrollmentPeriod,
    ) -> Result<HashMap<String, String>> {
        let conn = self.connect()?;
        lookup_pairs(&conn, personal_data_ids, &[period.id.as_str()], |keys| {
            format!(
                "SELECT national_id, id FROM candidates
                 WHERE enrollment_period_id = ? AND personal_data_id IN ({})
                 ORDER BY rowid",
                keys
            )
        })
    }

    fn lookup_postal_records(&self, postal_codes: &[String]) -> Result<HashMap<String, PostalRecord>> {
        let conn = self.connect()?;
        let mut found = HashMap::new();

        for chunk in postal_codes.chunks(LOOKUP_CHUNK) {
            let sql = format!(
                "SELECT id, postal_code, street, district, city, state
                 FROM postal_codes WHERE postal_code IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok(PostalRecord {
                    id: row.get(0)?,
                    postal_code: row.get(1)?,
                    street: row.get(2)?,
                    district: row.get(3)?,
                    city: row.get(4)?,
                    state: row.get(5)?,
                })
            })?;

            for row in rows {
                let postal = row?;
                found.insert(postal.postal_code.clone(), postal);
            }
        }

        Ok(found)
    }
}

impl Batcher for SqliteStore {
    fn bulk_insert(&self, batch: EntityBatch<'_>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let category = batch.category();
        let mut conn = self.connect()?;
        insert_batch(&mut conn, batch).map_err(|source| ImportError::Persistence { category, source })
    }
}

/// One all-or-nothing transaction per category batch
fn insert_batch(conn: &mut Connection, batch: EntityBatch<'_>) -> rusqlite::Result<usize> {
    // Take the write lock up front so the busy timeout applies
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let written = match batch {
        EntityBatch::PersonalData(rows) => {
            let mut stmt = tx.prepare(
                "INSERT INTO personal_data (id, national_id, full_name, birth_date, email, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for p in rows {
                stmt.execute(params![
                    p.id,
                    p.national_id,
                    p.full_name,
                    p.birth_date.to_string(),
                    p.email,
                    p.created_at.to_rfc3339()
                ])?;
            }
            rows.len()
        }
        EntityBatch::Candidates(rows) => {
            let mut stmt = tx.prepare(
                "INSERT INTO candidates (id, personal_data_id, enrollment_period_id, national_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for c in rows {
                stmt.execute(params![
                    c.id,
                    c.personal_data_id,
                    c.enrollment_period_id,
                    c.national_id,
                    c.created_at.to_rfc3339()
                ])?;
            }
            rows.len()
        }
        EntityBatch::ExamData(rows) => {
            let mut stmt = tx.prepare(
                "INSERT INTO exam_data (
                    id, exam_number, score_languages, score_humanities,
                    score_natural_sciences, score_mathematics, score_essay, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for e in rows {
                stmt.execute(params![
                    e.id,
                    e.exam_number,
                    e.score_languages,
                    e.score_humanities,
                    e.score_natural_sciences,
                    e.score_mathematics,
                    e.score_essay,
                    e.created_at.to_rfc3339()
                ])?;
            }
            rows.len()
        }
        EntityBatch::CourseOptions(rows) => {
            let mut stmt = tx.prepare(
                "INSERT INTO course_options (
                    id, candidate_id, call_round_id, program_id, queue_id,
                    status_id, ranking, final_score, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for o in rows {
                stmt.execute(params![
                    o.id,
                    o.candidate_id,
                    o.call_round_id,
                    o.program_id,
                    o.queue_id,
                    o.status_id,
                    o.ranking,
                    o.final_score,
                    o.created_at.to_rfc3339()
                ])?;
            }
            rows.len()
        }
        EntityBatch::OptionHistory(rows) => {
            let mut stmt = tx.prepare(
                "INSERT INTO option_history (id, course_option_id, status_id, user_id, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for h in rows {
                stmt.execute(params![
                    h.id,
                    h.course_option_id,
                    h.status_id,
                    h.user_id,
                    h.recorded_at.to_rfc3339()
                ])?;
            }
            rows.len()
        }
        EntityBatch::SocioeconomicProfiles(rows) => {
            let mut stmt = tx.prepare(
                "INSERT INTO socioeconomic_profiles (id, course_option_id, family_income, school_type, household_size)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for s in rows {
                stmt.execute(params![
                    s.id,
                    s.course_option_id,
                    s.family_income,
                    s.school_type,
                    s.household_size
                ])?;
            }
            rows.len()
        }
        EntityBatch::Phones(rows) => {
            let mut stmt = tx.prepare(
                "INSERT INTO phones (id, personal_data_id, phone_type_id, number) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for p in rows {
                stmt.execute(params![p.id, p.personal_data_id, p.phone_type_id, p.number])?;
            }
            rows.len()
        }
        EntityBatch::Addresses(rows) => {
            let mut stmt = tx.prepare(
                "INSERT INTO addresses (
                    id, personal_data_id, address_type_id, country_id, postal_code_id,
                    street, number, complement, district, city, state
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for a in rows {
                stmt.execute(params![
                    a.id,
                    a.personal_data_id,
                    a.address_type_id,
                    a.country_id,
                    a.postal_code_id,
                    a.street,
                    a.number,
                    a.complement,
                    a.district,
                    a.city,
                    a.state
                ])?;
            }
            rows.len()
        }
        EntityBatch::ExamCourseOptions(rows) => {
            let mut stmt = tx.prepare(
                "INSERT INTO exam_course_options (id, exam_data_id, course_option_id) VALUES (?1, ?2, ?3)",
            )?;
            for l in rows {
                stmt.execute(params![l.id, l.exam_data_id, l.course_option_id])?;
            }
            rows.len()
        }
    };

    tx.commit()?;
    Ok(written)
}
