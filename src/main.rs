use admission_import::{
    apply_reference_seed, load_csv, stage_records, table_counts, CliArgs, Command, ImportConfig,
    ImportReport, Importer, ReferenceSeed, RunArgs, SqliteStore,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let store = SqliteStore::new(&args.db);

    match &args.command {
        Command::Init => run_init(&store),
        Command::Reference { file } => run_reference(&store, file),
        Command::Load { call_round, file } => run_load(&store, call_round, file),
        Command::Run(run_args) => run_import(&args.db, run_args),
        Command::Stats => run_stats(&store),
    }
}

fn run_init(store: &SqliteStore) -> Result<()> {
    println!("🔧 Setting up database...");
    let seeded = store
        .init()
        .with_context(|| format!("Failed to initialize {}", store.path().display()))?;

    println!("✓ Database initialized with WAL mode");
    println!("✓ Seeded {} default reference rows", seeded);
    Ok(())
}

fn run_reference(store: &SqliteStore, file: &Path) -> Result<()> {
    println!("📂 Loading reference data...");
    let seed = ReferenceSeed::from_path(file)
        .with_context(|| format!("Failed to read reference seed {}", file.display()))?;

    let mut conn = store.connect()?;
    let applied = apply_reference_seed(&mut conn, &seed).context("Failed to apply reference seed")?;

    println!("✓ Enrollment periods: {}", seed.enrollment_periods.len());
    println!("✓ Call rounds: {}", seed.call_rounds.len());
    println!("✓ Programs: {}", seed.programs.len());
    println!("✓ Queues: {}", seed.queues.len());
    println!("✓ Postal codes: {}", seed.postal_codes.len());
    println!("✅ Applied {} reference rows", applied);
    Ok(())
}

fn run_load(store: &SqliteStore, call_round: &str, file: &Path) -> Result<()> {
    println!("📂 Loading CSV...");
    let records = load_csv(file).with_context(|| format!("Failed to load {}", file.display()))?;
    println!("✓ Loaded {} candidate rows from CSV", records.len());

    println!("\n💾 Staging rows for call round {}...", call_round);
    let mut conn = store.connect()?;
    let summary = stage_records(&mut conn, call_round, &records).context("Failed to stage rows")?;

    println!("✓ Inserted: {} rows", summary.inserted);
    println!("✓ Skipped duplicates: {}", summary.duplicates);
    Ok(())
}

fn run_import(db: &Path, run_args: &RunArgs) -> Result<()> {
    let config = ImportConfig::from_args(db, run_args).context("Invalid configuration")?;
    let store = Arc::new(SqliteStore::new(&config.db_path));
    let importer = Importer::with_store(store, config.options);

    let report = match importer.run(&config.call_round_id) {
        Ok(report) => report,
        Err(err) => {
            error!(kind = err.kind().as_str(), "Import failed: {}", err);
            return Err(err).context(format!("Import of call round '{}' failed", config.call_round_id));
        }
    };

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, config.options.worker_threads);
    }
    Ok(())
}

fn print_report(report: &ImportReport, workers: usize) {
    let created = &report.created;
    let timings = &report.timings;

    println!("\n📊 Import Summary");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("   Call round:        {}", report.call_round_id);
    println!("   Enrollment period: {}", report.enrollment_period_id);
    println!("   Records:           {}", report.records);
    println!("   Batches:           {} ({} workers)", report.batches, workers);
    println!();
    println!("🆕 New entities");
    println!("   Personal data:          {}", created.personal_data);
    println!("   Candidates:             {}", created.candidates);
    println!("   Exam data:              {}", created.exam_data);
    println!("   Course options:         {}", created.course_options);
    println!("   Option history:         {}", created.option_history);
    println!("   Socioeconomic profiles: {}", created.socioeconomic_profiles);
    println!("   Phones:                 {}", created.phones);
    println!("   Addresses:              {}", created.addresses);
    println!("   Exam/course links:      {}", created.exam_course_options);
    println!();
    println!("⏱️  Timings");
    println!("   Pre-processing: {:>8} ms", timings.index_build.as_millis());
    println!("   Processing:     {:>8} ms", timings.reconcile.as_millis());
    println!("   Persistence:    {:>8} ms", timings.persist.as_millis());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ {} rows persisted in {} ms", report.rows_persisted, timings.total().as_millis());
}

fn run_stats(store: &SqliteStore) -> Result<()> {
    let conn = store.connect()?;
    let counts = table_counts(&conn).context("Failed to read table counts")?;

    println!("📊 Database: {}", store.path().display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for count in counts {
        println!("   {:<24} {:>10}", count.table, count.rows);
    }
    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("admission_import=debug,warn")
        } else {
            EnvFilter::new("admission_import=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
