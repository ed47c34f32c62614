use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use tracker_import::{
    config::{ENV_DATABASE, ENV_METADATA},
    load_bundle, logging, ImporterConfig, MetadataSnapshot, SqliteTrackerStore, TrackerImporter,
    TrackerStatus,
};

#[derive(Parser, Debug)]
#[command(name = "tracker-import")]
#[command(about = "Validate and commit tracker bundles", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Print reports as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database schema
    Init {
        #[arg(long, env = ENV_DATABASE)]
        db: Option<PathBuf>,
    },
    /// Dry run: validate a bundle against metadata and storage, write nothing
    Validate {
        #[arg(long, env = ENV_METADATA)]
        metadata: Option<PathBuf>,
        #[arg(long, env = ENV_DATABASE)]
        db: Option<PathBuf>,
        bundle: PathBuf,
    },
    /// Validate and commit a bundle
    Import {
        #[arg(long, env = ENV_METADATA)]
        metadata: Option<PathBuf>,
        #[arg(long, env = ENV_DATABASE)]
        db: Option<PathBuf>,
        bundle: PathBuf,
    },
    /// Show stored row counts
    Counts {
        #[arg(long, env = ENV_DATABASE)]
        db: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = ImporterConfig::load(cli.config.as_deref())?;
    logging::init(&config.log_filter);
    match cli.config.as_deref() {
        Some(path) => info!(path = %path.display(), "loaded TOML configuration"),
        None => info!("no configuration file, using defaults and environment"),
    }

    match cli.command {
        Command::Init { db } => {
            config.database_path = db.unwrap_or(config.database_path);
            run_init(&config)
        }
        Command::Validate { metadata, db, bundle } => {
            config.metadata_path = metadata.unwrap_or(config.metadata_path);
            config.database_path = db.unwrap_or(config.database_path);
            run_validate(&config, &bundle, cli.json)
        }
        Command::Import { metadata, db, bundle } => {
            config.metadata_path = metadata.unwrap_or(config.metadata_path);
            config.database_path = db.unwrap_or(config.database_path);
            run_import(&config, &bundle, cli.json)
        }
        Command::Counts { db } => {
            config.database_path = db.unwrap_or(config.database_path);
            run_counts(&config)
        }
    }
}

fn run_init(config: &ImporterConfig) -> Result<()> {
    println!("🗄️  Tracker database - SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    SqliteTrackerStore::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    println!("✓ Schema ready at {}", config.database_path.display());

    Ok(())
}

fn load_metadata(config: &ImporterConfig) -> Result<MetadataSnapshot> {
    println!("\n📂 Loading metadata...");
    let snapshot = MetadataSnapshot::load(&config.metadata_path)
        .with_context(|| format!("loading metadata {}", config.metadata_path.display()))?;
    println!(
        "✓ {} org units, {} programs, {} program stages",
        snapshot.org_unit_count(),
        snapshot.program_count(),
        snapshot.program_stage_count()
    );
    Ok(snapshot)
}

fn run_validate(config: &ImporterConfig, bundle_path: &Path, json: bool) -> Result<()> {
    let metadata = load_metadata(config)?;
    let store = SqliteTrackerStore::open(&config.database_path)?;
    let bundle = load_bundle(bundle_path)
        .with_context(|| format!("loading bundle {}", bundle_path.display()))?;

    println!("\n🔍 Validating {} entities...", bundle.entity_count());
    let report = TrackerImporter::new(&metadata).validate(&bundle, &store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for error in &report.error_reports {
            println!("  ❌ {} {}: {}", error.error_code, error.entity.uid, error.message);
        }
        for warning in &report.warning_reports {
            let (code, uid) = (warning.warning_code, &warning.entity.uid);
            println!("  ⚠️  {} {}: {}", code, uid, warning.message);
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.is_valid() {
        println!("✅ Bundle is valid ({})", report.summary());
        Ok(())
    } else {
        println!("❌ Bundle is invalid ({})", report.summary());
        std::process::exit(1);
    }
}

fn run_import(config: &ImporterConfig, bundle_path: &Path, json: bool) -> Result<()> {
    let metadata = load_metadata(config)?;
    let mut store = SqliteTrackerStore::open(&config.database_path)?;
    let bundle = load_bundle(bundle_path)
        .with_context(|| format!("loading bundle {}", bundle_path.display()))?;

    println!(
        "\n💾 Importing {} entities ({})...",
        bundle.entity_count(),
        bundle.import_strategy.as_str()
    );
    let report = TrackerImporter::new(&metadata).import(bundle, &mut store)?;
    info!(bundle = %report.bundle_id, state = report.state.as_str(), "import finished");

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let bundle_report = report
        .bundle_report
        .as_ref()
        .context("import finished without a bundle report")?;
    let counts = bundle_report.type_reports();

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("State: {}", report.state.as_str());
    println!(
        "✓ Tracked entities: {} created, {} updated, {} deleted",
        counts.tracked_entities.created,
        counts.tracked_entities.updated,
        counts.tracked_entities.deleted
    );
    println!(
        "✓ Enrollments:      {} created, {} updated, {} deleted",
        counts.enrollments.created, counts.enrollments.updated, counts.enrollments.deleted
    );
    println!(
        "✓ Events:           {} created, {} updated, {} deleted",
        counts.events.created, counts.events.updated, counts.events.deleted
    );

    match bundle_report.status() {
        TrackerStatus::Ok => {
            println!("🎉 Bundle committed");
            Ok(())
        }
        TrackerStatus::Warning => {
            let warnings = bundle_report.warning_reports().len();
            println!("✅ Bundle committed with {} warning(s)", warnings);
            Ok(())
        }
        TrackerStatus::Error => {
            for error in bundle_report.error_reports() {
                eprintln!("  ❌ {} {}: {}", error.error_code, error.entity.uid, error.message);
            }
            if let Some(failure) = bundle_report.failure() {
                eprintln!("  ❌ {}", failure);
            }
            eprintln!("❌ Bundle rejected, nothing was written");
            std::process::exit(1);
        }
    }
}

fn run_counts(config: &ImporterConfig) -> Result<()> {
    let store = SqliteTrackerStore::open(&config.database_path)?;
    let counts = store.counts()?;

    println!("📊 {}", config.database_path.display());
    println!("  Tracked entities: {}", counts.tracked_entities);
    println!("  Enrollments:      {}", counts.enrollments);
    println!("  Events:           {}", counts.events);

    Ok(())
}
