mod commands;
mod logging;
mod progress;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::Ordering;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use media_dedupe_core::export;
use media_dedupe_core::storage::queries::default_output_table;
use media_dedupe_core::storage::Database;
use media_dedupe_core::{default_policy, DedupeConfig, DedupeEngine, OutputRow, ResultSet};
use progress::CliReporter;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match media_dedupe_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::Dedupe {
            db,
            table,
            target,
            mode,
            single_threshold,
            coarse_threshold,
            fine_threshold,
            no_exact,
            no_scope,
            csv,
        }) => {
            let mut config = config;
            if let Some(mode) = mode {
                config.mode = mode.into();
            }
            if let Some(t) = single_threshold {
                config.single.threshold = t;
            }
            if let Some(t) = coarse_threshold {
                config.coarse.threshold = t;
            }
            if let Some(t) = fine_threshold {
                config.fine.threshold = t;
            }
            if no_exact {
                config.exact_content = false;
            }
            if no_scope {
                config.directory_scoping = false;
            }
            if let Err(err) = run_dedupe(config, &db, &table, target.as_deref(), csv.as_deref()) {
                error!("Error: {:#}", err);
                process::exit(1);
            }
        }
        Some(Commands::Summary { db, table }) => {
            if let Err(err) = run_summary(&db, &table) {
                error!("Error: {:#}", err);
            }
        }
        Some(Commands::Runs { db, limit }) => {
            if let Err(err) = run_list_runs(&db, limit) {
                error!("Error: {:#}", err);
            }
        }
        Some(Commands::PrintConfig) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn run_dedupe(
    config: DedupeConfig,
    db_path: &str,
    table: &str,
    target: Option<&str>,
    csv: Option<&str>,
) -> anyhow::Result<()> {
    let plans = usize::from(config.mode.runs_single()) + usize::from(config.mode.runs_two_phase());
    if target.is_some() && plans > 1 {
        bail!("--target needs --mode single or --mode two-phase");
    }

    let engine = DedupeEngine::new(config).context("invalid configuration")?;
    let token = engine.cancel_token();
    ctrlc::set_handler(move || {
        warn!("Interrupt received; finishing running partitions");
        token.store(true, Ordering::SeqCst);
    })?;

    let db = Database::open(db_path).with_context(|| format!("opening {}", db_path))?;
    let records = db.load_media_records(table)?;
    if records.is_empty() {
        warn!("Table {} has no rows", table);
    }

    let reporter = CliReporter::new(plans);
    let outcome = engine.run(records, &default_policy(), &reporter)?;

    for set in outcome.result_sets() {
        let target_table = target
            .map(str::to_string)
            .unwrap_or_else(|| default_output_table(table, set));
        let run_id = db.start_run(table, &target_table, &set.label())?;
        let written = db.write_result_set(table, &target_table, set)?;
        db.complete_run(run_id, set, outcome.cancelled)?;

        print_result_set(set, &target_table, written);

        if let Some(csv) = csv {
            let path = csv_path(Path::new(csv), set, plans > 1);
            let rows: Vec<OutputRow> = set.rows().collect();
            let count = export::write_csv(&path, &rows)?;
            info!("Wrote {} rows to {}", count, path.display());
        }

        print_directory_summary(&db, &target_table)?;
    }

    if outcome.dropped_duplicate_ids > 0 {
        warn!(
            "{} rows shared a file_path with an earlier row and were skipped",
            outcome.dropped_duplicate_ids
        );
    }
    info!(
        "Finished in {}",
        format!("{:.2}s", outcome.elapsed.as_secs_f64()).green()
    );
    Ok(())
}

/// With several result sets, each CSV gets the plan label appended to its stem.
fn csv_path(base: &Path, set: &ResultSet, several: bool) -> PathBuf {
    if !several {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dedupe".to_string());
    base.with_file_name(format!("{}_{}.csv", stem, set.label()))
}

fn print_result_set(set: &ResultSet, target_table: &str, written: usize) {
    let stats = &set.stats;
    println!();
    info!(
        "{} -> {} ({} rows)",
        set.label().bold(),
        target_table.cyan(),
        written
    );
    info!(
        "{} groups, {} with duplicates, {} redundant files",
        format!("{}", stats.groups).green(),
        format!("{}", stats.duplicate_groups).red(),
        format!("{}", stats.redundant_records).red(),
    );
    info!(
        "{} perceptual edges, {} exact edges, {} distance checks, {} unusable hash values",
        stats.edges.perceptual_edges,
        stats.edges.exact_edges,
        stats.edges.verified_pairs,
        stats.excluded_hash_values,
    );
    if !set.abandoned.is_empty() {
        warn!(
            "{} partitions not grouped: {}",
            format!("{}", set.abandoned.len()).yellow(),
            set.abandoned.join(", ")
        );
    }
}

fn print_directory_summary(db: &Database, target_table: &str) -> anyhow::Result<()> {
    let summary = db.directory_summary(target_table)?;
    println!(
        "{:<40} {:>10} {:>10} {:>10}",
        "directory".bold(),
        "files".bold(),
        "keep".bold(),
        "redundant".bold()
    );
    for row in &summary {
        println!(
            "{:<40} {:>10} {:>10} {:>10}",
            row.directory,
            row.total_files,
            row.representatives.to_string().green(),
            row.redundant().to_string().red()
        );
    }
    Ok(())
}

fn run_summary(db_path: &str, table: &str) -> anyhow::Result<()> {
    let db = Database::open(db_path).with_context(|| format!("opening {}", db_path))?;
    if !db.table_exists(table)? {
        bail!("table {} does not exist", table);
    }
    print_directory_summary(&db, table)
}

fn run_list_runs(db_path: &str, limit: i64) -> anyhow::Result<()> {
    let db = Database::open(db_path).with_context(|| format!("opening {}", db_path))?;
    for run in db.list_runs(limit)? {
        let status = match run.status.as_str() {
            "completed" => run.status.green(),
            "cancelled" => run.status.yellow(),
            _ => run.status.normal(),
        };
        println!(
            "#{} {} {} -> {} [{}] {} records, {} groups ({} duplicate) {}",
            run.id,
            run.started_at,
            run.source_table,
            run.target_table.cyan(),
            run.plan,
            run.records,
            run.group_count,
            run.duplicate_count,
            status
        );
    }
    Ok(())
}
