//! granary: batch ETL for a star-schema song-play warehouse.
//!
//! Two commands: `provision` drops and recreates the seven warehouse
//! tables; `run` bulk-loads the raw JSON datasets into staging, derives
//! the fact and dimension tables, and reports counts and insights.

mod config;
mod error;
mod pipeline;
mod report;
mod schema;
mod session;
mod staging;
mod transform;

use clap::{Parser, Subcommand};
use snafu::prelude::*;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{ConfigSnafu, EtlError};
use pipeline::{Pipeline, RunReport};

/// Star-schema warehouse ETL tool.
#[derive(Parser, Debug)]
#[command(name = "granary")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the statements the command would execute, without connecting.
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Drop and recreate all warehouse tables.
    Provision,
    /// Load staging, derive the star schema, and report insights.
    Run,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), EtlError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("granary starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;
    let pipeline = Pipeline::new(config);

    if args.dry_run {
        let plan = match args.command {
            Command::Provision => pipeline.provision_plan(),
            Command::Run => pipeline.run_plan(),
        };
        info!("Dry run mode - {} statements would execute", plan.len());
        for statement in &plan {
            info!("[{}]\n{}", statement.name, statement.sql.trim());
        }
        return Ok(());
    }

    match args.command {
        Command::Provision => {
            pipeline.provision().await?;
            info!("Provision completed successfully");
        }
        Command::Run => {
            let report = pipeline.run().await?;
            print_report(&report);
            info!("Run completed successfully");
        }
    }

    Ok(())
}

/// Surface counts and insights in the fixed reporting order.
fn print_report(report: &RunReport) {
    info!("Staged rows: {} events, {} songs", report.staged_events, report.staged_songs);
    info!(
        "Loaded rows: {} songplays, {} users, {} songs, {} artists, {} time",
        report.transform.songplays,
        report.transform.users,
        report.transform.songs,
        report.transform.artists,
        report.transform.time
    );

    info!("The number of records in each table:");
    for count in &report.counts {
        info!("  {}: {}", count.table, count.rows);
    }

    info!("Top 10 most played songs (title, artist, plays):");
    for song in &report.insights.top_songs {
        info!("  {} - {} ({} plays)", song.title, song.artist, song.plays);
    }

    info!("Peak usage hours (hour, plays):");
    for hour in &report.insights.peak_hours {
        info!("  {:02}:00 - {} plays", hour.hour, hour.plays);
    }

    info!("User demographics (gender, level, distinct users):");
    for group in &report.insights.demographics {
        info!(
            "  {} / {} - {} users",
            group.gender.as_deref().unwrap_or("unknown"),
            group.level.as_deref().unwrap_or("unknown"),
            group.users
        );
    }
}
