//! biodash: CLI front-end for the biorhythm dashboard data layer.
//!
//! Wires the cached, retrying API client together the way the dashboard's
//! rendering layer would, and exposes the same operations as subcommands.

mod config;

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::error;

use biorhythm_client::BiorhythmClient;
use service::{CachedValue, DataService};
use stats::{Correlation, CYCLES};
use ttl_cache::{MemoryCache, SharedCache};

/// Biorhythm dashboard data-access CLI.
#[derive(Parser)]
#[command(name = "biodash", about = "Biorhythm dashboard data-access CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check API connectivity and count available people.
    Status {
        /// Also list the people returned by the API.
        #[arg(long)]
        detailed: bool,
    },
    /// Show one person record.
    Person {
        id: u64,
        /// Bypass the cache and force a remote fetch.
        #[arg(long)]
        fresh: bool,
    },
    /// Fetch a biorhythm series and print derived statistics.
    Series {
        person_id: u64,
        /// Window start (YYYY-MM-DD); defaults to 365 days ago.
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Window end (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Maximum number of points to fetch.
        #[arg(long, default_value_t = 1000)]
        limit: u32,
        /// Bypass the cache and force a remote fetch.
        #[arg(long)]
        fresh: bool,
    },
    /// Trigger a remote recalculation and invalidate cached entries.
    Calculate {
        person_id: u64,
        #[arg(long, default_value_t = 365)]
        days: u32,
        #[arg(long, default_value = "")]
        notes: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biodash=info,service=info,biorhythm_client=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let client = match BiorhythmClient::from_config(&cfg) {
        Ok(client) => client,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let cache: SharedCache<CachedValue> = Arc::new(MemoryCache::new());
    let service = DataService::new(client, cache, Duration::from_secs(cfg.cache_ttl_secs));

    if let Err(e) = run(cli.command, &service).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(
    command: Command,
    service: &DataService<BiorhythmClient>,
) -> Result<(), common::Error> {
    match command {
        Command::Status { detailed } => {
            let info = service.api_status().await?;
            println!("API connection successful");
            println!("  name:    {}", info.api_name);
            println!("  version: {}", info.version);

            let people = service.get_people(None, None, false).await?;
            println!("  people:  {}", people.len());
            if detailed {
                for person in &people {
                    match person.birthdate {
                        Some(birthdate) => {
                            println!("    - {} (id {}, born {})", person.name, person.id, birthdate)
                        }
                        None => println!("    - {} (id {})", person.name, person.id),
                    }
                }
            }
        }

        Command::Person { id, fresh } => {
            let person = service.get_person(id, fresh).await?;
            println!("{} (id {})", person.name, person.id);
            if let Some(birthdate) = person.birthdate {
                println!("  born {birthdate}");
            }
        }

        Command::Series {
            person_id,
            start,
            end,
            limit,
            fresh,
        } => {
            let end = end.unwrap_or_else(|| Utc::now().date_naive());
            let start = start.unwrap_or(end - chrono::Duration::days(365));

            let series = service
                .get_biorhythm(person_id, start, end, limit, fresh)
                .await?;
            match (series.first_date(), series.last_date()) {
                (Some(first), Some(last)) => {
                    println!("{} points ({first} .. {last})", series.len())
                }
                _ => println!("no data points in {start} .. {end}"),
            }

            // Derived stats come from the same window; a forced refresh
            // of the points must recompute them too, not serve a summary
            // cached before the refresh.
            let summary = service
                .get_statistics(person_id, start, end, limit, fresh)
                .await?;

            if let Some(stats) = summary.stats {
                println!("cycle         mean    std     min     max");
                for cycle in CYCLES {
                    let s = stats.get(cycle);
                    println!(
                        "{:<12} {:>6.3} {:>6.3} {:>7.3} {:>7.3}",
                        cycle.label(),
                        s.mean,
                        s.std_dev,
                        s.min,
                        s.max
                    );
                }
            }

            match summary.correlation {
                Correlation::Matrix(matrix) => {
                    println!("correlation matrix:");
                    for a in CYCLES {
                        print!("  {:<12}", a.label());
                        for b in CYCLES {
                            match matrix.get(a, b) {
                                Some(r) => print!(" {r:>6.3}"),
                                None => print!("    n/a"),
                            }
                        }
                        println!();
                    }
                }
                Correlation::InsufficientData => {
                    println!("correlation: insufficient data (need at least 2 points)");
                }
            }
        }

        Command::Calculate {
            person_id,
            days,
            notes,
        } => {
            let ack = service
                .calculate_and_invalidate(person_id, days, &notes)
                .await?;
            println!(
                "calculation accepted: {} data points created",
                ack.data_points_created
            );
            if let Some(id) = ack.calculation_id {
                println!("  calculation id: {id}");
            }
            println!("cached entries for person {person_id} invalidated");
        }
    }

    Ok(())
}
