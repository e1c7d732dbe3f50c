use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod chart;
mod commands;
mod config;
mod db;
mod error;
mod models;
mod pipeline;
mod prompt;
mod report;
mod validate;

use aggregate::{ActiveTime, WeekPolicy};
use chart::PngChart;
use commands::RecordPatch;
use config::Config;
use db::{HealthStore, PgHealthStore};
use error::HealthError;
use pipeline::PipelineOptions;
use prompt::Prompter;

#[derive(Parser)]
#[command(name = "health-log")]
#[command(about = "Daily health metrics log with weekly trend charts", long_about = None)]
struct Cli {
    /// Settings file read in addition to the environment (defaults to a `.env` if present)
    #[arg(long, global = true, env = "HEALTH_ENV_FILE")]
    env_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database schema commands
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Daily record commands
    Health {
        #[command(subcommand)]
        command: HealthCommands,
    },
    /// Import daily records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Check stored records for gaps and out-of-range values
    Validate {
        /// Report every problem instead of stopping at the first
        #[arg(long)]
        all: bool,
    },
    /// Print weekly summaries without rendering charts
    Summary {
        #[command(flatten)]
        weekly: WeeklyArgs,
        #[arg(long)]
        json: bool,
    },
    /// Validate, aggregate and render one chart per metric
    Pipeline {
        #[command(flatten)]
        weekly: WeeklyArgs,
        #[arg(long, env = "HEALTH_CHART_DIR", default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Create the schema
    Create,
    /// Drop the schema
    Drop,
}

#[derive(Subcommand)]
enum HealthCommands {
    /// Create a new daily record, prompting for missing values
    Create {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
        #[command(flatten)]
        values: MetricArgs,
    },
    /// Show the record for a date
    Read {
        #[arg(value_parser = date_arg)]
        date: NaiveDate,
    },
    /// Update a record, prompting with current values as defaults
    Update {
        #[arg(value_parser = date_arg)]
        date: NaiveDate,
        #[command(flatten)]
        values: MetricArgs,
    },
    /// Delete the record for a date
    Delete {
        #[arg(value_parser = date_arg)]
        date: NaiveDate,
    },
    /// List all records ordered by date
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct MetricArgs {
    #[arg(long)]
    sleep_score: Option<i32>,
    #[arg(long)]
    body_battery_max: Option<i32>,
    #[arg(long)]
    body_battery_min: Option<i32>,
    #[arg(long)]
    active_time: Option<i32>,
    #[arg(long)]
    defecation: Option<i32>,
}

impl From<&MetricArgs> for RecordPatch {
    fn from(args: &MetricArgs) -> Self {
        RecordPatch {
            sleep_score: args.sleep_score,
            body_battery_max: args.body_battery_max,
            body_battery_min: args.body_battery_min,
            active_time: args.active_time,
            defecation: args.defecation,
        }
    }
}

#[derive(Args)]
struct WeeklyArgs {
    /// How days are grouped into weeks
    #[arg(long, value_enum, env = "HEALTH_WEEK_POLICY", default_value_t = WeekPolicy::WeekStart)]
    policy: WeekPolicy,
    /// Average or total active time per week
    #[arg(long, value_enum, default_value_t = ActiveTime::Mean)]
    active_time: ActiveTime,
}

fn date_arg(value: &str) -> Result<NaiveDate, String> {
    models::parse_date(value).map_err(|err| err.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.env_file.as_deref()).context("failed to load configuration")?;
    let store = PgHealthStore::connect(&config)
        .await
        .context("failed to connect to Postgres")?;

    let result = run(cli.command, &store, &config).await;
    store.close().await;

    if let Err(err) = &result {
        if let Some(health_err) = err.downcast_ref::<HealthError>() {
            if health_err.is_user_facing() {
                println!("{health_err}");
                return Ok(());
            }
        }
    }
    result
}

async fn run(command: Commands, store: &PgHealthStore, config: &Config) -> anyhow::Result<()> {
    match command {
        Commands::Db { command } => match command {
            DbCommands::Create => {
                db::init_db(store).await?;
                println!("Schema ready.");
            }
            DbCommands::Drop => {
                db::drop_db(store).await?;
                println!("Schema dropped.");
            }
        },
        Commands::Health { command } => run_health(command, store).await?,
        Commands::Import { csv } => {
            let summary = db::import_csv(store, &csv).await?;
            println!(
                "Inserted {} records from {} ({} existing dates skipped).",
                summary.inserted,
                csv.display(),
                summary.skipped
            );
        }
        Commands::Validate { all } => {
            let records = store.list_all().await?;
            if all {
                let problems = validate::audit(&records)?;
                if problems.is_empty() {
                    println!("{} records valid.", records.len());
                } else {
                    for problem in &problems {
                        println!("- {problem}");
                    }
                    anyhow::bail!("{} validation problems found", problems.len());
                }
            } else {
                let records = validate::validate(records)?;
                println!("{} records valid.", records.len());
            }
        }
        Commands::Summary { weekly, json } => {
            let (records, weeks) =
                pipeline::weekly_summaries(store, weekly.policy, weekly.active_time).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&weeks)?);
            } else {
                print!(
                    "{}",
                    report::build_report(&records, &weeks, weekly.policy, weekly.active_time)
                );
            }
        }
        Commands::Pipeline { weekly, out } => {
            let options = PipelineOptions {
                policy: weekly.policy,
                active_time: weekly.active_time,
                out_dir: out,
            };
            let mut sink = PngChart::with_font(config.chart_font.clone());
            let run = pipeline::run_pipeline(store, &mut sink, &options)
                .await
                .context("weekly pipeline failed")?;
            print!(
                "{}",
                report::build_report(&run.records, &run.weeks, options.policy, options.active_time)
            );
            println!();
            for chart in &run.charts {
                println!("Chart written to {}.", chart.display());
            }
        }
    }

    Ok(())
}

async fn run_health(command: HealthCommands, store: &PgHealthStore) -> anyhow::Result<()> {
    match command {
        HealthCommands::Create { date, values } => {
            let record = Prompter::stdio().complete_record(date, &RecordPatch::from(&values))?;
            print!("{}", commands::format_record(&record));
            commands::create(store, &record).await?;
        }
        HealthCommands::Read { date } => {
            let record = commands::read(store, date).await?;
            print!("{}", commands::format_record(&record));
        }
        HealthCommands::Update { date, values } => {
            let current = commands::read(store, date).await?;
            print!("{}", commands::format_record(&current));
            let patch = Prompter::stdio().complete_patch(&current, &RecordPatch::from(&values))?;
            let (_, updated) = commands::update(store, date, &patch).await?;
            print!("{}", commands::format_record(&updated));
        }
        HealthCommands::Delete { date } => {
            let removed = commands::delete(store, date).await?;
            print!("{}", commands::format_record(&removed));
        }
        HealthCommands::List { json } => {
            let records = commands::list(store).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in &records {
                    println!("{}", commands::format_row(record));
                }
            }
        }
    }
    Ok(())
}
