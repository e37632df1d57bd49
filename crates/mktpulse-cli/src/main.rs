use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use mktpulse_core::{Cadence, PeriodWindows};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mktpulse")]
#[command(about = "Marketing pulse reports and metric recording")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch metrics, draft the pulse narrative, and post it to the team chat
    Report {
        /// Reporting period: weekly or monthly
        #[arg(long, default_value = "weekly")]
        cadence: Cadence,
        /// Run as if today were this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Print the message instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Append this run's raw metrics as a row in the tracking spreadsheet
    Record {
        /// Anchor date for the row key (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Print the row instead of appending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the report and comparison windows for a cadence
    Windows {
        #[arg(long, default_value = "weekly")]
        cadence: Cadence,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn resolve_date(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

fn describe_windows(windows: &PeriodWindows) -> String {
    format!(
        "cadence:    {}\nreport:     {}\ncomparison: {}",
        windows.cadence, windows.report, windows.comparison
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Commands::Windows { cadence, date } = cli.command {
        let windows = PeriodWindows::for_cadence(cadence, resolve_date(date));
        println!("{}", describe_windows(&windows));
        return Ok(());
    }

    let config = mktpulse_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pipeline = mktpulse_core::load_pipeline_config(&config.pipeline_path)?;

    match cli.command {
        Commands::Report {
            cadence,
            date,
            dry_run,
        } => {
            let today = resolve_date(date);
            let outcome =
                mktpulse_report::run_report(&config, &pipeline, cadence, today, dry_run).await?;
            if dry_run {
                println!("{}", outcome.message);
            }
            tracing::info!(
                run_id = %outcome.run_id,
                placeholders = outcome.placeholders,
                delivered = outcome.delivered,
                "report run finished"
            );
        }
        Commands::Record { date, dry_run } => {
            let outcome =
                mktpulse_report::run_record(&config, &pipeline, resolve_date(date), dry_run).await?;
            if dry_run {
                println!("dry-run: would append row: [{}]", outcome.row.join(", "));
            }
            tracing::info!(
                run_id = %outcome.run_id,
                anchor = %outcome.anchor,
                appended = outcome.appended,
                "record run finished"
            );
        }
        Commands::Windows { .. } => {}
    }

    Ok(())
}
