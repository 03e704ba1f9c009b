use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use workstart::executor::Executor;
use workstart::scheduler::{self, Scheduler, SCHEDULER_CHANNEL_SIZE};
use workstart::starter::InstanceStarter;
use workstart::state::{self, AppState};
use workstart::types::{Config, ExecutionTrigger};
use workstart::{HolidayCalendar, InstanceApiClient};

#[derive(Parser)]
#[command(
    name = "workstart",
    version,
    about = "Starts a managed cloud instance on workdays"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single start pass and print the outcome as JSON
    Run {
        /// Override the reference date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Run the cron scheduler and execute start passes as they come due
    Daemon,
    /// Print the next scheduled run time
    NextRun,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = state::load_config().context("Failed to load config")?;

    match cli.command {
        Command::Run { date } => {
            let mut config = config;
            if date.is_some() {
                config.fixed_date = date;
            }

            let executor = build_executor(config)?;
            let outcome = executor.execute(ExecutionTrigger::Manual).await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::Daemon => {
            if !config.schedule.enabled {
                log::warn!("Schedule is disabled in config; daemon will idle");
            }
            log::info!(
                "Scheduler starting: cron '{}' ({})",
                config.schedule.cron,
                config.schedule.timezone
            );

            let executor = build_executor(config)?;
            let (sender, receiver) = mpsc::channel(SCHEDULER_CHANNEL_SIZE);
            let scheduler = Scheduler::new(executor.state(), sender);

            tokio::select! {
                _ = scheduler.run() => {}
                _ = executor.run(receiver) => {}
            }
        }
        Command::NextRun => {
            let next = scheduler::next_run_time(&config.schedule)?;
            println!("{}", next.to_rfc3339());
        }
    }

    Ok(())
}

fn build_executor(config: Config) -> anyhow::Result<Executor> {
    let calendar = match &config.calendar_path {
        Some(path) => {
            let path = state::expand_home(path);
            HolidayCalendar::load(&path).context("Failed to load workday calendar")?
        }
        None => HolidayCalendar::new(),
    };

    let api = InstanceApiClient::new(&config.api).context("Failed to build API client")?;
    let starter = InstanceStarter::new(Arc::new(calendar), Arc::new(api), &config);
    let state = Arc::new(AppState::with_config(config));

    Ok(Executor::new(state, starter))
}
