use anyhow::Result;
use clap::{Parser, Subcommand};
use drip_core::compute_unlock_from_raw;
use std::path::PathBuf;

mod calendar_cmd;
mod config;
mod inputs;
mod nudges;
mod reminders_cmd;
mod state;

#[derive(Parser, Debug)]
#[command(
    name = "drip",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("DRIP_BUILD_SHA"), ")"),
    about = "Drip-content unlock scheduling and reminder planning"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Session and content-unlock reminders
    Reminders {
        #[command(subcommand)]
        command: reminders_cmd::RemindersCommand,
    },

    /// Calendar marks and day listings
    Calendar {
        #[command(subcommand)]
        command: calendar_cmd::CalendarCommand,
    },

    /// Compute a single unlock date
    Unlock {
        /// Item drip delay in days (0 = available immediately)
        #[arg(long)]
        delay: u32,

        /// Round first-session date (date or timestamp)
        #[arg(long)]
        first_session: Option<String>,

        /// Round drip offset in days
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Inactivity nudges
    Nudges {
        #[command(subcommand)]
        command: NudgeCommand,
    },

    /// Config file management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum NudgeCommand {
    /// Run one pass of the nudge loop
    Plan {
        /// Profiles export (defaults to config [snapshots].profiles)
        #[arg(long)]
        profiles: Option<PathBuf>,

        #[arg(long)]
        now: Option<String>,

        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default ~/.drip/config.toml
    Init,
    /// Print the effective config
    Show,
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Reminders { command } => reminders_cmd::run(command)?,

        Command::Calendar { command } => calendar_cmd::run(command)?,

        Command::Unlock {
            delay,
            first_session,
            offset,
        } => {
            let tz = config::load_config()?.timezone()?;
            let unlock = compute_unlock_from_raw(delay, first_session.as_deref(), offset, tz);
            match (unlock.unlock_date, unlock.unlock_time_label) {
                (Some(at), Some(label)) => {
                    println!("Unlocks {} at {}", at.format("%Y-%m-%d"), label)
                }
                _ if delay == 0 => println!("Available immediately"),
                _ => println!("Unlock date unknown (no usable first-session date)"),
            }
        }

        Command::Nudges { command } => match command {
            NudgeCommand::Plan {
                profiles,
                now,
                dry_run,
            } => nudges::plan(profiles, now, dry_run)?,
        },

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                println!("# {}", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg)?);
            }
        },
    }

    Ok(())
}
