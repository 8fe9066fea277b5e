use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use zhihu_harvester::config::{AppConfig, Credentials, credentials};
use zhihu_harvester::pipeline::{self, Harvester, RunOutcome};
use zhihu_harvester::scraper::session::LoginOutcome;

#[derive(Parser)]
#[command(name = "zhihu-harvester", about = "Harvest zhihu topic follower profiles", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and crawl the follower listing into the output log
    Harvest {
        /// Stop requesting pages once the listing offset reaches this value
        #[arg(long, env = "HARVEST_CEILING")]
        ceiling: Option<u64>,

        /// Output log (JSON lines), appended to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Only check that the configured account can log in
    Login,

    /// Write an empty credentials file if none exists
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "zhihu_harvester=info,warn",
        1 => "zhihu_harvester=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;
    let credentials_path = config.storage.credentials_path.clone();

    match cli.command {
        Command::Harvest { ceiling, output } => {
            if let Some(ceiling) = ceiling {
                config.crawl.offset_ceiling = ceiling;
            }
            if let Some(output) = output {
                config.storage.output_path = output;
            }

            let credentials = Credentials::load_or_template(&credentials_path);
            match pipeline::run(config, credentials).await? {
                RunOutcome::LoginFailed(outcome) => {
                    report_login_failure(&outcome, &credentials_path);
                }
                RunOutcome::Completed(stats) => {
                    println!(
                        "ok: {} records written from {} pages ({} invalid profiles)",
                        stats.records_written, stats.pages, stats.invalid
                    );
                }
            }
        }

        Command::Login => {
            let credentials = Credentials::load_or_template(&credentials_path);
            let mut harvester = Harvester::new(config, credentials)?;
            let outcome = harvester.authenticate().await?;
            if outcome.is_success() {
                println!("Login ok.");
            } else {
                report_login_failure(&outcome, &credentials_path);
            }
        }

        Command::InitConfig => {
            if credentials_path.exists() {
                println!("{} already exists, leaving it alone.", credentials_path.display());
            } else {
                credentials::write_template(&credentials_path)?;
                println!("Wrote {}; fill in account and password.", credentials_path.display());
            }
        }
    }

    Ok(())
}

fn report_login_failure(outcome: &LoginOutcome, credentials_path: &Path) {
    info!("Login failed: {:?}", outcome);
    match outcome {
        LoginOutcome::MissingCredentials => {
            println!("Please fill {} with your account.", credentials_path.display());
        }
        _ => println!("fail to login."),
    }
}
