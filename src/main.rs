mod api;
mod cli;
mod config;
mod models;
mod report;
mod votes;

use api::{HttpTransport, YouTrackClient};
use chrono::{Datelike, Utc};
use clap::Parser;
use cli::{Args, Command};
use config::Config;
use log::{error, info};
use std::process;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Argument and setup problems are reported before any request goes out
    let command = match args.resolve() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, cli::usage());
            process::exit(2);
        }
    };
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };
    let token = match config::load_token(&config.token_file) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run(&args.server, command, &config, &token).await {
        error!("{}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

async fn run(server: &str, command: Command, config: &Config, token: &str) -> Result<(), BoxError> {
    let transport = HttpTransport::new(server, token)?;
    let client = YouTrackClient::new(transport, config.retry.clone(), config.activity_limit);

    match command {
        Command::Distribution { issue_id, granularity } => {
            let votes = votes::collect_vote_timestamps_recursive(&client, &issue_id).await?;
            info!("{}: {} voters including duplicates", issue_id, votes.len());
            let pairs = votes::distribution(&votes, granularity);
            println!("{}", votes::format_distribution(&pairs));
        }
        Command::Report { output, query } => {
            let this_year = Utc::now().year();
            let report = report::build_report(
                &client,
                &query,
                &config.subsystem_field,
                config.max_results,
                this_year,
            )
            .await?;
            if report.is_empty() {
                info!("No issues received votes in {}", this_year);
            }
            let markdown = report::render_markdown(&report, server);
            report::write_report(&output, &markdown)?;
            println!("Report written to {}", output.display());
        }
    }

    Ok(())
}
