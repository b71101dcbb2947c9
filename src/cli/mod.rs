use crate::votes::Granularity;
use clap::{CommandFactory, Parser};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

lazy_static! {
    // Readable ids like KT-1234 or internal ids like 25-4211
    static ref ISSUE_ID: Regex = Regex::new(r"^[A-Za-z0-9_]+-\d+$").unwrap();
}

const REPORT_COMMAND: &str = "report";
const MONTH_MODIFIER: &str = "month";

#[derive(Debug, Parser)]
#[command(
    name = "youtrack-votes",
    version,
    about = "Vote distribution and most-voted reports for YouTrack issues",
    after_help = "Examples:\n  youtrack-votes https://youtrack.jetbrains.com KT-1234\n  youtrack-votes https://youtrack.jetbrains.com KT-1234 month\n  youtrack-votes https://youtrack.jetbrains.com report votes.md project: KT #Unresolved"
)]
pub struct Args {
    /// YouTrack server base URL
    pub server: String,
    /// Issue id, or `report`
    pub target: String,
    /// `month` for an issue; `<output-file> <query...>` for a report
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Distribution {
        issue_id: String,
        granularity: Granularity,
    },
    Report {
        output: PathBuf,
        query: String,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("'{0}' does not look like an issue id (expected e.g. ABC-123)")]
    InvalidIssueId(String),
    #[error("unexpected arguments after issue id: {0} (only 'month' is accepted)")]
    UnexpectedArguments(String),
    #[error("usage: report <output-file> <query...>")]
    MissingReportArguments,
}

// Short usage line, printed alongside argument errors
pub fn usage() -> String {
    Args::command().render_usage().to_string()
}

impl Args {
    pub fn resolve(&self) -> Result<Command, CliError> {
        if self.target == REPORT_COMMAND {
            return match self.rest.split_first() {
                Some((output, query)) if !query.is_empty() => Ok(Command::Report {
                    output: PathBuf::from(output),
                    query: query.join(" "),
                }),
                _ => Err(CliError::MissingReportArguments),
            };
        }

        if !ISSUE_ID.is_match(&self.target) {
            return Err(CliError::InvalidIssueId(self.target.clone()));
        }
        let granularity = match self.rest.as_slice() {
            [] => Granularity::Year,
            [modifier] if modifier == MONTH_MODIFIER => Granularity::Month,
            other => return Err(CliError::UnexpectedArguments(other.join(" "))),
        };
        Ok(Command::Distribution {
            issue_id: self.target.clone(),
            granularity,
        })
    }
}
