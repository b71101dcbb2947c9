use crate::api::{ApiError, Transport, YouTrackClient};
use crate::models::{IssueSummary, ReportEntry};
use crate::votes::{collect_vote_timestamps_recursive, votes_in_year};
use log::{info, warn};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ORDER_BY_VOTES: &str = " order by:votes";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// Entries grouped by subsystem; BTreeMap keeps subsystems in ascending order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub groups: BTreeMap<String, Vec<ReportEntry>>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    // Add an entry; entries with no votes this year are not reported
    pub fn push(&mut self, subsystem: String, entry: ReportEntry) {
        if entry.votes == 0 {
            return;
        }
        self.groups.entry(subsystem).or_default().push(entry);
    }

    // Most votes first; equal counts keep their search order
    pub fn sort(&mut self) {
        for entries in self.groups.values_mut() {
            entries.sort_by(|a, b| b.votes.cmp(&a.votes));
        }
    }
}

// Each whitespace-separated word is encoded on its own, then the ordering clause is appended
pub fn encode_query(query: &str) -> String {
    let words: Vec<String> = query
        .split_whitespace()
        .map(|word| urlencoding::encode(word).into_owned())
        .collect();
    format!("{}{}", words.join("%20"), urlencoding::encode(ORDER_BY_VOTES))
}

pub async fn search<T: Transport>(
    client: &YouTrackClient<T>,
    query: &str,
    subsystem_field: &str,
    max_results: usize,
) -> Result<Vec<IssueSummary>, ApiError> {
    let records = client.search_issues(&encode_query(query), max_results).await?;
    if records.len() >= max_results {
        warn!(
            "Query returned {} issues, the configured maximum; issues beyond it are not reported (raise YOUTRACK_MAX_RESULTS)",
            records.len()
        );
    }
    Ok(records
        .into_iter()
        .map(|record| record.into_summary(subsystem_field))
        .collect())
}

pub async fn build_report<T: Transport>(
    client: &YouTrackClient<T>,
    query: &str,
    subsystem_field: &str,
    max_results: usize,
    this_year: i32,
) -> Result<Report, ApiError> {
    let issues = search(client, query, subsystem_field, max_results).await?;
    info!("Building report for {} issues", issues.len());

    let mut report = Report::default();
    for (i, issue) in issues.into_iter().enumerate() {
        let votes = collect_vote_timestamps_recursive(client, &issue.id).await?;
        let this_year_votes = votes_in_year(&votes, this_year);
        println!(
            "[{}] {} {} ({}): {} votes, {} in {}",
            i + 1,
            issue.id,
            issue.title,
            issue.subsystem,
            issue.votes,
            this_year_votes,
            this_year
        );

        report.push(
            issue.subsystem,
            ReportEntry {
                id: issue.id,
                title: issue.title,
                votes: this_year_votes,
            },
        );
    }
    report.sort();
    Ok(report)
}

// Issue pages live under the server root, not under `/api`
fn web_root(server: &str) -> &str {
    let server = server.trim_end_matches('/');
    server.strip_suffix("/api").unwrap_or(server)
}

pub fn render_markdown(report: &Report, server: &str) -> String {
    let server = web_root(server);
    let mut out = String::new();
    for (subsystem, entries) in &report.groups {
        let _ = writeln!(out, "## {}\n", subsystem);
        let _ = writeln!(out, "| Issue | Votes |");
        let _ = writeln!(out, "|---|---|");
        for entry in entries {
            let _ = writeln!(
                out,
                "| [{}]({}/issue/{}) {} | {} |",
                entry.id,
                server,
                entry.id,
                escape_cell(&entry.title),
                entry.votes
            );
        }
        out.push('\n');
    }
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn write_report(path: &Path, markdown: &str) -> Result<(), ReportError> {
    fs::write(path, markdown).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
