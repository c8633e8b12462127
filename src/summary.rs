use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info};

use crate::opinion::{truncate_chars, Opinion};

/// Longest text excerpt handed to a summarizer, in characters.
pub const EXCERPT_CAP: usize = 12_000;
const TRUNCATION_MARKER: &str = "\n\n[... remainder truncated for summarization ...]";

/// Everything a summarizer is given about one opinion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRequest {
    pub unique_id: String,
    pub court_name: String,
    pub case_number: String,
    pub case_name: String,
    /// "January 15, 2024"
    pub date: String,
    pub text: String,
}

impl SummaryRequest {
    /// `None` when the opinion has no text to summarize.
    pub fn from_opinion(opinion: &Opinion) -> Option<Self> {
        let text = opinion.text_content.trim();
        if text.is_empty() {
            return None;
        }
        let mut excerpt = truncate_chars(text, EXCERPT_CAP);
        if excerpt.len() < text.len() {
            excerpt.push_str(TRUNCATION_MARKER);
        }
        Some(Self {
            unique_id: opinion.unique_id(),
            court_name: opinion.court_name.clone(),
            case_number: opinion.display_number().to_string(),
            case_name: opinion.case_name.clone(),
            date: opinion.date.format("%B %d, %Y").to_string(),
            text: excerpt,
        })
    }
}

/// Turns opinion text plus metadata into a short summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummaryRequest) -> anyhow::Result<String>;
}

/// Runs an external program once per opinion: the request as JSON on stdin,
/// the summary on stdout. A run longer than `timeout` is killed.
pub struct CommandSummarizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSummarizer {
    /// Split a shell-style command line on whitespace. No quoting.
    pub fn from_command_line(line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }

    async fn run(&self, payload: &[u8]) -> anyhow::Result<std::process::Output> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start {}", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(payload).await?;
        }
        Ok(child.wait_with_output().await?)
    }
}

#[async_trait]
impl Summarizer for CommandSummarizer {
    async fn summarize(&self, request: &SummaryRequest) -> anyhow::Result<String> {
        let payload = serde_json::to_vec(request)?;
        let output = tokio::time::timeout(self.timeout, self.run(&payload))
            .await
            .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", self.program, self.timeout))??;
        if !output.status.success() {
            anyhow::bail!("{} exited with {}", self.program, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Fill every empty `summary`, one opinion at a time with `delay` between calls.
///
/// Opinions without text get a placeholder; summarizer errors get an
/// "unavailable" note rather than failing the batch.
pub async fn summarize_all(summarizer: &dyn Summarizer, opinions: &mut [Opinion], delay: Duration) -> usize {
    let total = opinions.len();
    let mut written = 0usize;
    for (i, opinion) in opinions.iter_mut().enumerate() {
        if !opinion.summary.is_empty() {
            continue;
        }
        info!(
            "Summarizing [{}/{}]: {} - {}",
            i + 1,
            total,
            opinion.court_name,
            opinion.display_number()
        );
        opinion.summary = match SummaryRequest::from_opinion(opinion) {
            None => format!(
                "[{}] {}: no opinion text available for summarization.",
                opinion.court_name,
                opinion.display_number()
            ),
            Some(request) => {
                let result = summarizer.summarize(&request).await;
                tokio::time::sleep(delay).await;
                match result {
                    Ok(summary) => summary.trim().to_string(),
                    Err(e) => {
                        error!("Error summarizing {}: {}", opinion.display_number(), e);
                        format!("Summary unavailable for {}.", opinion.display_number())
                    }
                }
            }
        };
        written += 1;
    }
    written
}

/// Apply externally produced summaries keyed by unique id. Returns how many matched.
pub fn apply_summaries(opinions: &mut [Opinion], summaries: &HashMap<String, String>) -> usize {
    let mut applied = 0usize;
    for opinion in opinions.iter_mut() {
        if let Some(summary) = summaries.get(&opinion.unique_id()) {
            opinion.summary = summary.trim().to_string();
            applied += 1;
        }
    }
    applied
}
