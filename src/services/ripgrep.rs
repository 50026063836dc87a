//! Search provider backed by ripgrep.
//!
//! Runs `rg --json` and turns its `match` events into [`NewMatch`] candidates.
//! Each candidate keeps the event's whole `data` object as opaque metadata.

use std::io::ErrorKind;

use anyhow::Context;
use serde_json::Value;
use tokio::process::Command;

use crate::error::{AppError, Result};
use crate::models::NewMatch;

pub struct Searcher {
    globs: Vec<String>,
}

impl Searcher {
    pub fn new(globs: Vec<String>) -> Self {
        Self { globs }
    }

    pub fn args(&self, pattern: &str, paths: &[String]) -> Vec<String> {
        let mut args = vec!["--color=never".to_string(), "--json".to_string()];
        for glob in &self.globs {
            args.push("--glob".to_string());
            args.push(glob.clone());
        }
        args.push(pattern.to_string());
        if paths.is_empty() {
            args.push(".".to_string());
        } else {
            args.extend(paths.iter().cloned());
        }
        args
    }

    /// Runs the search to completion. No hits is an empty list, not an error.
    pub async fn search(&self, pattern: &str, paths: &[String]) -> Result<Vec<NewMatch>> {
        let output = match Command::new("rg").args(self.args(pattern, paths)).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::Search(
                    "ripgrep (rg) is not installed".to_string(),
                ))
            }
            Err(e) => return Err(anyhow::Error::new(e).context("failed to run rg").into()),
        };

        // rg exits 1 when nothing matched and 2 on errors, which can still
        // come with partial results.
        let stdout = String::from_utf8(output.stdout).context("rg produced non-UTF-8 output")?;
        let hits = parse_output(&stdout);
        if output.status.code() == Some(2) && hits.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Search(stderr.trim().to_string()));
        }

        tracing::debug!(pattern, hits = hits.len(), "search finished");
        Ok(hits)
    }
}

/// Parses rg's JSON-lines stream. Non-match events and unreadable lines are skipped.
pub fn parse_output(stdout: &str) -> Vec<NewMatch> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(event) => parse_event(event),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparsable rg line");
                None
            }
        })
        .collect()
}

fn parse_event(mut event: Value) -> Option<NewMatch> {
    if event.get("type").and_then(Value::as_str) != Some("match") {
        return None;
    }
    let data = event.get_mut("data")?.take();

    // Paths or lines that are not valid UTF-8 arrive as base64 `bytes`
    let file_path = data.get("path")?.get("text")?.as_str()?.to_string();
    let line = data
        .get("lines")?
        .get("text")?
        .as_str()?
        .trim_end_matches(['\n', '\r'])
        .to_string();
    let line_no = data.get("line_number").and_then(Value::as_i64);

    Some(NewMatch::new(line, file_path, line_no).with_meta(data))
}
