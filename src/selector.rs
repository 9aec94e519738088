use std::io::ErrorKind;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// fzf exits with 130 when the user hits Esc or Ctrl-C
const EXIT_CANCELLED: i32 = 130;

/// Outcome of one prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// An entry was picked; `index` is its position in the offered list.
    Chosen { index: usize, label: String },
    /// Nothing was picked; holds whatever the user typed, possibly empty.
    NewQuery(String),
    /// The user backed out.
    Cancelled,
}

/// An external picker speaking the index-prefixed line protocol
pub struct Selector {
    program: String,
    args: Vec<String>,
}

impl Selector {
    /// fzf with literal matching, the given order kept, and the typed query
    /// always printed. The index prefix is hidden from the user, and Tab
    /// accepts the query on its own.
    pub fn fzf() -> Self {
        Self::new(
            "fzf",
            &[
                "--exact",
                "--print-query",
                "--no-sort",
                "--tac",
                "--cycle",
                "--with-nth",
                "2..",
                "--bind",
                "tab:print-query",
            ],
        )
    }

    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Offer `labels` and wait for the user to finish.
    pub async fn prompt(&self, labels: &[String]) -> Result<Selection> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Protocol(format!("failed to start {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Protocol("failed to open selector stdin".to_string()))?;

        // The selector may start printing before it has read everything,
        // so feed it from a separate task while we wait on its output.
        let input = index_labels(labels);
        let writer = tokio::spawn(async move { stdin.write_all(input.as_bytes()).await });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Error::Protocol(format!("failed to read selector output: {e}")))?;

        match writer.await {
            Ok(Ok(())) => {}
            // Exited before reading all entries, e.g. an early Esc
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("selector closed its input early");
            }
            Ok(Err(e)) => {
                return Err(Error::Protocol(format!("failed to write selector input: {e}")))
            }
            Err(e) => return Err(Error::Protocol(format!("selector input task failed: {e}"))),
        }

        classify(output.status.code(), &String::from_utf8_lossy(&output.stdout))
    }
}

/// Prefix every label with its position: `"0 ~/code/api\n1 ..."`.
fn index_labels(labels: &[String]) -> String {
    labels
        .iter()
        .enumerate()
        .map(|(index, label)| format!("{index} {label}\n"))
        .collect()
}

/// Interpret the selector's exit code and output.
///
/// Exit 0 (picked) and 1 (nothing matched) are both answers. Output is the
/// query line, then the picked line if any, each newline-terminated.
fn classify(code: Option<i32>, stdout: &str) -> Result<Selection> {
    match code {
        Some(EXIT_CANCELLED) => return Ok(Selection::Cancelled),
        Some(0) | Some(1) => {}
        Some(code) => {
            return Err(Error::Protocol(format!("selector exited with status {code}")))
        }
        None => return Err(Error::Protocol("selector was killed by a signal".to_string())),
    }

    let lines: Vec<&str> = stdout.split('\n').collect();
    match lines.as_slice() {
        [query, _] => Ok(Selection::NewQuery(query.to_string())),
        [_query, picked, _] => {
            let (index, label) = strip_index(picked)?;
            Ok(Selection::Chosen { index, label })
        }
        _ => Err(Error::Protocol("invalid result from selector".to_string())),
    }
}

fn strip_index(line: &str) -> Result<(usize, String)> {
    let (index, label) = line
        .split_once(' ')
        .ok_or_else(|| Error::Protocol(format!("unable to parse index from {line:?}")))?;
    let index = index
        .parse::<usize>()
        .map_err(|e| Error::Protocol(format!("unable to parse index from {line:?}: {e}")))?;
    Ok((index, label.to_string()))
}
