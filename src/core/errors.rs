use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An external tool could not be run to completion.
///
/// A non-zero exit status is not an `ExecError`: the tool ran and its
/// output is still evidence.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("{tool} {}: {reason} (after {duration_ms}ms)", args.join(" "))]
pub struct ExecError {
    pub tool: String,
    pub args: Vec<String>,
    pub reason: String,
    pub timed_out: bool,
    pub duration_ms: u128,
}

impl ExecError {
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.tool.clone()
        } else {
            format!("{} {}", self.tool, self.args.join(" "))
        }
    }
}

/// Failures that end the whole run.
#[derive(Error, Debug)]
pub enum HostenumError {
    #[error("no valid targets could be parsed from the specification")]
    NoTargets,

    #[error("all {0} target(s) were excluded")]
    AllExcluded(usize),

    #[error("report failure: {0}")]
    Report(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
