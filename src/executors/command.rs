use crate::core::errors::ExecError;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u128,
}

impl CommandResult {
    /// stdout followed by stderr, the way the tools print to a terminal.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs `tool` with `args` and waits at most `limit`.
///
/// A non-zero exit still returns `Ok`; only spawn failures, wait failures
/// and timeouts are errors. On timeout the child is killed.
pub async fn execute(tool: &str, args: &[String], limit: Duration) -> Result<CommandResult, ExecError> {
    let start = Instant::now();
    let fail = |reason: String, timed_out: bool| ExecError {
        tool: tool.to_string(),
        args: args.to_vec(),
        reason,
        timed_out,
        duration_ms: start.elapsed().as_millis(),
    };

    tracing::debug!("Executing: {} {:?} (limit {:?})", tool, args, limit);

    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| fail(format!("failed to spawn: {}", e), false))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        tokio::join!(read_all(stdout), read_all(stderr), child.wait())
    };

    let outcome = timeout(limit, run).await;
    let (stdout, stderr, status) = match outcome {
        Ok(done) => done,
        Err(_) => {
            let _ = child.kill().await;
            tracing::warn!("{} timed out after {:?}", tool, limit);
            return Err(fail(format!("timed out after {}s", limit.as_secs_f32()), true));
        }
    };

    let status = status.map_err(|e| fail(format!("process error: {}", e), false))?;
    let exit_code = status.code().unwrap_or(-1);
    let duration_ms = start.elapsed().as_millis();

    if !status.success() {
        tracing::debug!("{} exited with status {} after {}ms", tool, exit_code, duration_ms);
    }

    Ok(CommandResult {
        stdout,
        stderr,
        exit_code,
        duration_ms,
    })
}

/// Reads a pipe to the end, replacing invalid UTF-8.
async fn read_all<R>(pipe: Option<R>) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        tracing::debug!("Pipe read ended early: {}", e);
    }
    String::from_utf8_lossy(&buf).trim_end().to_string()
}
