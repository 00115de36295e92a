//! Async spawning of external tools with line-by-line output.
//!
//! Both stdout and stderr are read on their own tasks and funneled through
//! one channel, so callers see lines in roughly the order the tool printed
//! them and can forward them to the log while the tool runs.

use std::ffi::{OsStr, OsString};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;

const CHANNEL_SIZE: usize = 1000;
const STDERR_TAIL_LINES: usize = 20;

/// One line of tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0} is not installed or not on PATH")]
    NotInstalled(String),

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("{program} exited with {}: {stderr}", code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// An external command to run.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Shell-like rendering for log records.
    pub fn display(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Collected output of a finished tool.
#[derive(Debug)]
pub struct ToolOutput {
    pub program: String,
    pub status: ExitStatus,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stdout_string(&self) -> String {
        self.stdout.join("\n")
    }

    /// Turn a non-zero exit into [`ToolError::Failed`] carrying the end of
    /// stderr.
    pub fn ensure_success(self) -> Result<Self, ToolError> {
        if self.success() {
            return Ok(self);
        }
        let skip = self.stderr.len().saturating_sub(STDERR_TAIL_LINES);
        Err(ToolError::Failed {
            stderr: self.stderr[skip..].join("\n"),
            code: self.status.code(),
            program: self.program,
        })
    }
}

/// Run a tool to completion and collect its output.
pub async fn run_tool(command: &ToolCommand) -> Result<ToolOutput, ToolError> {
    run_tool_streaming(command, |_| {}).await
}

/// Run a tool, handing every output line to `on_line` as it arrives.
pub async fn run_tool_streaming(
    command: &ToolCommand,
    mut on_line: impl FnMut(&OutputLine) + Send,
) -> Result<ToolOutput, ToolError> {
    let program = command.program.clone();
    tracing::debug!(command = %command.display(), "Running tool");

    let mut child = command.build().spawn().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ToolError::NotInstalled(program.clone())
        } else {
            ToolError::Io {
                program: program.clone(),
                source,
            }
        }
    })?;

    let (tx, mut rx) = mpsc::channel::<OutputLine>(CHANNEL_SIZE);
    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, tx.clone(), OutputLine::Stdout);
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, tx.clone(), OutputLine::Stderr);
    }
    // The channel closes once both readers finish.
    drop(tx);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let collect = async {
        while let Some(line) = rx.recv().await {
            on_line(&line);
            match line {
                OutputLine::Stdout(l) => stdout.push(l),
                OutputLine::Stderr(l) => stderr.push(l),
            }
        }
    };

    if let Some(limit) = command.timeout {
        if timeout(limit, collect).await.is_err() {
            let _ = child.kill().await;
            return Err(ToolError::TimedOut {
                program,
                after: limit,
            });
        }
    } else {
        collect.await;
    }

    let status = child.wait().await.map_err(|source| ToolError::Io {
        program: program.clone(),
        source,
    })?;
    tracing::debug!(program = %program, code = ?status.code(), "Tool finished");

    Ok(ToolOutput {
        program,
        status,
        stdout,
        stderr,
    })
}

fn forward_lines<R>(reader: R, tx: mpsc::Sender<OutputLine>, wrap: fn(String) -> OutputLine)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(wrap(line)).await.is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_echo() {
        let output = run_tool(&ToolCommand::new("echo").arg("hello world"))
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout, vec!["hello world"]);
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_missing_program() {
        let result = run_tool(&ToolCommand::new("nonexistent_command_12345")).await;
        assert!(matches!(result, Err(ToolError::NotInstalled(p)) if p == "nonexistent_command_12345"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let result = run_tool(
            &ToolCommand::new("sleep")
                .arg("10")
                .timeout(Duration::from_millis(100)),
        )
        .await;

        assert!(matches!(result, Err(ToolError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn test_streaming_sees_both_streams() {
        let mut seen = Vec::new();
        let output = run_tool_streaming(
            &ToolCommand::new("sh").args(["-c", "echo out; echo err >&2"]),
            |line| seen.push(line.clone()),
        )
        .await
        .unwrap();

        assert_eq!(seen.len(), 2);
        assert!(seen.contains(&OutputLine::Stdout("out".to_string())));
        assert!(seen.contains(&OutputLine::Stderr("err".to_string())));
        assert_eq!(output.stderr, vec!["err"]);
    }

    #[tokio::test]
    async fn test_ensure_success_reports_stderr() {
        let output = run_tool(&ToolCommand::new("sh").args(["-c", "echo broken >&2; exit 42"]))
            .await
            .unwrap();

        match output.ensure_success() {
            Err(ToolError::Failed { code, stderr, .. }) => {
                assert_eq!(code, Some(42));
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_display() {
        let cmd = ToolCommand::new("yt-dlp").args(["-f", "bestaudio"]);
        assert_eq!(cmd.display(), "yt-dlp -f bestaudio");
        assert_eq!(cmd.program(), "yt-dlp");
    }
}
