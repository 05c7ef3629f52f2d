//! Bounded-time subprocess execution.
//!
//! Both speech adapters and the Ollama CLI adapter shell out to external
//! programs. [`CommandSpec`] describes one invocation and [`CommandSpec::run`]
//! executes it with piped I/O and a hard timeout.
//!
//! Children are spawned with `kill_on_drop`, so a caller that abandons the
//! returned future (timeout or a disconnected HTTP client) also stops the
//! process.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use quest_gateway::CommandSpec;
//!
//! # async fn example() -> Result<(), quest_gateway::GatewayError> {
//! let output = CommandSpec::new("ollama")
//!     .with_arg("run")
//!     .with_arg("llama3.2")
//!     .with_stdin("Generate a question about travel.")
//!     .with_timeout(Duration::from_secs(40))
//!     .run()
//!     .await?;
//! println!("{}", output.stdout);
//! # Ok(())
//! # }
//! ```

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::{debug, instrument, warn};

use crate::GatewayError;

/// Default time budget for a subprocess.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Describes a single external program invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Program to execute (resolved via `PATH`).
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Text written to the child's standard input, if any.
    pub stdin: Option<String>,
    /// Hard limit on the wall-clock duration of the call.
    pub timeout: Duration,
}

/// Captured result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output decoded as UTF-8 (lossy).
    pub stdout: String,
    /// Standard error decoded as UTF-8 (lossy).
    pub stderr: String,
}

impl CommandSpec {
    /// Creates a spec for `program` with no arguments and the default timeout.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the text piped to standard input.
    #[must_use]
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Sets the time budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the program and waits for it to exit.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::CommandNotFound`] if the program cannot be spawned
    ///   because it does not exist.
    /// - [`GatewayError::Timeout`] if it does not exit within the budget; the
    ///   child is killed.
    /// - [`GatewayError::CommandFailed`] on a non-zero exit status.
    /// - [`GatewayError::Io`] for any other spawn or pipe failure.
    #[instrument(skip(self), fields(program = %self.program, timeout_secs = self.timeout.as_secs()))]
    pub async fn run(&self) -> Result<CommandOutput, GatewayError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GatewayError::CommandNotFound {
                    program: self.program.clone(),
                }
            } else {
                GatewayError::Io(e)
            }
        })?;

        let stdin_pipe = child.stdin.take();
        let input = self.stdin.clone();

        let exchange = async move {
            let (write_result, output) =
                tokio::join!(feed_stdin(stdin_pipe, input), child.wait_with_output());
            if let Err(e) = write_result {
                // A child that exits without draining stdin is reported by its status.
                warn!(error = %e, "Failed to write subprocess stdin");
            }
            output
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| GatewayError::timeout(self.program.clone(), self.timeout.as_secs()))??;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if !output.status.success() {
            return Err(GatewayError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }

        debug!(stdout_len = stdout.len(), "Subprocess finished");
        Ok(CommandOutput { stdout, stderr })
    }
}

async fn feed_stdin(pipe: Option<ChildStdin>, input: Option<String>) -> std::io::Result<()> {
    if let (Some(mut pipe), Some(input)) = (pipe, input) {
        pipe.write_all(input.as_bytes()).await?;
        pipe.shutdown().await?;
    }
    Ok(())
}
