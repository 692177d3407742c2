/// External command execution with captured output and a fixed timeout
use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Hard ceiling for a single external command invocation.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure of an external command invocation.
///
/// Timeouts and non-zero exits share the same handling paths; the exit code
/// is preserved so call sites can distinguish well-known statuses.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} timed out after {} seconds", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with code {}: {}", fmt_code(.code), .stderr.trim())]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    /// Exit code of a command that ran and failed, if the process exited.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "unknown".to_string(),
    }
}

/// Result from command execution with captured output
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Create from tokio Command output
    fn from_output(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Builder for executing external commands with common patterns
pub struct CommandBuilder {
    program: String,
    command: Command,
    timeout: Duration,
}

impl CommandBuilder {
    /// Create a new command builder
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        let mut command = Command::new(&program);
        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        Self {
            program: program.as_ref().to_string_lossy().into_owned(),
            command,
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Add a single argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.command.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command.args(args);
        self
    }

    /// Override the default timeout
    #[allow(dead_code)]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute and return raw output
    pub async fn output(mut self) -> Result<CommandOutput, CommandError> {
        let output = match tokio::time::timeout(self.timeout, self.command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CommandError::Spawn {
                    program: self.program,
                    source,
                })
            }
            Err(_) => {
                return Err(CommandError::Timeout {
                    program: self.program,
                    timeout: self.timeout,
                })
            }
        };
        Ok(CommandOutput::from_output(output))
    }

    /// Execute and return stdout on success, error on failure
    pub async fn run(self) -> Result<String, CommandError> {
        let program = self.program.clone();
        let output = self.output().await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(CommandError::Failed {
                program,
                code: output.code,
                stderr: output.stderr,
            })
        }
    }

    /// Execute and ignore output (just check success)
    pub async fn run_silent(self) -> Result<(), CommandError> {
        self.run().await.map(|_| ())
    }
}

/// Check if a command-line tool is installed
pub async fn check_tool_installed(
    tool_name: &str,
    version_args: &[&str],
    install_url: &str,
) -> anyhow::Result<()> {
    let output = CommandBuilder::new(tool_name)
        .args(version_args)
        .output()
        .await;

    match output {
        Ok(out) if out.success => Ok(()),
        _ => anyhow::bail!(
            "{} is not installed or not in PATH. Please install from {}",
            tool_name,
            install_url
        ),
    }
}
