//! Child process execution
//!
//! Every external tool (adb, sdkmanager, gradle, cmake, ...) is launched through a
//! [`CommandRunner`], so callers can be driven by a scripted runner in tests.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

/// Description of a process to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, OsString)>,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            stdin: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Program file name followed by the arguments, for logs and messages
    pub fn display_line(&self) -> String {
        let program = self
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned());
        std::iter::once(program)
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code, `None` when killed by a signal or timeout
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&self.stderr);
        }
        text
    }
}

/// A running process whose stdout is consumed line by line
#[allow(async_fn_in_trait)]
pub trait LineStream {
    /// Next line of output, `None` once the stream is closed
    async fn next_line(&mut self) -> std::io::Result<Option<String>>;

    /// Stop the process
    async fn terminate(&mut self) -> std::io::Result<()>;
}

/// Launches processes
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    type Lines: LineStream;

    /// Run to completion and capture stdout and stderr
    async fn output(&self, spec: &CommandSpec) -> std::io::Result<ExecOutput>;

    /// Start the process and stream its stdout
    async fn spawn_lines(&self, spec: &CommandSpec) -> std::io::Result<Self::Lines>;
}

impl<R: CommandRunner> CommandRunner for &R {
    type Lines = R::Lines;

    async fn output(&self, spec: &CommandSpec) -> std::io::Result<ExecOutput> {
        (**self).output(spec).await
    }

    async fn spawn_lines(&self, spec: &CommandSpec) -> std::io::Result<Self::Lines> {
        (**self).spawn_lines(spec).await
    }
}

/// Runs real processes with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.kill_on_drop(true);
        cmd
    }
}

impl CommandRunner for SystemRunner {
    type Lines = ChildLines;

    async fn output(&self, spec: &CommandSpec) -> std::io::Result<ExecOutput> {
        debug!("exec: {}", spec.display_line());

        let mut cmd = Self::command(spec);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if spec.stdin.is_some() { Stdio::piped() } else { Stdio::null() });

        let mut child = cmd.spawn()?;
        if let (Some(input), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
            // A tool may exit without reading everything
            let _ = stdin.write_all(input.as_bytes()).await;
        }

        let output = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    debug!("{} timed out after {:?}", spec.display_line(), limit);
                    return Ok(ExecOutput { code: None, ..Default::default() });
                }
            },
            None => child.wait_with_output().await?,
        };

        Ok(ExecOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn spawn_lines(&self, spec: &CommandSpec) -> std::io::Result<ChildLines> {
        debug!("spawn: {}", spec.display_line());

        let mut cmd = Self::command(spec);
        cmd.stdout(Stdio::piped()).stderr(Stdio::null()).stdin(Stdio::null());
        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "stdout not captured"))?;

        Ok(ChildLines { child, lines: BufReader::new(stdout).lines() })
    }
}

/// Line stream over a real child's stdout; the child is killed on drop
pub struct ChildLines {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl LineStream for ChildLines {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.lines.next_line().await
    }

    async fn terminate(&mut self) -> std::io::Result<()> {
        match self.child.kill().await {
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}

/// Extensions probed when resolving an executable name on this host
pub fn executable_extensions() -> Vec<String> {
    if cfg!(windows) {
        match std::env::var("PATHEXT") {
            Ok(value) if !value.is_empty() => value
                .split(';')
                .filter(|ext| !ext.is_empty())
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            _ => vec![".exe".into(), ".bat".into(), ".cmd".into()],
        }
    } else {
        vec![String::new()]
    }
}

/// First existing `dir/name{ext}` for the host's executable extensions
pub fn find_executable_in(dir: &Path, name: &str) -> Option<PathBuf> {
    executable_extensions()
        .iter()
        .map(|ext| dir.join(format!("{}{}", name, ext)))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_line_uses_file_name() {
        let spec = CommandSpec::new("/opt/sdk/platform-tools/adb").args(["-s", "DEV_A", "devices"]);
        assert_eq!(spec.display_line(), "adb -s DEV_A devices");
    }

    #[test]
    fn test_combined_output() {
        let output = ExecOutput {
            code: Some(0),
            stdout: "out".into(),
            stderr: "err\n".into(),
        };
        assert_eq!(output.combined(), "out\nerr\n");
        assert!(output.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable_in() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_executable_in(dir.path(), "ninja").is_none());
        std::fs::write(dir.path().join("ninja"), "").unwrap();
        assert_eq!(find_executable_in(dir.path(), "ninja"), Some(dir.path().join("ninja")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let spec = CommandSpec::new("sh").args(["-c", "echo hello; echo oops 1>&2; exit 3"]);
        let output = SystemRunner.output(&spec).await.unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_streams_lines() {
        let spec = CommandSpec::new("sh").args(["-c", "echo one; echo two"]);
        let mut lines = SystemRunner.spawn_lines(&spec).await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("one"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("two"));
        assert_eq!(lines.next_line().await.unwrap(), None);
        lines.terminate().await.unwrap();
    }
}
