//! Scripted command runner for tests
//!
//! Replies are chosen by substring match against the command line
//! (`program-name arg1 arg2 ...`). The most recently added matching rule wins;
//! unmatched commands succeed with empty output. Every invocation is recorded.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::process::{CommandRunner, CommandSpec, ExecOutput, LineStream};

#[derive(Debug, Clone)]
enum Reply {
    Output(ExecOutput),
    Stream { lines: Vec<String>, hold_open: bool },
    Error(std::io::ErrorKind),
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    reply: Reply,
    remaining: Option<usize>,
}

/// A [`CommandRunner`] that never starts a process
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, pattern: &str, reply: Reply, remaining: Option<usize>) -> &Self {
        lock(&self.rules).push(Rule { pattern: pattern.to_string(), reply, remaining });
        self
    }

    /// Reply to every matching command with exit code 0 and `stdout`
    pub fn ok(&self, pattern: &str, stdout: &str) -> &Self {
        self.reply(pattern, 0, stdout, "")
    }

    /// Reply to the next matching command only
    pub fn ok_once(&self, pattern: &str, stdout: &str) -> &Self {
        let output = ExecOutput { code: Some(0), stdout: stdout.into(), stderr: String::new() };
        self.push(pattern, Reply::Output(output), Some(1))
    }

    /// Reply to every matching command with a non-zero exit code
    pub fn fail(&self, pattern: &str, code: i32, stderr: &str) -> &Self {
        self.reply(pattern, code, "", stderr)
    }

    pub fn fail_once(&self, pattern: &str, code: i32, stderr: &str) -> &Self {
        let output = ExecOutput { code: Some(code), stdout: String::new(), stderr: stderr.into() };
        self.push(pattern, Reply::Output(output), Some(1))
    }

    pub fn reply(&self, pattern: &str, code: i32, stdout: &str, stderr: &str) -> &Self {
        let output = ExecOutput { code: Some(code), stdout: stdout.into(), stderr: stderr.into() };
        self.push(pattern, Reply::Output(output), None)
    }

    /// Fail to launch matching commands
    pub fn spawn_error(&self, pattern: &str, kind: std::io::ErrorKind) -> &Self {
        self.push(pattern, Reply::Error(kind), None)
    }

    /// Stream `lines`; with `hold_open` the stream never ends on its own
    pub fn stream(&self, pattern: &str, lines: &[&str], hold_open: bool) -> &Self {
        let lines = lines.iter().map(|l| l.to_string()).collect();
        self.push(pattern, Reply::Stream { lines, hold_open }, None)
    }

    /// Command lines seen so far
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).iter().map(CommandSpec::display_line).collect()
    }

    /// Full specs seen so far
    pub fn specs(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    /// Number of recorded command lines containing `pattern`
    pub fn count(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(pattern)).count()
    }

    fn take_reply(&self, spec: &CommandSpec) -> Option<Reply> {
        lock(&self.calls).push(spec.clone());
        let line = spec.display_line();
        let mut rules = lock(&self.rules);
        let rule = rules
            .iter_mut()
            .rev()
            .find(|r| r.remaining != Some(0) && line.contains(&r.pattern))?;
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        Some(rule.reply.clone())
    }
}

impl CommandRunner for ScriptedRunner {
    type Lines = ScriptedLines;

    async fn output(&self, spec: &CommandSpec) -> std::io::Result<ExecOutput> {
        match self.take_reply(spec) {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Error(kind)) => Err(std::io::Error::new(kind, "scripted failure")),
            Some(Reply::Stream { lines, .. }) => Ok(ExecOutput {
                code: Some(0),
                stdout: lines.join("\n"),
                stderr: String::new(),
            }),
            None => Ok(ExecOutput { code: Some(0), ..Default::default() }),
        }
    }

    async fn spawn_lines(&self, spec: &CommandSpec) -> std::io::Result<ScriptedLines> {
        match self.take_reply(spec) {
            Some(Reply::Stream { lines, hold_open }) => Ok(ScriptedLines {
                lines: lines.into(),
                hold_open,
                terminated: false,
            }),
            Some(Reply::Output(output)) => Ok(ScriptedLines {
                lines: output.stdout.lines().map(str::to_string).collect(),
                hold_open: false,
                terminated: false,
            }),
            Some(Reply::Error(kind)) => Err(std::io::Error::new(kind, "scripted failure")),
            None => Ok(ScriptedLines { lines: VecDeque::new(), hold_open: false, terminated: false }),
        }
    }
}

/// Stream produced by [`ScriptedRunner::spawn_lines`]
#[derive(Debug)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
    hold_open: bool,
    terminated: bool,
}

impl LineStream for ScriptedLines {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        if self.terminated {
            return Ok(None);
        }
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn terminate(&mut self) -> std::io::Result<()> {
        self.terminated = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_rule_wins_and_once_rules_expire() {
        let runner = ScriptedRunner::new();
        runner.ok("adb devices", "general");
        runner.ok_once("adb devices", "first");

        let spec = CommandSpec::new("/sdk/platform-tools/adb").arg("devices");
        assert_eq!(runner.output(&spec).await.unwrap().stdout, "first");
        assert_eq!(runner.output(&spec).await.unwrap().stdout, "general");
        assert_eq!(runner.count("adb devices"), 2);
    }

    #[tokio::test]
    async fn test_unmatched_commands_succeed() {
        let runner = ScriptedRunner::new();
        let output = runner.output(&CommandSpec::new("gradle").arg("wrapper")).await.unwrap();
        assert!(output.success());
        assert_eq!(runner.calls(), vec!["gradle wrapper".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_ends_after_lines() {
        let runner = ScriptedRunner::new();
        runner.stream("logcat", &["a", "b"], false);
        let mut lines = runner.spawn_lines(&CommandSpec::new("adb").arg("logcat")).await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("a"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("b"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
