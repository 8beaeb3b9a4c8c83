//! Command execution for toolchain steps.
//!
//! Builders never spawn processes themselves. Every toolchain invocation goes
//! through a [`Runner`], so the same builder can run for real
//! ([`ShellRunner`]) or just print what it would do ([`PrintOnlyRunner`]).

use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{BuildError, Result};

/// Executes one toolchain command and reports failure.
///
/// Calls block until the command finishes. Implementations decide whether
/// they can be shared across threads.
pub trait Runner {
    /// Run `cmd` (program followed by its arguments) in `cwd`.
    ///
    /// Fails with [`BuildError::Execution`] if the command cannot be spawned
    /// or exits unsuccessfully.
    fn run(&self, cmd: &[String], cwd: Option<&Path>, title: Option<&str>) -> Result<()>;
}

/// Runs commands as child processes with inherited stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Runner for ShellRunner {
    fn run(&self, cmd: &[String], cwd: Option<&Path>, title: Option<&str>) -> Result<()> {
        let title = title.unwrap_or("command");
        let command_line = shell_join(cmd);

        let (program, args) = cmd.split_first().ok_or_else(|| BuildError::Execution {
            title: title.to_string(),
            command: String::new(),
            reason: "empty command".to_string(),
        })?;

        info!("{}", title);
        debug!(cwd = ?cwd, "{}", command_line);

        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let status = command.status().map_err(|e| BuildError::Execution {
            title: title.to_string(),
            command: command_line.clone(),
            reason: format!("failed to spawn: {}", e),
        })?;

        if !status.success() {
            let reason = match status.code() {
                Some(code) => format!("exit code {}", code),
                None => "terminated by signal".to_string(),
            };
            return Err(BuildError::Execution {
                title: title.to_string(),
                command: command_line,
                reason,
            });
        }

        Ok(())
    }
}

/// Writes the commands it is given instead of running them.
///
/// Output is a shell script: each command is preceded by a `# <title>`
/// comment and prefixed with `cd <cwd> &&` when it has a working directory.
pub struct PrintOnlyRunner<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> PrintOnlyRunner<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> Runner for PrintOnlyRunner<W> {
    fn run(&self, cmd: &[String], cwd: Option<&Path>, title: Option<&str>) -> Result<()> {
        let mut out = self.out.borrow_mut();
        if let Some(title) = title {
            writeln!(out, "# {}", title)?;
        }
        match cwd {
            Some(dir) => writeln!(
                out,
                "cd {} && {}",
                shell_quote(&dir.to_string_lossy()),
                shell_join(cmd)
            )?,
            None => writeln!(out, "{}", shell_join(cmd))?,
        }
        writeln!(out)?;
        Ok(())
    }
}

/// Quote a single word for POSIX shells.
pub fn shell_quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }
    let safe = word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\"'\"'"))
    }
}

/// Join words into a shell command line, quoting where needed.
pub fn shell_join<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| shell_quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
