//! Access to files and system utilities
//!
//! Probes never touch `tokio::fs` or spawn processes directly; they go
//! through [`SystemSource`] so tests can substitute a [`FixtureSource`].

use crate::error::ProbeError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;

/// Read-only view of the host
#[async_trait]
pub trait SystemSource: Send + Sync {
    /// Read a whole file as text
    async fn read_text(&self, path: &Path) -> Result<String, ProbeError>;

    /// Check whether a file or directory exists
    async fn exists(&self, path: &Path) -> bool;

    /// Run a program to completion and return its stdout
    async fn run_command(&self, program: &str, args: &[&str]) -> Result<String, ProbeError>;
}

/// Roots under which accounting and kernel files are looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub cgroup_root: PathBuf,
    pub proc_root: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
            proc_root: PathBuf::from("/proc"),
        }
    }
}

impl SourcePaths {
    pub fn cgroup(&self, relative: &str) -> PathBuf {
        self.cgroup_root.join(relative)
    }

    pub fn proc(&self, relative: &str) -> PathBuf {
        self.proc_root.join(relative)
    }
}

/// The real host, via `tokio::fs` and `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSource;

#[async_trait]
impl SystemSource for HostSource {
    async fn read_text(&self, path: &Path) -> Result<String, ProbeError> {
        fs::read_to_string(path)
            .await
            .map_err(|source| ProbeError::FileUnreadable {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::metadata(path).await.is_ok()
    }

    async fn run_command(&self, program: &str, args: &[&str]) -> Result<String, ProbeError> {
        let command = command_line(program, args);
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::CommandUnavailable {
                command: command.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::CommandUnavailable {
                command,
                detail: format!("{} {}", output.status, stderr.trim()).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// In-memory host with canned files and command outputs.
///
/// Commands are keyed by their full argument line, e.g. `"top -b -n 1"`.
/// Anything not registered behaves as missing.
#[derive(Debug, Default, Clone)]
pub struct FixtureSource {
    files: HashMap<PathBuf, String>,
    commands: HashMap<String, String>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn with_command(mut self, line: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.commands.insert(line.into(), stdout.into());
        self
    }
}

#[async_trait]
impl SystemSource for FixtureSource {
    async fn read_text(&self, path: &Path) -> Result<String, ProbeError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ProbeError::missing(path))
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.keys().any(|file| file.starts_with(path))
    }

    async fn run_command(&self, program: &str, args: &[&str]) -> Result<String, ProbeError> {
        let line = command_line(program, args);
        self.commands
            .get(&line)
            .cloned()
            .ok_or_else(|| ProbeError::CommandUnavailable {
                command: line,
                detail: "not found".to_string(),
            })
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}
