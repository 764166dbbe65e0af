//! DVC archival of the data directory.
//!
//! # Responsibilities
//! - Track the data directory with `dvc add`
//! - Commit the `.dvc` pointer file and push the data to the DVC remote
//!
//! # Design Decisions
//! - Steps run sequentially; the first failing step stops the sequence
//! - Each subprocess is bounded by `timeouts.archive_command_secs`
//! - Failures are reported to the caller, which logs them and carries on

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::config::{ArchiveConfig, TimeoutConfig};
use crate::error::ArchivalError;
use crate::resilience::timeouts::with_deadline;

#[derive(Debug, Clone)]
pub struct Archiver {
    data_dir: PathBuf,
    repo_dir: Option<PathBuf>,
    commit_message: String,
    dvc: String,
    git: String,
    timeout: Duration,
}

impl Archiver {
    pub fn new(config: &ArchiveConfig, data_dir: &Path, timeouts: &TimeoutConfig) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            repo_dir: config.repo_dir.clone(),
            commit_message: config.commit_message.clone(),
            dvc: config.dvc_command.clone(),
            git: config.git_command.clone(),
            timeout: Duration::from_secs(timeouts.archive_command_secs),
        }
    }

    /// The command lines run by [`Archiver::archive`], in order.
    pub fn steps(&self) -> Vec<(String, Vec<OsString>)> {
        let mut pointer = self.data_dir.clone().into_os_string();
        pointer.push(".dvc");

        vec![
            (self.dvc.clone(), vec!["add".into(), self.data_dir.clone().into_os_string()]),
            (self.git.clone(), vec!["add".into(), pointer]),
            (
                self.git.clone(),
                vec!["commit".into(), "-m".into(), self.commit_message.clone().into()],
            ),
            (self.dvc.clone(), vec!["push".into()]),
        ]
    }

    pub async fn archive(&self) -> Result<(), ArchivalError> {
        for (program, args) in self.steps() {
            self.run(&program, &args).await?;
        }
        tracing::info!(data_dir = %self.data_dir.display(), "Data archived with DVC");
        Ok(())
    }

    async fn run(&self, program: &str, args: &[OsString]) -> Result<(), ArchivalError> {
        let command = render(program, args);
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.repo_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(command = %command, "Running archival step");
        let output = match with_deadline(self.timeout, cmd.output()).await {
            Some(Ok(output)) => output,
            Some(Err(source)) => return Err(ArchivalError::Spawn { command, source }),
            None => {
                return Err(ArchivalError::Timeout {
                    command,
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(command = %command, stderr = %stderr.trim(), "Archival step failed");
            return Err(ArchivalError::Failed {
                command,
                status: output.status.to_string(),
            });
        }
        Ok(())
    }
}

fn render(program: &str, args: &[OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archiver(dvc: &str, git: &str, timeout_secs: u64) -> Archiver {
        let config = ArchiveConfig {
            enabled: true,
            dvc_command: dvc.to_string(),
            git_command: git.to_string(),
            ..ArchiveConfig::default()
        };
        let timeouts = TimeoutConfig {
            archive_command_secs: timeout_secs,
            ..TimeoutConfig::default()
        };
        Archiver::new(&config, Path::new("data"), &timeouts)
    }

    #[test]
    fn test_step_sequence() {
        let steps: Vec<String> = archiver("dvc", "git", 5)
            .steps()
            .iter()
            .map(|(program, args)| render(program, args))
            .collect();

        assert_eq!(
            steps,
            vec![
                "dvc add data",
                "git add data.dvc",
                "git commit -m Update telemetry data",
                "dvc push",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_steps() {
        archiver("true", "true", 5).archive().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_step_is_reported() {
        let err = archiver("true", "false", 5).archive().await.unwrap_err();
        match err {
            ArchivalError::Failed { command, .. } => assert_eq!(command, "false add data.dvc"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let err = archiver("definitely-not-a-real-dvc-binary", "git", 5)
            .archive()
            .await
            .unwrap_err();
        assert!(matches!(err, ArchivalError::Spawn { .. }));
    }
}
