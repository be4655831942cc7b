//! Commits the ledger and pushes it to a git remote.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::config::PublisherConfig;
use crate::utils::truncate_for_log;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("ledger path {} has no file name", .0.display())]
    Path(PathBuf),

    #[error("could not run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {code}: {stderr}")]
    Command {
        command: String,
        code: String,
        stderr: String,
    },
}

#[derive(Debug, Clone)]
pub struct Publisher {
    remote: String,
    branch: String,
    message: String,
    program: String,
}

impl Publisher {
    pub fn new(config: &PublisherConfig) -> Self {
        Self {
            remote: config.remote.clone(),
            branch: config.branch.clone(),
            message: config.message.clone(),
            program: "git".to_string(),
        }
    }

    /// Run a different executable in place of `git`.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// `git add`, `git commit` and `git push` the ledger, in the ledger's
    /// directory. Any failing step stops the sequence, including a commit with
    /// nothing to commit.
    #[instrument(level = "info", skip(self), fields(remote = %self.remote, branch = %self.branch))]
    pub async fn publish(&self, ledger_path: &Path) -> Result<(), PublishError> {
        let file_name = ledger_path
            .file_name()
            .ok_or_else(|| PublishError::Path(ledger_path.to_path_buf()))?;
        let workdir = match ledger_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = file_name.to_string_lossy().into_owned();
        let refspec = format!("HEAD:{}", self.branch);

        let steps: [Vec<&str>; 3] = [
            vec!["add", file_name.as_str()],
            vec!["commit", "-m", self.message.as_str()],
            vec!["push", self.remote.as_str(), refspec.as_str()],
        ];
        for args in steps {
            self.run(&workdir, &args).await?;
        }
        info!("Published ledger");
        Ok(())
    }

    async fn run(&self, workdir: &Path, args: &[&str]) -> Result<(), PublishError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, workdir = %workdir.display(), "Running");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(workdir)
            .output()
            .await
            .map_err(|source| PublishError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            // git reports "nothing to commit" on stdout.
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(PublishError::Command {
                command,
                code: output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr: truncate_for_log(detail.trim(), 1000),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(stdout = %truncate_for_log(stdout.trim(), 500), "Command output");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher(program: &str) -> Publisher {
        Publisher::new(&PublisherConfig::default()).with_program(program)
    }

    #[tokio::test]
    async fn test_successful_steps() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = dir.path().join("articles.csv");
        publisher("true").publish(&ledger).await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_step_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = publisher("false")
            .publish(&dir.path().join("articles.csv"))
            .await
            .unwrap_err();
        match err {
            PublishError::Command { command, code, .. } => {
                assert_eq!(command, "false add articles.csv");
                assert_eq!(code, "1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let err = publisher("definitely-not-a-real-git-binary")
            .publish(Path::new("articles.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_path_without_file_name() {
        let err = publisher("true").publish(Path::new("/")).await.unwrap_err();
        assert!(matches!(err, PublishError::Path(_)));
    }
}
