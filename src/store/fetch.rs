use std::path::Path;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::config::RemoteCredentials;

/// A failed remote copy: what ran, how it exited, and everything it printed.
#[derive(Debug, Clone, Error)]
#[error("{command} exited with {status}: {output}")]
pub struct FetchFailure {
    pub command: String,
    pub status: String,
    pub output: String,
}

/// Copies one remote object to a local file, overwriting it.
pub trait RemoteFetcher: Send + Sync {
    fn fetch(&self, remote_uri: &str, dest: &Path) -> Result<(), FetchFailure>;
}

/// Shells out to `aws s3 cp`. Credentials go through the child's environment only.
pub struct AwsCliFetcher {
    program: String,
    credentials: RemoteCredentials,
}

impl AwsCliFetcher {
    pub fn new(credentials: RemoteCredentials) -> Self {
        Self { program: "aws".to_string(), credentials }
    }

    pub fn with_program<S: Into<String>>(mut self, program: S) -> Self {
        self.program = program.into();
        self
    }

    pub fn command(&self, remote_uri: &str, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("s3")
            .arg("cp")
            .arg(remote_uri)
            .arg(dest)
            .arg("--region")
            .arg(&self.credentials.region)
            .arg("--only-show-errors");
        if let Some(k) = &self.credentials.access_key_id { cmd.env("AWS_ACCESS_KEY_ID", k); }
        if let Some(s) = &self.credentials.secret_access_key { cmd.env("AWS_SECRET_ACCESS_KEY", s); }
        cmd.env("AWS_DEFAULT_REGION", &self.credentials.region);
        cmd
    }
}

impl RemoteFetcher for AwsCliFetcher {
    fn fetch(&self, remote_uri: &str, dest: &Path) -> Result<(), FetchFailure> {
        let label = format!("{} s3 cp {} {}", self.program, remote_uri, dest.display());
        debug!(target: "icfes::store", "running: {}", label);
        let out = self.command(remote_uri, dest).output().map_err(|e| FetchFailure {
            command: label.clone(),
            status: "spawn failed".into(),
            output: e.to_string(),
        })?;
        if out.status.success() {
            return Ok(());
        }
        let mut output = String::from_utf8_lossy(&out.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&out.stderr);
        if !stderr.trim().is_empty() {
            if !output.is_empty() { output.push('\n'); }
            output.push_str(stderr.trim());
        }
        Err(FetchFailure { command: label, status: out.status.to_string(), output })
    }
}
