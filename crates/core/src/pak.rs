//! Archive tool handshake
//!
//! Packing a directory into a `.pak` is delegated to an external program.
//! The tool signals completion by leaving a marker file next to the packed
//! directory; we poll for it at a fixed interval, give up after a timeout,
//! and rename the marker to the requested output path.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::PakConfig;

/// Archive tool errors
#[derive(Debug, thiserror::Error)]
pub enum PakError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tool exited without producing the marker
    #[error("Archive tool exited with {status} without producing {marker}")]
    ProcessFailed { status: ExitStatus, marker: PathBuf },

    /// Neither the marker nor an exit appeared in time
    #[error("Archive tool timed out after {0:?}")]
    Timeout(Duration),
}

/// External archive program and its handshake settings
#[derive(Clone, Debug)]
pub struct ArchiveTool {
    program: PathBuf,
    args: Vec<String>,
    marker: PathBuf,
    poll_interval: Duration,
    timeout: Duration,
}

impl ArchiveTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::from_config(&PakConfig {
            program: program.into(),
            ..PakConfig::default()
        })
    }

    pub fn from_config(config: &PakConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            marker: config.marker.clone(),
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_marker(mut self, marker: impl Into<PathBuf>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Where the tool leaves its output for `dir`
    ///
    /// A relative marker is resolved against the directory's parent, which is
    /// also the tool's working directory.
    pub fn marker_path(&self, dir: &Path) -> PathBuf {
        working_dir(dir).join(&self.marker)
    }

    /// Pack `dir` and move the result to `output`
    ///
    /// A marker left behind by an earlier run is removed before the tool
    /// starts. The tool must exit within the timeout once the marker shows up.
    #[tracing::instrument(skip(self))]
    pub fn pack_directory(&self, dir: &Path, output: &Path) -> Result<PathBuf, PakError> {
        let marker = self.marker_path(dir);
        let cwd = working_dir(dir);

        if marker.exists() {
            warn!("Removing stale {}", marker.display());
            std::fs::remove_file(&marker).map_err(|source| PakError::Io {
                path: marker.clone(),
                source,
            })?;
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(dir)
            .current_dir(cwd)
            .spawn()
            .map_err(|source| PakError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        info!("Started {} for {}", self.program.display(), dir.display());

        let started = Instant::now();
        self.wait_for_marker(&mut child, &marker, started)?;
        self.wait_for_exit(&mut child, started)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| PakError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::rename(&marker, output).map_err(|source| PakError::Io {
            path: marker.clone(),
            source,
        })?;
        info!("Packed {} into {}", dir.display(), output.display());
        Ok(output.to_path_buf())
    }

    fn wait_for_marker(
        &self,
        child: &mut Child,
        marker: &Path,
        started: Instant,
    ) -> Result<(), PakError> {
        loop {
            if marker.exists() {
                debug!("Found {} after {:?}", marker.display(), started.elapsed());
                return Ok(());
            }

            if let Some(status) = self.try_wait(child)? {
                // The marker may have landed between the check and the exit.
                if marker.exists() {
                    continue;
                }
                if status.success() {
                    warn!("{} exited cleanly without output", self.program.display());
                }
                error!("Archive tool exited with {}", status);
                return Err(PakError::ProcessFailed {
                    status,
                    marker: marker.to_path_buf(),
                });
            }

            self.check_timeout(child, started)?;
            thread::sleep(self.poll_interval);
        }
    }

    /// Wait for the tool to finish after it produced the marker
    fn wait_for_exit(&self, child: &mut Child, started: Instant) -> Result<(), PakError> {
        loop {
            if let Some(status) = self.try_wait(child)? {
                if !status.success() {
                    warn!("Archive tool exited with {} after producing output", status);
                }
                return Ok(());
            }

            self.check_timeout(child, started)?;
            thread::sleep(self.poll_interval);
        }
    }

    fn try_wait(&self, child: &mut Child) -> Result<Option<ExitStatus>, PakError> {
        child.try_wait().map_err(|source| PakError::Io {
            path: self.program.clone(),
            source,
        })
    }

    /// Kill the tool once the timeout has passed
    fn check_timeout(&self, child: &mut Child, started: Instant) -> Result<(), PakError> {
        if started.elapsed() < self.timeout {
            return Ok(());
        }

        error!("Archive tool timed out after {:?}", self.timeout);
        if let Err(e) = child.kill() {
            warn!("Failed to kill archive tool: {}", e);
        }
        let _ = child.wait();
        Err(PakError::Timeout(self.timeout))
    }
}

fn working_dir(dir: &Path) -> &Path {
    dir.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}
