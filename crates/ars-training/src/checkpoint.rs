//! Persisted training progress.
//!
//! A checkpoint is a JSON document holding the policy weights (`param`), the
//! last completed step, the full evaluation-reward history (`reward[i]` is the
//! reward after step `i`) and the hyperparameter signature of the run. It also
//! carries the normalizer statistics so a run can be resumed, or a policy
//! evaluated, under the same state scaling it was trained with.
//!
//! Checkpoints are rewritten in full after every step. The new content goes to
//! a sibling `*.tmp` file that is renamed over the old checkpoint, so a crash
//! mid-write leaves the previous checkpoint readable.

use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use ars_stats::running::RunningStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matrix::Matrix;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CheckpointError {
    #[display("checkpoint I/O failed for {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("malformed checkpoint {}: {source}", path.display())]
    Format {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Policy weights, `action_count × observation_dim`.
    pub param: Matrix,
    /// Last completed training step (0-based).
    pub step: usize,
    /// Evaluation reward of every completed step.
    pub reward: Vec<f64>,
    /// Hyperparameter signature of the run.
    pub hyperparam: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalizer: Option<RunningStats>,
    pub saved_at: DateTime<Utc>,
}

/// Conventional checkpoint location: `<root>/<env_name>/<signature>.json`.
#[must_use]
pub fn checkpoint_path(root: &Path, env_name: &str, signature: &str) -> PathBuf {
    root.join(env_name).join(format!("{signature}.json"))
}

impl Checkpoint {
    pub fn load<P>(path: P) -> Result<Self, CheckpointError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CheckpointError::Io {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CheckpointError::Format {
            path: path.to_owned(),
            source,
        })
    }

    /// Writes the checkpoint to `path`, replacing any previous content.
    ///
    /// Missing parent directories are created.
    pub fn save<P>(&self, path: P) -> Result<(), CheckpointError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let io_err = |source| CheckpointError::Io {
            path: path.to_owned(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let tmp_path = tmp_path(path);
        let result = self.write_to(&tmp_path).and_then(|()| {
            fs::rename(&tmp_path, path).map_err(|source| CheckpointError::Io {
                path: path.to_owned(),
                source,
            })
        });
        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn write_to(&self, path: &Path) -> Result<(), CheckpointError> {
        let io_err = |source| CheckpointError::Io {
            path: path.to_owned(),
            source,
        };
        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|source| CheckpointError::Format {
            path: path.to_owned(),
            source,
        })?;
        writer.flush().map_err(io_err)?;
        writer.get_ref().sync_all().map_err(io_err)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
