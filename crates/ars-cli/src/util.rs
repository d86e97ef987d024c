use std::{
    fs::File,
    io::{self, BufReader, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use ars_training::{
    checkpoint::Checkpoint,
    hyperparams::{Hyperparams, HyperparamsConfig},
};

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    /// Writes one CSV record per row after a header line, then flushes.
    pub fn write_csv<I, R>(&mut self, header: &[&str], rows: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = String>,
    {
        writeln!(self, "{}", header.join(","))
            .with_context(|| format!("Failed to write CSV header to {}", self.display_path()))?;
        for row in rows {
            let line = row.into_iter().collect::<Vec<_>>().join(",");
            writeln!(self, "{line}")
                .with_context(|| format!("Failed to write CSV row to {}", self.display_path()))?;
        }
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;
    Ok(value)
}

pub fn load_checkpoint(path: &Path) -> anyhow::Result<Checkpoint> {
    Checkpoint::load(path)
        .with_context(|| format!("Failed to load checkpoint: {}", path.display()))
}

/// Rebuilds the hyperparameters a checkpoint was trained with from its
/// signature.
pub fn checkpoint_hyperparams(checkpoint: &Checkpoint) -> anyhow::Result<Hyperparams> {
    let config = HyperparamsConfig::from_signature(&checkpoint.hyperparam).with_context(|| {
        format!(
            "Checkpoint has a malformed hyperparameter signature: {}",
            checkpoint.hyperparam
        )
    })?;
    Hyperparams::new(config).with_context(|| {
        format!(
            "Checkpoint signature holds invalid hyperparameters: {}",
            checkpoint.hyperparam
        )
    })
}
