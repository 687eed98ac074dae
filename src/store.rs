use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CompositionError;
use crate::matrix::CompositionMatrix;
use crate::npz;

pub const LABELS_FILE: &str = "labels.tsv";
pub const DOMAINS_FILE: &str = "domains.tsv";
pub const COMPOSITIONS_FILE: &str = "compositions.npz";

/// Output directory holding the three aligned artifacts of a run.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: Utf8PathBuf,
}

/// Final locations of the written artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifacts {
    pub labels: Utf8PathBuf,
    pub domains: Utf8PathBuf,
    pub compositions: Utf8PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn labels_path(&self) -> Utf8PathBuf {
        self.root.join(LABELS_FILE)
    }

    pub fn domains_path(&self) -> Utf8PathBuf {
        self.root.join(DOMAINS_FILE)
    }

    pub fn compositions_path(&self) -> Utf8PathBuf {
        self.root.join(COMPOSITIONS_FILE)
    }

    /// Renders every artifact into a scratch directory inside the output
    /// directory and only then moves them into place. Nothing is replaced
    /// until all three artifacts are rendered, and a failed move restores the
    /// artifacts of the previous run.
    pub fn write_all(&self, matrix: &CompositionMatrix) -> Result<Artifacts, CompositionError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| CompositionError::Filesystem(format!("{}: {err}", self.root)))?;
        let staging = tempfile::Builder::new()
            .prefix(".bgc-comp")
            .tempdir_in(self.root.as_std_path())
            .map_err(|err| CompositionError::Filesystem(err.to_string()))?;
        let staged = |name: &str| staging.path().join(name);

        render_labels(create(&staged(LABELS_FILE))?, &matrix.labels)?;
        render_domains(create(&staged(DOMAINS_FILE))?, &matrix.vocabulary)?;
        npz::write_csr(create(&staged(COMPOSITIONS_FILE))?, &matrix.matrix)?;

        let artifacts = Artifacts {
            labels: self.labels_path(),
            domains: self.domains_path(),
            compositions: self.compositions_path(),
        };
        commit(
            staging.path(),
            &[
                (staged(LABELS_FILE), artifacts.labels.as_std_path()),
                (staged(DOMAINS_FILE), artifacts.domains.as_std_path()),
                (staged(COMPOSITIONS_FILE), artifacts.compositions.as_std_path()),
            ],
        )?;
        Ok(artifacts)
    }
}

fn create(path: &Path) -> Result<File, CompositionError> {
    File::create(path)
        .map_err(|err| CompositionError::Filesystem(format!("{}: {err}", path.display())))
}

/// Moves staged files over their destinations. Replaced files are parked in
/// `staging` until every move succeeded; on failure the destinations are
/// put back as they were.
fn commit(staging: &Path, moves: &[(PathBuf, &Path)]) -> Result<(), CompositionError> {
    let mut done: Vec<(&Path, Option<PathBuf>)> = Vec::with_capacity(moves.len());
    for (index, (source, dest)) in moves.iter().enumerate() {
        let backup = if dest.exists() {
            let backup = staging.join(format!("previous-{index}"));
            if let Err(err) = fs::rename(dest, &backup) {
                rollback(&done);
                return Err(CompositionError::Filesystem(format!(
                    "{}: {err}",
                    dest.display()
                )));
            }
            Some(backup)
        } else {
            None
        };
        if let Err(err) = fs::rename(source, dest) {
            done.push((dest, backup));
            rollback(&done);
            return Err(CompositionError::Filesystem(format!(
                "{}: {err}",
                dest.display()
            )));
        }
        debug!(path = %dest.display(), "artifact written");
        done.push((dest, backup));
    }
    Ok(())
}

fn rollback(done: &[(&Path, Option<PathBuf>)]) {
    for (dest, backup) in done.iter().rev() {
        if dest.exists() {
            if let Err(err) = fs::remove_file(dest) {
                warn!(path = %dest.display(), %err, "failed to remove partial artifact");
            }
        }
        if let Some(backup) = backup {
            if let Err(err) = fs::rename(backup, dest) {
                warn!(path = %dest.display(), %err, "failed to restore previous artifact");
            }
        }
    }
}

/// One `cluster<TAB>group` line per matrix row.
pub fn render_labels<W: Write>(
    writer: W,
    labels: &[(String, String)],
) -> Result<(), CompositionError> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);
    for (cluster, group) in labels {
        writer
            .write_record([cluster, group])
            .map_err(|err| CompositionError::Filesystem(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| CompositionError::Filesystem(err.to_string()))
}

/// One domain name per line, in column order.
pub fn render_domains<W: Write>(writer: W, vocabulary: &[String]) -> Result<(), CompositionError> {
    let mut writer = BufWriter::new(writer);
    for name in vocabulary {
        writeln!(writer, "{name}").map_err(|err| CompositionError::Filesystem(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| CompositionError::Filesystem(err.to_string()))
}
