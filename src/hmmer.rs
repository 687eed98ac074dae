use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::annotate::{DomainHit, DomainLibrary, DomainSearch};
use crate::domain::Protein;
use crate::error::CompositionError;
use crate::progress::Task;

/// Runs HMMER's `hmmsearch` with a fixed worker count.
///
/// Proteins are written to a scratch FASTA file under their index, so hits
/// map back to the input slice regardless of protein identifiers. The
/// search uses `-Z 1 --domZ 1`: with both database sizes fixed to one, the
/// independent E-value reported for each domain equals its p-value.
#[derive(Debug, Clone)]
pub struct Hmmsearch {
    program: Option<PathBuf>,
    cpus: usize,
}

impl Hmmsearch {
    pub fn new(cpus: usize) -> Self {
        Self {
            program: find_in_path("hmmsearch"),
            cpus,
        }
    }

    pub fn with_program(program: impl Into<PathBuf>, cpus: usize) -> Self {
        Self {
            program: Some(program.into()),
            cpus,
        }
    }

    pub fn cpus(&self) -> usize {
        self.cpus
    }

    pub fn program(&self) -> Result<&Path, CompositionError> {
        self.program
            .as_deref()
            .ok_or_else(|| CompositionError::MissingTool("hmmsearch (HMMER 3)".to_string()))
    }

    pub fn version(&self) -> Option<String> {
        let program = self.program.as_ref()?;
        let output = Command::new(program).arg("-h").output().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .find(|line| line.starts_with("# HMMER"))
            .map(|line| line.trim_start_matches('#').trim().to_string())
    }
}

impl DomainSearch for Hmmsearch {
    fn search(
        &self,
        library: &DomainLibrary,
        proteins: &[&Protein],
        progress: &Task<'_>,
    ) -> Result<Vec<DomainHit>, CompositionError> {
        let program = self.program()?;
        if proteins.is_empty() {
            return Ok(Vec::new());
        }

        let workdir = tempfile::Builder::new()
            .prefix("bgc-comp-hmmsearch")
            .tempdir()
            .map_err(|err| CompositionError::Filesystem(err.to_string()))?;
        let fasta = workdir.path().join("proteins.faa");
        let domtbl = workdir.path().join("hits.domtbl");
        let stderr_path = workdir.path().join("hmmsearch.stderr");
        write_fasta(&fasta, proteins)?;

        let stderr =
            File::create(&stderr_path).map_err(|err| CompositionError::Filesystem(err.to_string()))?;
        let mut child = Command::new(program)
            .arg("--cpu")
            .arg(self.cpus.to_string())
            .args(["-Z", "1", "--domZ", "1", "--noali", "--domtblout"])
            .arg(&domtbl)
            .arg(library.path.as_std_path())
            .arg(&fasta)
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|err| CompositionError::DomainSearch(format!("{}: {err}", program.display())))?;

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = line.map_err(|err| CompositionError::DomainSearch(err.to_string()))?;
                if line.starts_with("Query:") {
                    progress.advance(1);
                }
            }
        }

        let status = child
            .wait()
            .map_err(|err| CompositionError::DomainSearch(err.to_string()))?;
        if !status.success() {
            let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
            let stderr = stderr.trim();
            let message = if stderr.is_empty() {
                format!("{} exited with {status} on {}", program.display(), library.id)
            } else {
                format!("{} on {}: {stderr}", program.display(), library.id)
            };
            return Err(CompositionError::DomainSearch(message));
        }

        let table =
            File::open(&domtbl).map_err(|err| CompositionError::Filesystem(err.to_string()))?;
        let hits = parse_domtblout(BufReader::new(table), proteins.len())?;
        debug!(library = %library.id, hits = hits.len(), cpus = self.cpus, "hmmsearch finished");
        Ok(hits)
    }
}

fn write_fasta(path: &Path, proteins: &[&Protein]) -> Result<(), CompositionError> {
    let file = File::create(path).map_err(|err| CompositionError::Filesystem(err.to_string()))?;
    let mut writer = BufWriter::new(file);
    for (index, protein) in proteins.iter().enumerate() {
        // hmmsearch rejects empty sequences
        if protein.sequence.is_empty() {
            continue;
        }
        writeln!(writer, ">{index} {}", protein.id)
            .and_then(|_| writeln!(writer, "{}", protein.sequence))
            .map_err(|err| CompositionError::Filesystem(err.to_string()))?;
    }
    writer
        .flush()
        .map_err(|err| CompositionError::Filesystem(err.to_string()))
}

const DOMTBL_COLUMNS: usize = 22;

/// Parses a `--domtblout` table written for a FASTA file whose sequence
/// names are indices below `proteins`.
pub fn parse_domtblout<R: BufRead>(
    reader: R,
    proteins: usize,
) -> Result<Vec<DomainHit>, CompositionError> {
    let mut hits = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| CompositionError::DomainTableParse(err.to_string()))?;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let malformed =
            |what: &str| CompositionError::DomainTableParse(format!("line {}: {what}", number + 1));

        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < DOMTBL_COLUMNS {
            return Err(malformed("too few columns"));
        }
        let protein = columns[0]
            .parse::<usize>()
            .ok()
            .filter(|index| *index < proteins)
            .ok_or_else(|| malformed("unknown target sequence"))?;
        let name = match columns[4] {
            "-" => columns[3],
            accession => accession,
        };
        let pvalue = columns[12]
            .parse::<f64>()
            .map_err(|_| malformed("invalid i-Evalue"))?;
        let start = columns[17]
            .parse::<i64>()
            .map_err(|_| malformed("invalid alignment start"))?;
        let end = columns[18]
            .parse::<i64>()
            .map_err(|_| malformed("invalid alignment end"))?;

        hits.push(DomainHit {
            protein,
            name: name.to_string(),
            start,
            end,
            pvalue,
        });
    }
    Ok(hits)
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
