use std::fmt;

use camino::Utf8PathBuf;
use regex::Regex;
use tracing::debug;

use crate::domain::{Domain, Gene, Protein};
use crate::error::CompositionError;
use crate::progress::{ProgressSink, ProgressUnit, Task};

/// A sed-style substitution (`s/PATTERN/REPLACEMENT/[g]`) applied to raw
/// profile names.
#[derive(Clone)]
pub struct Relabel {
    rule: String,
    pattern: Regex,
    replacement: String,
    global: bool,
}

impl Relabel {
    pub fn parse(rule: &str) -> Result<Self, CompositionError> {
        let invalid = |reason: &str| CompositionError::InvalidRelabel(format!("{rule}: {reason}"));

        let rest = rule.strip_prefix('s').ok_or_else(|| invalid("expected s/…/…/"))?;
        let delimiter = rest.chars().next().ok_or_else(|| invalid("missing delimiter"))?;
        let parts: Vec<&str> = rest[delimiter.len_utf8()..].split(delimiter).collect();
        let [pattern, replacement, flags] = parts.as_slice() else {
            return Err(invalid("expected exactly three delimiters"));
        };
        let global = match *flags {
            "" => false,
            "g" => true,
            other => return Err(invalid(&format!("unsupported flags {other:?}"))),
        };
        let pattern = Regex::new(pattern).map_err(|err| invalid(&err.to_string()))?;

        Ok(Self {
            rule: rule.to_string(),
            pattern,
            replacement: sed_replacement(replacement),
            global,
        })
    }

    pub fn apply(&self, name: &str) -> String {
        if self.global {
            self.pattern.replace_all(name, self.replacement.as_str()).into_owned()
        } else {
            self.pattern.replace(name, self.replacement.as_str()).into_owned()
        }
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }
}

impl fmt::Debug for Relabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Relabel").field(&self.rule).finish()
    }
}

/// Rewrites `\1` style back-references into `${1}` and escapes literal `$`.
fn sed_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(digit) if digit.is_ascii_digit() => {
                    out.push_str("${");
                    out.push(digit);
                    out.push('}');
                }
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            '&' => out.push_str("${0}"),
            '$' => out.push_str("$$"),
            other => out.push(other),
        }
    }
    out
}

/// A profile HMM library applied during annotation.
#[derive(Debug, Clone)]
pub struct DomainLibrary {
    pub id: String,
    pub version: String,
    pub path: Utf8PathBuf,
    /// Number of profiles in the library; progress is reported against it.
    pub size: u64,
    pub relabel: Option<Relabel>,
}

impl DomainLibrary {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        path: impl Into<Utf8PathBuf>,
        size: u64,
        relabel: Option<&str>,
    ) -> Result<Self, CompositionError> {
        Ok(Self {
            id: id.into(),
            version: version.into(),
            path: path.into(),
            size,
            relabel: relabel.map(Relabel::parse).transpose()?,
        })
    }

    pub fn canonical_name(&self, raw: &str) -> String {
        match &self.relabel {
            Some(relabel) => relabel.apply(raw),
            None => raw.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LibraryPaths {
    pub pfam: Utf8PathBuf,
    pub tigrfam: Utf8PathBuf,
    pub smcogs: Utf8PathBuf,
    pub nrp_pks: Utf8PathBuf,
    pub hmm_detect: Utf8PathBuf,
}

/// The five libraries of the pipeline, in application order.
pub fn standard_libraries(paths: &LibraryPaths) -> Result<Vec<DomainLibrary>, CompositionError> {
    Ok(vec![
        DomainLibrary::new(
            "smCOGs",
            "6.0.0",
            paths.smcogs.clone(),
            301,
            Some(r"s/(SMCOG\d+):.*/\1/"),
        )?,
        DomainLibrary::new("antiSMASH-NRPs-PKs", "5.1.2", paths.nrp_pks.clone(), 158, None)?,
        DomainLibrary::new("antiSMASH-HMM-detect", "5.1.2", paths.hmm_detect.clone(), 409, None)?,
        DomainLibrary::new(
            "Pfam",
            "35.0",
            paths.pfam.clone(),
            19632,
            Some(r"s/(PF\d+).\d+/\1/"),
        )?,
        DomainLibrary::new("Tigrfam", "15.0", paths.tigrfam.clone(), 4488, None)?,
    ])
}

pub fn check_libraries(libraries: &[DomainLibrary]) -> Result<(), CompositionError> {
    for library in libraries {
        if !library.path.exists() {
            return Err(CompositionError::MissingLibrary(format!(
                "{} ({})",
                library.id, library.path
            )));
        }
    }
    Ok(())
}

/// One raw hit from a domain search, before relabelling.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainHit {
    /// Index of the protein in the slice handed to [`DomainSearch::search`].
    pub protein: usize,
    pub name: String,
    pub start: i64,
    pub end: i64,
    pub pvalue: f64,
}

/// External domain-search capability, run once per library over all proteins.
pub trait DomainSearch {
    fn search(
        &self,
        library: &DomainLibrary,
        proteins: &[&Protein],
        progress: &Task<'_>,
    ) -> Result<Vec<DomainHit>, CompositionError>;
}

/// Runs every library, in order, over the full gene list. Hits are relabelled
/// as they are attached and appended after the domains already present.
pub fn annotate(
    genes: Vec<Gene>,
    libraries: &[DomainLibrary],
    engine: &dyn DomainSearch,
    sink: &dyn ProgressSink,
) -> Result<Vec<Gene>, CompositionError> {
    let mut genes = genes;
    for library in libraries {
        let task = Task::start(sink, library.id.clone(), ProgressUnit::Profiles, Some(library.size));
        let hits = {
            let proteins: Vec<&Protein> = genes.iter().map(|gene| &gene.protein).collect();
            engine.search(library, &proteins, &task)?
        };
        task.finish();
        debug!(library = %library.id, version = %library.version, hits = hits.len(), "library done");
        genes = attach_hits(genes, library, hits)?;
    }
    Ok(genes)
}

fn attach_hits(
    genes: Vec<Gene>,
    library: &DomainLibrary,
    hits: Vec<DomainHit>,
) -> Result<Vec<Gene>, CompositionError> {
    let mut found: Vec<Vec<Domain>> = vec![Vec::new(); genes.len()];
    for hit in hits {
        let slot = found.get_mut(hit.protein).ok_or_else(|| {
            CompositionError::DomainSearch(format!(
                "{} returned a hit for unknown protein #{}",
                library.id, hit.protein
            ))
        })?;
        slot.push(Domain {
            name: library.canonical_name(&hit.name),
            start: hit.start,
            end: hit.end,
            library: library.id.clone(),
            pvalue: hit.pvalue,
        });
    }

    Ok(genes
        .into_iter()
        .zip(found)
        .map(|(gene, new)| {
            if new.is_empty() {
                return gene;
            }
            let mut domains = gene.protein.domains.clone();
            domains.extend(new);
            let protein = gene.protein.with_domains(domains);
            gene.with_protein(protein)
        })
        .collect())
}
