use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bgc_compositions::annotate::{LibraryPaths, standard_libraries};
use bgc_compositions::app::{App, RunOptions};
use bgc_compositions::config::ConfigLoader;
use bgc_compositions::error::CompositionError;
use bgc_compositions::hmmer::Hmmsearch;
use bgc_compositions::matrix::CompositionMode;
use bgc_compositions::output::{JsonOutput, LogProgress, OutputMode, print_summary};

#[derive(Parser)]
#[command(name = "bgc-comp")]
#[command(about = "Build protein-domain composition matrices for representative BGCs")]
#[command(version, author)]
struct Cli {
    /// Label table with `gcf_representative` and `gcf_id` columns
    #[arg(long)]
    input: Utf8PathBuf,

    /// Directory receiving labels.tsv, domains.tsv and compositions.npz
    #[arg(long)]
    output: Utf8PathBuf,

    #[arg(long)]
    pfam: Utf8PathBuf,

    #[arg(long)]
    tigrfam: Utf8PathBuf,

    #[arg(long)]
    smcogs: Utf8PathBuf,

    #[arg(long)]
    nrp_pks: Utf8PathBuf,

    #[arg(long)]
    hmm_detect: Utf8PathBuf,

    #[arg(long)]
    config: Option<String>,

    /// Worker count handed to hmmsearch
    #[arg(long)]
    cpus: Option<usize>,

    #[arg(long, value_enum, default_value_t = CompositionMode::Counts)]
    composition: CompositionMode,

    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<CompositionError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CompositionError) -> u8 {
    match error {
        CompositionError::MissingGeneIdentifier { .. }
        | CompositionError::MissingTranslation { .. }
        | CompositionError::UnlabeledCluster(_)
        | CompositionError::LabelTableRead(_)
        | CompositionError::LabelTableParse(_)
        | CompositionError::MissingColumn(_)
        | CompositionError::RecordParse { .. }
        | CompositionError::ConfigRead(_)
        | CompositionError::ConfigParse(_)
        | CompositionError::InvalidRelabel(_)
        | CompositionError::MissingLibrary(_) => 2,
        CompositionError::MissingTool(_)
        | CompositionError::DomainSearch(_)
        | CompositionError::DomainTableParse(_) => 3,
        CompositionError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let resolved = ConfigLoader::resolve(cli.config.as_deref())?;
    let cpus = cli.cpus.unwrap_or(resolved.cpus);
    if cpus == 0 {
        return Err(CompositionError::ConfigParse("--cpus must be at least 1".to_string()).into());
    }

    let engine = match &resolved.hmmsearch {
        Some(program) => Hmmsearch::with_program(program.as_std_path(), cpus),
        None => Hmmsearch::new(cpus),
    };
    let program = engine.program()?;
    debug!(program = %program.display(), version = ?engine.version(), "domain search engine");

    let libraries = standard_libraries(&LibraryPaths {
        pfam: cli.pfam,
        tigrfam: cli.tigrfam,
        smcogs: cli.smcogs,
        nrp_pks: cli.nrp_pks,
        hmm_detect: cli.hmm_detect,
    })?;
    let options = RunOptions {
        input: cli.input,
        output: cli.output,
        libraries,
        sources: resolved.sources,
        composition: cli.composition,
    };
    info!(
        archives = options.sources.len(),
        cpus = engine.cpus(),
        composition = %options.composition,
        "starting run"
    );

    let app = App::new(engine);
    match output_mode {
        OutputMode::NonInteractive => {
            let summary = app.run(&options, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let summary = app.run(&options, &LogProgress::new())?;
            print_summary(&summary);
        }
    }
    Ok(())
}
