use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::{Parser, error::ErrorKind};
use clefindex::{
    IngestOptions,
    IngestReport,
    Indexer,
    SearchIndex,
    cli::{self, Cli},
    error::{Error, Result},
};
use serde::Serialize;

#[derive(Serialize)]
struct RunSummary<'a> {
    index: &'a PathBuf,
    docs: &'a PathBuf,
    options: IngestOptions,
    report: &'a IngestReport,
    elapsed_ms: u64,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(cli::normalize_legacy_flags(
        std::env::args_os(),
    )) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }
                _ => ExitCode::FAILURE,
            };
        }
    };
    cli::init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    check_readable(&cli.docs)?;

    let start = Instant::now();
    println!("Indexing to directory '{}'...", cli.index.display());

    let index = SearchIndex::open(&cli.index)?;
    let options = cli.ingest_options();
    let session = index.session(options.mode, cli.memory_budget)?;

    let mut indexer = Indexer::new(session, options);
    indexer.index_tree(&cli.docs)?;
    let report = indexer.finish()?;

    let elapsed_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        files = report.files_indexed,
        skipped = report.files_skipped(),
        records = report.records_indexed(),
        "indexing complete"
    );

    if cli.json {
        let summary = RunSummary {
            index: &cli.index,
            docs: &cli.docs,
            options,
            report: &report,
            elapsed_ms,
        };
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{elapsed_ms} total milliseconds");
    }
    Ok(())
}

/// The corpus root must exist and be readable before any index I/O.
fn check_readable(path: &Path) -> Result<()> {
    let unreadable = || Error::UnreadableInput(path.to_path_buf());
    let meta = std::fs::metadata(path).map_err(|_| unreadable())?;
    if meta.is_dir() {
        std::fs::read_dir(path).map_err(|_| unreadable())?;
    } else {
        std::fs::File::open(path).map_err(|_| unreadable())?;
    }
    Ok(())
}
