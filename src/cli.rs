use std::{ffi::OsString, path::PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::{
    document::{MalformedPolicy, OpenMode, ReplaceKey},
    ingestion::IngestOptions,
};

/// Default writer budget, in bytes.
pub const DEFAULT_MEMORY_BUDGET: usize = 512 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "clefindex",
    about = "Index a CLEF-style DOC/DOCNO/TEXT corpus into a full-text index"
)]
pub struct Cli {
    /// Directory of the index to build or update
    #[arg(
        long,
        env = "CLEFINDEX_INDEX",
        default_value = "index",
        allow_hyphen_values = true
    )]
    pub index: PathBuf,

    /// Corpus file or directory to index
    #[arg(long, allow_hyphen_values = true)]
    pub docs: PathBuf,

    /// Update an existing index instead of rebuilding it from scratch
    #[arg(long)]
    pub update: bool,

    /// Field that identifies the previous version of a document on update
    #[arg(
        long,
        value_enum,
        env = "CLEFINDEX_REPLACE_KEY",
        default_value_t = ReplaceKey::Path
    )]
    pub replace_key: ReplaceKey,

    /// What to do with corpus files that fail to parse
    #[arg(
        long,
        value_enum,
        env = "CLEFINDEX_ON_MALFORMED",
        default_value_t = MalformedPolicy::Skip
    )]
    pub on_malformed: MalformedPolicy,

    /// Index writer memory budget in bytes
    #[arg(long, default_value_t = DEFAULT_MEMORY_BUDGET)]
    pub memory_budget: usize,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn open_mode(&self) -> OpenMode {
        if self.update {
            OpenMode::IncrementalUpdate
        } else {
            OpenMode::FreshBuild
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            mode: self.open_mode(),
            replace_key: self.replace_key,
            on_malformed: self.on_malformed,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "qaclef-convert",
    about = "Extract QA@CLEF questions into a plain-text corpus"
)]
pub struct ConvertCli {
    /// Topic file to read
    #[arg(long, default_value = crate::qa::DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Text file to write, one question per line
    #[arg(long, default_value = crate::qa::DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Long options of [`Cli`] whose value is the next argument.
const VALUE_FLAGS: [&str; 5] = [
    "--index",
    "--docs",
    "--replace-key",
    "--on-malformed",
    "--memory-budget",
];

/// Rewrite the single-dash spellings `-index`, `-docs` and `-update` into
/// their `--` forms so older invocations keep working.
///
/// An argument in value position is passed through untouched, so a corpus
/// directory literally named `-docs` survives.
pub fn normalize_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut expects_value = false;
    let mut out = Vec::new();
    for arg in args.into_iter().map(Into::into) {
        if expects_value {
            expects_value = false;
            out.push(arg);
            continue;
        }
        let arg: OsString = match arg.to_str() {
            Some("-index") => "--index".into(),
            Some("-docs") => "--docs".into(),
            Some("-update") => "--update".into(),
            _ => arg,
        };
        expects_value = arg
            .to_str()
            .is_some_and(|flag| VALUE_FLAGS.contains(&flag));
        out.push(arg);
    }
    out
}

pub fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("CLEFINDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
