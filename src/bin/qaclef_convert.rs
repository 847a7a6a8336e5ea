use std::process::ExitCode;

use clap::Parser;
use clefindex::{
    cli::{self, ConvertCli},
    qa,
};

fn main() -> ExitCode {
    let cli = ConvertCli::parse();
    cli::init_tracing(cli.verbose, cli.quiet);

    match qa::convert(&cli.input, &cli.output) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}: {e}", cli.input.display());
            ExitCode::FAILURE
        }
    }
}
