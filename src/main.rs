//! dmsieve: split, filter and extract fields from concatenated
//! `dm_log_packet` XML trace streams.
//!
//! A lexical splitter carves the input into per-packet fragments, a pool of
//! worker threads parses them and runs the configured mode's action, and a
//! single in-order executor serializes the side effects back into input
//! order. See `lifecycle` for the orchestration.

mod actions;
mod cli;
mod config;
mod error;
mod executor;
mod input;
mod lifecycle;
mod queue;
mod scan;
mod sorter;
mod splitter;
mod state;
mod timefmt;
mod worker;
mod xml;

use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::Path;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use cli::Cli;
use config::SieveConfig;
use error::{Result, SieveError};
use input::InputSource;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let fatal = !matches!(
                err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            );
            let _ = err.print();
            return if fatal {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("dmsieve: error [{}]: {}", err.kind_label(), err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = SieveConfig::from_cli(&cli)?;
    let sources = open_inputs(&cli.files)?;
    let output = open_output(cli.output.as_deref())?;
    lifecycle::run(config, sources, output)
}

fn open_inputs(files: &[String]) -> Result<Vec<InputSource>> {
    if files.is_empty() {
        return Ok(vec![InputSource::new("stdin", Box::new(io::stdin()))]);
    }
    files
        .iter()
        .map(|name| {
            let file = File::open(name).map_err(|e| {
                SieveError::argument(format!("Failed to open input file: \"{name}\" ({e})"))
            })?;
            Ok(InputSource::new(name.clone(), Box::new(file)))
        })
        .collect()
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write + Send>> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                SieveError::argument(format!(
                    "Failed to open output file: \"{}\" ({e})",
                    path.display()
                ))
            })?;
            Ok(Box::new(LineWriter::new(file)))
        }
        None => Ok(Box::new(LineWriter::new(io::stdout()))),
    }
}
