//! Runtime configuration assembled from the command line.

use std::path::Path;

use regex::Regex;

use crate::cli::Cli;
use crate::error::{Result, SieveError};

pub const THREAD_DEFAULT: usize = 16;
pub const THREAD_LIMIT: usize = 256;

#[derive(Debug, Clone)]
pub enum Mode {
    /// Named extractors, first match wins in the order given.
    Extract(Vec<String>),
    /// Passthrough for packets inside any of the inclusive second ranges.
    Range(Vec<(i64, i64)>),
    /// Passthrough for packets whose type_id matches the whole-string
    /// anchored pattern.
    Filter(Regex),
    /// Passthrough dropping packets whose timestamp regresses.
    Dedup,
    /// Passthrough through a reorder window with the given µs tolerance.
    Reorder(i64),
}

#[derive(Debug, Clone)]
pub struct SieveConfig {
    pub workers: usize,
    pub mode: Mode,
}

impl SieveConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if cli.thread < 1 || cli.thread > THREAD_LIMIT as i64 {
            return Err(SieveError::argument(
                "Invalid thread number. It should be between 1 and 256.",
            ));
        }

        let mut modes: Vec<Mode> = Vec::new();
        if let Some(names) = &cli.extract {
            modes.push(Mode::Extract(
                names.split(',').map(str::to_string).collect(),
            ));
        }
        if let Some(path) = &cli.range {
            modes.push(Mode::Range(read_range_file(path)?));
        }
        if let Some(pattern) = &cli.filter {
            modes.push(Mode::Filter(compile_type_pattern(pattern)?));
        }
        if cli.dedup {
            modes.push(Mode::Dedup);
        }
        if let Some(tolerance) = cli.reorder {
            modes.push(Mode::Reorder(tolerance));
        }

        let mode = match (modes.pop(), modes.is_empty()) {
            (Some(mode), true) => mode,
            _ => {
                return Err(SieveError::argument(
                    "exactly one of --extract, --range, --filter, --dedup or --reorder is required",
                ));
            }
        };

        Ok(SieveConfig {
            workers: cli.thread as usize,
            mode,
        })
    }
}

/// Whole-string match semantics for `--filter`, so `LTE` does not quietly
/// select every `LTE_*` packet.
fn compile_type_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| SieveError::argument(format!("invalid --filter pattern: {e}")))
}

/// Range files hold whitespace-separated `<start> <end>` unix-second pairs.
/// Reading stops silently at the first token that is not an integer;
/// a dangling final token is ignored.
fn read_range_file(path: &Path) -> Result<Vec<(i64, i64)>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        SieveError::argument(format!(
            "Failed to open range file: \"{}\" ({e})",
            path.display()
        ))
    })?;

    let mut ranges = Vec::new();
    let mut tokens = text.split_whitespace();
    loop {
        let Some(start) = tokens.next().and_then(|t| t.parse::<i64>().ok()) else {
            break;
        };
        let Some(end) = tokens.next().and_then(|t| t.parse::<i64>().ok()) else {
            break;
        };
        ranges.push((start, end));
    }
    Ok(ranges)
}
