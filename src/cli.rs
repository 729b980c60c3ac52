//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "dmsieve")]
#[command(about = "Split, filter and extract fields from concatenated dm_log_packet XML traces")]
#[command(
    long_about = "Split, filter and extract fields from concatenated dm_log_packet XML traces.\n\n\
    The input is a flat sequence of top-level XML documents, one packet each. \
    Exactly one mode option selects what happens to them; output order always \
    follows input order except under --reorder."
)]
#[command(version)]
pub struct Cli {
    /// Input files (stdin if not specified)
    pub files: Vec<String>,

    /// Number of extractor worker threads (1-256)
    #[arg(
        short = 'j',
        long = "thread",
        value_name = "N",
        default_value_t = crate::config::THREAD_DEFAULT as i64,
        allow_negative_numbers = true
    )]
    pub thread: i64,

    /// Output file (stdout if not specified)
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Comma-separated extractor names; first match wins in the order given
    #[arg(long = "extract", value_name = "NAMES", help_heading = "Modes")]
    pub extract: Option<String>,

    /// Echo packets whose timestamp falls in any "<start> <end>" unix-second
    /// pair listed in the file
    #[arg(long = "range", value_name = "PATH", help_heading = "Modes")]
    pub range: Option<PathBuf>,

    /// Echo packets whose type_id matches the regex (whole-string match)
    #[arg(long = "filter", value_name = "REGEX", help_heading = "Modes")]
    pub filter: Option<String>,

    /// Drop packets whose timestamp regresses below the newest one emitted
    #[arg(long = "dedup", help_heading = "Modes")]
    pub dedup: bool,

    /// Sort near-ordered packets through a bounded window with the given
    /// out-of-order tolerance in microseconds
    #[arg(
        long = "reorder",
        value_name = "MICROSECONDS",
        allow_negative_numbers = true,
        help_heading = "Modes"
    )]
    pub reorder: Option<i64>,
}
