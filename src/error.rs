//! Error taxonomy for the whole pipeline.
//!
//! Every failure that can abort a run falls into one of four kinds:
//! command-line/argument problems, malformed input data, I/O failures from
//! the underlying streams, and internal invariant violations. The kind label
//! is what `main` prints next to the message, so diagnostics stay greppable.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SieveError>;

#[derive(Debug, Error)]
pub enum SieveError {
    /// Malformed command line, unusable paths, out-of-range parameters.
    #[error("{0}")]
    Argument(String),

    /// The input stream violated the packet format (malformed XML, missing
    /// required fields).
    #[error("{0}")]
    Input(String),

    /// Read/write failure on an input or output stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An internal invariant did not hold. Always fatal, never expected.
    #[error("{0}")]
    Bug(String),
}

impl SieveError {
    pub fn argument(message: impl Into<String>) -> Self {
        SieveError::Argument(message.into())
    }

    pub fn input(message: impl Into<String>) -> Self {
        SieveError::Input(message.into())
    }

    pub fn bug(message: impl Into<String>) -> Self {
        SieveError::Bug(message.into())
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            SieveError::Argument(_) => "argument",
            SieveError::Input(_) => "input",
            SieveError::Io(_) => "io",
            SieveError::Bug(_) => "bug",
        }
    }

    /// Attach the source coordinates of a fragment to an input error.
    /// Other kinds pass through untouched.
    pub fn at_source(self, file: &str, start_line: u64, end_line: u64) -> Self {
        match self {
            SieveError::Input(message) => SieveError::Input(format!(
                "{message}\nInput file \"{file}\" at line {start_line}-{end_line}"
            )),
            other => other,
        }
    }
}
