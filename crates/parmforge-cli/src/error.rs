use parmforge::engine::error::BuildError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse file '{path}': {source}", path = path.display())]
    FileParsing {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to build '{path}': {source}", path = path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: BuildError,
    },

    #[error("Inputs '{first}' and '{second}' would both write '{output}'", first = first.display(), second = second.display(), output = output.display())]
    DuplicateOutput {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },

    #[error("{failed} of {total} input file(s) failed to build")]
    Batch { failed: usize, total: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize system: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
