use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading AMBER-family input files.
///
/// Implementors parse one file format (parameter-topology, restart
/// coordinates) into its in-memory record. The trait supplies path-based
/// reading on top of the format-specific [`read_from`](Self::read_from).
pub trait AmberFile {
    /// The record produced by parsing.
    type Record;

    /// The error type for parsing and I/O failures.
    type Error: Error + From<io::Error>;

    /// Reads a record from a buffered reader.
    ///
    /// # Arguments
    ///
    /// * `reader` - The buffered reader to read from.
    ///
    /// # Return
    ///
    /// Returns the parsed and validated record.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<Self::Record, Self::Error>;

    /// Reads a record from a file path.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the file to read.
    ///
    /// # Return
    ///
    /// Returns the parsed and validated record.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self::Record, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Reads a record from an in-memory string.
    fn read_from_str(content: &str) -> Result<Self::Record, Self::Error> {
        let mut reader = content.as_bytes();
        Self::read_from(&mut reader)
    }
}
