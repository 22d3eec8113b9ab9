//! Extractor for the virtual filesystem embedded in executables produced by
//! the `pkg` JavaScript bundler.
//!
//! A packaged executable is a native stub followed by a textual "prelude"
//! (JavaScript source) and a binary "payload". There is no fixed header. The
//! prelude carries four integer offsets as `var NAME = '<digits>'` literals, a
//! JSON directory table mapping each virtual path to `[offset, size]` records,
//! and the entrypoint path. The payload holds the raw file bytes and a JSON
//! stat record for every path.
//!
//! # Reading
//!
//! `Container::read` takes any `Read + Seek` source, locates the offsets, and
//! loads the directory table. After that `Container::stat` and
//! `Container::read_content` do random access into the payload.
//!
//! # Extraction
//!
//! `extract::extract_all` writes every regular file to a `Destination`,
//! usually a `DirDestination` rooted in a local directory.
//!
//! # References
//!
//! * <https://github.com/vercel/pkg/blob/main/prelude/bootstrap.js>

use std::fmt;
use std::io;

pub mod container;
pub mod extract;
pub mod prelude;
pub mod scan;
pub mod vfs;

pub use container::Container;
pub use vfs::{FileStat, StorageRecord, StoreKind, VirtualDirectory, VirtualEntry};

/// Adds a prefix to the message of an `io::Error`.
pub(crate) fn annotate_io_error(err: io::Error, msg: &str) -> io::Error {
    io::Error::new(err.kind(), format!("{}: {}", msg, err))
}

/// Renders a byte token for error messages.
fn show_token(token: &[u8]) -> String {
    format!("{:?}", String::from_utf8_lossy(token))
}

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Format(FormatError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Format(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Error::Format(err)
    }
}

impl Error {
    /// Returns the `FormatError`, if this is one.
    pub fn format_error(&self) -> Option<&FormatError> {
        match self {
            Error::Format(err) => Some(err),
            Error::Io(_) => None,
        }
    }
}

/// A container format error.
#[derive(Debug, PartialEq)]
pub enum FormatError {
    /// The source ended before `token` was found.
    EndOfStream { token: Vec<u8> },
    /// A search token or block delimiter was empty.
    EmptyToken,
    /// The prelude has no `var <name> = '` declaration.
    NotFound { name: String },
    /// A terminator (closing quote, line) was missing at the end of the source.
    Truncated { what: &'static str },
    /// A named variable's value is not a non-negative base-10 integer.
    MalformedInteger { name: String, text: String },
    /// The directory table line is not the expected JSON.
    MalformedDirectory { message: String },
    /// A path's stat record is not the expected JSON.
    MalformedStat { path: String, message: String },
    /// The virtual path is not in the directory table.
    PathNotFound { path: String },
    /// The path has no Stat record.
    NoStatRecord { path: String },
    /// The path has neither a Blob nor a Content record.
    NoContent { path: String },
    /// The source ended before `expected` bytes of a record could be read.
    ShortRead { path: String, expected: u64, actual: u64 },
    /// The entrypoint line is empty.
    MissingEntrypoint,
    /// The entrypoint is not a path in the directory table.
    EntrypointNotFound { entrypoint: String },
    /// A storage record extends past the end of the payload.
    RecordOutOfBounds { path: String, kind: StoreKind, offset: u64, size: u64, payload_size: u64 },
    /// A virtual path cannot be mapped below the extraction root.
    UnsafePath { path: String },
}

impl std::error::Error for FormatError {}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FormatError::EndOfStream { token } =>
                write!(f, "reached end of input while looking for {}", show_token(token)),
            FormatError::EmptyToken =>
                write!(f, "search token is empty"),
            FormatError::NotFound { name } =>
                write!(f, "variable {} not found in prelude", name),
            FormatError::Truncated { what } =>
                write!(f, "input truncated: missing {}", what),
            FormatError::MalformedInteger { name, text } =>
                write!(f, "variable {} has malformed integer value {:?}", name, text),
            FormatError::MalformedDirectory { message } =>
                write!(f, "malformed directory table: {}", message),
            FormatError::MalformedStat { path, message } =>
                write!(f, "{}: malformed stat record: {}", path, message),
            FormatError::PathNotFound { path } =>
                write!(f, "{}: no such path in directory table", path),
            FormatError::NoStatRecord { path } =>
                write!(f, "{}: no stat record", path),
            FormatError::NoContent { path } =>
                write!(f, "{}: no blob or content record", path),
            FormatError::ShortRead { path, expected, actual } =>
                write!(f, "{}: short read: expected {} bytes, got {}", path, expected, actual),
            FormatError::MissingEntrypoint =>
                write!(f, "entrypoint is empty"),
            FormatError::EntrypointNotFound { entrypoint } =>
                write!(f, "entrypoint {} is not in the directory table", entrypoint),
            FormatError::RecordOutOfBounds { path, kind, offset, size, payload_size } =>
                write!(f, "{}: {:?} record at offset {} with size {} exceeds payload size {}", path, kind, offset, size, payload_size),
            FormatError::UnsafePath { path } =>
                write!(f, "{}: path escapes the extraction root", path),
        }
    }
}
