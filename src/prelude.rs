//! Locating the payload offsets and the directory table in the prelude.
//!
//! The prelude is JavaScript source written by the packager. It starts with
//! four declarations like
//!
//! ```text
//! var PAYLOAD_POSITION = '12345678' | 0;
//! ```
//!
//! and, further in, a call of the bootstrap function whose remaining arguments
//! are the directory table and the entrypoint, one per line:
//!
//! ```text
//! (function (REQUIRE_COMMON, VIRTUAL_FILESYSTEM, DEFAULT_ENTRYPOINT) {
//!   ...
//! })(function (exports) {
//!   ...
//! }, {
//!   ...
//! },
//! {"/snapshot/app/index.js":{"0":[0,42],"3":[42,120]}}
//! ,
//! "/snapshot/app/index.js"
//! ```
//!
//! Rather than parse JavaScript, the loader skips a fixed sequence of tokens,
//! balanced blocks and lines described by a `Layout`.

use std::io::{Read, Seek};

use log::debug;

use crate::scan::{self, PeekReader};
use crate::vfs::VirtualDirectory;
use crate::{annotate_io_error, Error, FormatError};

/// The four offsets declared at the top of the prelude, all absolute
/// positions or lengths within the packaged executable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Offsets {
    pub payload_position: u64,
    pub payload_size: u64,
    pub prelude_position: u64,
    pub prelude_size: u64,
}

impl Offsets {
    /// Reads the four declarations, in order, starting at absolute offset 0.
    pub fn read<R: Read + Seek>(r: &mut PeekReader<R>) -> Result<Self, Error> {
        r.seek_to(0)
            .map_err(|err| annotate_io_error(err, "seeking to start of input"))?;
        let offsets = Self {
            payload_position: read_named_integer(r, "PAYLOAD_POSITION")?,
            payload_size: read_named_integer(r, "PAYLOAD_SIZE")?,
            prelude_position: read_named_integer(r, "PRELUDE_POSITION")?,
            prelude_size: read_named_integer(r, "PRELUDE_SIZE")?,
        };
        debug!("{:?}", offsets);
        Ok(offsets)
    }
}

/// Finds the next `var <name> = '<value>'` and parses `<value>`, ignoring
/// surrounding whitespace, as a non-negative base-10 integer.
pub fn read_named_integer<R: Read>(r: &mut PeekReader<R>, name: &str) -> Result<u64, Error> {
    let prefix = format!("var {} = '", name);
    match scan::search(r, prefix.as_bytes()) {
        Err(Error::Format(FormatError::EndOfStream { .. })) =>
            return Err(Error::Format(FormatError::NotFound { name: name.to_owned() })),
        result => result?,
    }
    let mut value = r.read_until(b'\'')
        .map_err(|err| annotate_io_error(err, "reading variable value"))?;
    if value.pop() != Some(b'\'') {
        return Err(Error::Format(FormatError::Truncated { what: "closing quote" }));
    }
    let text = String::from_utf8_lossy(&value);
    let malformed = || FormatError::MalformedInteger { name: name.to_owned(), text: text.to_string() };
    // i64 first, so that a negative value is reported as malformed rather than
    // as an overflow.
    let n: i64 = text.trim().parse().map_err(|_| malformed())?;
    let n = u64::try_from(n).map_err(|_| malformed())?;
    Ok(n)
}

/// One step in skipping from the start of the prelude to the data.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    /// Skip past the next occurrence of the token.
    Token(&'static [u8]),
    /// Skip past the next balanced block.
    Block { left: &'static [u8], right: &'static [u8] },
    /// Discard the rest of the current line, newline included.
    Line,
}

/// Where the directory table and entrypoint lines sit in the prelude.
///
/// The directory table is the line after `before_directory` is applied at
/// `prelude_position`; the entrypoint is the line after `before_entrypoint` is
/// applied following the directory table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Layout {
    pub before_directory: &'static [Step],
    pub before_entrypoint: &'static [Step],
}

impl Layout {
    /// The prelude as written by pkg: two `function` keywords, the body of
    /// the second function, the brace block after it, and the rest of that
    /// line. One separator line sits between the table and the entrypoint.
    pub const PKG: Layout = Layout {
        before_directory: &[
            Step::Token(b"function"),
            Step::Token(b"function"),
            Step::Block { left: b"{", right: b"}" },
            Step::Block { left: b"{", right: b"}" },
            Step::Line,
        ],
        before_entrypoint: &[Step::Line],
    };
}

impl Default for Layout {
    fn default() -> Self {
        Layout::PKG
    }
}

/// Applies `steps` in order.
fn skip<R: Read>(r: &mut PeekReader<R>, steps: &[Step]) -> Result<(), Error> {
    for step in steps {
        debug!("skip {:?}", step);
        match *step {
            Step::Token(token) => scan::search(r, token)?,
            Step::Block { left, right } => {
                scan::read_balanced(r, left, right)?;
            }
            Step::Line => {
                read_required_line(r, "line")?;
            }
        }
    }
    Ok(())
}

/// Reads a line, failing if the input has already ended. A final line
/// without a newline is accepted.
fn read_required_line<R: Read>(r: &mut PeekReader<R>, what: &'static str) -> Result<Vec<u8>, Error> {
    let line = r.read_line()
        .map_err(|err| annotate_io_error(err, "reading prelude line"))?;
    if line.is_empty() {
        return Err(Error::Format(FormatError::Truncated { what }));
    }
    Ok(line)
}

/// Decodes the entrypoint line. The packager writes it as a JSON string
/// literal, so escapes are decoded the same way as the directory table keys.
/// A line that is not a JSON string only has its whitespace and one pair of
/// surrounding double quotes stripped.
fn parse_entrypoint(line: &[u8]) -> Result<String, FormatError> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    let entrypoint = match serde_json::from_str::<String>(text) {
        Ok(decoded) => decoded,
        Err(_) => {
            let text = text.strip_prefix('"').unwrap_or(text);
            let text = text.strip_suffix('"').unwrap_or(text);
            text.trim().to_owned()
        }
    };
    if entrypoint.trim().is_empty() {
        return Err(FormatError::MissingEntrypoint);
    }
    Ok(entrypoint)
}

/// Reads the directory table and entrypoint. `r` must be positioned at the
/// start of the prelude.
pub fn read_directory_table<R: Read>(r: &mut PeekReader<R>, layout: &Layout) -> Result<(VirtualDirectory, String), Error> {
    skip(r, layout.before_directory)?;
    let line = read_required_line(r, "directory table")?;
    let directory = VirtualDirectory::from_json(&line)?;
    debug!("directory table has {} entries", directory.len());

    skip(r, layout.before_entrypoint)?;
    let line = read_required_line(r, "entrypoint")?;
    let entrypoint = parse_entrypoint(&line)?;
    debug!("entrypoint {:?}", entrypoint);

    Ok((directory, entrypoint))
}
