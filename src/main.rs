//! pkgunpack extracts the files embedded in an executable built by the `pkg`
//! JavaScript bundler.
//!
//! # Extraction
//!
//! ```sh
//! pkgunpack app.exe outdir
//! ```
//!
//! # Listing
//!
//! ```sh
//! pkgunpack --list app.exe
//! ```
//!
//! # Exit status
//!
//! Exit status is 0 if there was no error, or 1 if the input could not be
//! parsed or any file failed to extract.
//!
//! # Logging
//!
//! Messages go to stderr. `--verbose` enables debug messages; `RUST_LOG`
//! overrides the level entirely.

use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use log::error;

use pkgunpack::extract::{self, DirDestination};
use pkgunpack::Container;

/// An `Error` annotated with a `Path`.
#[derive(Debug)]
struct PathError {
    path: PathBuf,
    err: pkgunpack::Error,
}

impl PathError {
    fn new<P: AsRef<Path>>(path: P, err: pkgunpack::Error) -> Self {
        Self { path: path.as_ref().to_owned(), err }
    }
}

impl std::error::Error for PathError {}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.err)
    }
}

/// Opens and parses the package at `input_path`. Any error gets annotated
/// with `input_path`.
fn open(input_path: &Path) -> Result<Container<io::BufReader<File>>, PathError> {
    (|| -> Result<_, pkgunpack::Error> {
        let input = File::open(input_path)?;
        Ok(Container::read(io::BufReader::new(input))?)
    })()
        .map_err(|err| PathError::new(input_path, err))
}

/// Prints every path with its stat record, marking the entrypoint.
fn list(input_path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let mut container = open(input_path)?;
    let paths: Vec<String> = container.directory().paths().map(str::to_owned).collect();
    let stdout = io::stdout();
    let mut w = io::BufWriter::new(stdout.lock());
    let mut ok = true;
    for path in paths {
        let marker = if path == container.entrypoint() { "*" } else { " " };
        match container.stat(&path) {
            Ok(stat) => writeln!(w, "{} {} {}", stat, marker, path)?,
            Err(err) => {
                error!("{}: {}: {}", input_path.display(), path, err);
                ok = false;
            }
        }
    }
    w.flush()?;
    Ok(ok)
}

/// Extracts every regular file into `output_path`. Returns false if any file
/// failed.
fn unpack(input_path: &Path, output_path: &Path, preserve_mode: bool) -> Result<bool, Box<dyn std::error::Error>> {
    let mut container = open(input_path)?;
    let mut dest = DirDestination::new(output_path);
    dest.preserve_mode = preserve_mode;
    let stats = extract::extract_all(&mut container, &mut dest);
    for (path, err) in &stats.failures {
        error!("{}: {}: {}", input_path.display(), path, err);
    }
    Ok(stats.is_complete())
}

/// Prints a usage message to `w`.
fn print_usage<W: Write + ?Sized>(w: &mut W) -> io::Result<()> {
    write!(w, "\
Usage: {} [OPTION]... INPUT [OUTPUT_DIR]
Extract the files embedded in an executable built by pkg.

  -l, --list           list embedded paths instead of extracting
  -p, --preserve-mode  apply stored permission bits to extracted files
  -v, --verbose        show debug messages
  -h, --help           show this help
", env!("CARGO_PKG_NAME"))
}

#[derive(Debug, Default)]
struct Options {
    list: bool,
    preserve_mode: bool,
    verbose: bool,
    free: Vec<OsString>,
}

fn parse_args() -> Result<Option<Options>, lexopt::Error> {
    use lexopt::prelude::*;

    let mut opts = Options::default();
    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Short('l') | Long("list") => opts.list = true,
            Short('p') | Long("preserve-mode") => opts.preserve_mode = true,
            Short('v') | Long("verbose") => opts.verbose = true,
            Short('h') | Long("help") => return Ok(None),
            Value(value) => opts.free.push(value),
            _ => return Err(arg.unexpected()),
        }
    }
    Ok(Some(opts))
}

fn main() {
    let opts = match parse_args() {
        Ok(Some(opts)) => opts,
        Ok(None) => {
            let _ = print_usage(&mut io::stdout());
            return;
        }
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    };

    let default_level = if opts.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let result = match (opts.list, opts.free.as_slice()) {
        (true, [input]) => list(Path::new(input)),
        (false, [input, output]) => unpack(Path::new(input), Path::new(output), opts.preserve_mode),
        _ => {
            let _ = print_usage(&mut io::stderr());
            eprintln!("\nNeed INPUT and OUTPUT_DIR arguments, or --list and INPUT");
            process::exit(1);
        }
    };

    match result {
        Ok(true) => (),
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    }
}
