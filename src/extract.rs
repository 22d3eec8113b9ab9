//! Writing the contents of a container out to a directory tree.
//!
//! Only regular files are written. Directories come into existence as the
//! parents of the files in them; symbolic links and sockets are skipped. A
//! failure on one path is logged and recorded in `ExtractStats`, and
//! extraction carries on with the next path.

use std::fs;
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::container::Container;
use crate::vfs::FileStat;
use crate::{annotate_io_error, Error, FormatError};

/// Somewhere to put extracted files.
pub trait Destination {
    type File: Write;

    /// Creates (or truncates) the file at `relative`, creating any missing
    /// parent directories.
    fn create_file(&mut self, relative: &Path, stat: &FileStat) -> io::Result<Self::File>;

    /// Called once all of the file's bytes have been written.
    fn finish(&mut self, mut file: Self::File, _stat: &FileStat) -> io::Result<()> {
        file.flush()
    }
}

/// A `Destination` rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirDestination {
    root: PathBuf,
    /// Apply each file's stored permission bits after writing it. Only has an
    /// effect on Unix.
    pub preserve_mode: bool,
}

impl DirDestination {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_owned(), preserve_mode: false }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Destination for DirDestination {
    type File = BufWriter<fs::File>;

    fn create_file(&mut self, relative: &Path, _stat: &FileStat) -> io::Result<Self::File> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.preserve_mode {
            // A previous run may have left a read-only file here.
            match fs::remove_file(&path) {
                Err(err) if err.kind() == io::ErrorKind::NotFound => (),
                result => result?,
            }
        }
        Ok(BufWriter::new(fs::File::create(&path)?))
    }

    fn finish(&mut self, file: Self::File, stat: &FileStat) -> io::Result<()> {
        let file = file.into_inner().map_err(|err| err.into_error())?;
        if self.preserve_mode {
            set_mode(&file, stat.permissions())?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Maps a virtual path to a relative filesystem path.
///
/// Both `/` and `\` separate components; empty and `.` components and a
/// leading drive letter (`C:`) are dropped. A `..` component, or a path with
/// nothing left, is an `UnsafePath`.
pub fn relative_path(virtual_path: &str) -> Result<PathBuf, FormatError> {
    let unsafe_path = || FormatError::UnsafePath { path: virtual_path.to_owned() };
    let bytes = virtual_path.as_bytes();
    let rest = if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        &virtual_path[2..]
    } else {
        virtual_path
    };
    let mut relative = PathBuf::new();
    for component in rest.split(|c| c == '/' || c == '\\') {
        match component {
            "" | "." => (),
            ".." => return Err(unsafe_path()),
            component => relative.push(component),
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(unsafe_path());
    }
    Ok(relative)
}

/// What `extract_path` did with one path.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// A regular file was written with this many bytes.
    File { bytes: u64 },
    /// The path is not a regular file and was not written.
    Skipped,
}

/// Totals from `extract_all`.
#[derive(Debug, Default)]
pub struct ExtractStats {
    pub files: usize,
    pub bytes: u64,
    pub skipped: usize,
    /// Paths that could not be extracted, with the reason.
    pub failures: Vec<(String, Error)>,
}

impl ExtractStats {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extracts one virtual path into `dest`.
pub fn extract_path<R, D>(container: &mut Container<R>, dest: &mut D, path: &str) -> Result<Extracted, Error>
where
    R: Read + Seek,
    D: Destination + ?Sized,
{
    let stat = container.stat(path)?;
    if !stat.is_file {
        debug!("{}: skipping {}", path, stat.kind());
        return Ok(Extracted::Skipped);
    }
    let relative = relative_path(path)?;
    // Fail before creating an empty file for a path with nothing to copy.
    container.content_size(path)?;
    let mut file = dest.create_file(&relative, &stat)
        .map_err(|err| annotate_io_error(err, &format!("creating {}", relative.display())))?;
    let bytes = container.read_content(path, &mut file)?;
    dest.finish(file, &stat)
        .map_err(|err| annotate_io_error(err, &format!("finishing {}", relative.display())))?;
    Ok(Extracted::File { bytes })
}

/// Extracts every regular file in `container` into `dest`. Never stops early:
/// per-path errors are logged and collected in the returned stats.
pub fn extract_all<R, D>(container: &mut Container<R>, dest: &mut D) -> ExtractStats
where
    R: Read + Seek,
    D: Destination + ?Sized,
{
    let paths: Vec<String> = container.directory().paths().map(str::to_owned).collect();
    let mut stats = ExtractStats::default();
    for path in paths {
        match extract_path(container, dest, &path) {
            Ok(Extracted::File { bytes }) => {
                stats.files += 1;
                stats.bytes += bytes;
            }
            Ok(Extracted::Skipped) => stats.skipped += 1,
            Err(err) => {
                warn!("{}: {}", path, err);
                stats.failures.push((path, err));
            }
        }
    }
    info!("extracted {} files ({} bytes), skipped {}, failed {}",
        stats.files, stats.bytes, stats.skipped, stats.failures.len());
    stats
}
