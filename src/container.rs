//! Random access to the payload of a packaged executable.

use std::io::{self, Read, Seek, Write};

use log::debug;

use crate::prelude::{self, Layout, Offsets};
use crate::scan::PeekReader;
use crate::vfs::{FileStat, StorageRecord, StoreKind, VirtualDirectory, VirtualEntry};
use crate::{annotate_io_error, Error, FormatError};

/// A parsed packaged executable.
///
/// The offsets, directory table and entrypoint are fixed by `read`. Every
/// accessor repositions the one read cursor, so they all take `&mut self`; to
/// read in parallel, open the source once per `Container`.
pub struct Container<R> {
    reader: PeekReader<R>,
    offsets: Offsets,
    directory: VirtualDirectory,
    entrypoint: String,
}

impl<R: Read + Seek> Container<R> {
    /// Parses `source` as a pkg executable.
    pub fn read(source: R) -> Result<Self, Error> {
        Self::read_with_layout(source, &Layout::PKG)
    }

    /// Parses `source`, finding the directory table with a custom `layout`.
    pub fn read_with_layout(source: R, layout: &Layout) -> Result<Self, Error> {
        let mut reader = PeekReader::new(source);
        let offsets = Offsets::read(&mut reader)?;

        reader.seek_to(offsets.prelude_position)
            .map_err(|err| annotate_io_error(err, "seeking to prelude"))?;
        let (directory, entrypoint) = prelude::read_directory_table(&mut reader, layout)?;

        directory.check_bounds(offsets.payload_size)?;
        if !directory.contains(&entrypoint) {
            return Err(Error::Format(FormatError::EntrypointNotFound { entrypoint }));
        }

        Ok(Self { reader, offsets, directory, entrypoint })
    }

    pub fn offsets(&self) -> &Offsets {
        &self.offsets
    }

    pub fn directory(&self) -> &VirtualDirectory {
        &self.directory
    }

    pub fn entrypoint(&self) -> &str {
        &self.entrypoint
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn entry(&self, path: &str) -> Result<&VirtualEntry, FormatError> {
        self.directory.get(path)
            .ok_or_else(|| FormatError::PathNotFound { path: path.to_owned() })
    }

    /// Positions the cursor at the start of `record`.
    fn seek_record(&mut self, record: &StorageRecord) -> io::Result<()> {
        // check_bounds has already ruled out overflow within the payload.
        let offset = self.offsets.payload_position.checked_add(record.offset)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "record offset overflows"))?;
        self.reader.seek_to(offset)?;
        Ok(())
    }

    /// Reads and decodes the stat record of `path`.
    pub fn stat(&mut self, path: &str) -> Result<FileStat, Error> {
        let record = self.entry(path)?.get(StoreKind::Stat)
            .ok_or_else(|| FormatError::NoStatRecord { path: path.to_owned() })?;
        self.seek_record(&record)
            .map_err(|err| annotate_io_error(err, "seeking to stat record"))?;

        let mut buf = Vec::new();
        (&mut self.reader).take(record.size).read_to_end(&mut buf)
            .map_err(|err| annotate_io_error(err, "reading stat record"))?;
        if (buf.len() as u64) < record.size {
            return Err(Error::Format(FormatError::ShortRead {
                path: path.to_owned(),
                expected: record.size,
                actual: buf.len() as u64,
            }));
        }
        Ok(FileStat::from_json(path, &buf)?)
    }

    /// The number of bytes `read_content` would copy for `path`.
    pub fn content_size(&self, path: &str) -> Result<u64, Error> {
        let record = self.entry(path)?.content_record()
            .ok_or_else(|| FormatError::NoContent { path: path.to_owned() })?;
        Ok(record.size)
    }

    /// Copies the bytes of `path` to `sink` and returns how many were copied.
    /// A `Blob` record is used in preference to a `Content` record.
    pub fn read_content<W: Write + ?Sized>(&mut self, path: &str, sink: &mut W) -> Result<u64, Error> {
        let record = self.entry(path)?.content_record()
            .ok_or_else(|| FormatError::NoContent { path: path.to_owned() })?;
        debug!("{}: {} bytes at payload offset {}", path, record.size, record.offset);
        self.seek_record(&record)
            .map_err(|err| annotate_io_error(err, "seeking to content"))?;

        let n = io::copy(&mut (&mut self.reader).take(record.size), sink)
            .map_err(|err| annotate_io_error(err, "copying content"))?;
        if n < record.size {
            return Err(Error::Format(FormatError::ShortRead {
                path: path.to_owned(),
                expected: record.size,
                actual: n,
            }));
        }
        Ok(n)
    }
}
