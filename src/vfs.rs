//! The virtual directory table and per-path stat records.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::FormatError;

/// How a virtual path's bytes are stored in the payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKind {
    /// Raw file bytes.
    Blob,
    /// Raw file bytes, an alternative to `Blob`.
    Content,
    /// An alternate representation of the path that nothing here reads.
    Links,
    /// A JSON `FileStat` record.
    Stat,
}

impl StoreKind {
    pub const ALL: &'static [StoreKind] = &[StoreKind::Blob, StoreKind::Content, StoreKind::Links, StoreKind::Stat];

    /// The tag used as a key in the directory table JSON.
    pub fn tag(self) -> &'static str {
        match self {
            StoreKind::Blob => "0",
            StoreKind::Content => "1",
            StoreKind::Links => "2",
            StoreKind::Stat => "3",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        StoreKind::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }
}

/// An `(offset, size)` pair. The offset is relative to the payload start.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    pub offset: u64,
    pub size: u64,
}

impl StorageRecord {
    /// The payload-relative offset one past the last byte, or `None` on
    /// overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// The records stored for one virtual path, at most one per `StoreKind`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualEntry {
    pub blob: Option<StorageRecord>,
    pub content: Option<StorageRecord>,
    pub links: Option<StorageRecord>,
    pub stat: Option<StorageRecord>,
}

impl VirtualEntry {
    pub fn get(&self, kind: StoreKind) -> Option<StorageRecord> {
        match kind {
            StoreKind::Blob => self.blob,
            StoreKind::Content => self.content,
            StoreKind::Links => self.links,
            StoreKind::Stat => self.stat,
        }
    }

    fn slot(&mut self, kind: StoreKind) -> &mut Option<StorageRecord> {
        match kind {
            StoreKind::Blob => &mut self.blob,
            StoreKind::Content => &mut self.content,
            StoreKind::Links => &mut self.links,
            StoreKind::Stat => &mut self.stat,
        }
    }

    /// The record holding the file bytes: `Blob` if present, else `Content`.
    pub fn content_record(&self) -> Option<StorageRecord> {
        self.blob.or(self.content)
    }

    /// All present records, in `StoreKind` order.
    pub fn records(&self) -> impl Iterator<Item = (StoreKind, StorageRecord)> + '_ {
        StoreKind::ALL.iter().filter_map(move |&kind| self.get(kind).map(|record| (kind, record)))
    }
}

/// The shape of the directory table as it appears in the prelude:
/// `{"<path>": {"<tag>": [offset, size], ...}, ...}`.
type RawDirectory = BTreeMap<String, BTreeMap<String, [u64; 2]>>;

/// Maps virtual paths to their storage records. Built once from the prelude
/// and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualDirectory {
    entries: BTreeMap<String, VirtualEntry>,
}

impl VirtualDirectory {
    /// Decodes the directory table from its JSON text.
    pub fn from_json(json: &[u8]) -> Result<Self, FormatError> {
        let raw: RawDirectory = serde_json::from_slice(json)
            .map_err(|err| FormatError::MalformedDirectory { message: err.to_string() })?;
        let mut entries = BTreeMap::new();
        for (path, records) in raw {
            let mut entry = VirtualEntry::default();
            for (tag, [offset, size]) in records {
                let kind = StoreKind::from_tag(&tag).ok_or_else(|| FormatError::MalformedDirectory {
                    message: format!("{}: unknown store tag {:?}", path, tag),
                })?;
                *entry.slot(kind) = Some(StorageRecord { offset, size });
            }
            entries.insert(path, entry);
        }
        Ok(Self { entries })
    }

    /// Checks that no record extends past `payload_size`.
    pub fn check_bounds(&self, payload_size: u64) -> Result<(), FormatError> {
        for (path, entry) in &self.entries {
            for (kind, record) in entry.records() {
                match record.end() {
                    Some(end) if end <= payload_size => (),
                    _ => return Err(FormatError::RecordOutOfBounds {
                        path: path.clone(),
                        kind,
                        offset: record.offset,
                        size: record.size,
                        payload_size,
                    }),
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&VirtualEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(path, entry)` pairs, sorted by path.
    pub fn iter(&self) -> btree_map::Iter<'_, String, VirtualEntry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a VirtualDirectory {
    type Item = (&'a String, &'a VirtualEntry);
    type IntoIter = btree_map::Iter<'a, String, VirtualEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A path's stat record, as serialized by the packager from a Node.js
/// `fs.Stats` object plus four precomputed type flags.
///
/// The flags are kept as stored; nothing requires exactly one of them to be
/// set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileStat {
    /// Raw `st_mode`, file type bits included.
    pub mode: u32,
    pub size: u64,
    #[serde(rename = "isFileValue")]
    pub is_file: bool,
    #[serde(rename = "isDirectoryValue")]
    pub is_directory: bool,
    #[serde(rename = "isSocketValue")]
    pub is_socket: bool,
    #[serde(rename = "isSymbolicLinkValue")]
    pub is_symbolic_link: bool,
}

impl FileStat {
    pub fn from_json(path: &str, json: &[u8]) -> Result<Self, FormatError> {
        serde_json::from_slice(json).map_err(|err| FormatError::MalformedStat {
            path: path.to_owned(),
            message: err.to_string(),
        })
    }

    /// The POSIX permission bits of `mode`.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o777
    }

    /// A one-word description for listings, from the first flag that is set.
    pub fn kind(&self) -> &'static str {
        if self.is_file {
            "file"
        } else if self.is_directory {
            "dir"
        } else if self.is_symbolic_link {
            "symlink"
        } else if self.is_socket {
            "socket"
        } else {
            "other"
        }
    }
}

impl fmt::Display for FileStat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:<7} {:04o} {:>10}", self.kind(), self.permissions(), self.size)
    }
}
