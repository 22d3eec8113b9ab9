//! Builds synthetic pkg executables for tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path;

/// Bytes standing in for the native part of the executable.
pub const STUB: &[u8] = b"\x7fELF\x02\x01\x01\0native stub { with } braces\n\0\0\0\xff\xfe";

/// Mode of a regular file with permissions 0644.
pub const FILE_MODE: u32 = 0o100644;

/// Mode of a directory with permissions 0755.
pub const DIR_MODE: u32 = 0o040755;

/// A stat record in the packager's JSON shape.
pub fn stat_json(mode: u32, size: u64, is_file: bool, is_directory: bool, is_symbolic_link: bool) -> String {
    serde_json::json!({
        "dev": 2049,
        "mode": mode,
        "nlink": 1,
        "uid": 1000,
        "gid": 1000,
        "size": size,
        "isFileValue": is_file,
        "isDirectoryValue": is_directory,
        "isSocketValue": false,
        "isSymbolicLinkValue": is_symbolic_link,
    })
    .to_string()
}

/// Bootstrap code up to the line holding the directory table: two functions
/// and a brace block, as pkg lays them out.
pub const BOOTSTRAP: &str = "\
(function (REQUIRE_COMMON, VIRTUAL_FILESYSTEM, DEFAULT_ENTRYPOINT) {
  var x = { a: 1, b: { c: 2 } };
  REQUIRE_COMMON(x);
})(function (exports) {
  function inner() { return { b: [1, 2] }; }
  exports.inner = inner;
}, {
  'nested': { 'deep': {} }
},
";

/// Builder for a package. Every record added with the helpers is laid out in
/// the payload in the order it is added.
#[derive(Default)]
pub struct PackageBuilder {
    payload: Vec<u8>,
    directory: BTreeMap<String, BTreeMap<String, [u64; 2]>>,
    entrypoint: Option<String>,
    payload_size_override: Option<u64>,
    directory_line_override: Option<String>,
}

impl PackageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` to the payload and records them under `tag` for `path`.
    pub fn record(mut self, path: &str, tag: &str, bytes: &[u8]) -> Self {
        let offset = self.payload.len() as u64;
        self.payload.extend_from_slice(bytes);
        self.directory.entry(path.to_owned()).or_default()
            .insert(tag.to_owned(), [offset, bytes.len() as u64]);
        self
    }

    /// Records an explicit `[offset, size]` without touching the payload.
    pub fn raw_record(mut self, path: &str, tag: &str, offset: u64, size: u64) -> Self {
        self.directory.entry(path.to_owned()).or_default()
            .insert(tag.to_owned(), [offset, size]);
        self
    }

    /// A regular file stored as a Blob, with its stat record.
    pub fn file(self, path: &str, bytes: &[u8]) -> Self {
        self.file_with_mode(path, bytes, FILE_MODE)
    }

    pub fn file_with_mode(self, path: &str, bytes: &[u8], mode: u32) -> Self {
        let stat = stat_json(mode, bytes.len() as u64, true, false, false);
        self.record(path, "0", bytes).record(path, "3", stat.as_bytes())
    }

    /// A regular file stored as Content rather than Blob.
    pub fn content_file(self, path: &str, bytes: &[u8]) -> Self {
        let stat = stat_json(FILE_MODE, bytes.len() as u64, true, false, false);
        self.record(path, "1", bytes).record(path, "3", stat.as_bytes())
    }

    pub fn dir(self, path: &str) -> Self {
        let stat = stat_json(DIR_MODE, 4096, false, true, false);
        self.record(path, "3", stat.as_bytes())
    }

    pub fn symlink(self, path: &str, target: &str) -> Self {
        let stat = stat_json(0o120777, target.len() as u64, false, false, true);
        self.record(path, "2", target.as_bytes()).record(path, "3", stat.as_bytes())
    }

    pub fn entrypoint(mut self, path: &str) -> Self {
        self.entrypoint = Some(path.to_owned());
        self
    }

    /// Declares a payload size different from the real one.
    pub fn payload_size(mut self, size: u64) -> Self {
        self.payload_size_override = Some(size);
        self
    }

    /// Replaces the directory table line.
    pub fn directory_line(mut self, line: &str) -> Self {
        self.directory_line_override = Some(line.to_owned());
        self
    }

    /// The prelude text from the bootstrap through the entrypoint line.
    pub fn prelude(&self) -> String {
        let directory = match &self.directory_line_override {
            Some(line) => line.clone(),
            None => serde_json::to_string(&self.directory).unwrap(),
        };
        let entrypoint = match &self.entrypoint {
            Some(entrypoint) => entrypoint.clone(),
            None => self.directory.keys().next().cloned().unwrap_or_default(),
        };
        let entrypoint = serde_json::to_string(&entrypoint).unwrap();
        format!("{}{}\n,\n{}\n);\n", BOOTSTRAP, directory, entrypoint)
    }

    /// The complete executable: stub, offset declarations, prelude, payload.
    pub fn build(&self) -> Vec<u8> {
        let prelude = self.prelude();
        // The declarations are padded to a fixed width so their length does
        // not depend on the values.
        let header_len = declarations(0, 0, 0, 0).len() as u64;
        let prelude_position = STUB.len() as u64 + header_len;
        let payload_position = prelude_position + prelude.len() as u64;
        let payload_size = self.payload_size_override.unwrap_or(self.payload.len() as u64);
        let header = declarations(payload_position, payload_size, prelude_position, prelude.len() as u64);

        let mut out = Vec::new();
        out.extend_from_slice(STUB);
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(prelude.as_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn build_cursor(&self) -> io::Cursor<Vec<u8>> {
        io::Cursor::new(self.build())
    }
}

pub fn declarations(payload_position: u64, payload_size: u64, prelude_position: u64, prelude_size: u64) -> String {
    format!("\
var PAYLOAD_POSITION = '{:<20}' | 0;
var PAYLOAD_SIZE = '{:<20}' | 0;
var PRELUDE_POSITION = '{:<20}' | 0;
var PRELUDE_SIZE = '{:<20}' | 0;
",
        payload_position, payload_size, prelude_position, prelude_size)
}

/// A small package with files, a directory and a symlink.
pub fn sample() -> PackageBuilder {
    PackageBuilder::new()
        .dir("/snapshot/app")
        .file("/snapshot/app/index.js", b"require('./lib/util.js');\nconsole.log('hello');\n")
        .dir("/snapshot/app/lib")
        .file("/snapshot/app/lib/util.js", b"module.exports = {};\n")
        .content_file("/snapshot/app/package.json", b"{\"name\":\"app\"}")
        .symlink("/snapshot/app/current", "/snapshot/app/lib")
        .entrypoint("/snapshot/app/index.js")
}

// Writes the package to `path` if the environment variable
// PKGUNPACK_TEST_SAVE is set.
pub fn maybe_save<P: AsRef<path::Path>>(path: P, bytes: &[u8]) -> io::Result<()> {
    if env::var_os("PKGUNPACK_TEST_SAVE").is_some() {
        fs::write(path, bytes)?;
    }
    Ok(())
}
