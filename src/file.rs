//! Scoped container-file handle.
//!
//! ```no_run
//! use stemstore::file::{Mode, StemFile, WriteOptions};
//!
//! let mut f = StemFile::create("scan.4dst", WriteOptions::default())?;
//! f.root_mut()?.require_group("notes")?;
//! f.close()?;
//!
//! let f = StemFile::open("scan.4dst", Mode::Read)?;
//! assert!(f.root().group("notes").is_some());
//! # Ok::<(), stemstore::StemError>(())
//! ```
//!
//! The OS file is only held inside [`StemFile::open`] and
//! [`StemFile::commit`]; in between, the tree lives in memory.  Changes made
//! through [`StemFile::root_mut`] reach disk on `commit`/`close` and are
//! simply dropped when the handle goes away on an error path.

use crc32fast::Hasher;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::codec::{get_codec, get_codec_by_tag, CodecId, DEFAULT_COMPRESSION_LEVEL};
use crate::error::{Result, StemError};
use crate::superblock::{Superblock, SuperblockError};
use crate::tree::{encode, Group};

// ── WriteOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`StemFile::create`].
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub codec: CodecId,
    pub level: i32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { codec: CodecId::Zstd, level: DEFAULT_COMPRESSION_LEVEL }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    ReadWrite,
}

// ── StemFile ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct StemFile {
    path:       PathBuf,
    mode:       Mode,
    superblock: Superblock,
    root:       Group,
    dirty:      bool,
}

impl StemFile {
    /// Create (or truncate) a container holding an empty root group.
    pub fn create<P: AsRef<Path>>(path: P, opts: WriteOptions) -> Result<Self> {
        let mut f = Self {
            path:       path.as_ref().to_owned(),
            mode:       Mode::ReadWrite,
            superblock: Superblock::new(opts.codec, opts.level),
            root:       Group::new(),
            dirty:      true,
        };
        f.commit()?;
        Ok(f)
    }

    pub fn open<P: AsRef<Path>>(path: P, mode: Mode) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut reader = BufReader::new(File::open(&path)?);

        let superblock = Superblock::read(&mut reader).map_err(|e| match e {
            SuperblockError::Io(io)
                if !matches!(io.kind(), ErrorKind::UnexpectedEof | ErrorKind::InvalidData) =>
            {
                StemError::Io(io)
            }
            other => StemError::NotAStemFile { path: path.clone(), reason: other.to_string() },
        })?;

        let mut body = Vec::new();
        reader.take(superblock.body_size).read_to_end(&mut body)?;
        if body.len() as u64 != superblock.body_size {
            return Err(StemError::Corrupt(format!(
                "body truncated: expected {} bytes, found {}",
                superblock.body_size,
                body.len()
            )));
        }
        let mut hasher = Hasher::new();
        hasher.update(&body);
        if hasher.finalize() != superblock.body_crc32 {
            return Err(StemError::Corrupt("body checksum mismatch".into()));
        }

        let raw = get_codec_by_tag(superblock.codec.tag())?.decompress(&body)?;
        let root = encode::read_group(&mut raw.as_slice())
            .map_err(|e| StemError::Corrupt(e.to_string()))?;

        tracing::debug!(path = %path.display(), ?mode, "opened container");
        Ok(Self { path, mode, superblock, root, dirty: false })
    }

    // ── Tree access ──────────────────────────────────────────────────────────

    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Mutable root. Marks the handle dirty so the next `commit` rewrites
    /// the file.
    pub fn root_mut(&mut self) -> Result<&mut Group> {
        if self.mode == Mode::Read {
            return Err(StemError::ReadOnly);
        }
        self.dirty = true;
        Ok(&mut self.root)
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    /// Rewrite the file if anything changed since open/last commit.
    pub fn commit(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if self.mode == Mode::Read {
            return Err(StemError::ReadOnly);
        }
        let raw = encode::group_to_bytes(&self.root)?;
        let body = get_codec(self.superblock.codec).compress(&raw, self.superblock.level as i32)?;

        let mut hasher = Hasher::new();
        hasher.update(&body);
        self.superblock.body_size = body.len() as u64;
        self.superblock.body_crc32 = hasher.finalize();

        let mut w = BufWriter::new(File::create(&self.path)?);
        self.superblock.write(&mut w)?;
        w.write_all(&body)?;
        w.flush()?;

        self.dirty = false;
        tracing::debug!(path = %self.path.display(), bytes = body.len(), "committed container");
        Ok(())
    }

    /// Commit and release the handle.
    pub fn close(mut self) -> Result<()> {
        self.commit()
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }
    pub fn mode(&self) -> Mode { self.mode }
    pub fn superblock(&self) -> &Superblock { &self.superblock }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::AttrValue;
    use tempfile::NamedTempFile;

    #[test]
    fn create_write_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        let mut f = StemFile::create(tmp.path(), WriteOptions::default()).unwrap();
        f.root_mut().unwrap().require_group("a/b").unwrap().set_attr("x", AttrValue::Int(5));
        f.close().unwrap();

        let f = StemFile::open(tmp.path(), Mode::Read).unwrap();
        assert_eq!(f.root().group("a/b").unwrap().attr("x"), Some(&AttrValue::Int(5)));
    }

    #[test]
    fn read_mode_refuses_mutation() {
        let tmp = NamedTempFile::new().unwrap();
        StemFile::create(tmp.path(), WriteOptions::default()).unwrap();
        let mut f = StemFile::open(tmp.path(), Mode::Read).unwrap();
        assert!(matches!(f.root_mut(), Err(StemError::ReadOnly)));
    }

    #[test]
    fn foreign_file_is_not_a_stem_file() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"\x89HDF\r\n\x1a\n and then some more bytes to fill the header ....").unwrap();
        assert!(matches!(
            StemFile::open(tmp.path(), Mode::Read),
            Err(StemError::NotAStemFile { .. })
        ));
    }

    #[test]
    fn dropped_handle_discards_changes() {
        let tmp = NamedTempFile::new().unwrap();
        StemFile::create(tmp.path(), WriteOptions { codec: CodecId::None, level: 0 }).unwrap();
        {
            let mut f = StemFile::open(tmp.path(), Mode::ReadWrite).unwrap();
            f.root_mut().unwrap().require_group("scratch").unwrap();
        }
        let f = StemFile::open(tmp.path(), Mode::Read).unwrap();
        assert!(f.root().is_empty());
    }
}
