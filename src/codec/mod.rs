//! Body codecs for container files.
//!
//! The whole encoded tree is compressed as one body.  The codec is recorded
//! as a one-byte tag in the superblock; a reader that meets an unknown tag
//! fails immediately instead of guessing.

use std::io;
use thiserror::Error;

/// Default Zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

// ── CodecId enum ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecId {
    None = 0,
    Zstd = 1,
}

impl CodecId {
    /// On-disk tag.
    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CodecId::None),
            1 => Some(CodecId::Zstd),
            _ => None,
        }
    }

    /// Human-readable name; disk stores the tag.
    pub fn name(self) -> &'static str {
        match self {
            CodecId::None => "none",
            CodecId::Zstd => "zstd",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(CodecId::None),
            "zstd" => Some(CodecId::Zstd),
            _      => None,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Unknown codec tag {0}")]
    UnavailableCodec(u8),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn codec_id(&self) -> CodecId;
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn codec_id(&self) -> CodecId { CodecId::None }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, data: &[u8])        -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn codec_id(&self) -> CodecId { CodecId::Zstd }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        zstd::encode_all(data, level).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        zstd::decode_all(data).map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

pub fn get_codec(id: CodecId) -> Box<dyn Codec> {
    match id {
        CodecId::None => Box::new(NoneCodec),
        CodecId::Zstd => Box::new(ZstdCodec),
    }
}

/// Resolve an on-disk tag to a codec. Unknown tags are a hard failure.
pub fn get_codec_by_tag(tag: u8) -> Result<Box<dyn Codec>, CodecError> {
    CodecId::from_tag(tag)
        .map(get_codec)
        .ok_or(CodecError::UnavailableCodec(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zstd_roundtrip() {
        let data = vec![7u8; 4096];
        let c = get_codec(CodecId::Zstd);
        let packed = c.compress(&data, DEFAULT_COMPRESSION_LEVEL).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(c.decompress(&packed).unwrap(), data);
    }

    #[test]
    fn unknown_tag_fails_hard() {
        assert!(matches!(get_codec_by_tag(9), Err(CodecError::UnavailableCodec(9))));
        assert_eq!(CodecId::from_name("ZSTD"), Some(CodecId::Zstd));
    }
}
