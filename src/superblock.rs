use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};
use thiserror::Error;
use uuid::Uuid;

use crate::codec::CodecId;

pub const MAGIC: &[u8; 4] = b"4DST";
/// Container layout version (independent of the topgroup format version).
pub const FORMAT_VERSION: u32 = 1;
pub const SUPERBLOCK_SIZE: usize = 64;

#[derive(Error, Debug)]
pub enum SuperblockError {
    #[error("Invalid magic number")]
    InvalidMagic,
    #[error("Unsupported container format: {0}")]
    UnsupportedFormat(u32),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Fixed 64-byte header at offset 0.
///
/// ```text
/// 0  magic        [4]
/// 4  format       u32
/// 8  uuid         [16]
/// 24 codec        u8
/// 25 level        i8
/// 26 reserved     u16
/// 28 body_size    u64
/// 36 body_crc32   u32
/// 40 created_at   i64   unix seconds
/// 48 padding      [16]
/// ```
#[derive(Debug, Clone)]
pub struct Superblock {
    pub format_version: u32,
    pub file_uuid:      Uuid,
    pub codec:          CodecId,
    pub level:          i8,
    pub body_size:      u64,
    pub body_crc32:     u32,
    pub created_at:     i64,
}

impl Superblock {
    pub fn new(codec: CodecId, level: i32) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            file_uuid:      Uuid::new_v4(),
            codec,
            level:          level.clamp(i8::MIN as i32, i8::MAX as i32) as i8,
            body_size:      0,
            body_crc32:     0,
            created_at:     chrono::Utc::now().timestamp(),
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.format_version)?;
        writer.write_all(self.file_uuid.as_bytes())?;
        writer.write_u8(self.codec.tag())?;
        writer.write_i8(self.level)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u64::<LittleEndian>(self.body_size)?;
        writer.write_u32::<LittleEndian>(self.body_crc32)?;
        writer.write_i64::<LittleEndian>(self.created_at)?;
        writer.write_all(&[0u8; 16])?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, SuperblockError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(SuperblockError::InvalidMagic);
        }
        let format_version = reader.read_u32::<LittleEndian>()?;
        if format_version != FORMAT_VERSION {
            return Err(SuperblockError::UnsupportedFormat(format_version));
        }
        let mut uuid_bytes = [0u8; 16];
        reader.read_exact(&mut uuid_bytes)?;
        let codec_tag = reader.read_u8()?;
        let codec = CodecId::from_tag(codec_tag).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, format!("unknown codec tag {codec_tag}"))
        })?;
        let level = reader.read_i8()?;
        let _reserved = reader.read_u16::<LittleEndian>()?;
        let body_size = reader.read_u64::<LittleEndian>()?;
        let body_crc32 = reader.read_u32::<LittleEndian>()?;
        let created_at = reader.read_i64::<LittleEndian>()?;
        let mut padding = [0u8; 16];
        reader.read_exact(&mut padding)?;
        Ok(Self {
            format_version,
            file_uuid: Uuid::from_bytes(uuid_bytes),
            codec,
            level,
            body_size,
            body_crc32,
            created_at,
        })
    }

    pub fn created_at_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp(self.created_at, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| self.created_at.to_string())
    }
}
