//! Error taxonomy for every file-level operation.
//!
//! Every variant is fatal to the operation that raised it and nothing is
//! partially applied: mutations only reach disk through
//! [`StemFile::commit`](crate::file::StemFile::commit), which no failing path
//! reaches.  Two situations are deliberately *not* errors:
//!
//! - an ambiguous topgroup choice, surfaced as a candidate list
//!   ([`Resolved::NeedsDisambiguation`](crate::topgroup::Resolved));
//! - append conflicts, reported as a batch-level refusal
//!   ([`AppendOutcome::Rejected`](crate::append::AppendOutcome)).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;
use crate::registry::ObjectType;
use crate::version::Version;

#[derive(Error, Debug)]
pub enum StemError {
    /// Signature, container format or topgroup check failed.
    #[error("{path} is not recognized as a py4DSTEM file: {reason}")]
    NotAStemFile { path: PathBuf, reason: String },

    #[error("topgroup '{requested}' not found (available: {})", .candidates.join(", "))]
    TopgroupNotFound { requested: String, candidates: Vec<String> },

    #[error("unknown or non-writable object type '{0}'")]
    UnknownType(String),

    #[error("invalid data selector: {0}")]
    InvalidSelector(String),

    #[error("index {index} out of range for {len} object(s)")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("no data named '{0}' found")]
    NotFound(String),

    #[error("multiple data blocks named '{name}' found in {types:?}")]
    Ambiguous { name: String, types: Vec<ObjectType> },

    #[error("{0} metadata instances were passed; at most one is allowed")]
    MultipleMetadata(usize),

    #[error("hard overwriting objects is not supported in multi-topgroup files")]
    UnsupportedAcrossMultiTopgroup,

    #[error("file version {found} is not supported (requires >= {min}, <= {max_minor}.x)")]
    UnsupportedVersion { found: Version, min: Version, max_minor: String },

    #[error("overwrite must be 0, 1 or 2 (got {0})")]
    InvalidOverwrite(u8),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("'{0}' already exists")]
    AlreadyExists(String),

    /// A group does not have the structure its type requires.
    #[error("malformed object at '{path}': {reason}")]
    Malformed { path: String, reason: String },

    #[error("corrupt container: {0}")]
    Corrupt(String),

    #[error("file was opened read-only")]
    ReadOnly,

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StemError {
    pub(crate) fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StemError::Malformed { path: path.into(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, StemError>;
