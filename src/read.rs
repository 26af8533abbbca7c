//! Reader front-end: summary table, object retrieval and metadata.

use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::error::{Result, StemError};
use crate::file::{Mode, StemFile};
use crate::index::{resolve_by_selector, AddressIndex, Selection, Selector};
use crate::metadata::{read_metadata, Metadata};
use crate::objects::{DecodeOptions, MemMode};
use crate::registry;
use crate::registry::ObjectType;
use crate::topgroup::{resolve_topgroup, topgroup_version, Resolved};
use crate::tree::{DType, Group};

// ── ReadOptions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Required when the file holds more than one topgroup.
    pub topgroup:  Option<String>,
    pub mem:       MemMode,
    pub binfactor: usize,
    pub dtype:     Option<DType>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { topgroup: None, mem: MemMode::Ram, binfactor: 1, dtype: None }
    }
}

impl ReadOptions {
    fn decode_options(&self) -> Result<DecodeOptions> {
        if self.binfactor == 0 {
            return Err(StemError::InvalidOption("binfactor must be a positive integer".into()));
        }
        Ok(DecodeOptions { mem: self.mem, binfactor: self.binfactor, dtype: self.dtype })
    }
}

// ── Requests and outcomes ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadRequest {
    /// Table of every object in the topgroup.
    Summary,
    Data(Selector),
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub index: usize,
    #[serde(rename = "type")]
    pub ty:    ObjectType,
    pub shape: Vec<usize>,
    pub name:  String,
}

/// Contents of one topgroup in global index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub topgroup: String,
    pub version:  String,
    pub objects:  Vec<ObjectInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Summary(Summary),
    Data(Selection),
    Metadata(Metadata),
    /// Several topgroups and none named; nothing was read.
    NeedsDisambiguation(Vec<String>),
}

// ── Summary table ────────────────────────────────────────────────────────────

fn shape_str(shape: &[usize]) -> String {
    match shape {
        [n] => format!("({n},)"),
        dims => format!(
            "({})",
            dims.iter().map(usize::to_string).collect::<Vec<_>>().join(", ")
        ),
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |a: &str, b: &str, c: &str, d: &str| format!("{a:10}{b:18}{c:24}{d:54}");
        writeln!(f, "{}", row("Index", "Type", "Shape", "Name").trim_end())?;
        writeln!(f, "{}", row("-----", "----", "-----", "----").trim_end())?;
        for o in &self.objects {
            let line = format!(
                "  {:8}{:18}{:24}{:54}",
                o.index.to_string(),
                o.ty.name(),
                shape_str(&o.shape),
                o.name
            );
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

/// Index, type, shape and name of every object, without decoding payloads.
pub fn summarize(topgroup: &Group, topgroup_name: &str) -> Result<Vec<ObjectInfo>> {
    AddressIndex::build(topgroup)
        .entries()
        .iter()
        .map(|addr| {
            let rel = addr.path();
            let group = topgroup
                .group(&rel)
                .ok_or_else(|| StemError::NotFound(addr.name.clone()))?;
            let shape = registry::shape(addr.ty, group, &format!("{topgroup_name}/{rel}"))?;
            Ok(ObjectInfo { index: addr.index, ty: addr.ty, shape, name: addr.name.clone() })
        })
        .collect()
}

// ── Entry point ──────────────────────────────────────────────────────────────

/// Read from the container at `path`.
///
/// A topgroup named in `opts` must exist.  With none named, a single
/// topgroup is used and several yield [`ReadOutcome::NeedsDisambiguation`].
/// The topgroup's format version is checked before anything else is read.
pub fn read<P: AsRef<Path>>(path: P, request: &ReadRequest, opts: &ReadOptions) -> Result<ReadOutcome> {
    let decode_opts = opts.decode_options()?;
    let file = StemFile::open(path, Mode::Read)?;

    let tg_name = match resolve_topgroup(&file, opts.topgroup.as_deref())? {
        Resolved::Topgroup(name) => name,
        Resolved::NeedsDisambiguation(candidates) => {
            tracing::warn!(?candidates, "multiple topgroups detected; specify one");
            return Ok(ReadOutcome::NeedsDisambiguation(candidates));
        }
    };
    let tg = file
        .root()
        .group(&tg_name)
        .ok_or_else(|| StemError::malformed(&tg_name, "topgroup vanished"))?;

    let version = topgroup_version(tg, &tg_name)?;
    version.check_supported()?;

    Ok(match request {
        ReadRequest::Metadata => ReadOutcome::Metadata(read_metadata(tg)),
        ReadRequest::Data(selector) => {
            ReadOutcome::Data(resolve_by_selector(tg, &tg_name, selector, &decode_opts)?)
        }
        ReadRequest::Summary => ReadOutcome::Summary(Summary {
            objects:  summarize(tg, &tg_name)?,
            version:  version.to_string(),
            topgroup: tg_name,
        }),
    })
}
