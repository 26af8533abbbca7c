//! Topgroups: the top-level namespaces of a container, each holding one
//! collection of data objects plus its metadata.
//!
//! A root child is a topgroup when it carries `emd_group_type == 2`.  A
//! container may hold several; operations must then name the one they act
//! on, and [`resolve_topgroup`] hands the candidates back instead of picking.

use std::path::Path;

use crate::error::{Result, StemError};
use crate::file::{StemFile, WriteOptions};
use crate::metadata::{METADATA_GROUP, SECTIONS};
use crate::registry::ObjectType;
use crate::tree::{AttrValue, Group};
use crate::version::Version;

/// Conventional name for a file's single topgroup.
pub const DEFAULT_TOPGROUP: &str = "4DSTEM_experiment";

pub const ATTR_GROUP_TYPE: &str = "emd_group_type";
pub const TOPGROUP_TYPE:   i64  = 2;

/// Outcome of topgroup resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Topgroup(String),
    /// More than one candidate and no explicit choice; retry with one of these.
    NeedsDisambiguation(Vec<String>),
}

fn is_topgroup(g: &Group) -> bool {
    g.attr(ATTR_GROUP_TYPE).and_then(AttrValue::as_int) == Some(TOPGROUP_TYPE)
}

/// Topgroup names under `root`, in lexicographic order.
pub fn topgroup_names(root: &Group) -> Vec<String> {
    root.groups()
        .filter(|(_, g)| is_topgroup(g))
        .map(|(name, _)| name.to_owned())
        .collect()
}

/// Topgroups of an open file. A file without any is not a valid container.
pub fn list_topgroups(file: &StemFile) -> Result<Vec<String>> {
    let names = topgroup_names(file.root());
    if names.is_empty() {
        return Err(StemError::NotAStemFile {
            path:   file.path().to_owned(),
            reason: "no topgroups found".into(),
        });
    }
    Ok(names)
}

pub fn resolve_topgroup(file: &StemFile, requested: Option<&str>) -> Result<Resolved> {
    let candidates = list_topgroups(file)?;
    match requested {
        Some(name) if candidates.iter().any(|c| c == name) => Ok(Resolved::Topgroup(name.to_owned())),
        Some(name) => Err(StemError::TopgroupNotFound { requested: name.to_owned(), candidates }),
        None if candidates.len() == 1 => Ok(Resolved::Topgroup(candidates[0].clone())),
        None => Ok(Resolved::NeedsDisambiguation(candidates)),
    }
}

/// Stored format version of a topgroup.
pub fn topgroup_version(topgroup: &Group, name: &str) -> Result<Version> {
    Version::from_group(topgroup)
        .ok_or_else(|| StemError::malformed(name, "topgroup carries no version attributes"))
}

/// Lay out an empty topgroup at the current format version.
pub fn create_topgroup<'a>(root: &'a mut Group, name: &str) -> Result<&'a mut Group> {
    let tg = root.create_group(name)?;
    tg.set_attr(ATTR_GROUP_TYPE, AttrValue::Int(TOPGROUP_TYPE));
    Version::CURRENT.stamp(tg);
    for ty in ObjectType::ALL {
        tg.require_group(ty.group_path())?;
    }
    let md = tg.require_group(METADATA_GROUP)?;
    for section in SECTIONS {
        md.require_group(section)?;
    }
    tracing::debug!(topgroup = name, "created topgroup");
    Ok(tg)
}

/// Create a container file holding one empty topgroup per name.
pub fn create_container<P: AsRef<Path>, S: AsRef<str>>(path: P, topgroups: &[S], opts: WriteOptions) -> Result<()> {
    let mut file = StemFile::create(path, opts)?;
    let root = file.root_mut()?;
    for name in topgroups {
        create_topgroup(root, name.as_ref())?;
    }
    file.close()
}
