//! Append engine: add a batch of data objects (plus at most one metadata
//! object) to an existing topgroup.
//!
//! A batch is planned in full before anything is touched.  Every object gets
//! a final name and a [`ConflictOutcome`]; if any outcome is `Skip` the whole
//! batch is refused and the file is left exactly as it was.  Only a batch with
//! no skips reaches the write phase, which mutates the in-memory tree and
//! commits once at the end.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, StemError};
use crate::file::{Mode, StemFile};
use crate::index::count_objects;
use crate::metadata::{write_metadata, Metadata};
use crate::objects::DataObject;
use crate::registry::{self, ObjectType};
use crate::topgroup::{list_topgroups, resolve_topgroup, Resolved};

// ── Overwrite policy ─────────────────────────────────────────────────────────

/// What to do when an incoming object's (type, name) is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Overwrite {
    /// Refuse the batch.
    #[default]
    None = 0,
    /// Delete the stored object and write the new one in its place.
    Soft = 1,
    /// Same per-object behaviour as `Soft`; refused outright in files with
    /// more than one topgroup.
    Hard = 2,
}

impl TryFrom<u8> for Overwrite {
    type Error = StemError;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Overwrite::None),
            1 => Ok(Overwrite::Soft),
            2 => Ok(Overwrite::Hard),
            n => Err(StemError::InvalidOverwrite(n)),
        }
    }
}

impl Overwrite {
    pub fn replaces_existing(self) -> bool {
        !matches!(self, Overwrite::None)
    }

    /// Gate applied before topgroup resolution.
    pub fn check_topgroup_count(self, topgroups: usize) -> Result<()> {
        if self == Overwrite::Hard && topgroups > 1 {
            return Err(StemError::UnsupportedAcrossMultiTopgroup);
        }
        Ok(())
    }
}

// ── Options / inputs / outcomes ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    pub overwrite: Overwrite,
    /// Target topgroup; may be omitted when the file holds exactly one.
    pub topgroup:  Option<String>,
}

/// One element of a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendItem {
    Data(DataObject),
    Metadata(Metadata),
}

impl From<DataObject> for AppendItem {
    fn from(o: DataObject) -> Self { AppendItem::Data(o) }
}

impl From<Metadata> for AppendItem {
    fn from(m: Metadata) -> Self { AppendItem::Metadata(m) }
}

/// Per-object verdict of the conflict check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOutcome {
    /// Name is free.
    Fresh,
    /// Name is taken; the stored object is deleted before writing.
    Replace,
    /// Name is taken and overwriting is off; refuses the batch.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Saved {
        /// Objects written, in batch order.
        written:  Vec<(ObjectType, String)>,
        metadata: bool,
    },
    /// Nothing was written. Every conflicting (type, name) in batch order.
    Rejected { conflicts: Vec<(ObjectType, String)> },
    /// No topgroup could be chosen; retry naming one of these.
    NeedsDisambiguation(Vec<String>),
}

// ── Planning ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Planned {
    object:  DataObject,
    outcome: ConflictOutcome,
}

/// Pull the single metadata object out of the batch, whether passed on its
/// own or attached to a datacube.
fn split_metadata(items: Vec<AppendItem>) -> Result<(Vec<DataObject>, Option<Metadata>)> {
    let mut objects = Vec::with_capacity(items.len());
    let mut found = Vec::new();
    for item in items {
        match item {
            AppendItem::Metadata(md) => found.push(md),
            AppendItem::Data(mut obj) => {
                if let DataObject::DataCube(cube) = &mut obj {
                    found.extend(cube.metadata.take());
                }
                objects.push(obj);
            }
        }
    }
    if found.len() > 1 {
        return Err(StemError::MultipleMetadata(found.len()));
    }
    Ok((objects, found.pop()))
}

/// A stored object is one child group of its type group, so its name must be
/// a single non-blank path segment.
fn check_name(ty: ObjectType, name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains('/') {
        return Err(StemError::InvalidOption(format!(
            "invalid {ty} name '{name}': names must be non-blank and contain no '/'"
        )));
    }
    Ok(())
}

/// Assign names and conflict outcomes. `taken` reports whether a (type,
/// name) is already stored; `counters` start at the stored per-type counts.
fn plan(
    objects:   Vec<DataObject>,
    mut counters: BTreeMap<ObjectType, usize>,
    overwrite: Overwrite,
    taken:     impl Fn(ObjectType, &str) -> bool,
) -> Result<Vec<Planned>> {
    let mut planned: Vec<Planned> = Vec::with_capacity(objects.len());
    for mut object in objects {
        let ty = object.object_type();
        let spec = ty.require_writable()?;
        if object.name().is_empty() {
            let n = counters.entry(ty).or_insert(0);
            object.set_name(format!("{}{}", spec.prefix, n));
            *n += 1;
        }
        check_name(ty, object.name())?;

        let in_batch = planned
            .iter()
            .any(|p| p.object.object_type() == ty && p.object.name() == object.name());
        let outcome = if in_batch {
            ConflictOutcome::Skip
        } else if taken(ty, object.name()) {
            if overwrite.replaces_existing() { ConflictOutcome::Replace } else { ConflictOutcome::Skip }
        } else {
            ConflictOutcome::Fresh
        };
        planned.push(Planned { object, outcome });
    }
    Ok(planned)
}

// ── Engine ───────────────────────────────────────────────────────────────────

/// Append `items` to the container at `path`.
///
/// Input errors (bad type, bad object name, several metadata objects, hard
/// overwrite in a multi-topgroup file) are returned as `Err`.  Name collisions and an
/// undecidable topgroup are ordinary outcomes; in both cases the file is not
/// modified.
pub fn append<P: AsRef<Path>>(path: P, items: Vec<AppendItem>, opts: &AppendOptions) -> Result<AppendOutcome> {
    let mut file = StemFile::open(path, Mode::ReadWrite)?;

    let topgroups = list_topgroups(&file)?;
    opts.overwrite.check_topgroup_count(topgroups.len())?;

    let tg_name = match resolve_topgroup(&file, opts.topgroup.as_deref()) {
        Ok(Resolved::Topgroup(name)) => name,
        Ok(Resolved::NeedsDisambiguation(candidates))
        | Err(StemError::TopgroupNotFound { candidates, .. }) => {
            tracing::warn!(?candidates, "file holds several topgroups; specify one");
            return Ok(AppendOutcome::NeedsDisambiguation(candidates));
        }
        Err(e) => return Err(e),
    };

    let (objects, metadata) = split_metadata(items)?;

    let planned = {
        let tg = file
            .root()
            .group(&tg_name)
            .ok_or_else(|| StemError::malformed(&tg_name, "topgroup vanished"))?;
        let counters = count_objects(tg).iter().collect();
        plan(objects, counters, opts.overwrite, |ty, name| {
            ty.group_in(tg).is_some_and(|g| g.contains(name))
        })?
    };

    let conflicts: Vec<_> = planned
        .iter()
        .filter(|p| p.outcome == ConflictOutcome::Skip)
        .map(|p| (p.object.object_type(), p.object.name().to_owned()))
        .collect();
    if !conflicts.is_empty() {
        for (ty, name) in &conflicts {
            tracing::warn!(%ty, name = name.as_str(), "object already exists");
        }
        tracing::warn!("no objects saved; rename them or pass overwrite=1 or overwrite=2");
        return Ok(AppendOutcome::Rejected { conflicts });
    }

    let root = file.root_mut()?;
    let tg = root
        .group_mut(&tg_name)
        .ok_or_else(|| StemError::malformed(&tg_name, "topgroup vanished"))?;

    if let Some(md) = &metadata {
        let keys = write_metadata(tg, md, opts.overwrite)?;
        tracing::info!(topgroup = tg_name.as_str(), keys, "saving metadata");
    }

    let mut written = Vec::with_capacity(planned.len());
    for Planned { object, outcome } in planned {
        let ty = object.object_type();
        let type_group = tg.require_group(ty.group_path())?;
        if outcome == ConflictOutcome::Replace {
            type_group.delete_child(object.name());
        }
        tracing::info!("Saving {} '{}'...", ty, object.name());
        registry::encode(type_group.create_group(object.name())?, &object)?;
        written.push((ty, object.name().to_owned()));
    }

    file.close()?;
    Ok(AppendOutcome::Saved { written, metadata: metadata.is_some() })
}
