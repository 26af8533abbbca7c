//! Object counts and the global address index of a topgroup.
//!
//! The index is derived, never stored: type groups are concatenated in
//! [`ObjectType::ALL`] order, each contributing its object names sorted
//! lexicographically, and an object's position in that sequence is its
//! integer address.  Addresses are therefore only meaningful against the
//! group contents they were built from; they shift as soon as objects are
//! added or removed.  Every resolution below rebuilds the index from current
//! membership rather than caching it.

pub mod selector;

pub use selector::{Key, Selector};

use std::collections::BTreeMap;

use crate::error::{Result, StemError};
use crate::objects::{DataObject, DecodeOptions};
use crate::registry::{self, ObjectType};
use crate::tree::Group;

// ── Object counter ───────────────────────────────────────────────────────────

/// Per-type object counts of one topgroup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectCounts {
    counts: BTreeMap<ObjectType, usize>,
}

impl ObjectCounts {
    pub fn get(&self, ty: ObjectType) -> usize {
        self.counts.get(&ty).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectType, usize)> + '_ {
        self.counts.iter().map(|(t, n)| (*t, *n))
    }
}

/// Object names of one type, sorted. A type group missing from an older
/// layout has no objects.
fn object_names(topgroup: &Group, ty: ObjectType) -> Vec<&str> {
    ty.group_in(topgroup)
        .map(|g| g.groups().map(|(name, _)| name).collect())
        .unwrap_or_default()
}

pub fn count_objects(topgroup: &Group) -> ObjectCounts {
    let counts = ObjectType::ALL
        .into_iter()
        .map(|ty| (ty, object_names(topgroup, ty).len()))
        .collect();
    ObjectCounts { counts }
}

// ── Address index ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub index: usize,
    pub ty:    ObjectType,
    pub name:  String,
}

impl Address {
    /// Object group path relative to its topgroup.
    pub fn path(&self) -> String {
        format!("{}/{}", self.ty.group_path(), self.name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddressIndex {
    entries: Vec<Address>,
}

impl AddressIndex {
    pub fn build(topgroup: &Group) -> Self {
        let mut entries = Vec::new();
        for ty in ObjectType::ALL {
            // `groups()` iterates in sorted key order already
            for name in object_names(topgroup, ty) {
                entries.push(Address { index: entries.len(), ty, name: name.to_owned() });
            }
        }
        Self { entries }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn entries(&self) -> &[Address] { &self.entries }

    pub fn by_index(&self, index: i64) -> Result<&Address> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .ok_or(StemError::IndexOutOfRange { index, len: self.entries.len() })
    }

    /// Names are unique per type group only; the same name in two type
    /// groups is reported, not resolved.
    pub fn by_name(&self, name: &str) -> Result<&Address> {
        let mut hits = self.entries.iter().filter(|a| a.name == name);
        match (hits.next(), hits.next()) {
            (None, _)          => Err(StemError::NotFound(name.to_owned())),
            (Some(addr), None) => Ok(addr),
            (Some(first), Some(second)) => {
                let mut types = vec![first.ty, second.ty];
                types.extend(hits.map(|a| a.ty));
                Err(StemError::Ambiguous { name: name.to_owned(), types })
            }
        }
    }

    pub fn resolve(&self, key: &Key) -> Result<&Address> {
        match key {
            Key::Index(i) => self.by_index(*i),
            Key::Name(n)  => self.by_name(n),
        }
    }
}

pub fn resolve_by_index(topgroup: &Group, index: i64) -> Result<(ObjectType, String)> {
    let idx = AddressIndex::build(topgroup);
    let addr = idx.by_index(index)?;
    Ok((addr.ty, addr.name.clone()))
}

/// Type of the object called `name` and its object group.
pub fn resolve_by_name<'a>(topgroup: &'a Group, name: &str) -> Result<(ObjectType, &'a Group)> {
    let idx = AddressIndex::build(topgroup);
    let addr = idx.by_name(name)?;
    let group = topgroup
        .group(&addr.path())
        .ok_or_else(|| StemError::NotFound(name.to_owned()))?;
    Ok((addr.ty, group))
}

// ── Selector resolution ──────────────────────────────────────────────────────

/// Decoded result of a selector: a scalar selector yields one object, a
/// list selector yields objects in selector order.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    One(DataObject),
    Many(Vec<DataObject>),
}

impl Selection {
    pub fn into_vec(self) -> Vec<DataObject> {
        match self {
            Selection::One(o)   => vec![o],
            Selection::Many(v)  => v,
        }
    }
}

fn decode_at(topgroup: &Group, topgroup_name: &str, addr: &Address, opts: &DecodeOptions) -> Result<DataObject> {
    let rel = addr.path();
    let group = topgroup
        .group(&rel)
        .ok_or_else(|| StemError::NotFound(addr.name.clone()))?;
    registry::decode(addr.ty, group, &format!("{topgroup_name}/{rel}"), opts)
}

/// Resolve and decode. All keys of a list selector resolve against one
/// index snapshot.
pub fn resolve_by_selector(
    topgroup:      &Group,
    topgroup_name: &str,
    selector:      &Selector,
    opts:          &DecodeOptions,
) -> Result<Selection> {
    let idx = AddressIndex::build(topgroup);
    match selector {
        Selector::One(key) => {
            let addr = idx.resolve(key)?;
            Ok(Selection::One(decode_at(topgroup, topgroup_name, addr, opts)?))
        }
        Selector::List(keys) => keys
            .iter()
            .map(|k| idx.resolve(k).and_then(|a| decode_at(topgroup, topgroup_name, a, opts)))
            .collect::<Result<Vec<_>>>()
            .map(Selection::Many),
    }
}
