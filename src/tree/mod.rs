//! In-memory hierarchical store: named groups holding attributes, child
//! groups and typed n-dimensional datasets.
//!
//! A [`Group`] tree is what a container file holds.  Groups are addressed by
//! `/`-separated paths relative to the group the call is made on; leading,
//! trailing and repeated slashes are ignored.  Child names are unique within
//! a group and iterate in lexicographic (byte) order.
//!
//! Dataset payloads live behind an `Arc<[u8]>` so a decoded object can either
//! share the store's buffer (memory-mapped style) or take its own copy.

pub mod encode;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, StemError};

// ── DType ─────────────────────────────────────────────────────────────────────

/// Element kind of a [`Dataset`].  Elements are stored little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Uint8   = 0,
    Uint16  = 1,
    Uint32  = 2,
    Int32   = 3,
    Int64   = 4,
    Float32 = 5,
    Float64 = 6,
}

impl DType {
    pub fn size(self) -> usize {
        match self {
            DType::Uint8                  => 1,
            DType::Uint16                 => 2,
            DType::Uint32 | DType::Int32
                | DType::Float32          => 4,
            DType::Int64 | DType::Float64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Uint8   => "uint8",
            DType::Uint16  => "uint16",
            DType::Uint32  => "uint32",
            DType::Int32   => "int32",
            DType::Int64   => "int64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    /// Parse from a CLI / attribute string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "uint8"   | "u8"  => Some(DType::Uint8),
            "uint16"  | "u16" => Some(DType::Uint16),
            "uint32"  | "u32" => Some(DType::Uint32),
            "int32"   | "i32" => Some(DType::Int32),
            "int64"   | "i64" => Some(DType::Int64),
            "float32" | "f32" => Some(DType::Float32),
            "float64" | "f64" => Some(DType::Float64),
            _                 => None,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(DType::Uint8),
            1 => Some(DType::Uint16),
            2 => Some(DType::Uint32),
            3 => Some(DType::Int32),
            4 => Some(DType::Int64),
            5 => Some(DType::Float32),
            6 => Some(DType::Float64),
            _ => None,
        }
    }

    /// Decode one element. `bytes.len()` must equal `self.size()`.
    fn read_f64(self, bytes: &[u8]) -> f64 {
        match self {
            DType::Uint8   => bytes[0] as f64,
            DType::Uint16  => LittleEndian::read_u16(bytes) as f64,
            DType::Uint32  => LittleEndian::read_u32(bytes) as f64,
            DType::Int32   => LittleEndian::read_i32(bytes) as f64,
            DType::Int64   => LittleEndian::read_i64(bytes) as f64,
            DType::Float32 => LittleEndian::read_f32(bytes) as f64,
            DType::Float64 => LittleEndian::read_f64(bytes),
        }
    }

    /// Encode one element, saturating on integer overflow.
    fn push_f64(self, value: f64, out: &mut Vec<u8>) {
        let mut buf = [0u8; 8];
        let n = self.size();
        match self {
            DType::Uint8   => buf[0] = value as u8,
            DType::Uint16  => LittleEndian::write_u16(&mut buf, value as u16),
            DType::Uint32  => LittleEndian::write_u32(&mut buf, value as u32),
            DType::Int32   => LittleEndian::write_i32(&mut buf, value as i32),
            DType::Int64   => LittleEndian::write_i64(&mut buf, value as i64),
            DType::Float32 => LittleEndian::write_f32(&mut buf, value as f32),
            DType::Float64 => LittleEndian::write_f64(&mut buf, value),
        }
        out.extend_from_slice(&buf[..n]);
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Dataset ───────────────────────────────────────────────────────────────────

/// Serialized form used by JSON manifests: values are spelled out as numbers.
#[derive(Serialize, Deserialize)]
struct DatasetRepr {
    dtype:  DType,
    shape:  Vec<usize>,
    values: Vec<f64>,
}

/// A typed n-dimensional array, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DatasetRepr", into = "DatasetRepr")]
pub struct Dataset {
    dtype: DType,
    shape: Vec<usize>,
    data:  Arc<[u8]>,
}

/// Number of elements a shape holds, or `None` when it does not fit in `usize`.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

fn byte_len(dtype: DType, shape: &[usize]) -> Result<usize> {
    element_count(shape)
        .and_then(|n| n.checked_mul(dtype.size()))
        .ok_or_else(|| StemError::InvalidOption(format!("dataset shape {shape:?} ({dtype}) is too large")))
}

impl Dataset {
    pub fn new(dtype: DType, shape: Vec<usize>, bytes: Vec<u8>) -> Result<Self> {
        let expected = byte_len(dtype, &shape)?;
        if bytes.len() != expected {
            return Err(StemError::InvalidOption(format!(
                "dataset of shape {shape:?} ({dtype}) needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self { dtype, shape, data: bytes.into() })
    }

    pub fn from_f64(dtype: DType, shape: Vec<usize>, values: &[f64]) -> Result<Self> {
        let size = byte_len(dtype, &shape)?;
        let count = size / dtype.size();
        if values.len() != count {
            return Err(StemError::InvalidOption(format!(
                "dataset of shape {shape:?} needs {count} values, got {}",
                values.len()
            )));
        }
        let mut bytes = Vec::with_capacity(size);
        for &v in values {
            dtype.push_f64(v, &mut bytes);
        }
        Self::new(dtype, shape, bytes)
    }

    pub fn zeros(dtype: DType, shape: Vec<usize>) -> Result<Self> {
        let n = byte_len(dtype, &shape)?;
        Ok(Self { dtype, shape, data: vec![0u8; n].into() })
    }

    pub fn dtype(&self) -> DType { self.dtype }
    pub fn shape(&self) -> &[usize] { &self.shape }
    pub fn ndim(&self) -> usize { self.shape.len() }
    pub fn len(&self) -> usize { self.data.len() / self.dtype.size() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn bytes(&self) -> &[u8] { &self.data }

    /// Element at flat (row-major) position `i`, widened to `f64`.
    pub fn value(&self, i: usize) -> f64 {
        let n = self.dtype.size();
        self.dtype.read_f64(&self.data[i * n..(i + 1) * n])
    }

    pub fn to_f64(&self) -> Vec<f64> {
        self.data
            .chunks_exact(self.dtype.size())
            .map(|c| self.dtype.read_f64(c))
            .collect()
    }

    /// A copy that owns its own buffer.
    pub fn detached(&self) -> Self {
        Self { dtype: self.dtype, shape: self.shape.clone(), data: self.data.to_vec().into() }
    }

    /// True when both datasets point at the same underlying buffer.
    pub fn shares_buffer(&self, other: &Dataset) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl TryFrom<DatasetRepr> for Dataset {
    type Error = StemError;
    fn try_from(r: DatasetRepr) -> Result<Self> {
        Dataset::from_f64(r.dtype, r.shape, &r.values)
    }
}

impl From<Dataset> for DatasetRepr {
    fn from(d: Dataset) -> Self {
        DatasetRepr { dtype: d.dtype, values: d.to_f64(), shape: d.shape }
    }
}

// ── AttrValue ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    StrList(Vec<String>),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _                 => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v)   => Some(*v as f64),
            _                   => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _                 => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            AttrValue::IntList(v) => Some(v),
            _                     => None,
        }
    }

    /// An empty JSON list decodes as `IntList`; treat it as an empty string
    /// list too.
    pub fn as_str_list(&self) -> Option<Vec<&str>> {
        match self {
            AttrValue::StrList(v)                 => Some(v.iter().map(String::as_str).collect()),
            AttrValue::IntList(v) if v.is_empty() => Some(Vec::new()),
            _                                     => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self { AttrValue::Str(s.to_owned()) }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self { AttrValue::Int(v) }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self { AttrValue::Float(v) }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(v)      => write!(f, "{v}"),
            AttrValue::Int(v)       => write!(f, "{v}"),
            AttrValue::Float(v)     => write!(f, "{v}"),
            AttrValue::Str(v)       => write!(f, "{v}"),
            AttrValue::IntList(v)   => write!(f, "{v:?}"),
            AttrValue::FloatList(v) => write!(f, "{v:?}"),
            AttrValue::StrList(v)   => write!(f, "{v:?}"),
        }
    }
}

// ── Group ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(Group),
    Dataset(Dataset),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    attrs:    BTreeMap<String, AttrValue>,
    children: BTreeMap<String, Node>,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Navigation ───────────────────────────────────────────────────────────

    pub fn node(&self, path: &str) -> Option<&Node> {
        let mut segs = segments(path).peekable();
        let mut cur = self;
        while let Some(seg) = segs.next() {
            let node = cur.children.get(seg)?;
            if segs.peek().is_none() {
                return Some(node);
            }
            match node {
                Node::Group(g)   => cur = g,
                Node::Dataset(_) => return None,
            }
        }
        None
    }

    pub fn group(&self, path: &str) -> Option<&Group> {
        let mut cur = self;
        for seg in segments(path) {
            match cur.children.get(seg)? {
                Node::Group(g)   => cur = g,
                Node::Dataset(_) => return None,
            }
        }
        Some(cur)
    }

    pub fn group_mut(&mut self, path: &str) -> Option<&mut Group> {
        let mut cur = self;
        for seg in segments(path) {
            cur = match cur.children.get_mut(seg)? {
                Node::Group(g)   => g,
                Node::Dataset(_) => return None,
            };
        }
        Some(cur)
    }

    /// Open the group at `path`, creating it and any missing parents.
    pub fn require_group(&mut self, path: &str) -> Result<&mut Group> {
        let mut cur = self;
        for seg in segments(path) {
            let node = cur.children
                .entry(seg.to_owned())
                .or_insert_with(|| Node::Group(Group::new()));
            cur = match node {
                Node::Group(g)   => g,
                Node::Dataset(_) => {
                    return Err(StemError::malformed(path, format!("'{seg}' is a dataset")));
                }
            };
        }
        Ok(cur)
    }

    /// Create a new group at `path`. Fails if anything already lives there.
    pub fn create_group(&mut self, path: &str) -> Result<&mut Group> {
        if segments(path).next().is_none() || self.node(path).is_some() {
            return Err(StemError::AlreadyExists(path.to_owned()));
        }
        self.require_group(path)
    }

    // ── Children ─────────────────────────────────────────────────────────────

    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Remove a direct child. Returns `true` if it existed.
    pub fn delete_child(&mut self, name: &str) -> bool {
        self.children.remove(name).is_some()
    }

    /// Names of all direct children, sorted.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Direct child groups, sorted by name.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &Group)> {
        self.children.iter().filter_map(|(k, n)| match n {
            Node::Group(g)   => Some((k.as_str(), g)),
            Node::Dataset(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        match self.children.get(name)? {
            Node::Dataset(d) => Some(d),
            Node::Group(_)   => None,
        }
    }

    /// Insert or replace the dataset `name`.
    pub fn put_dataset(&mut self, name: impl Into<String>, ds: Dataset) {
        self.children.insert(name.into(), Node::Dataset(ds));
    }

    // ── Attributes ───────────────────────────────────────────────────────────

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: AttrValue) {
        self.attrs.insert(key.into(), value);
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    // ── Digest ───────────────────────────────────────────────────────────────

    /// BLAKE3 over the binary encoding of this group and everything below it.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        // blake3::Hasher's io::Write impl never fails.
        let _ = encode::write_group(&mut hasher, self);
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_create_intermediates_and_ignore_extra_slashes() {
        let mut root = Group::new();
        root.create_group("a/b/c").unwrap();
        assert!(root.group("a").is_some());
        assert!(root.group("/a//b/c/").is_some());
        assert!(root.group("a/x").is_none());
    }

    #[test]
    fn create_group_rejects_existing() {
        let mut root = Group::new();
        root.create_group("x").unwrap();
        assert!(matches!(root.create_group("x"), Err(StemError::AlreadyExists(_))));
        assert!(root.require_group("x").is_ok());
    }

    #[test]
    fn datasets_are_not_groups() {
        let mut root = Group::new();
        root.put_dataset("d", Dataset::zeros(DType::Uint8, vec![2]).unwrap());
        assert!(root.group("d").is_none());
        assert!(matches!(root.require_group("d/e"), Err(StemError::Malformed { .. })));
        assert_eq!(root.groups().count(), 0);
        assert_eq!(root.child_names().collect::<Vec<_>>(), vec!["d"]);
    }

    #[test]
    fn child_names_are_sorted() {
        let mut root = Group::new();
        for name in ["pl_b", "datacube_10", "datacube_2", "pl_a"] {
            root.create_group(name).unwrap();
        }
        let names: Vec<_> = root.child_names().collect();
        assert_eq!(names, vec!["datacube_10", "datacube_2", "pl_a", "pl_b"]);
    }

    #[test]
    fn dataset_values_saturate_on_narrowing() {
        let ds = Dataset::from_f64(DType::Uint8, vec![3], &[-4.0, 12.0, 300.0]).unwrap();
        assert_eq!(ds.to_f64(), vec![0.0, 12.0, 255.0]);
        assert!(Dataset::from_f64(DType::Uint8, vec![2], &[1.0]).is_err());
    }

    #[test]
    fn oversized_shapes_are_rejected() {
        let huge = vec![1 << 32, 1 << 32, 2, 1];
        assert_eq!(element_count(&huge), None);
        assert_eq!(element_count(&[3, 0, 5]), Some(0));
        assert!(matches!(Dataset::new(DType::Uint8, huge.clone(), Vec::new()), Err(StemError::InvalidOption(_))));
        assert!(matches!(Dataset::from_f64(DType::Uint8, huge.clone(), &[]), Err(StemError::InvalidOption(_))));
        assert!(Dataset::zeros(DType::Uint8, huge).is_err());
        // Fits as an element count, overflows once scaled by the element size.
        assert!(Dataset::zeros(DType::Float64, vec![usize::MAX / 4]).is_err());
    }

    #[test]
    fn detached_copy_owns_its_buffer() {
        let ds = Dataset::from_f64(DType::Float32, vec![2, 2], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        let shared = ds.clone();
        let copy = ds.detached();
        assert!(ds.shares_buffer(&shared));
        assert!(!ds.shares_buffer(&copy));
        assert_eq!(ds, copy);
    }

    #[test]
    fn digest_tracks_content() {
        let mut a = Group::new();
        a.set_attr("k", AttrValue::Int(1));
        let b = a.clone();
        assert_eq!(a.digest(), b.digest());
        a.create_group("child").unwrap();
        assert_ne!(a.digest(), b.digest());
    }
}
