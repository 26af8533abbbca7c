//! Data-object kinds and their group encodings.
//!
//! [`DataObject`] is the closed sum over every registered kind.  Each kind's
//! module owns how it is laid out inside its object group; nothing outside
//! those modules looks at payload structure.

pub mod coordinates;
pub mod counted;
pub mod datacube;
pub mod pointlist;
pub mod pointlistarray;
pub mod slice;

pub use coordinates::Coordinates;
pub use counted::CountedDataCube;
pub use datacube::DataCube;
pub use pointlist::{Column, Field, PointList};
pub use pointlistarray::PointListArray;
pub use slice::Slice;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Result, StemError};
use crate::registry::ObjectType;
use crate::tree::{AttrValue, DType, Dataset, Group};

// ── DataObject ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DataObject {
    DataCube(DataCube),
    CountedDataCube(CountedDataCube),
    DiffractionSlice(Slice),
    RealSlice(Slice),
    PointList(PointList),
    PointListArray(PointListArray),
    Coordinates(Coordinates),
}

impl DataObject {
    pub fn object_type(&self) -> ObjectType {
        match self {
            DataObject::DataCube(_)         => ObjectType::DataCube,
            DataObject::CountedDataCube(_)  => ObjectType::CountedDataCube,
            DataObject::DiffractionSlice(_) => ObjectType::DiffractionSlice,
            DataObject::RealSlice(_)        => ObjectType::RealSlice,
            DataObject::PointList(_)        => ObjectType::PointList,
            DataObject::PointListArray(_)   => ObjectType::PointListArray,
            DataObject::Coordinates(_)      => ObjectType::Coordinates,
        }
    }

    /// Object name; empty until assigned.
    pub fn name(&self) -> &str {
        match self {
            DataObject::DataCube(o)         => &o.name,
            DataObject::CountedDataCube(o)  => &o.name,
            DataObject::DiffractionSlice(o) => &o.name,
            DataObject::RealSlice(o)        => &o.name,
            DataObject::PointList(o)        => &o.name,
            DataObject::PointListArray(o)   => &o.name,
            DataObject::Coordinates(o)      => &o.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            DataObject::DataCube(o)         => o.name = name,
            DataObject::CountedDataCube(o)  => o.name = name,
            DataObject::DiffractionSlice(o) => o.name = name,
            DataObject::RealSlice(o)        => o.name = name,
            DataObject::PointList(o)        => o.name = name,
            DataObject::PointListArray(o)   => o.name = name,
            DataObject::Coordinates(o)      => o.name = name,
        }
    }
}

impl From<DataCube> for DataObject {
    fn from(v: DataCube) -> Self { DataObject::DataCube(v) }
}

impl From<CountedDataCube> for DataObject {
    fn from(v: CountedDataCube) -> Self { DataObject::CountedDataCube(v) }
}

impl From<PointList> for DataObject {
    fn from(v: PointList) -> Self { DataObject::PointList(v) }
}

impl From<PointListArray> for DataObject {
    fn from(v: PointListArray) -> Self { DataObject::PointListArray(v) }
}

// ── DecodeOptions ─────────────────────────────────────────────────────────────

/// How a dense array is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemMode {
    /// Decoded array owns a private copy.
    #[default]
    Ram,
    /// Decoded array shares the store's buffer.
    Memmap,
}

impl FromStr for MemMode {
    type Err = StemError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "RAM"    => Ok(MemMode::Ram),
            "MEMMAP" => Ok(MemMode::Memmap),
            _        => Err(StemError::InvalidOption(format!("mem must be RAM or MEMMAP (got '{s}')"))),
        }
    }
}

/// Options forwarded to decoders. Only the dense-array decoder reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOptions {
    pub mem:       MemMode,
    /// Diffraction-space binning factor, >= 1.
    pub binfactor: usize,
    /// Element kind of binned output; defaults to the stored kind.
    pub dtype:     Option<DType>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { mem: MemMode::Ram, binfactor: 1, dtype: None }
    }
}

// ── Group helpers shared by the kind modules ─────────────────────────────────

pub(crate) fn leaf_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

pub(crate) fn require_dataset<'a>(g: &'a Group, path: &str, name: &str) -> Result<&'a Dataset> {
    g.dataset(name)
        .ok_or_else(|| StemError::malformed(path, format!("missing dataset '{name}'")))
}

pub(crate) fn require_dims(g: &Group, path: &str, key: &str, n: usize) -> Result<Vec<usize>> {
    let dims = g
        .attr(key)
        .and_then(AttrValue::as_int_list)
        .ok_or_else(|| StemError::malformed(path, format!("missing integer list attribute '{key}'")))?;
    if dims.len() != n || dims.iter().any(|&d| d < 0) {
        return Err(StemError::malformed(path, format!("'{key}' must hold {n} non-negative integers")));
    }
    Ok(dims.iter().map(|&d| d as usize).collect())
}

pub(crate) fn dims_attr(dims: &[usize]) -> AttrValue {
    AttrValue::IntList(dims.iter().map(|&d| d as i64).collect())
}

/// Shape of the `data` dataset of dense kinds.
pub(crate) fn data_shape(g: &Group, path: &str) -> Result<Vec<usize>> {
    Ok(require_dataset(g, path, "data")?.shape().to_vec())
}
