//! Type registry: the closed set of data-object kinds.
//!
//! Each [`ObjectType`] maps to a fixed sub-group of its topgroup, an
//! auto-name prefix and its encode/decode functions.  The table is an
//! exhaustive `match`, so adding a kind without registering it does not
//! compile.  [`ObjectType::ALL`] is also the order of the global index.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, StemError};
use crate::objects::{self, DataObject, DecodeOptions};
use crate::tree::Group;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    DataCube,
    CountedDataCube,
    DiffractionSlice,
    RealSlice,
    PointList,
    PointListArray,
    Coordinates,
}

/// Static registry entry for one kind.
#[derive(Debug)]
pub struct TypeSpec {
    pub tag:      ObjectType,
    /// Path of the type group, relative to the topgroup.
    pub group:    &'static str,
    /// Auto-name prefix; the object count is appended.
    pub prefix:   &'static str,
    /// Read-only kinds are decoded but never appended.
    pub writable: bool,
}

const DATACUBE: TypeSpec = TypeSpec {
    tag: ObjectType::DataCube, group: "data/datacubes", prefix: "datacube_", writable: true,
};
const COUNTED_DATACUBE: TypeSpec = TypeSpec {
    tag: ObjectType::CountedDataCube, group: "data/counted_datacubes", prefix: "counted_data_cube_", writable: true,
};
const DIFFRACTION_SLICE: TypeSpec = TypeSpec {
    tag: ObjectType::DiffractionSlice, group: "data/diffractionslices", prefix: "diffractionslice_", writable: true,
};
const REAL_SLICE: TypeSpec = TypeSpec {
    tag: ObjectType::RealSlice, group: "data/realslices", prefix: "realslice_", writable: true,
};
const POINT_LIST: TypeSpec = TypeSpec {
    tag: ObjectType::PointList, group: "data/pointlists", prefix: "pointlist_", writable: true,
};
const POINT_LIST_ARRAY: TypeSpec = TypeSpec {
    tag: ObjectType::PointListArray, group: "data/pointlistarrays", prefix: "pointlistarray_", writable: true,
};
const COORDINATES: TypeSpec = TypeSpec {
    tag: ObjectType::Coordinates, group: "data/coordinates", prefix: "coordinates_", writable: false,
};

impl ObjectType {
    /// Fixed type order of the global index.
    pub const ALL: [ObjectType; 7] = [
        ObjectType::DataCube,
        ObjectType::CountedDataCube,
        ObjectType::DiffractionSlice,
        ObjectType::RealSlice,
        ObjectType::PointList,
        ObjectType::PointListArray,
        ObjectType::Coordinates,
    ];

    pub fn spec(self) -> &'static TypeSpec {
        match self {
            ObjectType::DataCube         => &DATACUBE,
            ObjectType::CountedDataCube  => &COUNTED_DATACUBE,
            ObjectType::DiffractionSlice => &DIFFRACTION_SLICE,
            ObjectType::RealSlice        => &REAL_SLICE,
            ObjectType::PointList        => &POINT_LIST,
            ObjectType::PointListArray   => &POINT_LIST_ARRAY,
            ObjectType::Coordinates      => &COORDINATES,
        }
    }

    pub fn group_path(self) -> &'static str { self.spec().group }
    pub fn prefix(self) -> &'static str { self.spec().prefix }

    pub fn name(self) -> &'static str {
        match self {
            ObjectType::DataCube         => "DataCube",
            ObjectType::CountedDataCube  => "CountedDataCube",
            ObjectType::DiffractionSlice => "DiffractionSlice",
            ObjectType::RealSlice        => "RealSlice",
            ObjectType::PointList        => "PointList",
            ObjectType::PointListArray   => "PointListArray",
            ObjectType::Coordinates      => "Coordinates",
        }
    }

    pub fn from_name(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| StemError::UnknownType(s.to_owned()))
    }

    /// Fails with `UnknownType` for kinds that cannot be appended.
    pub fn require_writable(self) -> Result<&'static TypeSpec> {
        let spec = self.spec();
        if spec.writable {
            Ok(spec)
        } else {
            Err(StemError::UnknownType(format!("{} (read-only)", self.name())))
        }
    }

    /// Type group inside `topgroup`, if the layout has one.
    pub fn group_in(self, topgroup: &Group) -> Option<&Group> {
        topgroup.group(self.group_path())
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Codec dispatch ───────────────────────────────────────────────────────────

/// Populate a freshly created object group.
pub fn encode(group: &mut Group, object: &DataObject) -> Result<()> {
    object.object_type().require_writable()?;
    match object {
        DataObject::DataCube(c)         => objects::datacube::encode(group, c),
        DataObject::CountedDataCube(c)  => objects::counted::encode(group, c),
        DataObject::DiffractionSlice(s) => objects::slice::encode(group, s),
        DataObject::RealSlice(s)        => objects::slice::encode(group, s),
        DataObject::PointList(p)        => objects::pointlist::encode(group, p),
        DataObject::PointListArray(p)   => objects::pointlistarray::encode(group, p),
        DataObject::Coordinates(_)      => Err(StemError::UnknownType("Coordinates".into())),
    }
}

/// Decode the object stored in `group`; `path` is its full path, whose last
/// segment is the object name.  Options only affect dense arrays.
pub fn decode(ty: ObjectType, group: &Group, path: &str, opts: &DecodeOptions) -> Result<DataObject> {
    Ok(match ty {
        ObjectType::DataCube         => DataObject::DataCube(objects::datacube::decode(group, path, opts)?),
        ObjectType::CountedDataCube  => DataObject::CountedDataCube(objects::counted::decode(group, path)?),
        ObjectType::DiffractionSlice => DataObject::DiffractionSlice(objects::slice::decode(group, path)?),
        ObjectType::RealSlice        => DataObject::RealSlice(objects::slice::decode(group, path)?),
        ObjectType::PointList        => DataObject::PointList(objects::pointlist::decode(group, path)?),
        ObjectType::PointListArray   => DataObject::PointListArray(objects::pointlistarray::decode(group, path)?),
        ObjectType::Coordinates      => DataObject::Coordinates(objects::coordinates::decode(group, path)),
    })
}

/// Shape shown in the summary table, read without decoding payloads.
pub fn shape(ty: ObjectType, group: &Group, path: &str) -> Result<Vec<usize>> {
    match ty {
        ObjectType::DataCube
            | ObjectType::DiffractionSlice
            | ObjectType::RealSlice      => objects::data_shape(group, path),
        ObjectType::CountedDataCube      => objects::counted::shape(group, path),
        ObjectType::PointList            => objects::pointlist::shape(group, path),
        ObjectType::PointListArray       => objects::pointlistarray::shape(group, path),
        ObjectType::Coordinates          => Ok(Vec::new()),
    }
}
