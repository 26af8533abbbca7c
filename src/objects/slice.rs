//! 2-D slices of a datacube: diffraction-space or real-space images,
//! optionally stacked along a third axis with one label per slice.

use serde::{Deserialize, Serialize};

use super::{leaf_name, require_dataset};
use crate::error::{Result, StemError};
use crate::tree::{AttrValue, Dataset, Group};

const ATTR_SLICELABELS: &str = "slicelabels";

/// Shared payload of `DiffractionSlice` and `RealSlice`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    #[serde(default)]
    pub name:        String,
    pub data:        Dataset,
    #[serde(default)]
    pub slicelabels: Vec<String>,
}

impl Slice {
    pub fn new(name: impl Into<String>, data: Dataset) -> Self {
        Self { name: name.into(), data, slicelabels: Vec::new() }
    }

    pub fn depth(&self) -> usize {
        if self.data.ndim() == 3 { self.data.shape()[2] } else { 1 }
    }

    fn validate(&self, path: &str) -> Result<()> {
        match self.data.ndim() {
            2 if self.slicelabels.is_empty() => Ok(()),
            3 if self.slicelabels.is_empty() || self.slicelabels.len() == self.depth() => Ok(()),
            2 | 3 => Err(StemError::malformed(
                path,
                format!("{} slice labels for depth {}", self.slicelabels.len(), self.depth()),
            )),
            n => Err(StemError::malformed(path, format!("slice must be 2-D or 3-D, got {n}-D"))),
        }
    }
}

pub(crate) fn encode(group: &mut Group, slice: &Slice) -> Result<()> {
    slice.validate(&slice.name)?;
    group.put_dataset("data", slice.data.clone());
    if !slice.slicelabels.is_empty() {
        group.set_attr(ATTR_SLICELABELS, AttrValue::StrList(slice.slicelabels.clone()));
    }
    Ok(())
}

pub(crate) fn decode(group: &Group, path: &str) -> Result<Slice> {
    let data = require_dataset(group, path, "data")?.detached();
    let slicelabels = match group.attr(ATTR_SLICELABELS) {
        Some(v) => v
            .as_str_list()
            .ok_or_else(|| StemError::malformed(path, "'slicelabels' must be a string list"))?
            .into_iter()
            .map(str::to_owned)
            .collect(),
        None => Vec::new(),
    };
    let slice = Slice { name: leaf_name(path).to_owned(), data, slicelabels };
    slice.validate(path)?;
    Ok(slice)
}
