//! Legacy calibration coordinates. Decoded from older files, never written.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::leaf_name;
use crate::tree::{AttrValue, Group};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(default)]
    pub name:   String,
    /// Calibration values such as `R_pixel_size` or `Q_Nx`, verbatim.
    #[serde(default)]
    pub params: BTreeMap<String, AttrValue>,
}

impl Coordinates {
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.params.get(key)
    }
}

pub(crate) fn decode(group: &Group, path: &str) -> Coordinates {
    Coordinates { name: leaf_name(path).to_owned(), params: group.attrs().clone() }
}
