//! Electron-counted datacube: a sparse 4-D cube kept as one electron event
//! list per scan position.

use serde::{Deserialize, Serialize};

use super::pointlistarray::{self, PointListArray};
use super::{dims_attr, leaf_name, require_dims};
use crate::error::{Result, StemError};
use crate::tree::Group;

const ATTR_SHAPE: &str = "shape";
const ELECTRONS:  &str = "electrons";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountedDataCube {
    #[serde(default)]
    pub name:      String,
    /// Dense-equivalent shape (Rx, Ry, Qx, Qy).
    pub shape:     [usize; 4],
    /// One event list per scan position; its shape must be (Rx, Ry).
    pub electrons: PointListArray,
}

impl CountedDataCube {
    pub fn scan_shape(&self) -> [usize; 2] {
        [self.shape[0], self.shape[1]]
    }

    pub fn electron_count(&self) -> usize {
        self.electrons.total_points()
    }
}

pub(crate) fn encode(group: &mut Group, cube: &CountedDataCube) -> Result<()> {
    if cube.electrons.shape != cube.scan_shape() {
        return Err(StemError::malformed(
            &cube.name,
            format!("electron grid {:?} does not match scan shape {:?}", cube.electrons.shape, cube.scan_shape()),
        ));
    }
    group.set_attr(ATTR_SHAPE, dims_attr(&cube.shape));
    pointlistarray::encode(group.create_group(ELECTRONS)?, &cube.electrons)
}

pub(crate) fn decode(group: &Group, path: &str) -> Result<CountedDataCube> {
    let dims = require_dims(group, path, ATTR_SHAPE, 4)?;
    let electrons_path = format!("{path}/{ELECTRONS}");
    let electrons = group
        .group(ELECTRONS)
        .ok_or_else(|| StemError::malformed(path, "missing 'electrons' group"))
        .and_then(|g| pointlistarray::decode(g, &electrons_path))?;
    Ok(CountedDataCube {
        name: leaf_name(path).to_owned(),
        shape: [dims[0], dims[1], dims[2], dims[3]],
        electrons,
    })
}

pub(crate) fn shape(group: &Group, path: &str) -> Result<Vec<usize>> {
    require_dims(group, path, ATTR_SHAPE, 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Field;
    use crate::tree::DType;

    fn counted() -> CountedDataCube {
        let fields = vec![Field::new("qx", DType::Uint16), Field::new("qy", DType::Uint16)];
        let mut electrons = PointListArray::new(ELECTRONS, [2, 2], fields).unwrap();
        electrons.get_mut(0, 0).unwrap().push(&[12.0, 40.0]).unwrap();
        CountedDataCube { name: "events".into(), shape: [2, 2, 64, 64], electrons }
    }

    #[test]
    fn counted_cube_survives_encoding() {
        let mut g = Group::new();
        encode(&mut g, &counted()).unwrap();
        let back = decode(&g, "tg/data/counted_datacubes/events").unwrap();
        assert_eq!(back, counted());
        assert_eq!(back.electron_count(), 1);
        assert_eq!(shape(&g, "events").unwrap(), vec![2, 2, 64, 64]);
    }

    #[test]
    fn electron_grid_must_match_scan() {
        let mut c = counted();
        c.shape[0] = 3;
        assert!(encode(&mut Group::new(), &c).is_err());
    }
}
