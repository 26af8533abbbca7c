//! A 2-D grid of point lists sharing one set of fields, e.g. the Bragg
//! peaks found at each scan position.

use serde::{Deserialize, Serialize};

use super::pointlist::{self, Field, PointList, ATTR_COORDINATES};
use super::{dims_attr, leaf_name, require_dims};
use crate::error::{Result, StemError};
use crate::tree::{AttrValue, DType, Group};

const ATTR_SHAPE:  &str = "shape";
const ATTR_DTYPES: &str = "dtypes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointListArray {
    #[serde(default)]
    pub name:   String,
    pub shape:  [usize; 2],
    pub fields: Vec<Field>,
    /// Row-major cells; empty means every cell is empty.
    #[serde(default)]
    pub lists:  Vec<PointList>,
}

fn cell_count([rx, ry]: [usize; 2]) -> Option<usize> {
    rx.checked_mul(ry)
}

fn cell_name(i: usize, j: usize) -> String {
    format!("{i}_{j}")
}

impl PointListArray {
    pub fn new(name: impl Into<String>, shape: [usize; 2], fields: Vec<Field>) -> Result<Self> {
        let cells = cell_count(shape)
            .ok_or_else(|| StemError::InvalidOption(format!("point list array shape {shape:?} is too large")))?;
        let lists = (0..cells)
            .map(|k| PointList::new(cell_name(k / shape[1], k % shape[1]), &fields))
            .collect();
        Ok(Self { name: name.into(), shape, fields, lists })
    }

    fn cell_index(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.shape[0] || j >= self.shape[1] {
            return None;
        }
        i.checked_mul(self.shape[1])?.checked_add(j)
    }

    pub fn get(&self, i: usize, j: usize) -> Option<&PointList> {
        self.lists.get(self.cell_index(i, j)?)
    }

    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut PointList> {
        let idx = self.cell_index(i, j)?;
        self.lists.get_mut(idx)
    }

    /// Total points over all cells.
    pub fn total_points(&self) -> usize {
        self.lists.iter().map(PointList::len).sum()
    }
}

pub(crate) fn encode(group: &mut Group, pla: &PointListArray) -> Result<()> {
    let [rx, ry] = pla.shape;
    let cells = cell_count(pla.shape)
        .ok_or_else(|| StemError::InvalidOption(format!("point list array shape {:?} is too large", pla.shape)))?;
    if !pla.lists.is_empty() && pla.lists.len() != cells {
        return Err(StemError::malformed(
            &pla.name,
            format!("{} cells for shape {:?}", pla.lists.len(), pla.shape),
        ));
    }
    if let Some(bad) = pla.lists.iter().find(|l| l.fields() != pla.fields) {
        return Err(StemError::malformed(&pla.name, format!("cell '{}' has mismatched fields", bad.name)));
    }

    group.set_attr(ATTR_SHAPE, dims_attr(&pla.shape));
    group.set_attr(ATTR_COORDINATES, AttrValue::StrList(pla.fields.iter().map(|f| f.name.clone()).collect()));
    group.set_attr(ATTR_DTYPES, AttrValue::StrList(pla.fields.iter().map(|f| f.dtype.name().to_owned()).collect()));

    let empty = PointList::new("", &pla.fields);
    for i in 0..rx {
        for j in 0..ry {
            let cell = pla.lists.get(i * ry + j).unwrap_or(&empty);
            pointlist::encode(group.create_group(&cell_name(i, j))?, cell)?;
        }
    }
    Ok(())
}

pub(crate) fn decode(group: &Group, path: &str) -> Result<PointListArray> {
    let dims = require_dims(group, path, ATTR_SHAPE, 2)?;
    let shape = [dims[0], dims[1]];

    let names = group.attr(ATTR_COORDINATES).and_then(AttrValue::as_str_list);
    let dtypes = group.attr(ATTR_DTYPES).and_then(AttrValue::as_str_list);
    let (Some(names), Some(dtypes)) = (names, dtypes) else {
        return Err(StemError::malformed(path, "missing 'coordinates' or 'dtypes' attribute"));
    };
    if names.len() != dtypes.len() {
        return Err(StemError::malformed(path, "'coordinates' and 'dtypes' differ in length"));
    }
    let fields = names
        .iter()
        .zip(&dtypes)
        .map(|(n, d)| {
            DType::from_name(d)
                .map(|dt| Field::new(*n, dt))
                .ok_or_else(|| StemError::malformed(path, format!("unknown dtype '{d}'")))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut pla = PointListArray::new(leaf_name(path), shape, fields)
        .map_err(|_| StemError::malformed(path, format!("shape {shape:?} is too large")))?;
    for i in 0..shape[0] {
        for j in 0..shape[1] {
            let name = cell_name(i, j);
            if let Some(cell) = group.group(&name) {
                let list = pointlist::decode(cell, &format!("{path}/{name}"))?;
                if list.fields() != pla.fields {
                    return Err(StemError::malformed(path, format!("cell '{name}' has mismatched fields")));
                }
                pla.lists[i * shape[1] + j] = list;
            }
        }
    }
    Ok(pla)
}

pub(crate) fn shape(group: &Group, path: &str) -> Result<Vec<usize>> {
    require_dims(group, path, ATTR_SHAPE, 2)
}
