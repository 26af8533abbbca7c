//! Sparse point list: a table of named, typed columns of equal length.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{leaf_name, require_dataset};
use crate::error::{Result, StemError};
use crate::tree::{AttrValue, DType, Dataset, Group};

pub const ATTR_COORDINATES: &str = "coordinates";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name:  String,
    pub dtype: DType,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DType) -> Self {
        Self { name: name.into(), dtype }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name:   String,
    pub dtype:  DType,
    #[serde(default)]
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointList {
    #[serde(default)]
    pub name:    String,
    pub columns: Vec<Column>,
}

impl PointList {
    /// Empty list with the given fields.
    pub fn new(name: impl Into<String>, fields: &[Field]) -> Self {
        let columns = fields
            .iter()
            .map(|f| Column { name: f.name.clone(), dtype: f.dtype, values: Vec::new() })
            .collect();
        Self { name: name.into(), columns }
    }

    pub fn fields(&self) -> Vec<Field> {
        self.columns.iter().map(|c| Field::new(c.name.clone(), c.dtype)).collect()
    }

    /// Number of points. Assumes equal column lengths, which `encode` checks.
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one point, one value per column in column order.
    pub fn push(&mut self, point: &[f64]) -> Result<()> {
        if point.len() != self.columns.len() {
            return Err(StemError::InvalidOption(format!(
                "point has {} values, list has {} fields",
                point.len(),
                self.columns.len()
            )));
        }
        for (col, &v) in self.columns.iter_mut().zip(point) {
            col.values.push(v);
        }
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn validate(&self, path: &str) -> Result<()> {
        let mut seen = HashSet::new();
        for c in &self.columns {
            if !seen.insert(c.name.as_str()) {
                return Err(StemError::malformed(path, format!("duplicate field '{}'", c.name)));
            }
            if c.values.len() != self.len() {
                return Err(StemError::malformed(path, "point list columns differ in length"));
            }
        }
        Ok(())
    }
}

pub(crate) fn encode(group: &mut Group, list: &PointList) -> Result<()> {
    list.validate(&list.name)?;
    let names = list.columns.iter().map(|c| c.name.clone()).collect();
    group.set_attr(ATTR_COORDINATES, AttrValue::StrList(names));
    for c in &list.columns {
        group.put_dataset(c.name.clone(), Dataset::from_f64(c.dtype, vec![c.values.len()], &c.values)?);
    }
    Ok(())
}

fn field_names<'a>(group: &'a Group, path: &str) -> Result<Vec<&'a str>> {
    group
        .attr(ATTR_COORDINATES)
        .and_then(AttrValue::as_str_list)
        .ok_or_else(|| StemError::malformed(path, "missing 'coordinates' attribute"))
}

pub(crate) fn decode(group: &Group, path: &str) -> Result<PointList> {
    let mut columns = Vec::new();
    for name in field_names(group, path)? {
        let ds = require_dataset(group, path, name)?;
        columns.push(Column { name: name.to_owned(), dtype: ds.dtype(), values: ds.to_f64() });
    }
    let list = PointList { name: leaf_name(path).to_owned(), columns };
    list.validate(path)?;
    Ok(list)
}

pub(crate) fn shape(group: &Group, path: &str) -> Result<Vec<usize>> {
    let len = match field_names(group, path)?.first() {
        Some(name) => require_dataset(group, path, name)?.len(),
        None       => 0,
    };
    Ok(vec![len])
}
