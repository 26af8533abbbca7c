//! JSON batch manifests for `stemstore append`.
//!
//! A manifest is a JSON array (or a single object) of entries tagged by
//! `"type"`.  Any [`DataObject`] kind is accepted, plus `"Metadata"`:
//!
//! ```json
//! [
//!   {"type": "Metadata", "microscope": {"beam_energy": 300}},
//!   {"type": "PointList", "name": "pl_a",
//!    "columns": [{"name": "qx", "dtype": "float32", "values": [1.5, 2.0]}]}
//! ]
//! ```

use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::append::AppendItem;
use crate::error::{Result, StemError};
use crate::metadata::Metadata;
use crate::objects::DataObject;

const METADATA_TAG: &str = "Metadata";

fn parse_entry(mut entry: Value) -> Result<AppendItem> {
    let tag = entry
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| StemError::InvalidOption("manifest entry has no \"type\" tag".into()))?;
    if tag == METADATA_TAG {
        if let Some(map) = entry.as_object_mut() {
            map.remove("type");
        }
        return Ok(AppendItem::Metadata(serde_json::from_value::<Metadata>(entry)?));
    }
    match serde_json::from_value::<DataObject>(entry) {
        Ok(obj) => Ok(AppendItem::Data(obj)),
        // Unknown tags surface as the registry error rather than a serde one.
        Err(e) => match crate::registry::ObjectType::from_name(&tag) {
            Ok(_)    => Err(e.into()),
            Err(unk) => Err(unk),
        },
    }
}

/// Parse a manifest held in memory.
pub fn parse_manifest(text: &str) -> Result<Vec<AppendItem>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(entries) => entries.into_iter().map(parse_entry).collect(),
        single => parse_entry(single).map(|item| vec![item]),
    }
}

pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<Vec<AppendItem>> {
    parse_manifest(&fs::read_to_string(path)?)
}
