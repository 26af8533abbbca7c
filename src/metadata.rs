//! File metadata: five attribute sections under `<topgroup>/metadata`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::append::Overwrite;
use crate::error::Result;
use crate::tree::{AttrValue, Group};

pub const METADATA_GROUP: &str = "metadata";
pub const SECTIONS: [&str; 5] = ["microscope", "sample", "user", "calibration", "comments"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub microscope:  BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub sample:      BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub user:        BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub calibration: BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub comments:    BTreeMap<String, AttrValue>,
}

impl Metadata {
    /// Sections in [`SECTIONS`] order.
    pub fn sections(&self) -> [(&'static str, &BTreeMap<String, AttrValue>); 5] {
        [
            (SECTIONS[0], &self.microscope),
            (SECTIONS[1], &self.sample),
            (SECTIONS[2], &self.user),
            (SECTIONS[3], &self.calibration),
            (SECTIONS[4], &self.comments),
        ]
    }

    fn section_mut(&mut self, name: &str) -> Option<&mut BTreeMap<String, AttrValue>> {
        match name {
            "microscope"  => Some(&mut self.microscope),
            "sample"      => Some(&mut self.sample),
            "user"        => Some(&mut self.user),
            "calibration" => Some(&mut self.calibration),
            "comments"    => Some(&mut self.comments),
            _             => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections().iter().all(|(_, s)| s.is_empty())
    }
}

/// Merge `md` into the topgroup's metadata sections.
///
/// With [`Overwrite::None`] keys already present keep their stored value;
/// otherwise incoming values replace them.  Returns the number of keys
/// written.
pub fn write_metadata(topgroup: &mut Group, md: &Metadata, overwrite: Overwrite) -> Result<usize> {
    let root = topgroup.require_group(METADATA_GROUP)?;
    let mut written = 0;
    for (section, values) in md.sections() {
        let group = root.require_group(section)?;
        for (key, value) in values {
            if group.attr(key).is_some() && !overwrite.replaces_existing() {
                tracing::debug!(section, key = key.as_str(), "metadata key kept");
                continue;
            }
            group.set_attr(key.clone(), value.clone());
            written += 1;
        }
    }
    Ok(written)
}

/// Metadata stored in a topgroup. Missing sections read as empty.
pub fn read_metadata(topgroup: &Group) -> Metadata {
    let mut md = Metadata::default();
    let Some(root) = topgroup.group(METADATA_GROUP) else {
        return md;
    };
    for section in SECTIONS {
        if let (Some(group), Some(target)) = (root.group(section), md.section_mut(section)) {
            *target = group.attrs().clone();
        }
    }
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(key: &str, value: &str) -> Metadata {
        let mut md = Metadata::default();
        md.microscope.insert(key.into(), value.into());
        md
    }

    #[test]
    fn no_overwrite_keeps_existing_keys() {
        let mut tg = Group::new();
        write_metadata(&mut tg, &md("beam_energy", "300kV"), Overwrite::None).unwrap();

        let mut update = md("beam_energy", "80kV");
        update.sample.insert("name".into(), "MoS2".into());
        assert_eq!(write_metadata(&mut tg, &update, Overwrite::None).unwrap(), 1);

        let back = read_metadata(&tg);
        assert_eq!(back.microscope["beam_energy"], AttrValue::from("300kV"));
        assert_eq!(back.sample["name"], AttrValue::from("MoS2"));
    }

    #[test]
    fn soft_overwrite_replaces_keys() {
        let mut tg = Group::new();
        write_metadata(&mut tg, &md("beam_energy", "300kV"), Overwrite::None).unwrap();
        write_metadata(&mut tg, &md("beam_energy", "80kV"), Overwrite::Soft).unwrap();
        assert_eq!(read_metadata(&tg).microscope["beam_energy"], AttrValue::from("80kV"));
    }

    #[test]
    fn missing_namespace_reads_empty() {
        assert!(read_metadata(&Group::new()).is_empty());
    }
}
