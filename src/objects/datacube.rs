//! Dense 4-D datacube: real-space scan (Rx, Ry) × diffraction pattern (Qx, Qy).

use serde::{Deserialize, Serialize};

use super::{leaf_name, require_dataset, DecodeOptions, MemMode};
use crate::error::{Result, StemError};
use crate::metadata::Metadata;
use crate::tree::{element_count, DType, Dataset, Group};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCube {
    #[serde(default)]
    pub name:     String,
    pub data:     Dataset,
    /// Metadata travelling with the cube; written to the topgroup's metadata
    /// namespace on append, never into the cube group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl DataCube {
    pub fn new(name: impl Into<String>, data: Dataset) -> Result<Self> {
        check_4d(&data, "<new datacube>")?;
        Ok(Self { name: name.into(), data, metadata: None })
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

fn check_4d(data: &Dataset, path: &str) -> Result<()> {
    if data.ndim() != 4 {
        return Err(StemError::malformed(path, format!("datacube must be 4-D, got shape {:?}", data.shape())));
    }
    Ok(())
}

pub(crate) fn encode(group: &mut Group, cube: &DataCube) -> Result<()> {
    check_4d(&cube.data, &cube.name)?;
    group.put_dataset("data", cube.data.clone());
    Ok(())
}

pub(crate) fn decode(group: &Group, path: &str, opts: &DecodeOptions) -> Result<DataCube> {
    let stored = require_dataset(group, path, "data")?;
    check_4d(stored, path)?;

    let data = if opts.binfactor > 1 {
        // Binned output is always a fresh array, whatever `mem` asks for.
        if opts.mem == MemMode::Memmap {
            tracing::debug!(path, "binning forces a RAM copy");
        }
        bin_diffraction(stored, opts.binfactor, opts.dtype.unwrap_or(stored.dtype()))?
    } else {
        match opts.mem {
            MemMode::Ram    => stored.detached(),
            MemMode::Memmap => stored.clone(),
        }
    };

    Ok(DataCube { name: leaf_name(path).to_owned(), data, metadata: None })
}

/// Sum diffraction space in `factor × factor` blocks.  Trailing rows and
/// columns that do not fill a block are dropped.
pub fn bin_diffraction(data: &Dataset, factor: usize, dtype: DType) -> Result<Dataset> {
    let &[rx, ry, qx, qy] = data.shape() else {
        return Err(StemError::InvalidOption(format!("cannot bin shape {:?}", data.shape())));
    };
    if factor == 0 {
        return Err(StemError::InvalidOption("binfactor must be a positive integer".into()));
    }
    let (bx, by) = (qx / factor, qy / factor);
    if bx == 0 || by == 0 {
        return Err(StemError::InvalidOption(format!(
            "binfactor {factor} exceeds diffraction shape ({qx}, {qy})"
        )));
    }

    let binned_len = element_count(&[rx, ry, bx, by])
        .ok_or_else(|| StemError::InvalidOption(format!("cannot bin shape {:?}", data.shape())))?;
    let src = data.to_f64();
    let mut out = vec![0.0f64; binned_len];
    for r in 0..rx * ry {
        let src_base = r * qx * qy;
        let out_base = r * bx * by;
        for i in 0..bx * factor {
            for j in 0..by * factor {
                out[out_base + (i / factor) * by + j / factor] += src[src_base + i * qy + j];
            }
        }
    }
    Dataset::from_f64(dtype, vec![rx, ry, bx, by], &out)
}
