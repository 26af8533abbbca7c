//! Binary encoding of a [`Group`] tree.
//!
//! All integers are little-endian.  Strings are `u32` length + UTF-8 bytes.
//!
//! ```text
//! group   := u32 n_attrs, (str key, attr)*, u32 n_children, (str name, node)*
//! attr    := u8 tag, payload
//! node    := u8 0, group | u8 1, dataset
//! dataset := u8 dtype, u32 ndim, u64 dim*, u64 n_bytes, bytes
//! ```

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::{element_count, AttrValue, DType, Dataset, Group, Node};

const ATTR_BOOL:       u8 = 0;
const ATTR_INT:        u8 = 1;
const ATTR_FLOAT:      u8 = 2;
const ATTR_STR:        u8 = 3;
const ATTR_INT_LIST:   u8 = 4;
const ATTR_FLOAT_LIST: u8 = 5;
const ATTR_STR_LIST:   u8 = 6;

const NODE_GROUP:   u8 = 0;
const NODE_DATASET: u8 = 1;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

// ── Write ─────────────────────────────────────────────────────────────────────

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_u32::<LittleEndian>(s.len() as u32)?;
    w.write_all(s.as_bytes())
}

fn write_attr<W: Write>(w: &mut W, v: &AttrValue) -> io::Result<()> {
    match v {
        AttrValue::Bool(b) => {
            w.write_u8(ATTR_BOOL)?;
            w.write_u8(*b as u8)
        }
        AttrValue::Int(i) => {
            w.write_u8(ATTR_INT)?;
            w.write_i64::<LittleEndian>(*i)
        }
        AttrValue::Float(f) => {
            w.write_u8(ATTR_FLOAT)?;
            w.write_f64::<LittleEndian>(*f)
        }
        AttrValue::Str(s) => {
            w.write_u8(ATTR_STR)?;
            write_str(w, s)
        }
        AttrValue::IntList(v) => {
            w.write_u8(ATTR_INT_LIST)?;
            w.write_u32::<LittleEndian>(v.len() as u32)?;
            v.iter().try_for_each(|i| w.write_i64::<LittleEndian>(*i))
        }
        AttrValue::FloatList(v) => {
            w.write_u8(ATTR_FLOAT_LIST)?;
            w.write_u32::<LittleEndian>(v.len() as u32)?;
            v.iter().try_for_each(|f| w.write_f64::<LittleEndian>(*f))
        }
        AttrValue::StrList(v) => {
            w.write_u8(ATTR_STR_LIST)?;
            w.write_u32::<LittleEndian>(v.len() as u32)?;
            v.iter().try_for_each(|s| write_str(w, s))
        }
    }
}

fn write_dataset<W: Write>(w: &mut W, d: &Dataset) -> io::Result<()> {
    w.write_u8(d.dtype as u8)?;
    w.write_u32::<LittleEndian>(d.shape.len() as u32)?;
    for &dim in &d.shape {
        w.write_u64::<LittleEndian>(dim as u64)?;
    }
    w.write_u64::<LittleEndian>(d.data.len() as u64)?;
    w.write_all(&d.data)
}

pub fn write_group<W: Write>(w: &mut W, g: &Group) -> io::Result<()> {
    w.write_u32::<LittleEndian>(g.attrs.len() as u32)?;
    for (k, v) in &g.attrs {
        write_str(w, k)?;
        write_attr(w, v)?;
    }
    w.write_u32::<LittleEndian>(g.children.len() as u32)?;
    for (name, node) in &g.children {
        write_str(w, name)?;
        match node {
            Node::Group(child) => {
                w.write_u8(NODE_GROUP)?;
                write_group(w, child)?;
            }
            Node::Dataset(d) => {
                w.write_u8(NODE_DATASET)?;
                write_dataset(w, d)?;
            }
        }
    }
    Ok(())
}

pub fn group_to_bytes(g: &Group) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    write_group(&mut out, g)?;
    Ok(out)
}

// ── Read ──────────────────────────────────────────────────────────────────────

fn read_bytes<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated tree"));
    }
    Ok(buf)
}

fn read_str<R: Read>(r: &mut R) -> io::Result<String> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    String::from_utf8(read_bytes(r, len)?).map_err(|e| invalid(e.to_string()))
}

fn read_attr<R: Read>(r: &mut R) -> io::Result<AttrValue> {
    let tag = r.read_u8()?;
    Ok(match tag {
        ATTR_BOOL  => AttrValue::Bool(r.read_u8()? != 0),
        ATTR_INT   => AttrValue::Int(r.read_i64::<LittleEndian>()?),
        ATTR_FLOAT => AttrValue::Float(r.read_f64::<LittleEndian>()?),
        ATTR_STR   => AttrValue::Str(read_str(r)?),
        ATTR_INT_LIST => {
            let n = r.read_u32::<LittleEndian>()?;
            AttrValue::IntList((0..n).map(|_| r.read_i64::<LittleEndian>()).collect::<io::Result<_>>()?)
        }
        ATTR_FLOAT_LIST => {
            let n = r.read_u32::<LittleEndian>()?;
            AttrValue::FloatList((0..n).map(|_| r.read_f64::<LittleEndian>()).collect::<io::Result<_>>()?)
        }
        ATTR_STR_LIST => {
            let n = r.read_u32::<LittleEndian>()?;
            AttrValue::StrList((0..n).map(|_| read_str(r)).collect::<io::Result<_>>()?)
        }
        other => return Err(invalid(format!("unknown attribute tag {other}"))),
    })
}

fn read_dataset<R: Read>(r: &mut R) -> io::Result<Dataset> {
    let tag = r.read_u8()?;
    let dtype = DType::from_tag(tag).ok_or_else(|| invalid(format!("unknown dtype tag {tag}")))?;
    let ndim = r.read_u32::<LittleEndian>()?;
    let shape = (0..ndim)
        .map(|_| {
            let d = r.read_u64::<LittleEndian>()?;
            usize::try_from(d).map_err(|_| invalid(format!("dataset dimension {d} out of range")))
        })
        .collect::<io::Result<Vec<_>>>()?;
    let expected = element_count(&shape)
        .and_then(|n| n.checked_mul(dtype.size()))
        .ok_or_else(|| invalid(format!("dataset shape {shape:?} is too large")))?;
    let len = r.read_u64::<LittleEndian>()?;
    if len != expected as u64 {
        return Err(invalid(format!("dataset of shape {shape:?} ({dtype}) stores {len} bytes, expected {expected}")));
    }
    let bytes = read_bytes(r, expected)?;
    Dataset::new(dtype, shape, bytes).map_err(|e| invalid(e.to_string()))
}

pub fn read_group<R: Read>(r: &mut R) -> io::Result<Group> {
    let mut g = Group::new();
    let n_attrs = r.read_u32::<LittleEndian>()?;
    for _ in 0..n_attrs {
        let key = read_str(r)?;
        let value = read_attr(r)?;
        g.attrs.insert(key, value);
    }
    let n_children = r.read_u32::<LittleEndian>()?;
    for _ in 0..n_children {
        let name = read_str(r)?;
        let node = match r.read_u8()? {
            NODE_GROUP   => Node::Group(read_group(r)?),
            NODE_DATASET => Node::Dataset(read_dataset(r)?),
            other        => return Err(invalid(format!("unknown node tag {other}"))),
        };
        g.children.insert(name, node);
    }
    Ok(g)
}
