use serde_json::Value;
use std::str::FromStr;

use crate::error::{Result, StemError};

/// One object reference: global index or exact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Index(i64),
    Name(String),
}

/// What to read: a single key, or an ordered (possibly mixed) list of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    One(Key),
    List(Vec<Key>),
}

impl From<i64> for Selector {
    fn from(i: i64) -> Self { Selector::One(Key::Index(i)) }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self { Selector::One(Key::Name(s.to_owned())) }
}

impl From<String> for Selector {
    fn from(s: String) -> Self { Selector::One(Key::Name(s)) }
}

impl From<Vec<Key>> for Selector {
    fn from(keys: Vec<Key>) -> Self { Selector::List(keys) }
}

impl Key {
    fn from_json(v: &Value) -> Result<Self> {
        match v {
            Value::Number(n) => n
                .as_i64()
                .map(Key::Index)
                .ok_or_else(|| StemError::InvalidSelector(format!("{n} is not an integer index"))),
            Value::String(s) => Ok(Key::Name(s.clone())),
            other => Err(StemError::InvalidSelector(format!(
                "data must be specified with strings or integers only (got {other})"
            ))),
        }
    }
}

impl TryFrom<&Value> for Selector {
    type Error = StemError;
    fn try_from(v: &Value) -> Result<Self> {
        match v {
            Value::Array(items) => items.iter().map(Key::from_json).collect::<Result<_>>().map(Selector::List),
            scalar              => Key::from_json(scalar).map(Selector::One),
        }
    }
}

impl FromStr for Selector {
    type Err = StemError;

    /// A JSON array is a list selector, an integer literal an index, and any
    /// other non-empty text a name.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(StemError::InvalidSelector("empty selector".into()));
        }
        if s.starts_with('[') {
            let v: Value = serde_json::from_str(s)
                .map_err(|e| StemError::InvalidSelector(format!("bad list selector: {e}")))?;
            return Selector::try_from(&v);
        }
        Ok(match s.parse::<i64>() {
            Ok(i)  => Selector::One(Key::Index(i)),
            Err(_) => Selector::One(Key::Name(s.to_owned())),
        })
    }
}

impl Selector {
    /// Combine repeated CLI arguments: one argument keeps its own shape,
    /// several become a list.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        match args {
            []    => Err(StemError::InvalidSelector("no selector given".into())),
            [one] => one.as_ref().parse(),
            many  => {
                let mut keys = Vec::with_capacity(many.len());
                for arg in many {
                    match arg.as_ref().parse()? {
                        Selector::One(k)   => keys.push(k),
                        Selector::List(ks) => keys.extend(ks),
                    }
                }
                Ok(Selector::List(keys))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_strings_parse_by_shape() {
        assert_eq!("3".parse::<Selector>().unwrap(), Selector::from(3i64));
        assert_eq!("-1".parse::<Selector>().unwrap(), Selector::from(-1i64));
        assert_eq!("datacube_0".parse::<Selector>().unwrap(), Selector::from("datacube_0"));
        assert!("  ".parse::<Selector>().is_err());
    }

    #[test]
    fn mixed_lists_keep_order() {
        let sel: Selector = r#"[2, "pl_a", 0]"#.parse().unwrap();
        assert_eq!(
            sel,
            Selector::List(vec![Key::Index(2), Key::Name("pl_a".into()), Key::Index(0)])
        );
    }

    #[test]
    fn non_int_non_str_is_invalid() {
        for bad in [json!(1.5), json!(true), json!(null), json!([0, [1]]), json!({"a": 1})] {
            assert!(
                matches!(Selector::try_from(&bad), Err(StemError::InvalidSelector(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn repeated_args_form_a_list() {
        let sel = Selector::from_args(&["0", "pl_b"]).unwrap();
        assert_eq!(sel, Selector::List(vec![Key::Index(0), Key::Name("pl_b".into())]));
        assert_eq!(Selector::from_args(&["[1]"]).unwrap(), Selector::List(vec![Key::Index(1)]));
    }
}
