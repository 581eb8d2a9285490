//! Conversions between JSON trees and flat leaf entries.
//!
//! Backends store only leaves (non-object, non-null values) keyed by their full
//! path. Objects are written by flattening and read back by assembling every
//! leaf at or below the requested path.

use serde_json::{Map, Value};

use crate::path::decode_segment;
use crate::StorePath;

/// Split `value` into `(path, leaf)` pairs rooted at `path`.
///
/// Nulls and empty objects produce no leaves.
pub fn flatten(path: &StorePath, value: Value) -> Vec<(StorePath, Value)> {
    let mut out = Vec::new();
    flatten_into(path.clone(), value, &mut out);
    out
}

fn flatten_into(path: StorePath, value: Value, out: &mut Vec<(StorePath, Value)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(path.child(&key), child, out);
            }
        }
        leaf => out.push((path, leaf)),
    }
}

/// Rebuild the value at `base` from leaves at or below it.
///
/// Leaves outside `base` are ignored. Returns `None` when nothing is stored.
pub fn assemble<'a, I>(base: &StorePath, leaves: I) -> Option<Value>
where
    I: IntoIterator<Item = (&'a StorePath, &'a Value)>,
{
    let mut root: Option<Value> = None;

    'leaves: for (path, value) in leaves {
        if path == base {
            return Some(value.clone());
        }
        let Some(relative) = path.relative_to(base) else {
            continue;
        };

        let segments: Vec<&str> = relative.split('/').collect();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };

        let mut node = root.get_or_insert_with(|| Value::Object(Map::new()));
        for segment in parents {
            node = match node {
                Value::Object(map) => map
                    .entry(decode_segment(segment))
                    .or_insert_with(|| Value::Object(Map::new())),
                _ => continue 'leaves,
            };
        }
        if let Value::Object(map) = node {
            map.insert(decode_segment(last), value.clone());
        }
    }

    root
}
