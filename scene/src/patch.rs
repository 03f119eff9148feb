//! JSON Patch (RFC 6902) over `serde_json::Value`.
//!
//! Prefab instances are stored as a [`Patch`] against their template.
//! [`diff`] only emits `add`, `remove` and `replace`, and guarantees that
//! applying `diff(base, target)` to `base` yields exactly `target`.
//! [`Patch::apply_to`] accepts all six operations so hand-edited files may
//! also use `move`, `copy` and `test`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PatchConflictError;

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Value },
}

impl PatchOp {
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::Add { .. } => "add",
            PatchOp::Remove { .. } => "remove",
            PatchOp::Replace { .. } => "replace",
            PatchOp::Move { .. } => "move",
            PatchOp::Copy { .. } => "copy",
            PatchOp::Test { .. } => "test",
        }
    }

    pub fn path(&self) -> &str {
        match self {
            PatchOp::Add { path, .. }
            | PatchOp::Remove { path }
            | PatchOp::Replace { path, .. }
            | PatchOp::Move { path, .. }
            | PatchOp::Copy { path, .. }
            | PatchOp::Test { path, .. } => path,
        }
    }
}

/// An ordered list of operations, serialized as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(pub Vec<PatchOp>);

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Parses a patch document.
    pub fn from_value(value: Value) -> Result<Self, PatchConflictError> {
        serde_json::from_value(value).map_err(|e| PatchConflictError {
            index: 0,
            op: "parse",
            path: String::new(),
            reason: e.to_string(),
        })
    }

    pub fn to_value(&self) -> Value {
        // A Vec of plain enums with String/Value fields always serializes
        serde_json::to_value(self).unwrap_or(Value::Array(Vec::new()))
    }

    /// Applies every operation in order. On failure `doc` is left untouched.
    pub fn apply_to(&self, doc: &mut Value) -> Result<(), PatchConflictError> {
        let mut work = doc.clone();
        for (index, op) in self.0.iter().enumerate() {
            apply_op(&mut work, op).map_err(|reason| PatchConflictError {
                index,
                op: op.name(),
                path: op.path().to_owned(),
                reason,
            })?;
        }
        *doc = work;
        Ok(())
    }
}

/// `base` with `patch` applied.
pub fn patched(base: &Value, patch: &Patch) -> Result<Value, PatchConflictError> {
    let mut doc = base.clone();
    patch.apply_to(&mut doc)?;
    Ok(doc)
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Computes a patch turning `base` into `target`.
pub fn diff(base: &Value, target: &Value) -> Patch {
    let mut ops = Vec::new();
    diff_into(base, target, "", &mut ops);
    Patch(ops)
}

fn diff_into(base: &Value, target: &Value, pointer: &str, ops: &mut Vec<PatchOp>) {
    if base == target {
        return;
    }
    match (base, target) {
        (Value::Object(a), Value::Object(b)) => {
            for key in a.keys().filter(|k| !b.contains_key(*k)) {
                ops.push(PatchOp::Remove {
                    path: child(pointer, key),
                });
            }
            for (key, b_value) in b {
                let path = child(pointer, key);
                match a.get(key) {
                    Some(a_value) => diff_into(a_value, b_value, &path, ops),
                    None => ops.push(PatchOp::Add {
                        path,
                        value: b_value.clone(),
                    }),
                }
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            let common = a.len().min(b.len());
            for i in 0..common {
                diff_into(&a[i], &b[i], &format!("{pointer}/{i}"), ops);
            }
            // Trailing removals go back to front so indices stay valid
            for i in (common..a.len()).rev() {
                ops.push(PatchOp::Remove {
                    path: format!("{pointer}/{i}"),
                });
            }
            for (i, value) in b.iter().enumerate().skip(common) {
                ops.push(PatchOp::Add {
                    path: format!("{pointer}/{i}"),
                    value: value.clone(),
                });
            }
        }
        _ => ops.push(PatchOp::Replace {
            path: pointer.to_owned(),
            value: target.clone(),
        }),
    }
}

fn child(pointer: &str, key: &str) -> String {
    format!("{pointer}/{}", escape(key))
}

// ---------------------------------------------------------------------------
// JSON Pointer (RFC 6901)
// ---------------------------------------------------------------------------

pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn parse_pointer(pointer: &str) -> Result<Vec<String>, String> {
    if pointer.is_empty() {
        return Ok(Vec::new());
    }
    let Some(rest) = pointer.strip_prefix('/') else {
        return Err(format!("pointer '{pointer}' must start with '/'"));
    };
    Ok(rest
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect())
}

fn array_index(token: &str, len: usize, allow_end: bool) -> Result<usize, String> {
    if allow_end && token == "-" {
        return Ok(len);
    }
    let valid = !token.is_empty()
        && token.bytes().all(|b| b.is_ascii_digit())
        && (token == "0" || !token.starts_with('0'));
    let index: usize = if valid {
        token.parse().map_err(|_| format!("bad array index '{token}'"))?
    } else {
        return Err(format!("bad array index '{token}'"));
    };
    let limit = if allow_end { len } else { len.saturating_sub(1) };
    if index > limit || (!allow_end && len == 0) {
        return Err(format!("index {index} out of bounds (len {len})"));
    }
    Ok(index)
}

fn lookup<'v>(doc: &'v Value, tokens: &[String]) -> Result<&'v Value, String> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get(token),
            Value::Array(items) => items.get(array_index(token, items.len(), false)?),
            _ => None,
        }
        .ok_or_else(|| format!("no value at '{token}'"))?;
    }
    Ok(current)
}

fn lookup_mut<'v>(doc: &'v mut Value, tokens: &[String]) -> Result<&'v mut Value, String> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token),
            Value::Array(items) => {
                let index = array_index(token, items.len(), false)?;
                items.get_mut(index)
            }
            _ => None,
        }
        .ok_or_else(|| format!("no value at '{token}'"))?;
    }
    Ok(current)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn add(doc: &mut Value, tokens: &[String], value: Value) -> Result<(), String> {
    let Some((last, parent)) = tokens.split_last() else {
        *doc = value;
        return Ok(());
    };
    match lookup_mut(doc, parent)? {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = array_index(last, items.len(), true)?;
            items.insert(index, value);
            Ok(())
        }
        other => Err(format!("cannot add a child to {}", kind(other))),
    }
}

fn remove(doc: &mut Value, tokens: &[String]) -> Result<Value, String> {
    let Some((last, parent)) = tokens.split_last() else {
        return Err("cannot remove the document root".into());
    };
    match lookup_mut(doc, parent)? {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| format!("no member '{last}' to remove")),
        Value::Array(items) => {
            let index = array_index(last, items.len(), false)?;
            Ok(items.remove(index))
        }
        other => Err(format!("cannot remove a child of {}", kind(other))),
    }
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), String> {
    match op {
        PatchOp::Add { path, value } => add(doc, &parse_pointer(path)?, value.clone()),
        PatchOp::Remove { path } => remove(doc, &parse_pointer(path)?).map(drop),
        PatchOp::Replace { path, value } => {
            let target = lookup_mut(doc, &parse_pointer(path)?)?;
            *target = value.clone();
            Ok(())
        }
        PatchOp::Move { from, path } => {
            if from == path {
                return Ok(());
            }
            if path.starts_with(&format!("{from}/")) {
                return Err(format!("cannot move '{from}' into its own child"));
            }
            let value = remove(doc, &parse_pointer(from)?)?;
            add(doc, &parse_pointer(path)?, value)
        }
        PatchOp::Copy { from, path } => {
            let value = lookup(doc, &parse_pointer(from)?)?.clone();
            add(doc, &parse_pointer(path)?, value)
        }
        PatchOp::Test { path, value } => {
            let actual = lookup(doc, &parse_pointer(path)?)?;
            if actual == value {
                Ok(())
            } else {
                Err(format!("expected {value}, found {actual}"))
            }
        }
    }
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ops(value: Value) -> Patch {
        Patch::from_value(value).unwrap()
    }

    #[test]
    fn diff_of_equal_values_is_empty() {
        let v = json!({"Light": {"color": [1, 1, 1]}, "Name": {"name": "lamp"}});
        assert!(diff(&v, &v).is_empty());
    }

    #[test]
    fn diff_then_patch_reproduces_target() {
        let base = json!({
            "Light": {"color": [1.0, 1.0, 1.0], "type": 0},
            "WorldObject": {"materials": ["a", "b", "c"], "mesh": "m"},
            "gone": true,
            "odd/key~": 1
        });
        let target = json!({
            "Light": {"color": [0.0, 1.0, 1.0], "type": 2, "intensity": 4.0},
            "WorldObject": {"materials": ["a"], "mesh": null},
            "odd/key~": 2,
            "Child": {"parent": 3}
        });
        let patch = diff(&base, &target);
        assert_eq!(patched(&base, &patch).unwrap(), target);

        let grow = json!({"list": [1, 2, 3, 4]});
        let shrink = json!({"list": [9]});
        assert_eq!(patched(&shrink, &diff(&shrink, &grow)).unwrap(), grow);
        assert_eq!(patched(&grow, &diff(&grow, &shrink)).unwrap(), shrink);
    }

    #[test]
    fn diff_replaces_mismatched_kinds() {
        let patch = diff(&json!({"a": [1]}), &json!({"a": {"b": 1}}));
        assert_eq!(patch.0, vec![PatchOp::Replace { path: "/a".into(), value: json!({"b": 1}) }]);
        assert_eq!(diff(&json!(1), &json!("x")).0[0].path(), "");
    }

    #[test]
    fn serialized_shape_is_rfc6902() {
        let patch = diff(&json!({"Light": {"color": [1, 1, 1]}}), &json!({"Light": {"color": [0, 1, 1]}}));
        assert_eq!(
            patch.to_value(),
            json!([{"op": "replace", "path": "/Light/color/0", "value": 0}])
        );
    }

    #[test]
    fn all_six_operations() {
        let mut doc = json!({"a": {"b": [1, 2]}, "c": "x"});
        ops(json!([
            {"op": "test", "path": "/c", "value": "x"},
            {"op": "add", "path": "/a/b/-", "value": 3},
            {"op": "add", "path": "/a/b/0", "value": 0},
            {"op": "copy", "from": "/a/b", "path": "/d"},
            {"op": "move", "from": "/c", "path": "/e"},
            {"op": "remove", "path": "/a/b/1"},
            {"op": "replace", "path": "/a", "value": null}
        ]))
        .apply_to(&mut doc)
        .unwrap();
        assert_eq!(doc, json!({"a": null, "d": [0, 1, 2, 3], "e": "x"}));
    }

    #[test]
    fn escaped_tokens() {
        let mut doc = json!({"a/b": {"m~n": 1}});
        ops(json!([{"op": "replace", "path": "/a~1b/m~0n", "value": 2}]))
            .apply_to(&mut doc)
            .unwrap();
        assert_eq!(doc, json!({"a/b": {"m~n": 2}}));
    }

    #[test]
    fn conflict_leaves_document_untouched() {
        let original = json!({"Light": {"color": [1, 1, 1]}});
        let mut doc = original.clone();
        let err = ops(json!([
            {"op": "replace", "path": "/Light/color/0", "value": 0},
            {"op": "remove", "path": "/Light/intensity"}
        ]))
        .apply_to(&mut doc)
        .unwrap_err();

        assert_eq!(err.index, 1);
        assert_eq!(err.op, "remove");
        assert_eq!(err.path, "/Light/intensity");
        assert_eq!(doc, original);
    }

    #[test]
    fn invalid_targets_are_conflicts() {
        let base = json!({"list": [1], "n": 1});
        for bad in [
            json!([{"op": "remove", "path": ""}]),
            json!([{"op": "replace", "path": "/missing", "value": 1}]),
            json!([{"op": "add", "path": "/list/5", "value": 1}]),
            json!([{"op": "add", "path": "/list/01", "value": 1}]),
            json!([{"op": "add", "path": "/n/x", "value": 1}]),
            json!([{"op": "test", "path": "/n", "value": 2}]),
            json!([{"op": "move", "from": "/list", "path": "/list/0"}]),
            json!([{"op": "replace", "path": "list", "value": 1}]),
        ] {
            assert!(patched(&base, &ops(bad.clone())).is_err(), "{bad}");
        }
        assert!(Patch::from_value(json!([{"op": "frobnicate", "path": "/n"}])).is_err());
    }
}
