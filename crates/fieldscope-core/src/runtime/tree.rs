// crates/fieldscope-core/src/runtime/tree.rs
// ============================================================================
// Module: Fieldscope JSON Tree
// Description: Path navigation, equality selection, and writes on JSON trees.
// Purpose: Share hierarchical store semantics between local store backends.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Local store backends keep their data as JSON trees. These helpers give them
//! identical path semantics: a missing path reads as `null`, setting `null`
//! deletes, and writes create intermediate objects as needed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::StorePath;
use crate::interfaces::StoreError;
use crate::interfaces::WriteOp;

// ============================================================================
// SECTION: Reads
// ============================================================================

/// Returns the subtree at `path`, or `None` when absent.
#[must_use]
pub fn subtree<'a>(tree: &'a Value, path: &StorePath) -> Option<&'a Value> {
    path.segments().try_fold(tree, |node, segment| node.get(segment))
}

/// Returns the children of `node` whose `field` equals `value`.
///
/// String fields compare exactly; numeric and boolean fields compare by their
/// JSON text. Non-object children never match.
#[must_use]
pub fn select_children(node: &Value, field: &str, value: &str) -> Value {
    let Some(children) = node.as_object() else {
        return Value::Null;
    };
    let selected: Map<String, Value> = children
        .iter()
        .filter(|(_, child)| child.get(field).is_some_and(|stored| field_equals(stored, value)))
        .map(|(key, child)| (key.clone(), child.clone()))
        .collect();
    if selected.is_empty() { Value::Null } else { Value::Object(selected) }
}

/// Compares a stored field value with an equality query value.
fn field_equals(stored: &Value, value: &str) -> bool {
    match stored {
        Value::String(text) => text == value,
        Value::Number(number) => number.to_string() == value,
        Value::Bool(flag) => flag.to_string() == value,
        _ => false,
    }
}

// ============================================================================
// SECTION: Writes
// ============================================================================

/// Applies `op` at `path` within `tree`.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when a merge targets the store root with a
/// non-object tree that cannot be replaced.
pub fn apply_write(tree: &mut Value, path: &StorePath, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::Set(Value::Null) | WriteOp::Delete => {
            remove(tree, path);
            Ok(())
        }
        WriteOp::Set(value) => {
            *node_mut(tree, path) = value;
            Ok(())
        }
        WriteOp::Merge(children) => {
            let node = node_mut(tree, path);
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Some(object) = node.as_object_mut() else {
                return Err(StoreError::Invalid(format!("merge target is not an object: {path}")));
            };
            for (key, child) in children {
                if child.is_null() {
                    object.remove(&key);
                } else {
                    object.insert(key, child);
                }
            }
            Ok(())
        }
    }
}

/// Returns a mutable node at `path`, creating intermediate objects.
fn node_mut<'a>(tree: &'a mut Value, path: &StorePath) -> &'a mut Value {
    let mut node = tree;
    for segment in path.segments() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(object) => object.entry(segment.to_string()).or_insert(Value::Null),
            other => other,
        };
    }
    node
}

/// Removes the subtree at `path`; removing the root clears the tree.
fn remove(tree: &mut Value, path: &StorePath) {
    let segments: Vec<&str> = path.segments().collect();
    let Some((last, parents)) = segments.split_last() else {
        *tree = Value::Null;
        return;
    };
    let mut node = tree;
    for segment in parents {
        match node.get_mut(*segment) {
            Some(child) => node = child,
            None => return,
        }
    }
    if let Some(object) = node.as_object_mut() {
        object.remove(*last);
    }
}
