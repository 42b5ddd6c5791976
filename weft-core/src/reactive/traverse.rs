//! Deep traversal.

use std::collections::HashSet;

use super::value::Value;

/// Read every nested value so the evaluating computation depends on all of
/// them.
///
/// Each container is visited once, so cyclic state terminates. Frozen
/// objects and opaque handles are not entered.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    traverse_inner(value, &mut seen);
}

fn traverse_inner(value: &Value, seen: &mut HashSet<*const ()>) {
    match value {
        Value::Array(array) => {
            if !seen.insert(array.as_ptr()) {
                return;
            }
            for item in array.to_vec().iter().rev() {
                traverse_inner(item, seen);
            }
        }
        Value::Object(object) => {
            if object.is_frozen() || !seen.insert(object.as_ptr()) {
                return;
            }
            for key in object.keys().iter().rev() {
                if let Some(child) = object.get(key) {
                    traverse_inner(&child, seen);
                }
            }
        }
        _ => {}
    }
}
