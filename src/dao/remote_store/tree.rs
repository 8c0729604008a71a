//! Helpers manipulating a JSON tree addressed by slash-separated paths.
//!
//! Null leaves and empty containers are never stored: writing null deletes the node and prunes
//! parents left empty.

use serde_json::{Map, Value};

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Whether one path is an ancestor of (or equal to) the other.
pub fn paths_overlap(a: &str, b: &str) -> bool {
    let a = segments(a);
    let b = segments(b);
    a.iter().zip(b.iter()).all(|(left, right)| left == right)
}

/// Value stored at `path`, `None` when absent.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(path) {
        current = current.as_object()?.get(segment)?;
    }
    (!current.is_null()).then_some(current)
}

/// Replace the value at `path`.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let segments = segments(path);
    set_segments(root, &segments, value);
}

/// Merge each child of `patch` into the object at `path`.
pub fn merge(root: &mut Value, path: &str, patch: Map<String, Value>) {
    let base = segments(path);
    for (key, value) in patch {
        let mut target = base.clone();
        target.extend(segments(&key));
        set_segments(root, &target, value);
    }
}

fn set_segments(node: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = normalize(value);
        return;
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        let value = normalize(value);
        if value.is_null() {
            map.remove(*head);
        } else {
            map.insert((*head).to_string(), value);
        }
    } else {
        let child = map.entry((*head).to_string()).or_insert(Value::Null);
        set_segments(child, rest, value);
        if child.is_null() {
            map.remove(*head);
        }
    }

    if map.is_empty() {
        *node = Value::Null;
    }
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned: Map<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, normalize(value)))
                .filter(|(_, value)| !value.is_null())
                .collect();
            if cleaned.is_empty() {
                Value::Null
            } else {
                Value::Object(cleaned)
            }
        }
        Value::Array(items) if items.is_empty() => Value::Null,
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn set_creates_intermediate_objects() {
        let mut root = Value::Null;
        set(&mut root, "game-state/currentQuestionNumber", json!(3));
        assert_eq!(root, json!({"game-state": {"currentQuestionNumber": 3}}));
        assert_eq!(get(&root, "game-state/currentQuestionNumber"), Some(&json!(3)));
    }

    #[test]
    fn writing_null_prunes_empty_parents() {
        let mut root = json!({"teams": {"t1": {"name": "Owls"}}, "config": {"maxTeams": 2}});
        set(&mut root, "teams/t1/name", Value::Null);
        assert_eq!(root, json!({"config": {"maxTeams": 2}}));
        assert_eq!(get(&root, "teams"), None);
    }

    #[test]
    fn merge_applies_nested_keys() {
        let mut root = json!({"game-state": {"a": 1, "b": 2}});
        let patch = json!({"b": null, "c/d": true}).as_object().cloned().unwrap();
        merge(&mut root, "game-state", patch);
        assert_eq!(root, json!({"game-state": {"a": 1, "c": {"d": true}}}));
    }

    #[test]
    fn overlap_is_segment_wise() {
        assert!(paths_overlap("teams", "teams/t1"));
        assert!(paths_overlap("teams/t1", "teams"));
        assert!(!paths_overlap("teams", "teams-archive"));
        assert!(!paths_overlap("config", "teams"));
    }
}
