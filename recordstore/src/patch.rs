use crate::ports::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::{Error, Result};

/// A partial update, applied with JSON merge-patch rules (RFC 7386):
/// object members merge recursively, `null` removes a member, anything else
/// replaces it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(Map<String, Value>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Builder-style field removal (merges a `null`).
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.0.insert(field.into(), Value::Null);
        self
    }

    /// Serialize any partial struct into a patch. Must serialize to an object.
    pub fn from_partial<T: Serialize>(partial: &T) -> Result<Self> {
        match serde_json::to_value(partial) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(Error::Validation(format!(
                "patch must be a JSON object, got {}",
                kind_of(&other)
            ))),
            Err(e) => Err(Error::Validation(format!("patch does not serialize: {}", e))),
        }
    }

    /// Accept an arbitrary document as a patch, e.g. from a request body.
    pub fn from_document(document: Document) -> Result<Self> {
        match document {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Validation(format!(
                "patch must be a JSON object, got {}",
                kind_of(&other)
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_document(&self) -> Document {
        Value::Object(self.0.clone())
    }
}

/// Merge `patch` into `target` in place.
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    if let Value::Object(target_map) = target {
        for (field, value) in patch_map {
            if value.is_null() {
                target_map.remove(field);
            } else {
                apply_merge_patch(
                    target_map.entry(field.clone()).or_insert(Value::Null),
                    value,
                );
            }
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
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

    #[test]
    fn test_merge_replaces_and_keeps_untouched_fields() {
        let mut doc = json!({"id": "t1", "name": "task-1", "status": "open"});
        apply_merge_patch(&mut doc, &json!({"name": "task-1-renamed"}));
        assert_eq!(
            doc,
            json!({"id": "t1", "name": "task-1-renamed", "status": "open"})
        );
    }

    #[test]
    fn test_merge_null_removes_member() {
        let mut doc = json!({"id": "t1", "assignee": "sam"});
        apply_merge_patch(&mut doc, &json!({"assignee": null}));
        assert_eq!(doc, json!({"id": "t1"}));
    }

    #[test]
    fn test_merge_nested_objects() {
        let mut doc = json!({"meta": {"a": 1, "b": 2}});
        apply_merge_patch(&mut doc, &json!({"meta": {"b": null, "c": 3}}));
        assert_eq!(doc, json!({"meta": {"a": 1, "c": 3}}));
    }

    #[test]
    fn test_arrays_are_replaced_not_merged() {
        let mut doc = json!({"tags": ["a", "b"]});
        apply_merge_patch(&mut doc, &json!({"tags": ["c"]}));
        assert_eq!(doc, json!({"tags": ["c"]}));
    }

    #[test]
    fn test_patch_must_be_object() {
        assert!(matches!(
            Patch::from_document(json!(["name"])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(Patch::from_partial(&42), Err(Error::Validation(_))));
    }

    #[test]
    fn test_builder() {
        let patch = Patch::new().set("name", "x").unset("assignee");
        assert_eq!(patch.to_document(), json!({"name": "x", "assignee": null}));
        assert_eq!(patch.get("name"), Some(&json!("x")));
    }
}
