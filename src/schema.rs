//! Schema registry: attribute key -> definition lookup.
//!
//! Attribute types are open strings on the wire; `""` and `"list"` degrade to
//! text during evaluation for legacy compatibility, so the registry stores
//! whatever the caller supplied and leaves interpretation to the evaluator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const TYPE_TEXT: &str = "text";
pub const TYPE_NUMBER: &str = "number";
pub const TYPE_BOOLEAN: &str = "boolean";
pub const TYPE_DATETIME: &str = "datetime";
pub const TYPE_LIST: &str = "list";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeDefinition {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl AttributeDefinition {
    pub fn new<S: Into<String>>(key: S, kind: S) -> Self {
        AttributeDefinition { key: key.into(), kind: kind.into() }
    }
}

/// In-memory mapping from attribute key to its definition. Serializes as a
/// plain JSON object so it can travel inside the query envelope unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    defs: HashMap<String, AttributeDefinition>,
}

impl SchemaRegistry {
    pub fn new(defs: impl IntoIterator<Item = AttributeDefinition>) -> Self {
        SchemaRegistry { defs: defs.into_iter().map(|d| (d.key.clone(), d)).collect() }
    }

    /// Keys not present cause any `attr:KEY` leaf to evaluate false.
    pub fn lookup(&self, key: &str) -> Option<&AttributeDefinition> {
        self.defs.get(key)
    }

    pub fn insert(&mut self, def: AttributeDefinition) {
        self.defs.insert(def.key.clone(), def);
    }

    pub fn len(&self) -> usize { self.defs.len() }
    pub fn is_empty(&self) -> bool { self.defs.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_present_and_missing() {
        let reg = SchemaRegistry::new([
            AttributeDefinition::new("plan", "text"),
            AttributeDefinition::new("score", "number"),
        ]);
        assert_eq!(reg.lookup("plan").map(|d| d.kind.as_str()), Some("text"));
        assert!(reg.lookup("nope").is_none());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn serializes_as_plain_map() {
        let reg = SchemaRegistry::new([AttributeDefinition::new("plan", "text")]);
        let v = serde_json::to_value(&reg).unwrap();
        assert_eq!(v["plan"]["type"], "text");
        let back: SchemaRegistry = serde_json::from_value(v).unwrap();
        assert!(back.lookup("plan").is_some());
    }
}
