use crate::model::{TonDocument, TonObject, TonValue, TonValueKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// A plain, serde-serializable mirror of the document model. TON-specific
/// kinds are flattened to their nearest JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

pub(crate) fn to_value(ton_value: &TonValue) -> Value {
    match &ton_value.kind {
        TonValueKind::Null | TonValueKind::Undefined => Value::Null,
        TonValueKind::String(s) => Value::String(s.clone()),
        TonValueKind::Integer(i) => Value::Integer(*i),
        TonValueKind::Float(f) => Value::Float(*f),
        TonValueKind::Boolean(b) => Value::Boolean(*b),
        TonValueKind::Guid(g) => Value::String(g.to_string()),
        TonValueKind::Date(d) => Value::String(d.clone()),
        TonValueKind::Enum(e) => Value::String(e.clone()),
        TonValueKind::EnumSet(values) => {
            Value::Array(values.iter().cloned().map(Value::String).collect())
        }
        TonValueKind::Array(values) => Value::Array(values.iter().map(to_value).collect()),
        TonValueKind::Object(obj) => object_to_value(obj),
    }
}

fn object_to_value(obj: &TonObject) -> Value {
    let mut map = BTreeMap::new();
    // Class metadata travels as reserved keys so it survives the export.
    if let Some(class_name) = &obj.class_name {
        map.insert(
            "_className".to_string(),
            Value::String(class_name.clone()),
        );
    }
    if let Some(id) = obj.instance_id {
        map.insert("_instanceId".to_string(), Value::Integer(id as i64));
    }
    for (name, value) in obj.entries() {
        map.insert(name.clone(), to_value(value));
    }
    if !obj.children.is_empty() {
        map.insert(
            "_children".to_string(),
            Value::Array(obj.children.iter().map(object_to_value).collect()),
        );
    }
    Value::Object(map)
}

impl TonDocument {
    /// Flattens the document into a generic, serializable [`Value`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        to_value(&self.root)
    }

    /// Exports the document as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_value())
    }

    /// Exports the document as YAML.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_value())
    }
}
