//! Response shaping: project entities down to the fields a grant allows.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::permissions::AttributeSet;

/// Project a serialized entity (or list of entities) onto `attributes`.
///
/// Lists are filtered element by element with the same rule. A wildcard keeps
/// the value untouched, so fields the table never enumerated still pass.
/// Scalars carry no fields and are returned as they are.
pub fn filter(value: &Value, attributes: &AttributeSet) -> Value {
    if attributes.is_wildcard() {
        return value.clone();
    }

    match value {
        Value::Array(items) => Value::Array(items.iter().map(|v| filter(v, attributes)).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(name, _)| attributes.allows(name))
                .map(|(name, v)| (name.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}

/// Serialize and filter in one step.
pub fn filter_entity<T>(entity: &T, attributes: &AttributeSet) -> Result<Value, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(entity)?;
    Ok(filter(&value, attributes))
}
