//! Typed feature attributes and layer schemas

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl AttributeValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            AttributeValue::Null => FieldType::Null,
            AttributeValue::Bool(_) => FieldType::Boolean,
            AttributeValue::Number(_) => FieldType::Number,
            AttributeValue::String(_) => FieldType::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Number(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Number(v as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AttributeValue::Null, Into::into)
    }
}

/// Declared type of a schema field.
///
/// `Null` marks a field for which only nulls have been seen; it is
/// compatible with every other type when schemas are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Null,
    Boolean,
    Number,
    String,
}

impl FieldType {
    /// Whether values of `other` may live in a field of this type
    pub fn accepts(self, other: FieldType) -> bool {
        self == other || other == FieldType::Null
    }

    /// Common type of two fields, if they are compatible
    pub fn unify(self, other: FieldType) -> Option<FieldType> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (FieldType::Null, b) => Some(b),
            (a, FieldType::Null) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Null => "null",
            FieldType::Boolean => "boolean",
            FieldType::Number => "number",
            FieldType::String => "string",
        };
        f.write_str(name)
    }
}

/// A named, typed (nullable) field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type }
    }
}

/// Ordered set of fields shared by the features of a layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Build a schema from fields, rejecting duplicate names
    pub fn from_fields(fields: Vec<Field>) -> Result<Self> {
        let mut schema = Self::new();
        for field in fields {
            schema.push(field)?;
        }
        Ok(schema)
    }

    /// Append a field; a duplicate name is a conflict
    pub fn push(&mut self, field: Field) -> Result<()> {
        if let Some(existing) = self.get(&field.name) {
            return Err(Error::SchemaConflict {
                field: field.name.clone(),
                left: existing.field_type.to_string(),
                right: field.field_type.to_string(),
            });
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Infer a schema from attribute maps.
    ///
    /// Fields appear in order of first sight (keys of one map sorted by name).
    /// Two maps disagreeing on the non-null type of a key is a conflict.
    pub fn infer<'a, I>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a HashMap<String, AttributeValue>>,
    {
        let mut schema = Self::new();

        for props in properties {
            let mut keys: Vec<&String> = props.keys().collect();
            keys.sort();

            for key in keys {
                let found = props[key].field_type();
                match schema.fields.iter_mut().find(|f| &f.name == key) {
                    Some(field) => {
                        let current = field.field_type;
                        field.field_type = current.unify(found).ok_or_else(|| Error::SchemaConflict {
                            field: key.clone(),
                            left: current.to_string(),
                            right: found.to_string(),
                        })?;
                    }
                    None => schema.fields.push(Field::new(key.clone(), found)),
                }
            }
        }

        Ok(schema)
    }

    /// Check an attribute map against this schema
    pub fn check(&self, properties: &HashMap<String, AttributeValue>) -> Result<()> {
        for (key, value) in properties {
            let field = self.get(key).ok_or_else(|| Error::SchemaConflict {
                field: key.clone(),
                left: "absent".to_string(),
                right: value.field_type().to_string(),
            })?;
            if !field.field_type.accepts(value.field_type()) {
                return Err(Error::SchemaConflict {
                    field: key.clone(),
                    left: field.field_type.to_string(),
                    right: value.field_type().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Plan the union of two schemas for a join or overlay
    pub fn merge(left: &Schema, right: &Schema, collision: &KeyCollision) -> Result<SchemaMerge> {
        let mut fields = left.fields.clone();
        let mut right_names = HashMap::new();
        let mut coalesced = HashSet::new();

        let right_taken: HashSet<&str> = right.names().collect();

        for field in &right.fields {
            let Some(pos) = fields.iter().position(|f| f.name == field.name) else {
                fields.push(field.clone());
                right_names.insert(field.name.clone(), field.name.clone());
                continue;
            };

            match collision {
                KeyCollision::Suffix(suffix) => {
                    let renamed = format!("{}{}", field.name, suffix);
                    if suffix.is_empty()
                        || fields.iter().any(|f| f.name == renamed)
                        || right_taken.contains(renamed.as_str())
                    {
                        return Err(Error::SchemaConflict {
                            field: renamed,
                            left: fields[pos].field_type.to_string(),
                            right: field.field_type.to_string(),
                        });
                    }
                    fields.push(Field::new(renamed.clone(), field.field_type));
                    right_names.insert(field.name.clone(), renamed);
                }
                KeyCollision::Coalesce => {
                    let unified = fields[pos].field_type.unify(field.field_type).ok_or_else(|| {
                        Error::SchemaConflict {
                            field: field.name.clone(),
                            left: fields[pos].field_type.to_string(),
                            right: field.field_type.to_string(),
                        }
                    })?;
                    fields[pos].field_type = unified;
                    right_names.insert(field.name.clone(), field.name.clone());
                    coalesced.insert(field.name.clone());
                }
            }
        }

        Ok(SchemaMerge {
            schema: Schema { fields },
            left: left.clone(),
            right_names,
            coalesced,
        })
    }
}

/// What to do when both sides of a join or overlay carry the same key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyCollision {
    /// Rename the right-hand key by appending a suffix
    Suffix(String),
    /// Share one field when types agree; the left value wins unless it is null
    Coalesce,
}

impl Default for KeyCollision {
    fn default() -> Self {
        KeyCollision::Suffix("_right".to_string())
    }
}

/// Output schema of a two-layer operation plus the rules to fill it
#[derive(Debug, Clone)]
pub struct SchemaMerge {
    schema: Schema,
    left: Schema,
    /// Right field name -> output field name
    right_names: HashMap<String, String>,
    coalesced: HashSet<String>,
}

impl SchemaMerge {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn into_schema(self) -> Schema {
        self.schema
    }

    /// Build the attribute map of one output row.
    ///
    /// A missing side leaves its fields null; every output field is present.
    pub fn combine(
        &self,
        left: Option<&HashMap<String, AttributeValue>>,
        right: Option<&HashMap<String, AttributeValue>>,
    ) -> HashMap<String, AttributeValue> {
        let mut out: HashMap<String, AttributeValue> = self
            .schema
            .names()
            .map(|name| (name.to_string(), AttributeValue::Null))
            .collect();

        if let Some(props) = left {
            for name in self.left.names() {
                if let Some(v) = props.get(name) {
                    out.insert(name.to_string(), v.clone());
                }
            }
        }

        if let Some(props) = right {
            for (name, value) in props {
                let Some(target) = self.right_names.get(name) else {
                    continue;
                };
                let keep_left = self.coalesced.contains(name)
                    && out.get(target).is_some_and(|v| !v.is_null());
                if !keep_left {
                    out.insert(target.clone(), value.clone());
                }
            }
        }

        out
    }
}
