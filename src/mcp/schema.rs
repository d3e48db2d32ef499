//! Tool input schemas
//!
//! Each tool declares its parameters once. The same declaration renders the
//! JSON Schema advertised by `tools/list` and validates incoming arguments
//! before any handler runs.

use crate::error::ProtocolError;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Calendar date format accepted by `Date` parameters.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Primitive parameter types understood by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    /// A `YYYY-MM-DD` string
    Date,
}

impl ParamType {
    fn json_type(self) -> &'static str {
        match self {
            Self::String | Self::Date => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Date => value
                .as_str()
                .is_some_and(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok()),
        }
    }

    fn expectation(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Integer => "an integer",
            Self::Number => "a number",
            Self::Boolean => "a boolean",
            Self::Date => "a date formatted as YYYY-MM-DD",
        }
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub description: String,
}

/// Ordered parameter list of one tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    params: Vec<ParamSpec>,
}

impl InputSchema {
    /// A schema without parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, ty: ParamType, description: &str) -> Self {
        self.push(name, ty, true, None, description);
        self
    }

    pub fn optional(mut self, name: &str, ty: ParamType, description: &str) -> Self {
        self.push(name, ty, false, None, description);
        self
    }

    pub fn optional_with_default(
        mut self,
        name: &str,
        ty: ParamType,
        default: Value,
        description: &str,
    ) -> Self {
        self.push(name, ty, false, Some(default), description);
        self
    }

    fn push(
        &mut self,
        name: &str,
        ty: ParamType,
        required: bool,
        default: Option<Value>,
        description: &str,
    ) {
        self.params.push(ParamSpec {
            name: name.to_string(),
            ty,
            required,
            default,
            description: description.to_string(),
        });
    }

    /// Renders the schema as a JSON Schema object.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut property = json!({
                "type": param.ty.json_type(),
                "description": param.description,
            });
            if param.ty == ParamType::Date {
                property["format"] = json!("date");
            }
            if let Some(default) = &param.default {
                property["default"] = default.clone();
            }
            properties.insert(param.name.clone(), property);
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Checks `arguments` against the declared parameters.
    ///
    /// `null` is treated as an empty argument object, and so is a `null`
    /// value for an optional parameter. Defaults are filled in for absent
    /// optional parameters. Returns the normalised argument map.
    pub fn validate(&self, arguments: &Value) -> Result<Map<String, Value>, ProtocolError> {
        let supplied = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            _ => {
                return Err(ProtocolError::InvalidParams(
                    "tool arguments must be an object".into(),
                ))
            }
        };

        if let Some(unknown) = supplied
            .keys()
            .find(|key| !self.params.iter().any(|p| &p.name == *key))
        {
            return Err(ProtocolError::InvalidParams(format!(
                "unknown parameter '{}'",
                unknown
            )));
        }

        let mut validated = Map::new();
        for param in &self.params {
            match supplied.get(&param.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    if !param.ty.accepts(value) {
                        return Err(ProtocolError::InvalidParams(format!(
                            "parameter '{}' must be {}",
                            param.name,
                            param.ty.expectation()
                        )));
                    }
                    validated.insert(param.name.clone(), value.clone());
                }
                None if param.required => {
                    return Err(ProtocolError::InvalidParams(format!(
                        "missing required parameter '{}'",
                        param.name
                    )));
                }
                None => {
                    if let Some(default) = &param.default {
                        validated.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(validated)
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_schema().serialize(serializer)
    }
}
