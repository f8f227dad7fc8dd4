//! Template descriptions: the typed-variable schema a template can carry.
//!
//! A description names the template, documents it, declares its variables
//! (with type, required flag, default and nested variables) and lists the
//! templates it applies. The JSON schema is:
//!
//! ```json
//! {"template": "Name", "description": "…",
//!  "variables": [{"name": "…", "description": "…", "type": "string",
//!                 "required": true, "default": "…", "variables": [...]}],
//!  "templates": ["Nested"]}
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VarType {
    #[default]
    Null,
    Boolean,
    Integer,
    Double,
    String,
    Array,
    Object,
}

impl VarType {
    pub fn as_str(self) -> &'static str {
        match self {
            VarType::Null => "null",
            VarType::Boolean => "bool",
            VarType::Integer => "integer",
            VarType::Double => "double",
            VarType::String => "string",
            VarType::Array => "array",
            VarType::Object => "object",
        }
    }

    pub fn parse(name: &str) -> Result<Self, EngineError> {
        match name {
            "null" => Ok(VarType::Null),
            "bool" => Ok(VarType::Boolean),
            "integer" => Ok(VarType::Integer),
            "double" => Ok(VarType::Double),
            "string" => Ok(VarType::String),
            "array" => Ok(VarType::Array),
            "object" => Ok(VarType::Object),
            other => Err(EngineError::data(format!(
                "Unknown variable type: \"{other}\""
            ))),
        }
    }
}

pub type Variables = BTreeMap<String, Variable>;

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub description: String,
    pub var_type: VarType,
    pub required: bool,
    pub default: Value,
    pub variables: Variables,
}

impl Default for Variable {
    fn default() -> Self {
        Variable {
            name: String::new(),
            description: String::new(),
            var_type: VarType::Null,
            required: true,
            default: Value::Null,
            variables: Variables::new(),
        }
    }
}

impl Variable {
    pub fn named(name: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            ..Variable::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Description {
    pub name: String,
    pub description: String,
    pub variables: Variables,
    pub nested: BTreeSet<String>,
}

impl Description {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.variables.is_empty() && self.nested.is_empty()
    }

    /// Loads the description named `name` from a JSON file holding either a
    /// single description object or an array of them.
    pub fn from_file(name: &str, path: &Path) -> Result<Description, EngineError> {
        let text = fs::read_to_string(path)
            .map_err(|_| EngineError::file(format!("Couldn't open file: {path:?}")))?;
        let parsed: Value = serde_json::from_str(&text).map_err(|err| {
            EngineError::file(format!(
                "Couldn't parse template description file {path:?}: {err}"
            ))
        })?;
        match find_object(&parsed, "template", name) {
            Some(desc) => Self::from_value(desc),
            None => Ok(Description::default()),
        }
    }

    pub fn from_value(desc: &Map<String, Value>) -> Result<Description, EngineError> {
        let name = required_str(desc, "template")?;
        let description = required_str(desc, "description")?;
        let mut result = Description {
            name,
            description,
            variables: Variables::new(),
            nested: BTreeSet::new(),
        };
        load_variables(desc, &mut result.variables)?;
        if let Some(Value::Array(templates)) = desc.get("templates") {
            for tpl_name in templates {
                if let Some(tpl_name) = tpl_name.as_str() {
                    result.nested.insert(tpl_name.to_string());
                }
            }
        }
        Ok(result)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("template".into(), json!(self.name));
        obj.insert("description".into(), json!(self.description));
        obj.insert(
            "variables".into(),
            Value::Array(variables_to_value(&self.variables)),
        );
        if !self.nested.is_empty() {
            let nested: Vec<Value> = self.nested.iter().map(|n| json!(n)).collect();
            obj.insert("templates".into(), Value::Array(nested));
        }
        Value::Object(obj)
    }

    /// Looks up a variable by dotted path, descending through nested
    /// variable declarations.
    pub fn find_variable(&self, path: &str) -> Option<&Variable> {
        let mut vars = &self.variables;
        let mut found = None;
        for part in path.split('.').filter(|p| !p.is_empty()) {
            let var = vars.get(part)?;
            vars = &var.variables;
            found = Some(var);
        }
        found
    }
}

/// Finds the first object whose `property` equals `value`, in either a single
/// object or an array of objects.
pub fn find_object<'a>(
    root: &'a Value,
    property: &str,
    value: &str,
) -> Option<&'a Map<String, Value>> {
    let matches = |candidate: &Value| {
        candidate
            .as_object()
            .and_then(|obj| obj.get(property))
            .and_then(Value::as_str)
            == Some(value)
    };
    match root {
        Value::Array(items) => items.iter().find(|v| matches(v))?.as_object(),
        _ if matches(root) => root.as_object(),
        _ => None,
    }
}

/// Default description file next to a template: `<stem>.json`.
pub fn default_description_path(template: &Path) -> PathBuf {
    template.with_extension("json")
}

fn required_str(obj: &Map<String, Value>, key: &str) -> Result<String, EngineError> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| EngineError::data(format!("Description is missing the \"{key}\" field")))
}

fn load_variables(obj: &Map<String, Value>, vars: &mut Variables) -> Result<(), EngineError> {
    let Some(Value::Array(entries)) = obj.get("variables") else {
        return Ok(());
    };
    for entry in entries {
        let Some(entry) = entry.as_object() else {
            return Err(EngineError::data(
                "Description variable entry must be an object",
            ));
        };
        let mut variable = Variable::named(required_str(entry, "name")?);
        if let Some(description) = entry.get("description").and_then(Value::as_str) {
            variable.description = description.to_string();
        }
        if let Some(var_type) = entry.get("type").and_then(Value::as_str) {
            variable.var_type = VarType::parse(var_type)?;
        }
        if let Some(required) = entry.get("required").and_then(Value::as_bool) {
            variable.required = required;
        }
        if let Some(default) = entry.get("default") {
            variable.default = default.clone();
        }
        load_variables(entry, &mut variable.variables)?;
        vars.insert(variable.name.clone(), variable);
    }
    Ok(())
}

fn variables_to_value(vars: &Variables) -> Vec<Value> {
    let mut result = Vec::with_capacity(vars.len());
    for variable in vars.values() {
        let mut obj = Map::new();
        obj.insert("name".into(), json!(variable.name));
        obj.insert("description".into(), json!(variable.description));
        obj.insert("type".into(), json!(variable.var_type.as_str()));
        obj.insert("required".into(), json!(variable.required));
        if !variable.default.is_null() {
            obj.insert("default".into(), variable.default.clone());
        }
        if !variable.variables.is_empty() {
            obj.insert(
                "variables".into(),
                Value::Array(variables_to_value(&variable.variables)),
            );
        }
        result.push(Value::Object(obj));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Value {
        json!({
            "template": "DatabaseSchema",
            "description": "Database schema description",
            "variables": [
                {"name": "host", "description": "hostname", "type": "string",
                 "required": true, "default": "localhost"},
                {"name": "name", "description": "Database name", "type": "string",
                 "required": true},
                {"name": "person", "description": "Person description", "type": "object",
                 "required": false, "variables": [
                    {"name": "age", "description": "Age", "type": "integer",
                     "required": true, "default": 16},
                    {"name": "firstname", "description": "First name", "type": "string",
                     "required": true}
                 ]}
            ],
            "templates": ["TableSchema", "TableSchemaId"]
        })
    }

    #[test]
    fn loads_from_json() {
        let desc = Description::from_value(sample().as_object().unwrap()).unwrap();
        assert_eq!(desc.name, "DatabaseSchema");
        assert_eq!(desc.variables.len(), 3);

        let host = &desc.variables["host"];
        assert_eq!(host.var_type, VarType::String);
        assert!(host.required);
        assert_eq!(host.default, json!("localhost"));

        let person = &desc.variables["person"];
        assert_eq!(person.var_type, VarType::Object);
        assert!(!person.required);
        assert_eq!(person.variables["age"].default, json!(16));

        let nested: Vec<_> = desc.nested.iter().cloned().collect();
        assert_eq!(nested, vec!["TableSchema", "TableSchemaId"]);
    }

    #[test]
    fn round_trips_through_json() {
        let source = sample();
        let desc = Description::from_value(source.as_object().unwrap()).unwrap();
        let emitted = desc.to_value();
        let reloaded = Description::from_value(emitted.as_object().unwrap()).unwrap();
        assert_eq!(desc, reloaded);
        // sorted variable order is part of the schema output
        let names: Vec<_> = emitted["variables"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["host", "name", "person"]);
    }

    #[test]
    fn finds_variables_by_dotted_path() {
        let desc = Description::from_value(sample().as_object().unwrap()).unwrap();
        assert_eq!(
            desc.find_variable("person.age").unwrap().var_type,
            VarType::Integer
        );
        assert_eq!(desc.find_variable("host").unwrap().name, "host");
        assert!(desc.find_variable("person.unknown").is_none());
        assert!(desc.find_variable("missing").is_none());
    }

    #[test]
    fn unknown_type_is_a_data_error() {
        let bad = json!({"template": "T", "description": "", "variables": [
            {"name": "x", "type": "decimal"}
        ]});
        let err = Description::from_value(bad.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, EngineError::Data(_)));
    }

    #[test]
    fn picks_description_by_template_name_from_array() {
        let many = json!([
            {"template": "Other", "description": "other"},
            sample(),
        ]);
        let found = find_object(&many, "template", "DatabaseSchema").unwrap();
        assert_eq!(found["description"], "Database schema description");
    }
}
