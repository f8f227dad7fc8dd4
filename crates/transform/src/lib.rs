//! Rules-driven JSON pre-transformation.
//!
//! A rule set reshapes an input JSON value before it is handed to a
//! template: values are selected by dotted paths (with the same array
//! fan-out as template data references) or computed by engine expressions,
//! optionally gated by a boolean filter expression, and written to dotted
//! destination paths. Sub-rules rebuild objects field by field; array
//! sources map element-wise, dropping elements whose transform comes out
//! empty.
//!
//! ```json
//! [{"from": "person", "filter": "age <= 25", "rules": [
//!    {"expr": "at(split(fullname, \" \"), 0)", "to": "first_name"},
//!    {"from": "age"}]}]
//! ```

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use stencil_engine::value::{find_dotted, set_dotted, truthy};
use stencil_engine::{EngineError, Environment, Template};

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Invalid transform rules: {0}")]
    Rules(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One transformation rule. `filter` and `expr` hold parsed expression
/// templates; rules compare equal when their sources do.
#[derive(Debug, Default, PartialEq)]
pub struct Rule {
    /// Dotted source path in the input value.
    pub from: String,
    /// Boolean expression gating the rule.
    pub filter: Option<Template>,
    /// Expression computed against the current value, used instead of `from`.
    pub expr: Option<Template>,
    /// Dotted destination path; defaults to `from`.
    pub to: String,
    /// Sub-rules rebuilding the matched value.
    pub rules: Vec<Rule>,
}

#[derive(Debug, Default)]
pub struct JsonTransformer {
    rules: Vec<Rule>,
}

impl JsonTransformer {
    pub fn from_file(path: &Path) -> Result<Self, TransformError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(rules: &str) -> Result<Self, TransformError> {
        let parsed: Value = serde_json::from_str(rules)?;
        Self::from_value(&parsed)
    }

    pub fn from_value(rules: &Value) -> Result<Self, TransformError> {
        let mut env = Environment::new();
        let mut transformer = JsonTransformer::default();
        parse_rules(&mut env, &mut transformer.rules, rules)?;
        Ok(transformer)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn transform(&self, value: &Value) -> Result<Value, TransformError> {
        let env = Environment::new();
        let mut result = Value::Object(Map::new());
        transform_rules(&env, &self.rules, value, &mut result)?;
        Ok(result)
    }

    pub fn transform_str(&self, json: &str) -> Result<String, TransformError> {
        let value: Value = serde_json::from_str(json)?;
        let transformed = self.transform(&value)?;
        Ok(serde_json::to_string(&transformed)?)
    }
}

fn parse_rules(
    env: &mut Environment,
    rules: &mut Vec<Rule>,
    value: &Value,
) -> Result<(), TransformError> {
    let Value::Array(entries) = value else {
        return Err(TransformError::Rules("the rules should be an array".into()));
    };
    for entry in entries {
        let Value::Object(obj) = entry else {
            return Err(TransformError::Rules("a rule should be an object".into()));
        };
        if !obj.contains_key("from") && !obj.contains_key("expr") {
            return Err(TransformError::Rules(
                "a rule should have a 'from' or 'expr' field".into(),
            ));
        }
        if !obj.contains_key("to") && !obj.contains_key("from") {
            return Err(TransformError::Rules(
                "a rule should have a 'from' or 'to' field".into(),
            ));
        }
        let mut rule = Rule::default();
        if let Some(from) = obj.get("from").and_then(Value::as_str) {
            rule.from = from.to_string();
        }
        if let Some(filter) = obj.get("filter").and_then(Value::as_str) {
            rule.filter = Some(env.parse_expression(filter)?);
        }
        if let Some(expr) = obj.get("expr").and_then(Value::as_str) {
            rule.expr = Some(env.parse_expression(expr)?);
        }
        if let Some(to) = obj.get("to").and_then(Value::as_str) {
            rule.to = to.to_string();
        }
        if let Some(sub_rules) = obj.get("rules") {
            parse_rules(env, &mut rule.rules, sub_rules)?;
        }
        rules.push(rule);
    }
    Ok(())
}

fn transform_rules(
    env: &Environment,
    rules: &[Rule],
    value: &Value,
    result: &mut Value,
) -> Result<(), TransformError> {
    for rule in rules {
        let expr_value;
        let old_values: Vec<&Value> = if let Some(expr) = &rule.expr {
            expr_value = env.evaluate_template(expr, value)?;
            if expr_value.is_null() {
                Vec::new()
            } else {
                vec![&expr_value]
            }
        } else {
            find_dotted(value, &rule.from)
        };
        if old_values.is_empty() {
            continue;
        }

        let mut new_values = Vec::with_capacity(old_values.len());
        for old_value in &old_values {
            let new_value = match old_value {
                Value::Array(items) => {
                    // map element-wise, dropping elements the rule filters out
                    let mut mapped = Vec::new();
                    for item in items {
                        let transformed = transform_one(env, rule, item)?;
                        let dropped =
                            matches!(&transformed, Value::Object(obj) if obj.is_empty());
                        if !dropped {
                            mapped.push(transformed);
                        }
                    }
                    Value::Array(mapped)
                }
                scalar => transform_one(env, rule, scalar)?,
            };
            new_values.push(new_value);
        }
        let combined = if new_values.len() > 1 {
            Value::Array(new_values)
        } else {
            new_values.pop().expect("at least one value was produced")
        };

        let to_path = if rule.to.is_empty() {
            &rule.from
        } else {
            &rule.to
        };
        set_dotted(result, to_path, combined);
    }
    Ok(())
}

/// Applies one rule to one value: filter first, then either sub-rules
/// (rebuilding an object) or the value itself.
fn transform_one(env: &Environment, rule: &Rule, value: &Value) -> Result<Value, TransformError> {
    if let Some(filter) = &rule.filter {
        let verdict = env.evaluate_template(filter, value)?;
        if !truthy(&verdict) {
            return Ok(Value::Object(Map::new()));
        }
    }
    if rule.rules.is_empty() {
        return Ok(value.clone());
    }
    let mut rebuilt = Value::Object(Map::new());
    transform_rules(env, &rule.rules, value, &mut rebuilt)?;
    Ok(rebuilt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_rules_with_filters_and_expressions() {
        let rules = r#"[{"from": "person", "filter": "age <= 25", "rules": [
                         {"expr": "at(split(fullname, \" \"), 0) ", "to": "first_name"},
                         {"expr": "at(split(fullname, \" \"), 1) ", "to": "last_name"},
                         {"from": "age"}
                        ]}]"#;
        let transformer = JsonTransformer::from_str(rules).unwrap();
        assert_eq!(transformer.rules().len(), 1);
        let rule = &transformer.rules()[0];
        assert_eq!(rule.from, "person");
        assert!(rule.filter.is_some());
        assert!(rule.expr.is_none());
        assert_eq!(rule.rules.len(), 3);
        assert_eq!(rule.rules[0].to, "first_name");
        assert_eq!(rule.rules[2].from, "age");
    }

    #[test]
    fn malformed_rule_sets_are_rejected() {
        assert!(matches!(
            JsonTransformer::from_str(r#"{"from": "a"}"#),
            Err(TransformError::Rules(_))
        ));
        assert!(matches!(
            JsonTransformer::from_str(r#"[42]"#),
            Err(TransformError::Rules(_))
        ));
        assert!(matches!(
            JsonTransformer::from_str(r#"[{"filter": "true"}]"#),
            Err(TransformError::Rules(_))
        ));
    }

    #[test]
    fn renames_fanned_out_fields() {
        let rules =
            r#"[{"from": "person.fullname", "to": "fullname"}, {"from": "person.age", "to": "age"}]"#;
        let transformer = JsonTransformer::from_str(rules).unwrap();
        let input = r#"[{"person":[
                          {"fullname":"John Doe", "age": 25},
                          {"fullname":"Alexander Kovalkov", "age": 50}
                      ]}]"#;
        let output = transformer.transform_str(input).unwrap();
        assert_eq!(
            output,
            r#"{"fullname":["John Doe","Alexander Kovalkov"],"age":[25,50]}"#
        );
    }

    #[test]
    fn destination_paths_build_nested_objects() {
        let rules = r#"[{"from": "name", "to": "person.name"}, {"from": "age", "to": "person.age"}]"#;
        let transformer = JsonTransformer::from_str(rules).unwrap();
        let input = r#"[{"name":"John Doe","age":25},{"name":"Alexander Kovalkov", "age": 50}]"#;
        let output = transformer.transform_str(input).unwrap();
        assert_eq!(
            output,
            r#"{"person":{"name":["John Doe","Alexander Kovalkov"],"age":[25,50]}}"#
        );
    }

    #[test]
    fn filters_and_sub_rules_rebuild_matching_elements() {
        let rules = r#"[{"from": "person", "filter": "age <= 25", "rules": [
                         {"expr": "at(split(fullname, \" \"), 0) ", "to": "first_name"},
                         {"expr": "at(split(fullname, \" \"), 1) ", "to": "last_name"},
                         {"from": "age"}
                        ]}]"#;
        let transformer = JsonTransformer::from_str(rules).unwrap();
        let input = r#"[{"person":[
                          {"fullname":"John Doe", "age": 25},
                          {"fullname":"Alexander Kovalkov", "age": 50}
                      ]}]"#;
        let output = transformer.transform_str(input).unwrap();
        assert_eq!(
            output,
            r#"{"person":[{"first_name":"John","last_name":"Doe","age":25}]}"#
        );
    }

    #[test]
    fn empty_rule_set_transforms_to_an_empty_object() {
        let transformer = JsonTransformer::default();
        assert!(transformer.is_empty());
        assert_eq!(transformer.transform(&json!({"a": 1})).unwrap(), json!({}));
    }
}
