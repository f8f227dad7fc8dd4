//! Helpers over `serde_json::Value` shared by the renderer and the
//! transformer: dotted-path lookup with array fan-out, truthiness, stream
//! printing, ordering for sort/min/max, dotted-path writes and the
//! typed-variable conversion matrix.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::io::Write;

use serde_json::{Map, Value, json};

use crate::description::VarType;
use crate::error::EngineError;
use crate::utils::split_dotted;

/// Resolves a dotted path against `root`, descending through objects and
/// fanning out across arrays: when a part meets an array, every element that
/// is an object carrying the part contributes a match. Matches preserve
/// document order.
pub fn find_pointers<'a>(root: &'a Value, parts: &[String]) -> Vec<&'a Value> {
    let mut queue: VecDeque<&Value> = VecDeque::from([root]);
    for part in parts {
        if part.is_empty() {
            // reference to self
            break;
        }
        for _ in 0..queue.len() {
            let value = queue.pop_front().expect("queue length was just checked");
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Value::Object(obj) = item
                            && let Some(child) = obj.get(part.as_str())
                        {
                            queue.push_back(child);
                        }
                    }
                }
                Value::Object(obj) => {
                    if let Some(child) = obj.get(part.as_str()) {
                        queue.push_back(child);
                    }
                }
                _ => {}
            }
        }
    }
    queue.into_iter().collect()
}

/// [`find_pointers`] over an unsplit dotted name.
pub fn find_dotted<'a>(root: &'a Value, name: &str) -> Vec<&'a Value> {
    find_pointers(root, &split_dotted(name))
}

pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i != 0
            } else if let Some(u) = n.as_u64() {
                u != 0
            } else {
                n.as_f64().unwrap_or(0.0) != 0.0
            }
        }
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Prints a value into the output stream: numbers and strings bare,
/// booleans as `1`/`0`, arrays and objects as canonical JSON, null as
/// nothing.
pub fn write_value(out: &mut dyn Write, value: &Value) -> std::io::Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::Bool(b) => write!(out, "{}", if *b { 1 } else { 0 }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                write!(out, "{i}")
            } else if let Some(u) = n.as_u64() {
                write!(out, "{u}")
            } else {
                write!(out, "{}", n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => out.write_all(s.as_bytes()),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_writer(&mut *out, value).map_err(std::io::Error::other)
        }
    }
}

pub fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_u64().and_then(|u| i64::try_from(u).ok()))
}

/// Ordering used by `sort`, `max` and `min`: numbers by numeric value,
/// strings lexicographically; anything else has no ordering.
pub fn compare_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b)),
        _ => None,
    }
}

/// Writes `value` into `target` at a dotted key, creating (or replacing
/// non-object) intermediate objects as needed.
pub fn set_dotted(target: &mut Value, dotted: &str, value: Value) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let parts = split_dotted(dotted);
    let Some((last, inner)) = parts.split_last() else {
        return;
    };
    let mut cursor = target;
    for part in inner {
        let obj = cursor.as_object_mut().expect("cursor is kept an object");
        let entry = obj
            .entry(part.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        cursor = entry;
    }
    cursor
        .as_object_mut()
        .expect("cursor is kept an object")
        .insert(last.clone(), value);
}

/// Converts `value` to the declared variable type. Coercions without a
/// meaning raise a data error.
pub fn convert_value(target: VarType, value: &Value) -> Result<Value, EngineError> {
    match value {
        Value::Null => Ok(match target {
            VarType::Boolean => json!(false),
            VarType::Integer => json!(0),
            VarType::Double => json!(0.0),
            VarType::String => json!(""),
            VarType::Array => json!([]),
            VarType::Object => Value::Object(Map::new()),
            VarType::Null => Value::Null,
        }),
        Value::Bool(b) => match target {
            VarType::Boolean => Ok(json!(*b)),
            VarType::Integer => Ok(json!(if *b { 1 } else { 0 })),
            VarType::Double => Err(EngineError::data("Cannot convert bool value to double")),
            VarType::String => Ok(json!(if *b { "true" } else { "false" })),
            VarType::Array => Ok(json!([*b])),
            VarType::Object => Err(EngineError::data("Cannot convert bool value to object")),
            VarType::Null => Ok(Value::Null),
        },
        Value::Number(n) => {
            if n.is_f64() {
                let f = n.as_f64().unwrap_or(0.0);
                match target {
                    VarType::Boolean => Ok(json!(f != 0.0)),
                    VarType::Integer => Ok(json!(f as i64)),
                    VarType::Double => Ok(json!(f)),
                    VarType::String => Ok(json!(f.to_string())),
                    VarType::Array => Ok(json!([f])),
                    VarType::Object => {
                        Err(EngineError::data("Cannot convert double value to object"))
                    }
                    VarType::Null => Ok(Value::Null),
                }
            } else {
                let i = as_int(value).ok_or_else(|| {
                    EngineError::data(format!("Integer value out of range: {n}"))
                })?;
                match target {
                    VarType::Boolean => Ok(json!(i != 0)),
                    VarType::Integer => Ok(json!(i)),
                    VarType::Double => Ok(json!(i as f64)),
                    VarType::String => Ok(json!(i.to_string())),
                    VarType::Array => Ok(json!([i])),
                    VarType::Object => Err(EngineError::data("Cannot convert int value to object")),
                    VarType::Null => Ok(Value::Null),
                }
            }
        }
        Value::String(s) => match target {
            VarType::Boolean => Ok(json!(s == "true")),
            VarType::Integer => s.trim().parse::<i64>().map(|i| json!(i)).map_err(|_| {
                EngineError::data(format!("Cannot convert string \"{s}\" to integer"))
            }),
            VarType::Double => s.trim().parse::<f64>().map(|f| json!(f)).map_err(|_| {
                EngineError::data(format!("Cannot convert string \"{s}\" to double"))
            }),
            VarType::String => Ok(json!(s)),
            VarType::Array => Ok(json!([s])),
            VarType::Object => Err(EngineError::data("Cannot convert string value to object")),
            VarType::Null => Ok(Value::Null),
        },
        Value::Array(items) => match target {
            VarType::Boolean => Ok(json!(!items.is_empty())),
            VarType::Integer => Err(EngineError::data("Cannot convert array value to integer")),
            VarType::Double => Err(EngineError::data("Cannot convert array value to double")),
            VarType::String => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    let s = convert_value(VarType::String, item)?;
                    rendered.push(format!("\"{}\"", s.as_str().unwrap_or_default()));
                }
                Ok(json!(format!("[{}]", rendered.join(", "))))
            }
            VarType::Array => Ok(value.clone()),
            VarType::Object => Err(EngineError::data("Cannot convert array value to object")),
            VarType::Null => Ok(Value::Null),
        },
        Value::Object(obj) => match target {
            VarType::Boolean => Ok(json!(!obj.is_empty())),
            VarType::Integer => Err(EngineError::data("Cannot convert object value to integer")),
            VarType::Double => Err(EngineError::data("Cannot convert object value to double")),
            VarType::String => {
                let mut rendered = Vec::with_capacity(obj.len());
                for (key, val) in obj {
                    let s = convert_value(VarType::String, val)?;
                    rendered.push(format!("\"{key}\" : \"{}\"", s.as_str().unwrap_or_default()));
                }
                Ok(json!(format!("{{{}}}", rendered.join(", "))))
            }
            VarType::Array => Ok(json!([value.clone()])),
            VarType::Object => Ok(value.clone()),
            VarType::Null => Ok(Value::Null),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_scalar_values_through_objects() {
        let data = json!({"customer": {"name": "ACME"}});
        let found = find_dotted(&data, "customer.name");
        assert_eq!(found, vec![&json!("ACME")]);
    }

    #[test]
    fn fans_out_across_arrays() {
        let data = json!({"persons": [
            {"fullname": "John Doe", "age": 25},
            {"fullname": "Alexander Smith", "age": 50},
            {"fullname": "Ivan Ivanov", "age": 30},
        ]});
        let found = find_dotted(&data, "persons.age");
        assert_eq!(found, vec![&json!(25), &json!(50), &json!(30)]);
    }

    #[test]
    fn whole_array_is_a_single_match() {
        let data = json!({"persons": [{"a": 1}, {"a": 2}]});
        let found = find_dotted(&data, "persons");
        assert_eq!(found.len(), 1);
        assert!(found[0].is_array());
    }

    #[test]
    fn fans_out_through_two_array_levels() {
        let data = json!({"tables": [
            {"name": "country", "fields": [{"name": "name"}]},
            {"name": "author", "fields": [{"name": "first_name"}, {"name": "last_name"}]},
        ]});
        let found = find_dotted(&data, "tables.fields.name");
        let names: Vec<_> = found.iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(names, vec!["name", "first_name", "last_name"]);
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!([])));
        assert!(truthy(&json!(0.5)));
        assert!(truthy(&json!("x")));
        assert!(truthy(&json!({"a": 1})));
    }

    #[test]
    fn prints_bare_scalars_and_json_containers() {
        let mut out = Vec::new();
        write_value(&mut out, &json!("text")).unwrap();
        write_value(&mut out, &json!(42)).unwrap();
        write_value(&mut out, &json!(12.34)).unwrap();
        write_value(&mut out, &json!(true)).unwrap();
        write_value(&mut out, &Value::Null).unwrap();
        write_value(&mut out, &json!(["a", 1])).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "text4212.341[\"a\",1]");
    }

    #[test]
    fn set_dotted_builds_intermediate_objects() {
        let mut scope = Value::Object(Map::new());
        set_dotted(&mut scope, "time.start", json!(18));
        set_dotted(&mut scope, "time.end", json!(20));
        set_dotted(&mut scope, "flag", json!(true));
        assert_eq!(
            scope,
            json!({"time": {"start": 18, "end": 20}, "flag": true})
        );
    }

    #[test]
    fn conversion_matrix_success_cases() {
        assert_eq!(
            convert_value(VarType::Integer, &json!("50")).unwrap(),
            json!(50)
        );
        assert_eq!(
            convert_value(VarType::Boolean, &json!("true")).unwrap(),
            json!(true)
        );
        assert_eq!(
            convert_value(VarType::Boolean, &json!("yes")).unwrap(),
            json!(false)
        );
        assert_eq!(
            convert_value(VarType::Array, &json!("Games")).unwrap(),
            json!(["Games"])
        );
        assert_eq!(
            convert_value(VarType::Double, &json!(3)).unwrap(),
            json!(3.0)
        );
        assert_eq!(
            convert_value(VarType::String, &json!(42)).unwrap(),
            json!("42")
        );
        assert_eq!(convert_value(VarType::Integer, &Value::Null).unwrap(), json!(0));
    }

    #[test]
    fn conversion_matrix_rejects_meaningless_coercions() {
        for (target, value) in [
            (VarType::Integer, json!([1])),
            (VarType::Double, json!({"a": 1})),
            (VarType::Double, json!(true)),
            (VarType::Object, json!(true)),
            (VarType::Object, json!("x")),
        ] {
            assert!(matches!(
                convert_value(target, &value),
                Err(EngineError::Data(_))
            ));
        }
    }

    #[test]
    fn ordering_mixes_are_rejected() {
        assert_eq!(
            compare_values(&json!(1), &json!(2)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(&json!("b"), &json!("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(compare_values(&json!(1), &json!("a")), None);
        assert_eq!(compare_values(&json!(true), &json!(false)), None);
    }
}
