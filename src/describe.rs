//! The description builder behind `--create-info`.
//!
//! Extracts the raw description of a template (the variables it references,
//! the templates it applies), merges it with any existing description JSON
//! next to the template, prompts for the human-readable fields and writes
//! the updated file. The prompting reader/writer are injected so the merge
//! logic stays testable.

use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};

use crate::StencilError;
use stencil_engine::description::{default_description_path, find_object};
use stencil_engine::{Description, Environment, VarType};

/// Prints a description in the human-readable listing format.
pub fn print_description(out: &mut dyn Write, desc: &Description) -> std::io::Result<()> {
    writeln!(out, "{}", desc.name)?;
    writeln!(out, "{}", desc.description)?;
    writeln!(out, "Variables:")?;
    for variable in desc.variables.values() {
        write!(out, "\t{}", variable.name)?;
        if variable.var_type != VarType::Null {
            write!(out, " ({})", variable.var_type.as_str())?;
        }
        if variable.required {
            write!(out, " (required)")?;
        }
        if !variable.description.is_empty() {
            write!(out, " - {}", variable.description)?;
        }
        if !variable.default.is_null() {
            write!(out, " (default {})", variable.default)?;
        }
        writeln!(out)?;
    }
    if !desc.nested.is_empty() {
        writeln!(out, "Nested templates:")?;
        for name in &desc.nested {
            writeln!(out, "\t{name}")?;
        }
    }
    Ok(())
}

/// Resolves the description file for a template: an explicit non-empty path
/// wins, otherwise `<template stem>.json` next to the template.
pub fn description_file_for(template: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
        _ => default_description_path(template),
    }
}

/// Builds or updates the description file for `template`, prompting on
/// `input` for every field. Returns the path written.
pub fn build_description(
    env: &mut Environment,
    template: &Path,
    info: Option<&Path>,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<PathBuf, StencilError> {
    let info_path = description_file_for(template, info);
    let name = template
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    // existing descriptions, if any; the file holds an array of them
    let mut existing: Value = match fs::read_to_string(&info_path) {
        Ok(text) => serde_json::from_str(&text)?,
        Err(_) => Value::Array(Vec::new()),
    };
    if !existing.is_array() {
        existing = Value::Array(vec![existing]);
    }

    let file_name = template.file_name().map(PathBuf::from).unwrap_or_default();
    let extracted = env.description_from_file(&file_name)?;

    let mut entry = find_object(&existing, "template", &name)
        .cloned()
        .unwrap_or_default();
    writeln!(out, "Template: {name}")?;
    entry.insert("template".into(), json!(name));
    prompt_field(input, out, &mut entry, "description")?;

    let mut variables = Vec::with_capacity(extracted.variables.len());
    for variable in extracted.variables.values() {
        writeln!(out, "Variable: {}", variable.name)?;
        let mut var_entry = entry
            .get("variables")
            .and_then(|vars| find_object(vars, "name", &variable.name))
            .cloned()
            .unwrap_or_default();
        var_entry.insert("name".into(), json!(variable.name));
        prompt_field(input, out, &mut var_entry, "description")?;
        prompt_type(input, out, &mut var_entry)?;
        prompt_required(input, out, &mut var_entry)?;
        prompt_field(input, out, &mut var_entry, "default")?;
        variables.push(Value::Object(var_entry));
    }
    entry.insert("variables".into(), Value::Array(variables));

    let nested: Vec<Value> = extracted.nested.iter().map(|n| json!(n)).collect();
    entry.insert("templates".into(), Value::Array(nested));

    replace_entry(&mut existing, &name, entry);
    fs::write(&info_path, serde_json::to_string_pretty(&existing)?)?;
    Ok(info_path)
}

fn replace_entry(existing: &mut Value, name: &str, entry: Map<String, Value>) {
    let Value::Array(entries) = existing else {
        *existing = Value::Array(vec![Value::Object(entry)]);
        return;
    };
    let position = entries.iter().position(|candidate| {
        candidate.get("template").and_then(Value::as_str) == Some(name)
    });
    match position {
        Some(index) => entries[index] = Value::Object(entry),
        None => entries.push(Value::Object(entry)),
    }
}

fn read_answer(input: &mut dyn BufRead) -> std::io::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Prompts for a free-form field; an empty answer keeps the current value.
fn prompt_field(
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    entry: &mut Map<String, Value>,
    field: &str,
) -> Result<(), StencilError> {
    if let Some(old) = entry.get(field) {
        writeln!(out, "Old {field}: {old}")?;
    }
    writeln!(out, "Input {field}:")?;
    let answer = read_answer(input)?;
    if !answer.is_empty() {
        entry.insert(field.to_string(), json!(answer));
    }
    Ok(())
}

fn prompt_type(
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    entry: &mut Map<String, Value>,
) -> Result<(), StencilError> {
    if let Some(old) = entry.get("type") {
        writeln!(out, "Old type: {old}")?;
    }
    writeln!(out, "Input type (null/bool/integer/double/string/array/object):")?;
    let answer = read_answer(input)?;
    if !answer.is_empty() {
        let parsed = VarType::parse(&answer)?;
        entry.insert("type".into(), json!(parsed.as_str()));
    }
    Ok(())
}

fn prompt_required(
    input: &mut dyn BufRead,
    out: &mut dyn Write,
    entry: &mut Map<String, Value>,
) -> Result<(), StencilError> {
    if let Some(old) = entry.get("required") {
        writeln!(out, "Old required: {old}")?;
    }
    writeln!(out, "Input required (true/false):")?;
    let answer = read_answer(input)?;
    if !answer.is_empty() {
        entry.insert("required".into(), json!(answer == "true"));
    }
    Ok(())
}
