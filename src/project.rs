//! Project files: multi-template runs over one data value.
//!
//! ```json
//! {"name": "db", "description": "database artifacts",
//!  "info": "common.json",
//!  "modules": [{"template": "Schema.tpl", "info": "schema.json", "rules": [...]}]}
//! ```
//!
//! Each module names a template, an optional description file (module-level
//! wins over project-level) and optional transformer rules applied to the
//! data before rendering. Rendering runs the modules in order and
//! concatenates their output.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::StencilError;
use stencil_engine::Environment;
use stencil_transform::JsonTransformer;

#[derive(Debug, Deserialize)]
struct ProjectFile {
    name: String,
    description: String,
    #[serde(default)]
    info: Option<PathBuf>,
    modules: Vec<ModuleFile>,
}

#[derive(Debug, Deserialize)]
struct ModuleFile {
    template: String,
    #[serde(default)]
    info: Option<PathBuf>,
    #[serde(default)]
    rules: Option<Value>,
}

#[derive(Debug, Default)]
pub struct Module {
    /// Template file name, resolved against the templates directory.
    pub template: String,
    /// Description file for this module's template.
    pub info: Option<PathBuf>,
    /// Data transformation applied before rendering.
    pub transformer: JsonTransformer,
}

impl Module {
    pub fn transform(&self, data: &Value) -> Result<Value, StencilError> {
        if self.transformer.is_empty() {
            return Ok(data.clone());
        }
        Ok(self.transformer.transform(data)?)
    }
}

#[derive(Debug, Default)]
pub struct Project {
    pub name: String,
    pub description: String,
    /// Description file shared by all modules that don't carry their own.
    pub info: Option<PathBuf>,
    pub modules: Vec<Module>,
}

impl Project {
    pub fn from_file(path: &Path) -> Result<Self, StencilError> {
        let text = fs::read_to_string(path)?;
        let file: ProjectFile = serde_json::from_str(&text)?;
        Self::from_parts(file)
    }

    pub fn from_value(value: &Value) -> Result<Self, StencilError> {
        let file: ProjectFile = serde_json::from_value(value.clone())?;
        Self::from_parts(file)
    }

    fn from_parts(file: ProjectFile) -> Result<Self, StencilError> {
        let mut modules = Vec::with_capacity(file.modules.len());
        for module in file.modules {
            let transformer = match &module.rules {
                Some(rules) => JsonTransformer::from_value(rules)?,
                None => JsonTransformer::default(),
            };
            modules.push(Module {
                template: module.template,
                info: module.info,
                transformer,
            });
        }
        Ok(Project {
            name: file.name,
            description: file.description,
            info: file.info,
            modules,
        })
    }

    /// Renders every module in order against `data`, concatenating the
    /// output. `info_override` replaces all description files.
    pub fn render(
        &self,
        env: &mut Environment,
        data: &Value,
        info_override: Option<&Path>,
    ) -> Result<String, StencilError> {
        let mut output = String::new();
        for module in &self.modules {
            log::debug!("rendering project module '{}'", module.template);
            let module_data = module.transform(data)?;
            let info = info_override
                .or(module.info.as_deref())
                .or(self.info.as_deref());
            output.push_str(&env.render_file(Path::new(&module.template), &module_data, info)?);
        }
        Ok(output)
    }
}
