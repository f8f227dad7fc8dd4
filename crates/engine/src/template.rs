//! Parsed templates and the template store.

use std::path::PathBuf;

use indexmap::IndexMap;

use crate::ast::Block;
use crate::description::Description;

/// A parsed template: owned source text, origin path, root block and an
/// optional description used for typed-variable validation.
#[derive(Debug, Default)]
pub struct Template {
    pub content: String,
    pub path: PathBuf,
    pub root: Block,
    pub desc: Description,
}

impl Template {
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_path(content, PathBuf::new())
    }

    pub fn with_path(content: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let mut content = content.into();
        // node offsets index the stored content, so the BOM goes before parse
        if let Some(stripped) = content.strip_prefix('\u{feff}') {
            content = stripped.to_string();
        }
        Template {
            content,
            path: path.into(),
            root: Block::default(),
            desc: Description::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.nodes.is_empty()
    }
}

/// Two templates are equal iff their source texts are equal.
impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content
    }
}

/// Insertion-order-preserving mapping from template name to template.
/// Filled during parsing when `apply-template` forces resolution of a
/// sub-template; read-only while a render is in progress.
pub type TemplateStorage = IndexMap<String, Template>;
